use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

/// Single slot guard around the storage holding the frame file.
///
/// Whoever writes or reads the frame file holds the claim for the whole
/// pass. A second claimant is turned away instead of waiting.
#[derive(Debug)]
pub struct SharedStorage<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStorage<S> {
    fn clone(&self) -> Self {
        SharedStorage {
            inner: self.inner.clone(),
        }
    }
}

impl<S> SharedStorage<S> {
    pub fn new(storage: S) -> Self {
        SharedStorage {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Exclusive access, or `None` while another pass holds it
    pub fn try_claim(&self) -> Option<MutexGuard<'_, S>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            // a panicked pass leaves at worst a bad file, which the size check catches
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

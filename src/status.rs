//! Transfer status published after every acquisition attempt

use std::fmt;

/// Last known result of a download, replaced wholesale on every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub bytes: u64,
    pub success: bool,
    /// Short token such as `ok`, `incomplete` or `short_chunk`
    pub status: String,
}

impl TransferStatus {
    pub fn new(bytes: u64, success: bool, status: impl Into<String>) -> Self {
        TransferStatus {
            bytes,
            success,
            status: status.into(),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, {})",
            self.status,
            self.bytes,
            if self.success { "success" } else { "failure" }
        )
    }
}

/// Receiver of transfer status updates
pub trait StatusSink {
    fn publish(&mut self, status: &TransferStatus);
}

/// Writes every update to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn publish(&mut self, status: &TransferStatus) {
        if status.success {
            log::info!("Transfer status: {}", status);
        } else {
            log::warn!("Transfer status: {}", status);
        }
    }
}

/// Keeps every update, handy to inspect history
impl StatusSink for Vec<TransferStatus> {
    fn publish(&mut self, status: &TransferStatus) {
        self.push(status.clone());
    }
}

impl<T: StatusSink + ?Sized> StatusSink for std::sync::Arc<std::sync::Mutex<T>> {
    fn publish(&mut self, status: &TransferStatus) {
        match self.lock() {
            Ok(mut sink) => sink.publish(status),
            Err(poisoned) => poisoned.into_inner().publish(status),
        }
    }
}

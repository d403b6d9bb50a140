//! In-memory storage with a byte budget and failure switches.
//!
//! Clones share the same files, so a test can keep a handle while the frame
//! owns another one.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Storage;

#[derive(Debug, Default)]
struct MemState {
    files: HashMap<String, Vec<u8>>,
    capacity: u64,
    reformats: u32,
    fail_reformat: bool,
    fail_open: bool,
    fail_writes: bool,
}

impl MemState {
    fn used(&self) -> u64 {
        self.files.values().map(|f| f.len() as u64).sum()
    }
}

/// Shared in-memory [`Storage`]
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    state: Arc<Mutex<MemState>>,
}

impl MemStorage {
    pub fn with_capacity(capacity: u64) -> Self {
        let storage = MemStorage::default();
        storage.lock().capacity = capacity;
        storage
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place a file directly, bypassing the budget
    pub fn insert(&self, name: &str, data: Vec<u8>) {
        self.lock().files.insert(name.to_string(), data);
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(name).cloned()
    }

    pub fn reformat_count(&self) -> u32 {
        self.lock().reformats
    }

    pub fn set_fail_reformat(&self, fail: bool) {
        self.lock().fail_reformat = fail;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

impl Storage for MemStorage {
    type File = MemFile;

    fn open(&mut self, name: &str) -> io::Result<MemFile> {
        let state = self.lock();
        if state.fail_open {
            return Err(io::Error::new(io::ErrorKind::Other, "open refused"));
        }
        if !state.files.contains_key(name) {
            return Err(io::ErrorKind::NotFound.into());
        }
        Ok(MemFile {
            state: self.state.clone(),
            name: name.to_string(),
            pos: 0,
        })
    }

    fn create(&mut self, name: &str) -> io::Result<MemFile> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(io::Error::new(io::ErrorKind::Other, "open refused"));
        }
        state.files.insert(name.to_string(), Vec::new());
        Ok(MemFile {
            state: self.state.clone(),
            name: name.to_string(),
            pos: 0,
        })
    }

    fn size(&self, name: &str) -> io::Result<Option<u64>> {
        Ok(self.lock().files.get(name).map(|f| f.len() as u64))
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        self.lock().files.remove(name);
        Ok(())
    }

    fn free_space(&self) -> io::Result<u64> {
        let state = self.lock();
        Ok(state.capacity.saturating_sub(state.used()))
    }

    fn reformat(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.reformats += 1;
        if state.fail_reformat {
            return Err(io::Error::new(io::ErrorKind::Other, "format failed"));
        }
        state.files.clear();
        Ok(())
    }
}

/// Handle to one file of a [`MemStorage`]
#[derive(Debug)]
pub struct MemFile {
    state: Arc<Mutex<MemState>>,
    name: String,
    pos: u64,
}

impl MemFile {
    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.lock();
        let data = state
            .files
            .get(&self.name)
            .ok_or(io::ErrorKind::NotFound)?;
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        drop(state);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::Other, "write refused"));
        }
        let free = state.capacity.saturating_sub(state.used());
        let data = state
            .files
            .get_mut(&self.name)
            .ok_or(io::ErrorKind::NotFound)?;
        let start = self.pos as usize;
        let end = start + buf.len();
        let growth = end.saturating_sub(data.len()) as u64;
        if growth > free {
            return Err(io::Error::new(io::ErrorKind::Other, "storage full"));
        }
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        drop(state);
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self
            .lock()
            .files
            .get(&self.name)
            .map_or(0, |f| f.len() as i64);
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(off) => len + off,
            SeekFrom::Current(off) => self.pos as i64 + off,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

//! Persistent storage for the working framebuffer file.
//!
//! The frame file is only valid when its size is exactly the frame size,
//! see [`check_frame`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

mod mem;

pub use mem::{MemFile, MemStorage};

/// File store holding the frame file
pub trait Storage {
    type File: Read + Write + Seek;

    /// Open an existing file for reading
    fn open(&mut self, name: &str) -> io::Result<Self::File>;

    /// Create or truncate a file for writing
    fn create(&mut self, name: &str) -> io::Result<Self::File>;

    /// Size of a file, `None` when it does not exist
    fn size(&self, name: &str) -> io::Result<Option<u64>>;

    /// Delete a file. A missing file is not an error.
    fn remove(&mut self, name: &str) -> io::Result<()>;

    /// Bytes that can still be written
    fn free_space(&self) -> io::Result<u64>;

    /// Unmount, format and remount. Every file is gone afterwards.
    fn reformat(&mut self) -> io::Result<()>;
}

/// Result of the frame integrity rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCheck {
    Valid,
    Missing,
    WrongSize(u64),
}

impl FrameCheck {
    pub fn is_valid(&self) -> bool {
        *self == FrameCheck::Valid
    }

    /// Size of the stored file, if any
    pub fn found(&self, expected: u64) -> Option<u64> {
        match self {
            FrameCheck::Valid => Some(expected),
            FrameCheck::Missing => None,
            FrameCheck::WrongSize(size) => Some(*size),
        }
    }
}

/// Only a file of exactly `expected` bytes counts as a stored image
pub fn check_frame<S: Storage + ?Sized>(
    storage: &S,
    name: &str,
    expected: u64,
) -> io::Result<FrameCheck> {
    Ok(match storage.size(name)? {
        None => FrameCheck::Missing,
        Some(size) if size == expected => FrameCheck::Valid,
        Some(size) => FrameCheck::WrongSize(size),
    })
}

/// Volume specific operations of a [`DirStorage`]
pub trait Volume {
    fn free_space(&self, root: &Path) -> io::Result<u64>;

    fn reformat(&mut self, root: &Path) -> io::Result<()>;
}

/// Files in a directory of a mounted volume
#[derive(Debug)]
pub struct DirStorage<V> {
    root: PathBuf,
    volume: V,
}

impl<V: Volume> DirStorage<V> {
    pub fn new(root: impl Into<PathBuf>, volume: V) -> Self {
        DirStorage {
            root: root.into(),
            volume,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl<V: Volume> Storage for DirStorage<V> {
    type File = File;

    fn open(&mut self, name: &str) -> io::Result<File> {
        File::open(self.path(name))
    }

    fn create(&mut self, name: &str) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path(name))
    }

    fn size(&self, name: &str) -> io::Result<Option<u64>> {
        match fs::metadata(self.path(name)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.path(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn free_space(&self) -> io::Result<u64> {
        self.volume.free_space(&self.root)
    }

    fn reformat(&mut self) -> io::Result<()> {
        log::warn!("Reformatting storage at {}", self.root.display());
        self.volume.reformat(&self.root)
    }
}

/// Host volume with a fixed byte budget shared by the files of the root
/// directory. Reformat deletes those files.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacity(pub u64);

impl FixedCapacity {
    fn used(root: &Path) -> io::Result<u64> {
        let mut used = 0;
        for entry in fs::read_dir(root)? {
            let meta = entry?.metadata()?;
            if meta.is_file() {
                used += meta.len();
            }
        }
        Ok(used)
    }
}

impl Volume for FixedCapacity {
    fn free_space(&self, root: &Path) -> io::Result<u64> {
        Ok(self.0.saturating_sub(Self::used(root)?))
    }

    fn reformat(&mut self, root: &Path) -> io::Result<()> {
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.metadata()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

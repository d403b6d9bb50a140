//! Photo frame for a 13.3" dual controller e-paper panel.
//!
//! A raw framebuffer is downloaded in range requests into a single file on
//! flash, then streamed to the two controller halves of the panel and
//! latched with a power-on / refresh / power-off cycle.
//!
//! Everything here is hardware independent: the panel talks to
//! `embedded-hal` traits, the download to a [`download::RangeClient`] and
//! the file to a [`storage::Storage`]. The device binary plugs in the
//! ESP-IDF implementations.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod download;
pub mod epd;
pub mod frame;
pub mod keep_alive;
pub mod status;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::FrameConfig;
pub use download::{Acquirer, Downloader, DownloadError, DownloadReport};
pub use epd::{Epd13in3, FrameGeometry, Panel, PanelPins, FRAME_SIZE};
pub use frame::{FrameError, PhotoFrame, PollOutcome};
pub use keep_alive::{KeepAlive, NoKeepAlive};
pub use status::{LogSink, StatusSink, TransferStatus};
pub use storage::{check_frame, DirStorage, FixedCapacity, FrameCheck, MemStorage, Storage};

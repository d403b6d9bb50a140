//! Refresh cycle orchestration: acquire, render, latch.
//!
//! Within one cycle the download strictly precedes the render, which
//! strictly precedes the power-on / refresh / power-off sequence. A failed
//! download or render never reaches the panel refresh.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::config::{ConfigError, FrameConfig, KEY_IMAGE_URL};
use crate::download::{DownloadError, DownloadReport, Fetch};
use crate::epd::{DisplayError, Panel, RefreshReport, RenderError};
use crate::status::{StatusSink, TransferStatus};
use crate::storage::{check_frame, Storage};

mod background;
mod shared;

pub use background::PollOutcome;
pub use shared::SharedStorage;

/// Byte streamed to both halves by [`PhotoFrame::clear`], white on this panel
pub const CLEAR_FILL: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("panel is not initialised")]
    NotInitialized,
    #[error("download failed: {0}")]
    Download(TransferStatus),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("panel bus error: {0:?}")]
    Bus(DisplayError),
    /// Another pass holds the frame file
    #[error("frame file is busy")]
    Busy,
    #[error("a background download is running")]
    BackgroundRunning,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot spawn download thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("download thread panicked")]
    DownloadPanicked,
}

impl From<DisplayError> for FrameError {
    fn from(e: DisplayError) -> Self {
        FrameError::Bus(e)
    }
}

/// The photo frame: one panel, one frame file, one source URL
pub struct PhotoFrame<P, S, F> {
    panel: P,
    storage: SharedStorage<S>,
    fetcher: Arc<Mutex<F>>,
    background: Option<JoinHandle<DownloadReport>>,
    config: FrameConfig,
    sinks: Vec<Box<dyn StatusSink>>,
    last_status: Option<TransferStatus>,
}

impl<P, S, F> PhotoFrame<P, S, F>
where
    P: Panel,
    S: Storage,
    F: Fetch,
{
    pub fn new(panel: P, storage: S, fetcher: F, config: FrameConfig) -> Self {
        PhotoFrame {
            panel,
            storage: SharedStorage::new(storage),
            fetcher: Arc::new(Mutex::new(fetcher)),
            background: None,
            config,
            sinks: Vec::new(),
            last_status: None,
        }
    }

    /// Receive a [`TransferStatus`] after every acquisition attempt
    pub fn add_sink(&mut self, sink: Box<dyn StatusSink>) {
        self.sinks.push(sink);
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// Handle to the guarded storage, e.g. for an upload path
    pub fn storage(&self) -> SharedStorage<S> {
        self.storage.clone()
    }

    pub fn last_status(&self) -> Option<&TransferStatus> {
        self.last_status.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.panel.is_initialized()
    }

    /// Log the configuration and initialise the panel
    pub fn setup(&mut self) -> Result<(), FrameError> {
        self.config.dump();
        self.panel.init()?;
        Ok(())
    }

    /// Download, render and refresh in the calling context
    pub fn refresh(&mut self) -> Result<RefreshReport, FrameError> {
        self.ensure_initialized()?;
        let status = self.acquire()?;
        if !status.success {
            return Err(FrameError::Download(status));
        }
        self.render_stored()
    }

    /// Periodic entry point, skipped while the panel is not initialised
    pub fn update(&mut self) -> Result<Option<RefreshReport>, FrameError> {
        if !self.panel.is_initialized() {
            log::warn!("Panel not initialised, skipping update");
            return Ok(None);
        }
        self.refresh().map(Some)
    }

    /// Show the stored frame without downloading
    pub fn display_stored(&mut self) -> Result<RefreshReport, FrameError> {
        self.ensure_initialized()?;
        self.render_stored()
    }

    /// Blank the panel
    pub fn clear(&mut self) -> Result<RefreshReport, FrameError> {
        self.ensure_initialized()?;
        log::info!("Clearing display");
        self.panel.write_fill(CLEAR_FILL)?;
        Ok(self.panel.refresh()?)
    }

    pub fn sleep(&mut self) -> Result<(), FrameError> {
        self.panel.sleep()?;
        Ok(())
    }

    pub fn wake(&mut self) -> Result<(), FrameError> {
        self.panel.wake()?;
        Ok(())
    }

    /// Point the frame at a new image and show it
    pub fn set_image_url(&mut self, url: &str) -> Result<RefreshReport, FrameError> {
        self.config.set(KEY_IMAGE_URL, url)?;
        log::info!("Image URL set to {}", self.config.image_url);
        self.refresh()
    }

    fn ensure_initialized(&self) -> Result<(), FrameError> {
        if self.panel.is_initialized() {
            Ok(())
        } else {
            Err(FrameError::NotInitialized)
        }
    }

    /// One acquisition attempt in the calling context, status published
    fn acquire(&mut self) -> Result<TransferStatus, FrameError> {
        if self.background.is_some() {
            return Err(FrameError::BackgroundRunning);
        }
        let report = {
            let mut fetcher = self
                .fetcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match self.storage.try_claim() {
                Some(mut storage) => fetcher.fetch(&self.config.image_url, &mut *storage),
                None => DownloadReport::failed(DownloadError::Busy),
            }
        };
        let status = report.to_status();
        self.publish(status.clone());
        Ok(status)
    }

    fn publish(&mut self, status: TransferStatus) {
        for sink in self.sinks.iter_mut() {
            sink.publish(&status);
        }
        self.last_status = Some(status);
    }

    /// Stream the stored file and latch it. Nothing reaches the panel
    /// refresh unless both passes succeeded.
    fn render_stored(&mut self) -> Result<RefreshReport, FrameError> {
        {
            let mut storage = self.storage.try_claim().ok_or(FrameError::Busy)?;
            let expected = self.panel.geometry().frame_size() as u64;
            let name = &self.config.file_name;

            let check = check_frame(&*storage, name, expected).map_err(RenderError::Io)?;
            if !check.is_valid() {
                log::warn!("No valid image stored: {:?}", check);
                return Err(RenderError::NoValidImage {
                    found: check.found(expected),
                }
                .into());
            }

            let mut file = storage.open(name).map_err(RenderError::Io)?;
            self.panel.write_frame(&mut file)?;
        }
        Ok(self.panel.refresh()?)
    }
}

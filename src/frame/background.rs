//! Download on a separate thread, render from the loop once it is done

use std::thread;

use super::{FrameError, PhotoFrame};
use crate::download::{DownloadError, DownloadReport, Fetch};
use crate::epd::{Panel, RefreshReport};
use crate::storage::Storage;

/// Download thread stack, the HTTP client needs more than the default
const DOWNLOAD_STACK_SIZE: usize = 16 * 1024;

/// What [`PhotoFrame::poll`] found
#[derive(Debug)]
pub enum PollOutcome {
    /// No background download was started
    Idle,
    /// The download is still running
    Running,
    /// The download finished and the result was handled
    Finished(Result<RefreshReport, FrameError>),
}

impl<P, S, F> PhotoFrame<P, S, F>
where
    P: Panel,
    S: Storage + Send + 'static,
    F: Fetch + Send + 'static,
{
    /// Start downloading on a new thread. Returns `false` if a download is
    /// already in flight.
    ///
    /// Thread placement (core, priority) follows whatever spawn configuration
    /// the caller has set for the current thread.
    pub fn start_background_download(&mut self) -> Result<bool, FrameError> {
        if self.background.is_some() {
            log::warn!("Background download already running");
            return Ok(false);
        }

        let storage = self.storage.clone();
        let fetcher = self.fetcher.clone();
        let url = self.config.image_url.clone();

        let handle = thread::Builder::new()
            .name("epd-download".into())
            .stack_size(DOWNLOAD_STACK_SIZE)
            .spawn(move || {
                let mut fetcher = fetcher
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let claim = storage.try_claim();
                match claim {
                    Some(mut guard) => fetcher.fetch(&url, &mut *guard),
                    None => DownloadReport::failed(DownloadError::Busy),
                }
            })
            .map_err(FrameError::Spawn)?;

        log::info!("Background download started");
        self.background = Some(handle);
        Ok(true)
    }

    /// Loop entry: once the background download is done, publish its status
    /// and render the new frame if it is complete.
    pub fn poll(&mut self) -> PollOutcome {
        match &self.background {
            None => return PollOutcome::Idle,
            Some(handle) if !handle.is_finished() => return PollOutcome::Running,
            Some(_) => {}
        }
        let Some(handle) = self.background.take() else {
            return PollOutcome::Idle;
        };

        let report = match handle.join() {
            Ok(report) => report,
            Err(_) => {
                log::error!("Download thread panicked");
                return PollOutcome::Finished(Err(FrameError::DownloadPanicked));
            }
        };

        let status = report.to_status();
        self.publish(status.clone());
        if !status.success {
            return PollOutcome::Finished(Err(FrameError::Download(status)));
        }
        if !self.panel.is_initialized() {
            log::warn!("Panel not initialised, new frame stays stored");
            return PollOutcome::Finished(Err(FrameError::NotInitialized));
        }
        PollOutcome::Finished(self.render_stored())
    }

    /// `true` while a background download is in flight
    pub fn download_running(&self) -> bool {
        self.background.is_some()
    }
}

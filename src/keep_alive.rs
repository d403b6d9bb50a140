//! Liveness hook invoked from long running loops.
//!
//! Busy waits, render passes and downloads call [`KeepAlive::feed`] at a
//! steady rate so a task watchdog does not mistake them for a hang.

/// Called periodically from blocking loops
pub trait KeepAlive {
    /// Signal that the current task is still making progress
    fn feed(&mut self);
}

impl<F: FnMut()> KeepAlive for F {
    fn feed(&mut self) {
        self()
    }
}

/// Keep-alive for hosts without a watchdog
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAlive;

impl KeepAlive for NoKeepAlive {
    fn feed(&mut self) {}
}

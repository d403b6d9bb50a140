//! Busy line polling with a hard ceiling.
//!
//! Hardware contract: the BUSY line is LOW while the panel is busy and HIGH
//! when idle. A wait that runs out of time is logged and the caller carries
//! on; blocking forever would trip the supervising watchdog.
//!
//! The ceiling is measured on a [`Clock`], so time spent feeding the
//! keep-alive or reading the pin counts against it.

use std::time::Instant;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use crate::keep_alive::KeepAlive;

/// How a busy wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The panel released BUSY after roughly `waited_ms`
    Idle {
        /// Time spent polling, settle delay excluded
        waited_ms: u32,
    },
    /// BUSY stayed asserted for the whole timeout
    TimedOut,
    /// The BUSY line could not be read
    PinError,
}

impl WaitOutcome {
    /// `true` when the panel actually reported idle
    pub fn is_idle(&self) -> bool {
        matches!(self, WaitOutcome::Idle { .. })
    }
}

/// Monotonic millisecond time source
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Poll interval, ceiling and post-release settle time of a busy wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyWait {
    /// Sleep between two reads of the BUSY line
    pub poll_ms: u32,
    /// Give up after this much polling
    pub timeout_ms: u32,
    /// Extra delay once BUSY is released
    pub settle_ms: u32,
}

impl Default for BusyWait {
    fn default() -> Self {
        Self::PANEL
    }
}

impl BusyWait {
    /// Timing used by the panel firmware
    pub const PANEL: BusyWait = BusyWait {
        poll_ms: 10,
        timeout_ms: 15_000,
        settle_ms: 20,
    };

    /// Block until `busy` reads idle or `timeout_ms` has passed on `clock`.
    ///
    /// `keep_alive` is fed once per poll.
    pub fn wait<B, D, C, K>(
        &self,
        busy: &mut B,
        delay: &mut D,
        clock: &C,
        keep_alive: &mut K,
    ) -> WaitOutcome
    where
        B: InputPin,
        D: DelayNs,
        C: Clock + ?Sized,
        K: KeepAlive,
    {
        let poll_ms = self.poll_ms.max(1);
        let start = clock.now_ms();

        loop {
            let level = busy.is_high();
            let waited_ms =
                u32::try_from(clock.now_ms().saturating_sub(start)).unwrap_or(u32::MAX);
            match level {
                Ok(true) => {
                    delay.delay_ms(self.settle_ms);
                    log::debug!("Panel idle after {} ms", waited_ms);
                    return WaitOutcome::Idle { waited_ms };
                }
                Ok(false) => {}
                Err(_) => {
                    log::error!("Error reading BUSY pin state - assuming not busy to continue");
                    return WaitOutcome::PinError;
                }
            }

            if waited_ms >= self.timeout_ms {
                log::warn!(
                    "Busy wait timed out after {} ms; proceeding",
                    self.timeout_ms
                );
                return WaitOutcome::TimedOut;
            }

            keep_alive.feed();
            delay.delay_ms(poll_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keep_alive::NoKeepAlive;
    use crate::testing::{LevelPin, RecordingDelay};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    #[test]
    fn returns_promptly_when_already_idle() {
        let mut busy = PinMock::new(&[PinTransaction::get(PinState::High)]);
        let mut delay = RecordingDelay::default();
        let clock = delay.clone();

        let outcome = BusyWait::PANEL.wait(&mut busy, &mut delay, &clock, &mut NoKeepAlive);

        assert_eq!(outcome, WaitOutcome::Idle { waited_ms: 0 });
        assert_eq!(delay.total_ms(), u64::from(BusyWait::PANEL.settle_ms));
        busy.done();
    }

    #[test]
    fn waits_until_released() {
        let mut busy = PinMock::new(&[
            PinTransaction::get(PinState::Low),
            PinTransaction::get(PinState::Low),
            PinTransaction::get(PinState::Low),
            PinTransaction::get(PinState::High),
        ]);
        let mut delay = RecordingDelay::default();
        let clock = delay.clone();
        let mut fed = 0;

        let outcome = BusyWait::PANEL.wait(&mut busy, &mut delay, &clock, &mut || fed += 1);

        assert_eq!(outcome, WaitOutcome::Idle { waited_ms: 30 });
        assert_eq!(fed, 3);
        assert_eq!(delay.total_ms(), 30 + 20);
        busy.done();
    }

    #[test]
    fn gives_up_at_the_timeout_not_before() {
        let mut busy = LevelPin::low();
        let mut delay = RecordingDelay::default();
        let clock = delay.clone();
        let mut fed = 0u32;

        let outcome = BusyWait::PANEL.wait(&mut busy, &mut delay, &clock, &mut || fed += 1);

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(delay.total_ms(), 15_000);
        assert_eq!(fed, 1_500);
        assert_eq!(busy.reads(), 1_501);
    }

    #[test]
    fn timeout_rounds_up_to_a_whole_poll() {
        let wait = BusyWait {
            poll_ms: 7,
            timeout_ms: 20,
            settle_ms: 5,
        };
        let mut busy = LevelPin::low();
        let mut delay = RecordingDelay::default();
        let clock = delay.clone();

        assert_eq!(
            wait.wait(&mut busy, &mut delay, &clock, &mut NoKeepAlive),
            WaitOutcome::TimedOut
        );
        assert_eq!(delay.total_ms(), 21);
    }

    #[test]
    fn unreadable_pin_does_not_block() {
        use embedded_hal_mock::eh1::MockError;
        use std::io::ErrorKind;

        let mut busy = PinMock::new(&[PinTransaction::get(PinState::Low)
            .with_error(MockError::Io(ErrorKind::NotConnected))]);
        let mut delay = RecordingDelay::default();
        let clock = delay.clone();

        let outcome = BusyWait::PANEL.wait(&mut busy, &mut delay, &clock, &mut NoKeepAlive);

        assert_eq!(outcome, WaitOutcome::PinError);
        assert_eq!(delay.total_ms(), 0);
        busy.done();
    }

    #[test]
    fn slow_keep_alive_counts_against_the_timeout() {
        let mut busy = LevelPin::low();
        let mut delay = RecordingDelay::default();
        let clock = delay.clone();
        // a keep-alive that yields for a whole scheduler tick
        let mut tick = delay.clone();
        let mut fed = 0u32;

        let outcome = BusyWait::PANEL.wait(&mut busy, &mut delay, &clock, &mut || {
            fed += 1;
            tick.delay_ms(10);
        });

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(clock.total_ms(), 15_000);
        assert_eq!(fed, 750);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::new();
        let before = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(clock.now_ms() >= before + 5);
    }
}

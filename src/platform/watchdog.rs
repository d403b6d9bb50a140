use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::sys::esp_task_wdt_reset;

use epd_photo_frame::KeepAlive;

/// Resets the task watchdog and gives the idle task a tick
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskWatchdog;

impl KeepAlive for TaskWatchdog {
    fn feed(&mut self) {
        // fails harmlessly when the calling task is not subscribed
        unsafe {
            esp_task_wdt_reset();
        }
        FreeRtos::delay_ms(1);
    }
}

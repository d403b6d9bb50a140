//! SPIFFS volume holding the frame file

use std::ffi::CString;
use std::io;
use std::path::Path;
use std::ptr;

use anyhow::{Context, Result};
use esp_idf_svc::sys::{
    esp, esp_spiffs_format, esp_spiffs_info, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register,
    esp_vfs_spiffs_unregister, EspError,
};

use epd_photo_frame::storage::Volume;

/// Where the default SPIFFS partition is mounted
pub const MOUNT_POINT: &str = "/spiffs";

const MAX_FILES: usize = 4;

/// The default SPIFFS partition, registered with the VFS
pub struct Spiffs {
    base_path: CString,
}

fn to_io(e: EspError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

impl Spiffs {
    /// Register the partition at `base_path`, formatting it if it does not
    /// mount
    pub fn mount(base_path: &str) -> Result<Self> {
        let spiffs = Spiffs {
            base_path: CString::new(base_path).context("mount point contains NUL")?,
        };
        spiffs.register().context("Failed to mount SPIFFS")?;

        let (total, used) = spiffs.info().context("Failed to query SPIFFS")?;
        log::info!("SPIFFS mounted at {}: {} of {} bytes used", base_path, used, total);
        Ok(spiffs)
    }

    fn register(&self) -> Result<(), EspError> {
        let conf = esp_vfs_spiffs_conf_t {
            base_path: self.base_path.as_ptr(),
            partition_label: ptr::null(),
            max_files: MAX_FILES,
            format_if_mount_failed: true,
        };
        esp!(unsafe { esp_vfs_spiffs_register(&conf) })
    }

    fn info(&self) -> Result<(usize, usize), EspError> {
        let mut total = 0;
        let mut used = 0;
        esp!(unsafe { esp_spiffs_info(ptr::null(), &mut total, &mut used) })?;
        Ok((total, used))
    }
}

impl Volume for Spiffs {
    fn free_space(&self, _root: &Path) -> io::Result<u64> {
        let (total, used) = self.info().map_err(to_io)?;
        Ok(total.saturating_sub(used) as u64)
    }

    fn reformat(&mut self, _root: &Path) -> io::Result<()> {
        esp!(unsafe { esp_vfs_spiffs_unregister(ptr::null()) }).map_err(to_io)?;
        esp!(unsafe { esp_spiffs_format(ptr::null()) }).map_err(to_io)?;
        self.register().map_err(to_io)?;
        log::info!("SPIFFS reformatted and remounted");
        Ok(())
    }
}

impl Drop for Spiffs {
    fn drop(&mut self) {
        if let Err(e) = esp!(unsafe { esp_vfs_spiffs_unregister(ptr::null()) }) {
            log::warn!("Failed to unmount SPIFFS: {}", e);
        }
    }
}

// Firmware update staging
//
// An uploaded image is written next to the staging path and renamed into
// place, so a half-written image never sits at the staging path. Applying it
// is left to the supervisor that restarts the runtime.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::OtaConfig;

#[derive(Debug, thiserror::Error)]
pub enum OtaError {
    #[error("Firmware image is empty")]
    EmptyImage,

    #[error("Not enough space: image is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FirmwareUpdater {
    staging_path: PathBuf,
    max_image_bytes: usize,
}

impl FirmwareUpdater {
    pub fn new(config: &OtaConfig) -> Self {
        Self {
            staging_path: config.staging_path.clone(),
            max_image_bytes: config.max_image_bytes,
        }
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Stage an image; returns its size
    pub fn stage(&self, image: &[u8]) -> Result<usize, OtaError> {
        info!("[OTA] Upload start: {} bytes", image.len());
        if image.is_empty() {
            return Err(OtaError::EmptyImage);
        }
        if image.len() > self.max_image_bytes {
            error!(
                "[OTA] Not enough space. Limit: {}, Need: {}",
                self.max_image_bytes,
                image.len()
            );
            return Err(OtaError::ImageTooLarge {
                size: image.len(),
                limit: self.max_image_bytes,
            });
        }

        if let Some(dir) = self.staging_path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let partial = self.staging_path.with_extension("part");
        {
            let mut file = std::fs::File::create(&partial)?;
            file.write_all(image)?;
            file.sync_all()?;
        }
        std::fs::rename(&partial, &self.staging_path)?;

        info!(
            "[OTA] Success: {} bytes staged at {}",
            image.len(),
            self.staging_path.display()
        );
        Ok(image.len())
    }
}

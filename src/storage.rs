use crate::config::CaptureConfig;
use crate::error::{Result, StorageError};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Create the photo and video directories if they are missing.
///
/// Safe to call repeatedly. A path that exists as anything other than a
/// directory is an error.
pub async fn prepare_directories(capture: &CaptureConfig) -> Result<()> {
    info!("Preparing capture directories");
    ensure_directory(&capture.photo_path()).await?;
    ensure_directory(&capture.video_path()).await?;
    Ok(())
}

async fn ensure_directory(path: &Path) -> Result<()> {
    if is_directory(path).await {
        debug!("Directory already exists: {}", path.display());
        return Ok(());
    }

    match fs::create_dir_all(path).await {
        Ok(()) => {
            info!("Created directory: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && is_directory(path).await => Ok(()),
        Err(source) => Err(StorageError::DirectoryCreation {
            path: path.display().to_string(),
            source,
        }
        .into()),
    }
}

async fn is_directory(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

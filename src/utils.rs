use crate::error::StripesError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "climate_stripes_cache";

/// `climate_stripes_cache` under the platform cache directory.
pub fn get_cache_dir() -> Result<PathBuf, StripesError> {
    dirs::cache_dir()
        .map(|p| p.join(CACHE_DIR_NAME))
        .ok_or(StripesError::CacheDirResolution)
}

pub async fn ensure_cache_dir_exists(path: &Path) -> Result<(), StripesError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(StripesError::CacheDirNotADirectory(path.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| StripesError::CacheDirCreation(path.to_path_buf(), e))?;
            Ok(())
        }
        Err(e) => Err(StripesError::CacheDirCreation(path.to_path_buf(), e)),
    }
}

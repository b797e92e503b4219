use crate::storage::error::StorageError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "weatherflow";

/// Directory used for local object storage when no storage url is configured.
pub fn default_storage_dir() -> Result<PathBuf, StorageError> {
    dirs::data_dir()
        .ok_or(StorageError::DataDirResolution)
        .map(|p| p.join(DATA_DIR_NAME))
}

pub async fn ensure_dir_exists(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(StorageError::DirCreation(
                    path.to_path_buf(),
                    io::Error::new(io::ErrorKind::AlreadyExists, "path exists but is not a directory"),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating storage directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| StorageError::DirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(StorageError::DirCreation(path.to_path_buf(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_dir_exists_creates_nested() -> Result<(), StorageError> {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a").join("b");
        ensure_dir_exists(&nested).await?;
        assert!(nested.is_dir());
        // Second call is a no-op.
        ensure_dir_exists(&nested).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_dir_exists_rejects_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = ensure_dir_exists(file.path()).await;
        assert!(matches!(result, Err(StorageError::DirCreation(..))));
    }
}

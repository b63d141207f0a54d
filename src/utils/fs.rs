use std::path::Path;
use tokio::fs;
use crate::utils::{OptimizeError, OptimizeResult};

/// Get file size in bytes
pub async fn get_file_size(path: impl AsRef<Path>) -> OptimizeResult<u64> {
    fs::metadata(path.as_ref())
        .await
        .map(|m| m.len())
        .map_err(|e| OptimizeError::io(format!("Failed to get file size: {}", e)))
}

/// Reads a whole input file.
pub async fn read_input(path: impl AsRef<Path>) -> OptimizeResult<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path)
        .await
        .map_err(|e| OptimizeError::io(format!("Failed to read {}: {}", path.display(), e)))
}

/// Creates the parent directory of `path` if it is missing.
pub async fn ensure_parent_dir(path: impl AsRef<Path>) -> OptimizeResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OptimizeError::io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
    }
    Ok(())
}

/// Writes `data` to `path`, creating parent directories as needed.
pub async fn write_output(path: impl AsRef<Path>, data: &[u8]) -> OptimizeResult<()> {
    let path = path.as_ref();
    ensure_parent_dir(path).await?;
    fs::write(path, data)
        .await
        .map_err(|e| OptimizeError::io(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.jpg");
        write_output(&path, b"data").await.unwrap();
        assert_eq!(get_file_size(&path).await.unwrap(), 4);
        assert_eq!(read_input(&path).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(dir.path().join("missing.jpg")).await.unwrap_err();
        assert!(matches!(err, OptimizeError::IO(_)));
    }
}

use crate::core::paths::local_path;
use crate::domain::ports::FileSystem;
use crate::utils::error::{Result, WqError};
use async_trait::async_trait;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(local_path(path)).await?)
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        match tokio::fs::metadata(local_path(path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        match tokio::fs::metadata(local_path(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn walk(&self, root: &str) -> Result<Vec<String>> {
        let root = local_path(root).to_string();

        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            if !Path::new(&root).exists() {
                tracing::debug!("{} does not exist, nothing to walk", root);
                return Ok(files);
            }

            for entry in WalkDir::new(&root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.loop_ancestor().is_some() => {
                        tracing::debug!("Skipping symlink loop: {}", e);
                        continue;
                    }
                    Err(e) => {
                        return Err(WqError::StorageError {
                            message: format!("Failed to walk {}: {}", root, e),
                        })
                    }
                };
                if entry.file_type().is_file() {
                    files.push(entry.path().to_string_lossy().into_owned());
                }
            }
            files.sort();
            Ok(files)
        })
        .await
        .map_err(|e| WqError::StorageError {
            message: format!("Directory walk was interrupted: {}", e),
        })?
    }

    async fn create_dir_all(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(local_path(path)).await?;
        Ok(())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(local_path(path));

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_inspect() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();
        let file = format!("{}/nested/deeper/scene.tif", root);

        let fs = LocalFileSystem::new();
        fs.write_file(&file, b"GeoTIFF").await.unwrap();

        assert!(fs.exists(&file).await.unwrap());
        assert!(fs.is_file(&file).await.unwrap());
        assert!(!fs.is_dir(&file).await.unwrap());
        assert!(fs.is_dir(&format!("{}/nested", root)).await.unwrap());
        assert!(!fs.is_file(&format!("{}/missing.tif", root)).await.unwrap());
        assert_eq!(std::fs::read(&file).unwrap(), b"GeoTIFF");
    }

    #[tokio::test]
    async fn test_walk_lists_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();

        let fs = LocalFileSystem::new();
        fs.write_file(&format!("{}/a.tif", root), b"a").await.unwrap();
        fs.write_file(&format!("{}/sub/b.json", root), b"{}").await.unwrap();
        fs.create_dir_all(&format!("{}/empty", root)).await.unwrap();

        let files = fs.walk(&format!("file://{}", root)).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with("a.tif")));
        assert!(files.iter().any(|f| f.ends_with("b.json")));
    }

    #[tokio::test]
    async fn test_walk_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("not-there");

        let files = LocalFileSystem::new()
            .walk(missing.to_str().unwrap())
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_walk_skips_symlink_loops() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap().to_string();

        let fs = LocalFileSystem::new();
        fs.write_file(&format!("{}/scenes/a.tif", root), b"a").await.unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("scenes/back")).unwrap();

        let files = fs.walk(&root).await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.tif"));
    }
}

use crate::domain::ports::FileSystem;
use crate::utils::error::{Result, WqError};
use async_trait::async_trait;
use reqwest::Client;

/// Read-only view of plain HTTP(S) URLs.
#[derive(Debug, Clone)]
pub struct HttpFileSystem {
    client: Client,
}

impl HttpFileSystem {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn read_only(&self, path: &str) -> WqError {
        WqError::StorageError {
            message: format!("{} is served over HTTP and cannot be written or listed", path),
        }
    }
}

#[async_trait]
impl FileSystem for HttpFileSystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        let response = self.client.head(path).send().await?;
        tracing::debug!("HEAD {} -> {}", path, response.status());
        Ok(response.status().is_success())
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        self.exists(path).await
    }

    async fn is_dir(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }

    async fn walk(&self, root: &str) -> Result<Vec<String>> {
        Err(self.read_only(root))
    }

    async fn create_dir_all(&self, path: &str) -> Result<()> {
        Err(self.read_only(path))
    }

    async fn write_file(&self, path: &str, _data: &[u8]) -> Result<()> {
        Err(self.read_only(path))
    }
}

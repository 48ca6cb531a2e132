use crate::utils::error::Result;
use async_trait::async_trait;

/// A place files can be listed from and written to. Paths are full
/// locations (`s3://bucket/key`, `gs://bucket/key`, local paths, URLs).
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn is_file(&self, path: &str) -> Result<bool>;
    async fn is_dir(&self, path: &str) -> Result<bool>;

    /// Every file below `root`, addressed with the same scheme as `root`.
    async fn walk(&self, root: &str) -> Result<Vec<String>>;

    async fn create_dir_all(&self, path: &str) -> Result<()>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// One readiness attempt against a service.
#[async_trait]
pub trait Probe: Send + Sync {
    fn target(&self) -> &str;
    async fn probe(&self) -> Result<()>;
}

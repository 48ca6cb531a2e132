// Adapters layer: concrete implementations for external systems (file systems, probes).

pub mod gcs;
pub mod http;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;
pub mod tcp_probe;

use crate::config::toml_config::StorageSettings;
use crate::core::paths::classify;
use crate::domain::model::PathKind;
use crate::domain::ports::FileSystem;
use crate::utils::error::Result;
use reqwest::Client;

pub use gcs::GcsFileSystem;
pub use http::HttpFileSystem;
pub use local::LocalFileSystem;
#[cfg(feature = "s3")]
pub use s3::S3FileSystem;
pub use tcp_probe::TcpProbe;

/// Picks the file system that serves `path`.
pub async fn get_filesystem(
    path: &str,
    anon: bool,
    settings: &StorageSettings,
    client: &Client,
) -> Result<Box<dyn FileSystem>> {
    match classify(path)? {
        PathKind::Local => Ok(Box::new(LocalFileSystem::new())),
        PathKind::Http => Ok(Box::new(HttpFileSystem::new(client.clone()))),
        PathKind::Gcs => {
            if anon {
                Ok(Box::new(GcsFileSystem::anonymous(
                    client.clone(),
                    &settings.gcs_endpoint,
                )))
            } else {
                Ok(Box::new(GcsFileSystem::from_env(
                    client.clone(),
                    &settings.gcs_endpoint,
                    &settings.gcs_token_env,
                )?))
            }
        }
        #[cfg(feature = "s3")]
        PathKind::S3 => Ok(Box::new(S3FileSystem::connect(settings, anon).await)),
        #[cfg(not(feature = "s3"))]
        PathKind::S3 => Err(crate::utils::error::WqError::StorageError {
            message: format!("{} needs the `s3` feature", path),
        }),
    }
}

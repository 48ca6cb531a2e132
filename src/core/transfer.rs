use crate::config::toml_config::StorageSettings;
use crate::core::paths::{self, classify};
use crate::domain::model::{DownloadResult, PathKind};
use crate::domain::ports::FileSystem;
use crate::utils::error::{Result, WqError};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_LENGTH, LAST_MODIFIED};
use reqwest::Client;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub chunk_size: usize,
    pub show_progress: bool,
}

fn progress_bar(total: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };
    let style = ProgressStyle::with_template(
        "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

/// `Content-Length` is only a hint; the buffer grows past one chunk as
/// bytes actually arrive.
fn initial_buffer_capacity(content_length: u64, chunk_size: usize) -> usize {
    usize::try_from(content_length).map_or(chunk_size, |len| len.min(chunk_size))
}

/// Streams `url` into `output_path`. Local targets are written as chunks
/// arrive; object-store targets are uploaded once the body is complete.
pub async fn download_file_from_url(
    client: &Client,
    fs: &dyn FileSystem,
    url: &str,
    output_path: &str,
    options: DownloadOptions,
) -> Result<DownloadResult> {
    let target_kind = classify(output_path)?;
    if target_kind == PathKind::Http {
        return Err(WqError::UnsupportedPathError {
            path: output_path.to_string(),
        });
    }

    tracing::info!("⬇️  Downloading {} to {}", url, output_path);
    let mut response = client.get(url).send().await?.error_for_status()?;

    let total = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let bar = progress_bar(total, output_path, options.show_progress);
    let mut written: u64 = 0;

    if target_kind == PathKind::Local {
        let local = Path::new(paths::local_path(output_path));
        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = tokio::fs::File::create(local).await?;
        let mut writer = BufWriter::with_capacity(options.chunk_size, file);
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }
        writer.flush().await?;
    } else {
        let mut buffer = Vec::with_capacity(initial_buffer_capacity(total, options.chunk_size));
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }
        fs.write_file(output_path, &buffer).await?;
    }

    bar.finish_and_clear();
    tracing::info!("✅ Wrote {} bytes to {}", written, output_path);

    Ok(DownloadResult {
        output_path: output_path.to_string(),
        bytes_written: written,
    })
}

/// HTTP address for an object-store URI; URLs pass through unchanged.
/// Configured endpoints replace the public AWS and Google hosts.
pub fn public_url(uri: &str, storage: &StorageSettings) -> Result<String> {
    match classify(uri)? {
        PathKind::Gcs => paths::gcs_object_url(uri, &storage.gcs_endpoint),
        PathKind::S3 => match &storage.s3_endpoint {
            Some(endpoint) => paths::s3_object_url(uri, endpoint),
            None => paths::s3_uri_to_public_url(uri, &storage.aws_region),
        },
        PathKind::Http => Ok(uri.to_string()),
        PathKind::Local => Err(WqError::InvalidUriError {
            uri: uri.to_string(),
            reason: "local paths have no public URL".to_string(),
        }),
    }
}

/// `Last-Modified` of a URL or object-store URI, when the server reports one.
pub async fn get_last_modified(
    client: &Client,
    uri: &str,
    storage: &StorageSettings,
) -> Result<Option<DateTime<Utc>>> {
    let url = public_url(uri, storage)?;

    let response = client.head(&url).send().await?;
    tracing::debug!("HEAD {} -> {}", url, response.status());

    let Some(value) = response.headers().get(LAST_MODIFIED) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|e| WqError::InvalidUriError {
        uri: url.clone(),
        reason: format!("unreadable Last-Modified header: {}", e),
    })?;

    let parsed = DateTime::parse_from_rfc2822(value).map_err(|e| WqError::InvalidUriError {
        uri: url.clone(),
        reason: format!("invalid Last-Modified '{}': {}", value, e),
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::sync::Mutex;

    /// Object store that keeps uploads in memory.
    #[derive(Default)]
    struct RecordingStore {
        uploads: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl FileSystem for RecordingStore {
        async fn exists(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }

        async fn is_file(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }

        async fn is_dir(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }

        async fn walk(&self, _root: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn create_dir_all(&self, _path: &str) -> Result<()> {
            Ok(())
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.uploads
                .lock()
                .unwrap()
                .push((path.to_string(), data.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_public_url() {
        let storage = StorageSettings::default();
        assert_eq!(
            public_url("gs://bucket/a.tif", &storage).unwrap(),
            "https://storage.googleapis.com/bucket/a.tif"
        );
        assert_eq!(
            public_url("s3://bucket/a.tif", &storage).unwrap(),
            "https://bucket.s3.af-south-1.amazonaws.com/a.tif"
        );
        assert_eq!(
            public_url("https://host/a.tif", &storage).unwrap(),
            "https://host/a.tif"
        );
        assert!(public_url("/data/a.tif", &storage).is_err());

        let storage = StorageSettings {
            aws_region: "us-west-2".to_string(),
            s3_endpoint: Some("http://localhost:9000/".to_string()),
            gcs_endpoint: "http://localhost:4443".to_string(),
            ..StorageSettings::default()
        };
        assert_eq!(
            public_url("s3://bucket/wofs/a.tif", &storage).unwrap(),
            "http://localhost:9000/bucket/wofs/a.tif"
        );
        assert_eq!(
            public_url("gs://bucket/a.tif", &storage).unwrap(),
            "http://localhost:4443/bucket/a.tif"
        );
    }

    #[test]
    fn test_initial_buffer_ignores_oversized_content_length() {
        assert_eq!(initial_buffer_capacity(0, 1024), 0);
        assert_eq!(initial_buffer_capacity(512, 1024), 512);
        assert_eq!(initial_buffer_capacity(10 * 1024_u64.pow(4), 1024), 1024);
        assert_eq!(initial_buffer_capacity(u64::MAX, 1024), 1024);
    }

    #[tokio::test]
    async fn test_download_to_object_store_uploads_whole_body() {
        let server = MockServer::start_async().await;
        let body = vec![3u8; 4096];
        server
            .mock_async(|when, then| {
                when.method(GET).path("/wofs/scene.tif");
                then.status(200).body(body.clone());
            })
            .await;

        let store = RecordingStore::default();
        let options = DownloadOptions {
            chunk_size: 1024,
            show_progress: false,
        };
        let result = download_file_from_url(
            &Client::new(),
            &store,
            &server.url("/wofs/scene.tif"),
            "s3://wq-bucket/wofs/scene.tif",
            options,
        )
        .await
        .unwrap();

        assert_eq!(result.bytes_written, 4096);
        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "s3://wq-bucket/wofs/scene.tif");
        assert_eq!(uploads[0].1, body);
    }

    #[tokio::test]
    async fn test_download_refuses_http_target() {
        let store = RecordingStore::default();
        let options = DownloadOptions {
            chunk_size: 1024,
            show_progress: false,
        };
        let result = download_file_from_url(
            &Client::new(),
            &store,
            "http://localhost/a.tif",
            "https://host/a.tif",
            options,
        )
        .await;

        assert!(matches!(result, Err(WqError::UnsupportedPathError { .. })));
        assert!(store.uploads.lock().unwrap().is_empty());
    }
}

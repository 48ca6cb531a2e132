use crate::config::toml_config::StorageSettings;
use crate::core::paths::{dir_prefix, parse_s3_uri};
use crate::domain::ports::FileSystem;
use crate::utils::error::{Result, WqError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;

#[derive(Debug, Clone)]
pub struct S3FileSystem {
    client: S3Client,
}

impl S3FileSystem {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Builds a client for `settings.aws_region`. Anonymous clients send
    /// unsigned requests, which is all public buckets need.
    pub async fn connect(settings: &StorageSettings, anon: bool) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.aws_region.clone()));
        if anon {
            loader = loader.no_credentials();
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.s3_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(S3Client::from_conf(builder.build()))
    }

    async fn list(&self, bucket: &str, prefix: &str, limit: Option<i32>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_max_keys(limit)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| WqError::StorageError {
                    message: format!("Failed to list s3://{}/{}: {}", bucket, prefix, e),
                })?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            if limit.is_some() || !resp.is_truncated().unwrap_or(false) {
                break;
            }
            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl FileSystem for S3FileSystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.is_file(path).await? || self.is_dir(path).await?)
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        let (bucket, key) = parse_s3_uri(path)?;
        if key.is_empty() {
            return Ok(false);
        }

        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(WqError::StorageError {
                        message: format!("Failed to inspect {}: {}", path, service_error),
                    })
                }
            }
        }
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        let (bucket, key) = parse_s3_uri(path)?;
        let keys = self.list(bucket, &dir_prefix(key), Some(1)).await?;
        Ok(!keys.is_empty())
    }

    async fn walk(&self, root: &str) -> Result<Vec<String>> {
        let (bucket, key) = parse_s3_uri(root)?;
        let scheme = root.split_once("://").map(|(s, _)| s).unwrap_or("s3");

        let keys = self.list(bucket, &dir_prefix(key), None).await?;
        Ok(keys
            .into_iter()
            .filter(|key| !key.ends_with('/'))
            .map(|key| format!("{}://{}/{}", scheme, bucket, key))
            .collect())
    }

    async fn create_dir_all(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let (bucket, key) = parse_s3_uri(path)?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| WqError::StorageError {
                message: format!("Failed to write {}: {}", path, e.into_service_error()),
            })?;

        tracing::debug!("Uploaded {} bytes to {}", data.len(), path);
        Ok(())
    }
}

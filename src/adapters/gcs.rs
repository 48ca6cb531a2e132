use crate::core::paths::{dir_prefix, parse_gcs_uri};
use crate::domain::ports::FileSystem;
use crate::utils::error::{Result, WqError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

/// Google Cloud Storage through its JSON API. Anonymous access covers public
/// buckets; otherwise an OAuth token is read from the environment.
#[derive(Debug, Clone)]
pub struct GcsFileSystem {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl GcsFileSystem {
    pub fn new(client: Client, endpoint: &str, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn anonymous(client: Client, endpoint: &str) -> Self {
        Self::new(client, endpoint, None)
    }

    pub fn from_env(client: Client, endpoint: &str, token_env: &str) -> Result<Self> {
        let token = std::env::var(token_env).map_err(|_| WqError::MissingConfigError {
            field: token_env.to_string(),
        })?;
        Ok(Self::new(client, endpoint, Some(token)))
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|_| WqError::InvalidUriError {
                uri: self.endpoint.clone(),
                reason: "endpoint cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list(&self, bucket: &str, prefix: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.api_url(&["storage", "v1", "b", bucket, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                if let Some(limit) = limit {
                    query.append_pair("maxResults", &limit.to_string());
                }
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            tracing::debug!("Listing gs://{}/{}", bucket, prefix);
            let response = self
                .authorize(self.client.get(url))
                .send()
                .await?
                .error_for_status()?;
            let page: ObjectList = response.json().await?;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if limit.map_or(true, |l| names.len() < l) => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }
}

#[async_trait]
impl FileSystem for GcsFileSystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.is_file(path).await? || self.is_dir(path).await?)
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        let (bucket, key) = parse_gcs_uri(path)?;
        if key.is_empty() {
            return Ok(false);
        }
        // An exact name sorts first among the names it prefixes.
        let names = self.list(bucket, key, Some(1)).await?;
        Ok(names.first().map(|name| name == key).unwrap_or(false))
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        let (bucket, key) = parse_gcs_uri(path)?;
        let names = self.list(bucket, &dir_prefix(key), Some(1)).await?;
        Ok(!names.is_empty())
    }

    async fn walk(&self, root: &str) -> Result<Vec<String>> {
        let (bucket, key) = parse_gcs_uri(root)?;
        let scheme = root.split_once("://").map(|(s, _)| s).unwrap_or("gs");

        let names = self.list(bucket, &dir_prefix(key), None).await?;
        Ok(names
            .into_iter()
            .filter(|name| !name.ends_with('/'))
            .map(|name| format!("{}://{}/{}", scheme, bucket, name))
            .collect())
    }

    async fn create_dir_all(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        if self.token.is_none() {
            return Err(WqError::StorageError {
                message: format!("Cannot write {} with anonymous access", path),
            });
        }
        let (bucket, key) = parse_gcs_uri(path)?;

        let mut url = self.api_url(&["upload", "storage", "v1", "b", bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        self.authorize(self.client.post(url))
            .body(data.to_vec())
            .send()
            .await?
            .error_for_status()?;
        tracing::debug!("Uploaded {} bytes to {}", data.len(), path);
        Ok(())
    }
}

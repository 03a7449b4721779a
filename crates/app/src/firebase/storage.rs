//! Cloud Storage for Firebase, `v0` REST API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::{FirebaseClient, check};
use crate::backend::{BackendError, FileStore, StoredFile, Token};

/// Object metadata as returned by upload and metadata reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    /// Comma-separated list; the first entry is used for download URLs.
    #[serde(default)]
    download_tokens: Option<String>,
}

impl ObjectMetadata {
    fn first_token(&self) -> Option<String> {
        self.download_tokens
            .as_deref()?
            .split(',')
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }
}

impl FirebaseClient {
    fn objects_url(&self) -> Result<Url, BackendError> {
        Self::parse_url(&format!(
            "{}/b/{}/o",
            self.endpoints.storage.trim_end_matches('/'),
            self.storage_bucket
        ))
    }

    /// URL of a single object. The path is one encoded segment, slashes included.
    fn object_url(&self, path: &str) -> Result<Url, BackendError> {
        Self::parse_url(&format!(
            "{}/b/{}/o/{}",
            self.endpoints.storage.trim_end_matches('/'),
            self.storage_bucket,
            urlencoding::encode(path)
        ))
    }

    /// Direct download URL for an object and one of its tokens.
    fn download_url(&self, path: &str, download_token: &str) -> Result<String, BackendError> {
        let mut url = self.object_url(path)?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", download_token);
        Ok(url.to_string())
    }

    async fn metadata(&self, token: &Token, path: &str) -> Result<ObjectMetadata, BackendError> {
        let response = self
            .client
            .get(self.object_url(path)?)
            .bearer_auth(token.expose())
            .send()
            .await?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl FileStore for FirebaseClient {
    #[instrument(skip(self, token, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        token: &Token,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredFile, BackendError> {
        let mut url = self.objects_url()?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", path);

        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let metadata: ObjectMetadata = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        tracing::info!(path = %metadata.name, "Uploaded object");
        Ok(StoredFile {
            download_token: metadata.first_token(),
            path: metadata.name,
        })
    }

    #[instrument(skip(self, token))]
    async fn public_url(&self, token: &Token, file: &StoredFile) -> Result<String, BackendError> {
        let download_token = match &file.download_token {
            Some(t) => t.clone(),
            None => self
                .metadata(token, &file.path)
                .await?
                .first_token()
                .ok_or_else(|| {
                    BackendError::Malformed(format!("no download token for {}", file.path))
                })?,
        };
        self.download_url(&file.path, &download_token)
    }
}

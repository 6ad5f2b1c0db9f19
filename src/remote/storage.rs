//! Blob-store client: keyed binary objects over HTTP.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::cache::offline::BlobSource;

use super::{parse_base, send_checked, Reachability, RemoteError};

/// Bucket holding sheet-music uploads.
pub const SHEET_MUSIC_BUCKET: &str = "sheet-music";
/// Bucket holding audio uploads.
pub const AUDIO_BUCKET: &str = "audio-files";

/// Client for the remote object store.
#[derive(Clone)]
pub struct StorageClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  net: Reachability,
}

impl StorageClient {
  pub fn new(url: &str, api_key: String, net: Reachability) -> Result<Self, RemoteError> {
    Ok(Self {
      http: reqwest::Client::new(),
      base: parse_base(url)?,
      api_key,
      net,
    })
  }

  fn object_url(&self, bucket: &str, path: &str) -> Result<Url, RemoteError> {
    self
      .base
      .join(&format!("storage/v1/object/{}/{}", bucket, path))
      .map_err(|e| RemoteError::Api(format!("bad object path {}/{}: {}", bucket, path, e)))
  }

  /// Download an object's bytes.
  pub async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
    let url = self.object_url(bucket, path)?;
    let resp = send_checked(
      &self.net,
      self.http.get(url).header("apikey", &self.api_key).bearer_auth(&self.api_key),
    )
    .await?;
    let bytes = resp.bytes().await.map_err(RemoteError::from)?;
    Ok(bytes.to_vec())
  }

  /// Store an object and hand back its path.
  pub async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<String, RemoteError> {
    let url = self.object_url(bucket, path)?;
    send_checked(
      &self.net,
      self
        .http
        .post(url)
        .header("apikey", &self.api_key)
        .bearer_auth(&self.api_key)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(bytes),
    )
    .await?;
    Ok(path.to_string())
  }

  /// Delete objects from a bucket.
  pub async fn remove(&self, bucket: &str, paths: &[&str]) -> Result<(), RemoteError> {
    let url = self
      .base
      .join(&format!("storage/v1/object/{}", bucket))
      .map_err(|e| RemoteError::Api(e.to_string()))?;
    send_checked(
      &self.net,
      self
        .http
        .delete(url)
        .header("apikey", &self.api_key)
        .bearer_auth(&self.api_key)
        .json(&serde_json::json!({ "prefixes": paths })),
    )
    .await?;
    Ok(())
  }

  /// Delete objects, swallowing failures. Used when blobs are cleaned up as
  /// a side effect and the main operation should proceed regardless.
  pub async fn remove_quietly(&self, bucket: &str, paths: &[&str]) {
    if let Err(e) = self.remove(bucket, paths).await {
      debug!(bucket, ?paths, error = %e, "object cleanup failed");
    }
  }

  /// Public URL for an object in a public bucket; no request involved.
  pub fn public_url(&self, bucket: &str, path: &str) -> Result<Url, RemoteError> {
    self
      .base
      .join(&format!("storage/v1/object/public/{}/{}", bucket, path))
      .map_err(|e| RemoteError::Api(e.to_string()))
  }
}

#[async_trait]
impl BlobSource for StorageClient {
  async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
    self.download(bucket, path).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_public_url_shape() {
    let client = StorageClient::new(
      "https://repertoire.example.com",
      "key".to_string(),
      Reachability::new(true),
    )
    .unwrap();

    let url = client.public_url(SHEET_MUSIC_BUCKET, "mass/gloria.pdf").unwrap();
    assert_eq!(
      url.as_str(),
      "https://repertoire.example.com/storage/v1/object/public/sheet-music/mass/gloria.pdf"
    );
  }
}

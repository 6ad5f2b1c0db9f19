//! Shared in-memory fakes for exercising storage-backed components.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::cache::blobs::{BlobKind, BlobTier};
use crate::cache::meta::KvStore;
use crate::cache::offline::BlobSource;
use crate::cache::StoreError;
use crate::remote::types::Song;
use crate::remote::RemoteError;

/// In-memory synchronous tier. Writes can be made to fail to exercise
/// degraded paths.
#[derive(Default)]
pub struct MemoryKv {
  map: Mutex<HashMap<String, String>>,
  failing: AtomicBool,
}

impl MemoryKv {
  pub fn fail_writes(&self, fail: bool) {
    self.failing.store(fail, Ordering::SeqCst);
  }
}

impl KvStore for MemoryKv {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.map.lock().unwrap().get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("injected write failure".into()));
    }
    self.map.lock().unwrap().insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("injected write failure".into()));
    }
    self.map.lock().unwrap().remove(key);
    Ok(())
  }
}

/// In-memory block tier.
#[derive(Default)]
pub struct MemoryBlobs {
  map: Mutex<HashMap<(BlobKind, String), Vec<u8>>>,
  failing: AtomicBool,
}

impl MemoryBlobs {
  pub fn fail_puts(&self, fail: bool) {
    self.failing.store(fail, Ordering::SeqCst);
  }
}

#[async_trait]
impl BlobTier for MemoryBlobs {
  async fn put(&self, kind: BlobKind, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(StoreError::Unavailable("injected put failure".into()));
    }
    self
      .map
      .lock()
      .unwrap()
      .insert((kind, id.to_string()), bytes.to_vec());
    Ok(())
  }

  async fn get(&self, kind: BlobKind, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(self.map.lock().unwrap().get(&(kind, id.to_string())).cloned())
  }

  async fn remove(&self, kind: BlobKind, id: &str) -> Result<(), StoreError> {
    self.map.lock().unwrap().remove(&(kind, id.to_string()));
    Ok(())
  }
}

/// Fixed set of remote objects; anything else fails to download.
#[derive(Default)]
pub struct StaticSource {
  objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl StaticSource {
  pub fn insert(&self, bucket: &str, path: &str, bytes: Vec<u8>) {
    self
      .objects
      .lock()
      .unwrap()
      .insert((bucket.to_string(), path.to_string()), bytes);
  }
}

#[async_trait]
impl BlobSource for StaticSource {
  async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
    self
      .objects
      .lock()
      .unwrap()
      .get(&(bucket.to_string(), path.to_string()))
      .cloned()
      .ok_or_else(|| RemoteError::Api(format!("object not found: {}/{}", bucket, path)))
  }
}

/// Minimal song row for tests.
pub fn sample_song(id: &str, title: &str) -> Song {
  let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
  Song {
    id: id.to_string(),
    title: title.to_string(),
    author: None,
    lyrics: None,
    category_id: None,
    file_path: None,
    audio_path: None,
    created_at: at,
    updated_at: at,
    categories: None,
  }
}

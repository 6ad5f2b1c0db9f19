//! Asynchronous block tier for downloaded binaries.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::debug;

use super::StoreError;

/// Which attachment slot a block belongs to. The two keyspaces are
/// independent: a song can have either, both, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
  SheetMusic,
  Audio,
}

impl BlobKind {
  pub const ALL: [BlobKind; 2] = [BlobKind::SheetMusic, BlobKind::Audio];

  fn dir(self) -> &'static str {
    match self {
      BlobKind::SheetMusic => "files",
      BlobKind::Audio => "audio",
    }
  }
}

/// Keyed block store holding binary payloads, one keyspace per kind.
#[async_trait]
pub trait BlobTier: Send + Sync {
  async fn put(&self, kind: BlobKind, id: &str, bytes: &[u8]) -> Result<(), StoreError>;
  async fn get(&self, kind: BlobKind, id: &str) -> Result<Option<Vec<u8>>, StoreError>;
  async fn remove(&self, kind: BlobKind, id: &str) -> Result<(), StoreError>;
}

const VERSION_FILE: &str = "VERSION";
const VERSION: u32 = 2;

/// Directory-per-kind filesystem block store.
///
/// The layout is versioned: version 1 only had the sheet-music keyspace,
/// version 2 added `audio/`. Opening is lazy (first blob operation) and
/// upgrades an older layout in place, keeping existing blocks.
pub struct FsBlobTier {
  root: PathBuf,
  opened: OnceCell<()>,
}

impl FsBlobTier {
  pub fn new(root: PathBuf) -> Self {
    Self {
      root,
      opened: OnceCell::new(),
    }
  }

  async fn ensure_open(&self) -> Result<(), StoreError> {
    self
      .opened
      .get_or_try_init(|| async {
        let marker = self.root.join(VERSION_FILE);
        let prior = match tokio::fs::read_to_string(&marker).await {
          Ok(s) => s.trim().parse::<u32>().ok(),
          Err(_) => None,
        };

        for kind in BlobKind::ALL {
          tokio::fs::create_dir_all(self.root.join(kind.dir())).await?;
        }

        if prior != Some(VERSION) {
          tokio::fs::write(&marker, VERSION.to_string()).await?;
          if let Some(from) = prior {
            debug!(from, to = VERSION, "upgraded block store layout");
          }
        }
        Ok::<_, StoreError>(())
      })
      .await
      .map(|_| ())
  }

  /// Blocks are stored under stable fixed-length names; ids are never used
  /// as raw path components.
  fn path_for(&self, kind: BlobKind, id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    self.root.join(kind.dir()).join(hex::encode(hasher.finalize()))
  }
}

#[async_trait]
impl BlobTier for FsBlobTier {
  async fn put(&self, kind: BlobKind, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
    self.ensure_open().await?;
    tokio::fs::write(self.path_for(kind, id), bytes).await?;
    Ok(())
  }

  async fn get(&self, kind: BlobKind, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
    self.ensure_open().await?;
    match tokio::fs::read(self.path_for(kind, id)).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn remove(&self, kind: BlobKind, id: &str) -> Result<(), StoreError> {
    self.ensure_open().await?;
    match tokio::fs::remove_file(self.path_for(kind, id)).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("chorale-blobs-{}-{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&root);
    root
  }

  #[tokio::test]
  async fn test_roundtrip_per_kind() {
    let tier = FsBlobTier::new(temp_root("roundtrip"));

    tier.put(BlobKind::SheetMusic, "s1", b"pdf").await.unwrap();
    tier.put(BlobKind::Audio, "s1", b"mp3").await.unwrap();

    assert_eq!(
      tier.get(BlobKind::SheetMusic, "s1").await.unwrap().as_deref(),
      Some(b"pdf".as_slice())
    );
    assert_eq!(
      tier.get(BlobKind::Audio, "s1").await.unwrap().as_deref(),
      Some(b"mp3".as_slice())
    );
    assert_eq!(tier.get(BlobKind::SheetMusic, "other").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_kinds_are_independent() {
    let tier = FsBlobTier::new(temp_root("independent"));

    tier.put(BlobKind::SheetMusic, "s1", b"pdf").await.unwrap();
    assert_eq!(tier.get(BlobKind::Audio, "s1").await.unwrap(), None);

    tier.remove(BlobKind::SheetMusic, "s1").await.unwrap();
    assert_eq!(tier.get(BlobKind::SheetMusic, "s1").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_remove_missing_is_a_noop() {
    let tier = FsBlobTier::new(temp_root("remove-missing"));
    tier.remove(BlobKind::Audio, "never-stored").await.unwrap();
  }

  #[tokio::test]
  async fn test_upgrades_v1_layout_without_data_loss() {
    let root = temp_root("upgrade");

    // Simulate a version-1 store: sheet-music keyspace only.
    {
      let tier = FsBlobTier::new(root.clone());
      tier.put(BlobKind::SheetMusic, "s1", b"pdf").await.unwrap();
    }
    std::fs::remove_dir_all(root.join("audio")).unwrap();
    std::fs::write(root.join(VERSION_FILE), "1").unwrap();

    // A fresh handle upgrades in place on first use.
    let tier = FsBlobTier::new(root.clone());
    tier.put(BlobKind::Audio, "s1", b"mp3").await.unwrap();

    assert_eq!(
      tier.get(BlobKind::SheetMusic, "s1").await.unwrap().as_deref(),
      Some(b"pdf".as_slice())
    );
    assert_eq!(
      std::fs::read_to_string(root.join(VERSION_FILE)).unwrap().trim(),
      "2"
    );
  }
}

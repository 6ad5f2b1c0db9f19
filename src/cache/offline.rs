//! Facade over the two local tiers plus the remote blob source.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::remote::storage::{AUDIO_BUCKET, SHEET_MUSIC_BUCKET};
use crate::remote::types::Song;
use crate::remote::RemoteError;

use super::blobs::{BlobKind, BlobTier};
use super::meta::KvStore;

/// Key on the synchronous tier under which the cached-song collection is
/// persisted as one serialized array.
const CACHE_KEY: &str = "chorale_cached_songs";

/// Remote source of binary attachments, implemented by the blob-store
/// client. Separated out so the cache can be exercised without a network.
#[async_trait]
pub trait BlobSource: Send + Sync {
  async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError>;
}

/// A value copy of a song captured for offline use.
///
/// Binary payloads are not embedded; they live in the block tier keyed by
/// the song id, each independently of the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSong {
  #[serde(flatten)]
  pub song: Song,
  pub cached_at: DateTime<Utc>,
}

impl CachedSong {
  fn capture(song: &Song) -> Self {
    Self {
      song: song.clone(),
      cached_at: Utc::now(),
    }
  }
}

#[derive(Default)]
struct State {
  songs: Vec<CachedSong>,
  loaded: bool,
}

/// Owner of the on-device offline state.
///
/// Metadata lives as a single serialized collection on the synchronous
/// tier, binaries in the asynchronous block tier. All operations are
/// best-effort from the caller's perspective: failures are logged and
/// reported as `false`/`None`, never raised. Constructed once per session
/// and handed to consumers by reference; clones share the same state.
pub struct OfflineCache<S, K, B> {
  source: Arc<S>,
  kv: Arc<K>,
  blobs: Arc<B>,
  state: Arc<RwLock<State>>,
  online: watch::Receiver<bool>,
}

impl<S, K, B> OfflineCache<S, K, B>
where
  S: BlobSource,
  K: KvStore,
  B: BlobTier,
{
  /// `online` is a subscription to reachability transitions; it is held for
  /// the lifetime of this handle and dropped with it.
  pub fn new(source: Arc<S>, kv: Arc<K>, blobs: Arc<B>, online: watch::Receiver<bool>) -> Self {
    Self {
      source,
      kv,
      blobs,
      state: Arc::new(RwLock::new(State::default())),
      online,
    }
  }

  /// Load the persisted collection into memory.
  ///
  /// Until this has run, membership queries answer from an empty snapshot
  /// and `is_loaded` reports false. An unreadable index is discarded rather
  /// than surfaced.
  pub fn load(&self) {
    let songs = match self.kv.get(CACHE_KEY) {
      Ok(Some(raw)) => match serde_json::from_str(&raw) {
        Ok(songs) => songs,
        Err(e) => {
          warn!(error = %e, "discarding unreadable offline index");
          Vec::new()
        }
      },
      Ok(None) => Vec::new(),
      Err(e) => {
        warn!(error = %e, "failed to read offline index");
        Vec::new()
      }
    };

    if let Ok(mut state) = self.state.write() {
      state.songs = songs;
      state.loaded = true;
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.state.read().map(|s| s.loaded).unwrap_or(false)
  }

  /// Last observed reachability transition.
  pub fn is_online(&self) -> bool {
    *self.online.borrow()
  }

  /// Current snapshot, in insertion order of the persisted collection.
  pub fn cached_songs(&self) -> Vec<CachedSong> {
    self.state.read().map(|s| s.songs.clone()).unwrap_or_default()
  }

  pub fn cached_ids(&self) -> Vec<String> {
    self
      .state
      .read()
      .map(|s| s.songs.iter().map(|c| c.song.id.clone()).collect())
      .unwrap_or_default()
  }

  pub fn is_song_cached(&self, id: &str) -> bool {
    self
      .state
      .read()
      .map(|s| s.songs.iter().any(|c| c.song.id == id))
      .unwrap_or(false)
  }

  pub fn cached_song(&self, id: &str) -> Option<CachedSong> {
    self
      .state
      .read()
      .ok()
      .and_then(|s| s.songs.iter().find(|c| c.song.id == id).cloned())
  }

  /// Download a song for offline use.
  ///
  /// Attachments are fetched first; a failed download is tolerated and
  /// leaves that slot absent. The metadata snapshot is only persisted after
  /// every requested fetch has resolved. Returns false when a local write
  /// fails, in which case the in-memory snapshot is left untouched; block
  /// writes already performed are not rolled back.
  pub async fn cache_song(&self, song: &Song) -> bool {
    let sheet = match &song.file_path {
      Some(path) => self.fetch_attachment(SHEET_MUSIC_BUCKET, path).await,
      None => None,
    };
    let audio = match &song.audio_path {
      Some(path) => self.fetch_attachment(AUDIO_BUCKET, path).await,
      None => None,
    };

    let entry = CachedSong::capture(song);
    let next: Vec<CachedSong> = match self.state.read() {
      Ok(state) => state
        .songs
        .iter()
        .filter(|c| c.song.id != song.id)
        .cloned()
        .chain(std::iter::once(entry))
        .collect(),
      Err(_) => return false,
    };

    if !self.persist_index(&next) {
      return false;
    }

    if let Some(bytes) = sheet {
      if let Err(e) = self.blobs.put(BlobKind::SheetMusic, &song.id, &bytes).await {
        error!(id = %song.id, error = %e, "failed to store sheet-music block");
        return false;
      }
    }
    if let Some(bytes) = audio {
      if let Err(e) = self.blobs.put(BlobKind::Audio, &song.id, &bytes).await {
        error!(id = %song.id, error = %e, "failed to store audio block");
        return false;
      }
    }

    if let Ok(mut state) = self.state.write() {
      state.songs = next;
    }
    true
  }

  /// Drop a song from the offline set. Block deletions are best-effort; a
  /// missing entry is a no-op.
  pub async fn remove_song(&self, id: &str) {
    let next: Vec<CachedSong> = match self.state.read() {
      Ok(state) => {
        if !state.songs.iter().any(|c| c.song.id == id) {
          return;
        }
        state.songs.iter().filter(|c| c.song.id != id).cloned().collect()
      }
      Err(_) => return,
    };

    if !self.persist_index(&next) {
      return;
    }

    for kind in BlobKind::ALL {
      if let Err(e) = self.blobs.remove(kind, id).await {
        warn!(id, ?kind, error = %e, "failed to delete cached block");
      }
    }

    if let Ok(mut state) = self.state.write() {
      state.songs = next;
    }
  }

  /// Cached sheet-music payload, absent on any failure.
  pub async fn sheet_blob(&self, id: &str) -> Option<Vec<u8>> {
    self.read_blob(BlobKind::SheetMusic, id).await
  }

  /// Cached audio payload, absent on any failure.
  pub async fn audio_blob(&self, id: &str) -> Option<Vec<u8>> {
    self.read_blob(BlobKind::Audio, id).await
  }

  async fn read_blob(&self, kind: BlobKind, id: &str) -> Option<Vec<u8>> {
    match self.blobs.get(kind, id).await {
      Ok(bytes) => bytes,
      Err(e) => {
        debug!(id, ?kind, error = %e, "cached block unavailable");
        None
      }
    }
  }

  async fn fetch_attachment(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
    match self.source.fetch(bucket, path).await {
      Ok(bytes) => Some(bytes),
      Err(e) => {
        warn!(bucket, path, error = %e, "attachment download failed, keeping song without it");
        None
      }
    }
  }

  fn persist_index(&self, songs: &[CachedSong]) -> bool {
    let encoded = match serde_json::to_string(songs) {
      Ok(s) => s,
      Err(e) => {
        error!(error = %e, "failed to encode offline index");
        return false;
      }
    };
    if let Err(e) = self.kv.set(CACHE_KEY, &encoded) {
      error!(error = %e, "failed to persist offline index");
      return false;
    }
    true
  }
}

impl<S, K, B> Clone for OfflineCache<S, K, B> {
  fn clone(&self) -> Self {
    Self {
      source: Arc::clone(&self.source),
      kv: Arc::clone(&self.kv),
      blobs: Arc::clone(&self.blobs),
      state: Arc::clone(&self.state),
      online: self.online.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{sample_song, MemoryBlobs, MemoryKv, StaticSource};

  type TestCache = OfflineCache<StaticSource, MemoryKv, MemoryBlobs>;

  fn cache_with(
    source: StaticSource,
  ) -> (TestCache, Arc<MemoryKv>, Arc<MemoryBlobs>, watch::Sender<bool>) {
    let kv = Arc::new(MemoryKv::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let (tx, rx) = watch::channel(true);
    let cache = OfflineCache::new(Arc::new(source), Arc::clone(&kv), Arc::clone(&blobs), rx);
    cache.load();
    (cache, kv, blobs, tx)
  }

  #[tokio::test]
  async fn test_cache_song_without_attachments() {
    let (cache, _kv, _blobs, _tx) = cache_with(StaticSource::default());
    let song = sample_song("s1", "Gloria");

    assert!(cache.cache_song(&song).await);
    assert!(cache.is_song_cached("s1"));
    assert_eq!(cache.cached_songs().len(), 1);
    assert_eq!(cache.sheet_blob("s1").await, None);
    assert_eq!(cache.audio_blob("s1").await, None);
  }

  #[tokio::test]
  async fn test_cache_song_stores_both_attachments() {
    let source = StaticSource::default();
    source.insert(SHEET_MUSIC_BUCKET, "g.pdf", b"pdf".to_vec());
    source.insert(AUDIO_BUCKET, "g.mp3", b"mp3".to_vec());
    let (cache, _kv, _blobs, _tx) = cache_with(source);

    let mut song = sample_song("s1", "Gloria");
    song.file_path = Some("g.pdf".to_string());
    song.audio_path = Some("g.mp3".to_string());

    assert!(cache.cache_song(&song).await);
    assert_eq!(cache.sheet_blob("s1").await.as_deref(), Some(b"pdf".as_slice()));
    assert_eq!(cache.audio_blob("s1").await.as_deref(), Some(b"mp3".as_slice()));
  }

  #[tokio::test]
  async fn test_failed_attachment_download_is_tolerated() {
    // Sheet path points at a missing object: the download fails but the
    // song is still captured for offline use.
    let (cache, _kv, _blobs, _tx) = cache_with(StaticSource::default());
    let mut song = sample_song("s1", "Gloria");
    song.file_path = Some("a.pdf".to_string());

    assert!(cache.cache_song(&song).await);
    assert!(cache.is_song_cached("s1"));
    assert_eq!(cache.sheet_blob("s1").await, None);
  }

  #[tokio::test]
  async fn test_partial_attachment_failure_keeps_the_other() {
    let source = StaticSource::default();
    source.insert(SHEET_MUSIC_BUCKET, "g.pdf", b"pdf".to_vec());
    let (cache, _kv, _blobs, _tx) = cache_with(source);

    let mut song = sample_song("s1", "Gloria");
    song.file_path = Some("g.pdf".to_string());
    song.audio_path = Some("missing.mp3".to_string());

    assert!(cache.cache_song(&song).await);
    assert_eq!(cache.sheet_blob("s1").await.as_deref(), Some(b"pdf".as_slice()));
    assert_eq!(cache.audio_blob("s1").await, None);
  }

  #[tokio::test]
  async fn test_remove_clears_membership_and_blobs() {
    let source = StaticSource::default();
    source.insert(SHEET_MUSIC_BUCKET, "g.pdf", b"pdf".to_vec());
    source.insert(AUDIO_BUCKET, "g.mp3", b"mp3".to_vec());
    let (cache, _kv, _blobs, _tx) = cache_with(source);

    let mut song = sample_song("s1", "Gloria");
    song.file_path = Some("g.pdf".to_string());
    song.audio_path = Some("g.mp3".to_string());
    cache.cache_song(&song).await;

    cache.remove_song("s1").await;
    assert!(!cache.is_song_cached("s1"));
    assert_eq!(cache.cached_song("s1"), None);
    assert_eq!(cache.sheet_blob("s1").await, None);
    assert_eq!(cache.audio_blob("s1").await, None);
  }

  #[tokio::test]
  async fn test_remove_missing_is_a_noop() {
    let (cache, kv, _blobs, _tx) = cache_with(StaticSource::default());
    cache.cache_song(&sample_song("s1", "Gloria")).await;

    cache.remove_song("other").await;
    assert_eq!(cache.cached_songs().len(), 1);
    assert!(kv.get(CACHE_KEY).unwrap().is_some());
  }

  #[tokio::test]
  async fn test_recache_replaces_instead_of_duplicating() {
    let (cache, _kv, _blobs, _tx) = cache_with(StaticSource::default());
    let mut song = sample_song("s1", "Gloria");

    cache.cache_song(&song).await;
    song.title = "Gloria (rev)".to_string();
    cache.cache_song(&song).await;

    let cached = cache.cached_songs();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].song.title, "Gloria (rev)");
  }

  #[tokio::test]
  async fn test_snapshot_keeps_insertion_order() {
    let (cache, _kv, _blobs, _tx) = cache_with(StaticSource::default());
    cache.cache_song(&sample_song("s1", "Gloria")).await;
    cache.cache_song(&sample_song("s2", "Sanctus")).await;
    // Re-caching moves the entry to the end, last write wins.
    cache.cache_song(&sample_song("s1", "Gloria")).await;

    let ids: Vec<_> = cache.cached_songs().into_iter().map(|c| c.song.id).collect();
    assert_eq!(ids, ["s2", "s1"]);
  }

  #[tokio::test]
  async fn test_index_write_failure_reports_false() {
    let (cache, kv, _blobs, _tx) = cache_with(StaticSource::default());
    kv.fail_writes(true);

    assert!(!cache.cache_song(&sample_song("s1", "Gloria")).await);
    assert!(!cache.is_song_cached("s1"));
  }

  #[tokio::test]
  async fn test_block_write_failure_reports_false() {
    let source = StaticSource::default();
    source.insert(SHEET_MUSIC_BUCKET, "g.pdf", b"pdf".to_vec());
    let (cache, _kv, blobs, _tx) = cache_with(source);
    blobs.fail_puts(true);

    let mut song = sample_song("s1", "Gloria");
    song.file_path = Some("g.pdf".to_string());

    assert!(!cache.cache_song(&song).await);
    // The in-memory snapshot stays untouched on failure.
    assert!(!cache.is_song_cached("s1"));
  }

  #[tokio::test]
  async fn test_load_restores_persisted_snapshot() {
    let kv = Arc::new(MemoryKv::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let (_tx, rx) = watch::channel(true);

    let first: TestCache = OfflineCache::new(
      Arc::new(StaticSource::default()),
      Arc::clone(&kv),
      Arc::clone(&blobs),
      rx.clone(),
    );
    first.load();
    first.cache_song(&sample_song("s1", "Gloria")).await;

    let second: TestCache =
      OfflineCache::new(Arc::new(StaticSource::default()), kv, blobs, rx);
    assert!(!second.is_loaded());
    assert!(!second.is_song_cached("s1"));

    second.load();
    assert!(second.is_loaded());
    assert!(second.is_song_cached("s1"));
  }

  #[tokio::test]
  async fn test_corrupt_index_is_discarded() {
    let kv = Arc::new(MemoryKv::default());
    kv.set(CACHE_KEY, "not json").unwrap();
    let (_tx, rx) = watch::channel(true);
    let cache: TestCache = OfflineCache::new(
      Arc::new(StaticSource::default()),
      kv,
      Arc::new(MemoryBlobs::default()),
      rx,
    );

    cache.load();
    assert!(cache.is_loaded());
    assert!(cache.cached_songs().is_empty());
  }

  #[tokio::test]
  async fn test_is_online_follows_transitions() {
    let (cache, _kv, _blobs, tx) = cache_with(StaticSource::default());
    assert!(cache.is_online());

    tx.send(false).unwrap();
    assert!(!cache.is_online());

    tx.send(true).unwrap();
    assert!(cache.is_online());
  }
}

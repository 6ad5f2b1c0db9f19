//! Local storage for offline use.
//!
//! Two independent tiers behind one facade:
//! - a small synchronous key-value store ([`meta::KvStore`]) holding the
//!   cached-song collection and other scalar app state, and
//! - an asynchronous block store ([`blobs::BlobTier`]) holding downloaded
//!   binaries, one keyspace per attachment kind.
//!
//! [`offline::OfflineCache`] coordinates the two and tracks network
//! reachability; it is the only writer of the on-device state.

pub mod blobs;
pub mod meta;
pub mod offline;

pub use offline::{CachedSong, OfflineCache};

use thiserror::Error;

/// Error from a local store tier.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store unavailable: {0}")]
  Unavailable(String),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),
}

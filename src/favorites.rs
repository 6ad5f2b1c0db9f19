//! Favorite songs, a local id set on the synchronous tier.

use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::cache::meta::KvStore;

const FAVORITES_KEY: &str = "chorale_favorites";

/// Local set of favorite song ids. Same tier as the offline index, no
/// binary payloads involved.
pub struct Favorites<K> {
  kv: Arc<K>,
  ids: Arc<RwLock<Vec<String>>>,
}

impl<K: KvStore> Favorites<K> {
  pub fn new(kv: Arc<K>) -> Self {
    Self {
      kv,
      ids: Arc::new(RwLock::new(Vec::new())),
    }
  }

  /// Load the persisted set; an unreadable one is discarded.
  pub fn load(&self) {
    let ids = match self.kv.get(FAVORITES_KEY) {
      Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "discarding unreadable favorites");
        Vec::new()
      }),
      Ok(None) => Vec::new(),
      Err(e) => {
        warn!(error = %e, "failed to read favorites");
        Vec::new()
      }
    };
    if let Ok(mut current) = self.ids.write() {
      *current = ids;
    }
  }

  /// Flip membership for a song id; returns whether it is now a favorite.
  /// The change is dropped if it cannot be persisted.
  pub fn toggle(&self, id: &str) -> bool {
    let (next, now_favorite) = match self.ids.read() {
      Ok(ids) => {
        if ids.iter().any(|f| f == id) {
          (ids.iter().filter(|f| *f != id).cloned().collect::<Vec<_>>(), false)
        } else {
          let mut next = ids.clone();
          next.push(id.to_string());
          (next, true)
        }
      }
      Err(_) => return false,
    };

    let encoded = match serde_json::to_string(&next) {
      Ok(s) => s,
      Err(e) => {
        warn!(error = %e, "failed to encode favorites");
        return !now_favorite;
      }
    };
    if let Err(e) = self.kv.set(FAVORITES_KEY, &encoded) {
      warn!(error = %e, "failed to persist favorites");
      return !now_favorite;
    }

    if let Ok(mut current) = self.ids.write() {
      *current = next;
    }
    now_favorite
  }

  pub fn is_favorite(&self, id: &str) -> bool {
    self
      .ids
      .read()
      .map(|ids| ids.iter().any(|f| f == id))
      .unwrap_or(false)
  }

  pub fn ids(&self) -> Vec<String> {
    self.ids.read().map(|ids| ids.clone()).unwrap_or_default()
  }
}

impl<K> Clone for Favorites<K> {
  fn clone(&self) -> Self {
    Self {
      kv: Arc::clone(&self.kv),
      ids: Arc::clone(&self.ids),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::MemoryKv;

  #[test]
  fn test_toggle_flips_membership() {
    let favorites = Favorites::new(Arc::new(MemoryKv::default()));
    favorites.load();

    assert!(favorites.toggle("s1"));
    assert!(favorites.is_favorite("s1"));
    assert!(!favorites.toggle("s1"));
    assert!(!favorites.is_favorite("s1"));
  }

  #[test]
  fn test_persists_across_handles() {
    let kv = Arc::new(MemoryKv::default());
    let first = Favorites::new(Arc::clone(&kv));
    first.load();
    first.toggle("s1");
    first.toggle("s2");

    let second = Favorites::new(kv);
    second.load();
    assert_eq!(second.ids(), ["s1", "s2"]);
  }

  #[test]
  fn test_failed_persist_drops_the_change() {
    let kv = Arc::new(MemoryKv::default());
    let favorites = Favorites::new(Arc::clone(&kv));
    favorites.load();

    kv.fail_writes(true);
    assert!(!favorites.toggle("s1"));
    assert!(!favorites.is_favorite("s1"));
  }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A song category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
}

/// A song row as served by the record store, with the category row embedded
/// for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
  pub id: String,
  pub title: String,
  pub author: Option<String>,
  pub lyrics: Option<String>,
  pub category_id: Option<String>,
  /// Sheet-music object path in the blob store, when one was uploaded.
  pub file_path: Option<String>,
  /// Audio object path in the blob store, when one was uploaded.
  pub audio_path: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub categories: Option<Category>,
}

impl Song {
  pub fn category_name(&self) -> Option<&str> {
    self.categories.as_ref().map(|c| c.name.as_str())
  }
}

/// Fields accepted when creating a song.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewSong {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub lyrics: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub audio_path: Option<String>,
}

/// Partial song update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SongUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub lyrics: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_path: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub audio_path: Option<Option<String>>,
}

/// Admin role level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Admin,
  SuperAdmin,
}

/// An admin-role row.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminRole {
  pub id: String,
  pub user_id: String,
  pub role: Role,
  pub created_at: DateTime<Utc>,
}

/// Daily usage counters tracked by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
  PageViews,
  UniqueVisitors,
  SongsViewed,
  Downloads,
}

impl StatName {
  pub fn as_str(self) -> &'static str {
    match self {
      StatName::PageViews => "page_views",
      StatName::UniqueVisitors => "unique_visitors",
      StatName::SongsViewed => "songs_viewed",
      StatName::Downloads => "downloads",
    }
  }
}

/// One day of usage counters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyStats {
  pub stat_date: NaiveDate,
  pub page_views: i64,
  pub unique_visitors: i64,
  pub songs_viewed: i64,
  pub downloads: i64,
}

/// Everything the dashboard shows in one fetch.
#[derive(Debug, Clone, Default)]
pub struct StatsOverview {
  pub total_songs: u64,
  pub total_categories: u64,
  pub total_admins: u64,
  pub today: Option<DailyStats>,
  pub weekly: Vec<DailyStats>,
}

impl StatsOverview {
  pub fn today_views(&self) -> i64 {
    self.today.as_ref().map(|d| d.page_views).unwrap_or(0)
  }

  pub fn today_downloads(&self) -> i64 {
    self.today.as_ref().map(|d| d.downloads).unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_song_row_with_embedded_category() {
    let raw = r#"{
      "id": "s1",
      "title": "Gloria",
      "author": "Vivaldi",
      "lyrics": null,
      "category_id": "c1",
      "file_path": "gloria.pdf",
      "audio_path": null,
      "created_at": "2026-01-02T03:04:05Z",
      "updated_at": "2026-01-02T03:04:05Z",
      "categories": { "id": "c1", "name": "Messe", "created_at": "2026-01-01T00:00:00Z" }
    }"#;

    let song: Song = serde_json::from_str(raw).unwrap();
    assert_eq!(song.title, "Gloria");
    assert_eq!(song.category_name(), Some("Messe"));
    assert_eq!(song.file_path.as_deref(), Some("gloria.pdf"));
    assert_eq!(song.audio_path, None);
  }

  #[test]
  fn test_song_row_without_category() {
    let raw = r#"{
      "id": "s2",
      "title": "Ave Maria",
      "author": null,
      "lyrics": "Ave Maria, gratia plena",
      "category_id": null,
      "file_path": null,
      "audio_path": null,
      "created_at": "2026-01-02T03:04:05Z",
      "updated_at": "2026-01-02T03:04:05Z"
    }"#;

    let song: Song = serde_json::from_str(raw).unwrap();
    assert_eq!(song.category_name(), None);
  }

  #[test]
  fn test_stat_name_wire_format() {
    assert_eq!(
      serde_json::to_string(&StatName::UniqueVisitors).unwrap(),
      "\"unique_visitors\""
    );
    assert_eq!(StatName::Downloads.as_str(), "downloads");
  }

  #[test]
  fn test_new_song_skips_absent_fields() {
    let draft = NewSong {
      title: "Sanctus".to_string(),
      ..Default::default()
    };
    assert_eq!(serde_json::to_string(&draft).unwrap(), r#"{"title":"Sanctus"}"#);
  }

  #[test]
  fn test_song_update_can_clear_category() {
    let update = SongUpdate {
      category_id: Some(None),
      ..Default::default()
    };
    assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"category_id":null}"#);
  }

  #[test]
  fn test_role_wire_format() {
    let role: Role = serde_json::from_str("\"super_admin\"").unwrap();
    assert_eq!(role, Role::SuperAdmin);
  }
}

//! Record-store client: songs, categories, admin roles and usage stats over
//! a PostgREST-style row API.

use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use tracing::debug;
use url::Url;

use crate::search::SearchText;

use super::storage::{StorageClient, AUDIO_BUCKET, SHEET_MUSIC_BUCKET};
use super::types::{
  AdminRole, Category, DailyStats, NewSong, Song, SongUpdate, StatName, StatsOverview,
};
use super::{parse_base, send_checked, Reachability, RemoteError};

/// Client for the tabular record store.
///
/// Reads go out with the service api key; after an admin signs in the
/// session token takes over so row-level permissions apply.
#[derive(Clone)]
pub struct RecordClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  session: Arc<RwLock<Option<String>>>,
  net: Reachability,
}

impl RecordClient {
  pub fn new(url: &str, api_key: String, net: Reachability) -> Result<Self, RemoteError> {
    Ok(Self {
      http: reqwest::Client::new(),
      base: parse_base(url)?,
      api_key,
      session: Arc::new(RwLock::new(None)),
      net,
    })
  }

  /// Attach (or clear) an admin session token for subsequent requests.
  pub fn set_session(&self, token: Option<String>) {
    if let Ok(mut session) = self.session.write() {
      *session = token;
    }
  }

  fn table_url(&self, table: &str, query: &[(String, String)]) -> Result<Url, RemoteError> {
    let mut url = self
      .base
      .join(&format!("rest/v1/{}", table))
      .map_err(|e| RemoteError::Api(e.to_string()))?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
  }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    let token = self
      .session
      .read()
      .ok()
      .and_then(|s| s.clone())
      .unwrap_or_else(|| self.api_key.clone());
    req.header("apikey", &self.api_key).bearer_auth(token)
  }

  async fn get_rows<T: serde::de::DeserializeOwned>(
    &self,
    table: &str,
    query: &[(String, String)],
  ) -> Result<Vec<T>, RemoteError> {
    let url = self.table_url(table, query)?;
    let resp = send_checked(&self.net, self.authed(self.http.get(url))).await?;
    resp.json().await.map_err(RemoteError::from)
  }

  // ---- songs -------------------------------------------------------------

  /// List songs ordered by title, optionally filtered by category and by a
  /// validated search over title/author/lyrics.
  pub async fn songs(
    &self,
    category: Option<&str>,
    search: Option<&SearchText>,
  ) -> Result<Vec<Song>, RemoteError> {
    self.get_rows("songs", &songs_query(category, search)).await
  }

  /// Point lookup with the category row embedded.
  pub async fn song(&self, id: &str) -> Result<Song, RemoteError> {
    let query = vec![
      ("select".to_string(), "*,categories(*)".to_string()),
      ("id".to_string(), format!("eq.{}", id)),
      ("limit".to_string(), "1".to_string()),
    ];
    self
      .get_rows::<Song>("songs", &query)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| RemoteError::Api(format!("song not found: {}", id)))
  }

  pub async fn create_song(&self, draft: &NewSong) -> Result<Song, RemoteError> {
    if draft.title.trim().is_empty() {
      return Err(RemoteError::Validation("a song needs a title".to_string()));
    }
    let url = self.table_url("songs", &[])?;
    let resp = send_checked(
      &self.net,
      self
        .authed(self.http.post(url))
        .header("Prefer", "return=representation")
        .json(draft),
    )
    .await?;
    let mut rows: Vec<Song> = resp.json().await.map_err(RemoteError::from)?;
    rows
      .pop()
      .ok_or_else(|| RemoteError::Api("create returned no row".to_string()))
  }

  pub async fn update_song(&self, id: &str, update: &SongUpdate) -> Result<Song, RemoteError> {
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
      return Err(RemoteError::Validation("a song needs a title".to_string()));
    }
    let query = vec![("id".to_string(), format!("eq.{}", id))];
    let url = self.table_url("songs", &query)?;
    let resp = send_checked(
      &self.net,
      self
        .authed(self.http.patch(url))
        .header("Prefer", "return=representation")
        .json(update),
    )
    .await?;
    let mut rows: Vec<Song> = resp.json().await.map_err(RemoteError::from)?;
    rows
      .pop()
      .ok_or_else(|| RemoteError::Api(format!("song not found: {}", id)))
  }

  /// Delete a song, removing its uploaded attachments first. Attachment
  /// cleanup is best-effort; the row delete is not.
  pub async fn delete_song(&self, id: &str, files: &StorageClient) -> Result<(), RemoteError> {
    let song = self.song(id).await?;
    if let Some(path) = song.file_path.as_deref() {
      files.remove_quietly(SHEET_MUSIC_BUCKET, &[path]).await;
    }
    if let Some(path) = song.audio_path.as_deref() {
      files.remove_quietly(AUDIO_BUCKET, &[path]).await;
    }

    let query = vec![("id".to_string(), format!("eq.{}", id))];
    let url = self.table_url("songs", &query)?;
    send_checked(&self.net, self.authed(self.http.delete(url))).await?;
    Ok(())
  }

  // ---- categories --------------------------------------------------------

  pub async fn categories(&self) -> Result<Vec<Category>, RemoteError> {
    let query = vec![
      ("select".to_string(), "*".to_string()),
      ("order".to_string(), "name.asc".to_string()),
    ];
    self.get_rows("categories", &query).await
  }

  pub async fn create_category(&self, name: &str) -> Result<Category, RemoteError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(RemoteError::Validation("a category needs a name".to_string()));
    }
    let url = self.table_url("categories", &[])?;
    let resp = send_checked(
      &self.net,
      self
        .authed(self.http.post(url))
        .header("Prefer", "return=representation")
        .json(&serde_json::json!({ "name": name })),
    )
    .await?;
    let mut rows: Vec<Category> = resp.json().await.map_err(RemoteError::from)?;
    rows
      .pop()
      .ok_or_else(|| RemoteError::Api("create returned no row".to_string()))
  }

  pub async fn rename_category(&self, id: &str, name: &str) -> Result<Category, RemoteError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(RemoteError::Validation("a category needs a name".to_string()));
    }
    let query = vec![("id".to_string(), format!("eq.{}", id))];
    let url = self.table_url("categories", &query)?;
    let resp = send_checked(
      &self.net,
      self
        .authed(self.http.patch(url))
        .header("Prefer", "return=representation")
        .json(&serde_json::json!({ "name": name })),
    )
    .await?;
    let mut rows: Vec<Category> = resp.json().await.map_err(RemoteError::from)?;
    rows
      .pop()
      .ok_or_else(|| RemoteError::Api(format!("category not found: {}", id)))
  }

  /// Delete a category, refusing while songs still reference it.
  pub async fn delete_category(&self, id: &str) -> Result<(), RemoteError> {
    #[derive(serde::Deserialize)]
    struct IdRow {
      #[allow(dead_code)]
      id: String,
    }

    let query = vec![
      ("select".to_string(), "id".to_string()),
      ("category_id".to_string(), format!("eq.{}", id)),
      ("limit".to_string(), "1".to_string()),
    ];
    let referencing: Vec<IdRow> = self.get_rows("songs", &query).await?;
    if !referencing.is_empty() {
      return Err(RemoteError::CategoryInUse);
    }

    let query = vec![("id".to_string(), format!("eq.{}", id))];
    let url = self.table_url("categories", &query)?;
    send_checked(&self.net, self.authed(self.http.delete(url))).await?;
    Ok(())
  }

  // ---- admin roles -------------------------------------------------------

  pub async fn admin_roles(&self) -> Result<Vec<AdminRole>, RemoteError> {
    let query = vec![
      ("select".to_string(), "*".to_string()),
      ("order".to_string(), "created_at.asc".to_string()),
    ];
    self.get_rows("user_roles", &query).await
  }

  pub async fn delete_admin_role(&self, id: &str) -> Result<(), RemoteError> {
    let query = vec![("id".to_string(), format!("eq.{}", id))];
    let url = self.table_url("user_roles", &query)?;
    send_checked(&self.net, self.authed(self.http.delete(url))).await?;
    Ok(())
  }

  // ---- counts and stats --------------------------------------------------

  async fn count(&self, table: &str) -> Result<u64, RemoteError> {
    let query = vec![("select".to_string(), "*".to_string())];
    let url = self.table_url(table, &query)?;
    let resp = send_checked(
      &self.net,
      self.authed(self.http.head(url)).header("Prefer", "count=exact"),
    )
    .await?;
    resp
      .headers()
      .get(reqwest::header::CONTENT_RANGE)
      .and_then(|v| v.to_str().ok())
      .and_then(parse_content_range)
      .ok_or_else(|| RemoteError::Api(format!("no row count for {}", table)))
  }

  /// One-way daily-stat increment. Fire-and-forget: the call is spawned and
  /// a failure is logged, never reported.
  pub fn record_stat(&self, stat: StatName) {
    let client = self.clone();
    tokio::spawn(async move {
      if let Err(e) = client.increment_stat(stat).await {
        debug!(stat = stat.as_str(), error = %e, "stat increment dropped");
      }
    });
  }

  async fn increment_stat(&self, stat: StatName) -> Result<(), RemoteError> {
    let url = self
      .base
      .join("rest/v1/rpc/increment_stat")
      .map_err(|e| RemoteError::Api(e.to_string()))?;
    send_checked(
      &self.net,
      self
        .authed(self.http.post(url))
        .json(&serde_json::json!({ "stat_name": stat })),
    )
    .await?;
    Ok(())
  }

  async fn daily_stats_since(&self, days_back: i64) -> Result<Vec<DailyStats>, RemoteError> {
    let since = Utc::now().date_naive() - Duration::days(days_back);
    let query = vec![
      ("select".to_string(), "*".to_string()),
      ("stat_date".to_string(), format!("gte.{}", since)),
      ("order".to_string(), "stat_date.asc".to_string()),
    ];
    self.get_rows("admin_stats", &query).await
  }

  /// Everything the dashboard needs in one call: row counts, today's
  /// counters, and the trailing week.
  pub async fn stats_overview(&self) -> Result<StatsOverview, RemoteError> {
    let total_songs = self.count("songs").await?;
    let total_categories = self.count("categories").await?;
    let total_admins = self.count("user_roles").await?;
    let weekly = self.daily_stats_since(7).await?;

    let today = Utc::now().date_naive();
    let today = weekly.iter().find(|d| d.stat_date == today).cloned();

    Ok(StatsOverview {
      total_songs,
      total_categories,
      total_admins,
      today,
      weekly,
    })
  }
}

/// Query string for the song list: category equality plus a sanitized
/// fuzzy match over title, author and lyrics.
fn songs_query(category: Option<&str>, search: Option<&SearchText>) -> Vec<(String, String)> {
  let mut query = vec![
    ("select".to_string(), "*,categories(*)".to_string()),
    ("order".to_string(), "title.asc".to_string()),
  ];
  if let Some(id) = category {
    query.push(("category_id".to_string(), format!("eq.{}", id)));
  }
  if let Some(search) = search {
    let pattern = search.like_pattern();
    query.push((
      "or".to_string(),
      format!(
        "(title.ilike.{p},author.ilike.{p},lyrics.ilike.{p})",
        p = pattern
      ),
    ));
  }
  query
}

fn parse_content_range(value: &str) -> Option<u64> {
  value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_songs_query_without_filters() {
    let query = songs_query(None, None);
    assert_eq!(
      query,
      vec![
        ("select".to_string(), "*,categories(*)".to_string()),
        ("order".to_string(), "title.asc".to_string()),
      ]
    );
  }

  #[test]
  fn test_songs_query_with_category_and_search() {
    let search = SearchText::parse("ave").unwrap();
    let query = songs_query(Some("c1"), Some(&search));

    assert!(query.contains(&("category_id".to_string(), "eq.c1".to_string())));
    assert!(query.contains(&(
      "or".to_string(),
      "(title.ilike.%ave%,author.ilike.%ave%,lyrics.ilike.%ave%)".to_string()
    )));
  }

  #[test]
  fn test_parse_content_range() {
    assert_eq!(parse_content_range("*/42"), Some(42));
    assert_eq!(parse_content_range("0-24/3573"), Some(3573));
    assert_eq!(parse_content_range("*/*"), None);
    assert_eq!(parse_content_range("garbage"), None);
  }
}

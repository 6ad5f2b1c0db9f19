use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::cache::blobs::{BlobKind, BlobTier, FsBlobTier};
use crate::cache::meta::{KvStore, SqliteKv};
use crate::cache::offline::BlobSource;
use crate::cache::{CachedSong, OfflineCache};
use crate::commands::{self, Command};
use crate::config::Config;
use crate::event::{DataEvent, Event, EventHandler};
use crate::favorites::Favorites;
use crate::remote::client::RecordClient;
use crate::remote::storage::{StorageClient, AUDIO_BUCKET, SHEET_MUSIC_BUCKET};
use crate::remote::types::{Category, Song, StatName, StatsOverview};
use crate::remote::{Reachability, RemoteError};
use crate::search::{matches_filters, SearchText};
use crate::ui;

/// Key under which the last-visit date is kept for unique-visitor tracking.
const LAST_VISIT_KEY: &str = "chorale_last_visit";

/// The concrete cache wiring used by the app.
pub type SongCache = OfflineCache<StorageClient, SqliteKv, FsBlobTier>;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
  Search,
}

/// View state - each variant owns its data
#[derive(Debug)]
pub enum ViewState {
  // Root view (reset via :songs)
  SongList {
    songs: Vec<Song>,
    selected: usize,
    offline: bool,
    loading: bool,
  },

  // Pushed views
  SongDetail {
    song: Box<Song>,
    offline: bool,
  },
  CategoryList {
    categories: Vec<Category>,
    selected: usize,
    loading: bool,
  },
  Downloads {
    songs: Vec<CachedSong>,
    selected: usize,
  },
  FavoriteList {
    songs: Vec<Song>,
    selected: usize,
    loading: bool,
  },
  Dashboard {
    stats: Option<Box<StatsOverview>>,
    loading: bool,
  },
}

impl Default for ViewState {
  fn default() -> Self {
    ViewState::SongList {
      songs: Vec::new(),
      selected: 0,
      offline: false,
      loading: true,
    }
  }
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<ViewState>,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Search input buffer (after pressing /)
  search_input: String,

  /// Committed search filter; invalid input commits as "no filter"
  search: Option<SearchText>,

  /// Committed category filter
  category_id: Option<String>,
  category_label: Option<String>,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// One-line status notice
  notice: Option<String>,

  /// Application configuration
  config: Config,

  records: RecordClient,
  files: StorageClient,
  cache: SongCache,
  favorites: Favorites<SqliteKv>,
  kv: Arc<SqliteKv>,
  net: Reachability,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let net = Reachability::new(true);
    let api_key = Config::api_key()?;
    let records = RecordClient::new(&config.remote.url, api_key.clone(), net.clone())?;
    let files = StorageClient::new(&config.remote.url, api_key, net.clone())?;

    let data_dir = config.data_dir()?;
    let kv = Arc::new(SqliteKv::open(&data_dir.join("local.db"))?);
    let blobs = Arc::new(FsBlobTier::new(data_dir.join("blobs")));
    let cache = OfflineCache::new(
      Arc::new(files.clone()),
      Arc::clone(&kv),
      blobs,
      net.subscribe(),
    );
    cache.load();
    let favorites = Favorites::new(Arc::clone(&kv));
    favorites.load();

    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      view_stack: vec![ViewState::default()],
      mode: Mode::Normal,
      command_input: String::new(),
      search_input: String::new(),
      search: None,
      category_id: config.default_category.clone(),
      category_label: config.default_category.clone(),
      selected_suggestion: 0,
      notice: None,
      config,
      records,
      files,
      cache,
      favorites,
      kv,
      net,
      event_tx: tx,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Forward reachability transitions into the event loop; the
    // subscription lives exactly as long as this view does.
    let mut net_rx = self.net.subscribe();
    let net_tx = self.event_tx.clone();
    let net_watch = tokio::spawn(async move {
      while net_rx.changed().await.is_ok() {
        let online = *net_rx.borrow_and_update();
        if net_tx.send(Event::Net(online)).is_err() {
          break;
        }
      }
    });

    self.track_visit();
    self.reload_songs();

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup
    net_watch.abort();
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  /// Count the visit: a page view always, a unique visitor once per day.
  fn track_visit(&self) {
    self.records.record_stat(StatName::PageViews);

    let today = Utc::now().date_naive().to_string();
    let seen_today = matches!(self.kv.get(LAST_VISIT_KEY), Ok(Some(prev)) if prev == today);
    if !seen_today {
      self.records.record_stat(StatName::UniqueVisitors);
      if let Err(e) = self.kv.set(LAST_VISIT_KEY, &today) {
        warn!(error = %e, "failed to record visit date");
      }
    }
  }

  /// Reload the root song list, live when reachable, from the offline set
  /// otherwise.
  fn reload_songs(&mut self) {
    if let Some(ViewState::SongList { loading, .. }) = self.view_stack.first_mut() {
      *loading = true;
    }

    let tx = self.event_tx.clone();
    let category = self.category_id.clone();
    let search = self.search.clone();

    if self.cache.is_online() {
      let records = self.records.clone();
      let cache = self.cache.clone();
      tokio::spawn(async move {
        match records.songs(category.as_deref(), search.as_ref()).await {
          Ok(songs) => {
            let _ = tx.send(Event::Data(DataEvent::SongsLoaded { songs, offline: false }));
          }
          Err(RemoteError::Unreachable(_)) => {
            let songs = offline_songs(&cache, category.as_deref(), search.as_ref());
            let _ = tx.send(Event::Data(DataEvent::SongsLoaded { songs, offline: true }));
          }
          Err(e) => {
            let _ = tx.send(Event::Error(e.to_string()));
          }
        }
      });
    } else {
      let songs = offline_songs(&self.cache, category.as_deref(), search.as_ref());
      let _ = tx.send(Event::Data(DataEvent::SongsLoaded { songs, offline: true }));
    }
  }

  fn load_categories(&mut self) {
    self.view_stack.push(ViewState::CategoryList {
      categories: Vec::new(),
      selected: 0,
      loading: true,
    });

    let tx = self.event_tx.clone();
    if self.cache.is_online() {
      let records = self.records.clone();
      let cache = self.cache.clone();
      tokio::spawn(async move {
        match records.categories().await {
          Ok(categories) => {
            let _ = tx.send(Event::Data(DataEvent::CategoriesLoaded(categories)));
          }
          Err(RemoteError::Unreachable(_)) => {
            let _ = tx.send(Event::Data(DataEvent::CategoriesLoaded(offline_categories(
              &cache,
            ))));
          }
          Err(e) => {
            let _ = tx.send(Event::Error(e.to_string()));
          }
        }
      });
    } else {
      let _ = tx.send(Event::Data(DataEvent::CategoriesLoaded(offline_categories(
        &self.cache,
      ))));
    }
  }

  fn load_favorites(&mut self) {
    self.view_stack.push(ViewState::FavoriteList {
      songs: Vec::new(),
      selected: 0,
      loading: true,
    });

    let ids = self.favorites.ids();
    let tx = self.event_tx.clone();
    if self.cache.is_online() {
      let records = self.records.clone();
      let cache = self.cache.clone();
      tokio::spawn(async move {
        let songs = match records.songs(None, None).await {
          Ok(songs) => songs,
          Err(RemoteError::Unreachable(_)) => offline_songs(&cache, None, None),
          Err(e) => {
            let _ = tx.send(Event::Error(e.to_string()));
            return;
          }
        };
        let songs = songs.into_iter().filter(|s| ids.contains(&s.id)).collect();
        let _ = tx.send(Event::Data(DataEvent::FavoritesLoaded(songs)));
      });
    } else {
      let songs = offline_songs(&self.cache, None, None)
        .into_iter()
        .filter(|s| ids.contains(&s.id))
        .collect();
      let _ = tx.send(Event::Data(DataEvent::FavoritesLoaded(songs)));
    }
  }

  fn load_stats(&mut self) {
    self.view_stack.push(ViewState::Dashboard {
      stats: None,
      loading: true,
    });

    let records = self.records.clone();
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      match records.stats_overview().await {
        Ok(stats) => {
          let _ = tx.send(Event::Data(DataEvent::StatsLoaded(Box::new(stats))));
        }
        Err(e) => {
          let _ = tx.send(Event::Error(e.to_string()));
        }
      }
    });
  }

  fn open_downloads(&mut self) {
    self.view_stack.push(ViewState::Downloads {
      songs: self.cache.cached_songs(),
      selected: 0,
    });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {}
      Event::Data(data) => self.handle_data(data),
      Event::Net(online) => {
        self.notice = Some(if online {
          "Back online".to_string()
        } else {
          "Offline - showing downloaded songs".to_string()
        });
        self.reload_songs();
      }
      Event::Error(msg) => {
        self.notice = Some(msg);
        // A failed load should not leave a view stuck on its spinner.
        if let Some(view) = self.view_stack.last_mut() {
          match view {
            ViewState::SongList { loading, .. }
            | ViewState::CategoryList { loading, .. }
            | ViewState::FavoriteList { loading, .. }
            | ViewState::Dashboard { loading, .. } => *loading = false,
            _ => {}
          }
        }
      }
    }
  }

  fn handle_data(&mut self, data: DataEvent) {
    match data {
      DataEvent::SongsLoaded { songs, offline } => {
        if let Some(ViewState::SongList {
          songs: ref mut list,
          selected,
          offline: ref mut flag,
          loading,
        }) = self.view_stack.first_mut()
        {
          *selected = (*selected).min(songs.len().saturating_sub(1));
          *list = songs;
          *flag = offline;
          *loading = false;
        }
      }
      DataEvent::FavoritesLoaded(songs) => {
        if let Some(ViewState::FavoriteList {
          songs: ref mut list,
          selected,
          loading,
        }) = self.view_stack.last_mut()
        {
          *selected = (*selected).min(songs.len().saturating_sub(1));
          *list = songs;
          *loading = false;
        }
      }
      DataEvent::CategoriesLoaded(categories) => {
        if let Some(ViewState::CategoryList {
          categories: ref mut list,
          loading,
          ..
        }) = self.view_stack.last_mut()
        {
          *list = categories;
          *loading = false;
        }
      }
      DataEvent::StatsLoaded(overview) => {
        if let Some(ViewState::Dashboard { stats, loading }) = self.view_stack.last_mut() {
          *stats = Some(overview);
          *loading = false;
        }
      }
      DataEvent::SongCached { title, ok } => {
        self.notice = Some(if ok {
          format!("\"{}\" downloaded for offline use", title)
        } else {
          format!("Could not download \"{}\" - try again", title)
        });
        self.refresh_downloads_view();
      }
      DataEvent::SongRemoved(_) => {
        self.notice = Some("Removed from downloads".to_string());
        self.refresh_downloads_view();
      }
      DataEvent::AttachmentSaved(path) => {
        self.notice = Some(format!("Saved to {}", path.display()));
      }
    }
  }

  fn refresh_downloads_view(&mut self) {
    if let Some(ViewState::Downloads { songs, selected }) = self.view_stack.last_mut() {
      *songs = self.cache.cached_songs();
      *selected = (*selected).min(songs.len().saturating_sub(1));
    }
  }

  fn handle_key(&mut self, key: crossterm::event::KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
      Mode::Search => self.handle_search_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: crossterm::event::KeyEvent) {
    self.notice = None;
    match key.code {
      // Quit
      KeyCode::Char('q') => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Enter => self.enter_selected(),
      KeyCode::Esc => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else if self.category_id.is_some() || self.search.is_some() {
          self.category_id = None;
          self.category_label = None;
          self.search = None;
          self.search_input.clear();
          self.reload_songs();
        }
      }

      // Actions on the selected song
      KeyCode::Char('d') => {
        if let Some(song) = self.selected_song() {
          self.download_song(&song);
        }
      }
      KeyCode::Char('x') => {
        if let Some(song) = self.selected_song() {
          self.remove_download(&song.id);
        }
      }
      KeyCode::Char('f') => {
        if let Some(song) = self.selected_song() {
          let now = self.favorites.toggle(&song.id);
          self.notice = Some(if now {
            format!("\"{}\" added to favorites", song.title)
          } else {
            format!("\"{}\" removed from favorites", song.title)
          });
        }
      }
      KeyCode::Char('s') => {
        let song = match self.view_stack.last() {
          Some(ViewState::SongDetail { song, .. }) => Some((**song).clone()),
          _ => None,
        };
        if let Some(song) = song {
          self.export_sheet(&song);
        }
      }
      KeyCode::Char('a') => {
        let song = match self.view_stack.last() {
          Some(ViewState::SongDetail { song, .. }) => Some((**song).clone()),
          _ => None,
        };
        if let Some(song) = song {
          self.export_audio(&song);
        }
      }
      KeyCode::Char('r') => self.refresh_current_view(),
      KeyCode::Char('c') => self.load_categories(),

      // Mode switches
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Char('/') => {
        self.mode = Mode::Search;
        self.search_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: crossterm::event::KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn handle_search_mode_key(&mut self, key: crossterm::event::KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.search_input.clear();
      }
      KeyCode::Enter => {
        // Commit the filter; text failing validation means "no filter".
        self.search = SearchText::parse(&self.search_input);
        self.mode = Mode::Normal;
        self.view_stack.truncate(1);
        self.reload_songs();
      }
      KeyCode::Backspace => {
        self.search_input.pop();
      }
      KeyCode::Char(c) => {
        self.search_input.push(c);
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = if !suggestions.is_empty() && self.selected_suggestion < suggestions.len() {
      suggestions[self.selected_suggestion].name.to_string()
    } else {
      self.command_input.trim().to_lowercase()
    };

    match cmd.as_str() {
      "songs" => {
        self.view_stack.truncate(1);
        self.view_stack[0] = ViewState::default();
        self.reload_songs();
      }
      "categories" => self.load_categories(),
      "downloads" => self.open_downloads(),
      "favorites" => self.load_favorites(),
      "stats" => self.load_stats(),
      "quit" => {
        self.should_quit = true;
      }
      _ => {}
    }
    self.command_input.clear();
  }

  fn refresh_current_view(&mut self) {
    enum Target {
      Songs,
      Categories,
      Favorites,
      Stats,
      Downloads,
    }

    let target = match self.view_stack.last() {
      Some(ViewState::SongList { .. }) => Target::Songs,
      Some(ViewState::CategoryList { .. }) => Target::Categories,
      Some(ViewState::FavoriteList { .. }) => Target::Favorites,
      Some(ViewState::Dashboard { .. }) => Target::Stats,
      Some(ViewState::Downloads { .. }) => Target::Downloads,
      _ => return,
    };

    match target {
      Target::Songs => self.reload_songs(),
      Target::Categories => {
        self.view_stack.pop();
        self.load_categories();
      }
      Target::Favorites => {
        self.view_stack.pop();
        self.load_favorites();
      }
      Target::Stats => {
        self.view_stack.pop();
        self.load_stats();
      }
      Target::Downloads => self.refresh_downloads_view(),
    }
  }

  /// Song under the cursor in the current view, if any.
  fn selected_song(&self) -> Option<Song> {
    match self.view_stack.last()? {
      ViewState::SongList { songs, selected, .. }
      | ViewState::FavoriteList { songs, selected, .. } => songs.get(*selected).cloned(),
      ViewState::Downloads { songs, selected } => songs.get(*selected).map(|c| c.song.clone()),
      ViewState::SongDetail { song, .. } => Some((**song).clone()),
      _ => None,
    }
  }

  fn enter_selected(&mut self) {
    enum Action {
      Open(Song),
      Filter(Category),
    }

    let action = match self.view_stack.last() {
      Some(ViewState::SongList { songs, selected, .. })
      | Some(ViewState::FavoriteList { songs, selected, .. }) => {
        songs.get(*selected).cloned().map(Action::Open)
      }
      Some(ViewState::Downloads { songs, selected }) => {
        songs.get(*selected).map(|c| c.song.clone()).map(Action::Open)
      }
      Some(ViewState::CategoryList {
        categories,
        selected,
        ..
      }) => categories.get(*selected).cloned().map(Action::Filter),
      _ => None,
    };

    match action {
      Some(Action::Open(song)) => {
        self.records.record_stat(StatName::SongsViewed);
        let offline = !self.cache.is_online();
        // Offline, the downloaded copy is the authoritative one.
        let song = if offline && self.cache.is_song_cached(&song.id) {
          self.cache.cached_song(&song.id).map(|c| c.song).unwrap_or(song)
        } else {
          song
        };
        self.view_stack.push(ViewState::SongDetail {
          song: Box::new(song),
          offline,
        });
      }
      Some(Action::Filter(category)) => {
        self.category_id = Some(category.id);
        self.category_label = Some(category.name);
        self.view_stack.truncate(1);
        self.reload_songs();
      }
      None => {}
    }
  }

  fn download_song(&self, song: &Song) {
    let cache = self.cache.clone();
    let records = self.records.clone();
    let tx = self.event_tx.clone();
    let song = song.clone();

    tokio::spawn(async move {
      let ok = cache.cache_song(&song).await;
      if ok {
        records.record_stat(StatName::Downloads);
      }
      let _ = tx.send(Event::Data(DataEvent::SongCached {
        title: song.title,
        ok,
      }));
    });
  }

  fn remove_download(&self, id: &str) {
    let cache = self.cache.clone();
    let tx = self.event_tx.clone();
    let id = id.to_string();

    tokio::spawn(async move {
      cache.remove_song(&id).await;
      let _ = tx.send(Event::Data(DataEvent::SongRemoved(id)));
    });
  }

  fn export_sheet(&mut self, song: &Song) {
    match song.file_path.clone() {
      Some(path) => self.export_attachment(song.id.clone(), path, BlobKind::SheetMusic),
      None => self.notice = Some("No sheet music for this song".to_string()),
    }
  }

  fn export_audio(&mut self, song: &Song) {
    match song.audio_path.clone() {
      Some(path) => self.export_attachment(song.id.clone(), path, BlobKind::Audio),
      None => self.notice = Some("No recording for this song".to_string()),
    }
  }

  /// Save an attachment next to the user's other downloads, preferring the
  /// cached copy and falling back to the blob store.
  fn export_attachment(&mut self, id: String, path: String, kind: BlobKind) {
    let cache = self.cache.clone();
    let files = self.files.clone();
    let records = self.records.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let cached = match kind {
        BlobKind::SheetMusic => cache.sheet_blob(&id).await,
        BlobKind::Audio => cache.audio_blob(&id).await,
      };
      let bucket = match kind {
        BlobKind::SheetMusic => SHEET_MUSIC_BUCKET,
        BlobKind::Audio => AUDIO_BUCKET,
      };
      let bytes = match cached {
        Some(bytes) => Some(bytes),
        None => files.download(bucket, &path).await.ok(),
      };

      let Some(bytes) = bytes else {
        let _ = tx.send(Event::Error("Attachment unavailable".to_string()));
        return;
      };

      let name = path.rsplit('/').next().unwrap_or(&path);
      let dest = dirs::download_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name);
      match tokio::fs::write(&dest, &bytes).await {
        Ok(()) => {
          records.record_stat(StatName::Downloads);
          let _ = tx.send(Event::Data(DataEvent::AttachmentSaved(dest)));
        }
        Err(e) => {
          let _ = tx.send(Event::Error(format!("Could not save attachment: {}", e)));
        }
      }
    });
  }

  fn move_selection(&mut self, delta: i32) {
    if let Some(view) = self.view_stack.last_mut() {
      let (len, selected) = match view {
        ViewState::SongList { songs, selected, .. }
        | ViewState::FavoriteList { songs, selected, .. } => (songs.len(), selected),
        ViewState::CategoryList {
          categories,
          selected,
          ..
        } => (categories.len(), selected),
        ViewState::Downloads { songs, selected } => (songs.len(), selected),
        _ => return,
      };
      if len > 0 {
        *selected = (*selected as i32 + delta).rem_euclid(len as i32) as usize;
      }
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&ViewState> {
    self.view_stack.last()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn search_input(&self) -> &str {
    &self.search_input
  }

  pub fn active_search(&self) -> Option<&str> {
    self.search.as_ref().map(|s| s.as_str())
  }

  pub fn active_category(&self) -> Option<&str> {
    self.category_label.as_deref().or(self.category_id.as_deref())
  }

  pub fn title(&self) -> &str {
    self.config.title.as_deref().unwrap_or("Repertoire")
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }

  pub fn is_online(&self) -> bool {
    self.net.is_online()
  }

  pub fn cache(&self) -> &SongCache {
    &self.cache
  }

  pub fn favorites(&self) -> &Favorites<SqliteKv> {
    &self.favorites
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

/// Offline rendition of the song list: the cached subset matching the
/// active filters, title-ordered for parity with the live query.
fn offline_songs<S, K, B>(
  cache: &OfflineCache<S, K, B>,
  category: Option<&str>,
  search: Option<&SearchText>,
) -> Vec<Song>
where
  S: BlobSource,
  K: KvStore,
  B: BlobTier,
{
  if !cache.is_loaded() {
    cache.load();
  }
  let mut songs: Vec<Song> = cache
    .cached_songs()
    .into_iter()
    .map(|c| c.song)
    .filter(|s| matches_filters(s, category, search))
    .collect();
  songs.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
  songs
}

/// Categories represented in the offline set, deduplicated and name-sorted.
fn offline_categories<S, K, B>(cache: &OfflineCache<S, K, B>) -> Vec<Category>
where
  S: BlobSource,
  K: KvStore,
  B: BlobTier,
{
  let mut categories: Vec<Category> = Vec::new();
  for cached in cache.cached_songs() {
    if let Some(category) = cached.song.categories {
      if !categories.iter().any(|c| c.id == category.id) {
        categories.push(category);
      }
    }
  }
  categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
  categories
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{sample_song, MemoryBlobs, MemoryKv, StaticSource};
  use tokio::sync::watch;

  type TestCache = OfflineCache<StaticSource, MemoryKv, MemoryBlobs>;

  async fn cache_with_songs() -> TestCache {
    let (_tx, rx) = watch::channel(false);
    let cache: TestCache = OfflineCache::new(
      Arc::new(StaticSource::default()),
      Arc::new(MemoryKv::default()),
      Arc::new(MemoryBlobs::default()),
      rx,
    );
    cache.load();

    let mut gloria = sample_song("s1", "Gloria");
    gloria.category_id = Some("c1".to_string());
    gloria.lyrics = Some("et in terra pax".to_string());
    cache.cache_song(&gloria).await;

    let mut sanctus = sample_song("s2", "Sanctus");
    sanctus.category_id = Some("c2".to_string());
    cache.cache_song(&sanctus).await;

    cache.cache_song(&sample_song("s3", "Agnus Dei")).await;
    cache
  }

  fn titles(songs: &[Song]) -> Vec<&str> {
    songs.iter().map(|s| s.title.as_str()).collect()
  }

  #[tokio::test]
  async fn test_offline_songs_applies_filters_and_sorts() {
    let cache = cache_with_songs().await;

    let all = offline_songs(&cache, None, None);
    assert_eq!(titles(&all), ["Agnus Dei", "Gloria", "Sanctus"]);

    let by_category = offline_songs(&cache, Some("c1"), None);
    assert_eq!(titles(&by_category), ["Gloria"]);

    // Same matching semantics as the live query, lyrics included.
    let search = SearchText::parse("pax");
    let by_lyrics = offline_songs(&cache, None, search.as_ref());
    assert_eq!(titles(&by_lyrics), ["Gloria"]);

    let none = offline_songs(&cache, Some("c1"), SearchText::parse("sanctus").as_ref());
    assert!(none.is_empty());
  }

  #[tokio::test]
  async fn test_offline_categories_deduplicates_and_sorts() {
    let (_tx, rx) = watch::channel(false);
    let cache: TestCache = OfflineCache::new(
      Arc::new(StaticSource::default()),
      Arc::new(MemoryKv::default()),
      Arc::new(MemoryBlobs::default()),
      rx,
    );
    cache.load();

    let messe = Category {
      id: "c1".to_string(),
      name: "Messe".to_string(),
      created_at: Utc::now(),
    };
    let avent = Category {
      id: "c2".to_string(),
      name: "Avent".to_string(),
      created_at: Utc::now(),
    };

    for (id, title, category) in [
      ("s1", "Gloria", messe.clone()),
      ("s2", "Sanctus", messe),
      ("s3", "Venez divin Messie", avent),
    ] {
      let mut song = sample_song(id, title);
      song.category_id = Some(category.id.clone());
      song.categories = Some(category);
      cache.cache_song(&song).await;
    }

    let categories = offline_categories(&cache);
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Avent", "Messe"]);
  }
}

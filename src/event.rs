use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::remote::types::{Category, Song, StatsOverview};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Result of an async data load
  Data(DataEvent),
  /// Network reachability transition
  Net(bool),
  /// A failure to surface in the status line
  Error(String),
}

/// Results posted back by spawned loads and cache operations.
#[derive(Debug)]
pub enum DataEvent {
  SongsLoaded { songs: Vec<Song>, offline: bool },
  FavoritesLoaded(Vec<Song>),
  CategoriesLoaded(Vec<Category>),
  StatsLoaded(Box<StatsOverview>),
  SongCached { title: String, ok: bool },
  SongRemoved(String),
  AttachmentSaved(PathBuf),
}

/// Event handler that produces events from terminal input and a tick timer,
/// and fans in results from spawned tasks through the same channel.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
  tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if input_tx.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if input_tx.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { rx, tx }
  }

  /// Sender handle for spawned tasks
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

mod views;

use std::collections::HashSet;

use crate::app::{App, Mode, ViewState};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Per-frame lookup of song markers (downloaded, favorite).
pub(crate) struct Marks {
  cached: HashSet<String>,
  favorites: HashSet<String>,
}

impl Marks {
  fn from_app(app: &App) -> Self {
    Self {
      cached: app.cache().cached_ids().into_iter().collect(),
      favorites: app.favorites().ids().into_iter().collect(),
    }
  }

  pub(crate) fn cached(&self, id: &str) -> bool {
    self.cached.contains(id)
  }

  pub(crate) fn favorite(&self, id: &str) -> bool {
    self.favorites.contains(id)
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  if let Some(view) = app.current_view() {
    match view {
      ViewState::SongList {
        songs,
        selected,
        offline,
        loading,
      } => {
        let title = list_title(app, *offline, *loading, songs.len());
        let marks = Marks::from_app(app);
        views::songs::draw_song_list(frame, chunks[0], songs, *selected, &title, &marks);
      }
      ViewState::SongDetail { song, offline } => {
        let cached = app.cache().is_song_cached(&song.id);
        let favorite = app.favorites().is_favorite(&song.id);
        views::song_detail::draw_song_detail(frame, chunks[0], song, *offline, cached, favorite);
      }
      ViewState::CategoryList {
        categories,
        selected,
        loading,
      } => {
        views::categories::draw_category_list(frame, chunks[0], categories, *selected, *loading);
      }
      ViewState::Downloads { songs, selected } => {
        views::downloads::draw_downloads(frame, chunks[0], songs, *selected);
      }
      ViewState::FavoriteList {
        songs,
        selected,
        loading,
      } => {
        let title = if *loading {
          " Favorites (loading...) ".to_string()
        } else {
          format!(" Favorites ({}) ", songs.len())
        };
        let marks = Marks::from_app(app);
        views::songs::draw_song_list(frame, chunks[0], songs, *selected, &title, &marks);
      }
      ViewState::Dashboard { stats, loading } => {
        views::dashboard::draw_dashboard(frame, chunks[0], stats.as_deref(), *loading);
      }
    }
  }

  draw_status_bar(frame, chunks[1], app);
}

fn list_title(app: &App, offline: bool, loading: bool, count: usize) -> String {
  let mut title = format!(" {} ", app.title());
  if let Some(category) = app.active_category() {
    title.push_str(&format!("[{}] ", category));
  }
  if let Some(query) = app.active_search() {
    title.push_str(&format!("/{}/ ", query));
  }
  if loading {
    title.push_str("(loading...) ");
  } else {
    title.push_str(&format!("({}) ", count));
  }
  if offline {
    title.push_str("[offline] ");
  }
  title
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(1), Constraint::Length(10)])
    .split(area);

  let line = match app.mode() {
    Mode::Normal => {
      if let Some(notice) = app.notice() {
        Line::from(Span::styled(
          notice.to_string(),
          Style::default().fg(Color::Green),
        ))
      } else {
        Line::from(Span::styled(
          " :command  /search  j/k:nav  Enter:open  d:download  x:remove  f:favorite  q:back",
          Style::default().fg(Color::DarkGray),
        ))
      }
    }
    Mode::Command => {
      let mut spans = vec![Span::styled(
        format!(":{}", app.command_input()),
        Style::default().fg(Color::Yellow),
      )];
      let suggestions = app.autocomplete_suggestions();
      if !suggestions.is_empty() {
        spans.push(Span::styled("  ", Style::default()));
        for (i, cmd) in suggestions.iter().enumerate() {
          let style = if i == app.selected_suggestion() {
            Style::default().fg(Color::Black).bg(Color::Yellow)
          } else {
            Style::default().fg(Color::DarkGray)
          };
          spans.push(Span::styled(format!(" {} ", cmd.name), style));
        }
      }
      Line::from(spans)
    }
    Mode::Search => Line::from(Span::styled(
      format!("/{}", app.search_input()),
      Style::default().fg(Color::Cyan),
    )),
  };
  frame.render_widget(Paragraph::new(line), chunks[0]);

  let (indicator, style) = if app.is_online() {
    ("● online", Style::default().fg(Color::Green))
  } else {
    ("○ offline", Style::default().fg(Color::Red))
  };
  frame.render_widget(
    Paragraph::new(indicator).style(style).alignment(Alignment::Right),
    chunks[1],
  );
}

/// Character-safe truncation with an ellipsis.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

#[cfg(test)]
mod tests {
  use super::truncate;

  #[test]
  fn test_truncate_short_strings_untouched() {
    assert_eq!(truncate("Gloria", 10), "Gloria");
  }

  #[test]
  fn test_truncate_adds_ellipsis() {
    assert_eq!(truncate("Gloria in excelsis", 9), "Gloria...");
  }

  #[test]
  fn test_truncate_is_char_safe() {
    // Must not split inside a multi-byte character.
    assert_eq!(truncate("Noël Noël Noël", 7), "Noël...");
  }
}

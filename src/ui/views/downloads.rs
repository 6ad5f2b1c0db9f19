use crate::cache::CachedSong;
use crate::ui::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_downloads(frame: &mut Frame, area: Rect, songs: &[CachedSong], selected: usize) {
  let block = Block::default()
    .title(format!(" Downloads ({}) ", songs.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if songs.is_empty() {
    let paragraph =
      Paragraph::new("Nothing downloaded yet. Press 'd' on a song to keep it offline.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = songs
    .iter()
    .map(|cached| {
      let line = Line::from(vec![
        Span::raw(format!("{:<42}", truncate(&cached.song.title, 40))),
        Span::styled(
          format!(
            "{:<26}",
            truncate(cached.song.author.as_deref().unwrap_or(""), 24)
          ),
          Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
          cached.cached_at.format("%Y-%m-%d %H:%M").to_string(),
          Style::default().fg(Color::Cyan),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}

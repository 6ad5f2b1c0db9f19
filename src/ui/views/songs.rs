use crate::remote::types::Song;
use crate::ui::{truncate, Marks};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_song_list(
  frame: &mut Frame,
  area: Rect,
  songs: &[Song],
  selected: usize,
  title: &str,
  marks: &Marks,
) {
  let block = Block::default()
    .title(title.to_string())
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if songs.is_empty() {
    let paragraph = Paragraph::new("No songs found.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = songs
    .iter()
    .map(|song| {
      let favorite = if marks.favorite(&song.id) { "\u{2665}" } else { " " };
      let downloaded = if marks.cached(&song.id) { "\u{2193}" } else { " " };

      let line = Line::from(vec![
        Span::styled(
          format!("{}{} ", favorite, downloaded),
          Style::default().fg(Color::Magenta),
        ),
        Span::raw(format!("{:<42}", truncate(&song.title, 40))),
        Span::styled(
          format!("{:<26}", truncate(song.author.as_deref().unwrap_or(""), 24)),
          Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
          song.category_name().unwrap_or("").to_string(),
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

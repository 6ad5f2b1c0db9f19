use crate::remote::types::Song;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

pub fn draw_song_detail(
  frame: &mut Frame,
  area: Rect,
  song: &Song,
  offline: bool,
  downloaded: bool,
  favorite: bool,
) {
  let title = if offline {
    format!(" {} [offline] ", song.title)
  } else {
    format!(" {} ", song.title)
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let inner = block.inner(area);
  frame.render_widget(block, area);

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(3), // Header (author, category, availability)
      Constraint::Length(1), // Separator
      Constraint::Min(1),    // Lyrics
    ])
    .split(inner);

  let mut status = Vec::new();
  if downloaded {
    status.push(Span::styled("\u{2193} downloaded", Style::default().fg(Color::Green)));
  } else {
    status.push(Span::styled("not downloaded", Style::default().fg(Color::DarkGray)));
  }
  if favorite {
    status.push(Span::raw("  "));
    status.push(Span::styled("\u{2665} favorite", Style::default().fg(Color::Magenta)));
  }

  let header = vec![
    Line::from(vec![
      Span::styled("Author: ", Style::default().fg(Color::DarkGray)),
      Span::raw(song.author.as_deref().unwrap_or("Unknown")),
      Span::raw("  "),
      Span::styled("Category: ", Style::default().fg(Color::DarkGray)),
      Span::styled(
        song.category_name().unwrap_or("-").to_string(),
        Style::default().fg(Color::Cyan),
      ),
    ]),
    Line::from(vec![
      Span::styled("Sheet music: ", Style::default().fg(Color::DarkGray)),
      Span::raw(if song.file_path.is_some() { "yes (s to save)" } else { "none" }),
      Span::raw("  "),
      Span::styled("Recording: ", Style::default().fg(Color::DarkGray)),
      Span::raw(if song.audio_path.is_some() { "yes (a to save)" } else { "none" }),
    ]),
    Line::from(status),
  ];
  frame.render_widget(Paragraph::new(header), chunks[0]);

  let separator = Paragraph::new("\u{2500}".repeat(chunks[1].width as usize))
    .style(Style::default().fg(Color::DarkGray));
  frame.render_widget(separator, chunks[1]);

  match song.lyrics.as_deref() {
    Some(lyrics) => {
      let paragraph = Paragraph::new(lyrics.to_string()).wrap(Wrap { trim: false });
      frame.render_widget(paragraph, chunks[2]);
    }
    None => {
      let paragraph = Paragraph::new("No lyrics available").style(
        Style::default()
          .fg(Color::DarkGray)
          .add_modifier(Modifier::ITALIC),
      );
      frame.render_widget(paragraph, chunks[2]);
    }
  }
}

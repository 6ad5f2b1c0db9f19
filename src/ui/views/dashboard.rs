use crate::remote::types::StatsOverview;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

pub fn draw_dashboard(frame: &mut Frame, area: Rect, stats: Option<&StatsOverview>, loading: bool) {
  let title = if loading {
    " Dashboard (loading...) "
  } else {
    " Dashboard "
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let Some(stats) = stats else {
    let paragraph = Paragraph::new(if loading { "Loading usage data..." } else { "" })
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  };

  let label = Style::default().fg(Color::DarkGray);
  let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

  let mut lines = vec![
    Line::from(vec![
      Span::styled("Songs       ", label),
      Span::styled(stats.total_songs.to_string(), value),
    ]),
    Line::from(vec![
      Span::styled("Categories  ", label),
      Span::styled(stats.total_categories.to_string(), value),
    ]),
    Line::from(vec![
      Span::styled("Admins      ", label),
      Span::styled(stats.total_admins.to_string(), value),
    ]),
    Line::default(),
    Line::from(vec![
      Span::styled("Today       ", label),
      Span::styled(format!("{} views", stats.today_views()), value),
      Span::raw("   "),
      Span::styled(format!("{} downloads", stats.today_downloads()), value),
    ]),
    Line::default(),
    Line::from(Span::styled("Last 7 days", label)),
  ];

  if stats.weekly.is_empty() {
    lines.push(Line::from(Span::styled("  no activity recorded", label)));
  }
  for day in &stats.weekly {
    lines.push(Line::from(vec![
      Span::styled(format!("  {}  ", day.stat_date), Style::default().fg(Color::Cyan)),
      Span::raw(format!(
        "views {:<5} unique {:<5} songs {:<5} downloads {}",
        day.page_views, day.unique_visitors, day.songs_viewed, day.downloads
      )),
    ]));
  }

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

use crate::remote::types::Category;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_category_list(
  frame: &mut Frame,
  area: Rect,
  categories: &[Category],
  selected: usize,
  loading: bool,
) {
  let title = if loading {
    " Categories (loading...) ".to_string()
  } else {
    format!(" Categories ({}) ", categories.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if categories.is_empty() && !loading {
    let paragraph = Paragraph::new("No categories.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = categories
    .iter()
    .map(|category| ListItem::new(Line::from(category.name.clone())))
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

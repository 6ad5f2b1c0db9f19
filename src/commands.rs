/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "songs",
    aliases: &["s", "song", "all"],
    description: "Browse the repertoire",
  },
  Command {
    name: "categories",
    aliases: &["c", "cat"],
    description: "Pick a category filter",
  },
  Command {
    name: "downloads",
    aliases: &["d", "dl", "offline"],
    description: "Songs available offline",
  },
  Command {
    name: "favorites",
    aliases: &["f", "fav"],
    description: "Favorite songs",
  },
  Command {
    name: "stats",
    aliases: &["dashboard"],
    description: "Usage dashboard",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit chorale",
  },
];

/// Get autocomplete suggestions for a given input, best match first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();

  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match_first() {
    let suggestions = get_suggestions("songs");
    assert_eq!(suggestions[0].name, "songs");
  }

  #[test]
  fn test_alias_match() {
    assert_eq!(get_suggestions("dl")[0].name, "downloads");
    assert_eq!(get_suggestions("fav")[0].name, "favorites");
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(get_suggestions("cat")[0].name, "categories");
    assert_eq!(get_suggestions("st")[0].name, "stats");
  }

  #[test]
  fn test_fuzzy_match() {
    assert_eq!(get_suggestions("ong")[0].name, "songs");
  }

  #[test]
  fn test_no_match_is_empty() {
    assert!(get_suggestions("zzz").is_empty());
  }
}

//! Search text validation and matching.
//!
//! Raw user input is only embedded in a remote pattern match after passing a
//! conservative allow-list, and the offline path filters cached songs with
//! the same case-insensitive substring semantics as the live query.

use crate::remote::types::Song;

const MAX_LEN: usize = 100;

/// Validated search text.
///
/// `parse` returns `None` for input that must be treated as "no filter":
/// empty after trimming, longer than 100 characters, or containing anything
/// outside letters, digits, spaces, hyphens and apostrophes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchText(String);

impl SearchText {
  pub fn parse(raw: &str) -> Option<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_LEN {
      return None;
    }
    if !trimmed.chars().all(allowed) {
      return None;
    }
    Some(Self(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Pattern for a store-side `ilike` match, wildcard-wrapped and escaped.
  pub fn like_pattern(&self) -> String {
    format!("%{}%", escape_like(&self.0))
  }

  /// Case-insensitive substring match.
  pub fn matches(&self, haystack: &str) -> bool {
    haystack.to_lowercase().contains(&self.0.to_lowercase())
  }

  /// Whether a song matches on title, author or lyrics.
  pub fn matches_song(&self, song: &Song) -> bool {
    self.matches(&song.title)
      || song.author.as_deref().is_some_and(|a| self.matches(a))
      || song.lyrics.as_deref().is_some_and(|l| self.matches(l))
  }
}

/// Escape the store's wildcard and escape characters (`%`, `_`, `\`) before
/// embedding text in a pattern.
pub fn escape_like(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

fn allowed(c: char) -> bool {
  c.is_alphabetic() || c.is_ascii_digit() || matches!(c, ' ' | '-' | '\'' | '\u{2019}')
}

/// Filter used by the offline path: same semantics as the live query, an
/// optional category equality filter plus an optional search match.
pub fn matches_filters(song: &Song, category: Option<&str>, search: Option<&SearchText>) -> bool {
  if let Some(cat) = category {
    if song.category_id.as_deref() != Some(cat) {
      return false;
    }
  }
  match search {
    Some(s) => s.matches_song(song),
    None => true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::sample_song;

  #[test]
  fn test_parse_trims_and_accepts_plain_text() {
    let s = SearchText::parse("  Kyrie eleison ").unwrap();
    assert_eq!(s.as_str(), "Kyrie eleison");
  }

  #[test]
  fn test_parse_accepts_accented_latin_and_apostrophes() {
    assert!(SearchText::parse("Noël").is_some());
    assert!(SearchText::parse("l'été 3 - bis").is_some());
    assert!(SearchText::parse("chant d\u{2019}espoir").is_some());
  }

  #[test]
  fn test_parse_rejects_disallowed_characters() {
    assert_eq!(SearchText::parse("drop; table"), None);
    assert_eq!(SearchText::parse("<script>"), None);
    assert_eq!(SearchText::parse("50%"), None);
    assert_eq!(SearchText::parse("a_b"), None);
    assert_eq!(SearchText::parse("back\\slash"), None);
  }

  #[test]
  fn test_parse_rejects_empty_and_oversized() {
    assert_eq!(SearchText::parse("   "), None);
    let long = "a".repeat(101);
    assert_eq!(SearchText::parse(&long), None);
    assert!(SearchText::parse(&"a".repeat(100)).is_some());
  }

  #[test]
  fn test_escape_like() {
    assert_eq!(escape_like("100% sur_e\\"), "100\\% sur\\_e\\\\");
    assert_eq!(escape_like("plain"), "plain");
  }

  #[test]
  fn test_like_pattern_wraps_with_wildcards() {
    let s = SearchText::parse("Gloria").unwrap();
    assert_eq!(s.like_pattern(), "%Gloria%");
  }

  #[test]
  fn test_matches_is_case_insensitive() {
    let s = SearchText::parse("gloria").unwrap();
    assert!(s.matches("GLORIA in excelsis"));
    assert!(!s.matches("Sanctus"));
  }

  #[test]
  fn test_matches_song_checks_title_author_lyrics() {
    let mut song = sample_song("s1", "Sanctus");
    song.author = Some("Gounod".to_string());
    song.lyrics = Some("Hosanna in excelsis".to_string());

    assert!(SearchText::parse("sanctus").unwrap().matches_song(&song));
    assert!(SearchText::parse("gounod").unwrap().matches_song(&song));
    assert!(SearchText::parse("hosanna").unwrap().matches_song(&song));
    assert!(!SearchText::parse("gloria").unwrap().matches_song(&song));
  }

  #[test]
  fn test_matches_filters_combines_category_and_search() {
    let mut song = sample_song("s1", "Gloria");
    song.category_id = Some("c1".to_string());

    let search = SearchText::parse("gloria");
    assert!(matches_filters(&song, None, search.as_ref()));
    assert!(matches_filters(&song, Some("c1"), search.as_ref()));
    assert!(!matches_filters(&song, Some("c2"), search.as_ref()));
    assert!(!matches_filters(
      &song,
      Some("c1"),
      SearchText::parse("sanctus").as_ref()
    ));
  }
}

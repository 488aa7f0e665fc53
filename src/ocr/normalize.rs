//! Cleanup of recognized text before it lands in a record.
//!
//! The recognizer is run with tight allowlists, but still splits digit
//! groups, inserts stray punctuation, and regularly reads the `/` in a
//! made/attempted split as a `1`. The rules here repair the cases with a
//! known shape and leave everything else alone.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use super::regions::RegionKind;

/// Anything outside this set is dropped.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^a-zA-Z0-9 \n!@#$%^&*()_+\-=\[\]{};:"\\|,.<>/?]"#)
        .expect("safelist pattern is valid")
});

/// Known misreads of full name strings.
const NAME_CORRECTIONS: &[(&str, &str)] = &[("Al Player", "AI Player"), ("Al Player 3", "AI Player")];

/// Joins recognizer tokens and cleans them up for the given region.
///
/// Whitespace-only tokens stand for an unreadable digit and become `"0"`.
/// The result may be empty when nothing was recognized; callers supply
/// the field default.
pub fn normalize(tokens: &[String], kind: RegionKind) -> String {
    let joined = tokens
        .iter()
        .map(|t| if t.trim().is_empty() { "0" } else { t.as_str() })
        .collect::<Vec<_>>()
        .join(" ");
    let mut text = joined.trim().to_string();

    if kind.is_name() {
        text = correct_common_errors(&text);
    }

    text = filter_text(&text);

    if !kind.is_name() {
        text.retain(|c| !c.is_whitespace());
    }

    text
}

/// Strips characters outside the printable safelist, then any `.`, which
/// the recognizer confuses with digits.
pub fn filter_text(text: &str) -> String {
    let filtered = UNSAFE_CHARS.replace_all(text, "");
    filtered.replace('.', "").trim().to_string()
}

/// Maps known name misreads to what the screen actually shows.
pub fn correct_common_errors(text: &str) -> String {
    NAME_CORRECTIONS
        .iter()
        .find(|(wrong, _)| *wrong == text)
        .map(|(_, right)| right.to_string())
        .unwrap_or_else(|| text.to_string())
}

/// Reinserts a `/` the recognizer read as `1`.
///
/// Only three shapes are rewritten:
/// - `d1d` → `d/d`
/// - `d1dd` → `d/dd`
/// - `dd1dd` → `dd/dd`
///
/// Anything else is returned trimmed but otherwise unchanged. A real `1`
/// in one of those positions is rewritten too; there is no way to tell
/// them apart from the text alone.
pub fn fix_slash(stat: &str) -> String {
    let stat = stat.trim();
    let chars: Vec<char> = stat.chars().collect();
    let take = |range: std::ops::Range<usize>| chars[range].iter().collect::<String>();

    match chars.len() {
        3 if chars[1] == '1' => format!("{}/{}", take(0..1), take(2..3)),
        4 if chars[1] == '1' => format!("{}/{}", take(0..1), take(2..4)),
        5 if chars[2] == '1' => format!("{}/{}", take(0..2), take(3..5)),
        _ => stat.to_string(),
    }
}

/// Splits a made/attempted cell into its two numbers.
///
/// Runs `fix_slash` first. Without exactly one `/` both halves are `"0"`;
/// an empty half also becomes `"0"`.
pub fn split_shooting(text: &str) -> (String, String) {
    let fixed = fix_slash(text);
    let or_zero = |s: &str| if s.is_empty() { "0".to_string() } else { s.to_string() };

    match fixed.split_once('/') {
        Some((made, attempted)) if !attempted.contains('/') => (or_zero(made), or_zero(attempted)),
        Some(_) => {
            warn!("Ambiguous shooting split '{}', recording 0/0", fixed);
            ("0".to_string(), "0".to_string())
        }
        None => ("0".to_string(), "0".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::regions::PlayerField;
    use crate::record::TeamSide;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn player(field: PlayerField) -> RegionKind {
        RegionKind::Player { number: 1, field }
    }

    #[test]
    fn test_fix_slash() {
        assert_eq!(fix_slash("719"), "7/9");
        assert_eq!(fix_slash("6134"), "6/34");
        assert_eq!(fix_slash("12105"), "12/05");
        assert_eq!(fix_slash("6/10"), "6/10");
        assert_eq!(fix_slash(" 719 "), "7/9");
    }

    #[test]
    fn test_fix_slash_leaves_other_shapes() {
        assert_eq!(fix_slash("729"), "729");
        assert_eq!(fix_slash("12"), "12");
        assert_eq!(fix_slash("123456"), "123456");
        assert_eq!(fix_slash(""), "");
    }

    #[test]
    fn test_fix_slash_misreads_real_ones() {
        // "11/12" with the slash dropped is indistinguishable from a
        // two-digit/two-digit split.
        assert_eq!(fix_slash("11112"), "11/12");
        assert_eq!(fix_slash("111"), "1/1");
    }

    #[test]
    fn test_split_shooting() {
        assert_eq!(split_shooting("7/12"), ("7".to_string(), "12".to_string()));
        assert_eq!(split_shooting("719"), ("7".to_string(), "9".to_string()));
        assert_eq!(split_shooting("/4"), ("0".to_string(), "4".to_string()));
        assert_eq!(split_shooting("79"), ("0".to_string(), "0".to_string()));
        assert_eq!(split_shooting(""), ("0".to_string(), "0".to_string()));
        assert_eq!(split_shooting("1/2/3"), ("0".to_string(), "0".to_string()));
    }

    #[test]
    fn test_normalize_removes_spaces_in_numbers() {
        let kind = player(PlayerField::Points);
        assert_eq!(normalize(&tokens(&["1", "2"]), kind), "12");
        assert_eq!(normalize(&tokens(&[" 2 4 "]), kind), "24");
    }

    #[test]
    fn test_normalize_strips_periods_and_junk() {
        assert_eq!(normalize(&tokens(&["1.5"]), player(PlayerField::Rebounds)), "15");
        assert_eq!(normalize(&tokens(&["Jöhn", "Doe"]), player(PlayerField::Name)), "Jhn Doe");
    }

    #[test]
    fn test_normalize_keeps_name_spaces() {
        let kind = player(PlayerField::Name);
        assert_eq!(normalize(&tokens(&["Big", "Man", "22"]), kind), "Big Man 22");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(&[], player(PlayerField::Points)), "");
        assert_eq!(normalize(&tokens(&["  "]), player(PlayerField::Points)), "0");
        let quarter = RegionKind::Quarter { team: TeamSide::Team1, quarter: 1 };
        assert_eq!(normalize(&[], quarter), "");
    }

    #[test]
    fn test_name_corrections() {
        let kind = player(PlayerField::Name);
        assert_eq!(normalize(&tokens(&["Al", "Player"]), kind), "AI Player");
        assert_eq!(normalize(&tokens(&["Al Player 3"]), kind), "AI Player");
        assert_eq!(normalize(&tokens(&["Al", "Horford"]), kind), "Al Horford");
        // Corrections only apply to names.
        assert_eq!(correct_common_errors("Al Player"), "AI Player");
    }
}

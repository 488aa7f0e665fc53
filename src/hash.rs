//! Content hash used to recognise a box score that was already ingested.
//!
//! The digest covers `players` and `teams` only, serialized as JSON with
//! object keys sorted at every level, so it does not depend on field or
//! insertion order and never includes the `hash` field itself.
//!
//! The text layout is fixed so digests match ledgers written by earlier
//! tooling: `", "` between items, `": "` after keys, and every non-ASCII
//! character escaped as `\uXXXX`.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::record::Record;

#[derive(Serialize)]
struct HashedContent<'a> {
    players: &'a [crate::record::PlayerStat],
    teams: &'a crate::record::Teams,
}

/// Canonical serialization of the hashed part of a record.
pub fn canonical_json(record: &Record) -> Result<String> {
    let value = serde_json::to_value(HashedContent {
        players: &record.players,
        teams: &record.teams,
    })
    .context("Failed to serialize record for hashing")?;

    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

/// Hex SHA-256 of [`canonical_json`].
pub fn content_hash(record: &Record) -> Result<String> {
    let canonical = canonical_json(record)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Computes and stores the record's hash.
pub fn seal(record: &mut Record) -> Result<()> {
    record.hash = content_hash(record)?;
    Ok(())
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(key, out);
                out.push_str(": ");
                write_canonical(val, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::String(text) => write_string(text, out),
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// Quoted JSON string with ASCII-only output. Characters outside the BMP
/// are written as UTF-16 surrogate pairs.
fn write_string(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PlayerStat, Teams, quarter_key};

    fn sample() -> Record {
        let mut p1 = PlayerStat::new(1, "Alpha".to_string()).unwrap();
        p1.points = "12".to_string();
        let p6 = PlayerStat::new(6, "Bravo".to_string()).unwrap();

        let mut teams = Teams::default();
        for q in 1..=4 {
            teams.team1_quarters.insert(quarter_key(q), "20".to_string());
            teams.team2_quarters.insert(quarter_key(q), "18".to_string());
        }

        Record { players: vec![p1, p6], teams, hash: String::new() }
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash(&sample()).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_ignores_hash_field() {
        let mut a = sample();
        let before = content_hash(&a).unwrap();
        a.hash = "something else".to_string();
        assert_eq!(content_hash(&a).unwrap(), before);

        seal(&mut a).unwrap();
        assert_eq!(a.hash, before);
    }

    #[test]
    fn test_hash_independent_of_insertion_order() {
        let a = sample();

        let mut b = sample();
        b.teams = Teams::default();
        for q in (1..=4).rev() {
            b.teams.team2_quarters.insert(quarter_key(q), "18".to_string());
            b.teams.team1_quarters.insert(quarter_key(q), "20".to_string());
        }

        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_same_for_reordered_json_keys() {
        let a = sample();
        let json = serde_json::to_string(&a).unwrap();
        let mut value: Value = serde_json::from_str(&json).unwrap();

        // Rebuild the first player object with keys inserted in reverse.
        let player = value["players"][0].as_object().unwrap().clone();
        let mut reversed = serde_json::Map::new();
        for (k, v) in player.into_iter().rev() {
            reversed.insert(k, v);
        }
        value["players"][0] = Value::Object(reversed);

        let b: Record = serde_json::from_value(value).unwrap();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = sample();
        let mut b = sample();
        b.players[1].steals = "1".to_string();
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_canonical_keys_sorted() {
        let canonical = canonical_json(&sample()).unwrap();
        assert!(canonical.starts_with(r#"{"players": [{"3PA": "0", "3PM": "0", "FGA": "0""#));
        assert!(canonical.ends_with(
            r#""team2_quarters": {"quarter_1": "18", "quarter_2": "18", "quarter_3": "18", "quarter_4": "18"}}}"#
        ));
    }

    fn single_player(name: &str) -> Record {
        Record {
            players: vec![PlayerStat::new(1, name.to_string()).unwrap()],
            ..Record::default()
        }
    }

    #[test]
    fn test_known_digest_for_single_player() {
        let record = single_player("Ace");
        assert_eq!(
            canonical_json(&record).unwrap(),
            concat!(
                r#"{"players": [{"3PA": "0", "3PM": "0", "FGA": "0", "FGM": "0", "FTA": "0", "FTM": "0", "#,
                r#""assists": "0", "blocks": "0", "fouls": "0", "grade": "C", "name": "Ace", "#,
                r#""player_number": 1, "points": "0", "position": "PG", "rebounds": "0", "steals": "0", "#,
                r#""team": "team1", "tos": "0"}], "teams": {"team1_quarters": {}, "team2_quarters": {}}}"#
            )
        );
        assert_eq!(
            content_hash(&record).unwrap(),
            "cf86b9164101198624662b9e6c24568c27b85f1aa5f16314f386b3e2f0fd93ab"
        );
    }

    #[test]
    fn test_known_digest_with_escaped_name() {
        let mut record = single_player("Zo\u{eb} \"Q\"\t\u{20ac}");
        record.teams.team1_quarters.insert(quarter_key(1), "20".to_string());

        let canonical = canonical_json(&record).unwrap();
        assert!(canonical.contains(r#""name": "Zo\u00eb \"Q\"\t\u20ac""#));
        assert!(canonical.is_ascii());
        assert_eq!(
            content_hash(&record).unwrap(),
            "18436655a5a5eaf6c72a6429df162ba8c14b83b0c52ead48ab5104dc3bdca40e"
        );
    }

    #[test]
    fn test_write_string_escapes() {
        let mut out = String::new();
        write_string("a\\b\u{1}\u{1F600}", &mut out);
        assert_eq!(out, r#""a\\b\u0001\ud83d\ude00""#);
    }
}

//! Builds a `Record` from normalized region text in one ordered pass.
//!
//! The only state carried between regions is which player, if any, the
//! following stat cells belong to. Every name region opens a new player;
//! stat cells with no open player, or addressed to a different player
//! number than the open one, are dropped.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use super::normalize::split_shooting;
use super::regions::{PlayerField, RegionKind};
use crate::record::{PlayerStat, Record, quarter_key};

static GRADE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-F][+-]?)?$").expect("grade pattern is valid"));

/// Which player subsequent stat regions are written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerCursor {
    NoActivePlayer,
    /// Index into `Record::players`.
    ActivePlayer(usize),
}

/// Folds `(region name, normalized text)` pairs into a record.
///
/// The returned record has an empty `hash`; see [`crate::hash::seal`].
pub fn assemble<'a, I>(regions: I) -> Record
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let (record, _) = regions.into_iter().fold(
        (Record::default(), PlayerCursor::NoActivePlayer),
        |(mut record, cursor), (name, text)| {
            let cursor = apply_region(&mut record, cursor, name, text);
            (record, cursor)
        },
    );
    record
}

/// Applies one region to the record and returns the next cursor.
pub fn apply_region(record: &mut Record, cursor: PlayerCursor, name: &str, text: &str) -> PlayerCursor {
    let Some(kind) = RegionKind::parse(name) else {
        warn!("Ignoring unrecognized region '{}'", name);
        return cursor;
    };

    match kind {
        RegionKind::Player { number, field: PlayerField::Name } => {
            match PlayerStat::new(number, text.to_string()) {
                Some(player) => {
                    record.players.push(player);
                    PlayerCursor::ActivePlayer(record.players.len() - 1)
                }
                None => {
                    warn!("Player number {} out of range in '{}'", number, name);
                    PlayerCursor::NoActivePlayer
                }
            }
        }
        RegionKind::Player { number, field } => {
            let PlayerCursor::ActivePlayer(idx) = cursor else {
                warn!("Dropping '{}': no player name seen before it", name);
                return cursor;
            };
            let Some(player) = record.players.get_mut(idx).filter(|p| p.player_number == number) else {
                warn!("Dropping '{}': open player is not player {}", name, number);
                return cursor;
            };
            set_field(player, field, text);
            validate(number, field, text);
            cursor
        }
        RegionKind::Quarter { team, quarter } => {
            let value = if text.is_empty() { "0" } else { text };
            record
                .teams
                .quarters_mut(team)
                .insert(quarter_key(quarter), value.to_string());
            cursor
        }
    }
}

fn set_field(player: &mut PlayerStat, field: PlayerField, text: &str) {
    let or_zero = || if text.is_empty() { "0".to_string() } else { text.to_string() };

    match field {
        PlayerField::Name => player.name = text.to_string(),
        PlayerField::Grade => {
            player.grade = if text.is_empty() { "C".to_string() } else { text.to_string() };
        }
        PlayerField::Points => player.points = or_zero(),
        PlayerField::Rebounds => player.rebounds = or_zero(),
        PlayerField::Assists => player.assists = or_zero(),
        PlayerField::Steals => player.steals = or_zero(),
        PlayerField::Blocks => player.blocks = or_zero(),
        PlayerField::Fouls => player.fouls = or_zero(),
        PlayerField::Turnovers => player.tos = or_zero(),
        PlayerField::FieldGoals => {
            (player.fgm, player.fga) = split_shooting(text);
        }
        PlayerField::ThreePointers => {
            (player.three_pm, player.three_pa) = split_shooting(text);
        }
        PlayerField::FreeThrows => {
            (player.ftm, player.fta) = split_shooting(text);
        }
    }
}

/// Logs data-quality problems. Nothing is rejected.
fn validate(number: u8, field: PlayerField, text: &str) {
    if field == PlayerField::Grade && !GRADE_PATTERN.is_match(text) {
        warn!("Invalid grade detected for player {}: {}", number, text);
    } else if text.is_empty() {
        warn!("Empty value detected for {} of player {}", field.key(), number);
    }
}

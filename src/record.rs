//! Box-score data model.
//!
//! A `Record` is built once per screenshot, filled during a single assembly
//! pass, then hashed and written out as JSON. Stat values are kept as the
//! recognized digit strings so the hash covers exactly what was read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of player rows on the box-score screen.
pub const PLAYERS: u8 = 10;

/// Number of scoring periods per team.
pub const QUARTERS: u8 = 4;

/// Which side of the box score a player or quarter cell belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSide {
    #[serde(rename = "team1")]
    Team1,
    #[serde(rename = "team2")]
    Team2,
}

impl TeamSide {
    /// Players 1-5 are listed under team1, 6-10 under team2.
    pub fn for_player(player_number: u8) -> Option<Self> {
        match player_number {
            1..=5 => Some(TeamSide::Team1),
            6..=10 => Some(TeamSide::Team2),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            TeamSide::Team1 => TeamSide::Team2,
            TeamSide::Team2 => TeamSide::Team1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamSide::Team1 => "team1",
            TeamSide::Team2 => "team2",
        }
    }
}

impl std::fmt::Display for TeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TeamSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "team1" => Ok(TeamSide::Team1),
            "2" | "team2" => Ok(TeamSide::Team2),
            other => Err(anyhow::anyhow!("Unknown team '{}', expected team1 or team2", other)),
        }
    }
}

/// Lineup slot, fixed by row order within each team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    PG,
    SG,
    SF,
    PF,
    C,
}

impl Position {
    /// 1/6 → PG, 2/7 → SG, 3/8 → SF, 4/9 → PF, 5/10 → C.
    pub fn for_player(player_number: u8) -> Option<Self> {
        match player_number {
            1 | 6 => Some(Position::PG),
            2 | 7 => Some(Position::SG),
            3 | 8 => Some(Position::SF),
            4 | 9 => Some(Position::PF),
            5 | 10 => Some(Position::C),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::PG => "PG",
            Position::SG => "SG",
            Position::SF => "SF",
            Position::PF => "PF",
            Position::C => "C",
        }
    }
}

/// One player's line from the box score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub player_number: u8,
    pub position: Position,
    pub team: TeamSide,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_grade")]
    pub grade: String,
    #[serde(default = "zero")]
    pub points: String,
    #[serde(default = "zero")]
    pub rebounds: String,
    #[serde(default = "zero")]
    pub assists: String,
    #[serde(default = "zero")]
    pub steals: String,
    #[serde(default = "zero")]
    pub blocks: String,
    #[serde(default = "zero")]
    pub fouls: String,
    #[serde(default = "zero")]
    pub tos: String,
    #[serde(rename = "FGM", default = "zero")]
    pub fgm: String,
    #[serde(rename = "FGA", default = "zero")]
    pub fga: String,
    #[serde(rename = "3PM", default = "zero")]
    pub three_pm: String,
    #[serde(rename = "3PA", default = "zero")]
    pub three_pa: String,
    #[serde(rename = "FTM", default = "zero")]
    pub ftm: String,
    #[serde(rename = "FTA", default = "zero")]
    pub fta: String,
}

fn zero() -> String {
    "0".to_string()
}

fn default_grade() -> String {
    "C".to_string()
}

impl PlayerStat {
    /// Creates a blank line for the given row; team and position follow from
    /// the row number. Returns `None` for numbers outside 1..=10.
    pub fn new(player_number: u8, name: String) -> Option<Self> {
        Some(Self {
            player_number,
            position: Position::for_player(player_number)?,
            team: TeamSide::for_player(player_number)?,
            name,
            grade: default_grade(),
            points: zero(),
            rebounds: zero(),
            assists: zero(),
            steals: zero(),
            blocks: zero(),
            fouls: zero(),
            tos: zero(),
            fgm: zero(),
            fga: zero(),
            three_pm: zero(),
            three_pa: zero(),
            ftm: zero(),
            fta: zero(),
        })
    }
}

/// Quarter scores keyed `quarter_1`..`quarter_4`.
pub type TeamQuarters = BTreeMap<String, String>;

/// Returns the map key for a quarter number (1-based).
pub fn quarter_key(quarter: u8) -> String {
    format!("quarter_{}", quarter)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Teams {
    #[serde(default)]
    pub team1_quarters: TeamQuarters,
    #[serde(default)]
    pub team2_quarters: TeamQuarters,
}

impl Teams {
    pub fn quarters(&self, side: TeamSide) -> &TeamQuarters {
        match side {
            TeamSide::Team1 => &self.team1_quarters,
            TeamSide::Team2 => &self.team2_quarters,
        }
    }

    pub fn quarters_mut(&mut self, side: TeamSide) -> &mut TeamQuarters {
        match side {
            TeamSide::Team1 => &mut self.team1_quarters,
            TeamSide::Team2 => &mut self.team2_quarters,
        }
    }
}

/// Everything read from one box-score screenshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Players in the order their name regions were encountered.
    #[serde(default)]
    pub players: Vec<PlayerStat>,
    #[serde(default)]
    pub teams: Teams,
    /// Hex SHA-256 of the canonical form of `players` and `teams`.
    #[serde(default)]
    pub hash: String,
}

//! Fixed box-score layout.
//!
//! Regions are defined in pixels of a 3840×2160 reference screenshot and
//! listed in the order the assembler consumes them: for each player a name
//! region followed by its stat regions, then the team1 and team2 quarter
//! cells. The order is what ties stat cells to their player.

use crate::record::{PLAYERS, QUARTERS, TeamSide};

pub const REFERENCE_WIDTH: u32 = 3840;
pub const REFERENCE_HEIGHT: u32 = 2160;

const BASE_X_PLAYER: u32 = 1219;
const PLAYER_Y: [u32; PLAYERS as usize] = [520, 602, 683, 765, 843, 1148, 1233, 1318, 1398, 1479];
const PLAYER_NAME_HEIGHT: u32 = 81;
const PLAYER_STAT_HEIGHT: u32 = 77;

const BASE_X_TEAM: u32 = 317;
const BASE_Y_TEAM1: u32 = 778;
const BASE_Y_TEAM2: u32 = 1115;
const X_OFFSET_TEAM: u32 = 110;
const TEAM_QUARTER_WIDTH: u32 = 85;
const TEAM_QUARTER_HEIGHT: u32 = 145;

/// Allowlist for made/attempted splits such as `7/12`.
pub const ALLOW_SPLIT: &str = "0123456789/";
/// Allowlist for letter grades.
pub const ALLOW_GRADE: &str = "ABCDF+-";
/// Allowlist for plain counting stats and quarter scores.
pub const ALLOW_DIGITS: &str = "0123456789";
/// Allowlist for gamertags.
pub const ALLOW_NAME: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+-_/ ";

/// One column of a player row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayerField {
    Name,
    Grade,
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    Fouls,
    Turnovers,
    FieldGoals,
    ThreePointers,
    FreeThrows,
}

impl PlayerField {
    /// Column order on screen, name first.
    pub const ALL: [PlayerField; 12] = [
        PlayerField::Name,
        PlayerField::Grade,
        PlayerField::Points,
        PlayerField::Rebounds,
        PlayerField::Assists,
        PlayerField::Steals,
        PlayerField::Blocks,
        PlayerField::Fouls,
        PlayerField::Turnovers,
        PlayerField::FieldGoals,
        PlayerField::ThreePointers,
        PlayerField::FreeThrows,
    ];

    /// Key used in region names (`player3_FGMFGA`).
    pub fn key(self) -> &'static str {
        match self {
            PlayerField::Name => "name",
            PlayerField::Grade => "grade",
            PlayerField::Points => "points",
            PlayerField::Rebounds => "rebounds",
            PlayerField::Assists => "assists",
            PlayerField::Steals => "steals",
            PlayerField::Blocks => "blocks",
            PlayerField::Fouls => "fouls",
            PlayerField::Turnovers => "tos",
            PlayerField::FieldGoals => "FGMFGA",
            PlayerField::ThreePointers => "3PM3PA",
            PlayerField::FreeThrows => "FTMFTA",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        PlayerField::ALL.into_iter().find(|f| f.key() == key)
    }

    /// (x offset from the row start, width) in reference pixels.
    fn geometry(self) -> (u32, u32) {
        match self {
            PlayerField::Name => (0, 485),
            PlayerField::Grade => (480, 105),
            PlayerField::Points => (620, 135),
            PlayerField::Rebounds => (777, 135),
            PlayerField::Assists => (923, 135),
            PlayerField::Steals => (1075, 135),
            PlayerField::Blocks => (1224, 135),
            PlayerField::Fouls => (1368, 135),
            PlayerField::Turnovers => (1513, 135),
            PlayerField::FieldGoals => (1665, 205),
            PlayerField::ThreePointers => (1898, 205),
            PlayerField::FreeThrows => (2099, 205),
        }
    }

    pub fn is_split(self) -> bool {
        matches!(
            self,
            PlayerField::FieldGoals | PlayerField::ThreePointers | PlayerField::FreeThrows
        )
    }
}

/// What a region holds, parsed from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    Player { number: u8, field: PlayerField },
    Quarter { team: TeamSide, quarter: u8 },
}

impl RegionKind {
    /// Parses `player<N>_<field>` or `team<1|2>_q<N>`.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix("player") {
            let (number, field) = rest.split_once('_')?;
            return Some(RegionKind::Player {
                number: number.parse().ok()?,
                field: PlayerField::from_key(field)?,
            });
        }

        let (team, quarter) = name.split_once("_q")?;
        let team = match team {
            "team1" => TeamSide::Team1,
            "team2" => TeamSide::Team2,
            _ => return None,
        };
        Some(RegionKind::Quarter {
            team,
            quarter: quarter.parse().ok()?,
        })
    }

    /// Character set handed to the recognizer for this region.
    pub fn allowlist(self) -> &'static str {
        match self {
            RegionKind::Player { field, .. } if field.is_split() => ALLOW_SPLIT,
            RegionKind::Player { field: PlayerField::Grade, .. } => ALLOW_GRADE,
            RegionKind::Player { field: PlayerField::Name, .. } => ALLOW_NAME,
            RegionKind::Player { .. } => ALLOW_DIGITS,
            RegionKind::Quarter { .. } => ALLOW_NAME,
        }
    }

    /// Numeric cells get upscaled and blurred before recognition;
    /// names and grades go in as cropped.
    pub fn needs_enhancement(self) -> bool {
        !matches!(
            self,
            RegionKind::Player {
                field: PlayerField::Name | PlayerField::Grade,
                ..
            }
        )
    }

    pub fn is_name(self) -> bool {
        matches!(self, RegionKind::Player { field: PlayerField::Name, .. })
    }
}

/// A named rectangle in reference-resolution pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn kind(&self) -> Option<RegionKind> {
        RegionKind::parse(&self.name)
    }
}

/// Builds the full ordered list of 128 regions.
pub fn region_catalog() -> Vec<Region> {
    let mut regions = Vec::with_capacity(PLAYERS as usize * 12 + QUARTERS as usize * 2);

    for (idx, &row_y) in PLAYER_Y.iter().enumerate() {
        let number = idx + 1;
        for field in PlayerField::ALL {
            let (offset, width) = field.geometry();
            let height = if field == PlayerField::Name {
                PLAYER_NAME_HEIGHT
            } else {
                PLAYER_STAT_HEIGHT
            };
            regions.push(Region {
                name: format!("player{}_{}", number, field.key()),
                x: BASE_X_PLAYER + offset,
                y: row_y,
                width,
                height,
            });
        }
    }

    for (team, base_y) in [(TeamSide::Team1, BASE_Y_TEAM1), (TeamSide::Team2, BASE_Y_TEAM2)] {
        for quarter in 1..=QUARTERS as u32 {
            regions.push(Region {
                name: format!("{}_q{}", team, quarter),
                x: BASE_X_TEAM + (quarter - 1) * X_OFFSET_TEAM,
                y: base_y,
                width: TEAM_QUARTER_WIDTH,
                height: TEAM_QUARTER_HEIGHT,
            });
        }
    }

    regions
}

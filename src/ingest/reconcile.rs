//! Turns hashed records into destination rows.
//!
//! For each record: skip it if its hash is already in the ledger, work out
//! team totals, each player's positional matchup and the game outcome,
//! then append one row per player to the friendly or opponent table and
//! one summary row to the game table, all under a fresh game id.
//!
//! The ledger and the highest game id are read once when the reconciler is
//! opened. Writers running at the same time are not detected.
//!
//! Rows are not written atomically. A fatal failure partway through a record
//! leaves its earlier player rows in place with no game row; the next run
//! reuses that game id and writes those player rows again.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use super::retry::{RetryPolicy, with_backoff};
use super::store::{Table, TableStore, to_cell};
use crate::record::{PlayerStat, QUARTERS, Record, TeamQuarters, TeamSide, quarter_key};

/// Column headers for the friendly and opponent tables.
pub const PLAYER_COLUMNS: [&str; 25] = [
    "GameID", "Team", "PlayerNumber", "Name", "Position", "Grade", "Points", "Rebounds",
    "Assists", "Steals", "Blocks", "Fouls", "TOs", "FGM", "FGA", "3PM", "3PA", "2PM", "2PA",
    "FTM", "FTA", "Result", "Matchup", "Timestamp", "Hash",
];

/// Column headers for the game table. The last column is the ledger.
pub const GAME_COLUMNS: [&str; 43] = [
    "GameID", "FriendlyTeam", "OpponentTeam", "F_Q1", "O_Q1", "F_Q2", "O_Q2", "F_Q3", "O_Q3",
    "F_Q4", "O_Q4", "F_Total", "O_Total", "F_Rebounds", "O_Rebounds", "F_Assists", "O_Assists",
    "F_Steals", "O_Steals", "F_Blocks", "O_Blocks", "F_Fouls", "O_Fouls", "F_TOs", "O_TOs",
    "F_FGM", "O_FGM", "F_FGA", "O_FGA", "F_3PM", "O_3PM", "F_3PA", "O_3PA", "F_2PM", "O_2PM",
    "F_2PA", "O_2PA", "F_FTM", "O_FTM", "F_FTA", "O_FTA", "Timestamp", "Hash",
];

/// A record as read back from a pending JSON file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GameDocument {
    #[serde(flatten)]
    pub record: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team1_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team2_name: Option<String>,
}

impl GameDocument {
    pub fn team_name(&self, side: TeamSide) -> String {
        let name = match side {
            TeamSide::Team1 => &self.team1_name,
            TeamSide::Team2 => &self.team2_name,
        };
        name.clone().unwrap_or_else(|| side.to_string())
    }
}

impl From<Record> for GameDocument {
    fn from(record: Record) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "W",
            Outcome::Loss => "L",
        }
    }
}

/// Summed counting stats for one team.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeamTotals {
    pub rebounds: i64,
    pub assists: i64,
    pub steals: i64,
    pub blocks: i64,
    pub fouls: i64,
    pub tos: i64,
    pub fgm: i64,
    pub fga: i64,
    pub three_pm: i64,
    pub three_pa: i64,
    pub two_pm: i64,
    pub two_pa: i64,
    pub ftm: i64,
    pub fta: i64,
}

impl TeamTotals {
    /// Values in game-table column order.
    fn columns(&self) -> [i64; 14] {
        [
            self.rebounds,
            self.assists,
            self.steals,
            self.blocks,
            self.fouls,
            self.tos,
            self.fgm,
            self.fga,
            self.three_pm,
            self.three_pa,
            self.two_pm,
            self.two_pa,
            self.ftm,
            self.fta,
        ]
    }
}

/// Parses a stat string, counting anything unreadable as 0.
pub fn stat_value(text: &str) -> i64 {
    match text.trim().parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            warn!("Non-numeric stat '{}', counting as 0", text);
            0
        }
    }
}

/// Two-point makes and attempts: field goals minus threes.
pub fn two_pointers(player: &PlayerStat) -> (i64, i64) {
    (
        stat_value(&player.fgm) - stat_value(&player.three_pm),
        stat_value(&player.fga) - stat_value(&player.three_pa),
    )
}

/// Sums every player on `side`.
pub fn team_totals(players: &[PlayerStat], side: TeamSide) -> TeamTotals {
    players
        .iter()
        .filter(|p| p.team == side)
        .fold(TeamTotals::default(), |mut t, p| {
            let (two_pm, two_pa) = two_pointers(p);
            t.rebounds += stat_value(&p.rebounds);
            t.assists += stat_value(&p.assists);
            t.steals += stat_value(&p.steals);
            t.blocks += stat_value(&p.blocks);
            t.fouls += stat_value(&p.fouls);
            t.tos += stat_value(&p.tos);
            t.fgm += stat_value(&p.fgm);
            t.fga += stat_value(&p.fga);
            t.three_pm += stat_value(&p.three_pm);
            t.three_pa += stat_value(&p.three_pa);
            t.two_pm += two_pm;
            t.two_pa += two_pa;
            t.ftm += stat_value(&p.ftm);
            t.fta += stat_value(&p.fta);
            t
        })
}

/// Score for one quarter; missing cells count as 0.
fn quarter_score(quarters: &TeamQuarters, quarter: u8) -> String {
    quarters
        .get(&quarter_key(quarter))
        .cloned()
        .unwrap_or_else(|| "0".to_string())
}

/// Sum of the four quarter scores.
pub fn game_total(quarters: &TeamQuarters) -> i64 {
    (1..=QUARTERS).map(|q| stat_value(&quarter_score(quarters, q))).sum()
}

/// Outcomes for (team1, team2). The higher total wins; a tie goes to team2.
pub fn outcomes(team1_total: i64, team2_total: i64) -> (Outcome, Outcome) {
    if team1_total > team2_total {
        (Outcome::Win, Outcome::Loss)
    } else {
        (Outcome::Loss, Outcome::Win)
    }
}

/// First player on the other team listed at the same position.
pub fn find_matchup<'a>(players: &'a [PlayerStat], player: &PlayerStat) -> Option<&'a PlayerStat> {
    players
        .iter()
        .find(|p| p.team == player.team.other() && p.position == player.position)
}

/// Result of ingesting one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The hash was already in the ledger; nothing was written.
    Duplicate,
    /// Rows were written under this game id.
    Ingested { game_id: u64, player_rows: usize },
}

fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Writes records into a [`TableStore`].
pub struct Reconciler<S: TableStore> {
    store: S,
    policy: RetryPolicy,
    known_hashes: HashSet<String>,
    next_game_id: u64,
    sleeper: Box<dyn FnMut(Duration)>,
    clock: fn() -> String,
}

impl<S: TableStore> Reconciler<S> {
    /// Reads the ledger and the highest game id from `store`.
    pub fn open(store: S, policy: RetryPolicy) -> Result<Self> {
        let known_hashes = store.ledger_hashes().context("Failed to read ledger hashes")?;
        let next_game_id = store.max_game_id().context("Failed to read game ids")?.map_or(1, |id| id + 1);

        info!(
            "Ledger has {} hashes; next game id is {}",
            known_hashes.len(),
            next_game_id
        );

        Ok(Self {
            store,
            policy,
            known_hashes,
            next_game_id,
            sleeper: Box::new(std::thread::sleep),
            clock: now_iso,
        })
    }

    /// Replaces the backoff sleep, e.g. to record waits instead.
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Replaces the row timestamp source.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    /// Whether `hash` is in the ledger or was ingested during this run.
    pub fn is_known(&self, hash: &str) -> bool {
        self.known_hashes.contains(hash)
    }

    pub fn next_game_id(&self) -> u64 {
        self.next_game_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Ingests one document, with `friendly` naming the user's team.
    pub fn ingest(&mut self, doc: &GameDocument, friendly: TeamSide) -> Result<IngestOutcome> {
        let record = &doc.record;
        if self.known_hashes.contains(&record.hash) {
            info!("Hash {} already exists, skipping", record.hash);
            return Ok(IngestOutcome::Duplicate);
        }

        let game_id = self.next_game_id;
        let timestamp = (self.clock)();

        let team1_total = game_total(&record.teams.team1_quarters);
        let team2_total = game_total(&record.teams.team2_quarters);
        let (team1_outcome, team2_outcome) = outcomes(team1_total, team2_total);
        let outcome_for = |side: TeamSide| match side {
            TeamSide::Team1 => team1_outcome,
            TeamSide::Team2 => team2_outcome,
        };

        let mut player_rows = 0;
        for player in &record.players {
            let matchup = find_matchup(&record.players, player)
                .map(|m| m.name.to_lowercase())
                .unwrap_or_default();
            let row = player_row(
                game_id,
                player,
                outcome_for(player.team),
                &matchup,
                &timestamp,
                &record.hash,
            );
            let table = if player.team == friendly {
                Table::Friendly
            } else {
                Table::Opponent
            };
            self.append(table, &row)?;
            player_rows += 1;
        }

        let summary = GameSummary {
            game_id,
            friendly_name: doc.team_name(friendly),
            opponent_name: doc.team_name(friendly.other()),
            friendly_quarters: record.teams.quarters(friendly),
            opponent_quarters: record.teams.quarters(friendly.other()),
            friendly_totals: team_totals(&record.players, friendly),
            opponent_totals: team_totals(&record.players, friendly.other()),
        };
        self.append(Table::Game, &summary.row(&timestamp, &record.hash))?;

        info!(
            "Game {} ingested: {} player rows, {} {} - {} {}",
            game_id,
            player_rows,
            TeamSide::Team1,
            team1_total,
            team2_total,
            TeamSide::Team2
        );

        self.known_hashes.insert(record.hash.clone());
        self.next_game_id += 1;

        Ok(IngestOutcome::Ingested { game_id, player_rows })
    }

    fn append(&mut self, table: Table, row: &[Value]) -> Result<()> {
        let Self { store, policy, sleeper, .. } = self;
        let what = format!("append to {:?} table", table);

        // The store is needed both to write and to classify its own errors.
        let store_cell = std::cell::RefCell::new(store);
        with_backoff(
            policy,
            &what,
            || store_cell.borrow_mut().append_row(table, row),
            |err| store_cell.borrow().classify(err),
            sleeper.as_mut(),
        )
    }
}

fn player_row(
    game_id: u64,
    player: &PlayerStat,
    outcome: Outcome,
    matchup: &str,
    timestamp: &str,
    hash: &str,
) -> Vec<Value> {
    let (two_pm, two_pa) = two_pointers(player);
    vec![
        Value::from(game_id),
        Value::from(player.team.as_str()),
        Value::from(player.player_number),
        Value::from(player.name.to_lowercase()),
        Value::from(player.position.as_str()),
        to_cell(&player.grade),
        to_cell(&player.points),
        to_cell(&player.rebounds),
        to_cell(&player.assists),
        to_cell(&player.steals),
        to_cell(&player.blocks),
        to_cell(&player.fouls),
        to_cell(&player.tos),
        to_cell(&player.fgm),
        to_cell(&player.fga),
        to_cell(&player.three_pm),
        to_cell(&player.three_pa),
        Value::from(two_pm),
        Value::from(two_pa),
        to_cell(&player.ftm),
        to_cell(&player.fta),
        Value::from(outcome.as_str()),
        Value::from(matchup),
        Value::from(timestamp),
        Value::from(hash),
    ]
}

struct GameSummary<'a> {
    game_id: u64,
    friendly_name: String,
    opponent_name: String,
    friendly_quarters: &'a TeamQuarters,
    opponent_quarters: &'a TeamQuarters,
    friendly_totals: TeamTotals,
    opponent_totals: TeamTotals,
}

impl GameSummary<'_> {
    fn row(&self, timestamp: &str, hash: &str) -> Vec<Value> {
        let mut row = Vec::with_capacity(GAME_COLUMNS.len());
        row.push(Value::from(self.game_id));
        row.push(Value::from(self.friendly_name.as_str()));
        row.push(Value::from(self.opponent_name.as_str()));

        for q in 1..=QUARTERS {
            row.push(to_cell(&quarter_score(self.friendly_quarters, q)));
            row.push(to_cell(&quarter_score(self.opponent_quarters, q)));
        }
        row.push(Value::from(game_total(self.friendly_quarters)));
        row.push(Value::from(game_total(self.opponent_quarters)));

        for (f, o) in self
            .friendly_totals
            .columns()
            .into_iter()
            .zip(self.opponent_totals.columns())
        {
            row.push(Value::from(f));
            row.push(Value::from(o));
        }

        row.push(Value::from(timestamp));
        row.push(Value::from(hash));
        row
    }
}

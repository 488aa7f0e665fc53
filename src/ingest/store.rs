//! Destination tables.
//!
//! A store holds three append-only tables. The game table doubles as the
//! ledger: its first column is the game id and its last column the record
//! hash. Stores also decide which of their own failures are worth retrying.

use anyhow::{Result, anyhow};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// The three destination tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    /// Player rows for the friendly team
    Friendly,
    /// Player rows for the opponent team
    Opponent,
    /// One summary row per game
    Game,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Friendly, Table::Opponent, Table::Game];
}

/// How a failed store call should be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Back off and try again
    RateLimited,
    /// Give up immediately
    Fatal,
}

pub trait TableStore {
    /// Every hash in the game table's ledger column.
    fn ledger_hashes(&self) -> Result<HashSet<String>>;

    /// Largest numeric game id in the game table, if any.
    fn max_game_id(&self) -> Result<Option<u64>>;

    /// Appends one row to a table.
    fn append_row(&mut self, table: Table, row: &[Value]) -> Result<()>;

    /// Classifies an error returned by this store.
    fn classify(&self, _err: &anyhow::Error) -> ErrorClass {
        ErrorClass::Fatal
    }
}

/// Marker error a `MemoryStore` raises for scripted rate limiting.
#[derive(Debug)]
pub struct RateLimited;

impl std::fmt::Display for RateLimited {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("rate limit exceeded")
    }
}

impl std::error::Error for RateLimited {}

/// Scripted outcome for a future append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptedFailure {
    RateLimited,
    Fatal,
}

/// Tables kept in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<Table, Vec<Vec<Value>>>,
    failures: VecDeque<Option<ScriptedFailure>>,
    append_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues failures consumed by the next appends, in order.
    pub fn fail_next(&mut self, failures: impl IntoIterator<Item = ScriptedFailure>) {
        self.failures.extend(failures.into_iter().map(Some));
    }

    /// Lets `successes` appends through, then fails the next one.
    pub fn fail_after(&mut self, successes: usize, failure: ScriptedFailure) {
        self.failures.extend(std::iter::repeat_n(None, successes));
        self.failures.push_back(Some(failure));
    }

    pub fn rows(&self, table: Table) -> &[Vec<Value>] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of append attempts, failed ones included.
    pub fn append_calls(&self) -> usize {
        self.append_calls
    }
}

impl TableStore for MemoryStore {
    fn ledger_hashes(&self) -> Result<HashSet<String>> {
        Ok(self
            .rows(Table::Game)
            .iter()
            .filter_map(|row| row.last())
            .filter_map(|cell| cell.as_str().map(str::to_string))
            .collect())
    }

    fn max_game_id(&self) -> Result<Option<u64>> {
        Ok(self
            .rows(Table::Game)
            .iter()
            .filter_map(|row| row.first())
            .filter_map(cell_as_id)
            .max())
    }

    fn append_row(&mut self, table: Table, row: &[Value]) -> Result<()> {
        self.append_calls += 1;
        match self.failures.pop_front().flatten() {
            Some(ScriptedFailure::RateLimited) => Err(anyhow::Error::new(RateLimited)),
            Some(ScriptedFailure::Fatal) => Err(anyhow!("store rejected row")),
            None => {
                self.tables.entry(table).or_default().push(row.to_vec());
                Ok(())
            }
        }
    }

    fn classify(&self, err: &anyhow::Error) -> ErrorClass {
        if err.downcast_ref::<RateLimited>().is_some() {
            ErrorClass::RateLimited
        } else {
            ErrorClass::Fatal
        }
    }
}

/// Reads a game id cell written as a number or a digit string.
pub fn cell_as_id(cell: &Value) -> Option<u64> {
    match cell {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

/// Converts a cell to a number when it reads as one.
pub fn to_cell(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = text.parse::<f64>()
        && f.is_finite()
    {
        return Value::from(f);
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_ledger() {
        let mut store = MemoryStore::new();
        assert!(store.ledger_hashes().unwrap().is_empty());
        assert_eq!(store.max_game_id().unwrap(), None);

        store.append_row(Table::Game, &[json!(3), json!("x"), json!("abc")]).unwrap();
        store.append_row(Table::Game, &[json!("7"), json!("y"), json!("def")]).unwrap();
        store.append_row(Table::Friendly, &[json!(99), json!("zzz")]).unwrap();

        let hashes = store.ledger_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains("abc") && hashes.contains("def"));
        assert_eq!(store.max_game_id().unwrap(), Some(7));
    }

    #[test]
    fn test_memory_store_scripted_failures() {
        let mut store = MemoryStore::new();
        store.fail_next([ScriptedFailure::RateLimited, ScriptedFailure::Fatal]);

        let err = store.append_row(Table::Game, &[]).unwrap_err();
        assert_eq!(store.classify(&err), ErrorClass::RateLimited);

        let err = store.append_row(Table::Game, &[]).unwrap_err();
        assert_eq!(store.classify(&err), ErrorClass::Fatal);

        store.append_row(Table::Game, &[]).unwrap();
        assert_eq!(store.rows(Table::Game).len(), 1);
        assert_eq!(store.append_calls(), 3);
    }

    #[test]
    fn test_memory_store_fail_after() {
        let mut store = MemoryStore::new();
        store.fail_after(2, ScriptedFailure::Fatal);

        store.append_row(Table::Game, &[]).unwrap();
        store.append_row(Table::Game, &[]).unwrap();
        assert!(store.append_row(Table::Game, &[]).is_err());
        store.append_row(Table::Game, &[]).unwrap();
        assert_eq!(store.rows(Table::Game).len(), 3);
    }

    #[test]
    fn test_to_cell() {
        assert_eq!(to_cell("12"), json!(12));
        assert_eq!(to_cell("-3"), json!(-3));
        assert_eq!(to_cell("1.5"), json!(1.5));
        assert_eq!(to_cell("W"), json!("W"));
        assert_eq!(to_cell(""), json!(""));
        assert_eq!(to_cell("nan"), json!("nan"));
    }

    #[test]
    fn test_cell_as_id() {
        assert_eq!(cell_as_id(&json!(4)), Some(4));
        assert_eq!(cell_as_id(&json!("12")), Some(12));
        assert_eq!(cell_as_id(&json!("GameID")), None);
        assert_eq!(cell_as_id(&json!(-1)), None);
    }
}

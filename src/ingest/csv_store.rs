//! CSV-file destination.
//!
//! Each table is a CSV file with a header row. Rows are appended by opening
//! the file in append mode for every write, so completed games survive a
//! crash partway through a batch.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::reconcile::{GAME_COLUMNS, PLAYER_COLUMNS};
use super::store::{Table, TableStore, cell_as_id};

pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Opens (and creates if needed) the three table files under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create table directory {}", dir.display()))?;
        let store = Self { dir: dir.to_path_buf() };
        for table in Table::ALL {
            init_csv(&store.path(table), header(table))?;
        }
        Ok(store)
    }

    pub fn path(&self, table: Table) -> PathBuf {
        let file = match table {
            Table::Friendly => "f_db.csv",
            Table::Opponent => "o_db.csv",
            Table::Game => "game_db.csv",
        };
        self.dir.join(file)
    }

    /// Data rows of the game table, header skipped.
    fn game_rows(&self) -> Result<Vec<Vec<String>>> {
        let path = self.path(Table::Game);
        let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut rows = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line from CSV")?;
            if line_num == 0 || line.trim().is_empty() {
                continue;
            }
            rows.push(split_csv_line(&line));
        }
        Ok(rows)
    }
}

fn header(table: Table) -> &'static [&'static str] {
    match table {
        Table::Friendly | Table::Opponent => &PLAYER_COLUMNS[..],
        Table::Game => &GAME_COLUMNS[..],
    }
}

impl TableStore for CsvStore {
    fn ledger_hashes(&self) -> Result<HashSet<String>> {
        Ok(self
            .game_rows()?
            .into_iter()
            .filter_map(|mut row| row.pop())
            .filter(|hash| !hash.is_empty())
            .collect())
    }

    fn max_game_id(&self) -> Result<Option<u64>> {
        Ok(self
            .game_rows()?
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|id| cell_as_id(&Value::String(id.clone())))
            .max())
    }

    fn append_row(&mut self, table: Table, row: &[Value]) -> Result<()> {
        let path = self.path(table);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;

        let line = row.iter().map(format_cell).collect::<Vec<_>>().join(",");
        writeln!(file, "{}", line).context("Failed to write CSV row")?;
        Ok(())
    }
}

/// Writes the header if the file doesn't exist or is empty.
///
/// If the file exists and has content, this does nothing (preserves existing data).
pub fn init_csv(path: &Path, columns: &[&str]) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", columns.join(",")).context("Failed to write CSV header")?;
    Ok(())
}

/// Renders one cell, quoting text that contains a delimiter or quote.
fn format_cell(cell: &Value) -> String {
    let text = match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// Splits a CSV line, honouring double-quoted cells.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_headers() {
        let dir = tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();

        let content = fs::read_to_string(store.path(Table::Game)).unwrap();
        assert!(content.starts_with("GameID,FriendlyTeam,OpponentTeam"));
        let content = fs::read_to_string(store.path(Table::Friendly)).unwrap();
        assert!(content.starts_with("GameID,Team,PlayerNumber"));
    }

    #[test]
    fn test_open_preserves_existing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("game_db.csv"), "existing,data\n1,abc\n").unwrap();

        let store = CsvStore::open(dir.path()).unwrap();
        let content = fs::read_to_string(store.path(Table::Game)).unwrap();
        assert!(content.starts_with("existing,data"));
        assert_eq!(store.max_game_id().unwrap(), Some(1));
        assert!(store.ledger_hashes().unwrap().contains("abc"));
    }

    #[test]
    fn test_append_and_read_ledger() {
        let dir = tempdir().unwrap();
        let mut store = CsvStore::open(dir.path()).unwrap();
        assert_eq!(store.max_game_id().unwrap(), None);

        store.append_row(Table::Game, &[json!(1), json!("Team, Inc"), json!("h1")]).unwrap();
        store.append_row(Table::Game, &[json!(2), json!("say \"hi\""), json!("h2")]).unwrap();

        let hashes = store.ledger_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains("h1") && hashes.contains("h2"));
        assert_eq!(store.max_game_id().unwrap(), Some(2));

        let content = fs::read_to_string(store.path(Table::Game)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,\"Team, Inc\",h1");
    }

    #[test]
    fn test_split_csv_line() {
        assert_eq!(split_csv_line("a,b,,c"), vec!["a", "b", "", "c"]);
        assert_eq!(split_csv_line("1,\"x, y\",\"q\"\"q\""), vec!["1", "x, y", "q\"q"]);
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&json!(12)), "12");
        assert_eq!(format_cell(&json!("plain")), "plain");
        assert_eq!(format_cell(&json!("a,b")), "\"a,b\"");
        assert_eq!(format_cell(&Value::Null), "");
    }
}

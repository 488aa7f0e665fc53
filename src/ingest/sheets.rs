//! Spreadsheet destination over the Sheets v4 values REST API.
//!
//! Authentication is handled elsewhere: the store only reads a ready
//! OAuth access token from an environment variable.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use super::reconcile::GAME_COLUMNS;
use super::store::{ErrorClass, Table, TableStore, cell_as_id};
use crate::config::StoreConfig;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Non-success HTTP response from the spreadsheet API.
#[derive(Debug)]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spreadsheet API returned HTTP {}: {}", self.status, self.body)
    }
}

impl std::error::Error for HttpStatusError {}

impl HttpStatusError {
    pub fn is_rate_limited(&self) -> bool {
        if self.status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            || self.status == StatusCode::SERVICE_UNAVAILABLE.as_u16()
        {
            return true;
        }
        let lower = self.body.to_lowercase();
        lower.contains("rate limit")
            || lower.contains("rate_limit")
            || lower.contains("too many requests")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsStore {
    client: Client,
    spreadsheet_id: String,
    token: String,
    friendly_table: String,
    opponent_table: String,
    game_table: String,
}

impl SheetsStore {
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        if config.spreadsheet_id.is_empty() {
            return Err(anyhow!("store.spreadsheet_id is not set"));
        }
        let token = std::env::var(&config.access_token_env)
            .with_context(|| format!("{} is not set", config.access_token_env))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("boxscore-ocr")
            .build()?;

        Ok(Self {
            client,
            spreadsheet_id: config.spreadsheet_id.clone(),
            token,
            friendly_table: config.friendly_table.clone(),
            opponent_table: config.opponent_table.clone(),
            game_table: config.game_table.clone(),
        })
    }

    fn sheet_name(&self, table: Table) -> &str {
        match table {
            Table::Friendly => &self.friendly_table,
            Table::Opponent => &self.opponent_table,
            Table::Game => &self.game_table,
        }
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = Url::parse(API_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("bad API base URL"))?
            .pop_if_empty()
            .extend([self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    fn game_rows(&self) -> Result<Vec<Vec<Value>>> {
        let range = format!("'{}'", self.game_table);
        let response = self
            .client
            .get(self.values_url(&range)?)
            .bearer_auth(&self.token)
            .send()
            .context("Failed to reach spreadsheet API")?;
        let response = check_status(response)?;
        let body: ValueRange = response.json().context("Unexpected values response")?;
        Ok(body.values)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(anyhow::Error::new(HttpStatusError {
        status: status.as_u16(),
        body,
    }))
}

impl TableStore for SheetsStore {
    fn ledger_hashes(&self) -> Result<HashSet<String>> {
        let hash_col = GAME_COLUMNS.len() - 1;
        Ok(self
            .game_rows()?
            .iter()
            .filter_map(|row| row.get(hash_col))
            .filter_map(|cell| cell.as_str())
            .filter(|hash| !hash.is_empty() && *hash != "Hash")
            .map(str::to_string)
            .collect())
    }

    fn max_game_id(&self) -> Result<Option<u64>> {
        Ok(self
            .game_rows()?
            .iter()
            .filter_map(|row| row.first())
            .filter_map(cell_as_id)
            .max())
    }

    fn append_row(&mut self, table: Table, row: &[Value]) -> Result<()> {
        let range = format!("'{}'!A1", self.sheet_name(table));
        let mut url = self.values_url(&format!("{}:append", range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        debug!("Appending {} cells to {}", row.len(), self.sheet_name(table));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": [row] }))
            .send()
            .context("Failed to reach spreadsheet API")?;
        check_status(response)?;
        Ok(())
    }

    fn classify(&self, err: &anyhow::Error) -> ErrorClass {
        match err.downcast_ref::<HttpStatusError>() {
            Some(e) if e.is_rate_limited() => ErrorClass::RateLimited,
            _ => ErrorClass::Fatal,
        }
    }
}

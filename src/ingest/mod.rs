//! Reconciliation of extracted records into destination tables.

pub mod csv_store;
pub mod reconcile;
pub mod retry;
pub mod sheets;
pub mod store;

pub use csv_store::CsvStore;
pub use reconcile::{GameDocument, IngestOutcome, Reconciler};
pub use retry::{RetryPolicy, with_backoff};
pub use sheets::{HttpStatusError, SheetsStore};
pub use store::{ErrorClass, MemoryStore, ScriptedFailure, Table, TableStore};

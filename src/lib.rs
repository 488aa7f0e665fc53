//! Box-score screenshot extraction and table ingestion.

pub mod config;
pub mod hash;
pub mod ingest;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod record;

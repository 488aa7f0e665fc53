pub mod assemble;
pub mod engine;
pub mod normalize;
pub mod preprocess;
pub mod regions;
pub mod setup;

pub use engine::{CannedRecognizer, TesseractRecognizer, TextRecognizer};
pub use regions::{Region, RegionKind, region_catalog};
pub use setup::ensure_tessdata;

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::record::Record;
use preprocess::{crop_region, enhance_digits};

/// High-level function: screenshot → hashed record.
///
/// Every catalog region is cropped, enhanced if it is a numeric cell, run
/// through the recognizer with its allowlist, and normalized. The texts are
/// then assembled in catalog order and the record is sealed with its hash.
pub fn extract_record(img: &RgbaImage, recognizer: &dyn TextRecognizer) -> Result<Record> {
    let mut texts: Vec<(String, String)> = Vec::new();

    for region in region_catalog() {
        let Some(kind) = region.kind() else {
            warn!("Skipping region with unknown name: {}", region.name);
            continue;
        };

        let cropped = crop_region(img, &region);
        let prepared = if kind.needs_enhancement() {
            enhance_digits(&cropped)
        } else {
            cropped
        };

        let tokens = recognizer
            .recognize(&prepared, kind.allowlist())
            .with_context(|| format!("Recognition failed for region {}", region.name))?;
        let text = normalize::normalize(&tokens, kind);
        debug!("{}: {:?} -> '{}'", region.name, tokens, text);

        texts.push((region.name, text));
    }

    let mut record = assemble::assemble(texts.iter().map(|(n, t)| (n.as_str(), t.as_str())));
    crate::hash::seal(&mut record)?;
    Ok(record)
}

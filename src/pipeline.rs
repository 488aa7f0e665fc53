//! Folder-level batch drivers.
//!
//! Extraction turns each screenshot in the input folder into a pending JSON
//! document and archives the image. Ingestion feeds each pending document to
//! a [`Reconciler`] and moves it to the done folder. Both process one file at
//! a time, in name order.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::ingest::{GameDocument, IngestOutcome, Reconciler, TableStore};
use crate::ocr::{TextRecognizer, extract_record};
use crate::paths::WorkDirs;
use crate::record::TeamSide;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const RESULTS_SUFFIX: &str = "_results.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub failed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub ingested: usize,
    pub duplicates: usize,
    pub unreadable: usize,
}

/// Screenshots in `dir`, sorted by file name.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_files(dir, |path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
    })
}

/// Pending `*_results.json` documents in `dir`, sorted by file name.
pub fn pending_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    list_files(dir, |path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(RESULTS_SUFFIX))
    })
}

fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Name of the pending document written for `image`. The full file name is
/// kept so `game.png` and `game.jpg` do not collide.
pub fn results_name(image: &Path) -> String {
    let name = image
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "screenshot".to_string());
    format!("{}{}", name, RESULTS_SUFFIX)
}

/// Extracts every screenshot in the input folder.
///
/// An image that cannot be loaded or recognized is logged and left where it
/// is; the rest of the batch still runs.
pub fn extract_folder(dirs: &WorkDirs, recognizer: &dyn TextRecognizer) -> Result<ExtractSummary> {
    let images = image_files(&dirs.input_images)?;
    info!("Found {} screenshots in {}", images.len(), dirs.input_images.display());

    let mut summary = ExtractSummary::default();
    for image in images {
        match extract_one(dirs, recognizer, &image) {
            Ok(json_path) => {
                info!("{} -> {}", image.display(), json_path.display());
                summary.extracted += 1;
            }
            Err(e) => {
                error!("Failed to process {}: {:#}", image.display(), e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

fn extract_one(dirs: &WorkDirs, recognizer: &dyn TextRecognizer, image: &Path) -> Result<PathBuf> {
    let img = image::open(image)
        .with_context(|| format!("Failed to load {}", image.display()))?
        .to_rgba8();

    let record = extract_record(&img, recognizer)?;

    let json_path = dirs.pending_json.join(results_name(image));
    if json_path.exists() {
        return Err(anyhow!("{} already exists", json_path.display()));
    }
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(&json_path, json).with_context(|| format!("Failed to write {}", json_path.display()))?;

    move_into(image, &dirs.archived_images)?;
    Ok(json_path)
}

/// Ingests every pending document.
///
/// `friendly` is asked which team in a document is the user's, but only for
/// documents whose hash is not already in the ledger. Documents that fail
/// to parse are logged and left pending. Store failures abort the batch.
pub fn ingest_folder<S: TableStore>(
    dirs: &WorkDirs,
    reconciler: &mut Reconciler<S>,
    mut friendly: impl FnMut(&Path, &GameDocument) -> Result<TeamSide>,
) -> Result<IngestSummary> {
    let documents = pending_documents(&dirs.pending_json)?;
    info!("Found {} pending documents in {}", documents.len(), dirs.pending_json.display());

    let mut summary = IngestSummary::default();
    for path in documents {
        let doc = match read_document(&path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                summary.unreadable += 1;
                continue;
            }
        };

        if reconciler.is_known(&doc.record.hash) {
            info!("{} was already ingested, skipping", path.display());
            summary.duplicates += 1;
            move_into(&path, &dirs.done_json)?;
            continue;
        }

        let side = friendly(&path, &doc)?;
        match reconciler
            .ingest(&doc, side)
            .with_context(|| format!("Failed to ingest {}", path.display()))?
        {
            IngestOutcome::Duplicate => summary.duplicates += 1,
            IngestOutcome::Ingested { game_id, player_rows } => {
                info!(
                    "Ingested {} as game {} ({} player rows)",
                    path.display(),
                    game_id,
                    player_rows
                );
                summary.ingested += 1;
            }
        }

        move_into(&path, &dirs.done_json)?;
    }
    Ok(summary)
}

pub fn read_document(path: &Path) -> Result<GameDocument> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Moves `file` into `dir`, keeping its name. Falls back to copy and remove
/// when a rename is not possible (e.g. across filesystems).
pub fn move_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("No file name in {}", file.display()))?;
    let target = dir.join(name);

    if fs::rename(file, &target).is_err() {
        fs::copy(file, &target)
            .with_context(|| format!("Failed to move {} to {}", file.display(), dir.display()))?;
        fs::remove_file(file).with_context(|| format!("Failed to remove {}", file.display()))?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::ingest::{MemoryStore, RetryPolicy, Table};
    use crate::ocr::CannedRecognizer;
    use crate::record::{PlayerStat, Record};
    use image::{RgbImage, RgbaImage};
    use tempfile::tempdir;

    fn work_dirs(base: &Path) -> WorkDirs {
        let mut config = AppConfig::default();
        config.base_dir = base.to_path_buf();
        let dirs = WorkDirs::from_config(&config);
        dirs.ensure().unwrap();
        dirs
    }

    #[test]
    fn test_image_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = image_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
    }

    #[test]
    fn test_results_name() {
        assert_eq!(results_name(Path::new("/x/game 1.png")), "game 1.png_results.json");
    }

    #[test]
    fn test_extract_folder_archives_and_skips_bad_images() {
        let base = tempdir().unwrap();
        let dirs = work_dirs(base.path());

        RgbaImage::new(384, 216).save(dirs.input_images.join("game.png")).unwrap();
        fs::write(dirs.input_images.join("broken.png"), b"not an image").unwrap();

        let summary = extract_folder(&dirs, &CannedRecognizer::default()).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 1, failed: 1 });

        assert!(dirs.pending_json.join("game.png_results.json").exists());
        assert!(dirs.archived_images.join("game.png").exists());
        assert!(!dirs.input_images.join("game.png").exists());
        assert!(dirs.input_images.join("broken.png").exists());
    }

    #[test]
    fn test_extract_folder_keeps_images_sharing_a_stem() {
        let base = tempdir().unwrap();
        let dirs = work_dirs(base.path());

        RgbaImage::new(384, 216).save(dirs.input_images.join("game.png")).unwrap();
        RgbImage::new(384, 216).save(dirs.input_images.join("game.jpg")).unwrap();

        let recognizer = CannedRecognizer::new([vec!["First"]]);
        let summary = extract_folder(&dirs, &recognizer).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 2, failed: 0 });

        let pending: Vec<String> = pending_documents(&dirs.pending_json)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(pending, vec!["game.jpg_results.json", "game.png_results.json"]);

        let first = read_document(&dirs.pending_json.join("game.jpg_results.json")).unwrap();
        let second = read_document(&dirs.pending_json.join("game.png_results.json")).unwrap();
        assert_eq!(first.record.players[0].name, "First");
        assert_eq!(second.record.players[0].name, "");
    }

    #[test]
    fn test_extract_refuses_to_overwrite_pending_document() {
        let base = tempdir().unwrap();
        let dirs = work_dirs(base.path());

        RgbaImage::new(384, 216).save(dirs.input_images.join("game.png")).unwrap();
        let existing = dirs.pending_json.join("game.png_results.json");
        fs::write(&existing, "{}").unwrap();

        let summary = extract_folder(&dirs, &CannedRecognizer::default()).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 0, failed: 1 });
        assert_eq!(fs::read_to_string(&existing).unwrap(), "{}");
        assert!(dirs.input_images.join("game.png").exists());
    }

    #[test]
    fn test_ingest_folder_moves_documents() {
        let base = tempdir().unwrap();
        let dirs = work_dirs(base.path());

        let mut record = Record::default();
        record.players.push(PlayerStat::new(1, "Ace".to_string()).unwrap());
        crate::hash::seal(&mut record).unwrap();
        let json = serde_json::to_string_pretty(&record).unwrap();
        fs::write(dirs.pending_json.join("a_results.json"), &json).unwrap();
        fs::write(dirs.pending_json.join("b_results.json"), &json).unwrap();
        fs::write(dirs.pending_json.join("c_results.json"), "{ nope").unwrap();

        let mut reconciler = Reconciler::open(MemoryStore::new(), RetryPolicy::default()).unwrap();
        let mut asked = Vec::new();
        let summary = ingest_folder(&dirs, &mut reconciler, |path, _doc| {
            asked.push(path.to_path_buf());
            Ok(TeamSide::Team1)
        })
        .unwrap();

        assert_eq!(summary, IngestSummary { ingested: 1, duplicates: 1, unreadable: 1 });
        // The duplicate is recognised before anyone is asked about it.
        assert_eq!(asked, vec![dirs.pending_json.join("a_results.json")]);
        assert!(dirs.done_json.join("a_results.json").exists());
        assert!(dirs.done_json.join("b_results.json").exists());
        assert!(dirs.pending_json.join("c_results.json").exists());

        let store = reconciler.into_store();
        assert_eq!(store.rows(Table::Game).len(), 1);
        assert_eq!(store.rows(Table::Friendly).len(), 1);
    }

    #[test]
    fn test_ingest_folder_stops_on_role_error() {
        let base = tempdir().unwrap();
        let dirs = work_dirs(base.path());
        fs::write(dirs.pending_json.join("a_results.json"), "{}").unwrap();

        let mut reconciler = Reconciler::open(MemoryStore::new(), RetryPolicy::default()).unwrap();
        let result = ingest_folder(&dirs, &mut reconciler, |_, _| Err(anyhow::anyhow!("no answer")));
        assert!(result.is_err());
        assert!(dirs.pending_json.join("a_results.json").exists());
    }
}

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::AppConfig;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Working folders with `base_dir` applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkDirs {
    pub input_images: PathBuf,
    pub pending_json: PathBuf,
    pub archived_images: PathBuf,
    pub done_json: PathBuf,
    pub tables: PathBuf,
}

impl WorkDirs {
    pub fn from_config(config: &AppConfig) -> Self {
        let base = &config.base_dir;
        Self {
            input_images: resolve(base, &config.folders.input_images),
            pending_json: resolve(base, &config.folders.pending_json),
            archived_images: resolve(base, &config.folders.archived_images),
            done_json: resolve(base, &config.folders.done_json),
            tables: resolve(base, &config.store.csv_dir),
        }
    }

    /// Ensures all working folders exist. Call at startup.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [
            &self.input_images,
            &self.pending_json,
            &self.archived_images,
            &self.done_json,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_work_dirs_resolve_against_base() {
        let mut config = AppConfig::default();
        config.base_dir = PathBuf::from("/data/games");
        config.folders.done_json = PathBuf::from("/archive/json");

        let dirs = WorkDirs::from_config(&config);
        assert_eq!(dirs.input_images, PathBuf::from("/data/games/toProcess/images"));
        assert_eq!(dirs.done_json, PathBuf::from("/archive/json"));
        assert_eq!(dirs.tables, PathBuf::from("/data/games/tables"));
    }

    #[test]
    fn test_ensure_creates_folders() {
        let tmp = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.base_dir = tmp.path().to_path_buf();

        let dirs = WorkDirs::from_config(&config);
        dirs.ensure().unwrap();
        assert!(dirs.input_images.is_dir());
        assert!(dirs.archived_images.is_dir());
    }
}

use anyhow::{Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("boxscore-ocr")
        .join("tesseract")
}

/// Finds the Tesseract executable, checking our local dir first, then system
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
        && output.status.success()
    {
        return Ok(PathBuf::from("tesseract"));
    }

    let common_paths = [
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
    ];

    for path in &common_paths {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
///
/// Returns `None` when only Tesseract's built-in default is left, in which
/// case no `--tessdata-dir` is passed.
pub fn find_tessdata_dir(language: &str) -> Option<PathBuf> {
    let file = format!("{}.traineddata", language);
    let has_data = |p: &Path| p.join(&file).exists();

    let local = get_tesseract_dir().join("tessdata");
    if has_data(&local) {
        return Some(local);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_data(&p) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_data(&p) {
            return Some(p);
        }
    }

    [
        r"C:\Program Files\Tesseract-OCR\tessdata",
        r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| has_data(p))
}

/// Downloads `<language>.traineddata` into the local tessdata dir if no
/// copy can be found. Returns the directory that holds it.
pub fn ensure_tessdata(language: &str) -> Result<PathBuf> {
    if let Some(dir) = find_tessdata_dir(language) {
        info!("tessdata found at: {}", dir.display());
        return Ok(dir);
    }

    let tessdata_dir = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata_dir)?;

    let url = format!("{}/{}.traineddata", TESSDATA_REPO, language);
    let dest = tessdata_dir.join(format!("{}.traineddata", language));
    info!("Downloading {}...", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "boxscore-ocr")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            language,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&dest)?;
    file.write_all(&bytes)?;

    info!("Downloaded {} ({} bytes)", dest.display(), bytes.len());

    Ok(tessdata_dir)
}

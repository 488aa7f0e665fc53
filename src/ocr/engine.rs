use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::config::TesseractConfig;

use super::setup::{find_tessdata_dir, find_tesseract_executable};

/// Turns a cropped cell into text tokens.
///
/// Implementations return tokens in reading order and drop anything below
/// their own confidence threshold. An empty vector means nothing was
/// recognized and is not an error.
pub trait TextRecognizer {
    fn recognize(&self, image: &RgbaImage, allowlist: &str) -> Result<Vec<String>>;
}

/// Represents a single word from Tesseract's TSV output
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Runs the Tesseract CLI on each crop.
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
    page_seg_mode: u32,
    min_confidence: f32,
}

impl TesseractRecognizer {
    /// Resolves the executable and tessdata directory from config, the
    /// local install dir, or the system.
    pub fn from_config(config: &TesseractConfig) -> Result<Self> {
        let executable = match &config.executable {
            Some(path) => path.clone(),
            None => find_tesseract_executable()?,
        };
        let tessdata = match &config.tessdata {
            Some(path) => Some(path.clone()),
            None => find_tessdata_dir(&config.language),
        };

        Ok(Self {
            executable,
            tessdata,
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
            min_confidence: config.min_confidence,
        })
    }

    fn run(&self, image: &RgbaImage, allowlist: &str) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .context("Failed to write crop for Tesseract")?;

        // Create temporary output file (Tesseract adds .tsv extension)
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut cmd = Command::new(&self.executable);
        cmd.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.tessdata {
            cmd.arg("--tessdata-dir").arg(tessdata);
        }
        let output = cmd
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", allowlist))
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to launch {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(tsv_content)
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &RgbaImage, allowlist: &str) -> Result<Vec<String>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let tsv = self.run(image, allowlist)?;
        Ok(parse_tsv_words(&tsv)
            .into_iter()
            .filter(|w| w.confidence >= self.min_confidence)
            .map(|w| w.text)
            .collect())
    }
}

/// Parses word-level rows out of Tesseract TSV output.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only level 5 (word) rows with a
/// non-negative confidence are kept.
pub fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11];

        if level != 5 || conf < 0.0 || text.is_empty() {
            continue;
        }

        words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    words
}

/// Replays scripted token lists, one per `recognize` call.
///
/// Used to drive the pipeline without an OCR engine. Once the script runs
/// out every further call returns an empty result.
#[derive(Default)]
pub struct CannedRecognizer {
    responses: Mutex<VecDeque<Vec<String>>>,
    allowlists: Mutex<Vec<String>>,
}

impl CannedRecognizer {
    pub fn new<I, T, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.into_iter().map(Into::into).collect())
                    .collect(),
            ),
            allowlists: Mutex::new(Vec::new()),
        }
    }

    /// Allowlists seen so far, in call order.
    pub fn allowlists(&self) -> Vec<String> {
        self.allowlists.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl TextRecognizer for CannedRecognizer {
    fn recognize(&self, _image: &RgbaImage, allowlist: &str) -> Result<Vec<String>> {
        if let Ok(mut seen) = self.allowlists.lock() {
            seen.push(allowlist.to_string());
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| anyhow!("canned recognizer poisoned"))?;
        Ok(responses.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_words() {
        let tsv = format!(
            "{}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t100\t30\t-1\t\n\
             4\t1\t1\t1\t1\t0\t2\t2\t90\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t2\t2\t40\t20\t91.5\t7/12\n\
             5\t1\t1\t1\t1\t2\t50\t2\t40\t20\t12.0\tx\n",
            HEADER
        );

        let words = parse_tsv_words(&tsv);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "7/12");
        assert_eq!(words[0].confidence, 91.5);
        assert_eq!(words[1].text, "x");
    }

    #[test]
    fn test_parse_tsv_skips_short_rows() {
        let tsv = format!("{}\n5\t1\t1\n", HEADER);
        assert!(parse_tsv_words(&tsv).is_empty());
    }

    #[test]
    fn test_canned_recognizer_replays_in_order() {
        let rec = CannedRecognizer::new(vec![vec!["a"], vec![], vec!["b", "c"]]);
        let img = RgbaImage::new(1, 1);

        assert_eq!(rec.recognize(&img, "x").unwrap(), vec!["a"]);
        assert!(rec.recognize(&img, "y").unwrap().is_empty());
        assert_eq!(rec.recognize(&img, "z").unwrap(), vec!["b", "c"]);
        assert!(rec.recognize(&img, "z").unwrap().is_empty());
        assert_eq!(rec.allowlists(), vec!["x", "y", "z", "z"]);
    }
}

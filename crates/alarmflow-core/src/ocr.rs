// ── OCR capability ──
//
// The engine treats OCR as a black box: an image path goes in, text
// lines come out. `TesseractOcr` shells out to the tesseract CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::CoreError;

/// Arguments of one OCR run.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Custom installation directory of the OCR software.
    pub software_path: Option<PathBuf>,
    /// Output base path inside the analysis directory (no extension).
    pub analysis_path: PathBuf,
    pub image_path: PathBuf,
}

/// Converts an image into text lines, one per physical line of the fax.
pub trait OcrEngine: Send + Sync {
    fn process(&self, options: &OcrOptions) -> Result<Vec<String>, CoreError>;
}

/// Runs `tesseract <image> <analysis-base> -l <lang>` and reads `<analysis-base>.txt`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    fn binary(software_path: Option<&Path>) -> PathBuf {
        let name = Path::new("tesseract").with_extension(std::env::consts::EXE_EXTENSION);
        match software_path {
            Some(dir) => dir.join(name),
            None => name,
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn process(&self, options: &OcrOptions) -> Result<Vec<String>, CoreError> {
        let binary = Self::binary(options.software_path.as_deref());
        let ocr_error = |message: String| CoreError::Ocr {
            image: options.image_path.clone(),
            message,
        };

        debug!(
            binary = %binary.display(),
            image = %options.image_path.display(),
            "running tesseract"
        );
        let output = Command::new(&binary)
            .arg(&options.image_path)
            .arg(&options.analysis_path)
            .args(["-l", &self.language])
            .output()
            .map_err(|e| ocr_error(format!("could not run {}: {e}", binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ocr_error(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text_file = options.analysis_path.with_extension("txt");
        let text = fs::read_to_string(&text_file)
            .map_err(|e| ocr_error(format!("missing output {}: {e}", text_file.display())))?;
        Ok(text.lines().map(str::to_owned).collect())
    }
}

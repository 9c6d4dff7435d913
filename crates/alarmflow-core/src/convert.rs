// ── PDF conversion ──
//
// Some fax gateways deliver PDFs. They are rasterized into a grayscale
// TIFF before OCR. `GhostscriptConverter` shells out to `gs`.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::CoreError;

/// Rendering resolution of converted pages.
pub const CONVERSION_DPI: u32 = 300;

/// Turns a PDF document into a single TIFF image OCR can read.
pub trait PdfConverter: Send + Sync {
    fn convert(&self, document: &Path, image: &Path) -> Result<(), CoreError>;
}

/// Runs `gs -sDEVICE=tiffgray -r300 ...` on the document.
#[derive(Debug, Clone)]
pub struct GhostscriptConverter {
    program: PathBuf,
}

impl GhostscriptConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(document: &Path, image: &Path) -> Vec<String> {
        vec![
            "-q".into(),
            "-dNOPAUSE".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            "-sDEVICE=tiffgray".into(),
            format!("-r{CONVERSION_DPI}"),
            "-dGraphicsAlphaBits=4".into(),
            "-dTextAlphaBits=4".into(),
            format!("-sOutputFile={}", image.display()),
            document.display().to_string(),
        ]
    }
}

impl PdfConverter for GhostscriptConverter {
    fn convert(&self, document: &Path, image: &Path) -> Result<(), CoreError> {
        let conversion_error = |message: String| CoreError::Conversion {
            document: document.to_path_buf(),
            message,
        };

        debug!(
            program = %self.program.display(),
            document = %document.display(),
            "running ghostscript"
        );
        let output = Command::new(&self.program)
            .args(Self::args(document, image))
            .output()
            .map_err(|e| conversion_error(format!("could not run {}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(conversion_error(format!(
                "ghostscript exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !image.is_file() {
            return Err(conversion_error(format!(
                "ghostscript wrote no image to {}",
                image.display()
            )));
        }
        Ok(())
    }
}

//! External conversion tools for formats without a native Rust parser
//!
//! Supports:
//! - tesseract - OCR for images (flat text or TSV word boxes)
//! - djvutxt (djvulibre) - DjVu text layer
//! - LibreOffice - legacy `.doc` printed to stdout with `--cat`

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Output};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::TextBlock;

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalToolsConfig {
    /// Tesseract language string, e.g. `rus+eng`
    pub ocr_languages: String,
    /// Tesseract binary
    pub tesseract_bin: String,
    /// djvutxt binary
    pub djvutxt_bin: String,
    /// LibreOffice binary
    pub libreoffice_bin: String,
    /// Seconds to wait for a tool before giving up
    pub timeout_secs: u64,
}

impl Default for ExternalToolsConfig {
    fn default() -> Self {
        Self {
            ocr_languages: "rus+eng".to_string(),
            tesseract_bin: "tesseract".to_string(),
            djvutxt_bin: "djvutxt".to_string(),
            libreoffice_bin: "libreoffice".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Which external tools are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub tesseract: bool,
    pub djvutxt: bool,
    pub libreoffice: bool,
}

/// Runs conversion binaries against temporary copies of document bytes
#[derive(Debug, Clone, Default)]
pub struct ExternalTools {
    config: ExternalToolsConfig,
}

impl ExternalTools {
    /// Create a runner from configuration
    pub fn new(config: ExternalToolsConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &ExternalToolsConfig {
        &self.config
    }

    /// Check if tesseract is installed
    pub fn has_tesseract(&self) -> bool {
        probe(&self.config.tesseract_bin, "--version")
    }

    /// Check if djvutxt is installed
    pub fn has_djvutxt(&self) -> bool {
        // djvutxt has no --version; running it bare prints usage and exits non-zero
        Command::new(&self.config.djvutxt_bin).output().is_ok()
    }

    /// Check if LibreOffice is installed
    pub fn has_libreoffice(&self) -> bool {
        probe(&self.config.libreoffice_bin, "--version")
    }

    /// Check every tool; each check spawns a process
    pub fn status(&self) -> ToolStatus {
        ToolStatus {
            tesseract: self.has_tesseract(),
            djvutxt: self.has_djvutxt(),
            libreoffice: self.has_libreoffice(),
        }
    }

    /// Extract the text layer of a DjVu document
    pub fn djvu_to_text(&self, data: &[u8]) -> Result<String> {
        let input = write_temp(data, ".djvu")?;
        let output = self.run(&self.config.djvutxt_bin, |cmd| {
            cmd.arg(input.path());
        })?;
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        tracing::info!("djvutxt extracted {} characters", text.len());
        Ok(text)
    }

    /// Print a legacy Word document as plain text
    pub fn doc_to_text(&self, data: &[u8]) -> Result<String> {
        let input = write_temp(data, ".doc")?;
        let output = self.run(&self.config.libreoffice_bin, |cmd| {
            cmd.args(["--headless", "--cat"]).arg(input.path());
        })?;
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        tracing::info!("LibreOffice extracted {} characters", text.len());
        Ok(text)
    }

    /// OCR an image to flat text
    pub fn image_to_text(&self, data: &[u8], extension: &str) -> Result<String> {
        self.ensure_tesseract()?;
        let input = write_temp(data, &format!(".{}", extension))?;
        let langs = self.config.ocr_languages.clone();
        let output = self.run(&self.config.tesseract_bin, |cmd| {
            cmd.arg(input.path()).args(["stdout", "-l", &langs]);
        })?;
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        tracing::info!("Image OCR extracted {} characters", text.len());
        Ok(text)
    }

    /// OCR an image to positioned blocks
    pub fn image_to_blocks(&self, data: &[u8], extension: &str) -> Result<Vec<TextBlock>> {
        self.ensure_tesseract()?;
        let input = write_temp(data, &format!(".{}", extension))?;
        let langs = self.config.ocr_languages.clone();
        let output = self.run(&self.config.tesseract_bin, |cmd| {
            cmd.arg(input.path()).args(["stdout", "-l", &langs, "tsv"]);
        })?;
        let blocks = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        tracing::info!("Image OCR produced {} blocks", blocks.len());
        Ok(blocks)
    }

    fn ensure_tesseract(&self) -> Result<()> {
        if self.has_tesseract() {
            Ok(())
        } else {
            Err(Error::OcrEngineUnavailable(format!(
                "'{}' not found. Install with: apt install tesseract-ocr",
                self.config.tesseract_bin
            )))
        }
    }

    /// Run a program, failing on spawn error, non-zero exit or timeout
    fn run(&self, program: &str, configure: impl FnOnce(&mut Command)) -> Result<Output> {
        let mut cmd = Command::new(program);
        configure(&mut cmd);

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(cmd.output());
        });

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match rx.recv_timeout(timeout) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::external(program, e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!("{} timed out after {}s", program, self.config.timeout_secs);
                return Err(Error::external(
                    program,
                    format!("timed out after {}s", self.config.timeout_secs),
                ));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(Error::external(program, "process thread crashed"))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::external(
                program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(output)
    }
}

fn probe(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Write bytes to a temp file that is removed on drop
fn write_temp(data: &[u8], suffix: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("docseek-")
        .suffix(suffix)
        .tempfile()?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

/// Parse tesseract TSV output into blocks. Malformed rows are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<TextBlock> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 11 {
                return None;
            }
            let int = |i: usize| cols[i].trim().parse::<i32>().ok();
            let uint = |i: usize| cols[i].trim().parse::<u32>().ok();
            Some(TextBlock {
                level: uint(0)?,
                page: uint(1)?,
                block: uint(2)?,
                paragraph: uint(3)?,
                line: uint(4)?,
                word: uint(5)?,
                left: int(6)?,
                top: int(7)?,
                width: int(8)?,
                height: int(9)?,
                confidence: cols[10].trim().parse::<f32>().ok()?,
                text: cols.get(11).map(|t| t.trim_end_matches('\r').to_string()).unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
5\t1\t1\t1\t1\t1\t36\t92\t60\t18\t96.5\tHello
5\t1\t1\t1\t1\t2\t104\t92\t70\t18\t91\tworld
garbage line";

    #[test]
    fn test_parse_tsv() {
        let blocks = parse_tsv(TSV);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].level, 1);
        assert_eq!(blocks[0].confidence, -1.0);
        assert_eq!(blocks[0].text, "");
        assert_eq!(blocks[1].text, "Hello");
        assert_eq!(blocks[1].left, 36);
        assert_eq!(blocks[2].word, 2);
        assert_eq!(blocks[2].confidence, 91.0);
    }

    #[test]
    fn test_missing_tesseract_is_ocr_unavailable() {
        let tools = ExternalTools::new(ExternalToolsConfig {
            tesseract_bin: "docseek-no-such-tesseract".to_string(),
            ..Default::default()
        });
        let err = tools.image_to_text(b"not an image", "png").unwrap_err();
        assert!(matches!(err, Error::OcrEngineUnavailable(_)));
        let err = tools.image_to_blocks(b"not an image", "png").unwrap_err();
        assert!(matches!(err, Error::OcrEngineUnavailable(_)));
    }

    #[test]
    fn test_missing_converter_is_process_failure() {
        let tools = ExternalTools::new(ExternalToolsConfig {
            djvutxt_bin: "docseek-no-such-djvutxt".to_string(),
            ..Default::default()
        });
        let err = tools.djvu_to_text(b"AT&TFORM").unwrap_err();
        assert!(matches!(err, Error::ExternalProcessFailure { .. }));
    }

    #[test]
    fn test_status_reports_missing_tools() {
        let tools = ExternalTools::new(ExternalToolsConfig {
            tesseract_bin: "docseek-no-such-tesseract".to_string(),
            djvutxt_bin: "docseek-no-such-djvutxt".to_string(),
            libreoffice_bin: "docseek-no-such-libreoffice".to_string(),
            ..Default::default()
        });
        assert_eq!(
            tools.status(),
            ToolStatus {
                tesseract: false,
                djvutxt: false,
                libreoffice: false,
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_status_reports_installed_tools() {
        let tools = ExternalTools::new(ExternalToolsConfig {
            tesseract_bin: "docseek-no-such-tesseract".to_string(),
            djvutxt_bin: "false".to_string(),
            libreoffice_bin: "true".to_string(),
            ..Default::default()
        });
        let status = tools.status();
        assert!(!status.tesseract);
        // djvutxt only needs to start; it exits non-zero without arguments
        assert!(status.djvutxt);
        assert!(status.libreoffice);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_process_failure() {
        let tools = ExternalTools::new(ExternalToolsConfig {
            libreoffice_bin: "false".to_string(),
            ..Default::default()
        });
        let err = tools.doc_to_text(b"\xd0\xcf\x11\xe0").unwrap_err();
        assert!(matches!(err, Error::ExternalProcessFailure { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_is_captured() {
        // `cat <tempfile>` echoes the document bytes back
        let tools = ExternalTools::new(ExternalToolsConfig {
            djvutxt_bin: "cat".to_string(),
            ..Default::default()
        });
        let text = tools.djvu_to_text(b"page one text").unwrap();
        assert_eq!(text, "page one text");
    }
}

//! DOCX → PDF conversion.
//!
//! The PDF is derived from the saved document rather than rendered
//! separately, so both files always show the same content. The default
//! converter shells out to LibreOffice in headless mode.

use crate::error::CaptureError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// The PDF that conversion of `document` produces: same stem, `.pdf`.
pub fn pdf_path_for(document: &Path) -> PathBuf {
    document.with_extension("pdf")
}

/// Converts a saved document into a PDF next to it.
pub trait PdfConverter: Send + Sync {
    /// Convert `document`; returns the path of the produced PDF.
    fn convert(&self, document: &Path)
        -> impl Future<Output = Result<PathBuf, CaptureError>> + Send;
}

/// LibreOffice (`soffice --headless --convert-to pdf`).
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: PathBuf,
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl SofficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PdfConverter for SofficeConverter {
    async fn convert(&self, document: &Path) -> Result<PathBuf, CaptureError> {
        let out_dir = match document.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let pdf = pdf_path_for(document);

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&out_dir)
            .arg(document)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CaptureError::PdfUnavailable {
                binary: self.binary.display().to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CaptureError::PdfFailed {
                path: document.to_path_buf(),
                detail: format!(
                    "{} exited with {}: {}",
                    self.binary.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        // soffice exits 0 even when the input could not be loaded
        if !tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
            return Err(CaptureError::PdfFailed {
                path: document.to_path_buf(),
                detail: format!("no PDF written to {}", pdf.display()),
            });
        }

        info!("Derived PDF: {}", pdf.display());
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_path_keeps_stem() {
        assert_eq!(
            pdf_path_for(Path::new("/w/Extracted_Presentation.docx")),
            PathBuf::from("/w/Extracted_Presentation.pdf")
        );
        assert_eq!(pdf_path_for(Path::new("doc.docx")), PathBuf::from("doc.pdf"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let conv = SofficeConverter::new("/definitely/not/soffice");
        let err = conv.convert(Path::new("x.docx")).await.unwrap_err();
        assert!(matches!(err, CaptureError::PdfUnavailable { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn tool_that_writes_nothing_is_a_failure() {
        // `true` accepts any arguments, exits 0 and writes no PDF.
        if !Path::new("/bin/true").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("d.docx");
        let conv = SofficeConverter::new("/bin/true");
        let err = conv.convert(&doc).await.unwrap_err();
        assert!(matches!(err, CaptureError::PdfFailed { .. }), "got {err:?}");
    }
}

//! Document assembly: headings, text and screenshots into a `.docx`.
//!
//! [`SlideDocument`] is an in-memory model that grows by one entry per slide
//! and is only serialised (with `docx-rs`) when [`SlideDocument::finalize`]
//! is called. Keeping the model separate from the file format lets the
//! pipeline report what it appended without re-reading the archive.

use crate::error::CaptureError;
use docx_rs::{Docx, Paragraph, Pic, Run, Style, StyleType};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// English Metric Units per inch, the unit OOXML uses for drawing sizes.
pub const EMU_PER_INCH: f32 = 914_400.0;

const TITLE_STYLE: &str = "Heading1";
const SLIDE_STYLE: &str = "Heading2";

/// One appended slide.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub index: usize,
    pub text: String,
    pub image_path: PathBuf,
    /// Display size in EMU (width fixed, height keeps the aspect ratio).
    pub image_size_emu: (u32, u32),
    image: Vec<u8>,
}

impl DocumentEntry {
    /// Level-2 heading text for this slide.
    pub fn heading(&self) -> String {
        format!("Slide {}", self.index)
    }
}

/// The output document under construction.
#[derive(Debug, Clone)]
pub struct SlideDocument {
    title: String,
    image_width_emu: u32,
    entries: Vec<DocumentEntry>,
}

impl SlideDocument {
    /// Start an empty document with a level-1 `title` heading.
    pub fn begin(title: impl Into<String>, image_width_inches: f32) -> Self {
        Self {
            title: title.into(),
            image_width_emu: (image_width_inches * EMU_PER_INCH).round() as u32,
            entries: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All slide headings, in document order.
    pub fn slide_headings(&self) -> Vec<String> {
        self.entries.iter().map(DocumentEntry::heading).collect()
    }

    /// Append heading `Slide {index}`, a paragraph of `text`, and the image.
    ///
    /// The image is read immediately, so the screenshot may be deleted
    /// before [`Self::finalize`] runs. Indices must strictly increase.
    ///
    /// Blocking file IO; async callers run it on the blocking pool.
    pub fn append(
        &mut self,
        index: usize,
        text: impl Into<String>,
        image_path: &Path,
    ) -> Result<(), CaptureError> {
        if let Some(last) = self.entries.last() {
            if index <= last.index {
                return Err(CaptureError::DocumentOutOfOrder {
                    index,
                    previous: last.index,
                });
            }
        }

        let image = std::fs::read(image_path).map_err(|e| CaptureError::io(image_path, e))?;
        let (w, h) = image::ImageReader::new(Cursor::new(&image))
            .with_guessed_format()
            .map_err(|e| CaptureError::io(image_path, e))?
            .into_dimensions()
            .map_err(|e| CaptureError::ImageDecode {
                path: image_path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let image_size_emu = scaled_size(w, h, self.image_width_emu);
        self.entries.push(DocumentEntry {
            index,
            text: text.into(),
            image_path: image_path.to_path_buf(),
            image_size_emu,
            image,
        });
        debug!("Appended slide {} to document", index);
        Ok(())
    }

    /// Render the model as a `docx-rs` document.
    pub fn to_docx(&self) -> Docx {
        let mut docx = Docx::new()
            .add_style(
                Style::new(TITLE_STYLE, StyleType::Paragraph)
                    .name("Heading 1")
                    .size(32)
                    .bold()
                    .outline_lvl(0),
            )
            .add_style(
                Style::new(SLIDE_STYLE, StyleType::Paragraph)
                    .name("Heading 2")
                    .size(26)
                    .bold()
                    .outline_lvl(1),
            )
            .add_paragraph(
                Paragraph::new()
                    .style(TITLE_STYLE)
                    .add_run(Run::new().add_text(&self.title)),
            );

        for entry in &self.entries {
            let (w, h) = entry.image_size_emu;
            docx = docx
                .add_paragraph(
                    Paragraph::new()
                        .style(SLIDE_STYLE)
                        .add_run(Run::new().add_text(entry.heading())),
                )
                .add_paragraph(Paragraph::new().add_run(Run::new().add_text(&entry.text)))
                .add_paragraph(
                    Paragraph::new().add_run(Run::new().add_image(Pic::new(&entry.image).size(w, h))),
                );
        }
        docx
    }

    /// Save the document to `path`.
    ///
    /// Writes to a sibling temp file and renames it into place, so a failed
    /// save never leaves a truncated document behind.
    pub fn finalize(&self, path: &Path) -> Result<PathBuf, CaptureError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CaptureError::io(parent, e))?;
        }

        let tmp_path = path.with_extension("docx.tmp");
        let file = File::create(&tmp_path).map_err(|e| CaptureError::io(&tmp_path, e))?;
        self.to_docx()
            .build()
            .pack(file)
            .map_err(|e| CaptureError::DocumentWrite {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        std::fs::rename(&tmp_path, path).map_err(|e| CaptureError::io(path, e))?;

        info!(
            "Saved document with {} slides: {}",
            self.entries.len(),
            path.display()
        );
        Ok(path.to_path_buf())
    }
}

/// Scale `(w, h)` pixels to `width_emu`, keeping the aspect ratio.
fn scaled_size(w: u32, h: u32, width_emu: u32) -> (u32, u32) {
    if w == 0 {
        return (width_emu, 0);
    }
    let height = (width_emu as f64 * h as f64 / w as f64).round() as u32;
    (width_emu, height)
}

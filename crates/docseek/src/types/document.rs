//! Document formats, extraction modes and extracted-text shapes

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Supported file formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Old Microsoft Word document (.doc) - requires LibreOffice
    Doc,
    /// Plain text file
    Txt,
    /// JSON document
    Json,
    /// XML document
    Xml,
    /// JPEG image - requires tesseract
    Jpg,
    /// JPEG image (long extension) - requires tesseract
    Jpeg,
    /// PNG image - requires tesseract
    Png,
    /// TIFF image - requires tesseract
    Tiff,
    /// DjVu document - requires djvutxt
    Djvu,
    /// EPUB ebook
    Epub,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// Old Excel spreadsheet (.xls)
    Xls,
}

impl Format {
    /// Every supported format
    pub const ALL: [Format; 15] = [
        Self::Pdf,
        Self::Docx,
        Self::Doc,
        Self::Txt,
        Self::Json,
        Self::Xml,
        Self::Jpg,
        Self::Jpeg,
        Self::Png,
        Self::Tiff,
        Self::Djvu,
        Self::Epub,
        Self::Pptx,
        Self::Xlsx,
        Self::Xls,
    ];

    /// Detect format from extension (case-insensitive, leading dot allowed)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "txt" => Some(Self::Txt),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tiff" => Some(Self::Tiff),
            "djvu" => Some(Self::Djvu),
            "epub" => Some(Self::Epub),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }

    /// Like `from_extension`, failing with `UnsupportedFormat`
    pub fn parse(ext: &str) -> Result<Self> {
        Self::from_extension(ext).ok_or_else(|| Error::UnsupportedFormat(ext.to_string()))
    }

    /// Canonical lowercase extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Djvu => "djvu",
            Self::Epub => "epub",
            Self::Pptx => "pptx",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
        }
    }

    /// The extraction strategy for this format
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Pdf => Strategy::PagedBinary,
            Self::Docx => Strategy::WordProcessor,
            Self::Pptx => Strategy::SlideDeck,
            Self::Json | Self::Xml => Strategy::Structured,
            Self::Txt => Strategy::PlainText,
            Self::Jpg | Self::Jpeg | Self::Png | Self::Tiff => Strategy::Image,
            Self::Djvu | Self::Doc => Strategy::ExternalProcess,
            Self::Epub => Strategy::Ebook,
            Self::Xlsx | Self::Xls => Strategy::Spreadsheet,
        }
    }

    /// Check if this format needs an external binary
    pub fn requires_external_tools(&self) -> bool {
        matches!(
            self.strategy(),
            Strategy::Image | Strategy::ExternalProcess
        )
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// How a format family is turned into text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Per-page text in page order
    PagedBinary,
    /// Paragraph text joined by newlines
    WordProcessor,
    /// `Slide N:` headers followed by shape text
    SlideDeck,
    /// Raw text or a parsed tree
    Structured,
    /// Bytes decoded as text
    PlainText,
    /// OCR
    Image,
    /// Conversion binary stdout
    ExternalProcess,
    /// XHTML item text
    Ebook,
    /// One section per sheet
    Spreadsheet,
}

/// Output mode for JSON and XML
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StructuredMode {
    /// Return the document text as-is
    #[default]
    Raw,
    /// Return a parsed tree
    Dict,
}

/// Output mode for images
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Flat recognized text
    #[default]
    Text,
    /// Positioned word/line blocks
    Blocks,
}

/// Extraction options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Mode for JSON and XML
    pub structured: StructuredMode,
    /// Mode for images
    pub image: ImageMode,
    /// Log a warning when a mode is requested for a format that ignores it
    pub warn_on_ignored_mode: bool,
}

impl ExtractOptions {
    /// Options requesting parsed trees for structured formats
    pub fn dict() -> Self {
        Self {
            structured: StructuredMode::Dict,
            ..Self::default()
        }
    }

    /// Options requesting positioned blocks for images
    pub fn blocks() -> Self {
        Self {
            image: ImageMode::Blocks,
            ..Self::default()
        }
    }

    /// Enable warnings for ignored modes
    pub fn warn_ignored(mut self) -> Self {
        self.warn_on_ignored_mode = true;
        self
    }
}

/// A document handed to the extractor
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Caller-supplied document name
    pub name: String,
    /// Declared extension, if any
    pub extension: Option<String>,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl DocumentSource {
    /// Create a source whose extension is taken from the name
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        Self {
            name,
            extension,
            data,
        }
    }

    /// Create a source with an explicitly declared extension
    pub fn with_extension(
        name: impl Into<String>,
        extension: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            extension: Some(extension.into()),
            data,
        }
    }

    /// Resolve the declared extension to a format
    pub fn format(&self) -> Result<Format> {
        match &self.extension {
            Some(ext) => Format::parse(ext),
            None => Err(Error::UnsupportedFormat(format!(
                "'{}' has no extension",
                self.name
            ))),
        }
    }
}

/// A positioned piece of OCR output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub level: u32,
    pub page: u32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
    pub word: u32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// Recognition confidence, -1 for non-word levels
    pub confidence: f32,
    pub text: String,
}

/// Result of extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum ExtractedText {
    /// Flat text
    Text(String),
    /// Parsed JSON/XML tree
    Structured(serde_json::Value),
    /// OCR blocks
    Blocks(Vec<TextBlock>),
}

impl Default for ExtractedText {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ExtractedText {
    /// Borrow the flat text, if this is the text shape
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flatten any shape into text suitable for chunking
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Structured(value) => value.to_string(),
            Self::Blocks(blocks) => blocks
                .into_iter()
                .map(|b| b.text)
                .filter(|t| !t.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Check whether no text was produced
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Structured(value) => value.is_null(),
            Self::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

/// A semantically bounded slice of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Fragment text
    pub text: String,
    /// Owning document base id
    pub document_id: String,
    /// Zero-based position within the document
    pub index: usize,
}

impl Fragment {
    /// Index key: `<document id>_<index>`
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.document_id, self.index)
    }
}

//! Multi-format text extraction
//!
//! The declared extension alone picks a [`Strategy`]; bytes are never sniffed.

use calamine::Reader as _;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::ingestion::external_parser::ExternalTools;
use crate::types::{
    DocumentSource, ExtractOptions, ExtractedText, Format, ImageMode, Strategy, StructuredMode,
};

/// Seconds to wait for pdf-extract before falling back to per-page lopdf
const PDF_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Multi-format file parser
#[derive(Debug, Clone, Default)]
pub struct FileParser {
    tools: ExternalTools,
}

impl FileParser {
    /// Create a parser using the given external tools
    pub fn new(tools: ExternalTools) -> Self {
        Self { tools }
    }

    /// External tools used for OCR, DjVu and `.doc`
    pub fn tools(&self) -> &ExternalTools {
        &self.tools
    }

    /// Extract a document. An absent document yields empty text.
    pub fn extract(
        &self,
        source: Option<&DocumentSource>,
        options: &ExtractOptions,
    ) -> Result<ExtractedText> {
        let Some(source) = source else {
            tracing::debug!("No document supplied, returning empty text");
            return Ok(ExtractedText::default());
        };

        let format = source.format()?;
        let strategy = format.strategy();
        warn_ignored_modes(source, strategy, options);

        tracing::debug!("Extracting '{}' as {:?}", source.name, strategy);
        let name = source.name.as_str();
        let data = source.data.as_slice();

        match strategy {
            Strategy::PagedBinary => Self::parse_pdf(name, data).map(ExtractedText::Text),
            Strategy::WordProcessor => Self::parse_docx(name, data).map(ExtractedText::Text),
            Strategy::SlideDeck => Self::parse_pptx(name, data).map(ExtractedText::Text),
            Strategy::Structured => Self::parse_structured(name, format, data, options.structured),
            Strategy::PlainText => Ok(ExtractedText::Text(decode_text(data))),
            Strategy::Image => match options.image {
                ImageMode::Text => self
                    .tools
                    .image_to_text(data, format.extension())
                    .map(ExtractedText::Text),
                ImageMode::Blocks => self
                    .tools
                    .image_to_blocks(data, format.extension())
                    .map(ExtractedText::Blocks),
            },
            Strategy::ExternalProcess => match format {
                Format::Djvu => self.tools.djvu_to_text(data).map(ExtractedText::Text),
                _ => self.tools.doc_to_text(data).map(ExtractedText::Text),
            },
            Strategy::Ebook => Self::parse_epub(name, data).map(ExtractedText::Text),
            Strategy::Spreadsheet => Self::parse_spreadsheet(name, data).map(ExtractedText::Text),
        }
    }

    /// Extract and flatten to text
    pub fn extract_text(&self, source: &DocumentSource) -> Result<String> {
        self.extract(Some(source), &ExtractOptions::default())
            .map(ExtractedText::into_text)
    }

    /// Parse PDF document
    fn parse_pdf(name: &str, data: &[u8]) -> Result<String> {
        let content = match extract_pdf_with_timeout(data) {
            Ok(text) => text,
            Err(reason) => {
                tracing::warn!("pdf-extract failed for '{}': {}, trying lopdf", name, reason);
                Self::extract_pdf_pages(name, data)?
            }
        };

        let content = content
            .replace('\0', "")
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");

        if content.trim().is_empty() {
            tracing::warn!("'{}' has no text layer; it may be image-based", name);
        }
        Ok(content)
    }

    /// Per-page extraction with lopdf, pages in ascending order
    fn extract_pdf_pages(name: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(name, format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        // get_pages is a BTreeMap keyed by page number
        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => pages.push(text),
                Err(e) => tracing::debug!("Could not extract page {} of '{}': {}", page_num, name, e),
            }
        }
        Ok(pages.join("\n"))
    }

    /// Parse DOCX document
    fn parse_docx(name: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::file_parse(name, e.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut line = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                line.push_str(&t.text);
                            }
                        }
                    }
                }
                paragraphs.push(line);
            }
        }

        Ok(paragraphs.join("\n"))
    }

    /// Parse PowerPoint presentation (.pptx)
    fn parse_pptx(name: &str, data: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::file_parse(name, e.to_string()))?;

        let slides = match presentation_slide_order(&mut archive) {
            Some(slides) => slides,
            None => {
                tracing::debug!("'{}' has no slide list, ordering slides by file name", name);
                slides_by_file_name(&archive)
            }
        };

        let mut content = String::new();
        let mut position = 0;
        for entry in &slides {
            let xml = match read_zip_entry(&mut archive, entry) {
                Ok(xml) => xml,
                Err(e) => {
                    tracing::warn!("Skipping '{}' in '{}': {}", entry, name, e);
                    continue;
                }
            };
            position += 1;
            content.push_str(&format!("Slide {}:\n", position));
            for shape in slide_shape_texts(&xml) {
                content.push_str(&shape);
                content.push('\n');
            }
            content.push('\n');
        }

        tracing::debug!("'{}' has {} slides", name, position);
        Ok(content)
    }

    /// Parse JSON or XML, raw or as a tree
    fn parse_structured(
        name: &str,
        format: Format,
        data: &[u8],
        mode: StructuredMode,
    ) -> Result<ExtractedText> {
        match mode {
            StructuredMode::Raw => Ok(ExtractedText::Text(decode_text(data))),
            StructuredMode::Dict => {
                let value = match format {
                    Format::Json => serde_json::from_slice(data)
                        .map_err(|e| Error::file_parse(name, e.to_string()))?,
                    _ => xml_to_value(&decode_text(data))
                        .map_err(|e| Error::file_parse(name, e))?,
                };
                Ok(ExtractedText::Structured(value))
            }
        }
    }

    /// Parse EPUB: text of every XHTML item in spine order
    fn parse_epub(name: &str, data: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::file_parse(name, e.to_string()))?;

        let items = match epub_spine(&mut archive) {
            Some(items) => items,
            None => {
                tracing::warn!("'{}' has no readable package file, using archive order", name);
                archive
                    .file_names()
                    .filter(|f| f.ends_with(".xhtml") || f.ends_with(".html") || f.ends_with(".htm"))
                    .map(str::to_string)
                    .collect()
            }
        };

        let body = scraper::Selector::parse("body")
            .map_err(|e| Error::internal(format!("Invalid selector: {}", e)))?;

        let mut sections = Vec::new();
        for item in items {
            let html = match read_zip_entry(&mut archive, &item) {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Skipping '{}' in '{}': {}", item, name, e);
                    continue;
                }
            };
            let document = scraper::Html::parse_document(&html);
            let text = document
                .select(&body)
                .flat_map(|b| b.text())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                sections.push(text);
            }
        }

        Ok(sections.join("\n\n"))
    }

    /// Parse Excel spreadsheet
    fn parse_spreadsheet(name: &str, data: &[u8]) -> Result<String> {
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(data))
            .map_err(|e| Error::file_parse(name, e.to_string()))?;

        let mut content = String::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!("Skipping sheet '{}' in '{}': {}", sheet_name, name, e);
                    continue;
                }
            };

            content.push_str(&format!("Sheet: {}\n", sheet_name));
            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(cell_text).collect();
                if cells.iter().any(|c| !c.is_empty()) {
                    content.push_str(&cells.join(" | "));
                    content.push('\n');
                }
            }
            content.push('\n');
        }

        Ok(content)
    }
}

fn warn_ignored_modes(source: &DocumentSource, strategy: Strategy, options: &ExtractOptions) {
    if !options.warn_on_ignored_mode {
        return;
    }
    if options.structured == StructuredMode::Dict && strategy != Strategy::Structured {
        tracing::warn!("Dict mode ignored for '{}' ({:?})", source.name, strategy);
    }
    if options.image == ImageMode::Blocks && strategy != Strategy::Image {
        tracing::warn!("Block mode ignored for '{}' ({:?})", source.name, strategy);
    }
}

fn decode_text(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

/// Run pdf-extract on a worker thread so a pathological font cannot hang ingestion
fn extract_pdf_with_timeout(data: &[u8]) -> std::result::Result<String, String> {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let data_vec = data.to_vec();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(pdf_extract::extract_text_from_mem(&data_vec));
    });

    match rx.recv_timeout(Duration::from_secs(PDF_EXTRACT_TIMEOUT_SECS)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("PDF extraction timeout after {}s", PDF_EXTRACT_TIMEOUT_SECS);
            Err("timeout".to_string())
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err("extraction thread crashed".to_string()),
    }
}

fn read_zip_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    entry: &str,
) -> std::result::Result<String, String> {
    let mut file = archive.by_name(entry).map_err(|e| e.to_string())?;
    let mut content = String::new();
    file.read_to_string(&mut content).map_err(|e| e.to_string())?;
    Ok(content)
}

/// Slide parts in presentation order, from `<p:sldIdLst>` resolved through
/// the presentation relationships
fn presentation_slide_order(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Option<Vec<String>> {
    let presentation = read_zip_entry(archive, "ppt/presentation.xml").ok()?;
    let rels = read_zip_entry(archive, "ppt/_rels/presentation.xml.rels").ok()?;

    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    let mut slides = Vec::new();
    let mut reader = Reader::from_str(&presentation);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                // The relationship id is the namespaced `r:id`, not the numeric `id`
                let rel_id = e.attributes().flatten().find(|a| {
                    a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id"
                });
                let rel_id = rel_id.and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
                if let Some(rel_id) = rel_id {
                    if let Some(target) = targets.get(&rel_id) {
                        slides.push(resolve_part(target));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    (!slides.is_empty()).then_some(slides)
}

/// Relationship targets are relative to `ppt/` unless absolute
fn resolve_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target),
    }
}

/// `ppt/slides/slideN.xml` sorted by N
fn slides_by_file_name(archive: &zip::ZipArchive<Cursor<&[u8]>>) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|entry| {
            let number = entry
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, entry.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);
    slides.into_iter().map(|(_, entry)| entry).collect()
}

/// Text of each text-bearing shape (`<p:sp>`), paragraphs joined by newlines
fn slide_shape_texts(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);

    let mut shapes = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"br" => {
                line.push('\n');
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    line.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        paragraphs.push(trimmed.to_string());
                    }
                    line.clear();
                }
                b"sp" | b"graphicFrame" => {
                    if !paragraphs.is_empty() {
                        shapes.push(paragraphs.join("\n"));
                        paragraphs.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Stopping slide parse at malformed XML: {}", e);
                break;
            }
            _ => {}
        }
    }

    if !paragraphs.is_empty() {
        shapes.push(paragraphs.join("\n"));
    }
    shapes
}

/// Resolve spine order via `META-INF/container.xml` and the OPF package
fn epub_spine(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Option<Vec<String>> {
    let container = read_zip_entry(archive, "META-INF/container.xml").ok()?;
    let opf_path = first_attr(&container, b"rootfile", b"full-path")?;
    let opf = read_zip_entry(archive, &opf_path).ok()?;
    let base = match opf_path.rfind('/') {
        Some(i) => &opf_path[..=i],
        None => "",
    };

    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut spine = Vec::new();
    let mut reader = Reader::from_str(&opf);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attr(&e, b"id"), attr(&e, b"href")) {
                        let media = attr(&e, b"media-type").unwrap_or_default();
                        manifest.insert(id, (href, media));
                    }
                }
                b"itemref" => spine.extend(attr(&e, b"idref")),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    let items = spine
        .iter()
        .filter_map(|idref| manifest.get(idref))
        .filter(|(_, media)| media == "application/xhtml+xml" || media == "text/html")
        .map(|(href, _)| format!("{}{}", base, href))
        .collect();
    Some(items)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn first_attr(xml: &str, element: &[u8], key: &[u8]) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == element => {
                return attr(&e, key);
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        calamine::Data::DateTime(dt) => dt.to_string(),
        calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => s.clone(),
        calamine::Data::Error(e) => format!("#{:?}", e),
    }
}

/// Node under construction while walking XML
#[derive(Default)]
struct XmlNode {
    name: String,
    attrs: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl XmlNode {
    fn open(e: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let mut node = XmlNode {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            ..Default::default()
        };
        for a in e.attributes() {
            let a = a.map_err(|e| e.to_string())?;
            let key = format!("@{}", String::from_utf8_lossy(a.key.as_ref()));
            let value = a.unescape_value().map_err(|e| e.to_string())?;
            node.attrs.insert(key, Value::String(value.into_owned()));
        }
        Ok(node)
    }

    fn into_value(self) -> Value {
        let text = self.text.trim().to_string();
        if self.attrs.is_empty() && self.children.is_empty() {
            return if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
        }
        let mut map = self.attrs;
        map.extend(self.children);
        if !text.is_empty() {
            map.insert("#text".to_string(), Value::String(text));
        }
        Value::Object(map)
    }

    /// Repeated child names collect into an array
    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }
}

/// Convert XML into a JSON tree: attributes as `@name`, mixed text as `#text`
pub fn xml_to_value(xml: &str) -> std::result::Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => stack.push(XmlNode::open(&e)?),
            Event::Empty(e) => {
                let node = XmlNode::open(&e)?;
                let parent = stack.last_mut().ok_or("unbalanced XML")?;
                let name = node.name.clone();
                parent.add_child(name, node.into_value());
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err("unbalanced XML".to_string());
                }
                let node = stack.pop().ok_or("unbalanced XML")?;
                let name = node.name.clone();
                let parent = stack.last_mut().ok_or("unbalanced XML")?;
                parent.add_child(name, node.into_value());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err("unexpected end of XML".to_string());
    }
    let root = stack.pop().ok_or("empty XML")?;
    if root.children.is_empty() {
        return Err("no root element".to_string());
    }
    Ok(Value::Object(root.children))
}

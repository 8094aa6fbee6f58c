//! Text extraction from case documents, keyed by file extension.
//!
//! Each supported format has a [`TextExtractor`] that turns a file into a
//! sequence of text segments (a PDF body, DOCX paragraphs joined per
//! document, one segment per spreadsheet sheet). Unknown extensions fall
//! back to plain-text reading.
//!
//! Image and audio files are registered formats whose real backends (OCR,
//! transcription) are external services; without one they yield no text.
//! Extraction failures are contained at the registry boundary: a document
//! that cannot be read produces an empty segment list, never a panic or a
//! pipeline abort.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Decompressed bytes read from a single ZIP entry at most.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts text segments from one document format.
pub trait TextExtractor: Send + Sync {
    /// Format label recorded in chunk metadata as `document_type`.
    fn kind(&self) -> &str;

    /// Read the file and return its text segments, in document order.
    fn extract(&self, path: &Path) -> Result<Vec<String>>;
}

/// Extension-to-extractor dispatch table.
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Box<dyn TextExtractor>>,
    fallback: Box<dyn TextExtractor>,
}

impl ExtractorRegistry {
    /// Registry with all built-in formats.
    pub fn new() -> Self {
        let mut by_extension: HashMap<String, Box<dyn TextExtractor>> = HashMap::new();

        by_extension.insert("pdf".to_string(), Box::new(PdfExtractor));
        by_extension.insert("docx".to_string(), Box::new(DocxExtractor));
        by_extension.insert("xlsx".to_string(), Box::new(XlsxExtractor));
        by_extension.insert("xls".to_string(), Box::new(XlsxExtractor));
        for ext in ["png", "jpg", "jpeg", "gif"] {
            by_extension.insert(ext.to_string(), Box::new(ImageExtractor));
        }
        for ext in ["mp3", "wav", "ogg", "m4a"] {
            by_extension.insert(ext.to_string(), Box::new(AudioExtractor));
        }

        Self {
            by_extension,
            fallback: Box::new(PlainTextExtractor),
        }
    }

    /// Extractor responsible for `path`, chosen by lower-cased extension.
    pub fn extractor_for(&self, path: &Path) -> &dyn TextExtractor {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.and_then(|e| self.by_extension.get(&e)) {
            Some(extractor) => extractor.as_ref(),
            None => self.fallback.as_ref(),
        }
    }

    /// Extract `path` into `(document_type, segments)`.
    ///
    /// Failures are logged and contained: the document type is still
    /// reported but the segment list comes back empty.
    pub fn extract(&self, path: &Path) -> (String, Vec<String>) {
        let extractor = self.extractor_for(path);
        let kind = extractor.kind().to_string();
        match extractor.extract(path) {
            Ok(segments) => (kind, segments),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    kind = kind.as_str(),
                    error = %e,
                    "text extraction failed, skipping document content"
                );
                (kind, Vec::new())
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Plain text ============

struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn kind(&self) -> &str {
        "text"
    }

    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if text.trim().is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![text])
        }
    }
}

// ============ PDF ============

struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn kind(&self) -> &str {
        "pdf"
    }

    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .with_context(|| format!("failed to parse PDF {}", path.display()))?;
        if text.trim().is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![text])
        }
    }
}

// ============ DOCX ============

struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn kind(&self) -> &str {
        "docx"
    }

    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
            .context("not a valid DOCX archive")?;
        let xml = read_zip_entry(&mut archive, "word/document.xml")?;
        let paragraphs = docx_paragraphs(&xml)?;
        if paragraphs.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![paragraphs.join("\n")])
        }
    }
}

/// Collect `w:t` run text grouped into paragraphs (`w:p` elements).
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    // Run text keeps its whitespace: inter-run spaces are significant.
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(e) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            quick_xml::events::Event::Text(te) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            quick_xml::events::Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                }
                _ => {}
            },
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

// ============ XLSX ============

struct XlsxExtractor;

impl TextExtractor for XlsxExtractor {
    fn kind(&self) -> &str {
        "spreadsheet"
    }

    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
            .context("not a valid XLSX archive")?;

        // Workbooks without string cells have no sharedStrings part at all.
        let shared_strings = match read_zip_entry(&mut archive, "xl/sharedStrings.xml") {
            Ok(xml) => parse_shared_strings(&xml)?,
            Err(_) => Vec::new(),
        };

        let mut sheet_names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        sheet_names.sort_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        });

        let mut segments = Vec::new();
        for name in sheet_names {
            let xml = read_zip_entry(&mut archive, &name)?;
            let sheet_text = sheet_cell_text(&xml, &shared_strings)?;
            if !sheet_text.trim().is_empty() {
                segments.push(sheet_text);
            }
        }
        Ok(segments)
    }
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            quick_xml::events::Event::Text(te) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            quick_xml::events::Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Text content of one worksheet: string cells resolved through the shared
/// string table plus inline numeric values, joined with single spaces.
fn sheet_cell_text(xml: &[u8], shared_strings: &[String]) -> Result<String> {
    let mut cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    cell_is_shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_v = true,
                _ => {}
            },
            quick_xml::events::Event::Text(te) if in_v => {
                let value = te.unescape().unwrap_or_default();
                let value = value.trim();
                if value.is_empty() {
                    // nothing
                } else if cell_is_shared {
                    if let Ok(i) = value.parse::<usize>() {
                        if let Some(s) = shared_strings.get(i) {
                            cells.push(s.clone());
                        }
                    }
                } else {
                    cells.push(value.to_string());
                }
            }
            quick_xml::events::Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => cell_is_shared = false,
                _ => {}
            },
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(cells.join(" "))
}

// ============ Image / audio stubs ============

/// Placeholder for an OCR or captioning backend.
struct ImageExtractor;

impl TextExtractor for ImageExtractor {
    fn kind(&self) -> &str {
        "image"
    }

    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        tracing::warn!(
            path = %path.display(),
            "no OCR backend configured, image ingested without text"
        );
        Ok(Vec::new())
    }
}

/// Placeholder for a speech-transcription backend.
struct AudioExtractor;

impl TextExtractor for AudioExtractor {
    fn kind(&self) -> &str {
        "audio"
    }

    fn extract(&self, path: &Path) -> Result<Vec<String>> {
        tracing::warn!(
            path = %path.display(),
            "no transcription backend configured, audio ingested without text"
        );
        Ok(Vec::new())
    }
}

// ============ ZIP helpers ============

fn read_zip_entry(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .with_context(|| format!("ZIP entry {} not found", name))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .with_context(|| format!("failed to read ZIP entry {}", name))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        anyhow::bail!("ZIP entry {} exceeds size limit", name);
    }
    Ok(out)
}

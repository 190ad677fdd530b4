//! Multi-format text extraction for uploaded study documents.
//!
//! The upload boundary validates MIME types before anything reaches this
//! module, but [`parse_document`] guards again and rejects anything outside
//! the closed PDF/DOCX/PPTX set. PDF text comes from `pdf-extract` with
//! document-info metadata read via `lopdf`; DOCX and PPTX are OOXML ZIP
//! archives read with `zip` + `quick-xml`.
//!
//! Extraction is pure: bytes in, [`ParsedDocument`] out, no side effects.

use std::io::Read;

use thiserror::Error;

use crate::models::{DocumentMetadata, DocumentText, FileKind, ParsedDocument};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure for a specific file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Whether `mime_type` belongs to the closed set of ingestible formats.
pub fn supported_mime(mime_type: &str) -> bool {
    file_kind_for_mime(mime_type).is_some()
}

pub fn file_kind_for_mime(mime_type: &str) -> Option<FileKind> {
    match mime_type {
        MIME_PDF => Some(FileKind::Pdf),
        MIME_DOCX => Some(FileKind::Docx),
        MIME_PPTX => Some(FileKind::Pptx),
        _ => None,
    }
}

/// Guess a MIME type from a file extension (CLI convenience; the HTTP
/// boundary receives the MIME type from the client).
pub fn mime_for_path(path: &std::path::Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "pptx" => Some(MIME_PPTX),
        _ => None,
    }
}

/// Extract plain text and document metadata from an uploaded file.
///
/// PPTX decks degrade to a placeholder document on internal extraction
/// failure instead of erroring; PDF and DOCX failures propagate.
pub fn parse_document(
    bytes: &[u8],
    file_name: &str,
    mime_type: &str,
) -> Result<ParsedDocument, ParseError> {
    match mime_type {
        MIME_PDF => parse_pdf(bytes, file_name),
        MIME_DOCX => parse_docx(bytes, file_name),
        MIME_PPTX => Ok(parse_pptx(bytes, file_name)),
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}

// ============ PDF ============

fn parse_pdf(bytes: &[u8], file_name: &str) -> Result<ParsedDocument, ParseError> {
    let content =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ParseError::Pdf(e.to_string()))?;
    let info = pdf_info(bytes);

    Ok(ParsedDocument {
        text: DocumentText::Extracted(content),
        metadata: DocumentMetadata {
            title: info.title.or_else(|| Some(file_name.to_string())),
            author: info.author,
            page_count: info.page_count,
            file_kind: FileKind::Pdf,
        },
    })
}

#[derive(Default)]
struct PdfInfo {
    title: Option<String>,
    author: Option<String>,
    page_count: Option<u32>,
}

/// Read the document-info dictionary and page count. Non-fatal: a PDF
/// whose trailer cannot be walked still ingests with fallback metadata.
fn pdf_info(bytes: &[u8]) -> PdfInfo {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) => return PdfInfo::default(),
    };

    let mut info = PdfInfo {
        page_count: Some(doc.get_pages().len() as u32),
        ..PdfInfo::default()
    };

    let info_obj = doc.trailer.get(b"Info").ok().and_then(|obj| match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    });
    if let Some(dict) = info_obj.and_then(|obj| obj.as_dict().ok()) {
        info.title = dict.get(b"Title").ok().and_then(info_string);
        info.author = dict.get(b"Author").ok().and_then(info_string);
    }

    info
}

/// Decode a PDF info string: UTF-16BE when BOM-prefixed, byte text otherwise.
fn info_string(obj: &lopdf::Object) -> Option<String> {
    let lopdf::Object::String(bytes, _) = obj else {
        return None;
    };
    let text = if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============ DOCX ============

fn parse_docx(bytes: &[u8], file_name: &str) -> Result<ParsedDocument, ParseError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ParseError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let content = extract_paragraph_text(&xml)?;

    Ok(ParsedDocument {
        text: DocumentText::Extracted(content),
        metadata: DocumentMetadata {
            title: Some(file_name.to_string()),
            author: None,
            page_count: None,
            file_kind: FileKind::Docx,
        },
    })
}

// ============ PPTX ============

fn parse_pptx(bytes: &[u8], file_name: &str) -> ParsedDocument {
    let metadata = DocumentMetadata {
        title: Some(file_name.to_string()),
        author: None,
        page_count: None,
        file_kind: FileKind::Pptx,
    };

    match extract_pptx_text(bytes) {
        Ok(content) => ParsedDocument {
            text: DocumentText::Extracted(content),
            metadata,
        },
        // Slide extraction is unreliable for some decks; ingest a stub
        // naming the file rather than failing the whole upload.
        Err(e) => ParsedDocument {
            text: DocumentText::Placeholder {
                text: format!("PowerPoint presentation: {}", file_name),
                reason: e.to_string(),
            },
            metadata,
        },
    }
}

fn extract_pptx_text(bytes: &[u8]) -> Result<String, ParseError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ParseError::Ooxml(e.to_string()))?;

    let slides = ordered_entries(&archive, "ppt/slides/slide");
    if slides.is_empty() {
        return Err(ParseError::Ooxml("no slides found".to_string()));
    }
    // Speaker notes follow the slide deck, in slide order.
    let notes = ordered_entries(&archive, "ppt/notesSlides/notesSlide");

    let mut parts = Vec::new();
    for name in slides.iter().chain(notes.iter()) {
        let xml = read_zip_entry_bounded(&mut archive, name, MAX_XML_ENTRY_BYTES)?;
        let text = extract_paragraph_text(&xml)?;
        if !text.trim().is_empty() {
            parts.push(text.trim().to_string());
        }
    }

    Ok(parts.join("\n"))
}

/// List archive entries `<prefix>N.xml`, sorted by slide number.
fn ordered_entries(
    archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>,
    prefix: &str,
) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

// ============ Shared OOXML helpers ============

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ParseError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ParseError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ParseError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ParseError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Collect the text runs (`<w:t>` / `<a:t>`) of an OOXML part, emitting a
/// newline at each paragraph close so the chunker sees real line breaks.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ParseError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_run => {
                out.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !out.ends_with('\n') && !out.is_empty() {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ParseError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip_with_entries(&[("word/document.xml", &xml)])
    }

    fn pptx_with_slides(slides: &[&str], notes: &[&str]) -> Vec<u8> {
        let entries: Vec<(String, String)> = slides
            .iter()
            .enumerate()
            .map(|(i, text)| {
                (
                    format!("ppt/slides/slide{}.xml", i + 1),
                    slide_xml(text),
                )
            })
            .chain(notes.iter().enumerate().map(|(i, text)| {
                (
                    format!("ppt/notesSlides/notesSlide{}.xml", i + 1),
                    slide_xml(text),
                )
            }))
            .collect();
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(n, x)| (n.as_str(), x.as_str()))
            .collect();
        zip_with_entries(&borrowed)
    }

    fn slide_xml(text: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\"><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sld>",
            text
        )
    }

    fn zip_with_entries(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, xml) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(xml.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unsupported_mime_is_rejected() {
        let err = parse_document(b"data", "notes.bin", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_pdf_propagates() {
        let err = parse_document(b"not a pdf", "broken.pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ParseError::Pdf(_)));
    }

    #[test]
    fn invalid_docx_propagates() {
        let err = parse_document(b"not a zip", "broken.docx", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ParseError::Ooxml(_)));
    }

    #[test]
    fn docx_extracts_paragraphs_with_breaks() {
        let bytes = docx_with_paragraphs(&["First paragraph.", "Second paragraph."]);
        let doc = parse_document(&bytes, "notes.docx", MIME_DOCX).unwrap();
        assert_eq!(
            doc.text.as_str(),
            "First paragraph.\nSecond paragraph."
        );
        assert_eq!(doc.metadata.title.as_deref(), Some("notes.docx"));
        assert_eq!(doc.metadata.file_kind, FileKind::Docx);
        assert!(doc.metadata.author.is_none());
        assert!(doc.metadata.page_count.is_none());
    }

    #[test]
    fn docx_missing_document_part_errors() {
        let bytes = zip_with_entries(&[("word/other.xml", "<w:document/>")]);
        let err = parse_document(&bytes, "odd.docx", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ParseError::Ooxml(_)));
    }

    #[test]
    fn pptx_extracts_slides_and_notes_in_order() {
        let bytes = pptx_with_slides(
            &["Slide one body", "Slide two body"],
            &["Speaker notes for slide one"],
        );
        let doc = parse_document(&bytes, "deck.pptx", MIME_PPTX).unwrap();
        assert!(!doc.text.is_placeholder());
        assert_eq!(
            doc.text.as_str(),
            "Slide one body\nSlide two body\nSpeaker notes for slide one"
        );
    }

    #[test]
    fn pptx_slides_sort_numerically_not_lexically() {
        // slide10 must come after slide2
        let entries = vec![
            ("ppt/slides/slide10.xml".to_string(), slide_xml("ten")),
            ("ppt/slides/slide2.xml".to_string(), slide_xml("two")),
            ("ppt/slides/slide1.xml".to_string(), slide_xml("one")),
        ];
        let borrowed: Vec<(&str, &str)> = entries
            .iter()
            .map(|(n, x)| (n.as_str(), x.as_str()))
            .collect();
        let bytes = zip_with_entries(&borrowed);
        let doc = parse_document(&bytes, "deck.pptx", MIME_PPTX).unwrap();
        assert_eq!(doc.text.as_str(), "one\ntwo\nten");
    }

    #[test]
    fn broken_pptx_degrades_to_placeholder() {
        let doc = parse_document(b"not a zip at all", "deck.pptx", MIME_PPTX).unwrap();
        assert!(doc.text.is_placeholder());
        assert_eq!(doc.text.as_str(), "PowerPoint presentation: deck.pptx");
        assert_eq!(doc.metadata.title.as_deref(), Some("deck.pptx"));
    }

    #[test]
    fn mime_guess_covers_the_closed_set() {
        use std::path::Path;
        assert_eq!(mime_for_path(Path::new("a.pdf")), Some(MIME_PDF));
        assert_eq!(mime_for_path(Path::new("a.docx")), Some(MIME_DOCX));
        assert_eq!(mime_for_path(Path::new("a.pptx")), Some(MIME_PPTX));
        assert_eq!(mime_for_path(Path::new("a.txt")), None);
    }
}

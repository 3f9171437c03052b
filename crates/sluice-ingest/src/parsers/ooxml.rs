//! Word and PowerPoint (OOXML) parser.
//!
//! Reads the XML parts straight out of the zip container and keeps the text
//! runs, with paragraph breaks. Slides are emitted in slide-number order.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::Converted;
use crate::error::{IngestError, IngestResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Largest decompressed XML part we will read.
const MAX_PART_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct OoxmlParser;

impl OoxmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for OoxmlParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        let parse_error = |message: String| IngestError::ParseError {
            path: path.to_path_buf(),
            message,
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let mut archive = ZipArchive::new(File::open(path)?).map_err(|e| parse_error(e.to_string()))?;
        let (text, parts) = match ext.as_str() {
            "docx" => {
                let xml = read_part(&mut archive, "word/document.xml").map_err(parse_error)?;
                (collect_text(&xml, "\n\n").map_err(parse_error)?, 1)
            }
            "pptx" => {
                let slides = slide_names(&archive);
                let mut out = Vec::with_capacity(slides.len());
                for name in &slides {
                    let xml = read_part(&mut archive, name).map_err(parse_error)?;
                    let text = collect_text(&xml, "\n").map_err(parse_error)?;
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
                (out.join("\n\n"), slides.len())
            }
            other => return Err(IngestError::UnsupportedFileType(format!("{} ({})", path.display(), other))),
        };

        let title = read_part(&mut archive, "docProps/core.xml")
            .ok()
            .and_then(|xml| core_title(&xml))
            .unwrap_or_else(|| file_title(path));

        let metadata = serde_json::json!({
            "format": ext,
            "parts": parts,
            "length": text.len(),
        });

        Ok(Converted::new(text).with_title(title).with_metadata(metadata))
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, String> {
    let entry = archive.by_name(name).map_err(|e| format!("{}: {}", name, e))?;
    let mut out = Vec::new();
    entry
        .take(MAX_PART_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| format!("{}: {}", name, e))?;
    if out.len() as u64 >= MAX_PART_BYTES {
        return Err(format!("{} exceeds {} bytes", name, MAX_PART_BYTES));
    }
    Ok(out)
}

fn slide_names<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Concatenate `<*:t>` runs, ending each `<*:p>` with `paragraph_sep`.
fn collect_text(xml: &[u8], paragraph_sep: &str) -> Result<String, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => current.push('\t'),
            Ok(Event::Text(t)) if in_run => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    Ok(paragraphs.join(paragraph_sep))
}

/// `dc:title` from the package core properties.
fn core_title(xml: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_title = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"title" => in_title = true,
            Ok(Event::Text(t)) if in_title => {
                let title = t.unescape().ok()?.trim().to_string();
                return if title.is_empty() { None } else { Some(title) };
            }
            Ok(Event::End(_)) if in_title => return None,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_package(path: &Path, parts: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    const DOCX_BODY: &str = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t xml:space="preserve">Quarterly </w:t></w:r><w:r><w:t>report</w:t></w:r></w:p>
<w:p><w:r><w:t>Revenue &amp; costs</w:t></w:r></w:p>
<w:p></w:p>
</w:body></w:document>"#;

    #[test]
    fn test_docx_paragraphs_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q3.docx");
        write_package(
            &path,
            &[
                ("word/document.xml", DOCX_BODY),
                (
                    "docProps/core.xml",
                    r#"<cp:coreProperties xmlns:cp="cp" xmlns:dc="dc"><dc:title>Q3 Report</dc:title></cp:coreProperties>"#,
                ),
            ],
        );

        let doc = OoxmlParser::new().parse(&path).unwrap();
        assert_eq!(doc.markdown, "Quarterly report\n\nRevenue & costs");
        assert_eq!(doc.title, "Q3 Report");
        assert_eq!(doc.metadata["format"], "docx");
    }

    #[test]
    fn test_pptx_slide_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        let slide = |text: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sld>"#,
                text
            )
        };
        let (s1, s2, s10) = (slide("first"), slide("second"), slide("tenth"));
        write_package(
            &path,
            &[
                ("ppt/slides/slide10.xml", s10.as_str()),
                ("ppt/slides/slide2.xml", s2.as_str()),
                ("ppt/slides/slide1.xml", s1.as_str()),
            ],
        );

        let doc = OoxmlParser::new().parse(&path).unwrap();
        assert_eq!(doc.markdown, "first\n\nsecond\n\ntenth");
        assert_eq!(doc.title, "deck");
        assert_eq!(doc.metadata["parts"], 3);
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, "plain text pretending").unwrap();

        let err = OoxmlParser::new().parse(&path).unwrap_err();
        assert!(matches!(err, IngestError::ParseError { .. }));
    }
}

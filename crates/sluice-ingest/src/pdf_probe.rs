//! Image-only PDF detection.

use lopdf::Document;
use std::path::Path;
use tracing::debug;

/// Decide whether a PDF has no usable text layer.
///
/// Text is extracted without OCR from up to `probe_pages` pages. Fewer than
/// `min_text_chars` non-whitespace characters means image-only. Any failure to
/// read the file yields `false` so the file takes the normal path.
pub fn detect_image_only_pdf(path: &Path, probe_pages: usize, min_text_chars: usize) -> (bool, String) {
    let doc = match Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("PDF probe could not load {:?}: {}", path, e);
            return (false, format!("probe failed: {}", e));
        }
    };

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().take(probe_pages.max(1)).collect();
    if page_numbers.is_empty() {
        return (false, "no pages".to_string());
    }

    let text = match doc.extract_text(&page_numbers) {
        Ok(text) => text,
        Err(e) => {
            debug!("PDF probe could not extract text from {:?}: {}", path, e);
            return (false, format!("text extraction failed: {}", e));
        }
    };

    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if chars < min_text_chars {
        (
            true,
            format!(
                "{} text characters in first {} page(s), need {}",
                chars,
                page_numbers.len(),
                min_text_chars
            ),
        )
    } else {
        (false, format!("{} text characters", chars))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Write a PDF with one page per entry; `None` pages carry only graphics.
    pub(crate) fn write_pdf(path: &Path, pages: &[Option<&str>]) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::new();
        for page in pages {
            let operations = match page {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![
                    Operation::new("re", vec![72.into(), 72.into(), 400.into(), 600.into()]),
                    Operation::new("f", vec![]),
                ],
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_scanned_pdf_is_image_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        write_pdf(&path, &[None, None, None, None]);

        let (image_only, reason) = detect_image_only_pdf(&path, 3, 50);
        assert!(image_only, "{}", reason);
    }

    #[test]
    fn test_text_pdf_is_not_image_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.pdf");
        let line = "Quarterly revenue grew across every region during the period under review";
        write_pdf(&path, &[Some(line), Some(line)]);

        let (image_only, _) = detect_image_only_pdf(&path, 3, 50);
        assert!(!image_only);
    }

    #[test]
    fn test_unreadable_pdf_takes_normal_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let (image_only, reason) = detect_image_only_pdf(&path, 3, 50);
        assert!(!image_only);
        assert!(reason.starts_with("probe failed"));
    }
}

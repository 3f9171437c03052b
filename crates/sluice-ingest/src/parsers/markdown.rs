//! Markdown document parser.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::Converted;
use crate::error::IngestResult;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use std::path::Path;

/// Parser for Markdown files.
#[derive(Debug)]
pub struct MarkdownParser {
    /// Whether to keep code fences in the output.
    preserve_code_blocks: bool,
}

struct Extracted {
    text: String,
    title: Option<String>,
    links: Vec<String>,
    headings: usize,
}

impl MarkdownParser {
    pub fn new() -> Self {
        Self {
            preserve_code_blocks: true,
        }
    }

    /// Flatten markdown into paragraph-separated text.
    fn extract_text(&self, markdown: &str) -> Extracted {
        let mut text = String::new();
        let mut title: Option<String> = None;
        let mut links = Vec::new();
        let mut headings = 0;
        let mut in_heading = false;
        let mut heading_level: Option<HeadingLevel> = None;
        let mut current_heading = String::new();

        for event in Parser::new(markdown) {
            match event {
                Event::Start(Tag::Heading(level, _, _)) => {
                    in_heading = true;
                    heading_level = Some(level);
                    current_heading.clear();
                }
                Event::End(Tag::Heading(_, _, _)) => {
                    in_heading = false;
                    headings += 1;
                    if heading_level == Some(HeadingLevel::H1) && title.is_none() {
                        title = Some(current_heading.trim().to_string());
                    }
                    text.push_str(&current_heading);
                    text.push_str("\n\n");
                    heading_level = None;
                }
                Event::Start(Tag::CodeBlock(_)) if self.preserve_code_blocks => {
                    text.push_str("\n```\n");
                }
                Event::End(Tag::CodeBlock(_)) if self.preserve_code_blocks => {
                    text.push_str("```\n\n");
                }
                Event::Start(Tag::Link(_, dest, _)) => {
                    links.push(dest.to_string());
                }
                Event::End(Tag::Paragraph) => {
                    text.push_str("\n\n");
                }
                Event::End(Tag::List(_)) => {
                    text.push('\n');
                }
                Event::Start(Tag::Item) => {
                    text.push_str("- ");
                }
                Event::End(Tag::Item) => {
                    text.push('\n');
                }
                Event::Text(t) => {
                    if in_heading {
                        current_heading.push_str(&t);
                    } else {
                        text.push_str(&t);
                    }
                }
                Event::Code(code) => {
                    text.push('`');
                    text.push_str(&code);
                    text.push('`');
                }
                Event::SoftBreak | Event::HardBreak => {
                    text.push('\n');
                }
                _ => {}
            }
        }

        Extracted {
            text: text.trim().to_string(),
            title,
            links,
            headings,
        }
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for MarkdownParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        let content = std::fs::read_to_string(path)?;
        let extracted = self.extract_text(&content);

        let metadata = serde_json::json!({
            "format": "markdown",
            "links": extracted.links,
            "headings": extracted.headings,
            "original_length": content.len(),
        });

        let title = extracted.title.unwrap_or_else(|| file_title(path));
        Ok(Converted::new(extracted.text)
            .with_title(title)
            .with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_markdown() {
        let mut file = NamedTempFile::with_suffix(".md").unwrap();
        writeln!(
            file,
            r#"# My Document

This is a paragraph with some text.

## Section One

More content here with a [link](https://example.com).

```rust
fn main() {{
    println!("Hello");
}}
```

- Item one
- Item two
"#
        )
        .unwrap();

        let doc = MarkdownParser::new().parse(file.path()).unwrap();

        assert_eq!(doc.title, "My Document");
        assert!(doc.markdown.contains("This is a paragraph"));
        assert!(doc.markdown.contains("Section One"));
        assert!(doc.markdown.contains("fn main()"));
        assert!(doc.markdown.contains("- Item two"));
        assert_eq!(doc.metadata["headings"], 2);

        let links = doc.metadata["links"].as_array().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0], "https://example.com");
    }

    #[test]
    fn test_no_title_uses_file_stem() {
        let mut file = NamedTempFile::with_suffix(".md").unwrap();
        writeln!(file, "Just some text without a heading.").unwrap();

        let doc = MarkdownParser::new().parse(file.path()).unwrap();
        assert_eq!(doc.title, file_title(file.path()));
    }
}

//! Plain text and source code parser.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::Converted;
use crate::error::IngestResult;
use std::path::Path;

/// Parser for plain text files (including code).
#[derive(Debug, Default)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }

    /// Detect programming language from extension.
    fn detect_language(extension: &str) -> Option<&'static str> {
        match extension.to_lowercase().as_str() {
            "rs" => Some("rust"),
            "py" => Some("python"),
            "js" => Some("javascript"),
            "ts" => Some("typescript"),
            "go" => Some("go"),
            "c" => Some("c"),
            "cpp" | "h" => Some("cpp"),
            "java" => Some("java"),
            "rb" => Some("ruby"),
            "sh" | "bash" | "zsh" => Some("shell"),
            "json" => Some("json"),
            "yaml" | "yml" => Some("yaml"),
            "toml" => Some("toml"),
            "html" => Some("html"),
            "css" => Some("css"),
            "sql" => Some("sql"),
            _ => None,
        }
    }
}

impl DocumentParser for TextParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        // Tolerate stray invalid bytes in logs and exports
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let language = Self::detect_language(extension);

        let mut metadata = serde_json::json!({
            "format": if language.is_some() { "code" } else { "text" },
            "length": content.len(),
            "lines": content.lines().count(),
        });
        if let Some(lang) = language {
            metadata["language"] = serde_json::json!(lang);
        }

        let title = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| file_title(path));

        Ok(Converted::new(content).with_title(title).with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_text() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "This is a plain text file.\nWith multiple lines.").unwrap();

        let doc = TextParser::new().parse(file.path()).unwrap();

        assert!(doc.markdown.contains("plain text file"));
        assert_eq!(doc.metadata["format"], "text");
        assert!(doc.title.ends_with(".txt"));
    }

    #[test]
    fn test_parse_code() {
        let mut file = NamedTempFile::with_suffix(".rs").unwrap();
        writeln!(
            file,
            r#"fn main() {{
    println!("Hello, world!");
}}"#
        )
        .unwrap();

        let doc = TextParser::new().parse(file.path()).unwrap();

        assert!(doc.markdown.contains("fn main()"));
        assert_eq!(doc.metadata["format"], "code");
        assert_eq!(doc.metadata["language"], "rust");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut file = NamedTempFile::with_suffix(".log").unwrap();
        file.write_all(b"ok line\n\xff\xfe broken\n").unwrap();

        let doc = TextParser::new().parse(file.path()).unwrap();
        assert!(doc.markdown.starts_with("ok line"));
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(TextParser::detect_language("rs"), Some("rust"));
        assert_eq!(TextParser::detect_language("JS"), Some("javascript"));
        assert_eq!(TextParser::detect_language("xyz"), None);
    }
}

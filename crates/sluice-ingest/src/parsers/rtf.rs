//! Rich Text Format parser.
//!
//! Strips control words and groups, keeping the visible text. Embedded
//! pictures, font tables and other destinations are skipped.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::Converted;
use crate::error::IngestResult;
use std::path::Path;

/// Destinations whose content is never visible text.
const SKIPPED_DESTINATIONS: [&str; 8] = [
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "generator",
];

#[derive(Debug, Default)]
pub struct RtfParser;

impl RtfParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for RtfParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        let bytes = std::fs::read(path)?;
        let text = rtf_to_text(&String::from_utf8_lossy(&bytes));

        let metadata = serde_json::json!({
            "format": "rtf",
            "length": text.len(),
        });

        Ok(Converted::new(text)
            .with_title(file_title(path))
            .with_metadata(metadata))
    }
}

fn rtf_to_text(rtf: &str) -> String {
    let mut out = String::new();
    // For each open group: whether its content is skipped
    let mut skip_stack: Vec<bool> = Vec::new();
    let mut skipping = false;
    let mut chars = rtf.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                skip_stack.push(skipping);
                if chars.peek() == Some(&'\\') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'*') {
                        skipping = true;
                    }
                }
            }
            '}' => {
                skipping = skip_stack.pop().unwrap_or(false);
            }
            '\\' => {
                let Some(&next) = chars.peek() else { break };
                if !next.is_ascii_alphabetic() {
                    chars.next();
                    match next {
                        '\\' | '{' | '}' if !skipping => out.push(next),
                        '\'' => {
                            let hex: String = chars.by_ref().take(2).collect();
                            if let (false, Ok(byte)) = (skipping, u8::from_str_radix(&hex, 16)) {
                                out.push(byte as char);
                            }
                        }
                        '~' if !skipping => out.push(' '),
                        _ => {}
                    }
                    continue;
                }

                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphabetic() {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Optional numeric parameter and one delimiting space
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '-' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek() == Some(&' ') {
                    chars.next();
                }

                if SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                    skipping = true;
                } else if !skipping {
                    match word.as_str() {
                        "par" | "line" => out.push('\n'),
                        "tab" => out.push('\t'),
                        _ => {}
                    }
                }
            }
            '\r' | '\n' => {}
            _ if !skipping => out.push(c),
            _ => {}
        }
    }

    normalize_paragraphs(&out)
}

fn normalize_paragraphs(text: &str) -> String {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_control_words() {
        let rtf = r"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}\f0\pard
This is {\b bold} text.\par
Second paragraph with a brace \{ and caf\'e9.\par
}";
        let text = rtf_to_text(rtf);
        assert_eq!(
            text,
            "This is bold text.\n\nSecond paragraph with a brace { and caf\u{e9}."
        );
    }

    #[test]
    fn test_skips_ignorable_destinations() {
        let rtf = r"{\rtf1{\*\generator Writer;}{\info{\title Hidden}}Visible\par}";
        assert_eq!(rtf_to_text(rtf), "Visible");
    }
}

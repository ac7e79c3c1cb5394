//! Word documents
//!
//! A .docx file is a zip archive; the body text lives in
//! `word/document.xml`. Paragraph ends become newlines and every other tag
//! is dropped.

use crate::{OrchestratorError, Result};
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

const DOCUMENT_PART: &str = "word/document.xml";

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

/// Extract the body text of a .docx archive
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| OrchestratorError::FileRead(format!("not a valid .docx archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| OrchestratorError::FileRead(format!("missing {}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| OrchestratorError::FileRead(format!("unreadable {}: {}", DOCUMENT_PART, e)))?;

    Ok(xml_to_text(&xml))
}

fn xml_to_text(xml: &str) -> String {
    let with_breaks = xml
        .replace("</w:p>", "\n")
        .replace("<w:br/>", "\n")
        .replace("<w:tab/>", "\t");
    let stripped = tag_pattern().replace_all(&with_breaks, "");

    let text = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

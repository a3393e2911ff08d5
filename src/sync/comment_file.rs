//! `C-<postid>` comment files.
//!
//! One XML document per post, in the layout earlier archivers wrote:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <comments>
//!  <comment>
//!   <id>81</id>
//!   <state>A</state>
//!   <user>bob</user>
//!   <parentid></parentid>
//!   <date>2008-01-02T03:04:05Z</date>
//!   <subject></subject>
//!   <body>hello</body>
//!  </comment>
//! </comments>
//! ```
//!
//! Reading goes through quick-xml's serde deserializer. Writing is rendered
//! by hand so text escaping matches existing archives: tabs, newlines and
//! carriage returns become character references, which also keeps them out
//! of the reader's whitespace trimming.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::sync::file::atomic_write;
use crate::sync::types::CommentRecord;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Root of a comment file.
#[derive(Debug, Default, Deserialize)]
struct CommentFile {
    #[serde(rename = "comment", default)]
    comments: Vec<CommentRecord>,
}

/// Read every comment archived in `path`, in file order.
///
/// A missing file reads as empty.
///
/// # Errors
///
/// Returns a storage error if the file cannot be read and
/// [`Error::Archive`] if it is not a comment document.
pub fn read_comment_file(path: &Path) -> Result<Vec<CommentRecord>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::storage("read", path, e)),
    };
    let file: CommentFile = quick_xml::de::from_str(&text).map_err(|e| Error::Archive {
        path: PathBuf::from(path),
        message: e.to_string(),
    })?;
    Ok(file.comments)
}

/// Replace `path` with a document holding `records`.
///
/// # Errors
///
/// Returns a storage error if the file cannot be written.
pub fn write_comment_file(path: &Path, records: &[CommentRecord]) -> Result<()> {
    atomic_write(path, render_comment_file(records).as_bytes())
}

fn render_comment_file(records: &[CommentRecord]) -> String {
    let mut out = String::from(XML_HEADER);
    if records.is_empty() {
        out.push_str("<comments></comments>\n");
        return out;
    }
    out.push_str("<comments>\n");
    for record in records {
        let parent_id = record.parent_id.map(|id| id.to_string()).unwrap_or_default();
        out.push_str(" <comment>\n");
        write_field(&mut out, "id", &record.id.to_string());
        write_field(&mut out, "state", &record.state);
        write_field(&mut out, "user", &record.user);
        write_field(&mut out, "parentid", &parent_id);
        write_field(&mut out, "date", &record.date);
        write_field(&mut out, "subject", &record.subject);
        write_field(&mut out, "body", &record.body);
        out.push_str(" </comment>\n");
    }
    out.push_str("</comments>\n");
    out
}

fn write_field(out: &mut String, tag: &str, text: &str) {
    out.push_str("  <");
    out.push_str(tag);
    out.push('>');
    escape_text(out, text);
    out.push_str("</");
    out.push_str(tag);
    out.push_str(">\n");
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
        || c >= '\u{10000}'
}

fn escape_text(out: &mut String, text: &str) {
    let last = text.chars().count().saturating_sub(1);
    for (i, c) in text.chars().enumerate() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            // Raw spaces at either end would be trimmed on the way back in.
            ' ' if i == 0 || i == last => out.push_str("&#x20;"),
            c if !is_xml_char(c) => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
}

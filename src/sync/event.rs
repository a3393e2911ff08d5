//! Journal entry payloads and the `L-<id>` entry file format.
//!
//! An entry file is a small XML document:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <event>
//! <itemid>42</itemid>
//! <props>
//! <current_mood>calm</current_mood>
//! </props>
//! <subject>Hello &amp; welcome</subject>
//! </event>
//! ```
//!
//! Keys are written in sorted order, a list repeats its tag once per element
//! and a null value is an empty element. Only `<`, `>` and `&` are escaped.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Payload of one journal entry as returned by the service.
pub type EventMap = BTreeMap<String, EventValue>;

/// A value inside an entry payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValue {
    Null,
    Int(i64),
    Str(String),
    Map(EventMap),
    List(Vec<EventValue>),
}

impl From<i64> for EventValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for EventValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for EventValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<EventMap> for EventValue {
    fn from(m: EventMap) -> Self {
        Self::Map(m)
    }
}

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// ASCII-only XML names: a letter or `_`, then letters, digits, `_`, `-`, `.`.
fn is_valid_tag(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Render an entry payload as the bytes of an entry file.
///
/// # Errors
///
/// Returns a protocol error if a key is not a valid tag name or a list is
/// nested directly inside another list. Nothing is written in that case.
pub fn render_event_document(event: &EventMap) -> Result<String> {
    let mut out = String::from(XML_HEADER);
    out.push_str("<event>\n");
    write_map(&mut out, event)?;
    out.push_str("</event>\n");
    Ok(out)
}

fn write_map(out: &mut String, map: &EventMap) -> Result<()> {
    if let Some(bad) = map.keys().find(|k| !is_valid_tag(k)) {
        return Err(Error::Protocol(format!(
            "cannot serialize entry key '{bad}' as an XML name"
        )));
    }
    for (key, value) in map {
        match value {
            EventValue::List(items) => {
                for item in items {
                    if matches!(item, EventValue::List(_)) {
                        return Err(Error::Protocol(format!(
                            "entry key '{key}' holds a nested list"
                        )));
                    }
                    write_element(out, key, item)?;
                }
            }
            other => write_element(out, key, other)?,
        }
    }
    Ok(())
}

fn write_element(out: &mut String, tag: &str, value: &EventValue) -> Result<()> {
    out.push('<');
    out.push_str(tag);
    match value {
        EventValue::Null => {
            out.push_str("/>\n");
            return Ok(());
        }
        EventValue::Int(n) => {
            out.push('>');
            out.push_str(&n.to_string());
        }
        EventValue::Str(s) => {
            out.push('>');
            escape_text(out, s);
        }
        EventValue::Map(m) => {
            out.push_str(">\n");
            write_map(out, m)?;
        }
        EventValue::List(_) => {
            return Err(Error::Protocol(format!(
                "entry key '{tag}' holds a nested list"
            )));
        }
    }
    out.push_str("</");
    out.push_str(tag);
    out.push_str(">\n");
    Ok(())
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
}

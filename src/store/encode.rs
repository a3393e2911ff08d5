//! Encoder for the line store.

use super::{Value, is_valid_name};

/// Builds a store file line by line.
///
/// Items are written in call order; nothing is reordered.
#[derive(Debug, Default)]
pub struct Encoder {
    out: String,
}

/// Row writer handed to [`Encoder::table`].
pub struct TableEncoder<'e> {
    out: &'e mut String,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a comment. Multi-line text becomes one comment line per line.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            if line.is_empty() {
                self.out.push_str("#\n");
            } else {
                self.out.push_str("# ");
                self.out.push_str(line);
                self.out.push('\n');
            }
        }
        self
    }

    pub fn blank_line(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    /// Emit `name = value`.
    pub fn scalar(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        debug_assert!(is_valid_name(name), "invalid store item name {name:?}");
        self.out.push_str(name);
        self.out.push_str(" = ");
        write_value(&mut self.out, &value.into());
        self.out.push('\n');
        self
    }

    /// Emit a table; `rows` writes its rows through the given writer.
    pub fn table(&mut self, name: &str, rows: impl FnOnce(&mut TableEncoder<'_>)) -> &mut Self {
        debug_assert!(is_valid_name(name), "invalid store item name {name:?}");
        self.out.push_str(name);
        self.out.push_str(" {\n");
        rows(&mut TableEncoder { out: &mut self.out });
        self.out.push_str("}\n");
        self
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}

impl TableEncoder<'_> {
    /// Emit one row. An empty row is written as an empty line, which the
    /// decoder would skip, so callers always pass at least one field.
    pub fn row<I>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.out.push_str(" ");
        for field in fields {
            self.out.push(' ');
            write_value(self.out, &field.into());
        }
        self.out.push('\n');
        self
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '"' => out.push_str("\\\""),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
    }
}

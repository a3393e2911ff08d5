//! Forward-only decoder for the line store.
//!
//! The decoder never looks back: callers ask for the next item, and for a
//! table, pull its rows one at a time. Rows a caller does not want are
//! skipped by the next [`Decoder::next_item`] call.

use std::iter::{Enumerate, Peekable};
use std::str::{CharIndices, Lines};

use super::{FieldKind, ItemKind, StoreError, Value, is_valid_name};

/// Cursor over the items of a store file.
pub struct Decoder<'a> {
    lines: Enumerate<Lines<'a>>,
    /// Name and header line of the table whose rows are being read.
    open_table: Option<(&'a str, usize)>,
}

/// One top-level item.
#[derive(Debug)]
pub enum Item<'a> {
    Scalar(Scalar<'a>),
    /// A table header; rows follow through [`Decoder::next_row`].
    Table(&'a str),
}

impl<'a> Item<'a> {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Scalar(_) => ItemKind::Scalar,
            Self::Table(_) => ItemKind::Table,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            Self::Scalar(scalar) => scalar.name,
            Self::Table(name) => *name,
        }
    }
}

/// A decoded `name = value` line.
#[derive(Debug)]
pub struct Scalar<'a> {
    pub name: &'a str,
    pub line: usize,
    value: Value,
}

impl Scalar<'_> {
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value is a string.
    pub fn int(self) -> Result<i64, StoreError> {
        expect_int(self.value, self.line)
    }

    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value is an integer.
    pub fn string(self) -> Result<String, StoreError> {
        expect_str(self.value, self.line)
    }
}

/// One table row with typed, in-order field extraction.
#[derive(Debug)]
pub struct Row {
    line: usize,
    fields: std::vec::IntoIter<Value>,
}

impl Row {
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Take the next field as an integer.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when the row is exhausted, `TypeMismatch` when
    /// the field is a string.
    pub fn int(&mut self) -> Result<i64, StoreError> {
        let value = self.take()?;
        expect_int(value, self.line)
    }

    /// Take the next field as a string.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when the row is exhausted, `TypeMismatch` when
    /// the field is an integer.
    pub fn string(&mut self) -> Result<String, StoreError> {
        let value = self.take()?;
        expect_str(value, self.line)
    }

    /// Assert that every field was consumed (rows have fixed arity).
    ///
    /// # Errors
    ///
    /// Returns `TrailingFields` if fields remain.
    pub fn finish(self) -> Result<(), StoreError> {
        let extra = self.fields.len();
        if extra == 0 {
            Ok(())
        } else {
            Err(StoreError::TrailingFields {
                line: self.line,
                extra,
            })
        }
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.fields.collect()
    }

    fn take(&mut self) -> Result<Value, StoreError> {
        self.fields
            .next()
            .ok_or(StoreError::MissingField { line: self.line })
    }
}

impl<'a> Decoder<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            open_table: None,
        }
    }

    /// Advance to the next item, skipping unread rows of the current table.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` for malformed lines or an unterminated table.
    pub fn next_item(&mut self) -> Result<Option<Item<'a>>, StoreError> {
        while self.next_row()?.is_some() {}

        let Some((line, text)) = self.next_data_line() else {
            return Ok(None);
        };

        let name_end = text
            .find(|c: char| c.is_whitespace() || c == '=' || c == '{')
            .unwrap_or(text.len());
        let name = &text[..name_end];
        if !is_valid_name(name) {
            return Err(syntax(line, format!("invalid item name '{name}'")));
        }

        let rest = text[name_end..].trim_start();
        if rest == "{" {
            self.open_table = Some((name, line));
            return Ok(Some(Item::Table(name)));
        }

        let Some(value_text) = rest.strip_prefix('=') else {
            return Err(syntax(line, format!("expected '=' or '{{' after '{name}'")));
        };
        let mut fields = parse_fields(value_text, line)?;
        if fields.len() != 1 {
            return Err(syntax(
                line,
                format!("scalar '{name}' must have exactly one value"),
            ));
        }
        let value = fields.remove(0);
        Ok(Some(Item::Scalar(Scalar { name, line, value })))
    }

    /// Next row of the current table, or `None` at the table's end (or when
    /// no table is open).
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` for malformed rows or an unterminated table.
    pub fn next_row(&mut self) -> Result<Option<Row>, StoreError> {
        let Some((name, header_line)) = self.open_table else {
            return Ok(None);
        };

        match self.next_data_line() {
            None => Err(StoreError::UnterminatedTable {
                line: header_line,
                name: name.to_string(),
            }),
            Some((_, "}")) => {
                self.open_table = None;
                Ok(None)
            }
            Some((line, text)) => {
                let fields = parse_fields(text, line)?;
                Ok(Some(Row {
                    line,
                    fields: fields.into_iter(),
                }))
            }
        }
    }

    /// Next line that carries data, trimmed, with its 1-indexed number.
    fn next_data_line(&mut self) -> Option<(usize, &'a str)> {
        for (index, raw) in self.lines.by_ref() {
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return Some((index + 1, text));
        }
        None
    }
}

fn syntax(line: usize, message: String) -> StoreError {
    StoreError::Syntax { line, message }
}

fn expect_int(value: Value, line: usize) -> Result<i64, StoreError> {
    match value {
        Value::Int(n) => Ok(n),
        Value::Str(_) => Err(StoreError::TypeMismatch {
            line,
            expected: FieldKind::Int,
            found: FieldKind::Str,
        }),
    }
}

fn expect_str(value: Value, line: usize) -> Result<String, StoreError> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Int(_) => Err(StoreError::TypeMismatch {
            line,
            expected: FieldKind::Str,
            found: FieldKind::Int,
        }),
    }
}

/// Split a line into whitespace-separated fields.
fn parse_fields(text: &str, line: usize) -> Result<Vec<Value>, StoreError> {
    let mut chars = text.char_indices().peekable();
    let mut fields = Vec::new();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let Some(&(start, c)) = chars.peek() else {
            break;
        };

        if c == '"' {
            chars.next();
            fields.push(Value::Str(parse_string(&mut chars, line)?));
            if let Some(&(_, next)) = chars.peek() {
                if !next.is_whitespace() {
                    return Err(syntax(line, "expected whitespace after string".into()));
                }
            }
        } else if c == '-' || c.is_ascii_digit() {
            let mut end = text.len();
            while let Some(&(i, c)) = chars.peek() {
                if c.is_whitespace() {
                    end = i;
                    break;
                }
                chars.next();
            }
            let token = &text[start..end];
            let n = token
                .parse::<i64>()
                .map_err(|e| syntax(line, format!("invalid integer '{token}': {e}")))?;
            fields.push(Value::Int(n));
        } else {
            return Err(syntax(line, format!("unexpected character '{c}'")));
        }
    }

    Ok(fields)
}

/// Read a quoted string body; the opening quote is already consumed.
fn parse_string(chars: &mut Peekable<CharIndices<'_>>, line: usize) -> Result<String, StoreError> {
    let mut s = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '"' => return Ok(s),
            '\\' => match chars.next() {
                Some((_, '\\')) => s.push('\\'),
                Some((_, '"')) => s.push('"'),
                Some((_, 'n')) => s.push('\n'),
                Some((_, 'r')) => s.push('\r'),
                Some((_, 't')) => s.push('\t'),
                Some((_, other)) => {
                    return Err(syntax(line, format!("unknown escape '\\{other}'")));
                }
                None => break,
            },
            c => s.push(c),
        }
    }
    Err(syntax(line, "unterminated string".into()))
}

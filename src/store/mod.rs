//! Line-oriented, diff-stable text store.
//!
//! State files are a sequence of named items. A **scalar** holds one
//! integer or string; a **table** holds ordered rows of typed fields:
//!
//! ```text
//! # map from user-id to user-name
//! cursor = "2024-03-01 10:22:05"
//!
//! users {
//!   17 "alice"
//!   42 "bob \"the builder\""
//! }
//! ```
//!
//! Lines starting with `#` and blank lines are ignored by the decoder.
//! Strings are always quoted and escape `\\`, `"`, newline, carriage
//! return and tab, so every value fits on one line and round-trips exactly.
//!
//! The encoder writes rows in the order it is given them. Callers that build
//! rows from a map iterate a `BTreeMap` so that two runs with the same
//! content produce byte-identical files.
//!
//! # Submodules
//!
//! - [`encode`] - `Encoder` builder
//! - [`decode`] - forward-only `Decoder` cursor

pub mod decode;
pub mod encode;

pub use decode::{Decoder, Item, Row, Scalar};
pub use encode::Encoder;

use std::fmt;

/// A single typed field: the only two kinds the format knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// The kind of this value, for error reporting.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Int(_) => FieldKind::Int,
            Self::Str(_) => FieldKind::Str,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

/// Field kinds, used in type-mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Str,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "integer"),
            Self::Str => write!(f, "string"),
        }
    }
}

/// Item kinds as seen by the decoder cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Scalar,
    Table,
}

/// Parse errors. Line numbers are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: expected {expected}, found {found}")]
    TypeMismatch {
        line: usize,
        expected: FieldKind,
        found: FieldKind,
    },

    #[error("line {line}: row has fewer fields than expected")]
    MissingField { line: usize },

    #[error("line {line}: row has {extra} unexpected trailing field(s)")]
    TrailingFields { line: usize, extra: usize },

    #[error("line {line}: table '{name}' is never closed")]
    UnterminatedTable { line: usize, name: String },
}

/// Check that `name` is usable as an item name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Owned form of one item, for generic whole-file handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentItem {
    Scalar { name: String, value: Value },
    Table { name: String, rows: Vec<Vec<Value>> },
}

/// A fully decoded file. Comments and blank lines are not data and are
/// therefore not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub items: Vec<DocumentItem>,
}

impl Document {
    /// Decode a whole file eagerly.
    ///
    /// # Errors
    ///
    /// Returns the first parse error in the text.
    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let mut decoder = Decoder::new(text);
        let mut items = Vec::new();
        while let Some(item) = decoder.next_item()? {
            match item {
                Item::Scalar(scalar) => items.push(DocumentItem::Scalar {
                    name: scalar.name.to_string(),
                    value: scalar.into_value(),
                }),
                Item::Table(name) => {
                    let name = name.to_string();
                    let mut rows = Vec::new();
                    while let Some(row) = decoder.next_row()? {
                        rows.push(row.into_values());
                    }
                    items.push(DocumentItem::Table { name, rows });
                }
            }
        }
        Ok(Self { items })
    }

    /// Encode back to text.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut encoder = Encoder::new();
        for item in &self.items {
            match item {
                DocumentItem::Scalar { name, value } => {
                    encoder.scalar(name, value.clone());
                }
                DocumentItem::Table { name, rows } => {
                    encoder.table(name, |table| {
                        for row in rows {
                            table.row(row.iter().cloned());
                        }
                    });
                }
            }
        }
        encoder.finish()
    }
}

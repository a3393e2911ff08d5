//! Account-wide state: downloaded userpics.
//!
//! Stored as `account.data/account.linedb`. The file counter only grows and
//! a URL, once mapped to a file name, keeps that name forever.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::{Decoder, Encoder, Item, StoreError, Value};
use crate::sync::file::atomic_write;

/// Directory under the dump root holding account data. The dot keeps it
/// from ever colliding with a journal name.
pub const ACCOUNT_DATA_DIR: &str = "account.data";

/// File name of the account state inside [`ACCOUNT_DATA_DIR`].
pub const ACCOUNT_STATE_FILE: &str = "account.linedb";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    pub file_counter: i64,
    pub default_picture_url: String,
    /// Picture URL to local file name.
    pub picture_files: BTreeMap<String, String>,
    /// Picture keyword to picture URL.
    pub keyword_urls: BTreeMap<String, String>,
}

impl AccountState {
    #[must_use]
    pub fn path(account_dir: &Path) -> PathBuf {
        account_dir.join(ACCOUNT_STATE_FILE)
    }

    /// Whether a picture URL has already been stored.
    #[must_use]
    pub fn has_picture(&self, url: &str) -> bool {
        self.picture_files.contains_key(url)
    }

    /// Take the next file sequence number.
    pub fn next_file_number(&mut self) -> i64 {
        self.file_counter += 1;
        self.file_counter
    }

    /// Record a stored picture. Existing URL mappings are never replaced.
    pub fn record_picture(&mut self, url: &str, file_name: String, keyword: Option<&str>) {
        self.picture_files.entry(url.to_string()).or_insert(file_name);
        match keyword {
            Some(keyword) => {
                self.keyword_urls.insert(keyword.to_string(), url.to_string());
            }
            None => self.default_picture_url = url.to_string(),
        }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        let mut e = Encoder::new();
        e.scalar("file_counter", self.file_counter)
            .scalar("default_picture_url", self.default_picture_url.as_str());

        e.blank_line().comment("map from url to filename");
        encode_string_map(&mut e, "picture_files", &self.picture_files);

        e.blank_line().comment("map from picture-keyword to picture-url");
        encode_string_map(&mut e, "keyword_urls", &self.keyword_urls);
        e.finish()
    }

    /// # Errors
    ///
    /// Returns the first `StoreError` in the text.
    pub fn decode(text: &str) -> std::result::Result<Self, StoreError> {
        let mut state = Self::default();
        let mut d = Decoder::new(text);
        while let Some(item) = d.next_item()? {
            match item {
                Item::Scalar(s) if s.name == "file_counter" => state.file_counter = s.int()?,
                Item::Scalar(s) if s.name == "default_picture_url" => {
                    state.default_picture_url = s.string()?;
                }
                Item::Table("picture_files") => {
                    decode_string_map(&mut d, &mut state.picture_files)?;
                }
                Item::Table("keyword_urls") => {
                    decode_string_map(&mut d, &mut state.keyword_urls)?;
                }
                Item::Scalar(_) | Item::Table(_) => {}
            }
        }
        Ok(state)
    }

    /// Read the account state; a missing file means a fresh account.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read and a state error
    /// if it cannot be parsed.
    pub fn load(account_dir: &Path) -> Result<Self> {
        let path = Self::path(account_dir);
        match fs::read_to_string(&path) {
            Ok(text) => Self::decode(&text).map_err(|source| Error::State { path, source }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::storage("read", path, e)),
        }
    }

    /// # Errors
    ///
    /// Returns a storage error if the write or rename fails.
    pub fn save(&self, account_dir: &Path) -> Result<()> {
        atomic_write(&Self::path(account_dir), self.encode().as_bytes())
    }
}

fn encode_string_map(e: &mut Encoder, name: &str, map: &BTreeMap<String, String>) {
    e.table(name, |t| {
        for (key, value) in map {
            t.row([Value::from(key), Value::from(value)]);
        }
    });
}

fn decode_string_map(
    d: &mut Decoder<'_>,
    map: &mut BTreeMap<String, String>,
) -> std::result::Result<(), StoreError> {
    while let Some(mut row) = d.next_row()? {
        let key = row.string()?;
        let value = row.string()?;
        row.finish()?;
        map.insert(key, value);
    }
    Ok(())
}

//! One-time import of state written by the original Python ljdump.
//!
//! The Python tool kept three files in each journal directory:
//!
//! - `.last` - first line is the last sync time
//! - `comment.meta` - pickled dict `{comment_id: {"posterid": str, "state": str}}`
//! - `user.map` - pickled dict `{user_id_str: user_name}`
//!
//! This is only consulted when a journal has no `journal.linedb` yet.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_pickle::DeOptions;

use crate::error::{Error, Result};
use crate::state::journal::{CommentMeta, JournalState, SyncCursor, UserId};

/// Source of prior-format state for a journal directory.
pub trait LegacyStateSource: Send + Sync {
    /// Load prior state, or `None` when the directory holds none.
    ///
    /// # Errors
    ///
    /// Returns an error if prior state exists but cannot be read.
    fn load(&self, journal_dir: &Path) -> Result<Option<JournalState>>;
}

/// Importer that never finds anything.
pub struct NoLegacyState;

impl LegacyStateSource for NoLegacyState {
    fn load(&self, _journal_dir: &Path) -> Result<Option<JournalState>> {
        Ok(None)
    }
}

/// Reader for the Python tool's `.last`, `comment.meta` and `user.map`.
pub struct PythonLegacyImport;

#[derive(Debug, Deserialize)]
struct PickledCommentMeta {
    posterid: String,
    state: String,
}

impl LegacyStateSource for PythonLegacyImport {
    fn load(&self, journal_dir: &Path) -> Result<Option<JournalState>> {
        let mut state = JournalState::default();
        let mut found = false;

        if let Some(cursor) = read_last_sync(&journal_dir.join(".last"))? {
            state.cursor = SyncCursor::new(cursor);
            found = true;
        }

        let meta_path = journal_dir.join("comment.meta");
        if let Some(meta) = read_pickle::<HashMap<i64, PickledCommentMeta>>(&meta_path)? {
            for (id, entry) in meta {
                let poster_id = parse_user_id(&entry.posterid, &meta_path)?;
                state.comments.insert(
                    id,
                    CommentMeta {
                        poster_id,
                        state: entry.state,
                    },
                );
            }
            found = true;
        }

        let users_path = journal_dir.join("user.map");
        if let Some(users) = read_pickle::<HashMap<String, String>>(&users_path)? {
            for (id, name) in users {
                state.users.insert(parse_user_id(&id, &users_path)?, name);
            }
            found = true;
        }

        Ok(found.then_some(state))
    }
}

/// First line of `.last`; the rest of the file (max comment id) is derived
/// from the comment metadata instead.
fn read_last_sync(path: &Path) -> Result<Option<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::storage("open", path, e)),
    };
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| Error::storage("read", path, e))?;
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn read_pickle<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::storage("open", path, e)),
    };
    serde_pickle::from_reader(BufReader::new(file), DeOptions::new().decode_strings())
        .map(Some)
        .map_err(|e| legacy_error(path, e.to_string()))
}

/// An empty string stands for the anonymous user.
fn parse_user_id(text: &str, path: &Path) -> Result<UserId> {
    if text.is_empty() {
        return Ok(0);
    }
    text.parse()
        .map_err(|e| legacy_error(path, format!("user id '{text}' is not an integer: {e}")))
}

fn legacy_error(path: &Path, message: String) -> Error {
    Error::LegacyImport {
        path: PathBuf::from(path),
        message,
    }
}

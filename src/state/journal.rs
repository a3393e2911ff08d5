//! Per-journal synchronization state.
//!
//! Stored as `<journal>/journal.linedb`:
//!
//! ```text
//! cursor = "2024-03-01 10:22:05"
//!
//! # map from user-id to user-name
//! users {
//!   17 "alice"
//! }
//!
//! # map from comment-id to (poster-id state)
//! comment_meta {
//!   101 17 "A"
//! }
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::state::legacy::LegacyStateSource;
use crate::store::{Decoder, Encoder, Item, StoreError, Value};
use crate::sync::file::atomic_write;

/// File name of the journal state inside the journal directory.
pub const JOURNAL_STATE_FILE: &str = "journal.linedb";

pub type UserId = i64;
pub type CommentId = i64;

/// Resume token for the post change feed.
///
/// Opaque to us apart from its ordering. It only ever moves forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncCursor(String);

impl SyncCursor {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move to `token` if it is ahead of the current position.
    ///
    /// Returns whether the cursor moved.
    pub fn advance_to(&mut self, token: &str) -> bool {
        match self.0.as_str().cmp(token) {
            Ordering::Less => {
                self.0 = token.to_string();
                true
            }
            Ordering::Equal | Ordering::Greater => false,
        }
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last known poster and moderation state of a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentMeta {
    pub poster_id: UserId,
    pub state: String,
}

/// Everything we remember about a journal between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalState {
    pub cursor: SyncCursor,
    pub users: BTreeMap<UserId, String>,
    pub comments: BTreeMap<CommentId, CommentMeta>,
}

impl JournalState {
    /// Path of the state file for a journal directory.
    #[must_use]
    pub fn path(journal_dir: &Path) -> PathBuf {
        journal_dir.join(JOURNAL_STATE_FILE)
    }

    /// Highest comment id already recorded, if any.
    #[must_use]
    pub fn max_comment_id(&self) -> Option<CommentId> {
        self.comments.keys().next_back().copied()
    }

    /// Add user-directory entries. Returns whether anything changed.
    pub fn merge_users(&mut self, users: impl IntoIterator<Item = (UserId, String)>) -> bool {
        let mut changed = false;
        for (id, name) in users {
            if self.users.get(&id) != Some(&name) {
                self.users.insert(id, name);
                changed = true;
            }
        }
        changed
    }

    /// Record comment metadata; later values win. Returns whether anything
    /// changed.
    pub fn merge_comments(
        &mut self,
        comments: impl IntoIterator<Item = (CommentId, CommentMeta)>,
    ) -> bool {
        let mut changed = false;
        for (id, meta) in comments {
            if self.comments.get(&id) != Some(&meta) {
                self.comments.insert(id, meta);
                changed = true;
            }
        }
        changed
    }

    /// Serialize to the line store format. Maps are emitted in key order.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut e = Encoder::new();
        e.scalar("cursor", self.cursor.as_str());

        e.blank_line().comment("map from user-id to user-name");
        e.table("users", |t| {
            for (id, name) in &self.users {
                t.row([Value::Int(*id), Value::from(name)]);
            }
        });

        e.blank_line().comment("map from comment-id to (poster-id state)");
        e.table("comment_meta", |t| {
            for (id, meta) in &self.comments {
                t.row([
                    Value::Int(*id),
                    Value::Int(meta.poster_id),
                    Value::from(&meta.state),
                ]);
            }
        });
        e.finish()
    }

    /// Parse the line store format. Unknown items are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError` in the text.
    pub fn decode(text: &str) -> std::result::Result<Self, StoreError> {
        let mut state = Self::default();
        let mut d = Decoder::new(text);
        while let Some(item) = d.next_item()? {
            match item {
                Item::Scalar(s) if s.name == "cursor" => {
                    state.cursor = SyncCursor::new(s.string()?);
                }
                Item::Table("users") => {
                    while let Some(mut row) = d.next_row()? {
                        let id = row.int()?;
                        let name = row.string()?;
                        row.finish()?;
                        state.users.insert(id, name);
                    }
                }
                Item::Table("comment_meta") => {
                    while let Some(mut row) = d.next_row()? {
                        let id = row.int()?;
                        let poster_id = row.int()?;
                        let comment_state = row.string()?;
                        row.finish()?;
                        state.comments.insert(
                            id,
                            CommentMeta {
                                poster_id,
                                state: comment_state,
                            },
                        );
                    }
                }
                Item::Scalar(_) | Item::Table(_) => {}
            }
        }
        Ok(state)
    }

    /// Read the state of a journal directory.
    ///
    /// Returns `None` when the file is missing or empty.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read and a state error
    /// if it cannot be parsed.
    pub fn load(journal_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(journal_dir);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage("read", path, e)),
        };
        if text.is_empty() {
            return Ok(None);
        }
        Self::decode(&text)
            .map(Some)
            .map_err(|source| Error::State { path, source })
    }

    /// Read the current state, falling back once to a legacy importer when
    /// no current-format file exists.
    ///
    /// Imported state is written in the current format right away so the
    /// importer is never consulted again for this journal.
    ///
    /// # Errors
    ///
    /// Propagates read, parse, import and write failures.
    pub fn load_or_import(journal_dir: &Path, legacy: &dyn LegacyStateSource) -> Result<Self> {
        if let Some(state) = Self::load(journal_dir)? {
            return Ok(state);
        }
        match legacy.load(journal_dir)? {
            Some(state) => {
                info!(
                    "Converting legacy journal state into {}",
                    Self::path(journal_dir).display()
                );
                state.save(journal_dir)?;
                Ok(state)
            }
            None => Ok(Self::default()),
        }
    }

    /// Write the state file atomically.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write or rename fails.
    pub fn save(&self, journal_dir: &Path) -> Result<()> {
        atomic_write(&Self::path(journal_dir), self.encode().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::legacy::NoLegacyState;
    use tempfile::TempDir;

    fn sample_state() -> JournalState {
        let mut state = JournalState {
            cursor: SyncCursor::new("2024-03-01 10:22:05"),
            ..Default::default()
        };
        state.users.insert(42, "bob".into());
        state.users.insert(17, "alice \"a\"".into());
        state.comments.insert(
            101,
            CommentMeta {
                poster_id: 17,
                state: "A".into(),
            },
        );
        state.comments.insert(
            99,
            CommentMeta {
                poster_id: 0,
                state: String::new(),
            },
        );
        state
    }

    struct FixedLegacy(JournalState);

    impl LegacyStateSource for FixedLegacy {
        fn load(&self, _journal_dir: &Path) -> Result<Option<JournalState>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[test]
    fn test_cursor_only_moves_forward() {
        let mut cursor = SyncCursor::new("2024-01-02 00:00:00");
        assert!(!cursor.advance_to("2024-01-01 00:00:00"));
        assert!(!cursor.advance_to("2024-01-02 00:00:00"));
        assert!(cursor.advance_to("2024-01-03 00:00:00"));
        assert_eq!(cursor.as_str(), "2024-01-03 00:00:00");

        let mut empty = SyncCursor::default();
        assert!(empty.advance_to("1999-01-01 00:00:00"));
    }

    #[test]
    fn test_round_trip() {
        let state = sample_state();
        let decoded = JournalState::decode(&state.encode()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_encoding_sorted_regardless_of_insertion_order() {
        let a = sample_state();
        let mut b = JournalState {
            cursor: a.cursor.clone(),
            ..Default::default()
        };
        for (id, meta) in a.comments.iter().rev() {
            b.comments.insert(*id, meta.clone());
        }
        for (id, name) in a.users.iter().rev() {
            b.users.insert(*id, name.clone());
        }
        assert_eq!(a.encode(), b.encode());

        let text = a.encode();
        let alice = text.find("17 ").unwrap();
        let bob = text.find("42 ").unwrap();
        assert!(alice < bob);
    }

    #[test]
    fn test_max_comment_id() {
        assert_eq!(JournalState::default().max_comment_id(), None);
        assert_eq!(sample_state().max_comment_id(), Some(101));
    }

    #[test]
    fn test_merge_reports_changes() {
        let mut state = sample_state();
        assert!(!state.merge_users([(42, "bob".to_string())]));
        assert!(state.merge_users([(43, "carol".to_string())]));
        assert!(!state.merge_comments([(
            101,
            CommentMeta {
                poster_id: 17,
                state: "A".into()
            }
        )]));
        assert!(state.merge_comments([(
            101,
            CommentMeta {
                poster_id: 17,
                state: "S".into()
            }
        )]));
        assert_eq!(state.comments[&101].state, "S");
    }

    #[test]
    fn test_decode_ignores_unknown_items() {
        let text = "cursor = \"x\"\nfuture = 1\nextra {\n  1 2 3\n}\n";
        let state = JournalState::decode(text).unwrap();
        assert_eq!(state.cursor.as_str(), "x");
    }

    #[test]
    fn test_decode_rejects_bad_row() {
        let text = "users {\n  \"17\" \"alice\"\n}\n";
        assert!(JournalState::decode(text).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        assert!(JournalState::load(dir.path()).unwrap().is_none());

        let state = sample_state();
        state.save(dir.path()).unwrap();
        assert_eq!(JournalState::load(dir.path()).unwrap(), Some(state));
    }

    #[test]
    fn test_load_reports_parse_error_with_path() {
        let dir = TempDir::new().unwrap();
        fs::write(JournalState::path(dir.path()), "cursor = oops\n").unwrap();
        let err = JournalState::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::State { .. }));
        assert!(err.to_string().contains("journal.linedb"));
    }

    #[test]
    fn test_load_or_import_prefers_current_file() {
        let dir = TempDir::new().unwrap();
        let current = sample_state();
        current.save(dir.path()).unwrap();

        let legacy = FixedLegacy(JournalState {
            cursor: SyncCursor::new("legacy"),
            ..Default::default()
        });
        let loaded = JournalState::load_or_import(dir.path(), &legacy).unwrap();
        assert_eq!(loaded, current);
    }

    #[test]
    fn test_load_or_import_converts_once() {
        let dir = TempDir::new().unwrap();
        let legacy = FixedLegacy(sample_state());

        let loaded = JournalState::load_or_import(dir.path(), &legacy).unwrap();
        assert_eq!(loaded, sample_state());
        assert_eq!(JournalState::load(dir.path()).unwrap(), Some(sample_state()));
    }

    #[test]
    fn test_load_or_import_fresh_journal() {
        let dir = TempDir::new().unwrap();
        let loaded = JournalState::load_or_import(dir.path(), &NoLegacyState).unwrap();
        assert_eq!(loaded, JournalState::default());
        assert!(!JournalState::path(dir.path()).exists());
    }

    mod generated {
        use super::*;
        use proptest::prelude::*;

        fn journal_state() -> impl Strategy<Value = JournalState> {
            let meta = (any::<i64>(), any::<String>())
                .prop_map(|(poster_id, state)| CommentMeta { poster_id, state });
            (
                any::<String>(),
                prop::collection::btree_map(any::<i64>(), any::<String>(), 0..8),
                prop::collection::btree_map(any::<i64>(), meta, 0..8),
            )
                .prop_map(|(cursor, users, comments)| JournalState {
                    cursor: SyncCursor::new(cursor),
                    users,
                    comments,
                })
        }

        proptest! {
            #[test]
            fn test_any_state_round_trips(state in journal_state()) {
                let text = state.encode();
                let decoded = JournalState::decode(&text).unwrap();
                prop_assert_eq!(decoded.encode(), text);
                prop_assert_eq!(decoded, state);
            }

            #[test]
            fn test_save_then_load(state in journal_state()) {
                let dir = TempDir::new().unwrap();
                state.save(dir.path()).unwrap();
                let loaded = JournalState::load(dir.path()).unwrap();
                prop_assert_eq!(loaded, Some(state));
            }
        }
    }
}

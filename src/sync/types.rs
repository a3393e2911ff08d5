//! Records and statistics shared by the sync engines.

use serde::{Deserialize, Deserializer, Serialize};

use crate::state::journal::CommentId;

/// A comment as archived in `C-<postid>`.
///
/// Field names follow the comment file's element names. Missing elements
/// read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentRecord {
    pub id: CommentId,
    #[serde(default)]
    pub state: String,
    /// Resolved poster name; empty for anonymous comments.
    #[serde(default)]
    pub user: String,
    /// Written as an empty `<parentid>` for top-level comments.
    #[serde(rename = "parentid", default, deserialize_with = "parent_id_text")]
    pub parent_id: Option<CommentId>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

fn parent_id_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<CommentId>, D::Error> {
    let text = String::deserialize(d)?;
    match text.trim() {
        "" => Ok(None),
        id => id.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Counts for one journal run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    /// Entry files written.
    pub new_entries: usize,
    /// Comments appended or replaced.
    pub new_comments: usize,
}

impl JournalStats {
    /// Returns true if nothing was archived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_entries == 0 && self.new_comments == 0
    }
}

/// Counts for one userpic pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PictureStats {
    /// Pictures downloaded and recorded.
    pub downloaded: usize,
    /// Downloads that failed and were skipped.
    pub failed: usize,
}

/// Outcome of a successful journal run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalSummary {
    pub journal: String,
    /// Cursor at the start of the run; empty for a first run.
    pub since: String,
    pub cursor: String,
    #[serde(flatten)]
    pub stats: JournalStats,
}

/// Outcome of a whole archive run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub pictures: PictureStats,
    pub journals: Vec<JournalSummary>,
}

//! Incremental archive synchronization.
//!
//! This module mirrors a journal account into a directory tree:
//!
//! - **Posts**: change feed → one `L-<id>` file per entry
//! - **Comments**: id-ordered export → one `C-<postid>` XML file per post
//! - **Pictures**: userpics → `account.data/user-picture-<n>...`
//!
//! # Durability
//!
//! Every file goes through [`atomic_write`]. Progress markers (the post
//! cursor, the comment metadata) only move past an item once its file is on
//! disk, and the drivers save dirty state even when a pass fails, so an
//! interrupted run loses at most the item in flight.
//!
//! # Example
//!
//! ```ignore
//! use ljdump::sync::sync_account;
//! use ljdump::state::legacy::PythonLegacyImport;
//!
//! client.authenticate(&password).await?;
//! let summary = sync_account(&mut client, dump_dir, &journals, &PythonLegacyImport).await?;
//! ```

pub mod comment_file;
pub mod event;
pub mod file;
mod comments;
mod journal;
mod pictures;
mod posts;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use comments::CommentSync;
pub use event::{EventMap, EventValue, render_event_document};
pub use comment_file::{read_comment_file, write_comment_file};
pub use file::atomic_write;
pub use journal::{JournalContext, sync_account, sync_journal};
pub use pictures::PictureSync;
pub use posts::PostSync;
pub use types::{ArchiveSummary, CommentRecord, JournalStats, JournalSummary, PictureStats};

//! Persisted sync state.
//!
//! - [`journal`] - per-journal cursor, user directory and comment metadata
//! - [`account`] - downloaded userpics
//! - [`legacy`] - one-time import from the Python tool's files

pub mod account;
pub mod journal;
pub mod legacy;

pub use account::AccountState;
pub use journal::{CommentMeta, JournalState, SyncCursor};

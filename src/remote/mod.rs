//! Remote journal service.
//!
//! The sync engines only talk to [`JournalService`]. [`FlatClient`] is the
//! HTTP implementation; tests use an in-memory one.

mod export;
mod flat;
mod throttle;

pub use flat::{FlatClient, USER_AGENT};
pub use throttle::{MIN_REQUEST_INTERVAL, Throttle};

use std::future::Future;

use crate::error::Result;
use crate::state::journal::{CommentId, UserId};
use crate::sync::event::EventMap;

/// One entry of the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeItem {
    /// `<type letter>-<number>`, e.g. `L-42`.
    pub item_id: String,
    pub action: String,
    /// Cursor value once this item is processed.
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentMetaEntry {
    pub id: CommentId,
    pub poster_id: UserId,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentUser {
    pub id: UserId,
    pub name: String,
}

/// One page of comment metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentMetaChunk {
    /// Highest comment id the journal has.
    pub max_id: CommentId,
    pub comments: Vec<CommentMetaEntry>,
    pub users: Vec<CommentUser>,
}

/// A full comment from the body export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentBody {
    pub id: CommentId,
    /// Item id of the post the comment belongs to.
    pub post_id: i64,
    /// 0 when the service omitted it.
    pub poster_id: UserId,
    /// Empty when the service omitted it.
    pub state: String,
    pub parent_id: Option<CommentId>,
    pub date: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordPicture {
    pub keyword: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePictures {
    /// Empty when the account has no default picture.
    pub default_url: String,
    pub keyword_pictures: Vec<KeywordPicture>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureDownload {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Operations the sync engines need from the journal service.
///
/// Methods take `&mut self` because every request goes through the
/// client's throttle.
pub trait JournalService: Send {
    /// Change-feed page after `cursor` (empty cursor means from the start).
    fn list_changes(
        &mut self,
        journal: &str,
        cursor: &str,
    ) -> impl Future<Output = Result<Vec<ChangeItem>>> + Send;

    /// Fetch one journal entry. Only the first element is used.
    fn fetch_entry(
        &mut self,
        journal: &str,
        item_id: i64,
    ) -> impl Future<Output = Result<Vec<EventMap>>> + Send;

    /// Comment metadata with ids from `start_id`.
    fn fetch_comment_meta(
        &mut self,
        journal: &str,
        start_id: CommentId,
    ) -> impl Future<Output = Result<CommentMetaChunk>> + Send;

    /// Comment bodies with ids from `start_id`, in id order.
    fn fetch_comment_bodies(
        &mut self,
        journal: &str,
        start_id: CommentId,
    ) -> impl Future<Output = Result<Vec<CommentBody>>> + Send;

    /// Default and keyword userpic URLs of the logged-in account.
    fn fetch_profile_pictures(&mut self) -> impl Future<Output = Result<ProfilePictures>> + Send;

    /// Download a picture. Failures are not fatal to the caller.
    fn download_picture(&mut self, url: &str)
    -> impl Future<Output = Result<PictureDownload>> + Send;
}

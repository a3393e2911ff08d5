//! In-memory journal service for engine tests.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::remote::{
    ChangeItem, CommentBody, CommentMetaChunk, CommentMetaEntry, CommentUser, JournalService,
    PictureDownload, ProfilePictures,
};
use crate::state::journal::{CommentId, UserId};
use crate::sync::event::{EventMap, EventValue};

/// Serves a fixed journal, paging like the real service.
#[derive(Debug, Default)]
pub struct FakeService {
    /// Change feed sorted by time.
    pub changes: Vec<ChangeItem>,
    pub entries: HashMap<i64, EventMap>,
    pub comment_meta: Vec<CommentMetaEntry>,
    pub users: BTreeMap<UserId, String>,
    pub bodies: Vec<CommentBody>,
    pub pictures: ProfilePictures,
    pub downloads: HashMap<String, PictureDownload>,

    pub change_page: usize,
    pub meta_page: usize,
    pub body_page: usize,

    /// Fail `fetch_entry` for this item id.
    pub fail_entry: Option<i64>,
    /// Fail body requests starting at or after this id.
    pub fail_bodies_from: Option<CommentId>,
    /// Report this many more comments than exist.
    pub meta_max_id_override: Option<CommentId>,

    /// Every request made, in order.
    pub calls: Vec<String>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            change_page: 2,
            meta_page: 10,
            body_page: 10,
            ..Default::default()
        }
    }

    /// Add an entry and its change-feed item.
    pub fn add_entry(&mut self, id: i64, time: &str, subject: &str) {
        self.changes.push(ChangeItem {
            item_id: format!("L-{id}"),
            action: "create".into(),
            time: time.into(),
        });
        let mut event = EventMap::new();
        event.insert("itemid".into(), EventValue::Int(id));
        event.insert("subject".into(), EventValue::from(subject));
        self.entries.insert(id, event);
    }

    /// Add a comment with metadata, body and poster.
    pub fn add_comment(&mut self, id: CommentId, post_id: i64, poster: Option<(UserId, &str)>) {
        let poster_id = poster.map_or(0, |(uid, _)| uid);
        if let Some((uid, name)) = poster {
            self.users.insert(uid, name.to_string());
        }
        self.comment_meta.push(CommentMetaEntry {
            id,
            poster_id,
            state: "A".into(),
        });
        self.bodies.push(CommentBody {
            id,
            post_id,
            poster_id,
            state: String::new(),
            parent_id: None,
            date: format!("2024-01-01T00:00:{:02}Z", id % 60),
            subject: String::new(),
            body: format!("comment {id}"),
        });
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl JournalService for FakeService {
    async fn list_changes(&mut self, _journal: &str, cursor: &str) -> Result<Vec<ChangeItem>> {
        self.calls.push(format!("list {cursor}"));
        Ok(self
            .changes
            .iter()
            .filter(|c| c.time.as_str() > cursor)
            .take(self.change_page)
            .cloned()
            .collect())
    }

    async fn fetch_entry(&mut self, _journal: &str, item_id: i64) -> Result<Vec<EventMap>> {
        self.calls.push(format!("entry {item_id}"));
        if self.fail_entry == Some(item_id) {
            return Err(Error::Protocol(format!("entry {item_id} unavailable")));
        }
        Ok(self.entries.get(&item_id).cloned().into_iter().collect())
    }

    async fn fetch_comment_meta(
        &mut self,
        _journal: &str,
        start_id: CommentId,
    ) -> Result<CommentMetaChunk> {
        self.calls.push(format!("meta {start_id}"));
        let comments: Vec<CommentMetaEntry> = self
            .comment_meta
            .iter()
            .filter(|c| c.id >= start_id)
            .take(self.meta_page)
            .cloned()
            .collect();
        let users = comments
            .iter()
            .filter_map(|c| {
                self.users.get(&c.poster_id).map(|name| CommentUser {
                    id: c.poster_id,
                    name: name.clone(),
                })
            })
            .collect();
        let max_id = self
            .meta_max_id_override
            .or_else(|| self.comment_meta.iter().map(|c| c.id).max())
            .unwrap_or(0);
        Ok(CommentMetaChunk {
            max_id,
            comments,
            users,
        })
    }

    async fn fetch_comment_bodies(
        &mut self,
        _journal: &str,
        start_id: CommentId,
    ) -> Result<Vec<CommentBody>> {
        self.calls.push(format!("body {start_id}"));
        if self.fail_bodies_from.is_some_and(|from| start_id >= from) {
            return Err(Error::Protocol("comment_body export unavailable".into()));
        }
        Ok(self
            .bodies
            .iter()
            .filter(|b| b.id >= start_id)
            .take(self.body_page)
            .cloned()
            .collect())
    }

    async fn fetch_profile_pictures(&mut self) -> Result<ProfilePictures> {
        self.calls.push("pictures".into());
        Ok(self.pictures.clone())
    }

    async fn download_picture(&mut self, url: &str) -> Result<PictureDownload> {
        self.calls.push(format!("download {url}"));
        self.downloads
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("404 for {url}")))
    }
}

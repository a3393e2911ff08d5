//! Comment synchronization.
//!
//! Two id-ordered passes start above the highest comment id already in the
//! journal state:
//!
//! 1. **Meta pass**: page through comment metadata, collecting poster ids,
//!    states and user names in memory, until the reported maximum id.
//! 2. **Body pass**: page through comment bodies up to the same id and merge
//!    each into its post's `C-<postid>` file.
//!
//! Metadata reaches the journal state only for comments whose bodies were
//! written, so the next run's lower bound never skips an unarchived comment.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::remote::{CommentBody, JournalService};
use crate::state::journal::{CommentId, CommentMeta, UserId};
use crate::sync::comment_file::{read_comment_file, write_comment_file};
use crate::sync::journal::JournalContext;
use crate::sync::types::CommentRecord;

/// What the meta pass learned.
#[derive(Debug, Default)]
struct MetaPass {
    comments: BTreeMap<CommentId, CommentMeta>,
    users: BTreeMap<UserId, String>,
    /// Highest comment id to archive bodies for.
    target: CommentId,
}

/// Comment synchronization for one journal.
pub struct CommentSync<'a, S> {
    service: &'a mut S,
    cx: &'a mut JournalContext,
}

impl<'a, S: JournalService> CommentSync<'a, S> {
    #[must_use]
    pub fn new(service: &'a mut S, cx: &'a mut JournalContext) -> Self {
        Self { service, cx }
    }

    /// Run both passes and fold the results into the journal state.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, parse or write failure. Whatever was
    /// archived before it is still recorded in the state.
    pub async fn run(mut self) -> Result<()> {
        info!("Fetching journal comments for: {}", self.cx.name);

        let stored_max = self.cx.state.max_comment_id().unwrap_or(0);
        let meta = self.fetch_meta(stored_max).await?;

        let mut frontier = stored_max;
        let result = self.fetch_bodies(&meta, &mut frontier).await;

        let users_changed = self.cx.state.merge_users(meta.users);
        let comments_changed = self.cx.state.merge_comments(
            meta.comments
                .into_iter()
                .filter(|(id, _)| *id <= frontier),
        );
        if users_changed || comments_changed {
            self.cx.dirty = true;
        }
        result
    }

    async fn fetch_meta(&mut self, stored_max: CommentId) -> Result<MetaPass> {
        let mut pass = MetaPass {
            target: stored_max,
            ..Default::default()
        };
        loop {
            let chunk = self
                .service
                .fetch_comment_meta(&self.cx.name, pass.target + 1)
                .await?;
            debug!(
                max_id = chunk.max_id,
                count = chunk.comments.len(),
                "comment metadata chunk"
            );

            let before = pass.target;
            for c in chunk.comments {
                pass.target = pass.target.max(c.id);
                pass.comments.insert(
                    c.id,
                    CommentMeta {
                        poster_id: c.poster_id,
                        state: c.state,
                    },
                );
            }
            pass.users.extend(chunk.users.into_iter().map(|u| (u.id, u.name)));

            if pass.target >= chunk.max_id {
                return Ok(pass);
            }
            if pass.target == before {
                warn!(
                    "Comment metadata for {} stopped at id {} below the reported maximum {}",
                    self.cx.name, pass.target, chunk.max_id
                );
                return Ok(pass);
            }
        }
    }

    async fn fetch_bodies(&mut self, meta: &MetaPass, frontier: &mut CommentId) -> Result<()> {
        while *frontier < meta.target {
            let bodies = self
                .service
                .fetch_comment_bodies(&self.cx.name, *frontier + 1)
                .await?;

            let before = *frontier;
            for body in bodies {
                let id = body.id;
                self.store(body, meta)?;
                *frontier = (*frontier).max(id);
            }
            if *frontier == before {
                return Err(Error::Protocol(format!(
                    "comment_body export for {} returned nothing after id {} (expected up to {})",
                    self.cx.name, before, meta.target
                )));
            }
        }
        Ok(())
    }

    /// Fill in fields the body export left out, preferring this run's
    /// metadata over the stored state.
    fn resolve(&self, body: CommentBody, meta: &MetaPass) -> CommentRecord {
        let known = meta
            .comments
            .get(&body.id)
            .or_else(|| self.cx.state.comments.get(&body.id));

        let state = if body.state.is_empty() {
            known.map(|m| m.state.clone()).unwrap_or_default()
        } else {
            body.state
        };
        let poster_id = if body.poster_id == 0 {
            known.map_or(0, |m| m.poster_id)
        } else {
            body.poster_id
        };
        let user = if poster_id == 0 {
            String::new()
        } else {
            meta.users
                .get(&poster_id)
                .or_else(|| self.cx.state.users.get(&poster_id))
                .cloned()
                .unwrap_or_default()
        };

        CommentRecord {
            id: body.id,
            state,
            user,
            parent_id: body.parent_id,
            date: body.date,
            subject: body.subject,
            body: body.body,
        }
    }

    /// Merge one comment into its post's file, rewriting it only on change.
    fn store(&mut self, body: CommentBody, meta: &MetaPass) -> Result<()> {
        let path: PathBuf = self.cx.dir.join(format!("C-{}", body.post_id));
        let record = self.resolve(body, meta);

        let mut records = read_comment_file(&path)?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) if *existing == record => {
                debug!(
                    "comment id {} was already downloaded in {}",
                    record.id,
                    path.display()
                );
                return Ok(());
            }
            Some(existing) => {
                warn!(
                    "Downloaded comment id {} with different content, replacing it in {}",
                    record.id,
                    path.display()
                );
                *existing = record;
            }
            None => records.push(record),
        }

        write_comment_file(&path, &records)?;
        self.cx.stats.new_comments += 1;
        Ok(())
    }
}

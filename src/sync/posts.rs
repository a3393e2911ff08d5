//! Journal entry synchronization.
//!
//! Walks the change feed from the stored cursor. Each entry is written to
//! `L-<id>` before the cursor moves past it, so a failed run resumes at the
//! item that failed.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::remote::{ChangeItem, JournalService};
use crate::sync::event::render_event_document;
use crate::sync::file::atomic_write;
use crate::sync::journal::JournalContext;

/// Split a change-feed id shaped `<letter>-<digits>`.
fn parse_item_id(item_id: &str) -> Option<(char, i64)> {
    let mut chars = item_id.chars();
    let kind = chars.next().filter(char::is_ascii_alphabetic)?;
    let digits = chars.as_str().strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((kind, digits.parse().ok()?))
}

/// Post synchronization for one journal.
pub struct PostSync<'a, S> {
    service: &'a mut S,
    cx: &'a mut JournalContext,
}

impl<'a, S: JournalService> PostSync<'a, S> {
    #[must_use]
    pub fn new(service: &'a mut S, cx: &'a mut JournalContext) -> Self {
        Self { service, cx }
    }

    /// Fetch change-feed pages until the feed is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, payload or write failure. Items before the
    /// failing one stay committed and the cursor reflects them.
    pub async fn run(mut self) -> Result<()> {
        info!("Fetching journal entries for: {}", self.cx.name);

        loop {
            let page = self
                .service
                .list_changes(&self.cx.name, self.cx.state.cursor.as_str())
                .await?;
            if page.is_empty() {
                return Ok(());
            }

            let before = self.cx.state.cursor.clone();
            for item in &page {
                self.process(item).await?;
            }
            if self.cx.state.cursor == before {
                warn!(
                    "Change feed for {} returned {} items without moving past {}",
                    self.cx.name,
                    page.len(),
                    before
                );
                return Ok(());
            }
        }
    }

    async fn process(&mut self, item: &ChangeItem) -> Result<()> {
        let Some((kind, id)) = parse_item_id(&item.item_id) else {
            warn!("Skipping change feed item with invalid id {}", item.item_id);
            return Ok(());
        };

        if kind == 'L' {
            info!("Fetching journal entry {} ({})", item.item_id, item.action);
            let events = self.service.fetch_entry(&self.cx.name, id).await?;
            let event = events
                .first()
                .ok_or_else(|| Error::Protocol(format!("unexpected empty item {}", item.item_id)))?;
            let document = render_event_document(event)?;
            atomic_write(&self.cx.dir.join(format!("{kind}-{id}")), document.as_bytes())?;
            self.cx.stats.new_entries += 1;
        }

        if self.cx.state.cursor.advance_to(&item.time) {
            self.cx.dirty = true;
        }
        Ok(())
    }
}

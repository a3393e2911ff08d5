//! Run drivers: one journal, and a whole account.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{self, Error, Result};
use crate::remote::JournalService;
use crate::state::account::{ACCOUNT_DATA_DIR, AccountState};
use crate::state::journal::{JournalState, SyncCursor};
use crate::state::legacy::LegacyStateSource;
use crate::sync::comments::CommentSync;
use crate::sync::pictures::PictureSync;
use crate::sync::posts::PostSync;
use crate::sync::types::{ArchiveSummary, JournalStats, JournalSummary};

/// Mutable state of one journal run, shared by the post and comment passes.
#[derive(Debug)]
pub struct JournalContext {
    pub name: String,
    /// Directory holding the journal's archive and state files.
    pub dir: PathBuf,
    pub state: JournalState,
    /// Set when `state` differs from what is on disk.
    pub dirty: bool,
    /// Cursor at the start of the run.
    pub original_cursor: SyncCursor,
    pub stats: JournalStats,
}

impl JournalContext {
    #[must_use]
    pub fn new(name: impl Into<String>, dir: PathBuf, state: JournalState) -> Self {
        Self {
            name: name.into(),
            dir,
            original_cursor: state.cursor.clone(),
            state,
            dirty: false,
            stats: JournalStats::default(),
        }
    }

    fn summary(&self) -> JournalSummary {
        JournalSummary {
            journal: self.name.clone(),
            since: self.original_cursor.to_string(),
            cursor: self.state.cursor.to_string(),
            stats: self.stats,
        }
    }
}

/// Archive one journal: posts, then comments, then persist the state.
///
/// The state is written whenever it changed, including after a failure, so
/// a rerun resumes from the last committed item.
///
/// # Errors
///
/// Returns every failure of the run in order: the sync failure first, then
/// a state write failure if that also happened.
pub async fn sync_journal<S: JournalService>(
    service: &mut S,
    dump_dir: &Path,
    name: &str,
    legacy: &dyn LegacyStateSource,
) -> Result<JournalSummary> {
    let dir = dump_dir.join(name);
    let state = JournalState::load_or_import(&dir, legacy)?;
    fs::create_dir_all(&dir).map_err(|e| Error::storage("create directory", &dir, e))?;

    let mut cx = JournalContext::new(name, dir, state);
    let mut result = PostSync::new(service, &mut cx).run().await;
    if result.is_ok() {
        result = CommentSync::new(service, &mut cx).run().await;
    }
    if cx.dirty {
        result = error::combine(result, cx.state.save(&cx.dir));
    }
    result?;

    let JournalStats {
        new_entries,
        new_comments,
    } = cx.stats;
    if cx.original_cursor.is_empty() {
        info!("{new_entries} new entries, {new_comments} new comments");
    } else {
        info!(
            "{new_entries} new entries, {new_comments} new comments (since {})",
            cx.original_cursor
        );
    }
    Ok(cx.summary())
}

/// Archive the account's userpics, then each journal in order.
///
/// The service must already be authenticated. The run stops at the first
/// journal that fails.
///
/// # Errors
///
/// Returns the first failing step's errors.
pub async fn sync_account<S: JournalService>(
    service: &mut S,
    dump_dir: &Path,
    journals: &[String],
    legacy: &dyn LegacyStateSource,
) -> Result<ArchiveSummary> {
    let account_dir = dump_dir.join(ACCOUNT_DATA_DIR);
    let mut account = AccountState::load(&account_dir)?;

    let pictures = PictureSync::new(service, &account_dir, &mut account)
        .run()
        .await?;

    let mut summary = ArchiveSummary {
        pictures,
        journals: Vec::with_capacity(journals.len()),
    };
    for journal in journals {
        summary
            .journals
            .push(sync_journal(service, dump_dir, journal, legacy).await?);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{KeywordPicture, PictureDownload};
    use crate::state::journal::JOURNAL_STATE_FILE;
    use crate::state::legacy::NoLegacyState;
    use crate::sync::testing::FakeService;
    use tempfile::TempDir;

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(snapshot(&path));
            } else {
                files.push((path.display().to_string(), fs::read(&path).unwrap()));
            }
        }
        files.sort();
        files
    }

    fn populated_service() -> FakeService {
        let mut service = FakeService::new();
        service.add_entry(1, "2024-01-01 00:00:00", "one");
        service.add_entry(2, "2024-01-02 00:00:00", "two");
        service.add_comment(1, 1, Some((17, "bob")));
        service.add_comment(2, 2, None);
        service.pictures.default_url = "https://p/1".into();
        service.pictures.keyword_pictures.push(KeywordPicture {
            keyword: "cat".into(),
            url: "https://p/2".into(),
        });
        for url in ["https://p/1", "https://p/2"] {
            service.downloads.insert(
                url.into(),
                PictureDownload {
                    content_type: Some("image/jpeg".into()),
                    bytes: url.as_bytes().to_vec(),
                },
            );
        }
        service
    }

    #[tokio::test]
    async fn test_single_entry_run_persists_state() {
        let dir = TempDir::new().unwrap();
        let mut service = FakeService::new();
        service.add_entry(42, "2024-05-01 12:00:00", "answer");

        let summary = sync_journal(&mut service, dir.path(), "alice", &NoLegacyState)
            .await
            .unwrap();

        assert_eq!(summary.stats.new_entries, 1);
        assert_eq!(summary.cursor, "2024-05-01 12:00:00");
        assert!(summary.since.is_empty());
        assert!(dir.path().join("alice").join("L-42").exists());

        let state = JournalState::load(&dir.path().join("alice")).unwrap().unwrap();
        assert_eq!(state.cursor.as_str(), "2024-05-01 12:00:00");
    }

    #[tokio::test]
    async fn test_empty_journal_writes_no_state() {
        let dir = TempDir::new().unwrap();
        let mut service = FakeService::new();

        sync_journal(&mut service, dir.path(), "alice", &NoLegacyState)
            .await
            .unwrap();

        assert!(dir.path().join("alice").is_dir());
        assert!(!dir.path().join("alice").join(JOURNAL_STATE_FILE).exists());
    }

    #[tokio::test]
    async fn test_full_rerun_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let mut service = populated_service();
        let journals = vec!["alice".to_string()];

        sync_account(&mut service, dir.path(), &journals, &NoLegacyState)
            .await
            .unwrap();
        let first = snapshot(dir.path());
        assert!(first.iter().any(|(p, _)| p.ends_with("user-picture-2-cat.jpg")));

        let summary = sync_account(&mut service, dir.path(), &journals, &NoLegacyState)
            .await
            .unwrap();

        assert_eq!(snapshot(dir.path()), first);
        assert_eq!(summary.pictures.downloaded, 0);
        assert!(summary.journals[0].stats.is_empty());
        assert_eq!(summary.journals[0].since, "2024-01-02 00:00:00");
    }

    #[tokio::test]
    async fn test_failure_still_saves_progress() {
        let dir = TempDir::new().unwrap();
        let mut service = FakeService::new();
        service.add_entry(1, "2024-01-01 00:00:00", "one");
        service.add_entry(2, "2024-01-02 00:00:00", "two");
        service.fail_entry = Some(2);

        let err = sync_journal(&mut service, dir.path(), "alice", &NoLegacyState)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 6);

        let state = JournalState::load(&dir.path().join("alice")).unwrap().unwrap();
        assert_eq!(state.cursor.as_str(), "2024-01-01 00:00:00");
        // Comments are not attempted after a post failure.
        assert_eq!(service.count_calls("meta"), 0);
    }

    #[tokio::test]
    async fn test_state_write_failure_is_aggregated() {
        let dir = TempDir::new().unwrap();
        let mut service = FakeService::new();
        service.add_entry(1, "2024-01-01 00:00:00", "one");
        service.add_entry(2, "2024-01-02 00:00:00", "two");
        service.fail_entry = Some(2);

        // A directory where the temp state file goes makes the save fail.
        let journal_dir = dir.path().join("alice");
        fs::create_dir_all(journal_dir.join(format!("{JOURNAL_STATE_FILE}.tmp"))).unwrap();

        let err = sync_journal(&mut service, dir.path(), "alice", &NoLegacyState)
            .await
            .unwrap_err();
        let causes = err.causes();
        assert_eq!(causes.len(), 2);
        assert!(matches!(causes[0], Error::Protocol(_)));
        assert!(matches!(causes[1], Error::Storage { .. }));
    }

    #[tokio::test]
    async fn test_journals_processed_in_order() {
        let dir = TempDir::new().unwrap();
        let mut service = FakeService::new();
        let journals = vec!["alice".to_string(), "community".to_string()];

        let summary = sync_account(&mut service, dir.path(), &journals, &NoLegacyState)
            .await
            .unwrap();

        let names: Vec<_> = summary.journals.iter().map(|j| j.journal.as_str()).collect();
        assert_eq!(names, vec!["alice", "community"]);
        assert_eq!(service.calls[0], "pictures");
    }
}

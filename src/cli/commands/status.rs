//! Status command implementation.
//!
//! Reads the state files only; never contacts the server.

use colored::Colorize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::state::{AccountState, JournalState};

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    dump_dir: String,
    account: AccountInfo,
    journals: Vec<JournalInfo>,
}

#[derive(Serialize)]
struct AccountInfo {
    pictures: usize,
    keywords: usize,
    file_counter: i64,
}

#[derive(Serialize)]
struct JournalInfo {
    journal: String,
    /// False when no state file exists yet.
    archived: bool,
    cursor: String,
    users: usize,
    comments: usize,
    max_comment_id: Option<i64>,
}

fn journal_info(config: &Config, journal: &str) -> Result<JournalInfo> {
    let state = JournalState::load(&config.dump_dir.join(journal))?;
    let archived = state.is_some();
    let state = state.unwrap_or_default();
    Ok(JournalInfo {
        journal: journal.to_string(),
        archived,
        cursor: state.cursor.to_string(),
        users: state.users.len(),
        comments: state.comments.len(),
        max_comment_id: state.max_comment_id(),
    })
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if a state file exists but cannot be read or parsed.
pub fn execute(config: &Config, json: bool) -> Result<()> {
    let account = AccountState::load(&config.account_dir())?;
    let output = StatusOutput {
        dump_dir: config.dump_dir.display().to_string(),
        account: AccountInfo {
            pictures: account.picture_files.len(),
            keywords: account.keyword_urls.len(),
            file_counter: account.file_counter,
        },
        journals: config
            .journals
            .iter()
            .map(|j| journal_info(config, j))
            .collect::<Result<_>>()?,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Archive: {}", output.dump_dir);
    println!(
        "  Userpics: {} ({} with keywords)",
        output.account.pictures, output.account.keywords
    );
    println!();
    for j in &output.journals {
        if !j.archived {
            println!("{}  {}", j.journal.bold(), "not archived yet".dimmed());
            continue;
        }
        println!("{}", j.journal.bold());
        let cursor = if j.cursor.is_empty() { "-" } else { j.cursor.as_str() };
        println!("  Synced up to:   {cursor}");
        println!("  Comments:       {}", j.comments);
        if let Some(max) = j.max_comment_id {
            println!("  Last comment:   {max}");
        }
        println!("  Known users:    {}", j.users);
    }
    Ok(())
}

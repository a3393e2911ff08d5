//! Dump command implementation.

use colored::Colorize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::remote::FlatClient;
use crate::state::legacy::PythonLegacyImport;
use crate::sync::{ArchiveSummary, JournalSummary, sync_account};

/// Execute the dump command.
///
/// # Errors
///
/// Returns configuration, login, remote and storage errors. Progress made
/// before a failure stays on disk.
pub fn execute(config: &Config, json: bool, quiet: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let summary = rt.block_on(run(config))?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "dump_dir": config.dump_dir.display().to_string(),
            "pictures": summary.pictures,
            "journals": summary.journals,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet {
        print_summary(config, &summary);
    }
    Ok(())
}

async fn run(config: &Config) -> Result<ArchiveSummary> {
    let password = config.password()?;
    let mut client = FlatClient::new(&config.server, &config.username)?;
    client.authenticate(&password).await?;
    sync_account(
        &mut client,
        &config.dump_dir,
        &config.journals,
        &PythonLegacyImport,
    )
    .await
}

fn journal_line(journal: &JournalSummary) -> String {
    let counts = format!(
        "{} new entries, {} new comments",
        journal.stats.new_entries, journal.stats.new_comments
    );
    let counts = if journal.stats.is_empty() {
        counts.dimmed().to_string()
    } else {
        counts.green().to_string()
    };
    if journal.since.is_empty() {
        format!("  {}: {counts}", journal.journal.bold())
    } else {
        format!(
            "  {}: {counts} {}",
            journal.journal.bold(),
            format!("(since {})", journal.since).dimmed()
        )
    }
}

fn print_summary(config: &Config, summary: &ArchiveSummary) {
    println!("Archive updated: {}", config.dump_dir.display());
    println!();
    for journal in &summary.journals {
        println!("{}", journal_line(journal));
    }
    if summary.pictures.downloaded > 0 {
        println!("  Userpics: {} new", summary.pictures.downloaded);
    }
    if summary.pictures.failed > 0 {
        println!(
            "  {}",
            format!("Userpics: {} failed to download", summary.pictures.failed).yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::JournalStats;

    #[test]
    fn test_journal_line() {
        colored::control::set_override(false);
        let mut journal = JournalSummary {
            journal: "alice".into(),
            since: String::new(),
            cursor: "2024-01-01 00:00:00".into(),
            stats: JournalStats {
                new_entries: 1,
                new_comments: 2,
            },
        };
        assert_eq!(journal_line(&journal), "  alice: 1 new entries, 2 new comments");

        journal.since = "2023-12-31 00:00:00".into();
        assert_eq!(
            journal_line(&journal),
            "  alice: 1 new entries, 2 new comments (since 2023-12-31 00:00:00)"
        );
    }
}

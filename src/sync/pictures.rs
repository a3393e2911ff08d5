//! Userpic synchronization.
//!
//! Downloads each default or keyword picture URL not seen before into the
//! account directory. Download failures only skip the picture.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{self, Result};
use crate::remote::JournalService;
use crate::state::account::AccountState;
use crate::sync::file::atomic_write;
use crate::sync::types::PictureStats;

/// File extension for a picture content type, `.bin` when unknown.
fn extension_for(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return ".bin";
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" | "image/x-png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        "image/svg+xml" => ".svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "image/tiff" => ".tiff",
        "image/avif" => ".avif",
        _ => ".bin",
    }
}

/// Keep Unicode letters, digits, `_` and `-`; everything else becomes `_`.
fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Userpic synchronization for the logged-in account.
pub struct PictureSync<'a, S> {
    service: &'a mut S,
    account_dir: &'a Path,
    state: &'a mut AccountState,
    stats: PictureStats,
}

impl<'a, S: JournalService> PictureSync<'a, S> {
    #[must_use]
    pub fn new(service: &'a mut S, account_dir: &'a Path, state: &'a mut AccountState) -> Self {
        Self {
            service,
            account_dir,
            state,
            stats: PictureStats::default(),
        }
    }

    /// Fetch the picture list and store new pictures.
    ///
    /// The account state is saved when at least one picture was recorded,
    /// even if a later step failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the picture list cannot be fetched or a picture
    /// or the account state cannot be written.
    pub async fn run(mut self) -> Result<PictureStats> {
        let result = self.fetch_all().await;
        let result = if self.stats.downloaded > 0 {
            error::combine(result, self.state.save(self.account_dir))
        } else {
            result
        };
        result.map(|()| self.stats)
    }

    async fn fetch_all(&mut self) -> Result<()> {
        info!("Fetching user pictures");
        let pictures = self.service.fetch_profile_pictures().await?;

        self.store(None, &pictures.default_url).await?;
        for picture in &pictures.keyword_pictures {
            self.store(Some(picture.keyword.as_str()), &picture.url).await?;
        }
        Ok(())
    }

    async fn store(&mut self, keyword: Option<&str>, url: &str) -> Result<()> {
        if url.is_empty() || self.state.has_picture(url) {
            return Ok(());
        }
        match keyword {
            Some("") => {
                warn!("Got empty keyword for user picture {url}");
                return Ok(());
            }
            Some(keyword) => info!("Fetching new '{keyword}' user picture {url}"),
            None => info!("Fetching new default user picture {url}"),
        }

        let download = match self.service.download_picture(url).await {
            Ok(download) => download,
            Err(e) => {
                warn!("Failed to download user picture {url}: {e}");
                self.stats.failed += 1;
                return Ok(());
            }
        };

        let extension = extension_for(download.content_type.as_deref());
        let n = self.state.next_file_number();
        let file_name = match keyword {
            Some(keyword) => format!("user-picture-{n}-{}{extension}", sanitize_keyword(keyword)),
            None => format!("user-picture-{n}{extension}"),
        };
        atomic_write(&self.account_dir.join(&file_name), &download.bytes)?;
        self.state.record_picture(url, file_name, keyword);
        self.stats.downloaded += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{KeywordPicture, PictureDownload, ProfilePictures};
    use crate::sync::testing::FakeService;
    use std::fs;
    use tempfile::TempDir;

    fn png(bytes: &[u8]) -> PictureDownload {
        PictureDownload {
            content_type: Some("image/png".into()),
            bytes: bytes.to_vec(),
        }
    }

    fn service_with_pictures() -> FakeService {
        let mut service = FakeService::new();
        service.pictures = ProfilePictures {
            default_url: "https://p/default".into(),
            keyword_pictures: vec![KeywordPicture {
                keyword: "very happy!".into(),
                url: "https://p/happy".into(),
            }],
        };
        service.downloads.insert("https://p/default".into(), png(b"d"));
        service.downloads.insert(
            "https://p/happy".into(),
            PictureDownload {
                content_type: Some("image/GIF; charset=binary".into()),
                bytes: b"h".to_vec(),
            },
        );
        service
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for(Some("image/jpeg")), ".jpg");
        assert_eq!(extension_for(Some("IMAGE/PNG")), ".png");
        assert_eq!(extension_for(Some("image/gif; q=1")), ".gif");
        assert_eq!(extension_for(Some("text/html")), ".bin");
        assert_eq!(extension_for(None), ".bin");
    }

    #[test]
    fn test_sanitize_keyword() {
        assert_eq!(sanitize_keyword("very happy!"), "very_happy_");
        assert_eq!(sanitize_keyword("кот_2-x"), "кот_2-x");
        assert_eq!(sanitize_keyword("a/b.c"), "a_b_c");
    }

    #[tokio::test]
    async fn test_downloads_new_pictures() {
        let dir = TempDir::new().unwrap();
        let mut service = service_with_pictures();
        let mut state = AccountState::default();

        let stats = PictureSync::new(&mut service, dir.path(), &mut state)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.downloaded, 2);
        assert_eq!(fs::read(dir.path().join("user-picture-1.png")).unwrap(), b"d");
        assert_eq!(
            fs::read(dir.path().join("user-picture-2-very_happy_.gif")).unwrap(),
            b"h"
        );
        assert_eq!(state.default_picture_url, "https://p/default");
        assert_eq!(state.keyword_urls["very happy!"], "https://p/happy");

        let saved = AccountState::load(dir.path()).unwrap();
        assert_eq!(saved, state);
    }

    #[tokio::test]
    async fn test_known_urls_not_downloaded() {
        let dir = TempDir::new().unwrap();
        let mut service = service_with_pictures();
        let mut state = AccountState::default();
        PictureSync::new(&mut service, dir.path(), &mut state)
            .run()
            .await
            .unwrap();
        let saved = fs::read(AccountState::path(dir.path())).unwrap();

        service.calls.clear();
        let stats = PictureSync::new(&mut service, dir.path(), &mut state)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.downloaded, 0);
        assert_eq!(service.count_calls("download"), 0);
        assert_eq!(state.file_counter, 2);
        assert_eq!(fs::read(AccountState::path(dir.path())).unwrap(), saved);
    }

    #[tokio::test]
    async fn test_failed_download_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut service = service_with_pictures();
        service.downloads.remove("https://p/default");
        let mut state = AccountState::default();

        let stats = PictureSync::new(&mut service, dir.path(), &mut state)
            .run()
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.downloaded, 1);
        assert_eq!(state.file_counter, 1);
        assert!(state.default_picture_url.is_empty());
        assert!(dir.path().join("user-picture-1-very_happy_.gif").exists());
    }

    #[tokio::test]
    async fn test_empty_keyword_skipped() {
        let dir = TempDir::new().unwrap();
        let mut service = FakeService::new();
        service.pictures.keyword_pictures.push(KeywordPicture {
            keyword: String::new(),
            url: "https://p/x".into(),
        });
        service.downloads.insert("https://p/x".into(), png(b"x"));
        let mut state = AccountState::default();

        let stats = PictureSync::new(&mut service, dir.path(), &mut state)
            .run()
            .await
            .unwrap();

        assert_eq!(stats, PictureStats::default());
        assert_eq!(service.count_calls("download"), 0);
        assert!(!AccountState::path(dir.path()).exists());
    }
}

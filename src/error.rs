//! Error types for ljdump.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (1=internal, 6=remote, 7=config, 8=storage)
//! - Ordered aggregation of independent failures (`Error::Multiple`)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for ljdump operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Remote service (exit 6)
    ProtocolError,
    HttpError,

    // Config (exit 7)
    ConfigError,
    AuthError,

    // Local storage (exit 8)
    StorageError,
    StateError,
    LegacyImportError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::AuthError => "AUTH_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::StateError => "STATE_ERROR",
            Self::LegacyImportError => "LEGACY_IMPORT_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::ProtocolError | Self::HttpError => 6,
            Self::ConfigError | Self::AuthError => 7,
            Self::StorageError
            | Self::StateError
            | Self::LegacyImportError
            | Self::JsonError => 8,
        }
    }

    /// Whether rerunning later may succeed without changing anything locally.
    ///
    /// Remote failures leave committed progress intact, so a rerun resumes
    /// where this one stopped.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProtocolError | Self::HttpError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur while archiving.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Login to {server} failed: {message}")]
    Auth { server: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to {action} {}: {source}", path.display())]
    Storage {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed state file {}: {source}", path.display())]
    State {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Malformed archive file {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("Failed to import legacy state from {}: {message}", path.display())]
    LegacyImport { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{}", join_messages(.0))]
    Multiple(Vec<Error>),

    #[error("{0}")]
    Other(String),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Build a storage error for a failed filesystem operation.
    pub fn storage(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            action,
            path: path.into(),
            source,
        }
    }

    /// Append another independent failure, keeping both in order.
    #[must_use]
    pub fn combine(self, other: Error) -> Self {
        let mut causes = self.into_causes();
        causes.extend(other.into_causes());
        Self::Multiple(causes)
    }

    /// Flatten into the ordered list of underlying failures.
    #[must_use]
    pub fn into_causes(self) -> Vec<Error> {
        match self {
            Self::Multiple(causes) => causes.into_iter().flat_map(Error::into_causes).collect(),
            other => vec![other],
        }
    }

    /// The underlying failures, in the order they happened.
    #[must_use]
    pub fn causes(&self) -> Vec<&Error> {
        match self {
            Self::Multiple(causes) => causes.iter().flat_map(Error::causes).collect(),
            other => vec![other],
        }
    }

    /// Map this error to its structured `ErrorCode`.
    ///
    /// An aggregate reports the code of its first cause.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Auth { .. } => ErrorCode::AuthError,
            Self::Protocol(_) => ErrorCode::ProtocolError,
            Self::Http(_) => ErrorCode::HttpError,
            Self::Storage { .. } | Self::Archive { .. } => ErrorCode::StorageError,
            Self::State { .. } => ErrorCode::StateError,
            Self::LegacyImport { .. } => ErrorCode::LegacyImportError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Multiple(causes) => causes
                .first()
                .map_or(ErrorCode::InternalError, Error::error_code),
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Auth { .. } => Some(
                "Check the username and the password file. \
                 The password is read from the first line of the file."
                    .to_string(),
            ),
            Self::Protocol(msg) if msg.contains("comment") => Some(
                "Comment export requires the account to own or maintain the journal.".to_string(),
            ),
            Self::Protocol(_) | Self::Http(_) => Some(
                "Everything fetched before the failure was saved. Rerun later to resume."
                    .to_string(),
            ),
            Self::State { path, .. } | Self::Archive { path, .. } => Some(format!(
                "Fix or remove {} by hand; it is plain text.",
                path.display()
            )),
            Self::Config(msg) if msg.contains("password") => Some(
                "Pass --password-file, set LJDUMP_PASSWORD_FILE, or add \"password_file\" to the config file."
                    .to_string(),
            ),
            Self::Multiple(causes) => causes.iter().find_map(Error::hint),
            Self::Config(_)
            | Self::Storage { .. }
            | Self::LegacyImport { .. }
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, every
    /// aggregated cause and an optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let causes: Vec<serde_json::Value> = self
            .causes()
            .into_iter()
            .map(|cause| {
                serde_json::json!({
                    "code": cause.error_code().as_str(),
                    "message": cause.to_string(),
                })
            })
            .collect();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
                "causes": causes,
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

/// Merge two independent outcomes, keeping every failure in order.
///
/// # Errors
///
/// Returns the failure of whichever side failed, or an aggregate of both.
pub fn combine(first: Result<()>, second: Result<()>) -> Result<()> {
    match (first, second) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(a), Err(b)) => Err(a.combine(b)),
    }
}

//! Configuration management.
//!
//! Settings come from three places, highest priority first:
//!
//! 1. Command-line flags, or their `LJDUMP_*` environment variables (clap
//!    reads both)
//! 2. The config file (`ljdump.json` in the current directory unless
//!    `--config` names another)
//! 3. Built-in defaults
//!
//! ```json
//! {
//!   "server": "https://www.livejournal.com",
//!   "username": "alice",
//!   "journals": ["alice", "some_community"],
//!   "password_file": "password.txt"
//! }
//! ```
//!
//! When `ljdump.json` is absent, an XML `ljdump.config` from older
//! archivers is read instead. Any config file whose content starts with `<`
//! is parsed in that format:
//!
//! ```xml
//! <ljdump>
//!   <server>https://www.livejournal.com</server>
//!   <username>alice</username>
//!   <journal>alice</journal>
//!   <journal>some_community</journal>
//!   <passwordFile>password.txt</passwordFile>
//! </ljdump>
//! ```
//!
//! The password is only read when a command needs it.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::state::account::ACCOUNT_DATA_DIR;

/// Config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "ljdump.json";

/// XML config read when [`DEFAULT_CONFIG_FILE`] does not exist.
pub const LEGACY_CONFIG_FILE: &str = "ljdump.config";

pub const DEFAULT_SERVER: &str = "https://www.livejournal.com";

/// On-disk config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub server: Option<String>,
    pub username: Option<String>,
    pub journals: Option<Vec<String>>,
    pub password: Option<String>,
    pub password_file: Option<PathBuf>,
}

/// XML config written for older archivers. Empty elements count as unset.
#[derive(Debug, Default, Deserialize)]
struct LegacyConfigFile {
    server: Option<String>,
    username: Option<String>,
    #[serde(rename = "journal", default)]
    journals: Vec<String>,
    password: Option<String>,
    #[serde(rename = "passwordFile")]
    password_file: Option<String>,
}

impl From<LegacyConfigFile> for ConfigFile {
    fn from(legacy: LegacyConfigFile) -> Self {
        fn set(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        Self {
            server: set(legacy.server),
            username: set(legacy.username),
            journals: (!legacy.journals.is_empty()).then_some(legacy.journals),
            password: set(legacy.password),
            password_file: set(legacy.password_file).map(PathBuf::from),
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub config: Option<PathBuf>,
    pub dump_dir: Option<PathBuf>,
    pub server: Option<String>,
    pub username: Option<String>,
    pub journals: Vec<String>,
    pub password_file: Option<PathBuf>,
}

/// Where the password comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordSource {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl PasswordSource {
    fn from_path(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdin
        } else {
            Self::File(path)
        }
    }

    /// Read the password. Only the first line of a file counts.
    ///
    /// # Errors
    ///
    /// Returns a config error if the source cannot be read or is empty.
    pub fn read(&self) -> Result<String> {
        let password = match self {
            Self::Inline(password) => password.clone(),
            Self::Stdin => read_first_line(io::stdin().lock())
                .map_err(|e| Error::Config(format!("failed to read password from stdin: {e}")))?,
            Self::File(path) => {
                let file = File::open(path).map_err(|e| {
                    Error::Config(format!(
                        "failed to open password file {}: {e}",
                        path.display()
                    ))
                })?;
                read_first_line(BufReader::new(file)).map_err(|e| {
                    Error::Config(format!(
                        "failed to read password file {}: {e}",
                        path.display()
                    ))
                })?
            }
        };
        if password.is_empty() {
            return Err(Error::Config("the password is empty".into()));
        }
        Ok(password)
    }
}

fn read_first_line(mut reader: impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Fully resolved settings for a run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL without a trailing slash.
    pub server: String,
    pub username: String,
    /// Journals to archive, in order.
    pub journals: Vec<String>,
    pub dump_dir: PathBuf,
    password: Option<PasswordSource>,
}

impl Config {
    /// Directory for account-wide data.
    #[must_use]
    pub fn account_dir(&self) -> PathBuf {
        self.dump_dir.join(ACCOUNT_DATA_DIR)
    }

    #[must_use]
    pub fn password_source(&self) -> Option<&PasswordSource> {
        self.password.as_ref()
    }

    /// Resolve the password.
    ///
    /// # Errors
    ///
    /// Returns a config error if none was configured or it cannot be read.
    pub fn password(&self) -> Result<String> {
        self.password
            .as_ref()
            .ok_or_else(|| Error::Config("no password given".into()))?
            .read()
    }
}

/// Strip a trailing `/interface/xmlrpc` or `/` and check the URL.
fn normalize_server(server: &str) -> Result<String> {
    let trimmed = server.trim();
    let trimmed = trimmed.strip_suffix("/interface/xmlrpc").unwrap_or(trimmed);
    let trimmed = trimmed.trim_end_matches('/');

    let url = Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("invalid server URL '{server}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "server URL '{server}' must use http or https"
        )));
    }
    Ok(trimmed.to_string())
}

/// Read the config file; a missing default file is an empty config.
fn read_config_file(path: &Path, explicit: bool) -> Result<ConfigFile> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound && !explicit => {
            return Ok(ConfigFile::default());
        }
        Err(e) => {
            return Err(Error::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            )));
        }
    };
    let parsed = if content.trim_start().starts_with('<') {
        quick_xml::de::from_str::<LegacyConfigFile>(&content)
            .map(ConfigFile::from)
            .map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| {
        Error::Config(format!(
            "failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

/// `ljdump.json` in `dir`, or `ljdump.config` when only that one exists.
fn default_config_path(dir: &Path) -> PathBuf {
    let json = dir.join(DEFAULT_CONFIG_FILE);
    let legacy = dir.join(LEGACY_CONFIG_FILE);
    if !json.exists() && legacy.exists() {
        legacy
    } else {
        json
    }
}

/// Merge overrides, the config file and defaults into a [`Config`].
///
/// # Errors
///
/// Returns a config error for an unreadable config file, a missing
/// username, an empty journal name, an invalid server URL, or both
/// `password` and `password_file` in the file.
pub fn load(overrides: &ConfigOverrides) -> Result<Config> {
    let (path, explicit) = match &overrides.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(Path::new("")), false),
    };
    let file = read_config_file(&path, explicit)?;

    let server = normalize_server(
        overrides
            .server
            .as_deref()
            .or(file.server.as_deref())
            .unwrap_or(DEFAULT_SERVER),
    )?;

    let username = overrides
        .username
        .clone()
        .or(file.username)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            Error::Config(
                "no username given; pass --username, set LJDUMP_USERNAME, or add \"username\" to the config file"
                    .into(),
            )
        })?;

    let journals = if overrides.journals.is_empty() {
        file.journals.unwrap_or_else(|| vec![username.clone()])
    } else {
        overrides.journals.clone()
    };
    if journals.iter().any(|j| j.trim().is_empty()) {
        return Err(Error::Config("journal names must not be empty".into()));
    }

    if file.password.is_some() && file.password_file.is_some() {
        return Err(Error::Config(format!(
            "config file {} sets both password and password_file",
            path.display()
        )));
    }
    let config_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let password = match (&overrides.password_file, file.password, file.password_file) {
        (Some(cli_file), _, _) => Some(PasswordSource::from_path(cli_file.clone())),
        (None, Some(inline), _) => Some(PasswordSource::Inline(inline)),
        (None, None, Some(file_path)) => {
            Some(if file_path.as_os_str() == "-" || file_path.is_absolute() {
                PasswordSource::from_path(file_path)
            } else {
                PasswordSource::File(config_dir.join(file_path))
            })
        }
        (None, None, None) => None,
    };

    Ok(Config {
        server,
        username,
        journals,
        dump_dir: overrides.dump_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        password,
    })
}

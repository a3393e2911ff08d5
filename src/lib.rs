//! ljdump - incremental journal archiver
//!
//! Mirrors a LiveJournal-compatible account into a local directory: one
//! XML document per entry, one XML file of comments per entry, and the
//! account's userpics. Progress lives in small line-oriented state files
//! so every run only fetches what changed.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Config file, flags and password sources
//! - [`remote`] - Flat protocol and comment export client
//! - [`state`] - Persistent per-journal and per-account progress
//! - [`store`] - Line-oriented key/value encoding used by the state files
//! - [`sync`] - Entry, comment and userpic synchronization
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;

pub use error::{Error, Result};

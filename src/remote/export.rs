//! Parsing of `export_comments.bml` responses.
//!
//! Metadata:
//!
//! ```xml
//! <livejournal>
//!   <maxid>105</maxid>
//!   <comments><comment id="81" posterid="17" state="S"/></comments>
//!   <usermaps><usermap id="17" user="alice"/></usermaps>
//! </livejournal>
//! ```
//!
//! Bodies carry `jitemid` and `parentid` attributes plus `subject`, `body`
//! and `date` children.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::remote::{CommentBody, CommentMetaChunk, CommentMetaEntry, CommentUser};
use crate::state::journal::{CommentId, UserId};

#[derive(Debug, Deserialize)]
struct MetaDocument {
    maxid: CommentId,
    #[serde(default)]
    comments: MetaComments,
    #[serde(default)]
    usermaps: UserMaps,
}

#[derive(Debug, Default, Deserialize)]
struct MetaComments {
    #[serde(default)]
    comment: Vec<MetaComment>,
}

#[derive(Debug, Deserialize)]
struct MetaComment {
    #[serde(rename = "@id")]
    id: CommentId,
    #[serde(rename = "@posterid", default)]
    poster_id: UserId,
    #[serde(rename = "@state", default)]
    state: String,
}

#[derive(Debug, Default, Deserialize)]
struct UserMaps {
    #[serde(default)]
    usermap: Vec<UserMap>,
}

#[derive(Debug, Deserialize)]
struct UserMap {
    #[serde(rename = "@id")]
    id: UserId,
    #[serde(rename = "@user")]
    user: String,
}

#[derive(Debug, Deserialize)]
struct BodyDocument {
    #[serde(default)]
    comments: BodyComments,
}

#[derive(Debug, Default, Deserialize)]
struct BodyComments {
    #[serde(default)]
    comment: Vec<BodyComment>,
}

#[derive(Debug, Deserialize)]
struct BodyComment {
    #[serde(rename = "@id")]
    id: CommentId,
    #[serde(rename = "@jitemid")]
    jitemid: i64,
    #[serde(rename = "@posterid", default)]
    poster_id: UserId,
    #[serde(rename = "@state", default)]
    state: String,
    // Present but empty for top-level comments.
    #[serde(rename = "@parentid", default)]
    parent_id: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    date: String,
}

fn export_error(kind: &str, e: &impl std::fmt::Display) -> Error {
    Error::Protocol(format!(
        "failed to process comment_{kind} response, possibly not a community maintainer? {e}"
    ))
}

pub(crate) fn parse_comment_meta(xml: &str) -> Result<CommentMetaChunk> {
    let doc: MetaDocument = quick_xml::de::from_str(xml).map_err(|e| export_error("meta", &e))?;
    Ok(CommentMetaChunk {
        max_id: doc.maxid,
        comments: doc
            .comments
            .comment
            .into_iter()
            .map(|c| CommentMetaEntry {
                id: c.id,
                poster_id: c.poster_id,
                state: c.state,
            })
            .collect(),
        users: doc
            .usermaps
            .usermap
            .into_iter()
            .map(|u| CommentUser {
                id: u.id,
                name: u.user,
            })
            .collect(),
    })
}

pub(crate) fn parse_comment_bodies(xml: &str) -> Result<Vec<CommentBody>> {
    let doc: BodyDocument = quick_xml::de::from_str(xml).map_err(|e| export_error("body", &e))?;
    doc.comments
        .comment
        .into_iter()
        .map(|c| -> Result<CommentBody> {
            let parent_id = match c.parent_id.trim() {
                "" => None,
                text => Some(text.parse::<CommentId>().map_err(|e| {
                    export_error("body", &format!("bad parentid '{text}': {e}"))
                })?),
            };
            Ok(CommentBody {
                id: c.id,
                post_id: c.jitemid,
                poster_id: c.poster_id,
                state: c.state,
                parent_id,
                date: c.date,
                subject: c.subject,
                body: c.body,
            })
        })
        .collect()
}

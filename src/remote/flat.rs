//! HTTP client for the journal service's flat protocol.
//!
//! Requests are form posts to `<server>/interface/flat`; responses are
//! alternating name and value lines. Comments come from the separate
//! `export_comments.bml` XML endpoint.

use std::collections::HashMap;

use md5::{Digest, Md5};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::error::{Error, Result};
use crate::remote::export::{parse_comment_bodies, parse_comment_meta};
use crate::remote::throttle::Throttle;
use crate::remote::{
    ChangeItem, CommentBody, CommentMetaChunk, JournalService, KeywordPicture, PictureDownload,
    ProfilePictures,
};
use crate::state::journal::CommentId;
use crate::sync::event::{EventMap, EventValue};

pub const USER_AGENT: &str = concat!(
    "ljdump/",
    env!("CARGO_PKG_VERSION"),
    " (journal archiver)"
);

type FlatResponse = HashMap<String, String>;

/// Flat-protocol client holding the login session.
pub struct FlatClient {
    http: reqwest::Client,
    server: String,
    username: String,
    session: Option<String>,
    throttle: Throttle,
}

impl FlatClient {
    /// Create an unauthenticated client for `server` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server: impl Into<String>, username: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            server: server.into(),
            username: username.into(),
            session: None,
            throttle: Throttle::default(),
        })
    }

    /// Log in with the challenge-response handshake and keep the session
    /// cookie for later requests.
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` when the server rejects the credentials.
    pub async fn authenticate(&mut self, password: &str) -> Result<()> {
        let response = self.call_flat(&[("mode", "getchallenge".into())]).await?;
        let challenge = response
            .get("challenge")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Protocol("no challenge in getchallenge response".into()))?;

        info!("Logging in to {}", self.server);
        let params = [
            ("mode", "sessiongenerate".to_string()),
            ("user", self.username.clone()),
            ("auth_method", "challenge".into()),
            ("auth_challenge", challenge.clone()),
            ("auth_response", challenge_response(challenge, password)),
            ("ipfixed", "1".into()),
        ];
        let response = self.call_flat(&params).await.map_err(|e| match e {
            Error::Protocol(message) => Error::Auth {
                server: self.server.clone(),
                message,
            },
            other => other,
        })?;

        match response.get("ljsession").filter(|s| !s.is_empty()) {
            Some(session) => {
                self.session = Some(session.clone());
                Ok(())
            }
            None => Err(Error::Auth {
                server: self.server.clone(),
                message: "no session returned, perhaps the password is invalid".into(),
            }),
        }
    }

    fn with_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session {
            Some(session) => request
                .header(COOKIE, format!("ljsession={session}"))
                .header("X-LJ-Auth", "cookie"),
            None => request,
        }
    }

    async fn send(&mut self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        self.throttle.wait().await;
        Ok(request.send().await?.error_for_status()?)
    }

    async fn call_flat(&mut self, params: &[(&str, String)]) -> Result<FlatResponse> {
        let mode = params
            .iter()
            .find(|(name, _)| *name == "mode")
            .map_or("", |(_, value)| value.as_str())
            .to_string();
        debug!(mode = %mode, "flat request");

        let url = format!("{}/interface/flat", self.server);
        let request = self.with_session(self.http.post(url).form(params));
        let text = self.send(request).await?.text().await?;
        parse_flat_response(&mode, &text)
    }

    /// Call an authenticated flat method with extra parameters.
    async fn call_method(
        &mut self,
        mode: &str,
        extra: Vec<(&str, String)>,
    ) -> Result<FlatResponse> {
        let mut params = vec![
            ("mode", mode.to_string()),
            ("ver", "1".to_string()),
            ("user", self.username.clone()),
            ("auth_method", "cookie".to_string()),
        ];
        params.extend(extra);
        self.call_flat(&params).await
    }

    async fn fetch_export(
        &mut self,
        journal: &str,
        kind: &str,
        start_id: CommentId,
    ) -> Result<String> {
        let url = format!("{}/export_comments.bml", self.server);
        let mut query = vec![
            ("get", format!("comment_{kind}")),
            ("startid", start_id.to_string()),
        ];
        if journal != self.username {
            query.push(("authas", journal.to_string()));
        }
        debug!(kind, start_id, "comment export request");
        let request = self.with_session(self.http.get(url).query(&query));
        let response = self.send(request).await.map_err(|e| {
            Error::Protocol(format!("failed to read comment_{kind} response: {e}"))
        })?;
        Ok(response.text().await?)
    }
}

impl JournalService for FlatClient {
    async fn list_changes(&mut self, journal: &str, cursor: &str) -> Result<Vec<ChangeItem>> {
        let response = self
            .call_method(
                "syncitems",
                vec![
                    ("lastsync", cursor.to_string()),
                    ("usejournal", journal.to_string()),
                ],
            )
            .await?;

        let count = flat_count(&response, "sync")?;
        (1..=count)
            .map(|i| -> Result<ChangeItem> {
                Ok(ChangeItem {
                    item_id: flat_field(&response, &format!("sync_{i}_item"))?.to_string(),
                    action: flat_field(&response, &format!("sync_{i}_action"))?.to_string(),
                    time: flat_field(&response, &format!("sync_{i}_time"))?.to_string(),
                })
            })
            .collect()
    }

    async fn fetch_entry(&mut self, journal: &str, item_id: i64) -> Result<Vec<EventMap>> {
        let response = self
            .call_method(
                "getevents",
                vec![
                    ("selecttype", "one".to_string()),
                    ("itemid", item_id.to_string()),
                    ("usejournal", journal.to_string()),
                    ("lineendings", "unix".to_string()),
                ],
            )
            .await?;
        events_from_flat(&response)
    }

    async fn fetch_comment_meta(
        &mut self,
        journal: &str,
        start_id: CommentId,
    ) -> Result<CommentMetaChunk> {
        let xml = self.fetch_export(journal, "meta", start_id).await?;
        parse_comment_meta(&xml)
    }

    async fn fetch_comment_bodies(
        &mut self,
        journal: &str,
        start_id: CommentId,
    ) -> Result<Vec<CommentBody>> {
        let xml = self.fetch_export(journal, "body", start_id).await?;
        parse_comment_bodies(&xml)
    }

    async fn fetch_profile_pictures(&mut self) -> Result<ProfilePictures> {
        let response = self
            .call_method(
                "login",
                vec![
                    ("getpickws", "1".to_string()),
                    ("getpickwurls", "1".to_string()),
                ],
            )
            .await?;
        pictures_from_flat(&response)
    }

    async fn download_picture(&mut self, url: &str) -> Result<PictureDownload> {
        // No session headers: picture hosts are third parties.
        let response = self.send(self.http.get(url)).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(PictureDownload {
            content_type,
            bytes,
        })
    }
}

fn challenge_response(challenge: &str, password: &str) -> String {
    let password_hash = format!("{:x}", Md5::digest(password.as_bytes()));
    format!("{:x}", Md5::digest(format!("{challenge}{password_hash}").as_bytes()))
}

/// Parse a flat response and check its `success` field.
///
/// Parsing stops at the first empty name line.
fn parse_flat_response(mode: &str, text: &str) -> Result<FlatResponse> {
    let mut map = FlatResponse::new();
    let mut lines = text.lines();
    let first_line = text.lines().next().unwrap_or_default().to_string();
    while let Some(name) = lines.next() {
        if name.is_empty() {
            break;
        }
        let value = lines.next().unwrap_or_default();
        map.insert(name.to_string(), value.to_string());
    }

    let status = map.get("success").map_or("", String::as_str);
    if status == "OK" {
        return Ok(map);
    }
    Err(Error::Protocol(match map.get("errmsg").filter(|m| !m.is_empty()) {
        Some(errmsg) => format!("server reported error for mode={mode} status={status}: {errmsg}"),
        None => format!(
            "server error for mode={mode} status={status}, try again later: {first_line}"
        ),
    }))
}

fn flat_field<'a>(map: &'a FlatResponse, key: &str) -> Result<&'a str> {
    map.get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::Protocol(format!("no {key} key in flat response")))
}

fn flat_count(map: &FlatResponse, name: &str) -> Result<usize> {
    let key = format!("{name}_count");
    let text = flat_field(map, &key)?;
    text.parse().map_err(|_| {
        Error::Protocol(format!(
            "value '{text}' for {key} in flat response is not a non-negative integer"
        ))
    })
}

/// Read `<name>_count` and `<name>_1 .. <name>_N`.
fn flat_array(map: &FlatResponse, name: &str) -> Result<Vec<String>> {
    let count = flat_count(map, name)?;
    (1..=count)
        .map(|i| flat_field(map, &format!("{name}_{i}")).map(str::to_string))
        .collect()
}

fn pictures_from_flat(map: &FlatResponse) -> Result<ProfilePictures> {
    let keywords = flat_array(map, "pickw")?;
    let urls = flat_array(map, "pickwurl")?;
    if keywords.len() != urls.len() {
        return Err(Error::Protocol(format!(
            "pickw and pickwurl arrays in flat response have different lengths, {} != {}",
            keywords.len(),
            urls.len()
        )));
    }
    Ok(ProfilePictures {
        default_url: map.get("defaultpicurl").cloned().unwrap_or_default(),
        keyword_pictures: keywords
            .into_iter()
            .zip(urls)
            .map(|(keyword, url)| KeywordPicture { keyword, url })
            .collect(),
    })
}

/// The service form-encodes entry text. Stray `&` and `=` are kept literal.
fn url_decode(raw: &str) -> String {
    let raw = raw.replace('&', "%26").replace('=', "%3D");
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(text, _)| text.into_owned())
        .unwrap_or_default()
}

fn event_value(field: &str, raw: &str) -> EventValue {
    match field {
        "event" => EventValue::Str(url_decode(raw)),
        "itemid" | "anum" | "allowmask" => raw
            .parse::<i64>()
            .map_or_else(|_| EventValue::from(raw), EventValue::Int),
        _ => EventValue::from(raw),
    }
}

/// Build entry payloads from `events_N_*` and `prop_N_*` keys.
fn events_from_flat(map: &FlatResponse) -> Result<Vec<EventMap>> {
    let count = flat_count(map, "events")?;
    let mut events = Vec::with_capacity(count);
    for i in 1..=count {
        let prefix = format!("events_{i}_");
        let mut event: EventMap = map
            .iter()
            .filter_map(|(key, raw)| {
                key.strip_prefix(&prefix)
                    .map(|field| (field.to_string(), event_value(field, raw)))
            })
            .collect();

        let item_id = flat_field(map, &format!("events_{i}_itemid"))?;
        let mut props = EventMap::new();
        let prop_count = map
            .get("prop_count")
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        for p in 1..=prop_count {
            if map.get(&format!("prop_{p}_itemid")).map(String::as_str) != Some(item_id) {
                continue;
            }
            let name = flat_field(map, &format!("prop_{p}_name"))?;
            let value = flat_field(map, &format!("prop_{p}_value"))?;
            props.insert(name.to_string(), EventValue::from(value));
        }
        if !props.is_empty() {
            event.insert("props".to_string(), EventValue::Map(props));
        }
        events.push(event);
    }
    Ok(events)
}

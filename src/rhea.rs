//! Rhea lookup client: search query → candidate reactions.
//!
//! The legacy cmlreact endpoint answers a search with an XML document whose
//! text content is a record stream: four lines per reaction, where line 0
//! carries the reaction id and line 2 a per-reaction detail URI. The detail
//! document supplies the human-readable name. A body without the service
//! marker is a well-formed "no results" answer, not an error; transport and
//! XML failures on the search fetch are errors and never trigger another
//! attempt.

use crate::cancel::CancelToken;
use crate::datasource::{RHEA_CODE, Xref};
use crate::error::{ErrorCode, SearchError, search_err};
use itertools::Itertools;
use lazy_static::lazy_static;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const RHEA_BASE_URL_ENV: &str = "IFIND_RHEA_BASE_URL";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "IFIND_HTTP_TIMEOUT_SECS";
const DEFAULT_RHEA_BASE_URL: &str = "http://www.rhea-db.org/rest/1.0/ws/reaction/cmlreact?q=";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Substring expected somewhere in a non-empty result stream (the detail
/// URIs carry it). Its absence means "no matches", not a protocol error.
pub const SERVICE_MARKER: &str = "rhea";

lazy_static! {
    static ref WS_RUNS: Regex =
        Regex::new(r"^\s+|\s+$|\s*(\n)\s*|(\s)\s*").expect("Invalid whitespace pattern");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RheaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RheaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RHEA_BASE_URL.to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl RheaConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(RHEA_BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var(HTTP_TIMEOUT_SECS_ENV) {
            if let Ok(secs) = raw.trim().parse::<u64>() {
                config.timeout_secs = secs;
            }
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionCandidate {
    pub xref: Xref,
    /// Empty when the per-reaction detail fetch failed; the candidate is
    /// still worth showing.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRecord {
    pub id: String,
    pub detail_uri: String,
}

#[derive(Clone)]
pub struct RheaClient {
    config: RheaConfig,
    client: reqwest::blocking::Client,
}

impl RheaClient {
    pub fn new(config: RheaConfig) -> Result<Self, SearchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("interaction-finder/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                search_err(
                    ErrorCode::Internal,
                    format!("Could not build HTTP client: {e}"),
                )
            })?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, SearchError> {
        Self::new(RheaConfig::from_env())
    }

    /// The query is appended verbatim; `+` is the service's AND separator
    /// and must not be percent-encoded.
    pub fn search_url(&self, query: &str) -> String {
        format!("{}{}", self.config.base_url, query)
    }

    /// One search attempt. An empty list means the service had no usable
    /// records; errors are terminal for the session.
    pub fn search(
        &self,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<ReactionCandidate>, SearchError> {
        if cancel.is_cancelled() {
            debug!("search cancelled before fetch");
            return Ok(vec![]);
        }
        let url = self.search_url(query);
        debug!(%url, "reaction search");
        let body = self.fetch_text(&url)?;
        let text = collect_text_content(&body)?;
        let normalized = normalize_response_text(&text);
        let records = parse_search_records(&normalized);
        if records.is_empty() {
            debug!(query, "no usable records in response");
            return Ok(vec![]);
        }
        let mut candidates = Vec::with_capacity(records.len());
        for record in records {
            if cancel.is_cancelled() {
                debug!("search cancelled mid-batch");
                break;
            }
            let name = self.reaction_name(&record.detail_uri);
            candidates.push(ReactionCandidate {
                xref: Xref::new(record.id, RHEA_CODE),
                name,
            });
        }
        Ok(candidates)
    }

    /// Label lookup for one candidate. Failures are absorbed into an empty
    /// name so one broken detail document cannot sink the batch.
    fn reaction_name(&self, detail_uri: &str) -> String {
        match self.fetch_text(detail_uri) {
            Ok(xml) => match extract_first_name(&xml) {
                Some(name) => name,
                None => {
                    warn!(uri = detail_uri, "no name element in detail document");
                    String::new()
                }
            },
            Err(err) => {
                warn!(%err, uri = detail_uri, "detail fetch failed");
                String::new()
            }
        }
    }

    fn fetch_text(&self, url: &str) -> Result<String, SearchError> {
        let response = self.client.get(url).send().map_err(|e| {
            search_err(
                ErrorCode::Transport,
                format!("Could not fetch URL '{url}': {e}"),
            )
        })?;
        if !response.status().is_success() {
            return Err(search_err(
                ErrorCode::Transport,
                format!("Could not fetch URL '{url}': HTTP {}", response.status()),
            ));
        }
        response.text().map_err(|e| {
            search_err(
                ErrorCode::Transport,
                format!("Could not read URL response '{url}': {e}"),
            )
        })
    }
}

/// Lookup seam the search session talks to. The HTTP client is the one
/// production implementation; tests script this instead.
pub trait ReactionLookup: Send + Sync {
    fn search(
        &self,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<ReactionCandidate>, SearchError>;
}

impl ReactionLookup for RheaClient {
    fn search(
        &self,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<ReactionCandidate>, SearchError> {
        RheaClient::search(self, query, cancel)
    }
}

/// Concatenated text of every text node, the way a DOM `getTextContent`
/// reads a document root.
pub fn collect_text_content(xml: &str) -> Result<String, SearchError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let piece = e.unescape().map_err(|e| {
                    search_err(ErrorCode::Parse, format!("Malformed response XML: {e}"))
                })?;
                text.push_str(&piece);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(search_err(
                    ErrorCode::Parse,
                    format!("Malformed response XML: {e}"),
                ));
            }
        }
    }
    Ok(text)
}

/// Strips the ends, collapses whitespace runs around newlines to a single
/// newline and other runs to their first character, then tabs to spaces.
/// Leaves one record field per line.
pub fn normalize_response_text(raw: &str) -> String {
    WS_RUNS.replace_all(raw, "$1$2").replace('\t', " ")
}

/// Walks normalized text as 4-line records (id, unused, detail URI,
/// unused). A trailing partial record is dropped; a body without the
/// service marker yields no records at all.
pub fn parse_search_records(normalized: &str) -> Vec<SearchRecord> {
    if !normalized.contains(SERVICE_MARKER) {
        return vec![];
    }
    normalized
        .lines()
        .tuples::<(_, _, _, _)>()
        .map(|(id, _status, detail_uri, _extra)| SearchRecord {
            id: id.trim().to_string(),
            detail_uri: detail_uri.trim().to_string(),
        })
        .collect()
}

/// Text of the first `name` element, `Some("")` for an empty element, or
/// `None` when the document has no name at all.
pub fn extract_first_name(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut in_name = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"name" => in_name = true,
            Ok(Event::Text(e)) if in_name => {
                return e.unescape().ok().map(|text| text.to_string());
            }
            Ok(Event::End(e)) if in_name && e.local_name().as_ref() == b"name" => {
                return Some(String::new());
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

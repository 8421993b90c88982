//! Identifier mapping across datasource namespaces.
//!
//! The resolver asks one question: "which ids does this cross-reference have
//! in namespace X?". [`IdMapper`] abstracts over where the answer comes from
//! (bundled table, remote mapping service, or an ordered stack of both) so
//! the resolution pipeline never depends on a particular backend.

use crate::DATA_SOURCES;
use crate::datasource::Xref;
use crate::error::{ErrorCode, SearchError, search_err};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

pub trait IdMapper {
    /// Maps a cross-reference into the target namespace. An empty result
    /// means "no mapping known", not an error.
    fn map_xref(&self, xref: &Xref, target_code: &str) -> Result<Vec<Xref>, SearchError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRow {
    pub id: String,
    pub system_code: String,
    pub targets: Vec<Xref>,
}

/// In-memory mapping table, the offline backend. Loaded from a JSON array of
/// [`MappingRow`] or filled programmatically.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rows: HashMap<(String, String), Vec<Xref>>,
}

impl MappingTable {
    pub fn from_json_text(json_text: &str) -> Result<Self, SearchError> {
        let rows: Vec<MappingRow> = serde_json::from_str(json_text).map_err(|e| {
            search_err(
                ErrorCode::InvalidInput,
                format!("Could not parse mapping table JSON: {e}"),
            )
        })?;
        let mut table = Self::default();
        for row in rows {
            table.insert(Xref::new(row.id, row.system_code), row.targets);
        }
        Ok(table)
    }

    pub fn from_file(path: &str) -> Result<Self, SearchError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            search_err(
                ErrorCode::InvalidInput,
                format!("Could not read mapping table '{path}': {e}"),
            )
        })?;
        Self::from_json_text(&text)
    }

    pub fn insert(&mut self, source: Xref, targets: Vec<Xref>) {
        self.rows
            .entry((source.id, source.system_code))
            .or_default()
            .extend(targets);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IdMapper for MappingTable {
    fn map_xref(&self, xref: &Xref, target_code: &str) -> Result<Vec<Xref>, SearchError> {
        let Some(targets) = self
            .rows
            .get(&(xref.id.clone(), xref.system_code.clone()))
        else {
            return Ok(vec![]);
        };
        Ok(targets
            .iter()
            .filter(|target| target.system_code == target_code)
            .cloned()
            .collect())
    }
}

pub const BRIDGE_BASE_URL_ENV: &str = "IFIND_BRIDGE_BASE_URL";
const DEFAULT_BRIDGE_BASE_URL: &str = "https://webservice.bridgedb.org";
const DEFAULT_BRIDGE_ORGANISM: &str = "Human";
const DEFAULT_BRIDGE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRestConfig {
    pub base_url: String,
    pub organism: String,
    pub timeout_secs: u64,
}

impl Default for BridgeRestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BRIDGE_BASE_URL.to_string(),
            organism: DEFAULT_BRIDGE_ORGANISM.to_string(),
            timeout_secs: DEFAULT_BRIDGE_TIMEOUT_SECS,
        }
    }
}

impl BridgeRestConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(BRIDGE_BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().trim_end_matches('/').to_string();
            }
        }
        config
    }
}

/// Client for a BridgeDb-style REST mapping service. One `xrefs` call per
/// lookup; the service answers with `mapped-id <TAB> datasource-name` lines
/// across all namespaces, filtered here to the requested one.
pub struct BridgeRestMapper {
    config: BridgeRestConfig,
    client: reqwest::blocking::Client,
}

impl BridgeRestMapper {
    pub fn new(config: BridgeRestConfig) -> Result<Self, SearchError> {
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

    pub fn request_url(&self, xref: &Xref) -> String {
        format!(
            "{}/{}/xrefs/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.organism,
            xref.system_code,
            xref.id
        )
    }
}

impl IdMapper for BridgeRestMapper {
    fn map_xref(&self, xref: &Xref, target_code: &str) -> Result<Vec<Xref>, SearchError> {
        let url = self.request_url(xref);
        debug!(%url, "mapping lookup");
        let response = self.client.get(&url).send().map_err(|e| {
            search_err(
                ErrorCode::Transport,
                format!("Could not reach mapping service '{url}': {e}"),
            )
        })?;
        if !response.status().is_success() {
            return Err(search_err(
                ErrorCode::Transport,
                format!("Mapping service '{url}' answered HTTP {}", response.status()),
            ));
        }
        let body = response.text().map_err(|e| {
            search_err(
                ErrorCode::Transport,
                format!("Could not read mapping response '{url}': {e}"),
            )
        })?;
        Ok(parse_xref_lines(&body, target_code))
    }
}

/// Parses `mapped-id <TAB> datasource-name` lines, keeping entries whose
/// datasource resolves to the target system code. Unknown datasource names
/// and malformed lines are skipped.
pub fn parse_xref_lines(body: &str, target_code: &str) -> Vec<Xref> {
    let mut mapped = vec![];
    for line in body.lines() {
        let Some((id, name)) = line.split_once('\t') else {
            continue;
        };
        let id = id.trim();
        let name = name.trim();
        if id.is_empty() || name.is_empty() {
            continue;
        }
        match DATA_SOURCES.code_for_name(name) {
            Some(code) if code == target_code => mapped.push(Xref::new(id, code)),
            Some(_) => {}
            None => debug!(name, "unknown datasource name in mapping response"),
        }
    }
    mapped
}

/// Ordered list of mappers queried in sequence. Results are the union in
/// stack order with duplicates removed; a failing member is logged and
/// skipped so one offline backend cannot take the whole chain down.
#[derive(Default)]
pub struct MapperStack {
    mappers: Vec<Box<dyn IdMapper>>,
}

impl MapperStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mapper: Box<dyn IdMapper>) {
        self.mappers.push(mapper);
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl IdMapper for MapperStack {
    fn map_xref(&self, xref: &Xref, target_code: &str) -> Result<Vec<Xref>, SearchError> {
        let mut seen = HashSet::new();
        let mut union = vec![];
        for (idx, mapper) in self.mappers.iter().enumerate() {
            match mapper.map_xref(xref, target_code) {
                Ok(targets) => {
                    for target in targets {
                        if seen.insert((target.id.clone(), target.system_code.clone())) {
                            union.push(target);
                        }
                    }
                }
                Err(err) => {
                    warn!(member = idx, %err, "mapper failed, skipping");
                }
            }
        }
        Ok(union)
    }
}

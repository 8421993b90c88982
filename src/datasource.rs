//! Identifier namespaces and cross-references.
//!
//! Every external identifier this tool touches is an [`Xref`]: a local id plus
//! the system code of the datasource it belongs to. The bundled registry maps
//! system codes to full datasource names (as they appear in pathway documents
//! and mapping-service responses) and to URI patterns for linking out.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const CHEBI_CODE: &str = "Ce";
pub const UNIPROT_CODE: &str = "S";
pub const RHEA_CODE: &str = "Rh";

const BUILTIN_DATASOURCES_JSON: &str = include_str!("../assets/datasources.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Metabolite,
    Protein,
    Reaction,
    Gene,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub system_code: String,
    pub name: String,
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub uri_pattern: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DataSources {
    by_code: HashMap<String, DataSource>,
    code_by_name: HashMap<String, String>,
}

impl DataSources {
    fn new(json_text: &str) -> Result<Self> {
        let sources: Vec<DataSource> = serde_json::from_str(json_text)?;
        let mut by_code = HashMap::new();
        let mut code_by_name = HashMap::new();
        for source in sources {
            if source.system_code.is_empty() {
                return Err(anyhow!("Datasource '{}' has no system code", source.name));
            }
            code_by_name.insert(source.name.to_lowercase(), source.system_code.clone());
            for alias in &source.aliases {
                code_by_name.insert(alias.to_lowercase(), source.system_code.clone());
            }
            by_code.insert(source.system_code.clone(), source);
        }
        Ok(Self {
            by_code,
            code_by_name,
        })
    }

    pub fn by_system_code(&self, code: &str) -> Option<&DataSource> {
        self.by_code.get(code)
    }

    /// Resolves a full datasource name (or alias) as found in pathway
    /// documents and mapping-service responses, case-insensitively.
    pub fn code_for_name(&self, name: &str) -> Option<&str> {
        self.code_by_name
            .get(&name.to_lowercase())
            .map(|code| code.as_str())
    }

    pub fn codes_sorted(&self) -> Vec<String> {
        let mut codes = self.by_code.keys().cloned().collect::<Vec<_>>();
        codes.sort_unstable();
        codes
    }
}

impl Default for DataSources {
    fn default() -> Self {
        Self::new(BUILTIN_DATASOURCES_JSON).expect("Invalid datasources.json")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Xref {
    pub id: String,
    pub system_code: String,
}

impl Xref {
    pub fn new(id: impl Into<String>, system_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system_code: system_code.into(),
        }
    }

    pub fn url(&self, sources: &DataSources) -> Option<String> {
        let pattern = sources
            .by_system_code(&self.system_code)?
            .uri_pattern
            .as_ref()?;
        Some(pattern.replace("$id", &self.id))
    }
}

impl fmt::Display for Xref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system_code, self.id)
    }
}

//! Endpoint resolution: graph reference → search identifier.
//!
//! A reference names either a data node or an anchor on an edge. Anchors are
//! followed one level: the edge terminating on the anchor contributes its
//! opposite endpoint's node. The resolved node is then turned into a query
//! token through the mapping fallback chain (compound namespace, protein
//! namespace, display label).

use crate::DATA_SOURCES;
use crate::datasource::{CHEBI_CODE, UNIPROT_CODE, Xref};
use crate::id_mapper::IdMapper;
use crate::pathway::{DataNode, PathwayDoc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

lazy_static! {
    static ref NUMERIC_ID: Regex = Regex::new(r"^\d+$").expect("Invalid numeric-id pattern");
}

/// A single query token: never empty, never contains whitespace. Internal
/// runs are replaced with the `+` separator the search endpoint treats as
/// AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIdentifier(String);

impl SearchIdentifier {
    pub fn new(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("+")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference lookup tables, built once per resolution session. References
/// are matched case-insensitively; when several elements share one
/// reference, the last element in document order wins.
pub struct ReferenceIndex<'a> {
    nodes: HashMap<String, &'a DataNode>,
    anchor_ids: HashSet<String>,
    edge_opposite: HashMap<String, Option<String>>,
}

impl<'a> ReferenceIndex<'a> {
    pub fn build(doc: &'a PathwayDoc) -> Self {
        let mut nodes = HashMap::new();
        for node in &doc.data_nodes {
            if let Some(id) = &node.graph_id {
                nodes.insert(id.to_lowercase(), node);
            }
        }
        let mut anchor_ids = HashSet::new();
        let mut edge_opposite: HashMap<String, Option<String>> = HashMap::new();
        for interaction in &doc.interactions {
            for anchor in &interaction.anchors {
                if let Some(id) = &anchor.graph_id {
                    anchor_ids.insert(id.to_lowercase());
                }
            }
            // Within one edge the end-terminus entry is inserted second so
            // it wins for degenerate start == end loops.
            let start = interaction.start_ref().map(str::to_string);
            let end = interaction.end_ref().map(str::to_string);
            if let Some(start_ref) = &start {
                edge_opposite.insert(start_ref.to_lowercase(), end.clone());
            }
            if let Some(end_ref) = &end {
                edge_opposite.insert(end_ref.to_lowercase(), start.clone());
            }
        }
        Self {
            nodes,
            anchor_ids,
            edge_opposite,
        }
    }

    /// The data node a reference stands for: a direct match, or one level of
    /// anchor indirection (the node at the opposite end of the edge that
    /// terminates on the anchor).
    pub fn resolve_entity(&self, graph_ref: &str) -> Option<&'a DataNode> {
        let key = graph_ref.to_lowercase();
        if let Some(node) = self.nodes.get(&key) {
            return Some(*node);
        }
        if !self.anchor_ids.contains(&key) {
            return None;
        }
        let opposite = self.edge_opposite.get(&key)?.as_ref()?;
        self.nodes.get(&opposite.to_lowercase()).copied()
    }
}

/// Prefixes purely numeric compound ids as `CHEBI:<digits>`; already
/// prefixed or non-numeric ids pass through unchanged, so reapplication is a
/// no-op.
pub fn normalize_chebi_id(id: &str) -> String {
    if NUMERIC_ID.is_match(id) {
        format!("CHEBI:{id}")
    } else {
        id.to_string()
    }
}

pub fn resolve_search_identifier(
    index: &ReferenceIndex,
    mapper: &dyn IdMapper,
    graph_ref: &str,
) -> Option<SearchIdentifier> {
    let node = index.resolve_entity(graph_ref)?;
    node_search_identifier(node, mapper)
}

/// The fallback chain: compound mapping, then protein mapping, then the
/// node's own display label. Mapping failures are logged and treated as
/// empty results.
pub fn node_search_identifier(
    node: &DataNode,
    mapper: &dyn IdMapper,
) -> Option<SearchIdentifier> {
    if let Some(source) = node_source_xref(node) {
        let compound_ids = mapped_ids(mapper, &source, CHEBI_CODE);
        if !compound_ids.is_empty() {
            let chosen = compound_ids
                .iter()
                .find(|xref| NUMERIC_ID.is_match(&xref.id))
                .unwrap_or(&compound_ids[0]);
            return SearchIdentifier::new(&normalize_chebi_id(&chosen.id));
        }
        let protein_ids = mapped_ids(mapper, &source, UNIPROT_CODE);
        if !protein_ids.is_empty() {
            let chosen = protein_ids
                .iter()
                .find(|xref| xref.id.starts_with('P') || xref.id.starts_with('Q'))
                .unwrap_or(&protein_ids[0]);
            return SearchIdentifier::new(&chosen.id);
        }
    }
    SearchIdentifier::new(&node.text_label)
}

fn node_source_xref(node: &DataNode) -> Option<Xref> {
    let raw = node.xref.as_ref()?;
    match DATA_SOURCES.code_for_name(&raw.database) {
        Some(code) => Some(Xref::new(raw.id.clone(), code)),
        None => {
            debug!(
                database = raw.database,
                "datasource not in registry, falling back to label"
            );
            None
        }
    }
}

/// One mapping call with the identity rule: a source already in the target
/// namespace counts as its own mapping when the backend answers with nothing
/// else. A failed call is logged and treated as an empty branch, identity
/// included.
fn mapped_ids(mapper: &dyn IdMapper, source: &Xref, target_code: &str) -> Vec<Xref> {
    match mapper.map_xref(source, target_code) {
        Ok(ids) if ids.is_empty() && source.system_code == target_code => vec![source.clone()],
        Ok(ids) => ids,
        Err(err) => {
            warn!(%err, target_code, "identifier mapping failed");
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, SearchError, search_err};
    use crate::id_mapper::MappingTable;
    use crate::pathway::parse_gpml_text;

    const ANCHORED_GPML: &str = r#"<?xml version="1.0"?>
<Pathway xmlns="http://pathvisio.org/GPML/2013a" Name="Anchored">
  <DataNode TextLabel="substrate" GraphId="n0" Type="Metabolite">
    <Xref Database="ChEBI" ID="CHEBI:17632" />
  </DataNode>
  <DataNode TextLabel="product" GraphId="n1" Type="Metabolite">
    <Xref Database="ChEBI" ID="CHEBI:16301" />
  </DataNode>
  <DataNode TextLabel="enzyme" GraphId="n2" Type="Protein">
    <Xref Database="Ensembl" ID="ENSG00000157764" />
  </DataNode>
  <Interaction GraphId="e1">
    <Graphics>
      <Point X="0" Y="0" GraphRef="n0" />
      <Point X="10" Y="0" GraphRef="n1" ArrowHead="mim-conversion" />
      <Anchor Position="0.5" GraphId="a1" />
    </Graphics>
  </Interaction>
  <Interaction GraphId="e2">
    <Graphics>
      <Point X="5" Y="5" GraphRef="n2" />
      <Point X="5" Y="0" GraphRef="a1" ArrowHead="mim-catalysis" />
    </Graphics>
  </Interaction>
</Pathway>
"#;

    #[test]
    fn test_search_identifier_sanitizes_whitespace() {
        assert_eq!(
            SearchIdentifier::new("  glucose 6\tphosphate ").unwrap().as_str(),
            "glucose+6+phosphate"
        );
        assert_eq!(SearchIdentifier::new("P12345").unwrap().as_str(), "P12345");
        assert!(SearchIdentifier::new("   ").is_none());
        assert!(SearchIdentifier::new("").is_none());
    }

    #[test]
    fn test_normalize_chebi_id_is_idempotent() {
        assert_eq!(normalize_chebi_id("17632"), "CHEBI:17632");
        assert_eq!(normalize_chebi_id("CHEBI:17632"), "CHEBI:17632");
        assert_eq!(normalize_chebi_id("P12345"), "P12345");
    }

    #[test]
    fn test_resolve_entity_direct_and_case_insensitive() {
        let doc = parse_gpml_text(ANCHORED_GPML).unwrap();
        let index = ReferenceIndex::build(&doc);
        assert_eq!(index.resolve_entity("N0").unwrap().text_label, "substrate");
        assert!(index.resolve_entity("nothing").is_none());
    }

    #[test]
    fn test_resolve_entity_follows_anchor_to_catalyst() {
        let doc = parse_gpml_text(ANCHORED_GPML).unwrap();
        let index = ReferenceIndex::build(&doc);
        // e2 terminates on a1, so the anchor stands for e2's other endpoint.
        assert_eq!(index.resolve_entity("a1").unwrap().text_label, "enzyme");
    }

    #[test]
    fn test_duplicate_graph_ids_last_wins() {
        let xml = r#"<Pathway xmlns="http://pathvisio.org/GPML/2013a">
  <DataNode TextLabel="first" GraphId="dup" />
  <DataNode TextLabel="second" GraphId="dup" />
</Pathway>"#;
        let doc = parse_gpml_text(xml).unwrap();
        let index = ReferenceIndex::build(&doc);
        assert_eq!(index.resolve_entity("dup").unwrap().text_label, "second");
    }

    #[test]
    fn test_chebi_identity_produces_prefixed_token() {
        let doc = parse_gpml_text(ANCHORED_GPML).unwrap();
        let index = ReferenceIndex::build(&doc);
        let mapper = MappingTable::default();
        let token = resolve_search_identifier(&index, &mapper, "n0").unwrap();
        assert_eq!(token.as_str(), "CHEBI:17632");
    }

    #[test]
    fn test_compound_mapping_prefers_numeric_id() {
        let node = DataNode {
            graph_id: Some("n9".to_string()),
            text_label: "pyruvate".to_string(),
            node_type: Some("Metabolite".to_string()),
            xref: Some(crate::pathway::ElementXref {
                database: "CAS".to_string(),
                id: "127-17-3".to_string(),
            }),
        };
        let mut mapper = MappingTable::default();
        mapper.insert(
            Xref::new("127-17-3", "Ca"),
            vec![Xref::new("CHEBI:15361", "Ce"), Xref::new("15361", "Ce")],
        );
        let token = node_search_identifier(&node, &mapper).unwrap();
        assert_eq!(token.as_str(), "CHEBI:15361");
    }

    #[test]
    fn test_protein_mapping_prefers_first_accession_style_id() {
        let node = DataNode {
            graph_id: Some("n2".to_string()),
            text_label: "enzyme".to_string(),
            node_type: Some("Protein".to_string()),
            xref: Some(crate::pathway::ElementXref {
                database: "Ensembl".to_string(),
                id: "ENSG00000157764".to_string(),
            }),
        };
        let mut mapper = MappingTable::default();
        mapper.insert(
            Xref::new("ENSG00000157764", "En"),
            vec![
                Xref::new("A1B2", "S"),
                Xref::new("P12345", "S"),
                Xref::new("Q99999", "S"),
            ],
        );
        let token = node_search_identifier(&node, &mapper).unwrap();
        assert_eq!(token.as_str(), "P12345");
    }

    #[test]
    fn test_label_fallback_replaces_spaces() {
        let node = DataNode {
            graph_id: Some("n5".to_string()),
            text_label: "glucose 6 phosphate".to_string(),
            node_type: Some("Metabolite".to_string()),
            xref: None,
        };
        let mapper = MappingTable::default();
        let token = node_search_identifier(&node, &mapper).unwrap();
        assert_eq!(token.as_str(), "glucose+6+phosphate");
    }

    #[test]
    fn test_unlabelled_unmapped_node_yields_nothing() {
        let node = DataNode {
            graph_id: Some("n6".to_string()),
            text_label: String::new(),
            node_type: None,
            xref: None,
        };
        let mapper = MappingTable::default();
        assert!(node_search_identifier(&node, &mapper).is_none());
    }

    struct ExplodingMapper;

    impl IdMapper for ExplodingMapper {
        fn map_xref(&self, _xref: &Xref, _target: &str) -> Result<Vec<Xref>, SearchError> {
            Err(search_err(ErrorCode::Transport, "mapping service down"))
        }
    }

    #[test]
    fn test_mapping_failure_falls_through_to_label() {
        let node = DataNode {
            graph_id: Some("n7".to_string()),
            text_label: "lactate".to_string(),
            node_type: Some("Metabolite".to_string()),
            xref: Some(crate::pathway::ElementXref {
                database: "ChEBI".to_string(),
                id: "CHEBI:24996".to_string(),
            }),
        };
        let token = node_search_identifier(&node, &ExplodingMapper).unwrap();
        assert_eq!(token.as_str(), "lactate");
    }
}

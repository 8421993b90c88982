//! Minimal GPML (pathway markup) document model.
//!
//! Supports the 2013a subset this tool needs: data nodes with their
//! cross-references, and interactions with endpoint references and anchors.
//! Other element kinds (labels, shapes, groups, layout attributes) are
//! ignored on load; callers that need the full document keep the source
//! file and treat this model as a read view plus in-memory annotation.

use crate::DATA_SOURCES;
use crate::datasource::Xref;
use anyhow::{Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementXref {
    pub database: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct DataNode {
    pub graph_id: Option<String>,
    pub text_label: String,
    pub node_type: Option<String>,
    pub xref: Option<ElementXref>,
}

#[derive(Debug, Clone)]
pub struct InteractionPoint {
    pub graph_ref: Option<String>,
    pub arrow_head: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Anchor {
    pub graph_id: Option<String>,
    pub position: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Interaction {
    pub graph_id: Option<String>,
    pub points: Vec<InteractionPoint>,
    pub anchors: Vec<Anchor>,
    pub xref: Option<ElementXref>,
}

impl Interaction {
    /// Graph reference of the first endpoint, as drawn.
    pub fn start_ref(&self) -> Option<&str> {
        self.points.first()?.graph_ref.as_deref()
    }

    /// Graph reference of the last endpoint, as drawn.
    pub fn end_ref(&self) -> Option<&str> {
        self.points.last()?.graph_ref.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathwayDoc {
    pub name: Option<String>,
    pub organism: Option<String>,
    pub data_nodes: Vec<DataNode>,
    pub interactions: Vec<Interaction>,
}

impl PathwayDoc {
    /// Case-insensitive lookup of an interaction element. Duplicate graph
    /// ids are not expected; the last match wins, as everywhere else.
    pub fn interaction_by_graph_id(&self, graph_id: &str) -> Option<&Interaction> {
        let mut found = None;
        for interaction in &self.interactions {
            if let Some(id) = &interaction.graph_id {
                if id.eq_ignore_ascii_case(graph_id) {
                    found = Some(interaction);
                }
            }
        }
        found
    }

    /// Sets the chosen cross-reference on an interaction element in memory.
    /// The datasource is written under its full registry name when known,
    /// otherwise under the raw system code. Persistence stays with the
    /// caller.
    pub fn annotate_interaction(&mut self, graph_id: &str, xref: &Xref) -> bool {
        let database = DATA_SOURCES
            .by_system_code(&xref.system_code)
            .map(|source| source.name.clone())
            .unwrap_or_else(|| xref.system_code.clone());
        let mut target = None;
        for interaction in self.interactions.iter_mut() {
            if let Some(id) = &interaction.graph_id {
                if id.eq_ignore_ascii_case(graph_id) {
                    target = Some(interaction);
                }
            }
        }
        match target {
            Some(interaction) => {
                interaction.xref = Some(ElementXref {
                    database,
                    id: xref.id.clone(),
                });
                true
            }
            None => false,
        }
    }
}

pub fn parse_gpml_file(path: &str) -> Result<PathwayDoc> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Could not read pathway file '{path}': {e}"))?;
    parse_gpml_text(&text).map_err(|e| anyhow!("Could not parse pathway file '{path}': {e}"))
}

/// Loads a pathway document from a local path or an `http(s)://` URL.
pub fn read_pathway_input(path_or_url: &str) -> Result<PathwayDoc> {
    if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
        let response = reqwest::blocking::get(path_or_url)
            .map_err(|e| anyhow!("Could not fetch URL '{path_or_url}': {e}"))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Could not fetch URL '{path_or_url}': HTTP {}",
                response.status()
            ));
        }
        let text = response
            .text()
            .map_err(|e| anyhow!("Could not read URL response '{path_or_url}': {e}"))?;
        parse_gpml_text(&text)
    } else {
        parse_gpml_file(path_or_url)
    }
}

pub fn parse_gpml_text(xml: &str) -> Result<PathwayDoc> {
    if !xml.to_ascii_lowercase().contains("<pathway") {
        return Err(anyhow!(
            "Unsupported XML dialect: expected a GPML 'Pathway' root element"
        ));
    }
    let parsed: PathwayXml =
        quick_xml::de::from_str(xml).map_err(|e| anyhow!("Malformed GPML: {e}"))?;
    let doc = PathwayDoc {
        name: nonempty_owned(parsed.name.as_deref()),
        organism: nonempty_owned(parsed.organism.as_deref()),
        data_nodes: parsed.data_nodes.iter().map(data_node_from_xml).collect(),
        interactions: parsed
            .interactions
            .iter()
            .map(interaction_from_xml)
            .collect(),
    };
    if doc.data_nodes.is_empty() && doc.interactions.is_empty() {
        return Err(anyhow!(
            "Malformed GPML: no DataNode or Interaction elements found"
        ));
    }
    Ok(doc)
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Pathway")]
struct PathwayXml {
    #[serde(rename = "@Name")]
    name: Option<String>,
    #[serde(rename = "@Organism")]
    organism: Option<String>,
    #[serde(rename = "DataNode", default)]
    data_nodes: Vec<DataNodeXml>,
    #[serde(rename = "Interaction", default)]
    interactions: Vec<InteractionXml>,
}

#[derive(Debug, Deserialize)]
struct DataNodeXml {
    #[serde(rename = "@GraphId")]
    graph_id: Option<String>,
    #[serde(rename = "@TextLabel")]
    text_label: Option<String>,
    #[serde(rename = "@Type")]
    node_type: Option<String>,
    #[serde(rename = "Xref")]
    xref: Option<XrefXml>,
}

#[derive(Debug, Deserialize)]
struct InteractionXml {
    #[serde(rename = "@GraphId")]
    graph_id: Option<String>,
    #[serde(rename = "Graphics")]
    graphics: Option<GraphicsXml>,
    #[serde(rename = "Xref")]
    xref: Option<XrefXml>,
}

#[derive(Debug, Deserialize)]
struct GraphicsXml {
    #[serde(rename = "Point", default)]
    points: Vec<PointXml>,
    #[serde(rename = "Anchor", default)]
    anchors: Vec<AnchorXml>,
}

#[derive(Debug, Deserialize)]
struct PointXml {
    #[serde(rename = "@GraphRef")]
    graph_ref: Option<String>,
    #[serde(rename = "@ArrowHead")]
    arrow_head: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnchorXml {
    #[serde(rename = "@GraphId")]
    graph_id: Option<String>,
    #[serde(rename = "@Position")]
    position: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct XrefXml {
    #[serde(rename = "@Database")]
    database: Option<String>,
    #[serde(rename = "@ID")]
    id: Option<String>,
}

fn data_node_from_xml(raw: &DataNodeXml) -> DataNode {
    DataNode {
        graph_id: nonempty_owned(raw.graph_id.as_deref()),
        text_label: nonempty_owned(raw.text_label.as_deref()).unwrap_or_default(),
        node_type: nonempty_owned(raw.node_type.as_deref()),
        xref: raw.xref.as_ref().and_then(element_xref_from_xml),
    }
}

fn interaction_from_xml(raw: &InteractionXml) -> Interaction {
    let (points, anchors) = match &raw.graphics {
        Some(graphics) => (
            graphics
                .points
                .iter()
                .map(|point| InteractionPoint {
                    graph_ref: nonempty_owned(point.graph_ref.as_deref()),
                    arrow_head: nonempty_owned(point.arrow_head.as_deref()),
                })
                .collect(),
            graphics
                .anchors
                .iter()
                .map(|anchor| Anchor {
                    graph_id: nonempty_owned(anchor.graph_id.as_deref()),
                    position: anchor.position,
                })
                .collect(),
        ),
        None => (vec![], vec![]),
    };
    Interaction {
        graph_id: nonempty_owned(raw.graph_id.as_deref()),
        points,
        anchors,
        xref: raw.xref.as_ref().and_then(element_xref_from_xml),
    }
}

/// An Xref element counts only when both attributes carry text; unannotated
/// GPML nodes ship `Database="" ID=""` and fall through to label search.
fn element_xref_from_xml(raw: &XrefXml) -> Option<ElementXref> {
    let database = nonempty_owned(raw.database.as_deref())?;
    let id = nonempty_owned(raw.id.as_deref())?;
    Some(ElementXref { database, id })
}

fn nonempty_owned(raw: Option<&str>) -> Option<String> {
    let text = raw.unwrap_or_default().trim();
    (!text.is_empty()).then_some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY_GPML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Pathway xmlns="http://pathvisio.org/GPML/2013a" Name="Toy conversion" Organism="Homo sapiens">
  <DataNode TextLabel="acetaldehyde" GraphId="n1" Type="Metabolite">
    <Xref Database="ChEBI" ID="CHEBI:15343" />
  </DataNode>
  <DataNode TextLabel="ethanol" GraphId="n2" Type="Metabolite">
    <Xref Database="ChEBI" ID="CHEBI:16236" />
  </DataNode>
  <DataNode TextLabel="unannotated" GraphId="n3" Type="Metabolite">
    <Xref Database="" ID="" />
  </DataNode>
  <Interaction GraphId="e1">
    <Graphics>
      <Point X="100.0" Y="50.0" GraphRef="n1" />
      <Point X="200.0" Y="50.0" GraphRef="n2" ArrowHead="mim-conversion" />
      <Anchor Position="0.5" GraphId="a1" />
    </Graphics>
    <Xref Database="" ID="" />
  </Interaction>
</Pathway>
"#;

    #[test]
    fn test_parse_gpml_text_toy_pathway() {
        let doc = parse_gpml_text(TOY_GPML).expect("parse GPML");
        assert_eq!(doc.name.as_deref(), Some("Toy conversion"));
        assert_eq!(doc.data_nodes.len(), 3);
        assert_eq!(doc.interactions.len(), 1);
        let node = &doc.data_nodes[0];
        assert_eq!(node.graph_id.as_deref(), Some("n1"));
        assert_eq!(node.text_label, "acetaldehyde");
        assert_eq!(
            node.xref,
            Some(ElementXref {
                database: "ChEBI".to_string(),
                id: "CHEBI:15343".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_xref_attributes_are_dropped() {
        let doc = parse_gpml_text(TOY_GPML).unwrap();
        assert!(doc.data_nodes[2].xref.is_none());
        assert!(doc.interactions[0].xref.is_none());
    }

    #[test]
    fn test_interaction_endpoints_and_anchor() {
        let doc = parse_gpml_text(TOY_GPML).unwrap();
        let interaction = doc.interaction_by_graph_id("E1").expect("case-insensitive");
        assert_eq!(interaction.start_ref(), Some("n1"));
        assert_eq!(interaction.end_ref(), Some("n2"));
        assert_eq!(interaction.anchors.len(), 1);
        assert_eq!(interaction.anchors[0].graph_id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_rejects_non_gpml_root() {
        let err = parse_gpml_text("<GBSet><GBSeq/></GBSet>").unwrap_err();
        assert!(
            err.to_string().contains("Unsupported XML dialect"),
            "expected dialect error, got: {err}"
        );
    }

    #[test]
    fn test_rejects_pathway_without_elements() {
        let xml = r#"<Pathway xmlns="http://pathvisio.org/GPML/2013a" Name="Empty"></Pathway>"#;
        let err = parse_gpml_text(xml).unwrap_err();
        assert!(err.to_string().contains("no DataNode or Interaction"));
    }

    #[test]
    fn test_parse_gpml_file_fixture() {
        let doc = parse_gpml_file("test_files/glycolysis.gpml").expect("read fixture");
        assert!(doc.interactions.len() >= 2);
        assert!(doc.data_nodes.iter().any(|node| node
            .xref
            .as_ref()
            .is_some_and(|xref| xref.database == "ChEBI")));
    }

    #[test]
    fn test_annotate_interaction_writes_registry_name() {
        let mut doc = parse_gpml_text(TOY_GPML).unwrap();
        let chosen = Xref::new("12345", "Rh");
        assert!(doc.annotate_interaction("e1", &chosen));
        let interaction = doc.interaction_by_graph_id("e1").unwrap();
        assert_eq!(
            interaction.xref,
            Some(ElementXref {
                database: "Rhea".to_string(),
                id: "12345".to_string(),
            })
        );
        assert!(!doc.annotate_interaction("missing", &chosen));
    }
}

//! Name-based rendering of summaries.

use dom::{NodeId, NodeNames};
use mutation_summary::Summary;
use serde::Serialize;
use std::collections::BTreeMap;

/// A summary with every node replaced by its fixture label.
///
/// Lists keep the order the engine reported them in. Lists the query does
/// not cover are `None` and left out of the JSON form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reparented: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reordered: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_changed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_changed: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_data_changed: Option<Vec<String>>,
}

fn labels(nodes: &[NodeId], names: &NodeNames) -> Vec<String> {
    nodes.iter().map(|&node| names.label(node)).collect()
}

impl RenderedSummary {
    pub fn new(summary: &Summary<NodeId>, names: &NodeNames) -> Self {
        let optional = |nodes: Option<&[NodeId]>| nodes.map(|nodes| labels(nodes, names));
        Self {
            added: labels(summary.added(), names),
            removed: labels(summary.removed(), names),
            reparented: optional(summary.reparented()),
            reordered: optional(summary.reordered()),
            value_changed: optional(summary.value_changed()),
            attribute_changed: summary.attribute_changed().map(|by_name| {
                by_name
                    .iter()
                    .map(|(name, nodes)| (name.clone(), labels(nodes, names)))
                    .collect()
            }),
            character_data_changed: optional(summary.character_data_changed()),
        }
    }

    /// One line per non-empty list, prefixed with the summary's position in
    /// its delivery: `0 added: a b`, `1 attributeChanged[class]: div`.
    pub fn lines(&self, index: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut push = |label: &str, nodes: &[String]| {
            if !nodes.is_empty() {
                out.push(format!("{index} {label}: {}", nodes.join(" ")));
            }
        };
        push("added", &self.added);
        push("removed", &self.removed);
        push("reparented", self.reparented.as_deref().unwrap_or_default());
        push("reordered", self.reordered.as_deref().unwrap_or_default());
        push("valueChanged", self.value_changed.as_deref().unwrap_or_default());
        for (name, nodes) in self.attribute_changed.iter().flatten() {
            push(&format!("attributeChanged[{name}]"), nodes);
        }
        push(
            "characterDataChanged",
            self.character_data_changed.as_deref().unwrap_or_default(),
        );
        out
    }
}

/// Lines of a whole delivery, summaries in query order.
pub fn delivery_lines(summaries: &[RenderedSummary]) -> Vec<String> {
    summaries
        .iter()
        .enumerate()
        .flat_map(|(index, summary)| summary.lines(index))
        .collect()
}

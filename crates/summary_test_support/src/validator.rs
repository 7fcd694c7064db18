//! Brute-force oracle for summaries.
//!
//! A [`SnapshotValidator`] copies the whole observed subtree before a batch.
//! After the batch it recomputes, from the two tree states alone, what a
//! summary for its query has to report, and compares. Lists are compared as
//! sets; reorders are checked for consistency rather than minimality.

use crate::diff_lines;
use core_types::TreeView;
use dom::{Document, NodeId, NodeNames, inclusive_descendants};
use mutation_summary::{Query, Summary};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{query} summary disagrees with the tree snapshot:\n{diff}")]
pub struct ValidationMismatch {
    pub query: &'static str,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
    pub diff: String,
}

struct NodeState {
    parent: Option<NodeId>,
    previous_sibling: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    matched: bool,
}

pub struct SnapshotValidator {
    root: NodeId,
    query: Query,
    nodes: HashMap<NodeId, NodeState>,
    old_previous_sibling: bool,
}

impl SnapshotValidator {
    /// Capture everything reachable from `root` as it is now.
    pub fn record(doc: &Document, root: NodeId, query: &Query) -> Self {
        let nodes = inclusive_descendants(doc, root)
            .into_iter()
            .map(|node| {
                let state = NodeState {
                    parent: doc.parent(node),
                    previous_sibling: doc.previous_sibling(node),
                    children: doc.children(node).to_vec(),
                    attributes: doc.attributes(node).to_vec(),
                    text: doc.character_data(node).map(str::to_string),
                    matched: is_selected(doc, node, query),
                };
                (node, state)
            })
            .collect();
        Self {
            root,
            query: query.clone(),
            nodes,
            old_previous_sibling: false,
        }
    }

    /// Require an old previous sibling for every removed and reparented
    /// node, as a summary connected with `old_previous_sibling` must give.
    /// Otherwise only the answers given are checked.
    pub fn with_old_previous_sibling(mut self, required: bool) -> Self {
        self.old_previous_sibling = required;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Check `summary` against the current state of `doc`. `None` stands for
    /// a delivery that reported nothing, so every list must come out empty.
    pub fn validate(
        &self,
        doc: &Document,
        summary: Option<&Summary<NodeId>>,
        names: &NodeNames,
    ) -> Result<(), ValidationMismatch> {
        let mut check = Check {
            doc,
            names,
            summary,
            expected: Vec::new(),
            actual: Vec::new(),
        };

        let current: BTreeSet<NodeId> = inclusive_descendants(doc, self.root)
            .into_iter()
            .filter(|&node| is_selected(doc, node, &self.query))
            .collect();
        let old: BTreeSet<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, state)| state.matched)
            .map(|(&node, _)| node)
            .collect();
        let stayed: Vec<NodeId> = old.intersection(&current).copied().collect();

        let added: Vec<_> = current.difference(&old).copied().collect();
        let removed: Vec<_> = old.difference(&current).copied().collect();
        check.list("added", &added, summary.map(Summary::added));
        check.list("removed", &removed, summary.map(Summary::removed));

        let reparented: Vec<NodeId> = stayed
            .iter()
            .copied()
            .filter(|&node| self.nodes[&node].parent != doc.parent(node))
            .collect();
        if !matches!(self.query, Query::Attribute { .. }) {
            check.list(
                "reparented",
                &reparented,
                summary.and_then(Summary::reparented),
            );
        }

        match &self.query {
            Query::All => {
                self.check_reorders(&mut check, &stayed);
                let attribute_names = self.changed_attribute_names(doc, &stayed);
                self.check_attributes(&mut check, &stayed, &attribute_names);
                self.check_text(&mut check, "characterDataChanged", &stayed, |s| {
                    s.character_data_changed()
                });
            }
            Query::Attribute { name, .. } => {
                let expected = self.attribute_changes(doc, &stayed, name);
                let actual = summary.and_then(Summary::value_changed);
                check.list("valueChanged", &expected, actual);
                self.check_old_attributes(&mut check, name, actual.unwrap_or_default());
            }
            Query::Element {
                attributes: Some(attributes),
                ..
            } => {
                self.check_attributes(&mut check, &stayed, attributes);
            }
            Query::Element { .. } => {}
            Query::CharacterData => {
                self.check_text(&mut check, "valueChanged", &stayed, |s| s.value_changed());
            }
        }

        let mut reported: BTreeSet<NodeId> = BTreeSet::new();
        if let Some(summary) = summary {
            reported.extend(summary.removed());
            reported.extend(summary.reparented().unwrap_or_default());
        }
        for &node in reported.iter().filter(|node| self.nodes.contains_key(node)) {
            let state = &self.nodes[&node];
            check.expected.push(format!(
                "oldParentNode({}): {}",
                names.label(node),
                label_or_none(names, state.parent)
            ));
            let answer = summary.map(|s| s.old_parent_node(doc, node));
            check.actual.push(format!(
                "oldParentNode({}): {}",
                names.label(node),
                describe(names, answer)
            ));
        }
        if let Some(reordered) = summary.and_then(Summary::reordered) {
            reported.extend(reordered);
        }
        self.check_old_previous_siblings(&mut check, &reported);

        check.finish(self.query.shape())
    }

    fn old_attribute(&self, doc: &Document, node: NodeId, name: &str) -> Option<&str> {
        let html = doc.is_html_element(node);
        self.nodes[&node]
            .attributes
            .iter()
            .find(|(n, _)| {
                if html {
                    n.eq_ignore_ascii_case(name)
                } else {
                    n == name
                }
            })
            .map(|(_, value)| value.as_str())
    }

    fn attribute_changes(&self, doc: &Document, stayed: &[NodeId], name: &str) -> Vec<NodeId> {
        stayed
            .iter()
            .copied()
            .filter(|&node| self.old_attribute(doc, node, name) != doc.attribute(node, name))
            .collect()
    }

    /// Every attribute name present on a stayed node before or after.
    fn changed_attribute_names(&self, doc: &Document, stayed: &[NodeId]) -> Vec<String> {
        let mut names = BTreeSet::new();
        for &node in stayed {
            let before = self.nodes[&node].attributes.iter();
            let after = doc.attributes(node).iter();
            names.extend(before.chain(after).map(|(name, _)| name.clone()));
        }
        names.into_iter().collect()
    }

    fn check_attributes(&self, check: &mut Check<'_>, stayed: &[NodeId], names: &[String]) {
        let reported = check.summary.and_then(Summary::attribute_changed);
        let mut keys: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        keys.extend(reported.iter().flat_map(|map| map.keys().map(String::as_str)));
        for key in keys {
            let expected = self.attribute_changes(check.doc, stayed, key);
            let actual = reported.and_then(|map| map.get(key)).map(Vec::as_slice);
            if expected.is_empty() && actual.is_none_or(<[NodeId]>::is_empty) {
                continue;
            }
            check.list(&format!("attributeChanged[{key}]"), &expected, actual);
            self.check_old_attributes(check, key, actual.unwrap_or_default());
        }
    }

    fn check_old_attributes(&self, check: &mut Check<'_>, name: &str, reported: &[NodeId]) {
        let Some(summary) = check.summary else {
            return;
        };
        for &node in reported.iter().filter(|node| self.nodes.contains_key(node)) {
            let label = check.names.label(node);
            let old = self.old_attribute(check.doc, node, name).unwrap_or("<absent>");
            check
                .expected
                .push(format!("oldAttribute({label}, {name}): {old}"));
            let answer = match summary.old_attribute(node, name) {
                Ok(value) => value.unwrap_or("<absent>").to_string(),
                Err(err) => format!("error: {err}"),
            };
            check
                .actual
                .push(format!("oldAttribute({label}, {name}): {answer}"));
        }
    }

    fn check_text(
        &self,
        check: &mut Check<'_>,
        label: &str,
        stayed: &[NodeId],
        list: impl Fn(&Summary<NodeId>) -> Option<&[NodeId]>,
    ) {
        let doc = check.doc;
        let expected: Vec<NodeId> = stayed
            .iter()
            .copied()
            .filter(|&node| doc.node_type(node).is_character_data())
            .filter(|&node| self.nodes[&node].text.as_deref() != doc.character_data(node))
            .collect();
        let actual = check.summary.and_then(|s| list(s));
        check.list(label, &expected, actual);

        let Some(summary) = check.summary else {
            return;
        };
        for &node in actual
            .unwrap_or_default()
            .iter()
            .filter(|node| self.nodes.contains_key(node))
        {
            let name = check.names.label(node);
            let old = self.nodes[&node].text.as_deref().unwrap_or("<none>");
            check
                .expected
                .push(format!("oldCharacterData({name}): {old}"));
            let answer = match summary.old_character_data(node) {
                Ok(value) => value.unwrap_or("<none>").to_string(),
                Err(err) => format!("error: {err}"),
            };
            check
                .actual
                .push(format!("oldCharacterData({name}): {answer}"));
        }
    }

    /// Reported reorders must be nodes that kept their parent, and every
    /// other node that kept its parent must also have kept its order
    /// relative to the rest of them.
    fn check_reorders(&self, check: &mut Check<'_>, stayed: &[NodeId]) {
        let doc = check.doc;
        let reported: HashSet<NodeId> = check
            .summary
            .and_then(Summary::reordered)
            .unwrap_or_default()
            .iter()
            .copied()
            .collect();
        let kept_parent: HashSet<NodeId> = stayed
            .iter()
            .copied()
            .filter(|&node| {
                let parent = doc.parent(node);
                parent.is_some() && self.nodes[&node].parent == parent
            })
            .collect();

        let mut sorted: Vec<NodeId> = reported.iter().copied().collect();
        sorted.sort();
        let valid: Vec<NodeId> = sorted
            .iter()
            .copied()
            .filter(|node| kept_parent.contains(node))
            .collect();
        check.list("reordered", &valid, Some(sorted.as_slice()));

        let parents: BTreeSet<NodeId> = kept_parent
            .iter()
            .filter_map(|&node| doc.parent(node))
            .collect();
        for parent in parents {
            let stable = |node: &&NodeId| kept_parent.contains(*node) && !reported.contains(*node);
            let Some(old_children) = self.nodes.get(&parent).map(|s| &s.children) else {
                continue;
            };
            let before: Vec<NodeId> = old_children.iter().filter(stable).copied().collect();
            let after: Vec<NodeId> = doc.children(parent).iter().filter(stable).copied().collect();
            if before != after {
                let parent = check.names.label(parent);
                check.expected.push(format!(
                    "stableOrder({parent}): {}",
                    join_labels(check.names, &before)
                ));
                check.actual.push(format!(
                    "stableOrder({parent}): {}",
                    join_labels(check.names, &after)
                ));
            }
        }
    }

    /// Removed, reparented and reordered nodes against their snapshot
    /// sibling. Errors are only tolerated when old previous siblings were
    /// not asked for and the node was not reordered.
    fn check_old_previous_siblings(&self, check: &mut Check<'_>, reported: &BTreeSet<NodeId>) {
        let Some(summary) = check.summary else {
            return;
        };
        let reordered: HashSet<NodeId> = summary
            .reordered()
            .unwrap_or_default()
            .iter()
            .copied()
            .collect();
        for &node in reported {
            let Some(state) = self.nodes.get(&node) else {
                continue;
            };
            let answer = summary.old_previous_sibling(check.doc, node);
            if answer.is_err() && !self.old_previous_sibling && !reordered.contains(&node) {
                continue;
            }
            let label = check.names.label(node);
            check.expected.push(format!(
                "oldPreviousSibling({label}): {}",
                label_or_none(check.names, state.previous_sibling)
            ));
            check.actual.push(format!(
                "oldPreviousSibling({label}): {}",
                describe(check.names, Some(answer))
            ));
        }
    }
}

struct Check<'a> {
    doc: &'a Document,
    names: &'a NodeNames,
    summary: Option<&'a Summary<NodeId>>,
    expected: Vec<String>,
    actual: Vec<String>,
}

impl Check<'_> {
    /// Compare as sets: both sides are sorted before rendering.
    fn list(&mut self, label: &str, expected: &[NodeId], actual: Option<&[NodeId]>) {
        let mut expected = expected.to_vec();
        expected.sort();
        let mut actual = actual.unwrap_or_default().to_vec();
        actual.sort();
        self.expected
            .push(format!("{label}: {}", join_labels(self.names, &expected)));
        self.actual
            .push(format!("{label}: {}", join_labels(self.names, &actual)));
    }

    fn finish(self, query: &'static str) -> Result<(), ValidationMismatch> {
        if self.expected == self.actual {
            return Ok(());
        }
        let diff = diff_lines(&self.expected, &self.actual);
        Err(ValidationMismatch {
            query,
            expected: self.expected,
            actual: self.actual,
            diff,
        })
    }
}

fn is_selected(doc: &Document, node: NodeId, query: &Query) -> bool {
    match query {
        Query::All => true,
        Query::CharacterData => doc.node_type(node).is_character_data(),
        Query::Attribute { name, .. } => doc.attribute(node, name).is_some(),
        Query::Element { selectors, .. } => {
            doc.node_type(node) == core_types::NodeType::Element
                && selectors.iter().any(|s| s.is_matching(doc, node))
        }
    }
}

fn join_labels(names: &NodeNames, nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(|&node| names.label(node))
        .collect::<Vec<_>>()
        .join(" ")
}

fn label_or_none(names: &NodeNames, node: Option<NodeId>) -> String {
    node.map_or_else(|| "<none>".to_string(), |node| names.label(node))
}

fn describe<E: std::fmt::Display>(
    names: &NodeNames,
    answer: Option<Result<Option<NodeId>, E>>,
) -> String {
    match answer {
        Some(Ok(node)) => label_or_none(names, node),
        Some(Err(err)) => format!("error: {err}"),
        None => "<no summary>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::DocumentKind;
    use mutation_summary::{MutationSummary, QuerySpec};
    use std::ops::ControlFlow;

    struct Tree {
        doc: Document,
        names: NodeNames,
        root: NodeId,
    }

    fn tree() -> Tree {
        let mut doc = Document::new(DocumentKind::Html);
        let mut names = NodeNames::new();
        let root = doc.create_element("div");
        doc.append_child(NodeId::DOCUMENT, root).unwrap();
        names.bind("root", root).unwrap();
        for key in ["a", "b"] {
            let node = doc.create_element("span");
            doc.append_child(root, node).unwrap();
            names.bind(key, node).unwrap();
        }
        Tree { doc, names, root }
    }

    #[test]
    fn quiet_batch_validates_without_a_summary() {
        let t = tree();
        let query = QuerySpec::all().validate().unwrap();
        let validator = SnapshotValidator::record(&t.doc, t.root, &query);
        validator.validate(&t.doc, None, &t.names).unwrap();
    }

    #[test]
    fn missing_summary_for_a_change_is_a_mismatch() {
        let mut t = tree();
        let query = QuerySpec::element("span").validate().unwrap();
        let validator = SnapshotValidator::record(&t.doc, t.root, &query);
        let b = t.names.resolve("b").unwrap();
        t.doc.remove(b).unwrap();
        let err = validator.validate(&t.doc, None, &t.names).unwrap_err();
        assert_eq!(err.query, "element");
        assert!(err.expected.contains(&"removed: b".to_string()), "{err}");
        assert!(err.actual.contains(&"removed: ".to_string()), "{err}");
        assert!(err.to_string().contains("expected: removed: b"), "{err}");
    }

    /// Remove `b` under a `span` summary and validate the delivery.
    fn remove_b(keep_siblings: bool, require_siblings: bool) -> Result<(), ValidationMismatch> {
        let mut t = tree();
        let mut summary = MutationSummary::builder()
            .root_node(t.root)
            .query(QuerySpec::element("span"))
            .old_previous_sibling(keep_siblings)
            .callback(|_: &[Summary<NodeId>], _: &mut Document| ControlFlow::Continue(()))
            .connect(&mut t.doc)
            .unwrap();
        let validator = SnapshotValidator::record(&t.doc, t.root, &summary.queries()[0])
            .with_old_previous_sibling(require_siblings);
        let b = t.names.resolve("b").unwrap();
        t.doc.remove(b).unwrap();
        let delivered = summary.take_summaries(&mut t.doc).unwrap().unwrap();
        validator.validate(&t.doc, Some(&delivered[0]), &t.names)
    }

    #[test]
    fn old_previous_sibling_errors_fail_when_siblings_were_asked_for() {
        let err = remove_b(false, true).unwrap_err();
        assert!(
            err.expected.contains(&"oldPreviousSibling(b): a".to_string()),
            "{err}"
        );
        assert!(
            err.actual
                .iter()
                .any(|line| line.starts_with("oldPreviousSibling(b): error:")),
            "{err}"
        );
    }

    #[test]
    fn old_previous_sibling_errors_pass_when_not_asked_for() {
        remove_b(false, false).unwrap();
    }

    #[test]
    fn kept_old_previous_sibling_validates() {
        remove_b(true, true).unwrap();
    }
}

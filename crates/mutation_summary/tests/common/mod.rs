#![allow(dead_code)]

use core_types::TreeView;
use dom::{Document, DocumentKind, NodeId};
use mutation_summary::{MutationSummary, MutationSummaryBuilder, Query, QuerySpec, Summary};

/// A document with an observed test container appended to it.
pub struct Harness {
    pub doc: Document,
    pub test_div: NodeId,
}

impl Harness {
    pub fn html() -> Self {
        Self::new(DocumentKind::Html)
    }

    pub fn xml() -> Self {
        Self::new(DocumentKind::Xml)
    }

    fn new(kind: DocumentKind) -> Self {
        let mut doc = Document::new(kind);
        let test_div = doc.create_element("div");
        doc.append_child(NodeId::DOCUMENT, test_div).unwrap();
        Self { doc, test_div }
    }

    pub fn element(&mut self, tag: &str) -> NodeId {
        self.doc.create_element(tag)
    }

    /// Create `tag` and append it to `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let node = self.doc.create_element(tag);
        self.doc.append_child(parent, node).unwrap();
        node
    }

    pub fn append_node(&mut self, parent: NodeId, node: NodeId) {
        self.doc.append_child(parent, node).unwrap();
    }

    pub fn remove_child(&mut self, parent: NodeId, node: NodeId) {
        self.doc.remove_child(parent, node).unwrap();
    }

    /// Insert `node` right after `reference`, or first when `None`.
    pub fn insert_after(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        let before = match reference {
            Some(reference) => self.doc.next_sibling(reference),
            None => self.doc.first_child(parent),
        };
        self.doc.insert_before(parent, node, before).unwrap();
    }

    pub fn set(&mut self, node: NodeId, name: &str, value: &str) {
        self.doc.set_attribute(node, name, value).unwrap();
    }

    pub fn unset(&mut self, node: NodeId, name: &str) {
        self.doc.remove_attribute(node, name).unwrap();
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.doc.set_character_data(node, text).unwrap();
    }

    /// Observe the test container; summaries are pulled with
    /// [`Observed::take`], so the callback must never run.
    pub fn observe(&mut self, query: QuerySpec) -> Observed {
        self.observe_with(query, |builder| builder)
    }

    pub fn observe_with(
        &mut self,
        query: QuerySpec,
        configure: impl FnOnce(MutationSummaryBuilder<Document>) -> MutationSummaryBuilder<Document>,
    ) -> Observed {
        let builder = MutationSummary::builder()
            .root_node(self.test_div)
            .query(query)
            .callback(|_: &[Summary<NodeId>], _: &mut Document| {
                panic!("summaries are taken explicitly in these tests")
            });
        let summary = configure(builder).connect(&mut self.doc).unwrap();
        Observed { summary }
    }
}

pub struct Observed {
    pub summary: MutationSummary<Document>,
}

impl Observed {
    pub fn query(&self) -> &Query {
        &self.summary.queries()[0]
    }

    pub fn take(&mut self, doc: &mut Document) -> Summary<NodeId> {
        let mut summaries = self
            .summary
            .take_summaries(doc)
            .unwrap()
            .expect("expected something to be reported");
        summaries.remove(0)
    }

    pub fn assert_nothing_reported(&mut self, doc: &mut Document) {
        let summaries = self.summary.take_summaries(doc).unwrap();
        assert!(summaries.is_none(), "unexpected report: {summaries:?}");
    }

    pub fn assert(&mut self, doc: &mut Document, expect: Expect) {
        let summary = self.take(doc);
        assert_summary(doc, self.query(), &summary, expect);
    }
}

/// Expected content of a summary. Lists compare ignoring order; old values
/// pair up with their list by position.
#[derive(Default)]
pub struct Expect {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub reparented: Vec<NodeId>,
    pub reordered: Vec<NodeId>,
    pub value_changed: Vec<NodeId>,
    pub old_values: Vec<Option<&'static str>>,
    pub attribute_changed: Vec<(&'static str, Vec<NodeId>, Vec<Option<&'static str>>)>,
    pub removed_old_previous_sibling: Option<Vec<Option<NodeId>>>,
    pub reparented_old_previous_sibling: Option<Vec<Option<NodeId>>>,
    pub reordered_old_previous_sibling: Vec<Option<NodeId>>,
}

pub fn same_nodes(expected: &[NodeId], actual: &[NodeId]) {
    let mut expected = expected.to_vec();
    let mut actual = actual.to_vec();
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual);
}

pub fn assert_summary(doc: &Document, query: &Query, summary: &Summary<NodeId>, expect: Expect) {
    same_nodes(&expect.added, summary.added());
    same_nodes(&expect.removed, summary.removed());
    if let Some(siblings) = &expect.removed_old_previous_sibling {
        for (node, sibling) in expect.removed.iter().zip(siblings) {
            assert_eq!(summary.old_previous_sibling(doc, *node), Ok(*sibling));
        }
    }

    match query {
        Query::All | Query::Element { .. } | Query::CharacterData => {
            let reparented = summary.reparented().expect("reparented list");
            same_nodes(&expect.reparented, reparented);
            if let Some(siblings) = &expect.reparented_old_previous_sibling {
                for (node, sibling) in expect.reparented.iter().zip(siblings) {
                    assert_eq!(summary.old_previous_sibling(doc, *node), Ok(*sibling));
                }
            }
        }
        Query::Attribute { .. } => assert!(summary.reparented().is_none()),
    }

    if matches!(query, Query::All) {
        same_nodes(&expect.reordered, summary.reordered().expect("reordered list"));
        for (node, sibling) in expect
            .reordered
            .iter()
            .zip(&expect.reordered_old_previous_sibling)
        {
            assert_eq!(summary.old_previous_sibling(doc, *node), Ok(*sibling));
        }
    } else {
        assert!(summary.reordered().is_none());
    }

    match query {
        Query::Attribute { name, .. } => {
            same_nodes(&expect.value_changed, summary.value_changed().expect("value list"));
            for (node, old) in expect.value_changed.iter().zip(&expect.old_values) {
                assert_eq!(summary.old_attribute(*node, name), Ok(*old));
            }
        }
        Query::CharacterData => {
            same_nodes(&expect.value_changed, summary.value_changed().expect("value list"));
            for (node, old) in expect.value_changed.iter().zip(&expect.old_values) {
                assert_eq!(summary.old_character_data(*node), Ok(*old));
            }
        }
        _ => assert!(summary.value_changed().is_none()),
    }

    let reports_attributes = matches!(
        query,
        Query::All
            | Query::Element {
                attributes: Some(_),
                ..
            }
    );
    if reports_attributes {
        let changed = summary.attribute_changed().expect("attribute map");
        let non_empty = changed.values().filter(|nodes| !nodes.is_empty()).count();
        let expected_non_empty = expect
            .attribute_changed
            .iter()
            .filter(|(_, nodes, _)| !nodes.is_empty())
            .count();
        assert_eq!(expected_non_empty, non_empty, "attribute map: {changed:?}");
        for (name, nodes, olds) in &expect.attribute_changed {
            let actual = changed.get(*name).map(Vec::as_slice).unwrap_or_default();
            same_nodes(nodes, actual);
            for (node, old) in nodes.iter().zip(olds) {
                assert_eq!(summary.old_attribute(*node, name), Ok(*old));
            }
        }
    } else {
        assert!(summary.attribute_changed().is_none());
    }
}

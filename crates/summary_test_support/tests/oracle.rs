//! Random trees and batches: every summary must agree with the brute-force
//! snapshot diff, for every query shape at once.

use core_types::{NodeType, TreeView};
use dom::{Document, DocumentKind, NodeId, NodeNames};
use mutation_summary::{MutationSummary, QuerySpec, Summary};
use proptest::prelude::*;
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;
use summary_test_support::SnapshotValidator;

const TAGS: &[&str] = &["div", "span", "p", "Div"];
const ATTRIBUTES: &[&str] = &["foo", "bar", "class", "Foo"];
const VALUES: &[&str] = &["a", "b", "a b", ""];
const TEXTS: &[&str] = &["one", "two", ""];

#[derive(Clone, Debug)]
enum Step {
    Insert {
        parent: usize,
        child: usize,
        before: Option<usize>,
    },
    Remove(usize),
    SetAttribute {
        node: usize,
        name: usize,
        value: usize,
    },
    RemoveAttribute {
        node: usize,
        name: usize,
    },
    SetText {
        node: usize,
        text: usize,
    },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..32usize, 0..32usize, proptest::option::of(0..32usize))
            .prop_map(|(parent, child, before)| Step::Insert { parent, child, before }),
        2 => (0..32usize).prop_map(Step::Remove),
        3 => (0..32usize, 0..ATTRIBUTES.len(), 0..VALUES.len())
            .prop_map(|(node, name, value)| Step::SetAttribute { node, name, value }),
        1 => (0..32usize, 0..ATTRIBUTES.len())
            .prop_map(|(node, name)| Step::RemoveAttribute { node, name }),
        1 => (0..32usize, 0..TEXTS.len()).prop_map(|(node, text)| Step::SetText { node, text }),
    ]
}

fn queries() -> Vec<QuerySpec> {
    vec![
        QuerySpec::all(),
        QuerySpec::element("div[foo], Div"),
        QuerySpec::element("span, p.a").with_element_attributes("class bar Foo"),
        QuerySpec::element(r#"*[class~="b"]"#),
        QuerySpec::attribute("foo"),
        QuerySpec::character_data(),
    ]
}

struct World {
    doc: Document,
    names: NodeNames,
    root: NodeId,
    /// Root first; the rest start attached or detached.
    nodes: Vec<NodeId>,
}

/// `shape[i] = (parent pick, kind)`: kinds past the tag list are text nodes;
/// a parent pick divisible by four leaves the node detached.
fn build(kind: DocumentKind, shape: &[(usize, usize)]) -> World {
    let mut doc = Document::new(kind);
    let mut names = NodeNames::new();
    let root = doc.create_element("div");
    doc.append_child(NodeId::DOCUMENT, root).unwrap();
    names.bind("root", root).unwrap();
    let mut nodes = vec![root];
    let mut elements = vec![root];

    for (i, &(pick, kind)) in shape.iter().enumerate() {
        let node = match TAGS.get(kind) {
            Some(tag) => doc.create_element(tag),
            None => doc.create_text(TEXTS[kind % TEXTS.len()]),
        };
        if pick % 4 != 0 {
            doc.append_child(elements[pick % elements.len()], node).unwrap();
        }
        if doc.node_type(node) == NodeType::Element {
            elements.push(node);
        }
        names.bind(&format!("n{i}"), node).unwrap();
        nodes.push(node);
    }
    World {
        doc,
        names,
        root,
        nodes,
    }
}

impl World {
    fn pick(&self, index: usize) -> NodeId {
        self.nodes[index % self.nodes.len()]
    }

    /// Apply `step` if it is meaningful for the current tree; hierarchy
    /// errors such as cycles are left for the document to reject.
    fn apply(&mut self, step: &Step) {
        match *step {
            Step::Insert {
                parent,
                child,
                before,
            } => {
                let (parent, child) = (self.pick(parent), self.pick(child));
                if child == self.root || self.doc.node_type(parent) != NodeType::Element {
                    return;
                }
                let before = before
                    .map(|b| self.pick(b))
                    .filter(|&b| self.doc.parent(b) == Some(parent));
                let _ = self.doc.insert_before(parent, child, before);
            }
            Step::Remove(node) => {
                let node = self.pick(node);
                if node != self.root {
                    self.doc.remove(node).unwrap();
                }
            }
            Step::SetAttribute { node, name, value } => {
                let node = self.pick(node);
                if self.doc.node_type(node) == NodeType::Element {
                    self.doc
                        .set_attribute(node, ATTRIBUTES[name], VALUES[value])
                        .unwrap();
                }
            }
            Step::RemoveAttribute { node, name } => {
                let node = self.pick(node);
                if self.doc.node_type(node) == NodeType::Element {
                    self.doc.remove_attribute(node, ATTRIBUTES[name]).unwrap();
                }
            }
            Step::SetText { node, text } => {
                let node = self.pick(node);
                if self.doc.node_type(node).is_character_data() {
                    self.doc.set_character_data(node, TEXTS[text]).unwrap();
                }
            }
        }
    }
}

fn replay(
    kind: DocumentKind,
    old_previous_sibling: bool,
    shape: &[(usize, usize)],
    batches: &[Vec<Step>],
) -> Result<(), String> {
    let mut world = build(kind, shape);
    let delivered: Rc<RefCell<Option<Vec<Summary<NodeId>>>>> = Rc::default();
    let sink = Rc::clone(&delivered);
    let mut summary = MutationSummary::builder()
        .root_node(world.root)
        .queries(queries())
        .old_previous_sibling(old_previous_sibling)
        .callback(move |summaries: &[Summary<NodeId>], _: &mut Document| {
            *sink.borrow_mut() = Some(summaries.to_vec());
            ControlFlow::Continue(())
        })
        .connect(&mut world.doc)
        .map_err(|err| err.to_string())?;

    for (index, batch) in batches.iter().enumerate() {
        let validators: Vec<SnapshotValidator> = summary
            .queries()
            .iter()
            .map(|query| {
                SnapshotValidator::record(&world.doc, world.root, query)
                    .with_old_previous_sibling(old_previous_sibling)
            })
            .collect();
        for step in batch {
            world.apply(step);
        }
        summary
            .deliver(&mut world.doc)
            .map_err(|err| err.to_string())?;
        let summaries = delivered.borrow_mut().take();
        for (query, validator) in validators.iter().enumerate() {
            let reported = summaries.as_ref().map(|all| &all[query]);
            validator
                .validate(&world.doc, reported, &world.names)
                .map_err(|err| format!("batch {index}, query {query}: {err}"))?;
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn summaries_agree_with_snapshots(
        xml in any::<bool>(),
        old_previous_sibling in any::<bool>(),
        shape in prop::collection::vec((0..16usize, 0..6usize), 1..16),
        batches in prop::collection::vec(prop::collection::vec(step(), 0..12), 1..4),
    ) {
        let kind = if xml { DocumentKind::Xml } else { DocumentKind::Html };
        let result = replay(kind, old_previous_sibling, &shape, &batches);
        prop_assert!(result.is_ok(), "{}", result.unwrap_err());
    }
}

#[test]
fn move_into_detached_subtree_and_back() {
    // n0 div > n1 span; n2 detached p.
    let shape = [(1, 0), (1, 1), (4, 2)];
    let batches = vec![vec![
        Step::Insert {
            parent: 3,
            child: 2,
            before: None,
        },
        Step::SetAttribute {
            node: 2,
            name: 2,
            value: 0,
        },
        Step::Insert {
            parent: 0,
            child: 3,
            before: Some(1),
        },
    ]];
    replay(DocumentKind::Html, true, &shape, &batches).unwrap();
}

#[test]
fn reorders_with_text_siblings() {
    let shape = [(1, 0), (1, 4), (1, 1), (1, 5)];
    let batches = vec![
        vec![
            Step::Insert {
                parent: 0,
                child: 4,
                before: Some(1),
            },
            Step::Insert {
                parent: 0,
                child: 2,
                before: None,
            },
        ],
        vec![Step::Remove(3), Step::SetText { node: 2, text: 1 }],
    ];
    replay(DocumentKind::Xml, false, &shape, &batches).unwrap();
}

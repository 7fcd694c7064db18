#![no_main]

//! Byte-driven trees and batches, every summary checked against a snapshot
//! diff. Layout: one flag byte, one byte per initial node, then four bytes
//! per operation with `0xff` closing a batch.

use core_types::{NodeType, TreeView};
use dom::{Document, DocumentKind, NodeId, NodeNames};
use libfuzzer_sys::fuzz_target;
use mutation_summary::{MutationSummary, QuerySpec, Summary};
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;
use summary_test_support::SnapshotValidator;

const TAGS: &[&str] = &["div", "span", "p", "Div"];
const ATTRIBUTES: &[&str] = &["foo", "bar", "class", "Foo"];
const VALUES: &[&str] = &["a", "b", "a b", ""];
const TEXTS: &[&str] = &["one", "two", ""];
const MAX_NODES: usize = 24;
const BATCH_END: u8 = 0xff;

struct World {
    doc: Document,
    names: NodeNames,
    root: NodeId,
    nodes: Vec<NodeId>,
}

impl World {
    fn build(kind: DocumentKind, shape: &[u8]) -> Self {
        let mut doc = Document::new(kind);
        let mut names = NodeNames::new();
        let root = doc.create_element("div");
        doc.append_child(NodeId::DOCUMENT, root).unwrap();
        names.bind("root", root).unwrap();
        let mut nodes = vec![root];
        let mut elements = vec![root];
        for (i, &byte) in shape.iter().enumerate() {
            let kind = usize::from(byte & 0x07);
            let node = match TAGS.get(kind) {
                Some(tag) => doc.create_element(tag),
                None => doc.create_text(TEXTS[kind % TEXTS.len()]),
            };
            let pick = usize::from(byte >> 3);
            if pick % 4 != 0 {
                doc.append_child(elements[pick % elements.len()], node).unwrap();
            }
            if doc.node_type(node) == NodeType::Element {
                elements.push(node);
            }
            names.bind(&format!("n{i}"), node).unwrap();
            nodes.push(node);
        }
        Self {
            doc,
            names,
            root,
            nodes,
        }
    }

    fn pick(&self, byte: u8) -> NodeId {
        self.nodes[usize::from(byte) % self.nodes.len()]
    }

    fn apply(&mut self, op: [u8; 4]) {
        let [kind, a, b, c] = op;
        let node = self.pick(a);
        let is_element = self.doc.node_type(node) == NodeType::Element;
        match kind % 5 {
            0 => {
                let parent = self.pick(b);
                if node == self.root || self.doc.node_type(parent) != NodeType::Element {
                    return;
                }
                let before = Some(self.pick(c)).filter(|&r| self.doc.parent(r) == Some(parent));
                let _ = self.doc.insert_before(parent, node, before);
            }
            1 if node != self.root => {
                let _ = self.doc.remove(node);
            }
            2 if is_element => {
                let name = ATTRIBUTES[usize::from(b) % ATTRIBUTES.len()];
                let value = VALUES[usize::from(c) % VALUES.len()];
                let _ = self.doc.set_attribute(node, name, value);
            }
            3 if is_element => {
                let name = ATTRIBUTES[usize::from(b) % ATTRIBUTES.len()];
                let _ = self.doc.remove_attribute(node, name);
            }
            4 if self.doc.node_type(node).is_character_data() => {
                let text = TEXTS[usize::from(b) % TEXTS.len()];
                let _ = self.doc.set_character_data(node, text);
            }
            _ => {}
        }
    }
}

fn queries() -> Vec<QuerySpec> {
    vec![
        QuerySpec::all(),
        QuerySpec::element("div[foo], Div"),
        QuerySpec::element("span, p.a").with_element_attributes("class bar Foo"),
        QuerySpec::attribute("foo"),
        QuerySpec::character_data(),
    ]
}

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let kind = if flags & 1 == 0 {
        DocumentKind::Html
    } else {
        DocumentKind::Xml
    };
    let node_count = usize::from(flags >> 1).min(MAX_NODES).min(rest.len());
    let (shape, script) = rest.split_at(node_count);
    let mut world = World::build(kind, shape);

    let delivered: Rc<RefCell<Option<Vec<Summary<NodeId>>>>> = Rc::default();
    let sink = Rc::clone(&delivered);
    let old_previous_sibling = flags & 0x80 != 0;
    let mut summary = MutationSummary::builder()
        .root_node(world.root)
        .queries(queries())
        .old_previous_sibling(old_previous_sibling)
        .callback(move |summaries: &[Summary<NodeId>], _: &mut Document| {
            *sink.borrow_mut() = Some(summaries.to_vec());
            ControlFlow::Continue(())
        })
        .connect(&mut world.doc)
        .unwrap();

    for batch in script.split(|&byte| byte == BATCH_END) {
        let validators: Vec<SnapshotValidator> = summary
            .queries()
            .iter()
            .map(|query| {
                SnapshotValidator::record(&world.doc, world.root, query)
                    .with_old_previous_sibling(old_previous_sibling)
            })
            .collect();
        for op in batch.chunks_exact(4) {
            world.apply([op[0], op[1], op[2], op[3]]);
        }
        summary.deliver(&mut world.doc).unwrap();
        let summaries = delivered.borrow_mut().take();
        for (index, validator) in validators.iter().enumerate() {
            let reported = summaries.as_ref().map(|all| &all[index]);
            if let Err(mismatch) = validator.validate(&world.doc, reported, &world.names) {
                panic!("query {index}: {mismatch}");
            }
        }
    }
});

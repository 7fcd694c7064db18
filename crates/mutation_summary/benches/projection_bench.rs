use core_types::{MutationRecord, MutationSource, ObserveInit};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dom::{Document, DocumentKind, NodeId};
use mutation_summary::{MutationProjection, MutationSummary, ProjectionOptions, QuerySpec, Summary};
use std::ops::ControlFlow;

const FANOUT: usize = 8;
const DEPTH: usize = 5;
const REORDER_SIBLINGS: usize = 2_000;
const WIDE_CHILDREN: usize = 20_000;
const WIDE_APPENDS: usize = 2_000;

fn observe_all() -> ObserveInit {
    ObserveInit {
        child_list: true,
        subtree: true,
        attributes: true,
        attribute_old_value: true,
        character_data: true,
        character_data_old_value: true,
        ..ObserveInit::default()
    }
}

/// A complete tree of `FANOUT`-wide elements, `DEPTH` levels deep, with a
/// text leaf under every element on the last level. Returns the root and
/// every element in document order.
fn make_tree(doc: &mut Document) -> (NodeId, Vec<NodeId>) {
    let root = doc.create_element("div");
    doc.append_child(NodeId::DOCUMENT, root).unwrap();
    let mut elements = vec![root];
    let mut level = vec![root];
    for depth in 0..DEPTH {
        let mut next = Vec::with_capacity(level.len() * FANOUT);
        for &parent in &level {
            for i in 0..FANOUT {
                let tag = if i % 2 == 0 { "div" } else { "p" };
                let child = doc.create_element(tag);
                doc.set_attribute(child, "class", if i % 3 == 0 { "a b" } else { "c" })
                    .unwrap();
                doc.append_child(parent, child).unwrap();
                if depth + 1 == DEPTH {
                    let text = doc.create_text("leaf");
                    doc.append_child(child, text).unwrap();
                }
                next.push(child);
            }
        }
        elements.extend(&next);
        level = next;
    }
    (root, elements)
}

/// A handful of scattered moves and attribute writes.
fn small_batch(doc: &mut Document, elements: &[NodeId]) {
    let stride = elements.len() / 16;
    for i in 1..16 {
        let node = elements[elements.len() - i * stride / 2 - 1];
        doc.set_attribute(node, "class", "moved").unwrap();
        let parent = elements[i];
        doc.append_child(parent, node).unwrap();
    }
}

fn recorded_small_batch() -> (Document, NodeId, Vec<MutationRecord<NodeId>>) {
    let mut doc = Document::new(DocumentKind::Html);
    let (root, elements) = make_tree(&mut doc);
    let observer = doc.observe(root, &observe_all());
    small_batch(&mut doc, &elements);
    let records = doc.take_records(observer);
    (doc, root, records)
}

/// `REORDER_SIBLINGS` children, then every other one moved to the front in
/// reverse: a long chain of moves for the reorder resolution to untangle.
fn recorded_reorder_chain() -> (Document, NodeId, Vec<MutationRecord<NodeId>>) {
    let mut doc = Document::new(DocumentKind::Html);
    let root = doc.create_element("ul");
    doc.append_child(NodeId::DOCUMENT, root).unwrap();
    let children: Vec<NodeId> = (0..REORDER_SIBLINGS)
        .map(|_| {
            let li = doc.create_element("li");
            doc.append_child(root, li).unwrap();
            li
        })
        .collect();
    let observer = doc.observe(root, &observe_all());
    for &child in children.iter().step_by(2) {
        let first = doc.children(root).first().copied();
        doc.insert_before(root, child, first).unwrap();
    }
    let records = doc.take_records(observer);
    (doc, root, records)
}

/// A parent with `WIDE_CHILDREN` children receiving `WIDE_APPENDS` appends,
/// one record each.
fn recorded_wide_appends() -> (Document, NodeId, Vec<MutationRecord<NodeId>>) {
    let mut doc = Document::new(DocumentKind::Html);
    let root = doc.create_element("ul");
    doc.append_child(NodeId::DOCUMENT, root).unwrap();
    for _ in 0..WIDE_CHILDREN {
        let li = doc.create_element("li");
        doc.append_child(root, li).unwrap();
    }
    let observer = doc.observe(root, &observe_all());
    for _ in 0..WIDE_APPENDS {
        let li = doc.create_element("li");
        doc.append_child(root, li).unwrap();
    }
    let records = doc.take_records(observer);
    (doc, root, records)
}

fn bench_projection_small_batch(c: &mut Criterion) {
    let (doc, root, records) = recorded_small_batch();
    let options = ProjectionOptions {
        calc_reordered: true,
        calc_old_previous_sibling: false,
    };
    c.bench_function("bench_projection_small_batch", |b| {
        b.iter(|| {
            let projection = MutationProjection::new(&doc, root, black_box(&records), options);
            black_box(projection);
        });
    });
}

fn bench_projection_reorder_chain(c: &mut Criterion) {
    let (doc, root, records) = recorded_reorder_chain();
    let options = ProjectionOptions {
        calc_reordered: true,
        calc_old_previous_sibling: true,
    };
    c.bench_function("bench_projection_reorder_chain", |b| {
        b.iter(|| {
            let projection = MutationProjection::new(&doc, root, black_box(&records), options);
            black_box(projection);
        });
    });
}

fn bench_projection_wide_appends(c: &mut Criterion) {
    let (doc, root, records) = recorded_wide_appends();
    let options = ProjectionOptions {
        calc_reordered: true,
        calc_old_previous_sibling: true,
    };
    c.bench_function("bench_projection_wide_appends", |b| {
        b.iter(|| {
            let projection = MutationProjection::new(&doc, root, black_box(&records), options);
            black_box(projection);
        });
    });
}

fn bench_summaries_end_to_end(c: &mut Criterion) {
    c.bench_function("bench_summaries_end_to_end", |b| {
        b.iter_batched(
            || {
                let mut doc = Document::new(DocumentKind::Html);
                let (root, elements) = make_tree(&mut doc);
                let summary = MutationSummary::builder()
                    .root_node(root)
                    .queries(vec![
                        QuerySpec::all(),
                        QuerySpec::element("div.a, p[class~=b]").with_element_attributes("class"),
                        QuerySpec::attribute("class"),
                        QuerySpec::character_data(),
                    ])
                    .callback(|_: &[Summary<NodeId>], _: &mut Document| ControlFlow::Continue(()))
                    .connect(&mut doc)
                    .unwrap();
                small_batch(&mut doc, &elements);
                (doc, summary)
            },
            |(mut doc, mut summary)| {
                let summaries = summary.take_summaries(&mut doc).unwrap();
                black_box(summaries);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_projection_small_batch,
    bench_projection_reorder_chain,
    bench_projection_wide_appends,
    bench_summaries_end_to_end
);
criterion_main!(benches);

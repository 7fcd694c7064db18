use core_types::{MutationRecord, MutationSource, ObserveInit};
use dom::{Document, DocumentKind, NodeId};

fn subtree_init() -> ObserveInit {
    ObserveInit {
        child_list: true,
        subtree: true,
        attributes: true,
        attribute_old_value: true,
        attribute_filter: None,
        character_data: true,
        character_data_old_value: true,
    }
}

fn rooted() -> (Document, NodeId) {
    let mut doc = Document::new(DocumentKind::Html);
    let root = doc.create_element("div");
    doc.append_child(NodeId::DOCUMENT, root).unwrap();
    (doc, root)
}

#[test]
fn move_queues_removal_then_insertion() {
    let (mut doc, root) = rooted();
    let a = doc.create_element("a");
    let b = doc.create_element("b");
    let c = doc.create_element("c");
    for n in [a, b, c] {
        doc.append_child(root, n).unwrap();
    }
    let observer = doc.observe(root, &subtree_init());

    doc.insert_before(root, c, Some(a)).unwrap();

    let records = doc.take_records(observer);
    assert_eq!(
        records,
        vec![
            MutationRecord::ChildList {
                target: root,
                added: vec![],
                removed: vec![c],
                previous_sibling: Some(b),
                next_sibling: None,
            },
            MutationRecord::ChildList {
                target: root,
                added: vec![c],
                removed: vec![],
                previous_sibling: None,
                next_sibling: Some(a),
            },
        ]
    );
    assert!(doc.take_records(observer).is_empty());
}

#[test]
fn removed_subtree_stays_observed_until_records_are_taken() {
    let (mut doc, root) = rooted();
    let div = doc.create_element("div");
    doc.append_child(root, div).unwrap();
    let observer = doc.observe(root, &subtree_init());

    doc.remove_child(root, div).unwrap();
    let span = doc.create_element("span");
    doc.append_child(div, span).unwrap();

    let records = doc.take_records(observer);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].target(), div);

    // The transient registration ended with the batch.
    let late = doc.create_element("p");
    doc.append_child(div, late).unwrap();
    assert!(doc.take_records(observer).is_empty());
}

#[test]
fn attribute_filter_and_old_values() {
    let (mut doc, root) = rooted();
    let init = ObserveInit {
        child_list: true,
        subtree: true,
        attributes: true,
        attribute_old_value: false,
        attribute_filter: Some(vec!["foo".to_string()]),
        ..ObserveInit::default()
    };
    let observer = doc.observe(root, &init);

    doc.set_attribute(root, "foo", "1").unwrap();
    doc.set_attribute(root, "foo", "2").unwrap();
    doc.set_attribute(root, "bar", "3").unwrap();
    doc.remove_attribute(root, "missing").unwrap();

    let records = doc.take_records(observer);
    assert_eq!(
        records,
        vec![
            MutationRecord::Attributes {
                target: root,
                name: "foo".to_string(),
                old_value: None,
            },
            MutationRecord::Attributes {
                target: root,
                name: "foo".to_string(),
                old_value: None,
            },
        ]
    );
}

#[test]
fn character_data_records_carry_old_text() {
    let (mut doc, root) = rooted();
    let text = doc.create_text("foo");
    doc.append_child(root, text).unwrap();
    let observer = doc.observe(root, &subtree_init());

    doc.set_character_data(text, "bar").unwrap();

    assert_eq!(
        doc.take_records(observer),
        vec![MutationRecord::CharacterData {
            target: text,
            old_value: Some("foo".to_string()),
        }]
    );
}

#[test]
fn non_subtree_registration_sees_only_its_target() {
    let (mut doc, root) = rooted();
    let child = doc.create_element("span");
    doc.append_child(root, child).unwrap();
    let init = ObserveInit {
        attributes: true,
        ..ObserveInit::default()
    };
    let observer = doc.observe(root, &init);

    doc.set_attribute(child, "x", "1").unwrap();
    doc.set_attribute(root, "x", "1").unwrap();

    let records = doc.take_records(observer);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target(), root);
}

#[test]
fn disconnect_drops_queued_records() {
    let (mut doc, root) = rooted();
    let observer = doc.observe(root, &subtree_init());
    doc.set_attribute(root, "x", "1").unwrap();
    doc.disconnect(observer);
    doc.set_attribute(root, "x", "2").unwrap();
    assert!(doc.take_records(observer).is_empty());
}

#[test]
fn each_observer_gets_its_own_queue() {
    let (mut doc, root) = rooted();
    let first = doc.observe(root, &subtree_init());
    let second = doc.observe(NodeId::DOCUMENT, &subtree_init());
    doc.set_attribute(root, "x", "1").unwrap();
    assert_eq!(doc.take_records(first).len(), 1);
    assert_eq!(doc.take_records(second).len(), 1);
}

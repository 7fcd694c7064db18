use crate::observer::ObserverRegistry;
use core_types::{MutationRecord, MutationSource, NodeType, ObserveInit, ObserverId, TreeView};
use thiserror::Error;

/// Arena index of a node within one [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The document node; created together with the document.
    pub const DOCUMENT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Naming rules of a document.
///
/// HTML documents lowercase element and attribute names on creation and
/// compare them case-insensitively; XML documents keep them as given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Html,
    Xml,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} cannot have children")]
    InvalidParent(NodeId),
    #[error("node {0:?} cannot be inserted")]
    InvalidChild(NodeId),
    #[error("inserting {child:?} into {parent:?} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("wrong node kind for {0:?}")]
    WrongNodeKind(NodeId),
}

pub(crate) struct NodeRecord {
    kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Index within the parent's children; stale while detached.
    position: usize,
}

impl NodeRecord {
    fn allows_children(&self) -> bool {
        matches!(self.kind, NodeKind::Document | NodeKind::Element { .. })
    }
}

enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        html: bool,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// An arena node tree with mutation observation.
///
/// Nodes are never freed: a removed node keeps its subtree and can be
/// re-inserted later in the same or a later batch.
pub struct Document {
    kind: DocumentKind,
    nodes: Vec<NodeRecord>,
    observers: ObserverRegistry,
}

impl Document {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            nodes: vec![NodeRecord {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                position: 0,
            }],
            observers: ObserverRegistry::default(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    pub fn create_element(&mut self, name: &str) -> NodeId {
        let html = self.kind == DocumentKind::Html;
        let name = if html {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        self.push(NodeKind::Element {
            name,
            attributes: Vec::new(),
            html,
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text {
            text: text.to_string(),
        })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment {
            text: text.to_string(),
        })
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
            position: 0,
        });
        id
    }

    // =========================================================================
    // Child list mutation
    // =========================================================================

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or at the end.
    ///
    /// A child that already has a parent is removed from it first; that
    /// removal is observable as its own record.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.ensure_node(parent)?;
        self.ensure_node(child)?;
        if !self.nodes[parent.index()].allows_children() {
            debug_assert!(false, "parent node cannot have children");
            return Err(DomError::InvalidParent(parent));
        }
        if matches!(self.nodes[child.index()].kind, NodeKind::Document) {
            return Err(DomError::InvalidChild(child));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        let mut reference = reference;
        if let Some(before) = reference {
            self.ensure_node(before)?;
            if self.nodes[before.index()].parent != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: before,
                });
            }
            if before == child {
                reference = self.next_sibling(child);
            }
        }

        if let Some(old_parent) = self.nodes[child.index()].parent {
            self.detach(old_parent, child);
        }

        let siblings = &self.nodes[parent.index()].children;
        let index = match reference {
            Some(before) => self.nodes[before.index()].position,
            None => siblings.len(),
        };
        let previous_sibling = index.checked_sub(1).map(|i| siblings[i]);
        self.nodes[parent.index()].children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
        self.renumber(parent, index);

        self.queue(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
            previous_sibling,
            next_sibling: reference,
        });
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.ensure_node(parent)?;
        self.ensure_node(child)?;
        if self.nodes[child.index()].parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(parent, child);
        Ok(())
    }

    /// Remove `node` from its parent, if it has one.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.ensure_node(node)?;
        if let Some(parent) = self.nodes[node.index()].parent {
            self.detach(parent, node);
        }
        Ok(())
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let siblings = &self.nodes[parent.index()].children;
        let index = self.nodes[child.index()].position;
        if siblings.get(index) != Some(&child) {
            debug_assert!(false, "child missing from parent's children");
            return;
        }
        let previous_sibling = index.checked_sub(1).map(|i| siblings[i]);
        let next_sibling = siblings.get(index + 1).copied();

        let ancestors = self.inclusive_ancestors(parent);
        self.observers.add_transient(&ancestors, child);

        self.nodes[parent.index()].children.remove(index);
        self.nodes[child.index()].parent = None;
        self.renumber(parent, index);

        self.queue(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
            previous_sibling,
            next_sibling,
        });
    }

    // =========================================================================
    // Attributes and text
    // =========================================================================

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.ensure_node(node)?;
        let NodeKind::Element {
            attributes, html, ..
        } = &mut self.nodes[node.index()].kind
        else {
            return Err(DomError::WrongNodeKind(node));
        };
        let name = if *html {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        let old_value = match attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
            None => {
                attributes.push((name.clone(), value.to_string()));
                None
            }
        };
        self.queue(MutationRecord::Attributes {
            target: node,
            name,
            old_value,
        });
        Ok(())
    }

    /// Remove an attribute. Removing an absent attribute changes nothing and
    /// queues no record.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        self.ensure_node(node)?;
        let NodeKind::Element {
            attributes, html, ..
        } = &mut self.nodes[node.index()].kind
        else {
            return Err(DomError::WrongNodeKind(node));
        };
        let name = if *html {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        let Some(index) = attributes.iter().position(|(n, _)| *n == name) else {
            return Ok(());
        };
        let (name, old_value) = attributes.remove(index);
        self.queue(MutationRecord::Attributes {
            target: node,
            name,
            old_value: Some(old_value),
        });
        Ok(())
    }

    pub fn set_character_data(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.ensure_node(node)?;
        let existing = match &mut self.nodes[node.index()].kind {
            NodeKind::Text { text } | NodeKind::Comment { text } => text,
            _ => return Err(DomError::WrongNodeKind(node)),
        };
        let old_value = std::mem::replace(existing, text.to_string());
        self.queue(MutationRecord::CharacterData {
            target: node,
            old_value: Some(old_value),
        });
        Ok(())
    }

    // =========================================================================
    // Structure queries
    // =========================================================================

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.index())
            .map(|record| record.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        match self.nodes.get(node.index()).map(|record| &record.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    fn inclusive_ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            out.push(n);
            current = self.parent(n);
        }
        out
    }

    fn sibling_index(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let record = self.nodes.get(node.index())?;
        Some((record.parent?, record.position))
    }

    /// Refresh cached positions of `parent`'s children from `from` on.
    fn renumber(&mut self, parent: NodeId, from: usize) {
        for index in from..self.nodes[parent.index()].children.len() {
            let child = self.nodes[parent.index()].children[index];
            self.nodes[child.index()].position = index;
        }
    }

    fn ensure_node(&self, node: NodeId) -> Result<(), DomError> {
        if !self.contains(node) {
            debug_assert!(false, "missing node id");
            return Err(DomError::UnknownNode(node));
        }
        Ok(())
    }

    fn queue(&mut self, record: MutationRecord<NodeId>) {
        let ancestors = self.inclusive_ancestors(record.target());
        self.observers.queue(&ancestors, record);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DocumentKind::Html)
    }
}

impl TreeView for Document {
    type Node = NodeId;

    fn document(&self) -> NodeId {
        NodeId::DOCUMENT
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).first().copied()
    }

    fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).last().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_index(node)?;
        self.nodes[parent.index()].children.get(index + 1).copied()
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_index(node)?;
        let index = index.checked_sub(1)?;
        Some(self.nodes[parent.index()].children[index])
    }

    fn node_type(&self, node: NodeId) -> NodeType {
        match self.nodes.get(node.index()).map(|record| &record.kind) {
            Some(NodeKind::Element { .. }) => NodeType::Element,
            Some(NodeKind::Text { .. }) => NodeType::Text,
            Some(NodeKind::Comment { .. }) => NodeType::Comment,
            Some(NodeKind::Document) | None => NodeType::Document,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        let NodeKind::Element {
            attributes, html, ..
        } = &self.nodes.get(node.index())?.kind
        else {
            return None;
        };
        attributes
            .iter()
            .find(|(n, _)| {
                if *html {
                    n.eq_ignore_ascii_case(name)
                } else {
                    n == name
                }
            })
            .map(|(_, value)| value.as_str())
    }

    fn character_data(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Text { text } | NodeKind::Comment { text } => Some(text),
            _ => None,
        }
    }

    fn is_html_element(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.index()).map(|record| &record.kind),
            Some(NodeKind::Element { html: true, .. })
        )
    }
}

impl MutationSource for Document {
    fn observe(&mut self, target: NodeId, init: &ObserveInit) -> ObserverId {
        self.observers.observe(target, init.clone())
    }

    fn disconnect(&mut self, observer: ObserverId) {
        self.observers.disconnect(observer);
    }

    fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord<NodeId>> {
        self.observers.take_records(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new(DocumentKind::Html);
        let root = doc.create_element("DIV");
        doc.append_child(NodeId::DOCUMENT, root).unwrap();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();
        (doc, root, a, b)
    }

    #[test]
    fn html_names_are_lowercased() {
        let (mut doc, root, _, _) = tree();
        assert_eq!(doc.tag_name(root), Some("div"));
        doc.set_attribute(root, "FOO", "1").unwrap();
        assert_eq!(doc.attribute(root, "foo"), Some("1"));
        assert_eq!(doc.attribute(root, "Foo"), Some("1"));
        assert!(doc.is_html_element(root));
    }

    #[test]
    fn xml_names_keep_case() {
        let mut doc = Document::new(DocumentKind::Xml);
        let el = doc.create_element("SPAN");
        doc.set_attribute(el, "Blow", "x").unwrap();
        assert_eq!(doc.tag_name(el), Some("SPAN"));
        assert_eq!(doc.attribute(el, "blow"), None);
        assert_eq!(doc.attribute(el, "Blow"), Some("x"));
        assert!(!doc.is_html_element(el));
    }

    #[test]
    fn siblings_follow_child_order() {
        let (doc, root, a, b) = tree();
        assert_eq!(doc.first_child(root), Some(a));
        assert_eq!(doc.last_child(root), Some(b));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.previous_sibling(b), Some(a));
        assert_eq!(doc.previous_sibling(a), None);
    }

    #[test]
    fn insert_before_moves_attached_node() {
        let (mut doc, root, a, b) = tree();
        doc.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(doc.children(root), &[b, a]);
        assert_eq!(doc.parent(b), Some(root));
    }

    #[test]
    fn insert_before_self_is_a_no_op_move() {
        let (mut doc, root, a, b) = tree();
        doc.insert_before(root, a, Some(a)).unwrap();
        assert_eq!(doc.children(root), &[a, b]);
    }

    #[test]
    fn sibling_links_survive_moves_and_removals() {
        let (mut doc, root, a, b) = tree();
        let c = doc.create_element("c");
        let d = doc.create_element("d");
        doc.append_child(root, c).unwrap();
        doc.append_child(root, d).unwrap();

        doc.insert_before(root, d, Some(a)).unwrap();
        doc.remove_child(root, b).unwrap();
        doc.insert_before(root, b, Some(d)).unwrap();
        assert_eq!(doc.children(root), &[b, d, a, c]);
        let children = doc.children(root).to_vec();
        for pair in children.windows(2) {
            assert_eq!(doc.next_sibling(pair[0]), Some(pair[1]));
            assert_eq!(doc.previous_sibling(pair[1]), Some(pair[0]));
        }
        assert_eq!(doc.previous_sibling(b), None);
        assert_eq!(doc.next_sibling(c), None);

        doc.remove(a).unwrap();
        assert_eq!(doc.next_sibling(d), Some(c));
        assert_eq!(doc.previous_sibling(a), None);
        assert_eq!(doc.next_sibling(a), None);
    }

    #[test]
    fn rejects_cycles_and_bad_references() {
        let (mut doc, root, a, b) = tree();
        assert_eq!(
            doc.append_child(a, root),
            Err(DomError::CycleDetected {
                parent: a,
                child: root
            })
        );
        let text = doc.create_text("t");
        assert_eq!(
            doc.insert_before(root, text, Some(text)),
            Err(DomError::NotAChild {
                parent: root,
                child: text
            })
        );
        assert_eq!(
            doc.remove_child(a, b),
            Err(DomError::NotAChild {
                parent: a,
                child: b
            })
        );
        assert_eq!(doc.set_attribute(text, "x", "y"), Err(DomError::WrongNodeKind(text)));
    }

    #[test]
    fn removed_nodes_keep_their_subtree() {
        let (mut doc, root, a, _) = tree();
        let span = doc.create_element("span");
        doc.append_child(a, span).unwrap();
        doc.remove_child(root, a).unwrap();
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.children(a), &[span]);
        assert!(!doc.is_inclusive_ancestor(root, span));
    }
}

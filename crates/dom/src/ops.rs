//! Scripted tree mutations addressed by node name.
//!
//! Invariants:
//! - Operations are applied in order; each one is a single DOM-level call and
//!   queues exactly the records that call would.
//! - A name is bound once, by the operation that creates the node. The name
//!   `document` is pre-bound to the document node.
//! - References must name existing nodes at the time they are used.

use crate::document::{Document, DomError, NodeId};
use core_types::TreeView;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// One scripted mutation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TreeOp {
    /// Create a detached element and bind it to `key`.
    Element {
        key: String,
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
    /// Create a detached text node.
    Text { key: String, text: String },
    /// Create a detached comment node.
    Comment { key: String, text: String },
    Append { parent: String, child: String },
    /// Insert before `before`, or at the end when absent.
    InsertBefore {
        parent: String,
        child: String,
        #[serde(default)]
        before: Option<String>,
    },
    /// Insert right after `after`, or first when absent.
    InsertAfter {
        parent: String,
        child: String,
        #[serde(default)]
        after: Option<String>,
    },
    /// Remove a node from whatever parent it has.
    Remove { node: String },
    SetAttribute {
        node: String,
        name: String,
        value: String,
    },
    RemoveAttribute { node: String, name: String },
    SetText { node: String, text: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpError {
    #[error("unknown node name `{0}`")]
    UnknownName(String),
    #[error("node name `{0}` is already bound")]
    DuplicateName(String),
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Two-way binding between fixture names and node ids.
#[derive(Clone, Debug)]
pub struct NodeNames {
    by_name: BTreeMap<String, NodeId>,
    by_id: HashMap<NodeId, String>,
}

impl NodeNames {
    pub fn new() -> Self {
        let mut names = Self {
            by_name: BTreeMap::new(),
            by_id: HashMap::new(),
        };
        names.by_name.insert("document".to_string(), NodeId::DOCUMENT);
        names.by_id.insert(NodeId::DOCUMENT, "document".to_string());
        names
    }

    pub fn bind(&mut self, name: &str, node: NodeId) -> Result<(), OpError> {
        if self.by_name.contains_key(name) {
            return Err(OpError::DuplicateName(name.to_string()));
        }
        self.by_name.insert(name.to_string(), node);
        self.by_id.insert(node, name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<NodeId, OpError> {
        self.get(name)
            .ok_or_else(|| OpError::UnknownName(name.to_string()))
    }

    pub fn name_of(&self, node: NodeId) -> Option<&str> {
        self.by_id.get(&node).map(String::as_str)
    }

    /// Name of `node`, or `#<id>` for unnamed nodes.
    pub fn label(&self, node: NodeId) -> String {
        match self.name_of(node) {
            Some(name) => name.to_string(),
            None => format!("#{}", node.0),
        }
    }
}

impl Default for NodeNames {
    fn default() -> Self {
        Self::new()
    }
}

pub fn apply_ops(doc: &mut Document, names: &mut NodeNames, ops: &[TreeOp]) -> Result<(), OpError> {
    for op in ops {
        apply_one(doc, names, op)?;
    }
    Ok(())
}

fn apply_one(doc: &mut Document, names: &mut NodeNames, op: &TreeOp) -> Result<(), OpError> {
    match op {
        TreeOp::Element {
            key,
            tag,
            attributes,
        } => {
            let node = doc.create_element(tag);
            for (name, value) in attributes {
                doc.set_attribute(node, name, value)?;
            }
            names.bind(key, node)?;
        }
        TreeOp::Text { key, text } => {
            let node = doc.create_text(text);
            names.bind(key, node)?;
        }
        TreeOp::Comment { key, text } => {
            let node = doc.create_comment(text);
            names.bind(key, node)?;
        }
        TreeOp::Append { parent, child } => {
            doc.append_child(names.resolve(parent)?, names.resolve(child)?)?;
        }
        TreeOp::InsertBefore {
            parent,
            child,
            before,
        } => {
            let before = before.as_deref().map(|n| names.resolve(n)).transpose()?;
            doc.insert_before(names.resolve(parent)?, names.resolve(child)?, before)?;
        }
        TreeOp::InsertAfter {
            parent,
            child,
            after,
        } => {
            let parent = names.resolve(parent)?;
            let reference = match after {
                Some(after) => doc.next_sibling(names.resolve(after)?),
                None => doc.first_child(parent),
            };
            doc.insert_before(parent, names.resolve(child)?, reference)?;
        }
        TreeOp::Remove { node } => {
            doc.remove(names.resolve(node)?)?;
        }
        TreeOp::SetAttribute { node, name, value } => {
            doc.set_attribute(names.resolve(node)?, name, value)?;
        }
        TreeOp::RemoveAttribute { node, name } => {
            doc.remove_attribute(names.resolve(node)?, name)?;
        }
        TreeOp::SetText { node, text } => {
            doc.set_character_data(names.resolve(node)?, text)?;
        }
    }
    Ok(())
}

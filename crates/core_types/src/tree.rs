//! Read-only view of a live node tree.

use std::fmt::Debug;
use std::hash::Hash;

/// Kinds of node the engine distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
}

impl NodeType {
    /// Text and comment nodes carry character data.
    pub fn is_character_data(self) -> bool {
        matches!(self, NodeType::Text | NodeType::Comment)
    }
}

/// Live structure and content of a tree, as seen at the time of the call.
///
/// Implementations answer from the current state only; nothing here knows
/// about mutation history.
pub trait TreeView {
    type Node: Copy + Eq + Hash + Debug;

    /// The document node, used as the default observation root.
    fn document(&self) -> Self::Node;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn last_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    fn node_type(&self, node: Self::Node) -> NodeType;

    /// Element tag name as created. `None` for non-elements.
    fn tag_name(&self, node: Self::Node) -> Option<&str>;

    /// Current attribute value. `None` when absent or when `node` is not an
    /// element. Names are matched ASCII case-insensitively on HTML elements.
    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Text of a text or comment node.
    fn character_data(&self, node: Self::Node) -> Option<&str>;

    /// Whether markup-language case rules apply: tag and attribute names of
    /// this element compare ASCII case-insensitively.
    fn is_html_element(&self, node: Self::Node) -> bool;
}

use crate::document::{Document, NodeId};
use crate::ops::NodeNames;
use core_types::{NodeType, TreeView};
use std::fmt;

/// Descendants of `root` in document order, excluding `root`.
pub fn descendants(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(root).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(doc.children(node).iter().rev().copied());
    }
    out
}

pub fn inclusive_descendants(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let mut out = vec![root];
    out.extend(descendants(doc, root));
    out
}

/// Indented one-line-per-node rendering of a subtree.
///
/// Elements render as `<name attr="value">` with attributes in stored order,
/// text as `"text"` and comments as `<!-- text -->`; named nodes get an
/// `@name` suffix.
pub struct TreeDump<'a> {
    doc: &'a Document,
    root: NodeId,
    names: Option<&'a NodeNames>,
}

impl<'a> TreeDump<'a> {
    pub fn new(doc: &'a Document, root: NodeId) -> Self {
        Self {
            doc,
            root,
            names: None,
        }
    }

    pub fn with_names(mut self, names: &'a NodeNames) -> Self {
        self.names = Some(names);
        self
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            let mut line = "  ".repeat(depth);
            self.label(node, &mut line);
            lines.push(line);
            for child in self.doc.children(node).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        lines
    }

    fn label(&self, node: NodeId, out: &mut String) {
        match self.doc.node_type(node) {
            NodeType::Document => out.push_str("#document"),
            NodeType::Element => {
                out.push('<');
                out.push_str(self.doc.tag_name(node).unwrap_or_default());
                for (name, value) in self.doc.attributes(node) {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
            }
            NodeType::Text => {
                let text = self.doc.character_data(node).unwrap_or_default();
                out.push_str(&format!("\"{text}\""));
            }
            NodeType::Comment => {
                let text = self.doc.character_data(node).unwrap_or_default();
                out.push_str(&format!("<!-- {text} -->"));
            }
        }
        if let Some(name) = self.names.and_then(|names| names.name_of(node)) {
            out.push_str(" @");
            out.push_str(name);
        }
    }
}

impl fmt::Display for TreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines().iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentKind;

    #[test]
    fn descendants_are_in_document_order() {
        let mut doc = Document::new(DocumentKind::Html);
        let root = doc.create_element("div");
        let a = doc.create_element("a");
        let a1 = doc.create_text("x");
        let b = doc.create_element("b");
        doc.append_child(root, a).unwrap();
        doc.append_child(a, a1).unwrap();
        doc.append_child(root, b).unwrap();
        assert_eq!(descendants(&doc, root), vec![a, a1, b]);
        assert_eq!(inclusive_descendants(&doc, root), vec![root, a, a1, b]);
    }

    #[test]
    fn dump_renders_indented_lines() {
        let mut doc = Document::new(DocumentKind::Html);
        let root = doc.create_element("div");
        doc.set_attribute(root, "id", "r").unwrap();
        let note = doc.create_comment("c");
        doc.append_child(root, note).unwrap();
        let text = doc.create_text("hi");
        doc.append_child(root, text).unwrap();
        let mut names = NodeNames::new();
        names.bind("root", root).unwrap();
        let dump = TreeDump::new(&doc, root).with_names(&names).to_string();
        assert_eq!(dump, "<div id=\"r\"> @root\n  <!-- c -->\n  \"hi\"");
    }
}

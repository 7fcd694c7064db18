//! Per-node change facts folded out of one batch of records, plus
//! reachability from the observed root before and after the batch.

use crate::node_map::NodeMap;
use crate::Movement;
use core_types::{MutationRecord, NodeType, TreeView};
use std::cell::RefCell;
use std::hash::Hash;

/// What happened to one node during the batch. The first recorded value of
/// each kind wins; later records only set flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeChange<N> {
    pub(crate) child_list: bool,
    pub(crate) added: bool,
    pub(crate) old_parent: Option<N>,
    pub(crate) attributes: bool,
    attribute_old_values: Vec<(String, Option<String>)>,
    pub(crate) character_data: bool,
    character_data_old_value: Option<String>,
    case_insensitive: bool,
}

impl<N: Copy> NodeChange<N> {
    fn new(case_insensitive: bool) -> Self {
        Self {
            child_list: false,
            added: false,
            old_parent: None,
            attributes: false,
            attribute_old_values: Vec::new(),
            character_data: false,
            character_data_old_value: None,
            case_insensitive,
        }
    }

    pub(crate) fn inserted_into_parent(&mut self) {
        self.child_list = true;
        self.added = true;
    }

    /// A node that was added during the batch, or whose original parent is
    /// already known, gets its `added` flag cleared; otherwise `parent` is
    /// the parent it had when the batch started.
    pub(crate) fn removed_from_parent(&mut self, parent: N) {
        self.child_list = true;
        if self.added || self.old_parent.is_some() {
            self.added = false;
        } else {
            self.old_parent = Some(parent);
        }
    }

    pub(crate) fn attribute_mutated(&mut self, name: &str, old_value: Option<String>) {
        self.attributes = true;
        if self.attribute_old_values.iter().any(|(n, _)| n == name) {
            return;
        }
        self.attribute_old_values
            .push((name.to_string(), old_value));
    }

    pub(crate) fn character_data_mutated(&mut self, old_value: Option<String>) {
        if self.character_data {
            return;
        }
        self.character_data = true;
        self.character_data_old_value = old_value;
    }

    /// The value `name` had before its first change in the batch.
    ///
    /// `None` when the attribute did not change; `Some(None)` when it was
    /// absent. Markup-language elements look names up lowercased.
    pub(crate) fn attribute_old_value(&self, name: &str) -> Option<Option<&str>> {
        let lowered;
        let name = if self.case_insensitive {
            lowered = name.to_ascii_lowercase();
            lowered.as_str()
        } else {
            name
        };
        self.attribute_old_values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_deref())
    }

    /// Changed attribute names in first-change order.
    pub(crate) fn attribute_names_mutated(&self) -> impl Iterator<Item = &str> + '_ {
        self.attribute_old_values.iter().map(|(n, _)| n.as_str())
    }

    pub(crate) fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub(crate) fn character_data_old_value(&self) -> Option<&str> {
        self.character_data_old_value.as_deref()
    }
}

/// All node changes of a batch, keyed by node in first-touched order.
pub struct TreeChanges<N> {
    root: N,
    changes: NodeMap<N, NodeChange<N>>,
    pub(crate) any_parents_changed: bool,
    pub(crate) any_attributes_changed: bool,
    pub(crate) any_character_data_changed: bool,
    reachable: RefCell<NodeMap<N, bool>>,
    was_reachable: RefCell<NodeMap<N, bool>>,
}

impl<N: Copy + Eq + Hash> TreeChanges<N> {
    pub fn new<T: TreeView<Node = N>>(tree: &T, root: N, records: &[MutationRecord<N>]) -> Self {
        let mut this = Self {
            root,
            changes: NodeMap::new(),
            any_parents_changed: false,
            any_attributes_changed: false,
            any_character_data_changed: false,
            reachable: RefCell::new(NodeMap::new()),
            was_reachable: RefCell::new(NodeMap::new()),
        };

        for record in records {
            match record {
                MutationRecord::ChildList {
                    target,
                    added,
                    removed,
                    ..
                } => {
                    this.any_parents_changed = true;
                    for &node in removed {
                        this.change_for(tree, node).removed_from_parent(*target);
                    }
                    for &node in added {
                        this.change_for(tree, node).inserted_into_parent();
                    }
                }
                MutationRecord::Attributes {
                    target,
                    name,
                    old_value,
                } => {
                    this.any_attributes_changed = true;
                    this.change_for(tree, *target)
                        .attribute_mutated(name, old_value.clone());
                }
                MutationRecord::CharacterData { target, old_value } => {
                    this.any_character_data_changed = true;
                    this.change_for(tree, *target)
                        .character_data_mutated(old_value.clone());
                }
            }
        }
        this
    }

    fn change_for<T: TreeView<Node = N>>(&mut self, tree: &T, node: N) -> &mut NodeChange<N> {
        self.changes.get_or_insert_with(node, || {
            let case_insensitive =
                tree.node_type(node) == NodeType::Element && tree.is_html_element(node);
            NodeChange::new(case_insensitive)
        })
    }

    pub fn root(&self) -> N {
        self.root
    }

    pub fn get(&self, node: N) -> Option<&NodeChange<N>> {
        self.changes.get(node)
    }

    /// Touched nodes in first-touched order.
    pub fn keys(&self) -> impl Iterator<Item = N> + '_ {
        self.changes.keys()
    }

    /// The parent `node` had when the batch started, as far as the records
    /// tell: the recorded original parent, nothing for a node first seen
    /// being added, and the live parent otherwise.
    pub fn old_parent<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> Option<N> {
        if let Some(change) = self.changes.get(node).filter(|c| c.child_list) {
            if change.old_parent.is_some() {
                return change.old_parent;
            }
            if change.added {
                return None;
            }
        }
        tree.parent(node)
    }

    pub fn is_reachable<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> bool {
        resolve_chain(&self.reachable, self.root, node, |n| tree.parent(n))
    }

    pub fn was_reachable<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> bool {
        resolve_chain(&self.was_reachable, self.root, node, |n| {
            self.old_parent(tree, n)
        })
    }

    pub fn reachability_change<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> Movement {
        match (self.was_reachable(tree, node), self.is_reachable(tree, node)) {
            (true, true) => Movement::StayedIn,
            (true, false) => Movement::Exited,
            (false, true) => Movement::Entered,
            (false, false) => Movement::StayedOut,
        }
    }
}

/// Walk `up` from `node` until the root, a dead end, or a cached answer, then
/// cache the answer for every node on the way.
///
/// Nodes on the current walk are provisionally cached as unreachable so that
/// inconsistent records forming a parent cycle resolve to `false`.
fn resolve_chain<N: Copy + Eq + Hash>(
    cache: &RefCell<NodeMap<N, bool>>,
    root: N,
    node: N,
    mut up: impl FnMut(N) -> Option<N>,
) -> bool {
    let mut cache = cache.borrow_mut();
    let mut walked = Vec::new();
    let mut current = Some(node);
    let answer = loop {
        match current {
            None => break false,
            Some(n) if n == root => break true,
            Some(n) => {
                if let Some(&known) = cache.get(n) {
                    break known;
                }
                cache.insert(n, false);
                walked.push(n);
                current = up(n);
            }
        }
    };
    for n in walked {
        cache.insert(n, answer);
    }
    answer
}

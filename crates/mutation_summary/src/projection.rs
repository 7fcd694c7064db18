//! Net effect of one batch of records on the observed subtree.
//!
//! Invariants:
//! - Every node touched by a record is classified once by its reachability
//!   from the root before and after the batch; a node whose own parent did
//!   not change inherits the class of the node it was reached through.
//! - Subtrees that entered or exited are walked in their current shape;
//!   nodes that stayed in are never descended into, since anything that
//!   changed below them was touched by a record of its own.
//! - Old values are the ones from the first record of their kind.

use crate::Movement;
use crate::child_list::ChildListChange;
use crate::error::QueryError;
use crate::node_map::NodeMap;
use crate::selector::Selector;
use crate::tree_changes::TreeChanges;
use core_types::{MutationRecord, NodeType, TreeView};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// What a projection needs to work out beyond the default net changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Tell reordered children apart from ones that merely stayed.
    pub calc_reordered: bool,
    /// Answer old previous siblings for every removed and reparented node,
    /// including ones whose old parent left the observed subtree.
    pub calc_old_previous_sibling: bool,
}

/// Nodes that changed relative to one element filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChangedNodes<N> {
    pub(crate) added: Vec<N>,
    pub(crate) removed: Vec<N>,
    pub(crate) reparented: Vec<N>,
    pub(crate) reordered: Vec<N>,
}

/// Which nodes count for a query.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Filter<'a> {
    Everything,
    Elements(&'a [Selector]),
    CharacterData,
}

fn children_of<T: TreeView>(tree: &T, parent: T::Node) -> Vec<T::Node> {
    let mut children = Vec::new();
    let mut child = tree.first_child(parent);
    while let Some(node) = child {
        children.push(node);
        child = tree.next_sibling(node);
    }
    children
}

pub struct MutationProjection<N> {
    options: ProjectionOptions,
    tree_changes: TreeChanges<N>,
    entered: Vec<N>,
    exited: Vec<N>,
    stayed_in: NodeMap<N, Movement>,
    visited: HashSet<N>,
    child_lists: Option<HashMap<N, ChildListChange<N>>>,
    match_cache: RefCell<HashMap<Selector, HashMap<N, Movement>>>,
}

impl<N: Copy + Eq + Hash + std::fmt::Debug> MutationProjection<N> {
    /// Fold `records` against the current state of `tree`.
    ///
    /// The tree must not have changed since the last record was queued.
    pub fn new<T: TreeView<Node = N>>(
        tree: &T,
        root: N,
        records: &[MutationRecord<N>],
        options: ProjectionOptions,
    ) -> Self {
        let tree_changes = TreeChanges::new(tree, root, records);
        let mut this = Self {
            options,
            tree_changes,
            entered: Vec::new(),
            exited: Vec::new(),
            stayed_in: NodeMap::new(),
            visited: HashSet::new(),
            child_lists: None,
            match_cache: RefCell::new(HashMap::new()),
        };

        if !this.tree_changes.any_parents_changed && !this.tree_changes.any_attributes_changed {
            return this;
        }
        if this.tree_changes.any_parents_changed
            && (options.calc_reordered || options.calc_old_previous_sibling)
        {
            this.child_lists = Some(this.collect_child_lists(tree, records));
        }

        let touched: Vec<N> = this.tree_changes.keys().collect();
        for node in touched {
            this.visit(tree, node);
        }
        log::debug!(
            target: "mutation_summary.projection",
            "{} records: {} entered, {} exited, {} stayed in",
            records.len(),
            this.entered.len(),
            this.exited.len(),
            this.stayed_in.len()
        );
        this
    }

    fn collect_child_lists<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        records: &[MutationRecord<N>],
    ) -> HashMap<N, ChildListChange<N>> {
        let mut by_parent: NodeMap<N, Vec<&MutationRecord<N>>> = NodeMap::new();
        for record in records {
            let MutationRecord::ChildList { target, .. } = record else {
                continue;
            };
            if !self.options.calc_old_previous_sibling
                && self.tree_changes.reachability_change(tree, *target) != Movement::StayedIn
            {
                continue;
            }
            by_parent
                .get_or_insert_with(*target, Vec::new)
                .push(record);
        }
        by_parent
            .iter()
            .map(|(parent, records)| (parent, ChildListChange::build(tree, parent, records)))
            .collect()
    }

    fn visit<T: TreeView<Node = N>>(&mut self, tree: &T, start: N) {
        let mut pending = vec![(start, None)];
        while let Some((node, inherited)) = pending.pop() {
            if !self.visited.insert(node) {
                continue;
            }
            let parent_changed = self
                .tree_changes
                .get(node)
                .is_some_and(|change| change.child_list);
            let reachable = match inherited {
                Some(movement) if !parent_changed => movement,
                _ => self.tree_changes.reachability_change(tree, node),
            };
            log::trace!(target: "mutation_summary.projection", "{node:?}: {reachable:?}");

            match reachable {
                Movement::StayedOut => continue,
                Movement::Entered => self.entered.push(node),
                Movement::Exited => self.exited.push(node),
                _ => {
                    let movement = if parent_changed {
                        self.stayed_in_movement(tree, node)
                    } else {
                        Movement::StayedIn
                    };
                    self.stayed_in.insert(node, movement);
                    continue;
                }
            }

            let children = children_of(tree, node);
            pending.extend(children.into_iter().rev().map(|child| (child, Some(reachable))));
        }
    }

    fn stayed_in_movement<T: TreeView<Node = N>>(&mut self, tree: &T, node: N) -> Movement {
        let old_parent = self.tree_changes.get(node).and_then(|c| c.old_parent);
        let parent = tree.parent(node);
        if old_parent != parent {
            return Movement::Reparented;
        }
        if !self.options.calc_reordered {
            return Movement::StayedIn;
        }
        let moved = parent
            .and_then(|p| self.child_lists.as_mut()?.get_mut(&p))
            .is_some_and(|change| change.was_moved(tree, node));
        if moved {
            Movement::Reordered
        } else {
            Movement::StayedIn
        }
    }

    fn selector_change<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        selector: &Selector,
        element: N,
    ) -> Movement {
        if let Some(known) = self
            .match_cache
            .borrow()
            .get(selector)
            .and_then(|cached| cached.get(&element))
        {
            return *known;
        }
        let movement =
            selector.matchability_change(tree, element, self.tree_changes.get(element));
        self.match_cache
            .borrow_mut()
            .entry(selector.clone())
            .or_default()
            .insert(element, movement);
        movement
    }

    /// How `node` moved relative to `filter`. With several selectors the
    /// element counts as matching if any selector matched; entering one and
    /// exiting another counts as staying.
    pub(crate) fn matchability_change<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        node: N,
        filter: Filter<'_>,
    ) -> Movement {
        let selectors = match filter {
            Filter::CharacterData => {
                return if tree.node_type(node).is_character_data() {
                    Movement::StayedIn
                } else {
                    Movement::StayedOut
                };
            }
            Filter::Everything => return Movement::StayedIn,
            Filter::Elements(selectors) => selectors,
        };
        if tree.node_type(node) != NodeType::Element {
            return Movement::StayedOut;
        }

        let mut accumulated = Movement::StayedOut;
        for selector in selectors {
            if accumulated == Movement::StayedIn {
                break;
            }
            accumulated = match (self.selector_change(tree, selector, node), accumulated) {
                (Movement::StayedIn, _) => Movement::StayedIn,
                (Movement::Entered, Movement::Exited) => Movement::StayedIn,
                (Movement::Entered, _) => Movement::Entered,
                (Movement::Exited, Movement::Entered) => Movement::StayedIn,
                (Movement::Exited, _) => Movement::Exited,
                (_, accumulated) => accumulated,
            };
        }
        accumulated
    }

    pub(crate) fn changed<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        filter: Filter<'_>,
    ) -> ChangedNodes<N> {
        let mut changed = ChangedNodes {
            added: Vec::new(),
            removed: Vec::new(),
            reparented: Vec::new(),
            reordered: Vec::new(),
        };

        for &node in &self.entered {
            let matchability = self.matchability_change(tree, node, filter);
            if matches!(matchability, Movement::Entered | Movement::StayedIn) {
                changed.added.push(node);
            }
        }

        for (node, &movement) in self.stayed_in.iter() {
            match (self.matchability_change(tree, node, filter), movement) {
                (Movement::Entered, _) => changed.added.push(node),
                (Movement::Exited, _) => changed.removed.push(node),
                (Movement::StayedIn, Movement::Reparented) => changed.reparented.push(node),
                (Movement::StayedIn, Movement::Reordered) => changed.reordered.push(node),
                _ => {}
            }
        }

        for &node in &self.exited {
            let matchability = self.matchability_change(tree, node, filter);
            if matches!(matchability, Movement::Exited | Movement::StayedIn) {
                changed.removed.push(node);
            }
        }
        changed
    }

    /// Elements that stayed in and kept matching `filter`, grouped by
    /// changed attribute name. Attributes whose final value equals the old
    /// one are left out.
    ///
    /// With `include`, only those names are reported, under the spelling
    /// given in `include` when the element compares names case-insensitively.
    pub(crate) fn attribute_changed_nodes<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        include: Option<&[String]>,
        filter: Filter<'_>,
    ) -> BTreeMap<String, Vec<N>> {
        let mut result: BTreeMap<String, Vec<N>> = BTreeMap::new();
        if !self.tree_changes.any_attributes_changed {
            return result;
        }
        let spelled: Option<HashMap<String, &str>> = include.map(|names| {
            names
                .iter()
                .map(|name| (name.to_ascii_lowercase(), name.as_str()))
                .collect()
        });

        for node in self.tree_changes.keys() {
            let Some(change) = self.tree_changes.get(node).filter(|c| c.attributes) else {
                continue;
            };
            if self.tree_changes.reachability_change(tree, node) != Movement::StayedIn
                || self.matchability_change(tree, node, filter) != Movement::StayedIn
            {
                continue;
            }
            for name in change.attribute_names_mutated() {
                let mut reported = name;
                if let (Some(include), Some(spelled)) = (include, &spelled) {
                    let given = spelled.get(name).copied();
                    let folds = change.is_case_insensitive();
                    if !include.iter().any(|n| n == name) && !(folds && given.is_some()) {
                        continue;
                    }
                    if folds {
                        reported = given.unwrap_or(name);
                    }
                }
                let old_value = change.attribute_old_value(name).flatten();
                if old_value == tree.attribute(node, name) {
                    continue;
                }
                result.entry(reported.to_string()).or_default().push(node);
            }
        }
        result
    }

    /// Text and comment nodes that stayed in and whose text differs from
    /// what it was when the batch started.
    pub(crate) fn character_data_changed<T: TreeView<Node = N>>(&self, tree: &T) -> Vec<N> {
        if !self.tree_changes.any_character_data_changed {
            return Vec::new();
        }
        self.tree_changes
            .keys()
            .filter(|&node| {
                self.tree_changes
                    .get(node)
                    .is_some_and(|change| change.character_data)
            })
            .filter(|&node| {
                self.tree_changes.reachability_change(tree, node) == Movement::StayedIn
            })
            .filter(|&node| {
                let old = self
                    .tree_changes
                    .get(node)
                    .and_then(|change| change.character_data_old_value());
                tree.character_data(node) != old
            })
            .collect()
    }

    /// The parent `node` had when the batch started.
    pub fn old_parent_node<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        node: N,
    ) -> Result<Option<N>, QueryError> {
        if let Some(change) = self.tree_changes.get(node).filter(|c| c.child_list) {
            return Ok(change.old_parent);
        }
        match self.tree_changes.reachability_change(tree, node) {
            Movement::StayedOut | Movement::Entered => Err(QueryError::OldParentNode),
            _ => Ok(tree.parent(node)),
        }
    }

    /// The value attribute `name` had when the batch started; `None` when it
    /// was absent.
    pub fn old_attribute(&self, node: N, name: &str) -> Result<Option<&str>, QueryError> {
        let change = self
            .tree_changes
            .get(node)
            .filter(|c| c.attributes)
            .ok_or(QueryError::OldAttributeNode)?;
        change
            .attribute_old_value(name)
            .ok_or_else(|| QueryError::UnchangedAttribute(name.to_string()))
    }

    /// The text `node` had when the batch started, if the observer captured
    /// it.
    pub fn old_character_data(&self, node: N) -> Result<Option<&str>, QueryError> {
        self.tree_changes
            .get(node)
            .filter(|c| c.character_data)
            .map(|change| change.character_data_old_value())
            .ok_or(QueryError::OldCharacterData)
    }

    /// The sibling right before `node` when the batch started.
    ///
    /// Parents with child-list records answer from their rewound child
    /// list. With `calc_old_previous_sibling`, a parent without records
    /// answers from the live tree, since its children are as they were.
    pub fn old_previous_sibling<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        node: N,
    ) -> Result<Option<N>, QueryError> {
        let old_parent = match self.tree_changes.get(node).filter(|c| c.child_list) {
            Some(change) => change.old_parent,
            None => tree.parent(node),
        };
        let parent = old_parent.ok_or(QueryError::OldPreviousSibling)?;
        let answer = match self.child_lists.as_ref().and_then(|lists| lists.get(&parent)) {
            Some(change) => change.old_previous_sibling(tree, node),
            None if self.options.calc_old_previous_sibling && tree.parent(node) == Some(parent) => {
                Some(tree.previous_sibling(node))
            }
            None => None,
        };
        answer.ok_or(QueryError::OldPreviousSibling)
    }
}

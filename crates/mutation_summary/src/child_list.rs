//! Child-list bookkeeping for one parent: which children were added, removed
//! or possibly moved, the child order at the start of the batch, and which
//! surviving children count as moved.
//!
//! Invariants:
//! - The batch-start order is a doubly linked list that starts out as the
//!   live child list and is rewound by undoing the parent's records from last
//!   to first. Only links that differ from the live tree are stored; every
//!   other child reads its neighbours from the tree, so the cost follows the
//!   records, not the number of children.
//! - A child counts as moved only if it was removed and re-inserted here and
//!   the other surviving children cannot explain its new position. Between
//!   two children that never left, the kept candidates are the longest run
//!   still in old relative order; ties keep the candidate that comes first
//!   now.

use core_types::{MutationRecord, TreeView};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Link<N> {
    previous: Option<N>,
    next: Option<N>,
}

#[derive(Debug)]
pub(crate) struct ChildListChange<N> {
    parent: N,
    maybe_moved: HashSet<N>,
    /// Batch-start links that may differ from the live tree. `None` marks a
    /// node that was not a child when the batch started.
    links: HashMap<N, Option<Link<N>>>,
    first: Option<N>,
    last: Option<N>,
    moved: HashMap<N, bool>,
}

impl<N: Copy + Eq + Hash + std::fmt::Debug> ChildListChange<N> {
    /// `records` are the child-list records targeting `parent`, in order.
    pub(crate) fn build<T: TreeView<Node = N>>(
        tree: &T,
        parent: N,
        records: &[&MutationRecord<N>],
    ) -> Self {
        let mut added = HashSet::new();
        let mut removed = HashSet::new();
        let mut maybe_moved = HashSet::new();
        for record in records {
            let MutationRecord::ChildList {
                added: inserted,
                removed: taken,
                ..
            } = record
            else {
                continue;
            };
            for &node in taken {
                if !added.remove(&node) {
                    removed.insert(node);
                    maybe_moved.remove(&node);
                }
            }
            for &node in inserted {
                if removed.remove(&node) {
                    maybe_moved.insert(node);
                } else {
                    added.insert(node);
                }
            }
        }

        let mut change = Self {
            parent,
            maybe_moved,
            links: HashMap::new(),
            first: tree.first_child(parent),
            last: tree.last_child(parent),
            moved: HashMap::new(),
        };
        for record in records.iter().rev() {
            change.undo(tree, record);
        }
        change
    }

    /// The sibling right before `node` when the batch started. `None` when
    /// `node` was not a child then; `Some(None)` when it was the first child.
    pub(crate) fn old_previous_sibling<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        node: N,
    ) -> Option<Option<N>> {
        self.link(tree, node).map(|link| link.previous)
    }

    /// Whether `node`, a current child, moved among its surviving siblings.
    pub(crate) fn was_moved<T: TreeView<Node = N>>(&mut self, tree: &T, node: N) -> bool {
        if !self.is_candidate(tree, node) {
            return false;
        }
        if let Some(&moved) = self.moved.get(&node) {
            return moved;
        }
        self.settle_around(tree, node);
        self.moved.get(&node).copied().unwrap_or(false)
    }

    fn link<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> Option<Link<N>> {
        match self.links.get(&node) {
            Some(link) => *link,
            None => (tree.parent(node) == Some(self.parent)).then(|| Link {
                previous: tree.previous_sibling(node),
                next: tree.next_sibling(node),
            }),
        }
    }

    fn set_next<T: TreeView<Node = N>>(&mut self, tree: &T, node: Option<N>, next: Option<N>) {
        let Some(node) = node else {
            self.first = next;
            return;
        };
        if let Some(mut link) = self.link(tree, node) {
            link.next = next;
            self.links.insert(node, Some(link));
        }
    }

    fn set_previous<T: TreeView<Node = N>>(
        &mut self,
        tree: &T,
        node: Option<N>,
        previous: Option<N>,
    ) {
        let Some(node) = node else {
            self.last = previous;
            return;
        };
        if let Some(mut link) = self.link(tree, node) {
            link.previous = previous;
            self.links.insert(node, Some(link));
        }
    }

    fn unlink<T: TreeView<Node = N>>(&mut self, tree: &T, node: N) {
        let Some(link) = self.link(tree, node) else {
            return;
        };
        self.set_next(tree, link.previous, link.next);
        self.set_previous(tree, link.next, link.previous);
        self.links.insert(node, None);
    }

    /// Put `node` right after `after`, or first when `after` is `None`.
    fn insert_after<T: TreeView<Node = N>>(&mut self, tree: &T, after: Option<N>, node: N) {
        if after == Some(node) {
            return;
        }
        self.unlink(tree, node);
        let next = match after {
            Some(after) => self.link(tree, after).and_then(|link| link.next),
            None => self.first,
        };
        self.set_next(tree, after, Some(node));
        self.set_previous(tree, next, Some(node));
        self.links.insert(
            node,
            Some(Link {
                previous: after,
                next,
            }),
        );
    }

    /// Turn the list from the state right after `record` into the state
    /// right before it. A missing anchor falls back to the next sibling,
    /// then to the end of the list.
    fn undo<T: TreeView<Node = N>>(&mut self, tree: &T, record: &MutationRecord<N>) {
        let MutationRecord::ChildList {
            added,
            removed,
            previous_sibling,
            next_sibling,
            ..
        } = record
        else {
            return;
        };
        for &node in added.iter().chain(removed) {
            self.unlink(tree, node);
        }
        let anchor = match *previous_sibling {
            None => Some(None),
            Some(previous) => self.link(tree, previous).map(|_| Some(previous)),
        };
        let mut after = anchor
            .or_else(|| {
                let next = (*next_sibling)?;
                self.link(tree, next).map(|link| link.previous)
            })
            .unwrap_or(self.last);
        for &node in removed {
            self.insert_after(tree, after, node);
            after = Some(node);
        }
    }

    fn was_child<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> bool {
        tree.parent(node) == Some(self.parent) && self.link(tree, node).is_some()
    }

    /// A child now and then that never left in between.
    fn is_fixed<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> bool {
        !self.maybe_moved.contains(&node) && self.was_child(tree, node)
    }

    /// A child now and then that was taken out and put back.
    fn is_candidate<T: TreeView<Node = N>>(&self, tree: &T, node: N) -> bool {
        self.maybe_moved.contains(&node) && self.was_child(tree, node)
    }

    /// Decide every candidate between the fixed children around `node`.
    ///
    /// Fixed children keep their relative order, so the same pair bounds
    /// the stretch in the old list; everything walked is a touched node.
    fn settle_around<T: TreeView<Node = N>>(&mut self, tree: &T, node: N) {
        let mut segment = vec![node];
        let mut lower = None;
        let mut cursor = tree.previous_sibling(node);
        while let Some(sibling) = cursor {
            if self.is_fixed(tree, sibling) {
                lower = Some(sibling);
                break;
            }
            if self.is_candidate(tree, sibling) {
                segment.push(sibling);
            }
            cursor = tree.previous_sibling(sibling);
        }
        segment.reverse();
        cursor = tree.next_sibling(node);
        while let Some(sibling) = cursor {
            if self.is_fixed(tree, sibling) {
                break;
            }
            if self.is_candidate(tree, sibling) {
                segment.push(sibling);
            }
            cursor = tree.next_sibling(sibling);
        }

        let mut old_order = HashMap::new();
        let mut cursor = match lower {
            Some(lower) => self.link(tree, lower).and_then(|link| link.next),
            None => self.first,
        };
        while let Some(sibling) = cursor {
            if self.is_fixed(tree, sibling) {
                break;
            }
            old_order.insert(sibling, old_order.len());
            cursor = self.link(tree, sibling).and_then(|link| link.next);
        }

        let decisions = settle_segment(&segment, &old_order);
        log::trace!(
            target: "mutation_summary.reorder",
            "{:?}: {} of {} candidates moved",
            self.parent,
            decisions.iter().filter(|(_, moved)| *moved).count(),
            decisions.len()
        );
        self.moved.extend(decisions);
    }

    #[cfg(test)]
    fn old_children<T: TreeView<Node = N>>(&self, tree: &T) -> Vec<N> {
        let mut children = Vec::new();
        let mut cursor = self.first;
        while let Some(node) = cursor {
            children.push(node);
            cursor = self.link(tree, node).and_then(|link| link.next);
        }
        children
    }
}

/// Decide which candidates of one run between two fixed children moved.
///
/// `segment` holds the candidates in current order; `old_order` ranks the
/// old children between the same two fixed children. Candidates missing
/// from it were outside those bounds and always move.
fn settle_segment<N: Copy + Eq + Hash>(
    segment: &[N],
    old_order: &HashMap<N, usize>,
) -> Vec<(N, bool)> {
    let eligible: Vec<(N, usize)> = segment
        .iter()
        .filter_map(|node| old_order.get(node).map(|&index| (*node, index)))
        .collect();
    let indexes: Vec<usize> = eligible.iter().map(|&(_, index)| index).collect();
    let kept: HashSet<N> = eligible
        .iter()
        .zip(earliest_increasing_run(&indexes))
        .filter(|(_, keep)| *keep)
        .map(|(&(node, _), _)| node)
        .collect();
    segment
        .iter()
        .map(|&node| (node, !kept.contains(&node)))
        .collect()
}

/// Mark a longest strictly increasing subsequence of `values`, choosing the
/// one whose positions are lexicographically smallest.
fn earliest_increasing_run(values: &[usize]) -> Vec<bool> {
    // longest[i]: length of the longest increasing run starting at i.
    let mut longest = vec![0; values.len()];
    // best[l]: largest first value of a run of length l + 1 seen so far;
    // strictly decreasing in l.
    let mut best: Vec<usize> = Vec::new();
    for i in (0..values.len()).rev() {
        let value = values[i];
        let extendable = best.partition_point(|&b| b > value);
        longest[i] = extendable + 1;
        if extendable == best.len() {
            best.push(value);
        } else {
            best[extendable] = value;
        }
    }

    let mut keep = vec![false; values.len()];
    let mut needed = best.len();
    let mut last: Option<usize> = None;
    for (i, &value) in values.iter().enumerate() {
        if needed == 0 {
            break;
        }
        if longest[i] == needed && last.is_none_or(|l| value > l) {
            keep[i] = true;
            last = Some(value);
            needed -= 1;
        }
    }
    keep
}

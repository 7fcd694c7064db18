//! Node-keyed map with deterministic, first-use iteration order.

use std::collections::HashMap;
use std::hash::Hash;

/// Map keyed by node identity.
///
/// Each node gets a dense slot the first time it is used; iteration follows
/// slot order, so keys come out in first-use order even after a removal and
/// re-insertion.
#[derive(Clone, Debug)]
pub struct NodeMap<N, V> {
    index: HashMap<N, usize>,
    slots: Vec<(N, Option<V>)>,
    len: usize,
}

impl<N: Copy + Eq + Hash, V> NodeMap<N, V> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&mut self, node: N) -> usize {
        let slots = &mut self.slots;
        *self.index.entry(node).or_insert_with(|| {
            slots.push((node, None));
            slots.len() - 1
        })
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, node: N, value: V) -> Option<V> {
        let slot = self.slot(node);
        let previous = self.slots[slot].1.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn get(&self, node: N) -> Option<&V> {
        let slot = *self.index.get(&node)?;
        self.slots[slot].1.as_ref()
    }

    pub fn get_mut(&mut self, node: N) -> Option<&mut V> {
        let slot = *self.index.get(&node)?;
        self.slots[slot].1.as_mut()
    }

    pub fn get_or_insert_with(&mut self, node: N, make: impl FnOnce() -> V) -> &mut V {
        let slot = self.slot(node);
        let value = &mut self.slots[slot].1;
        if value.is_none() {
            self.len += 1;
        }
        value.get_or_insert_with(make)
    }

    pub fn contains(&self, node: N) -> bool {
        self.get(node).is_some()
    }

    pub fn remove(&mut self, node: N) -> Option<V> {
        let slot = *self.index.get(&node)?;
        let removed = self.slots[slot].1.take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Keys currently set, in first-use order.
    pub fn keys(&self) -> impl Iterator<Item = N> + '_ {
        self.iter().map(|(node, _)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (N, &V)> + '_ {
        self.slots
            .iter()
            .filter_map(|(node, value)| value.as_ref().map(|v| (*node, v)))
    }
}

impl<N: Copy + Eq + Hash, V> Default for NodeMap<N, V> {
    fn default() -> Self {
        Self::new()
    }
}

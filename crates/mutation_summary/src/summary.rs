use crate::error::QueryError;
use crate::options::Query;
use crate::projection::{Filter, MutationProjection};
use core_types::TreeView;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Net changes of one batch for one query.
///
/// Lists that the query's shape does not cover are `None`. Old-value
/// accessors answer from the batch the summary was built from; all summaries
/// of one delivery share that state.
#[derive(Clone)]
pub struct Summary<N> {
    added: Vec<N>,
    removed: Vec<N>,
    reparented: Option<Vec<N>>,
    reordered: Option<Vec<N>>,
    value_changed: Option<Vec<N>>,
    attribute_changed: Option<BTreeMap<String, Vec<N>>>,
    character_data_changed: Option<Vec<N>>,
    projection: Rc<MutationProjection<N>>,
}

impl<N: Copy + Eq + Hash + fmt::Debug> Summary<N> {
    pub(crate) fn new<T: TreeView<Node = N>>(
        projection: Rc<MutationProjection<N>>,
        tree: &T,
        query: &Query,
    ) -> Self {
        let filter = match query {
            Query::All => Filter::Everything,
            Query::CharacterData => Filter::CharacterData,
            _ => query
                .element_filter()
                .map_or(Filter::Everything, Filter::Elements),
        };
        let changed = projection.changed(tree, filter);

        let reparented = match query {
            Query::Attribute { .. } => None,
            _ => Some(changed.reparented),
        };
        let reordered = matches!(query, Query::All).then_some(changed.reordered);

        let mut value_changed = None;
        let mut attribute_changed = None;
        let mut character_data_changed = None;
        match query {
            Query::All => {
                attribute_changed = Some(projection.attribute_changed_nodes(tree, None, filter));
                character_data_changed = Some(projection.character_data_changed(tree));
            }
            Query::Attribute { name, .. } => {
                let include = std::slice::from_ref(name);
                let mut by_name = projection.attribute_changed_nodes(tree, Some(include), filter);
                value_changed = Some(by_name.remove(name).unwrap_or_default());
            }
            Query::Element {
                attributes: Some(attributes),
                ..
            } => {
                let mut by_name =
                    projection.attribute_changed_nodes(tree, Some(attributes), filter);
                for name in attributes {
                    by_name.entry(name.clone()).or_default();
                }
                attribute_changed = Some(by_name);
            }
            Query::Element { .. } => {}
            Query::CharacterData => {
                value_changed = Some(projection.character_data_changed(tree));
            }
        }

        Self {
            added: changed.added,
            removed: changed.removed,
            reparented,
            reordered,
            value_changed,
            attribute_changed,
            character_data_changed,
            projection,
        }
    }

    /// Nodes now matching that did not match, or were not reachable, before.
    pub fn added(&self) -> &[N] {
        &self.added
    }

    /// Nodes that matched and were reachable before and no longer do or are.
    pub fn removed(&self) -> &[N] {
        &self.removed
    }

    pub fn reparented(&self) -> Option<&[N]> {
        self.reparented.as_deref()
    }

    pub fn reordered(&self) -> Option<&[N]> {
        self.reordered.as_deref()
    }

    /// Attribute or text changes, for single-attribute and character-data
    /// queries.
    pub fn value_changed(&self) -> Option<&[N]> {
        self.value_changed.as_deref()
    }

    pub fn attribute_changed(&self) -> Option<&BTreeMap<String, Vec<N>>> {
        self.attribute_changed.as_ref()
    }

    pub fn character_data_changed(&self) -> Option<&[N]> {
        self.character_data_changed.as_deref()
    }

    /// Whether any list or attribute entry is non-empty.
    pub fn has_changes(&self) -> bool {
        let lists = [
            Some(self.added.as_slice()),
            Some(self.removed.as_slice()),
            self.reparented(),
            self.reordered(),
            self.value_changed(),
            self.character_data_changed(),
        ];
        lists.into_iter().flatten().any(|list| !list.is_empty())
            || self
                .attribute_changed
                .iter()
                .flat_map(|map| map.values())
                .any(|nodes| !nodes.is_empty())
    }

    pub fn old_parent_node<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        node: N,
    ) -> Result<Option<N>, QueryError> {
        self.projection.old_parent_node(tree, node)
    }

    pub fn old_attribute(&self, node: N, name: &str) -> Result<Option<&str>, QueryError> {
        self.projection.old_attribute(node, name)
    }

    pub fn old_character_data(&self, node: N) -> Result<Option<&str>, QueryError> {
        self.projection.old_character_data(node)
    }

    /// Answered for every removed and reparented node when the summary was
    /// connected with `old_previous_sibling`, and for reordered nodes of
    /// `all` queries.
    pub fn old_previous_sibling<T: TreeView<Node = N>>(
        &self,
        tree: &T,
        node: N,
    ) -> Result<Option<N>, QueryError> {
        self.projection.old_previous_sibling(tree, node)
    }
}

impl<N: fmt::Debug> fmt::Debug for Summary<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summary")
            .field("added", &self.added)
            .field("removed", &self.removed)
            .field("reparented", &self.reparented)
            .field("reordered", &self.reordered)
            .field("value_changed", &self.value_changed)
            .field("attribute_changed", &self.attribute_changed)
            .field("character_data_changed", &self.character_data_changed)
            .finish_non_exhaustive()
    }
}

/// Whether any summary of a delivery has something to report.
pub fn changes_to_report<N: Copy + Eq + Hash + fmt::Debug>(summaries: &[Summary<N>]) -> bool {
    summaries.iter().any(Summary::has_changes)
}

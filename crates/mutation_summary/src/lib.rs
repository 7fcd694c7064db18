//! Net-change summaries over batches of tree mutation records.
//!
//! A [`MutationSummary`] registers one observer on a
//! [`MutationSource`](core_types::MutationSource), and for every batch of
//! records reports, per query, which nodes were added, removed, reparented
//! or reordered and which attribute and text values changed, measured
//! between the start and the end of the batch. Intermediate states are not
//! reported: a node added and removed again within one batch never shows up.

mod child_list;
mod error;
mod node_map;
mod observer;
mod options;
mod projection;
mod selector;
mod summary;
mod tree_changes;

pub use error::{ConfigError, QueryError, SelectorError, StateError};
pub use node_map::NodeMap;
pub use observer::{MutationFilter, MutationSummary, MutationSummaryBuilder, SummaryCallback};
pub use options::{
    Query, QuerySpec, SummaryOptions, observe_init_for, validate_attribute,
    validate_element_attributes,
};
pub use projection::{MutationProjection, ProjectionOptions};
pub use selector::{Qualifier, Selector, parse_selectors};
pub use summary::{Summary, changes_to_report};
pub use tree_changes::{NodeChange, TreeChanges};

/// How a node's membership in a set changed over a batch: reachable from
/// the root, or matching a filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Movement {
    /// Out before and after.
    StayedOut,
    /// Out before, in after.
    Entered,
    /// In before and after, same parent, same place.
    StayedIn,
    /// In before and after, under a different parent.
    Reparented,
    /// In before and after, same parent, moved among its siblings.
    Reordered,
    /// In before, out after.
    Exited,
}

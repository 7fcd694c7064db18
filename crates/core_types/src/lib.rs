//! # core_types
//!
//! Host-tree contracts shared by the mutation summary engine and the trees it
//! observes.
//!
//! - [`TreeView`]: read-only access to the live tree structure
//! - [`MutationSource`]: a native-style mutation observation facility
//! - [`MutationRecord`]: the three kinds of low-level mutation record
//! - [`ObserveInit`]: what a registered observer asks to be told about
//!
//! Node handles are opaque to this crate. Any `Copy + Eq + Hash` identifier
//! works, so an arena index, a pointer wrapper, or a foreign key can all be
//! used by integration layers.

mod record;
mod source;
mod tree;

pub use record::MutationRecord;
pub use source::{MutationSource, ObserveInit, ObserverId};
pub use tree::{NodeType, TreeView};

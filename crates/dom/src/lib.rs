//! Reference host tree for the mutation summary engine.
//!
//! [`Document`] is an arena-backed node tree with HTML or XML naming rules
//! and a native-style mutation observation facility: registered observers get
//! [`MutationRecord`](core_types::MutationRecord)s queued as the tree changes
//! and drain them through [`MutationSource`](core_types::MutationSource).
//!
//! [`TreeOp`] is a small scripted mutation language used by fixtures, the
//! replay CLI and the fuzzer to drive a document by node name.

mod document;
mod observer;
mod ops;
mod traverse;

pub use document::{Document, DocumentKind, DomError, NodeId};
pub use ops::{NodeNames, OpError, TreeOp, apply_ops};
pub use traverse::{TreeDump, descendants, inclusive_descendants};

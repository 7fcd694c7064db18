//! TOML scenarios: a scripted tree, summary options, and batches of
//! operations replayed one delivery at a time.
//!
//! ```toml
//! kind = "html"
//!
//! [options]
//! queries = [{ element = "p" }]
//!
//! [[setup]]
//! op = "element"
//! key = "root"
//! tag = "div"
//!
//! [[setup]]
//! op = "append"
//! parent = "document"
//! child = "root"
//!
//! [[batch]]
//! expect = ["0 added: p1"]
//! ops = [
//!   { op = "element", key = "p1", tag = "p" },
//!   { op = "append", parent = "root", child = "p1" },
//! ]
//! ```
//!
//! The observed root is the node named `root`, or the document when no
//! setup operation binds that name.

use crate::render::{RenderedSummary, delivery_lines};
use crate::validator::{SnapshotValidator, ValidationMismatch};
use crate::diff_lines;
use dom::{Document, DocumentKind, NodeId, NodeNames, OpError, TreeDump, TreeOp, apply_ops};
use mutation_summary::{ConfigError, MutationSummary, StateError, Summary, SummaryOptions};
use serde::Deserialize;
use std::cell::RefCell;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("operation failed: {0}")]
    Op(#[from] OpError),
    #[error("invalid summary options: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("batch {batch}: reported summaries differ from the expectation:\n{diff}")]
    Expectation { batch: usize, diff: String },
    #[error("batch {batch}, query {query}: {source}")]
    Validation {
        batch: usize,
        query: usize,
        #[source]
        source: ValidationMismatch,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: DocumentKind,
    #[serde(default)]
    pub setup: Vec<TreeOp>,
    pub options: SummaryOptions,
    #[serde(default, rename = "batch")]
    pub batches: Vec<Batch>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Batch {
    #[serde(default)]
    pub ops: Vec<TreeOp>,
    /// Rendered lines of the delivery, see [`RenderedSummary::lines`]. An
    /// empty list expects no delivery at all.
    #[serde(default)]
    pub expect: Option<Vec<String>>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// `origin` only names the source in errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, FixtureError> {
        toml::from_str(text).map_err(|err| FixtureError::Parse {
            path: origin.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// What one batch delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch: usize,
    /// `None` when nothing was worth reporting and the callback did not run.
    pub summaries: Option<Vec<RenderedSummary>>,
}

impl BatchOutcome {
    pub fn lines(&self) -> Vec<String> {
        self.summaries
            .as_deref()
            .map(delivery_lines)
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "batch": self.batch,
            "summaries": self.summaries,
        })
    }
}

type Delivered = Rc<RefCell<Option<Vec<Summary<NodeId>>>>>;

/// A scenario's document and summary, advanced one batch at a time.
pub struct Replay {
    doc: Document,
    names: NodeNames,
    root: NodeId,
    summary: MutationSummary<Document>,
    delivered: Delivered,
    next_batch: usize,
    old_previous_sibling: bool,
}

impl Replay {
    /// Build the initial tree and connect the summary.
    pub fn start(scenario: &Scenario) -> Result<Self, FixtureError> {
        let mut doc = Document::new(scenario.kind);
        let mut names = NodeNames::new();
        apply_ops(&mut doc, &mut names, &scenario.setup)?;
        let root = names.get("root").unwrap_or(NodeId::DOCUMENT);

        let delivered: Delivered = Rc::default();
        let sink = Rc::clone(&delivered);
        let summary = MutationSummary::builder()
            .root_node(root)
            .options(scenario.options.clone())
            .callback(move |summaries: &[Summary<NodeId>], _: &mut Document| {
                *sink.borrow_mut() = Some(summaries.to_vec());
                ControlFlow::Continue(())
            })
            .connect(&mut doc)?;

        Ok(Self {
            doc,
            names,
            root,
            summary,
            delivered,
            next_batch: 0,
            old_previous_sibling: scenario.options.old_previous_sibling,
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn names(&self) -> &NodeNames {
        &self.names
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn dump(&self) -> TreeDump<'_> {
        TreeDump::new(&self.doc, self.root).with_names(&self.names)
    }

    /// Apply `batch`, deliver, and optionally cross-check every summary
    /// against a snapshot taken before the batch.
    pub fn run_batch(&mut self, batch: &Batch, validate: bool) -> Result<BatchOutcome, FixtureError> {
        let index = self.next_batch;
        self.next_batch += 1;

        let validators: Vec<SnapshotValidator> = if validate {
            self.summary
                .queries()
                .iter()
                .map(|query| {
                    SnapshotValidator::record(&self.doc, self.root, query)
                        .with_old_previous_sibling(self.old_previous_sibling)
                })
                .collect()
        } else {
            Vec::new()
        };

        apply_ops(&mut self.doc, &mut self.names, &batch.ops)?;
        self.summary.deliver(&mut self.doc)?;
        let delivered = self.delivered.borrow_mut().take();

        for (query, validator) in validators.iter().enumerate() {
            let summary = delivered.as_ref().and_then(|all| all.get(query));
            validator
                .validate(&self.doc, summary, &self.names)
                .map_err(|source| FixtureError::Validation {
                    batch: index,
                    query,
                    source,
                })?;
        }

        let summaries = delivered.map(|all| {
            all.iter()
                .map(|summary| RenderedSummary::new(summary, &self.names))
                .collect()
        });
        Ok(BatchOutcome {
            batch: index,
            summaries,
        })
    }
}

/// Replay every batch, validating each one and checking the expectations
/// that are given.
pub fn run_scenario(scenario: &Scenario) -> Result<Vec<BatchOutcome>, FixtureError> {
    let mut replay = Replay::start(scenario)?;
    let mut outcomes = Vec::with_capacity(scenario.batches.len());
    for batch in &scenario.batches {
        let outcome = replay.run_batch(batch, true)?;
        if let Some(expected) = &batch.expect {
            let actual = outcome.lines();
            if *expected != actual {
                return Err(FixtureError::Expectation {
                    batch: outcome.batch,
                    diff: diff_lines(expected, &actual),
                });
            }
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

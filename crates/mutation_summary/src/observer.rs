//! Registration of a summary on a [`MutationSource`] and delivery of its
//! batches.
//!
//! Invariants:
//! - While connected, exactly one underlying registration exists, except
//!   while the callback runs for a summary that ignores its own changes.
//! - The callback only runs for deliveries with something to report.
//! - A summary that ignores its own changes is paused around its callback,
//!   so mutations the callback makes are never reported back to it.

use crate::error::{ConfigError, StateError};
use crate::options::{Config, Query, QuerySpec, SummaryOptions};
use crate::projection::{MutationProjection, ProjectionOptions};
use crate::summary::{Summary, changes_to_report};
use core_types::{MutationRecord, MutationSource, ObserveInit, ObserverId, TreeView};
use std::ops::ControlFlow;
use std::rc::Rc;

type Node<S> = <S as TreeView>::Node;

/// Called with the summaries of a delivery, one per query, and the tree
/// they describe. `ControlFlow::Break` disconnects the summary.
pub type SummaryCallback<S> = Box<dyn FnMut(&[Summary<Node<S>>], &mut S) -> ControlFlow<()>>;

/// Drops records before they are projected. Returning `false` discards the
/// record.
pub type MutationFilter<N> = Box<dyn Fn(&MutationRecord<N>) -> bool>;

pub struct MutationSummaryBuilder<S: MutationSource> {
    root: Option<Node<S>>,
    queries: Option<Vec<QuerySpec>>,
    observe_own_changes: bool,
    old_previous_sibling: bool,
    callback: Option<SummaryCallback<S>>,
    mutation_filter: Option<MutationFilter<Node<S>>>,
    unknown_options: Vec<String>,
}

impl<S: MutationSource + 'static> MutationSummaryBuilder<S> {
    fn new() -> Self {
        Self {
            root: None,
            queries: None,
            observe_own_changes: false,
            old_previous_sibling: false,
            callback: None,
            mutation_filter: None,
            unknown_options: Vec::new(),
        }
    }

    /// Observe under `root` instead of the whole document.
    pub fn root_node(mut self, root: Node<S>) -> Self {
        self.root = Some(root);
        self
    }

    pub fn query(mut self, query: QuerySpec) -> Self {
        self.queries.get_or_insert_with(Vec::new).push(query);
        self
    }

    pub fn queries(mut self, queries: Vec<QuerySpec>) -> Self {
        self.queries = Some(queries);
        self
    }

    pub fn observe_own_changes(mut self, observe: bool) -> Self {
        self.observe_own_changes = observe;
        self
    }

    pub fn old_previous_sibling(mut self, keep: bool) -> Self {
        self.old_previous_sibling = keep;
        self
    }

    /// Take queries and flags from declarative options. Unknown keys fail
    /// at [`connect`](Self::connect).
    pub fn options(mut self, options: SummaryOptions) -> Self {
        self.unknown_options
            .extend(options.unknown_keys().map(str::to_string));
        if let Some(queries) = options.queries {
            self.queries = Some(queries);
        }
        self.observe_own_changes = options.observe_own_changes;
        self.old_previous_sibling = options.old_previous_sibling;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&[Summary<Node<S>>], &mut S) -> ControlFlow<()> + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn mutation_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&MutationRecord<Node<S>>) -> bool + 'static,
    {
        self.mutation_filter = Some(Box::new(filter));
        self
    }

    /// Validate and start observing. Nothing is registered on error.
    pub fn connect(self, source: &mut S) -> Result<MutationSummary<S>, ConfigError> {
        if let Some(key) = self.unknown_options.into_iter().next() {
            return Err(ConfigError::UnknownOption(key));
        }
        let callback = self.callback.ok_or(ConfigError::MissingCallback)?;
        let queries = self.queries.ok_or(ConfigError::MissingQueries)?;
        let config = Config::new(&queries, self.observe_own_changes, self.old_previous_sibling)?;
        let root = self.root.unwrap_or_else(|| source.document());

        let mut summary = MutationSummary {
            root,
            config,
            callback,
            mutation_filter: self.mutation_filter,
            observer: None,
            connected: false,
        };
        summary.start(source);
        log::debug!(
            target: "mutation_summary.observer",
            "connected on {root:?} with {} queries",
            summary.config.queries.len()
        );
        Ok(summary)
    }
}

/// Observes a subtree and reports, per batch, the net changes each query
/// asked about.
pub struct MutationSummary<S: MutationSource> {
    root: Node<S>,
    config: Config,
    callback: SummaryCallback<S>,
    mutation_filter: Option<MutationFilter<Node<S>>>,
    observer: Option<ObserverId>,
    connected: bool,
}

impl<S: MutationSource + 'static> MutationSummary<S> {
    pub fn builder() -> MutationSummaryBuilder<S> {
        MutationSummaryBuilder::new()
    }

    pub fn root(&self) -> Node<S> {
        self.root
    }

    pub fn queries(&self) -> &[Query] {
        &self.config.queries
    }

    /// What the underlying registration watches.
    pub fn observe_init(&self) -> &ObserveInit {
        &self.config.observe_init
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn start(&mut self, source: &mut S) {
        self.observer = Some(source.observe(self.root, &self.config.observe_init));
        self.connected = true;
    }

    /// Hand the batch queued so far to the callback, if it has something to
    /// report. Returns whether the callback ran.
    pub fn deliver(&mut self, source: &mut S) -> Result<bool, StateError> {
        let observer = match self.observer {
            Some(observer) if self.connected => observer,
            _ => return Err(StateError::NotConnected),
        };
        let records = source.take_records(observer);
        if records.is_empty() {
            return Ok(false);
        }

        let pause = !self.config.observe_own_changes;
        if pause {
            source.disconnect(observer);
            self.observer = None;
        }

        let summaries = self.create_summaries(source, records);
        let report = changes_to_report(&summaries);
        let mut flow = ControlFlow::Continue(());
        if report {
            flow = (self.callback)(&summaries, source);
        }

        if flow.is_break() {
            log::debug!(target: "mutation_summary.observer", "callback asked to disconnect");
            if let Some(observer) = self.observer.take() {
                source.disconnect(observer);
            }
            self.connected = false;
        } else if pause {
            self.start(source);
        }
        Ok(report)
    }

    /// Summarize and clear whatever is queued, without calling the callback.
    /// `None` when nothing is worth reporting.
    pub fn take_summaries(
        &mut self,
        source: &mut S,
    ) -> Result<Option<Vec<Summary<Node<S>>>>, StateError> {
        if !self.connected {
            return Err(StateError::NotConnected);
        }
        let records = self
            .observer
            .map(|observer| source.take_records(observer))
            .unwrap_or_default();
        let summaries = self.create_summaries(source, records);
        Ok(changes_to_report(&summaries).then_some(summaries))
    }

    /// Stop observing, returning what was still queued.
    pub fn disconnect(
        &mut self,
        source: &mut S,
    ) -> Result<Option<Vec<Summary<Node<S>>>>, StateError> {
        let summaries = self.take_summaries(source)?;
        if let Some(observer) = self.observer.take() {
            source.disconnect(observer);
        }
        self.connected = false;
        log::debug!(target: "mutation_summary.observer", "disconnected");
        Ok(summaries)
    }

    /// Resume observing; changes made while disconnected are never reported.
    pub fn reconnect(&mut self, source: &mut S) -> Result<(), StateError> {
        if self.connected {
            return Err(StateError::AlreadyConnected);
        }
        self.start(source);
        log::debug!(target: "mutation_summary.observer", "reconnected");
        Ok(())
    }

    fn create_summaries(
        &self,
        tree: &S,
        mut records: Vec<MutationRecord<Node<S>>>,
    ) -> Vec<Summary<Node<S>>> {
        if let Some(filter) = &self.mutation_filter {
            records.retain(|record| filter(record));
        }
        let options = ProjectionOptions {
            calc_reordered: self.config.calc_reordered,
            calc_old_previous_sibling: self.config.old_previous_sibling,
        };
        let projection = Rc::new(MutationProjection::new(tree, self.root, &records, options));
        let summaries: Vec<_> = self
            .config
            .queries
            .iter()
            .map(|query| Summary::new(Rc::clone(&projection), tree, query))
            .collect();
        log::debug!(
            target: "mutation_summary.observer",
            "{} records summarized for {} queries",
            records.len(),
            summaries.len()
        );
        summaries
    }
}

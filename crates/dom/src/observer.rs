//! Observer registrations and record queues of a [`Document`](crate::Document).
//!
//! Invariants:
//! - A record is queued at most once per observer, even when several of its
//!   registrations cover the target.
//! - A registration on node `n` covers mutations of `n`, and of descendants of
//!   `n` only when its options ask for `subtree`.
//! - Removing a node from a subtree-observed tree registers the observer
//!   transiently on the removed node, so the batch still sees what happens
//!   inside the detached subtree. Transient registrations end when the
//!   observer's records are taken.

use crate::document::NodeId;
use core_types::{MutationRecord, ObserveInit, ObserverId};
use std::collections::BTreeMap;

struct Registration {
    observer: ObserverId,
    node: NodeId,
    init: ObserveInit,
    transient: bool,
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    registrations: Vec<Registration>,
    queues: BTreeMap<ObserverId, Vec<MutationRecord<NodeId>>>,
    next_id: u32,
}

impl ObserverRegistry {
    pub(crate) fn observe(&mut self, target: NodeId, init: ObserveInit) -> ObserverId {
        let observer = ObserverId(self.next_id);
        self.next_id += 1;
        log::trace!(target: "dom.observer", "observe {observer:?} on {target:?}: {init:?}");
        self.registrations.push(Registration {
            observer,
            node: target,
            init,
            transient: false,
        });
        self.queues.insert(observer, Vec::new());
        observer
    }

    pub(crate) fn disconnect(&mut self, observer: ObserverId) {
        log::trace!(target: "dom.observer", "disconnect {observer:?}");
        self.registrations.retain(|r| r.observer != observer);
        self.queues.remove(&observer);
    }

    pub(crate) fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord<NodeId>> {
        self.registrations
            .retain(|r| !(r.transient && r.observer == observer));
        self.queues
            .get_mut(&observer)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// `ancestors` are the inclusive ancestors of the removed node's old
    /// parent, nearest first.
    pub(crate) fn add_transient(&mut self, ancestors: &[NodeId], removed: NodeId) {
        let mut added = Vec::new();
        for registration in &self.registrations {
            if registration.init.subtree && ancestors.contains(&registration.node) {
                added.push(Registration {
                    observer: registration.observer,
                    node: removed,
                    init: registration.init.clone(),
                    transient: true,
                });
            }
        }
        self.registrations.extend(added);
    }

    /// `ancestors` are the inclusive ancestors of the record's target,
    /// nearest first.
    pub(crate) fn queue(&mut self, ancestors: &[NodeId], record: MutationRecord<NodeId>) {
        let Some(&target) = ancestors.first() else {
            return;
        };
        let mut interested: Vec<(ObserverId, &ObserveInit)> = Vec::new();
        for registration in &self.registrations {
            if !ancestors.contains(&registration.node) {
                continue;
            }
            if registration.node != target && !registration.init.subtree {
                continue;
            }
            if !wants(&registration.init, &record) {
                continue;
            }
            if interested.iter().any(|(id, _)| *id == registration.observer) {
                continue;
            }
            interested.push((registration.observer, &registration.init));
        }

        for (observer, init) in interested {
            log::trace!(
                target: "dom.observer",
                "queue {} record on {target:?} for {observer:?}",
                record.kind_name()
            );
            let Some(queue) = self.queues.get_mut(&observer) else {
                continue;
            };
            queue.push(shape_for(init, &record));
        }
    }
}

fn wants(init: &ObserveInit, record: &MutationRecord<NodeId>) -> bool {
    match record {
        MutationRecord::ChildList { .. } => init.child_list,
        MutationRecord::Attributes { name, .. } => init.observes_attribute(name),
        MutationRecord::CharacterData { .. } => init.character_data,
    }
}

/// Drop old values the registration did not ask for.
fn shape_for(init: &ObserveInit, record: &MutationRecord<NodeId>) -> MutationRecord<NodeId> {
    match record {
        MutationRecord::Attributes { target, name, .. } if !init.attribute_old_value => {
            MutationRecord::Attributes {
                target: *target,
                name: name.clone(),
                old_value: None,
            }
        }
        MutationRecord::CharacterData { target, .. } if !init.character_data_old_value => {
            MutationRecord::CharacterData {
                target: *target,
                old_value: None,
            }
        }
        other => other.clone(),
    }
}

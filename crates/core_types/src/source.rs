use crate::record::MutationRecord;
use crate::tree::TreeView;

/// Handle of one observer registration on a [`MutationSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// What a registration asks to be told about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObserveInit {
    pub child_list: bool,
    pub subtree: bool,
    pub attributes: bool,
    pub attribute_old_value: bool,
    /// Restrict attribute records to these names. `None` observes all.
    pub attribute_filter: Option<Vec<String>>,
    pub character_data: bool,
    pub character_data_old_value: bool,
}

impl ObserveInit {
    pub fn observes_attribute(&self, name: &str) -> bool {
        self.attributes
            && self
                .attribute_filter
                .as_ref()
                .is_none_or(|filter| filter.iter().any(|n| n == name))
    }
}

/// A tree that can queue mutation records for registered observers.
///
/// Records are queued as mutations happen and handed out in order by
/// [`take_records`](MutationSource::take_records); a batch is whatever has
/// been queued since the previous call.
pub trait MutationSource: TreeView {
    fn observe(&mut self, target: Self::Node, init: &ObserveInit) -> ObserverId;

    /// Drop the registration and any records still queued for it.
    fn disconnect(&mut self, observer: ObserverId);

    fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord<Self::Node>>;
}

/// One low-level mutation, as queued by a [`MutationSource`](crate::MutationSource).
///
/// Records of one batch are delivered in the order the mutations happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord<N> {
    /// Nodes were inserted into and/or removed from `target`'s children.
    ///
    /// `previous_sibling`/`next_sibling` bound the affected run of children.
    ChildList {
        target: N,
        added: Vec<N>,
        removed: Vec<N>,
        previous_sibling: Option<N>,
        next_sibling: Option<N>,
    },
    /// An attribute of `target` was set or removed.
    ///
    /// `old_value` is `None` if the attribute was absent before the mutation
    /// or old values were not requested.
    Attributes {
        target: N,
        name: String,
        old_value: Option<String>,
    },
    /// The text of a text or comment node changed.
    CharacterData { target: N, old_value: Option<String> },
}

impl<N: Copy> MutationRecord<N> {
    pub fn target(&self) -> N {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. }
            | MutationRecord::CharacterData { target, .. } => *target,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MutationRecord::ChildList { .. } => "childList",
            MutationRecord::Attributes { .. } => "attributes",
            MutationRecord::CharacterData { .. } => "characterData",
        }
    }
}

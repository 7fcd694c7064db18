use thiserror::Error;

/// Registration-time failures. Nothing is observed when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid option: {0}")]
    UnknownOption(String),
    #[error("invalid options: callback is required")]
    MissingCallback,
    #[error("invalid options: queries is required")]
    MissingQueries,
    #[error("invalid options: queries must contain at least one query request")]
    EmptyQueries,
    #[error("invalid request option: unknown query request")]
    UnknownQuery,
    #[error("invalid request option: {shape} query does not accept `{key}`")]
    ConflictingQuery { shape: &'static str, key: String },
    #[error("invalid request option: attribute must be a non-zero length string")]
    EmptyAttribute,
    #[error("invalid request option: invalid attribute name `{0}`")]
    InvalidAttribute(String),
    #[error("invalid request option: elementAttributes must contain at least one attribute")]
    EmptyElementAttributes,
    #[error(
        "invalid request option: observing multiple case variations of attribute `{0}` is not supported"
    )]
    CaseVariantAttributes(String),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("invalid options: {0}")]
    Deserialize(String),
}

impl ConfigError {
    /// Wrap a serde error from whatever format the options were read from.
    pub fn deserialize(err: impl std::fmt::Display) -> Self {
        ConfigError::Deserialize(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid or unsupported selector syntax at offset {position} in `{input}`")]
    Syntax { input: String, position: usize },
}

/// Misuse of an old-value accessor: the node was not changed along the
/// dimension asked about.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("old parent node requested on invalid node")]
    OldParentNode,
    #[error("old previous sibling requested on invalid node")]
    OldPreviousSibling,
    #[error("old attribute requested on invalid node")]
    OldAttributeNode,
    #[error("old attribute requested for unchanged attribute name `{0}`")]
    UnchangedAttribute(String),
    #[error("old character data requested on invalid node")]
    OldCharacterData,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
}

//! Query requests, their validation, and what the underlying observer must
//! be asked for to answer them.

use crate::error::ConfigError;
use crate::selector::{Selector, parse_selectors};
use core_types::ObserveInit;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::collections::BTreeMap;

/// One query as requested, before validation.
///
/// Exactly one shape must be chosen: `all`, `attribute`, `element` (with
/// optional `element_attributes`) or `character_data`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    #[serde(default)]
    pub all: Option<bool>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub element: Option<String>,
    #[serde(default)]
    pub element_attributes: Option<String>,
    #[serde(default)]
    pub character_data: Option<bool>,
    #[serde(flatten)]
    extra: BTreeMap<String, IgnoredAny>,
}

impl QuerySpec {
    pub fn all() -> Self {
        Self {
            all: Some(true),
            ..Self::default()
        }
    }

    pub fn attribute(name: &str) -> Self {
        Self {
            attribute: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn element(selectors: &str) -> Self {
        Self {
            element: Some(selectors.to_string()),
            ..Self::default()
        }
    }

    pub fn character_data() -> Self {
        Self {
            character_data: Some(true),
            ..Self::default()
        }
    }

    /// Also report changes to these space-separated attribute names on
    /// matching elements.
    pub fn with_element_attributes(mut self, names: &str) -> Self {
        self.element_attributes = Some(names.to_string());
        self
    }

    fn present_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let known = [
            ("all", self.all.is_some()),
            ("attribute", self.attribute.is_some()),
            ("element", self.element.is_some()),
            ("elementAttributes", self.element_attributes.is_some()),
            ("characterData", self.character_data.is_some()),
        ];
        for (key, present) in known {
            if present {
                keys.push(key.to_string());
            }
        }
        keys.extend(self.extra.keys().cloned());
        keys
    }

    pub fn validate(&self) -> Result<Query, ConfigError> {
        let keys = self.present_keys();
        let only = |shape: &'static str, allowed: &[&str]| -> Result<(), ConfigError> {
            match keys.iter().find(|k| !allowed.contains(&k.as_str())) {
                Some(key) => Err(ConfigError::ConflictingQuery {
                    shape,
                    key: key.clone(),
                }),
                None => Ok(()),
            }
        };

        if self.all == Some(true) {
            only("all", &["all"])?;
            return Ok(Query::All);
        }
        if let Some(attribute) = &self.attribute {
            let name = validate_attribute(attribute)?;
            only("attribute", &["attribute"])?;
            let filter = vec![Selector::has_attribute(&name)];
            return Ok(Query::Attribute { name, filter });
        }
        if let Some(element) = &self.element {
            let selectors = parse_selectors(element)?;
            let attributes = self
                .element_attributes
                .as_deref()
                .map(validate_element_attributes)
                .transpose()?;
            only("element", &["element", "elementAttributes"])?;
            return Ok(Query::Element {
                selectors,
                attributes,
            });
        }
        if self.character_data == Some(true) {
            only("characterData", &["characterData"])?;
            return Ok(Query::CharacterData);
        }
        Err(ConfigError::UnknownQuery)
    }
}

/// A validated query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Every node: adds, removes, reparents, reorders, attribute and text
    /// changes.
    All,
    /// Elements carrying one attribute, and changes to its value.
    Attribute { name: String, filter: Vec<Selector> },
    /// Elements matching any of `selectors`, plus changes to the listed
    /// attributes on them.
    Element {
        selectors: Vec<Selector>,
        attributes: Option<Vec<String>>,
    },
    /// Text and comment nodes, and changes to their text.
    CharacterData,
}

impl Query {
    pub fn shape(&self) -> &'static str {
        match self {
            Query::All => "all",
            Query::Attribute { .. } => "attribute",
            Query::Element { .. } => "element",
            Query::CharacterData => "characterData",
        }
    }

    pub(crate) fn element_filter(&self) -> Option<&[Selector]> {
        match self {
            Query::Attribute { filter, .. } => Some(filter),
            Query::Element { selectors, .. } => Some(selectors),
            _ => None,
        }
    }
}

/// Trimmed, syntactically valid attribute name.
pub fn validate_attribute(raw: &str) -> Result<String, ConfigError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ConfigError::EmptyAttribute);
    }
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == ':' || c == '_');
    let valid_rest =
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));
    if !valid_start || !valid_rest {
        return Err(ConfigError::InvalidAttribute(name.to_string()));
    }
    Ok(name.to_string())
}

/// Space-separated attribute names, each valid, no two equal when compared
/// case-insensitively.
pub fn validate_element_attributes(raw: &str) -> Result<Vec<String>, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyElementAttributes);
    }
    let mut names: Vec<String> = Vec::new();
    for token in raw.split_whitespace() {
        let name = validate_attribute(token)?;
        if names.iter().any(|seen| seen.eq_ignore_ascii_case(&name)) {
            return Err(ConfigError::CaseVariantAttributes(name));
        }
        names.push(name);
    }
    Ok(names)
}

/// Declarative form of a summary's options, for loading from a file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOptions {
    #[serde(default)]
    pub queries: Option<Vec<QuerySpec>>,
    #[serde(default)]
    pub observe_own_changes: bool,
    #[serde(default)]
    pub old_previous_sibling: bool,
    #[serde(flatten)]
    extra: BTreeMap<String, IgnoredAny>,
}

impl SummaryOptions {
    /// Keys that are not options.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.extra.keys().map(String::as_str)
    }
}

/// Validated options shared by every delivery of one summary.
#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) queries: Vec<Query>,
    pub(crate) observe_own_changes: bool,
    pub(crate) old_previous_sibling: bool,
    pub(crate) calc_reordered: bool,
    pub(crate) observe_init: ObserveInit,
}

impl Config {
    pub(crate) fn new(
        specs: &[QuerySpec],
        observe_own_changes: bool,
        old_previous_sibling: bool,
    ) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyQueries);
        }
        let queries = specs
            .iter()
            .map(QuerySpec::validate)
            .collect::<Result<Vec<_>, _>>()?;
        let calc_reordered = queries.iter().any(|q| matches!(q, Query::All));
        let observe_init = observe_init_for(&queries);
        Ok(Self {
            queries,
            observe_own_changes,
            old_previous_sibling,
            calc_reordered,
            observe_init,
        })
    }
}

/// The least the underlying observer must watch to answer `queries`.
///
/// Child lists are always observed over the whole subtree; attributes are
/// narrowed to the names queries can report, in both the given and the
/// lowercased spelling.
pub fn observe_init_for(queries: &[Query]) -> ObserveInit {
    let mut init = ObserveInit {
        child_list: true,
        subtree: true,
        ..ObserveInit::default()
    };
    let mut observe_all_attributes = false;
    let mut filter: Vec<String> = Vec::new();
    let mut add = |name: &str| {
        for spelling in [name.to_string(), name.to_ascii_lowercase()] {
            if !filter.contains(&spelling) {
                filter.push(spelling);
            }
        }
    };

    for query in queries {
        match query {
            Query::All => {
                init.character_data = true;
                init.character_data_old_value = true;
                observe_all_attributes = true;
            }
            Query::CharacterData => {
                init.character_data = true;
                init.character_data_old_value = true;
            }
            Query::Attribute { name, .. } => add(name),
            Query::Element {
                selectors,
                attributes,
            } => {
                for qualifier in selectors.iter().flat_map(|s| s.qualifiers()) {
                    add(qualifier.name());
                }
                for name in attributes.iter().flatten() {
                    add(name);
                }
            }
        }
    }

    if observe_all_attributes {
        init.attributes = true;
        init.attribute_old_value = true;
    } else if !filter.is_empty() {
        init.attributes = true;
        init.attribute_old_value = true;
        init.attribute_filter = Some(filter);
    }
    init
}

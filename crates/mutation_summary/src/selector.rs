//! The element selector subset: a tag name or `*`, then any number of
//! `.class`, `#id`, `[attr]`, `[attr=value]` and `[attr~=value]` qualifiers;
//! comma-separated lists of those. No combinators, no pseudo-classes.

use crate::Movement;
use crate::error::SelectorError;
use crate::tree_changes::NodeChange;
use core_types::TreeView;
use std::fmt;

/// One attribute condition of a [`Selector`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Qualifier {
    pub(crate) name: String,
    pub(crate) value: Option<String>,
    pub(crate) contains: bool,
}

impl Qualifier {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            contains: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether `value` is tested as a whitespace-separated token list.
    pub fn contains(&self) -> bool {
        self.contains
    }

    /// Test an attribute value; `None` means the attribute is absent.
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.value {
            None => true,
            Some(expected) if self.contains => contains_token(value, expected),
            Some(expected) => expected == value,
        }
    }
}

fn contains_token(list: &str, token: &str) -> bool {
    if token.is_empty() || token.contains(char::is_whitespace) {
        return false;
    }
    list.split_ascii_whitespace().any(|t| t == token)
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.contains) {
            (Some(value), true) if self.name == "class" => write!(f, ".{value}"),
            (Some(value), false) if self.name == "id" => write!(f, "#{value}"),
            (Some(value), true) => write!(f, "[{}~=\"{}\"]", self.name, escape_quotes(value)),
            (Some(value), false) => write!(f, "[{}=\"{}\"]", self.name, escape_quotes(value)),
            (None, _) => write!(f, "[{}]", self.name),
        }
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// A compound selector: tag name (or `*`) plus qualifiers, all of which must
/// hold.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selector {
    pub(crate) tag_name: String,
    pub(crate) qualifiers: Vec<Qualifier>,
}

impl Selector {
    fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            qualifiers: Vec::new(),
        }
    }

    /// `*[name]`: any element carrying `name`.
    pub(crate) fn has_attribute(name: &str) -> Self {
        Self {
            tag_name: "*".to_string(),
            qualifiers: vec![Qualifier::new(name)],
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    fn tag_matches<T: TreeView>(&self, tree: &T, element: T::Node) -> bool {
        if self.tag_name == "*" {
            return true;
        }
        let Some(tag) = tree.tag_name(element) else {
            return false;
        };
        if tree.is_html_element(element) {
            tag.eq_ignore_ascii_case(&self.tag_name)
        } else {
            tag == self.tag_name
        }
    }

    /// Whether `element` matches now.
    pub fn is_matching<T: TreeView>(&self, tree: &T, element: T::Node) -> bool {
        self.tag_matches(tree, element)
            && self
                .qualifiers
                .iter()
                .all(|q| q.matches(tree.attribute(element, &q.name)))
    }

    /// Whether `element` matched when the batch started, using the old value
    /// of every qualifier attribute that changed and the current value of
    /// the rest.
    pub(crate) fn was_matching<T: TreeView>(
        &self,
        tree: &T,
        element: T::Node,
        change: Option<&NodeChange<T::Node>>,
        is_matching: bool,
    ) -> bool {
        let Some(change) = change.filter(|c| c.attributes) else {
            return is_matching;
        };
        if !self.tag_matches(tree, element) {
            return false;
        }
        let old_values: Vec<Option<Option<&str>>> = self
            .qualifiers
            .iter()
            .map(|q| change.attribute_old_value(&q.name))
            .collect();
        if old_values.iter().all(Option::is_none) {
            return is_matching;
        }
        self.qualifiers
            .iter()
            .zip(old_values)
            .all(|(q, old)| match old {
                Some(old) => q.matches(old),
                None => q.matches(tree.attribute(element, &q.name)),
            })
    }

    pub(crate) fn matchability_change<T: TreeView>(
        &self,
        tree: &T,
        element: T::Node,
        change: Option<&NodeChange<T::Node>>,
    ) -> Movement {
        let is_matching = self.is_matching(tree, element);
        let was_matching = self.was_matching(tree, element, change, is_matching);
        match (was_matching, is_matching) {
            (true, true) => Movement::StayedIn,
            (true, false) => Movement::Exited,
            (false, true) => Movement::Entered,
            (false, false) => Movement::StayedOut,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag_name)?;
        for qualifier in &self.qualifiers {
            write!(f, "{qualifier}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Selector,
    TagName,
    Qualifier,
    QualifierNameFirstChar,
    QualifierName,
    AttrNameFirstChar,
    AttrName,
    EquivOrAttrQualEnd,
    Equal,
    AttrQualEnd,
    ValueFirstChar,
    Value,
    QuotedValue,
    SelectorSeparator,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

struct Parser<'a> {
    input: &'a str,
    selectors: Vec<Selector>,
    quote: char,
}

impl Parser<'_> {
    fn error(&self, position: usize) -> SelectorError {
        SelectorError::Syntax {
            input: self.input.to_string(),
            position,
        }
    }

    fn start_selector(&mut self, tag_name: &str) {
        self.selectors.push(Selector::new(tag_name));
    }

    fn selector(&mut self) -> &mut Selector {
        // A selector is pushed before any state that reaches here.
        let last = self.selectors.len() - 1;
        &mut self.selectors[last]
    }

    fn start_qualifier(&mut self, name: &str, contains: bool) {
        let mut qualifier = Qualifier::new(name);
        qualifier.contains = contains;
        self.selector().qualifiers.push(qualifier);
    }

    fn qualifier(&mut self) -> &mut Qualifier {
        let selector = self.selector();
        let last = selector.qualifiers.len() - 1;
        &mut selector.qualifiers[last]
    }

    fn push_value(&mut self, c: char) {
        self.qualifier()
            .value
            .get_or_insert_with(String::new)
            .push(c);
    }

    /// `.`, `#` and `[` open a qualifier from several states.
    fn open_qualifier(&mut self, c: char) -> Option<State> {
        match c {
            '.' => {
                self.start_qualifier("class", true);
                Some(State::QualifierNameFirstChar)
            }
            '#' => {
                self.start_qualifier("id", false);
                Some(State::QualifierNameFirstChar)
            }
            '[' => {
                self.start_qualifier("", false);
                Some(State::AttrNameFirstChar)
            }
            _ => None,
        }
    }

    fn step(&mut self, state: State, c: char) -> Option<State> {
        let next = match state {
            State::Selector => {
                if is_name_start(c) {
                    self.start_selector(&c.to_string());
                    State::TagName
                } else if c == '*' {
                    self.start_selector("*");
                    State::Qualifier
                } else if c.is_whitespace() {
                    State::Selector
                } else if matches!(c, '.' | '#' | '[') {
                    self.start_selector("*");
                    self.open_qualifier(c)?
                } else {
                    return None;
                }
            }
            State::TagName => {
                if is_name_char(c) {
                    self.selector().tag_name.push(c);
                    State::TagName
                } else {
                    self.after_name(c)?
                }
            }
            State::Qualifier => self.after_name(c)?,
            State::QualifierNameFirstChar => {
                if !is_name_start(c) {
                    return None;
                }
                self.push_value(c);
                State::QualifierName
            }
            State::QualifierName => {
                if is_name_char(c) {
                    self.push_value(c);
                    State::QualifierName
                } else {
                    self.after_name(c)?
                }
            }
            State::AttrNameFirstChar => {
                if is_name_start(c) {
                    self.qualifier().name.push(c);
                    State::AttrName
                } else if c.is_whitespace() {
                    State::AttrNameFirstChar
                } else {
                    return None;
                }
            }
            State::AttrName => {
                if is_name_char(c) {
                    self.qualifier().name.push(c);
                    State::AttrName
                } else if c.is_whitespace() {
                    State::EquivOrAttrQualEnd
                } else {
                    self.attr_operator(c)?
                }
            }
            State::EquivOrAttrQualEnd => {
                if c.is_whitespace() {
                    State::EquivOrAttrQualEnd
                } else {
                    self.attr_operator(c)?
                }
            }
            State::Equal => {
                if c != '=' {
                    return None;
                }
                self.qualifier().value = Some(String::new());
                State::ValueFirstChar
            }
            State::AttrQualEnd => match c {
                ']' => State::Qualifier,
                c if c.is_whitespace() => State::AttrQualEnd,
                _ => return None,
            },
            State::ValueFirstChar => match c {
                c if c.is_whitespace() => State::ValueFirstChar,
                '"' | '\'' => {
                    self.quote = c;
                    State::QuotedValue
                }
                c => {
                    self.push_value(c);
                    State::Value
                }
            },
            State::Value => match c {
                c if c.is_whitespace() => State::AttrQualEnd,
                ']' => State::Qualifier,
                '"' | '\'' => return None,
                c => {
                    self.push_value(c);
                    State::Value
                }
            },
            State::QuotedValue => {
                if c == self.quote {
                    State::AttrQualEnd
                } else {
                    self.push_value(c);
                    State::QuotedValue
                }
            }
            State::SelectorSeparator => match c {
                c if c.is_whitespace() => State::SelectorSeparator,
                ',' => State::Selector,
                _ => return None,
            },
        };
        Some(next)
    }

    /// After a tag name, qualifier name or closed qualifier.
    fn after_name(&mut self, c: char) -> Option<State> {
        match c {
            '.' | '#' | '[' => self.open_qualifier(c),
            ',' => Some(State::Selector),
            c if c.is_whitespace() => Some(State::SelectorSeparator),
            _ => None,
        }
    }

    fn attr_operator(&mut self, c: char) -> Option<State> {
        match c {
            '~' => {
                self.qualifier().contains = true;
                Some(State::Equal)
            }
            '=' => {
                self.qualifier().value = Some(String::new());
                Some(State::ValueFirstChar)
            }
            ']' => Some(State::Qualifier),
            _ => None,
        }
    }
}

/// Parse a comma-separated selector list.
pub fn parse_selectors(input: &str) -> Result<Vec<Selector>, SelectorError> {
    let mut parser = Parser {
        input,
        selectors: Vec::new(),
        quote: '"',
    };
    let mut state = State::Selector;
    for (position, c) in input.chars().enumerate() {
        state = parser
            .step(state, c)
            .ok_or_else(|| parser.error(position))?;
    }

    let complete = matches!(
        state,
        State::Selector
            | State::TagName
            | State::Qualifier
            | State::QualifierName
            | State::SelectorSeparator
    );
    if !complete || parser.selectors.is_empty() {
        return Err(parser.error(input.chars().count()));
    }
    Ok(parser.selectors)
}

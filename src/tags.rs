use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TagError {
    #[error("empty tag name")]
    Empty,
    #[error("invalid tag name: {0:?}")]
    Invalid(String),
}

/// Name of a tag (object category), e.g. `person` or `traffic light`.
///
/// Never empty, never padded with whitespace and free of control characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    pub fn new(name: impl Into<String>) -> Result<Self, TagError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TagError::Empty);
        }
        if name.trim() != name || name.chars().any(char::is_control) {
            return Err(TagError::Invalid(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TagName {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TagName {
    type Error = TagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TagName> for String {
    fn from(value: TagName) -> Self {
        value.0
    }
}

impl Borrow<str> for TagName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl JsonSchema for TagName {
    fn schema_name() -> String {
        "TagName".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}

/// Known tags keyed by name, with the numeric id the annotation tool assigned.
///
/// Aggregation only looks at the names; chart builders carry the ids along.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TagIdMap(BTreeMap<TagName, i64>);

impl TagIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: TagName, id: i64) -> Option<i64> {
        self.0.insert(name, id)
    }

    pub fn id(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &TagName> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagName, i64)> {
        self.0.iter().map(|(name, id)| (name, *id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a map from `(name, id)` pairs, rejecting invalid names.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, TagError>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut map = Self::new();
        for (name, id) in pairs {
            map.insert(TagName::new(name)?, id);
        }
        Ok(map)
    }
}

impl FromIterator<(TagName, i64)> for TagIdMap {
    fn from_iter<T: IntoIterator<Item = (TagName, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

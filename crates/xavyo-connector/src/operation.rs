//! Connector Framework operation types
//!
//! Types for CRUD operations: UIDs, attribute sets, deltas and filters.
//! Attribute values are kept as JSON values; every attribute is treated as
//! a (possibly single-element) list of values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Unique identifier for an object in a target system.
///
/// Different systems use different identifier schemes:
/// - LDAP: Distinguished Name (DN) or entryUUID
/// - Database: Primary key column value
/// - REST: Resource ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid {
    /// The attribute name used as the identifier (e.g., "dn", "id", "uid").
    attribute_name: String,
    /// The actual value of the identifier.
    value: String,
}

impl Uid {
    /// Create a new UID with the given attribute name and value.
    pub fn new(attribute_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
        }
    }

    /// Create a UID using the default "uid" attribute name.
    pub fn from_value(value: impl Into<String>) -> Self {
        Self::new("uid", value)
    }

    /// Get the attribute name.
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    /// Get the value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute_name, self.value)
    }
}

/// A set of attributes for create operations or search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    #[serde(flatten)]
    attributes: BTreeMap<String, Vec<Value>>,
}

impl AttributeSet {
    /// Create a new empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set all values of an attribute.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.attributes.insert(name.into(), values);
    }

    /// Set a single value using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, vec![value.into()]);
        self
    }

    /// Get the values of an attribute.
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Get a single-valued string attribute.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .and_then(Value::as_str)
    }

    /// Check if an attribute exists.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Vec<Value>> {
        self.attributes.remove(name)
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate over all attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.attributes.iter()
    }

    /// Convert into the underlying map.
    pub fn into_map(self) -> BTreeMap<String, Vec<Value>> {
        self.attributes
    }
}

impl FromIterator<(String, Vec<Value>)> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = (String, Vec<Value>)>>(iter: T) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

/// Changes to apply to an object during update operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDelta {
    /// Values to add.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, Vec<Value>>,

    /// Values to remove.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remove: BTreeMap<String, Vec<Value>>,

    /// Attributes to replace entirely (an empty list clears the attribute).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replace: BTreeMap<String, Vec<Value>>,
}

impl AttributeDelta {
    /// Create a new empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values to an attribute.
    pub fn add_values(&mut self, name: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.add.entry(name.into()).or_default().extend(values);
        self
    }

    /// Remove values from an attribute.
    pub fn remove_values(&mut self, name: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.remove.entry(name.into()).or_default().extend(values);
        self
    }

    /// Replace an attribute value entirely.
    pub fn replace_values(&mut self, name: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.replace.insert(name.into(), values);
        self
    }

    /// Check if this delta has any changes.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.replace.is_empty()
    }

    /// Get all affected attribute names.
    pub fn affected_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        names.extend(self.add.keys().map(String::as_str));
        names.extend(self.remove.keys().map(String::as_str));
        names.extend(self.replace.keys().map(String::as_str));
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Filter for search operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Match objects where attribute has the value.
    Equals { attribute: String, value: Value },

    /// Match objects where attribute exists (has any value).
    Present { attribute: String },

    /// Logical AND of multiple filters.
    And { filters: Vec<Filter> },

    /// Logical OR of multiple filters.
    Or { filters: Vec<Filter> },
}

impl Filter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Evaluate the filter against an attribute set.
    pub fn matches(&self, attributes: &AttributeSet) -> bool {
        match self {
            Filter::Equals { attribute, value } => attributes
                .get(attribute)
                .is_some_and(|values| values.contains(value)),
            Filter::Present { attribute } => attributes
                .get(attribute)
                .is_some_and(|values| !values.is_empty()),
            Filter::And { filters } => filters.iter().all(|f| f.matches(attributes)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(attributes)),
        }
    }
}

/// An object returned by a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorObject {
    /// Identifier of the object in the target system.
    pub uid: Uid,
    /// Object class of the object.
    pub object_class: String,
    /// Attribute values.
    pub attributes: AttributeSet,
}

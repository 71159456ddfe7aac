//! Connector Framework schema types
//!
//! Object classes and attributes as reported by a target system. Only the
//! properties the synchronization engine consumes are modelled: cardinality,
//! identifiers and whether unexpected remote values are tolerated.

use serde::{Deserialize, Serialize};

/// An object class in a target system schema (e.g. `inetOrgPerson`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectClass {
    /// Name of this object class.
    pub name: String,

    /// Attributes belonging to this object class.
    #[serde(default)]
    pub attributes: Vec<SchemaAttribute>,
}

impl ObjectClass {
    /// Create a new object class with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute (builder pattern).
    #[must_use]
    pub fn with_attribute(mut self, attribute: SchemaAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Get an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&SchemaAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get the primary identifier attribute, if declared.
    pub fn primary_identifier(&self) -> Option<&SchemaAttribute> {
        self.attributes.iter().find(|a| a.primary_identifier)
    }
}

fn default_true() -> bool {
    true
}

/// An attribute in an object class schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaAttribute {
    /// Attribute name.
    pub name: String,

    /// Whether this attribute can have multiple values.
    #[serde(default)]
    pub multi_valued: bool,

    /// Whether this attribute is required for create operations.
    #[serde(default)]
    pub required: bool,

    /// Whether this attribute is the primary identifier of the object.
    #[serde(default)]
    pub primary_identifier: bool,

    /// Whether values that no mapping proposes may stay on the target.
    #[serde(default = "default_true")]
    pub tolerant: bool,
}

impl SchemaAttribute {
    /// Create a new single-valued, tolerant attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_valued: false,
            required: false,
            primary_identifier: false,
            tolerant: true,
        }
    }

    /// Mark this attribute as multi-valued.
    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Mark this attribute as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark this attribute as the primary identifier.
    #[must_use]
    pub fn as_primary_identifier(mut self) -> Self {
        self.primary_identifier = true;
        self
    }

    /// Mark this attribute as non-tolerant: unproposed values are removed.
    #[must_use]
    pub fn non_tolerant(mut self) -> Self {
        self.tolerant = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_class_builder() {
        let oc = ObjectClass::new("account")
            .with_attribute(SchemaAttribute::new("uid").as_primary_identifier())
            .with_attribute(SchemaAttribute::new("groups").multi_valued().non_tolerant());

        assert_eq!(oc.primary_identifier().map(|a| a.name.as_str()), Some("uid"));
        let groups = oc.get_attribute("groups").unwrap();
        assert!(groups.multi_valued);
        assert!(!groups.tolerant);
        assert!(oc.get_attribute("mail").is_none());
    }

    #[test]
    fn test_attribute_defaults_from_json() {
        let attr: SchemaAttribute = serde_json::from_str(r#"{"name":"title"}"#).unwrap();
        assert!(!attr.multi_valued);
        assert!(attr.tolerant);
    }
}

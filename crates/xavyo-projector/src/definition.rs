//! Resource object definitions as seen by consolidation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xavyo_connector::ObjectClass;

use crate::squeeze::ASSOCIATION_PREFIX;

/// Consolidation-relevant properties of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub multi_valued: bool,
    /// Values no mapping proposes may stay on the target.
    pub tolerant: bool,
    /// A strong value suppresses weak and normal values of other mappings.
    pub exclusive_strong: bool,
}

impl Default for AttributeDefinition {
    fn default() -> Self {
        Self {
            multi_valued: false,
            tolerant: true,
            exclusive_strong: false,
        }
    }
}

/// Definition of the object class behind a projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObjectDefinition {
    pub object_class: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDefinition>,
}

impl ResourceObjectDefinition {
    pub fn new(object_class: impl Into<String>) -> Self {
        Self {
            object_class: object_class.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes.insert(name.into(), definition);
        self
    }

    /// Build from a connector schema object class.
    pub fn from_object_class(object_class: &ObjectClass) -> Self {
        let attributes = object_class
            .attributes
            .iter()
            .map(|a| {
                (
                    a.name.clone(),
                    AttributeDefinition {
                        multi_valued: a.multi_valued,
                        tolerant: a.tolerant,
                        exclusive_strong: false,
                    },
                )
            })
            .collect();
        Self {
            object_class: object_class.name.clone(),
            attributes,
        }
    }

    /// Definition of an item. Associations are multi-valued; unknown
    /// attributes and credentials are single-valued and tolerant.
    pub fn attribute(&self, name: &str) -> AttributeDefinition {
        if let Some(def) = self.attributes.get(name) {
            return *def;
        }
        if name.starts_with(ASSOCIATION_PREFIX) {
            return AttributeDefinition {
                multi_valued: true,
                ..AttributeDefinition::default()
            };
        }
        AttributeDefinition::default()
    }
}

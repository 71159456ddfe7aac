//! Object snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use xavyo_connector::{ResourceId, ShadowKind};

/// Type of object handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    User,
    Role,
    Org,
    Service,
    /// Projection of a focus on a resource.
    Shadow,
}

impl ObjectType {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::User => "user",
            ObjectType::Role => "role",
            ObjectType::Org => "org",
            ObjectType::Service => "service",
            ObjectType::Shadow => "shadow",
        }
    }

    /// Whether objects of this type live in the focus store.
    #[must_use]
    pub fn is_focus(&self) -> bool {
        !matches!(self, ObjectType::Shadow)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a shadow lives: resource, kind and intent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShadowCoordinates {
    pub resource_id: ResourceId,
    pub kind: ShadowKind,
    pub intent: String,
}

impl ShadowCoordinates {
    pub fn new(resource_id: ResourceId, kind: ShadowKind, intent: impl Into<String>) -> Self {
        Self {
            resource_id,
            kind,
            intent: intent.into(),
        }
    }
}

impl fmt::Display for ShadowCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_id, self.kind, self.intent)
    }
}

/// A full or partial snapshot of an object: every item is a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<ShadowCoordinates>,
    #[serde(default)]
    pub items: BTreeMap<String, Vec<Value>>,
}

impl ObjectSnapshot {
    /// Create an empty snapshot of a focus-side object.
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            oid: None,
            coordinates: None,
            items: BTreeMap::new(),
        }
    }

    /// Create an empty shadow snapshot.
    pub fn shadow(coordinates: ShadowCoordinates) -> Self {
        Self {
            object_type: ObjectType::Shadow,
            oid: None,
            coordinates: Some(coordinates),
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    /// Set a single value (builder pattern).
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.items.insert(name.into(), vec![value.into()]);
        self
    }

    /// Set all values of an item (builder pattern).
    #[must_use]
    pub fn with_values(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.set_values(name, values);
        self
    }

    /// Values of an item; empty when the item is absent.
    pub fn values(&self, name: &str) -> &[Value] {
        self.items.get(name).map_or(&[], Vec::as_slice)
    }

    /// Replace the values of an item. An empty list removes the item.
    pub fn set_values(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let name = name.into();
        if values.is_empty() {
            self.items.remove(&name);
        } else {
            self.items.insert(name, values);
        }
    }

    /// Whether an item holds the given value.
    pub fn has_value(&self, name: &str, value: &Value) -> bool {
        self.values(name).contains(value)
    }

    /// Drop items that hold no values.
    pub(crate) fn prune_empty(&mut self) {
        self.items.retain(|_, values| !values.is_empty());
    }
}

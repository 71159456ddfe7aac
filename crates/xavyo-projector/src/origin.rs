//! Mapping metadata attached to candidate values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::triple::DeltaSetTriple;

/// How hard a mapping pushes its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStrength {
    /// Applied only when the target item has no value.
    Weak,
    Normal,
    /// Enforced even against explicit changes.
    Strong,
}

impl Default for MappingStrength {
    fn default() -> Self {
        Self::Normal
    }
}

/// Kind of source a construction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    Assignments,
    Outbound,
    Inbound,
    Template,
    Reconciliation,
}

impl OriginType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginType::Assignments => "assignments",
            OriginType::Outbound => "outbound",
            OriginType::Inbound => "inbound",
            OriginType::Template => "template",
            OriginType::Reconciliation => "reconciliation",
        }
    }
}

/// Back-reference to the construction that produced a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionRef {
    pub name: String,
    pub origin: OriginType,
}

impl ConstructionRef {
    pub fn new(name: impl Into<String>, origin: OriginType) -> Self {
        Self {
            name: name.into(),
            origin,
        }
    }
}

impl fmt::Display for ConstructionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.origin.as_str())
    }
}

/// Declarative description of one mapping, evaluated by a [`crate::MappingEvaluator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSpec {
    pub name: String,
    /// Item the mapping produces values for.
    pub target: String,
    #[serde(default)]
    pub strength: MappingStrength,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub authoritative: bool,
    /// Opaque expression handed to the evaluator.
    #[serde(default)]
    pub expression: Value,
}

impl MappingSpec {
    pub fn new(name: impl Into<String>, target: impl Into<String>, expression: Value) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            strength: MappingStrength::Normal,
            exclusive: false,
            authoritative: false,
            expression,
        }
    }

    #[must_use]
    pub fn with_strength(mut self, strength: MappingStrength) -> Self {
        self.strength = strength;
        self
    }

    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    #[must_use]
    pub fn authoritative(mut self) -> Self {
        self.authoritative = true;
        self
    }
}

/// Item value with origin: one candidate value and the mapping behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemValueWithOrigin {
    pub value: Value,
    pub mapping: String,
    pub strength: MappingStrength,
    pub exclusive: bool,
    pub authoritative: bool,
    pub origin: ConstructionRef,
}

impl ItemValueWithOrigin {
    /// Wrap a value produced by `mapping` within `origin`.
    pub fn from_mapping(value: Value, mapping: &MappingSpec, origin: &ConstructionRef) -> Self {
        Self {
            value,
            mapping: mapping.name.clone(),
            strength: mapping.strength,
            exclusive: mapping.exclusive,
            authoritative: mapping.authoritative,
            origin: origin.clone(),
        }
    }

    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.strength == MappingStrength::Weak
    }

    #[must_use]
    pub fn is_strong(&self) -> bool {
        self.strength == MappingStrength::Strong
    }

    /// Identity of the producing mapping, used for exclusivity checks.
    pub fn mapping_key(&self) -> String {
        format!("{}:{}", self.origin.name, self.mapping)
    }
}

impl DeltaSetTriple<Value> {
    /// Attach mapping metadata to every value of a raw triple.
    pub fn with_origin(
        self,
        mapping: &MappingSpec,
        origin: &ConstructionRef,
    ) -> DeltaSetTriple<ItemValueWithOrigin> {
        self.map(|value| ItemValueWithOrigin::from_mapping(value, mapping, origin))
    }
}

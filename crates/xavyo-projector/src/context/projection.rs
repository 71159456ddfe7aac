//! Projection state: one linked account of the focus.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use xavyo_connector::{ResourceId, ShadowKind};

use super::executed::ExecutedDelta;
use crate::definition::ResourceObjectDefinition;
use crate::delta::{ObjectDelta, ObjectSnapshot, ObjectType, ShadowCoordinates};
use crate::error::{ProjectorError, ProjectorResult};
use crate::origin::MappingSpec;
use crate::shadow::SyncSituation;
use crate::squeeze::{Construction, IvwoTriple};

/// What should happen to a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDecision {
    Keep,
    Add,
    Delete,
    Unlink,
    /// Failed; excluded from computation and execution.
    Broken,
    Ignore,
}

impl SyncDecision {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDecision::Keep => "keep",
            SyncDecision::Add => "add",
            SyncDecision::Delete => "delete",
            SyncDecision::Unlink => "unlink",
            SyncDecision::Broken => "broken",
            SyncDecision::Ignore => "ignore",
        }
    }

    /// Whether the projection stays linked to the focus.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        matches!(self, SyncDecision::Keep | SyncDecision::Add)
    }

    /// Whether the projection takes part in computation and execution.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncDecision::Broken | SyncDecision::Ignore)
    }
}

impl fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key identifying the role of a projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Discriminator {
    pub resource_id: ResourceId,
    pub kind: ShadowKind,
    pub intent: String,
    /// Position in a chain of projections with the same resource, kind and intent.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub tombstone: bool,
}

impl Discriminator {
    pub fn new(resource_id: ResourceId, kind: ShadowKind, intent: impl Into<String>) -> Self {
        Self {
            resource_id,
            kind,
            intent: intent.into(),
            order: 0,
            tombstone: false,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn coordinates(&self) -> ShadowCoordinates {
        ShadowCoordinates::new(self.resource_id, self.kind, self.intent.clone())
    }

    /// Same resource, kind, intent and order, ignoring the tombstone flag.
    pub fn matches(&self, resource_id: ResourceId, kind: ShadowKind, intent: &str, order: u32) -> bool {
        self.resource_id == resource_id
            && self.kind == kind
            && self.intent == intent
            && self.order == order
    }
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.resource_id, self.kind, self.intent, self.order
        )?;
        if self.tombstone {
            write!(f, " (tombstone)")?;
        }
        Ok(())
    }
}

/// How a dependency constrains the dependent projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStrictness {
    /// The dependency must exist and be healthy.
    Strict,
    /// If the dependency exists it must be healthy.
    Relaxed,
    /// Only orders the waves.
    Lax,
}

/// Dependency of a projection on another projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectionDependency {
    pub resource_id: ResourceId,
    pub kind: ShadowKind,
    pub intent: String,
    #[serde(default)]
    pub order: u32,
    pub strictness: DependencyStrictness,
}

impl ProjectionDependency {
    pub fn strict(resource_id: ResourceId, kind: ShadowKind, intent: impl Into<String>) -> Self {
        Self {
            resource_id,
            kind,
            intent: intent.into(),
            order: 0,
            strictness: DependencyStrictness::Strict,
        }
    }

    /// Whether a projection is the target of this dependency.
    pub fn targets(&self, discriminator: &Discriminator) -> bool {
        discriminator.matches(self.resource_id, self.kind, &self.intent, self.order)
    }
}

impl fmt::Display for ProjectionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.resource_id, self.kind, self.intent, self.order
        )
    }
}

/// One projection of the focus and everything computed for it.
#[derive(Debug, Clone)]
pub struct ProjectionState {
    pub discriminator: Discriminator,
    pub sync_decision: SyncDecision,
    /// Shadow oid, once the account exists.
    pub oid: Option<String>,
    /// Whether `object_current` holds the complete remote object.
    pub full_shadow: bool,
    /// Refreshed by the current pass.
    pub fresh: bool,
    pub wave: u32,
    pub object_current: Option<ObjectSnapshot>,
    pub object_new: Option<ObjectSnapshot>,
    primary_delta: Option<ObjectDelta>,
    pub secondary_delta: Option<ObjectDelta>,
    /// Change reported by the resource itself.
    pub sync_delta: Option<ObjectDelta>,
    /// Assignment-driven constructions.
    pub constructions: Vec<Construction>,
    pub outbound_mappings: Vec<MappingSpec>,
    pub definition: Option<ResourceObjectDefinition>,
    pub dependencies: Vec<ProjectionDependency>,
    pub squeezed_attributes: BTreeMap<String, IvwoTriple>,
    pub squeezed_associations: BTreeMap<String, IvwoTriple>,
    pub squeezed_credentials: BTreeMap<String, IvwoTriple>,
    /// Bumped whenever a uniqueness conflict forces a new identifier.
    pub iteration: u32,
    pub conflict_detected: bool,
    /// Dependencies were not satisfied when its wave was projected; the
    /// executor leaves it alone.
    pub dependencies_unsatisfied: bool,
    pub synchronization_situation: Option<SyncSituation>,
    pub broken_reason: Option<String>,
    executed_deltas: Vec<ExecutedDelta>,
}

impl ProjectionState {
    pub fn new(discriminator: Discriminator, sync_decision: SyncDecision) -> Self {
        Self {
            discriminator,
            sync_decision,
            oid: None,
            full_shadow: false,
            fresh: false,
            wave: 0,
            object_current: None,
            object_new: None,
            primary_delta: None,
            secondary_delta: None,
            sync_delta: None,
            constructions: Vec::new(),
            outbound_mappings: Vec::new(),
            definition: None,
            dependencies: Vec::new(),
            squeezed_attributes: BTreeMap::new(),
            squeezed_associations: BTreeMap::new(),
            squeezed_credentials: BTreeMap::new(),
            iteration: 0,
            conflict_detected: false,
            dependencies_unsatisfied: false,
            synchronization_situation: None,
            broken_reason: None,
            executed_deltas: Vec::new(),
        }
    }

    /// Projection of an existing shadow.
    #[must_use]
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    #[must_use]
    pub fn with_outbound_mapping(mut self, mapping: MappingSpec) -> Self {
        self.outbound_mappings.push(mapping);
        self
    }

    #[must_use]
    pub fn with_construction(mut self, construction: Construction) -> Self {
        self.constructions.push(construction);
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: ProjectionDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn with_definition(mut self, definition: ResourceObjectDefinition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn coordinates(&self) -> ShadowCoordinates {
        self.discriminator.coordinates()
    }

    pub fn primary_delta(&self) -> Option<&ObjectDelta> {
        self.primary_delta.as_ref()
    }

    /// Set the requested change; it cannot be replaced once set.
    pub fn set_primary_delta(&mut self, delta: ObjectDelta) -> ProjectorResult<()> {
        if self.primary_delta.is_some() {
            return Err(ProjectorError::schema(format!(
                "primary delta of projection {} is already set",
                self.discriminator
            )));
        }
        if delta.object_type != ObjectType::Shadow {
            return Err(ProjectorError::schema(format!(
                "projection delta must target a shadow, not {}",
                delta.object_type
            )));
        }
        self.primary_delta = Some(delta);
        Ok(())
    }

    pub fn executed_deltas(&self) -> &[ExecutedDelta] {
        &self.executed_deltas
    }

    pub fn record_executed(&mut self, executed: ExecutedDelta) {
        self.executed_deltas.push(executed);
    }

    /// Mark the projection broken, keeping it for reporting.
    pub fn mark_broken(&mut self, reason: impl Into<String>) {
        self.sync_decision = SyncDecision::Broken;
        self.broken_reason = Some(reason.into());
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.sync_decision == SyncDecision::Broken
    }

    /// Whether the current remote state is completely known. A projection
    /// being added has no remote state, which is known to be empty.
    #[must_use]
    pub fn has_complete_state(&self) -> bool {
        self.full_shadow || (self.sync_decision == SyncDecision::Add && self.oid.is_none())
    }

    /// Forget the remote object after a uniqueness conflict so the next
    /// iteration creates a new one.
    pub fn start_next_iteration(&mut self) {
        self.iteration += 1;
        self.conflict_detected = false;
        self.oid = None;
        self.object_current = None;
        self.full_shadow = false;
        self.sync_decision = SyncDecision::Add;
    }

    /// The change to execute: primary merged with secondary. ADD projections
    /// materialize an ADD delta of a new shadow.
    pub fn execution_delta(&self) -> ProjectorResult<Option<ObjectDelta>> {
        let mut delta = match (&self.primary_delta, &self.secondary_delta) {
            (None, None) => return Ok(None),
            (Some(primary), _) => primary.clone(),
            (None, Some(secondary)) if secondary.is_delete() => return Ok(Some(secondary.clone())),
            (None, Some(_)) if self.sync_decision == SyncDecision::Add && self.oid.is_none() => {
                ObjectDelta::add(ObjectSnapshot::shadow(self.coordinates()))
            }
            (None, Some(_)) => ObjectDelta::modify(ObjectType::Shadow, self.oid.clone(), Vec::new()),
        };
        if let Some(secondary) = &self.secondary_delta {
            delta.merge(secondary)?;
        }
        delta.simplify();
        if delta.oid.is_none() && !delta.is_add() {
            delta.oid.clone_from(&self.oid);
        }
        Ok((!delta.is_empty()).then_some(delta))
    }
}

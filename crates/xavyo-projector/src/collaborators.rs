//! Interfaces to the systems the projector works with.
//!
//! The projector never persists objects, talks to resources or evaluates
//! expressions itself; all of that goes through these traits.

use async_trait::async_trait;
use serde_json::Value;
use xavyo_connector::{Filter, ResourceId};

use crate::context::{FocusState, ProjectionState, SyncContext};
use crate::definition::ResourceObjectDefinition;
use crate::delta::{ItemDelta, ObjectSnapshot, ObjectType, ShadowCoordinates};
use crate::error::ProjectorResult;
use crate::origin::MappingSpec;
use crate::result::OperationResult;
use crate::triple::DeltaSetTriple;

/// Repository of focus objects and shadow records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get an object; `NotFound` if it does not exist.
    async fn get(&self, object_type: ObjectType, oid: &str) -> ProjectorResult<ObjectSnapshot>;

    /// Add an object and return its oid; `AlreadyExists` on a uniqueness conflict.
    async fn add(&self, object: ObjectSnapshot) -> ProjectorResult<String>;

    async fn modify(
        &self,
        object_type: ObjectType,
        oid: &str,
        modifications: &[ItemDelta],
    ) -> ProjectorResult<()>;

    async fn delete(&self, object_type: ObjectType, oid: &str) -> ProjectorResult<()>;
}

/// Accounts on external resources, addressed by shadow coordinates.
#[async_trait]
pub trait ResourceLayer: Send + Sync {
    async fn get(&self, coordinates: &ShadowCoordinates, oid: &str) -> ProjectorResult<ObjectSnapshot>;

    /// Create the account described by `object.coordinates`; returns its oid.
    async fn add(&self, object: ObjectSnapshot) -> ProjectorResult<String>;

    /// Modify an account; returns the oid, which may change on rename.
    async fn modify(
        &self,
        coordinates: &ShadowCoordinates,
        oid: &str,
        modifications: &[ItemDelta],
    ) -> ProjectorResult<String>;

    async fn delete(&self, coordinates: &ShadowCoordinates, oid: &str) -> ProjectorResult<()>;

    async fn search(
        &self,
        coordinates: &ShadowCoordinates,
        filter: Option<Filter>,
    ) -> ProjectorResult<Vec<ObjectSnapshot>>;

    /// Definition of the object class behind the coordinates.
    async fn apply_definition(
        &self,
        coordinates: &ShadowCoordinates,
    ) -> ProjectorResult<ResourceObjectDefinition>;
}

/// Variables available to a mapping expression.
#[derive(Debug, Clone, Copy)]
pub struct MappingBindings<'a> {
    pub focus_old: Option<&'a ObjectSnapshot>,
    pub focus_new: Option<&'a ObjectSnapshot>,
    /// Current state of the projection's account.
    pub projection: Option<&'a ObjectSnapshot>,
    pub resource_id: ResourceId,
    pub iteration: u32,
    /// Suffix used to build unique identifiers; empty on the first iteration.
    pub iteration_token: &'a str,
}

/// Evaluates mapping expressions.
pub trait MappingEvaluator: Send + Sync {
    /// Evaluate a mapping into old/new partitions of its output values.
    fn evaluate(
        &self,
        mapping: &MappingSpec,
        bindings: &MappingBindings<'_>,
    ) -> ProjectorResult<DeltaSetTriple<Value>>;
}

/// Computes focus-level changes (templates, inbound mappings).
#[async_trait]
pub trait FocusProcessor: Send + Sync {
    async fn process(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFocusProcessor;

#[async_trait]
impl FocusProcessor for NoopFocusProcessor {
    async fn process(&self, _ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        result.record_not_applicable("no focus processing configured");
        Ok(())
    }
}

/// Computes activation (enable/disable) of a projection.
#[async_trait]
pub trait ActivationProcessor: Send + Sync {
    async fn process(&self, focus: &FocusState, projection: &mut ProjectionState) -> ProjectorResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivationProcessor;

#[async_trait]
impl ActivationProcessor for NoopActivationProcessor {
    async fn process(&self, _focus: &FocusState, _projection: &mut ProjectionState) -> ProjectorResult<()> {
        Ok(())
    }
}

/// Orders projections into waves.
pub trait DependencyProcessor: Send + Sync {
    /// Complete the dependency lists before sorting.
    fn preprocess(&self, ctx: &mut SyncContext) -> ProjectorResult<()>;

    /// Assign a wave to every projection.
    fn sort_projections_to_waves(&self, ctx: &mut SyncContext) -> ProjectorResult<()>;

    fn compute_max_waves(&self, ctx: &SyncContext) -> u32;

    /// Whether the projection at `index` may be computed now.
    fn check_dependencies(&self, ctx: &SyncContext, index: usize) -> bool;
}

/// Loads the objects a context refers to.
#[async_trait]
pub trait ContextLoader: Send + Sync {
    /// Refresh the focus and every projection.
    async fn load(&self, ctx: &mut SyncContext) -> ProjectorResult<()>;

    /// Make sure one projection is loaded; a no-op for fresh projections.
    async fn ensure_loaded(&self, projection: &mut ProjectionState) -> ProjectorResult<()>;
}

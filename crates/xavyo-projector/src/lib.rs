//! # Projector
//!
//! Value consolidation, wave-scheduled projection and idempotent change
//! execution for xavyo synchronization.
//!
//! A synchronization operation starts from a focus object (a user) and its
//! projections (accounts on resources). Mappings and constructions propose
//! values for account items; the projector squeezes those proposals into one
//! delta set triple per item, consolidates each triple into a concrete item
//! change and hands the resulting deltas to the change executor. The clockwork
//! alternates projection and execution one wave at a time, restarting a wave
//! when account creation runs into a uniqueness conflict.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │ SyncContext  │────►│   Projector   │────►│  ChangeExecutor  │
//! │ focus + proj │     │ (wave N)      │     │  (wave N)        │
//! └──────────────┘     └───────┬───────┘     └────────┬─────────┘
//!        ▲                     │                      │
//!        │         ┌───────────┼───────────┐          ▼
//!        │         ▼           ▼           ▼   ┌──────────────┐
//!        │   ┌──────────┐ ┌─────────┐ ┌───────┐│ ObjectStore  │
//!        │   │ Outbound │ │ Squeeze │ │Consol.││ ResourceLayer│
//!        │   └──────────┘ └─────────┘ └───────┘└──────┬───────┘
//!        │                                            │
//!        └──────────── Clockwork (restart / next wave)┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use xavyo_projector::prelude::*;
//!
//! let resources = Arc::new(ConnectorResourceLayer::new(provider));
//! let loader = Arc::new(ResourceContextLoader::new(store.clone(), resources.clone()));
//! let projector = Arc::new(Projector::new(loader, evaluator));
//! let executor = Arc::new(ChangeExecutor::new(store, resources));
//!
//! let mut ctx = SyncContext::new(FocusState::new(user)).with_projection(account);
//! let mut result = OperationResult::new("sync");
//! Clockwork::new(projector, executor).run(&mut ctx, &mut result).await?;
//! ```

pub mod clockwork;
pub mod collaborators;
pub mod config;
pub mod consolidation;
pub mod context;
pub mod definition;
pub mod delta;
pub mod dependency;
pub mod error;
pub mod executor;
pub mod idempotency;
pub mod origin;
pub mod outbound;
pub mod progress;
pub mod projector;
pub mod reconciliation;
pub mod resource;
pub mod result;
pub mod shadow;
pub mod squeeze;
pub mod triple;

pub use clockwork::Clockwork;
pub use collaborators::{
    ActivationProcessor, ContextLoader, DependencyProcessor, FocusProcessor, MappingBindings,
    MappingEvaluator, ObjectStore, ResourceLayer,
};
pub use config::ProjectorConfig;
pub use consolidation::{consolidate_item, consolidate_items, ConsolidationInput, ItemFamilyContext};
pub use context::{
    AbortSignal, DependencyStrictness, Discriminator, ExecutedDelta, ExecutionOptions, FocusState,
    ProjectionDependency, ProjectionState, SyncContext, SyncDecision,
};
pub use definition::{AttributeDefinition, ResourceObjectDefinition};
pub use delta::{ChangeType, ItemDelta, ObjectDelta, ObjectSnapshot, ObjectType, ShadowCoordinates};
pub use dependency::DefaultDependencyProcessor;
pub use error::{ProjectorError, ProjectorResult};
pub use executor::{ChangeExecutor, ExecutionOutcome};
pub use origin::{ConstructionRef, ItemValueWithOrigin, MappingSpec, MappingStrength, OriginType};
pub use progress::{ProgressEvent, ProgressListener, TracingProgressListener};
pub use projector::{ProjectionOutcome, Projector};
pub use resource::{ConnectorResourceLayer, ResourceContextLoader};
pub use result::{OperationResult, OperationStatus};
pub use shadow::SyncSituation;
pub use squeeze::{squeeze, Construction, IvwoTriple, SqueezeMode};
pub use triple::DeltaSetTriple;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        ChangeExecutor, Clockwork, ConnectorResourceLayer, FocusState, ItemDelta, MappingSpec,
        MappingStrength, ObjectDelta, ObjectSnapshot, ObjectType, OperationResult, ProjectionState,
        Projector, ProjectorConfig, ProjectorError, ProjectorResult, ResourceContextLoader,
        SyncContext, SyncDecision,
    };
}

//! Synchronization context: the focus, its projections and the wave counters.

mod executed;
mod focus;
mod projection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

pub use executed::ExecutedDelta;
pub use focus::FocusState;
pub use projection::{
    DependencyStrictness, Discriminator, ProjectionDependency, ProjectionState, SyncDecision,
};

use crate::config::ProjectorConfig;

/// Cooperative cancellation flag, checked at wave and projection boundaries.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running computation to stop.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-operation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Compute everything but execute nothing.
    pub preview: bool,
    /// Recompute even projections without a requested change.
    pub reconcile: bool,
}

/// Everything the projector and executor share for one operation.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub request_id: Uuid,
    pub focus: FocusState,
    pub projections: Vec<ProjectionState>,
    execution_wave: u32,
    projection_wave: u32,
    max_waves: u32,
    pub options: ExecutionOptions,
    /// Channel the operation came from, e.g. `"user"` or `"reconciliation"`.
    pub channel: Option<String>,
    pub abort: AbortSignal,
    fresh: bool,
    /// Activation runs once per operation, restarts included.
    pub(crate) activation_done: bool,
}

impl SyncContext {
    pub fn new(focus: FocusState) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            focus,
            projections: Vec::new(),
            execution_wave: 0,
            projection_wave: 0,
            max_waves: 1,
            options: ExecutionOptions::default(),
            channel: None,
            abort: AbortSignal::new(),
            fresh: false,
            activation_done: false,
        }
    }

    #[must_use]
    pub fn with_projection(mut self, projection: ProjectionState) -> Self {
        self.projections.push(projection);
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn execution_wave(&self) -> u32 {
        self.execution_wave
    }

    pub fn projection_wave(&self) -> u32 {
        self.projection_wave
    }

    pub fn max_waves(&self) -> u32 {
        self.max_waves
    }

    pub(crate) fn set_max_waves(&mut self, max_waves: u32) {
        self.max_waves = max_waves.max(1);
    }

    pub(crate) fn advance_execution_wave(&mut self) {
        self.execution_wave += 1;
    }

    pub(crate) fn advance_projection_wave(&mut self) {
        self.projection_wave += 1;
    }

    /// Restart projection from the current execution wave.
    pub(crate) fn reset_projection_wave(&mut self) {
        self.projection_wave = self.execution_wave;
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub(crate) fn mark_fresh(&mut self) {
        self.fresh = true;
    }

    /// Mark everything stale so the next pass reloads it.
    pub fn rot(&mut self) {
        self.fresh = false;
        for projection in &mut self.projections {
            projection.fresh = false;
        }
    }

    /// Drop stale projections that nothing explicitly asked for. Projections
    /// further down a chain are kept so their dependents can still see them.
    pub(crate) fn remove_rotten_projections(&mut self) -> usize {
        let before = self.projections.len();
        self.projections.retain(|p| {
            p.fresh
                || p.discriminator.order > 0
                || p.sync_decision != SyncDecision::Keep
                || p.primary_delta().is_some()
        });
        before - self.projections.len()
    }

    /// Find the projection matching a discriminator, ignoring tombstones.
    pub fn find_projection(&self, discriminator: &Discriminator) -> Option<usize> {
        self.projections.iter().position(|p| {
            !p.discriminator.tombstone
                && p.discriminator.matches(
                    discriminator.resource_id,
                    discriminator.kind,
                    &discriminator.intent,
                    discriminator.order,
                )
        })
    }

    /// Whether the wave loop has run past every wave.
    #[must_use]
    pub fn is_execution_complete(&self) -> bool {
        self.execution_wave >= self.max_waves
    }

    /// Limit of waves allowed by the configuration.
    pub(crate) fn check_wave_limit(&self, config: &ProjectorConfig) -> crate::ProjectorResult<()> {
        if self.max_waves > config.max_waves_limit {
            return Err(crate::ProjectorError::configuration(format!(
                "projection needs {} waves, limit is {}",
                self.max_waves, config.max_waves_limit
            )));
        }
        Ok(())
    }
}

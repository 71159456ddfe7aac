//! Wave-scheduled projector.
//!
//! Each pass refreshes the context, lets the focus processor compute focus
//! changes, orders projections into waves and computes the changes of the
//! projections that belong to the current projection wave:
//!
//! ```text
//!   load (if stale) -> preprocess -> focus -> activation (once)
//!        -> sort waves -> [ensure loaded -> outbound -> squeeze
//!                          -> consolidate -> credentials -> reconcile]*
//!        -> re-admit conflicts -> next wave
//! ```
//!
//! Projection computations of one wave may run concurrently; each works on its
//! own projection state and only reads the focus.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{
    ActivationProcessor, ContextLoader, DependencyProcessor, FocusProcessor, MappingEvaluator,
    NoopActivationProcessor, NoopFocusProcessor,
};
use crate::config::ProjectorConfig;
use crate::consolidation::{consolidate_items, ItemFamilyContext};
use crate::context::{AbortSignal, FocusState, ProjectionState, SyncContext, SyncDecision};
use crate::definition::ResourceObjectDefinition;
use crate::delta::{ObjectDelta, ObjectType};
use crate::dependency::DefaultDependencyProcessor;
use crate::error::{ProjectorError, ProjectorResult};
use crate::outbound::build_outbound_construction;
use crate::progress::{ProgressEvent, ProgressListener, ProgressPhase, TracingProgressListener};
use crate::reconciliation::reconcile_projection;
use crate::result::{OperationResult, OperationStatus};
use crate::squeeze::{squeeze, SqueezeMode};

/// How a projector run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    Completed,
    Aborted,
}

/// Computes focus and projection changes, wave by wave.
pub struct Projector {
    config: ProjectorConfig,
    loader: Arc<dyn ContextLoader>,
    evaluator: Arc<dyn MappingEvaluator>,
    focus_processor: Arc<dyn FocusProcessor>,
    activation: Arc<dyn ActivationProcessor>,
    dependencies: Arc<dyn DependencyProcessor>,
    listener: Arc<dyn ProgressListener>,
}

impl Projector {
    /// Create a projector with default focus, activation and dependency processing.
    pub fn new(loader: Arc<dyn ContextLoader>, evaluator: Arc<dyn MappingEvaluator>) -> Self {
        Self {
            config: ProjectorConfig::default(),
            loader,
            evaluator,
            focus_processor: Arc::new(NoopFocusProcessor),
            activation: Arc::new(NoopActivationProcessor),
            dependencies: Arc::new(DefaultDependencyProcessor::new()),
            listener: Arc::new(TracingProgressListener),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProjectorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_focus_processor(mut self, processor: Arc<dyn FocusProcessor>) -> Self {
        self.focus_processor = processor;
        self
    }

    #[must_use]
    pub fn with_activation_processor(mut self, processor: Arc<dyn ActivationProcessor>) -> Self {
        self.activation = processor;
        self
    }

    #[must_use]
    pub fn with_dependency_processor(mut self, processor: Arc<dyn DependencyProcessor>) -> Self {
        self.dependencies = processor;
        self
    }

    #[must_use]
    pub fn with_progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Compute the waves not yet executed, up to the current execution wave.
    #[instrument(skip(self, ctx, result), fields(request_id = %ctx.request_id))]
    pub async fn project(
        &self,
        ctx: &mut SyncContext,
        result: &mut OperationResult,
    ) -> ProjectorResult<ProjectionOutcome> {
        self.run(ctx, result, false).await
    }

    /// Compute every wave without executing anything in between.
    #[instrument(skip(self, ctx, result), fields(request_id = %ctx.request_id))]
    pub async fn project_all_waves(
        &self,
        ctx: &mut SyncContext,
        result: &mut OperationResult,
    ) -> ProjectorResult<ProjectionOutcome> {
        self.run(ctx, result, true).await
    }

    async fn run(
        &self,
        ctx: &mut SyncContext,
        result: &mut OperationResult,
        all_waves: bool,
    ) -> ProjectorResult<ProjectionOutcome> {
        loop {
            if ctx.abort.is_requested() {
                info!(wave = ctx.projection_wave(), "Projection aborted");
                return Ok(ProjectionOutcome::Aborted);
            }

            let mut wave_result = OperationResult::new("projector.wave");
            let outcome = self.project_wave(ctx, &mut wave_result).await;
            wave_result.compute_status();
            result.add_subresult(wave_result);
            outcome?;

            ctx.advance_projection_wave();
            let done = if all_waves {
                ctx.projection_wave() >= ctx.max_waves()
            } else {
                ctx.projection_wave() > ctx.execution_wave()
            };
            if done {
                return Ok(ProjectionOutcome::Completed);
            }
        }
    }

    async fn project_wave(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        let wave = ctx.projection_wave();
        debug!(wave, execution_wave = ctx.execution_wave(), "Projecting wave");

        if !ctx.is_fresh() {
            self.loader.load(ctx).await?;
            ctx.mark_fresh();
            let removed = ctx.remove_rotten_projections();
            if removed > 0 {
                debug!(removed, "Removed rotten projections");
            }
        }

        self.dependencies.preprocess(ctx)?;
        self.process_focus(ctx, result).await?;

        if !ctx.activation_done {
            let focus = &ctx.focus;
            for projection in ctx.projections.iter_mut().filter(|p| p.sync_decision.is_active()) {
                self.activation.process(focus, projection).await?;
            }
            ctx.projections.retain(|p| p.sync_decision != SyncDecision::Ignore);
            ctx.activation_done = true;
        }

        self.dependencies.sort_projections_to_waves(ctx)?;
        let max_waves = self.dependencies.compute_max_waves(ctx);
        ctx.set_max_waves(max_waves);
        ctx.check_wave_limit(&self.config)?;

        let mut ready = Vec::new();
        let mut unsatisfied = Vec::new();
        for (index, projection) in ctx.projections.iter().enumerate() {
            if projection.wave != wave
                || !projection.sync_decision.is_active()
                || projection.discriminator.tombstone
                || projection.conflict_detected
            {
                continue;
            }
            if self.dependencies.check_dependencies(ctx, index) {
                ready.push(index);
            } else {
                let mut skipped = OperationResult::new("projector.projection");
                skipped.record_not_applicable(format!(
                    "{}: dependencies not satisfied",
                    projection.discriminator
                ));
                result.add_subresult(skipped);
                unsatisfied.push(index);
            }
        }
        for (index, projection) in ctx.projections.iter_mut().enumerate() {
            if projection.wave == wave {
                projection.dependencies_unsatisfied = unsatisfied.contains(&index);
            }
        }
        self.compute_projections(ctx, &ready, result).await?;

        let conflicting: Vec<usize> = ctx
            .projections
            .iter()
            .enumerate()
            .filter(|(_, p)| p.wave == wave && p.conflict_detected && p.sync_decision.is_active())
            .map(|(index, _)| index)
            .collect();
        if !conflicting.is_empty() {
            for &index in &conflicting {
                let projection = &mut ctx.projections[index];
                projection.start_next_iteration();
                info!(
                    projection = %projection.discriminator,
                    iteration = projection.iteration,
                    "Re-admitting projection after conflict"
                );
            }
            self.compute_projections(ctx, &conflicting, result).await?;
        }
        Ok(())
    }

    async fn process_focus(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        let wave = ctx.projection_wave();
        self.listener
            .on_progress(&ProgressEvent::entering(ProgressPhase::Focus, None, wave));

        let mut focus_result = OperationResult::new("projector.focus");
        let outcome = match self.focus_processor.process(ctx, &mut focus_result).await {
            Ok(()) => ctx.focus.recompute(),
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            focus_result.record_fatal_error(err);
        }
        focus_result.compute_status();
        self.listener.on_progress(&ProgressEvent::exiting(
            ProgressPhase::Focus,
            None,
            wave,
            focus_result.status,
        ));
        result.add_subresult(focus_result);
        outcome
    }

    async fn compute_projections(
        &self,
        ctx: &mut SyncContext,
        indices: &[usize],
        result: &mut OperationResult,
    ) -> ProjectorResult<()> {
        if indices.is_empty() {
            return Ok(());
        }
        let wave = ctx.projection_wave();
        let abort = ctx.abort.clone();
        let focus = &ctx.focus;
        let selected: Vec<&mut ProjectionState> = ctx
            .projections
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| indices.contains(index))
            .map(|(_, projection)| projection)
            .collect();

        let outcomes = if self.config.concurrent_projections {
            join_all(
                selected
                    .into_iter()
                    .map(|projection| self.compute_projection(focus, projection, &abort, wave)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(selected.len());
            for projection in selected {
                outcomes.push(self.compute_projection(focus, projection, &abort, wave).await);
            }
            outcomes
        };

        let mut surfaced = None;
        for (projection_result, err) in outcomes {
            result.add_subresult(projection_result);
            if surfaced.is_none() {
                surfaced = err;
            }
        }
        surfaced.map_or(Ok(()), Err)
    }

    /// Compute one projection. Failures mark it broken; a policy violation is
    /// returned so the whole operation stops.
    async fn compute_projection(
        &self,
        focus: &FocusState,
        projection: &mut ProjectionState,
        abort: &AbortSignal,
        wave: u32,
    ) -> (OperationResult, Option<ProjectorError>) {
        let label = projection.discriminator.to_string();
        let mut result = OperationResult::new("projector.projection");
        if abort.is_requested() {
            result.record_not_applicable(format!("{label}: aborted"));
            return (result, None);
        }

        self.listener.on_progress(&ProgressEvent::entering(
            ProgressPhase::Projection,
            Some(label.clone()),
            wave,
        ));
        let surfaced = match self.compute(focus, projection).await {
            Ok(()) if projection.is_broken() => {
                let reason = projection.broken_reason.as_deref().unwrap_or("broken");
                result.status = OperationStatus::PartialError;
                result.message = Some(format!("{label}: {reason}"));
                None
            }
            Ok(()) => {
                result.record_success();
                result.message = Some(label.clone());
                None
            }
            Err(err) if err.is_policy_violation() => {
                result.record_fatal_error(&err);
                Some(err)
            }
            Err(err) => {
                warn!(projection = %label, error = %err, "Projection computation failed");
                projection.mark_broken(err.to_string());
                result.record_partial_error(&err);
                None
            }
        };
        self.listener.on_progress(&ProgressEvent::exiting(
            ProgressPhase::Projection,
            Some(label),
            wave,
            result.status,
        ));
        (result, surfaced)
    }

    async fn compute(&self, focus: &FocusState, projection: &mut ProjectionState) -> ProjectorResult<()> {
        self.loader.ensure_loaded(projection).await?;
        if projection.is_broken() {
            return Ok(());
        }

        let Some(mode) = SqueezeMode::for_decision(projection.sync_decision) else {
            projection.secondary_delta = None;
            projection.object_new = None;
            return Ok(());
        };
        if mode == SqueezeMode::Removed {
            projection.secondary_delta = projection
                .oid
                .clone()
                .map(|oid| ObjectDelta::delete(ObjectType::Shadow, oid));
            projection.object_new = None;
            return Ok(());
        }

        let outbound = build_outbound_construction(self.evaluator.as_ref(), focus, projection)?;
        let squeezed = squeeze(projection.constructions.iter().chain(outbound.as_ref()), mode);
        projection.squeezed_attributes = squeezed.attributes;
        projection.squeezed_associations = squeezed.associations;
        projection.squeezed_credentials = squeezed.credentials;

        let definition = projection.definition.clone().unwrap_or_else(|| {
            ResourceObjectDefinition::new(projection.discriminator.kind.as_str())
        });
        let items = ItemFamilyContext {
            definition: &definition,
            apriori: projection.primary_delta(),
            sync_delta: projection.sync_delta.as_ref(),
            current: projection.object_current.as_ref(),
            complete: projection.has_complete_state(),
            filter_existing_values: self.config.filter_existing_values,
        };
        let mut modifications = consolidate_items(&projection.squeezed_attributes, &items)?;
        modifications.extend(consolidate_items(&projection.squeezed_associations, &items)?);

        let credentials = ItemFamilyContext {
            current: None,
            complete: false,
            filter_existing_values: false,
            ..items
        };
        modifications.extend(consolidate_items(&projection.squeezed_credentials, &credentials)?);

        if self.config.reconcile_full_shadows {
            let drift = reconcile_projection(projection, &modifications);
            modifications.extend(drift);
        }
        debug!(
            projection = %projection.discriminator,
            changes = modifications.len(),
            "Computed projection changes"
        );

        projection.secondary_delta = Some(ObjectDelta::modify(
            ObjectType::Shadow,
            projection.oid.clone(),
            modifications,
        ));
        projection.object_new = match projection.execution_delta()? {
            Some(delta) if delta.is_add() || projection.object_current.is_some() => {
                delta.apply_to(projection.object_current.as_ref())?
            }
            Some(_) => None,
            None => projection.object_current.clone(),
        };
        Ok(())
    }
}

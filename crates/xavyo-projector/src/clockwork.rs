//! Clockwork: alternates projection and execution until every wave is done.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::ProjectorConfig;
use crate::context::SyncContext;
use crate::error::{ProjectorError, ProjectorResult};
use crate::executor::{ChangeExecutor, ExecutionOutcome};
use crate::projector::{ProjectionOutcome, Projector};
use crate::result::OperationResult;

/// Drives a [`SyncContext`] through projection and execution.
pub struct Clockwork {
    projector: Arc<Projector>,
    executor: Arc<ChangeExecutor>,
    config: ProjectorConfig,
}

impl Clockwork {
    pub fn new(projector: Arc<Projector>, executor: Arc<ChangeExecutor>) -> Self {
        let config = projector.config().clone();
        Self {
            projector,
            executor,
            config,
        }
    }

    pub fn with_config(mut self, config: ProjectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the operation to completion.
    ///
    /// Projection errors and focus execution failures are recorded as fatal
    /// in `result` and returned. Projection failures that only break one
    /// projection end as a partial error in `result`.
    #[instrument(skip(self, ctx, result), fields(request_id = %ctx.request_id, channel = ?ctx.channel))]
    pub async fn run(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        let outcome = self.click_until_done(ctx, result).await;
        if let Err(err) = &outcome {
            warn!(error = %err, "Operation failed");
            result.record_fatal_error(err);
        }
        result.compute_status();
        info!(status = %result.status, waves = ctx.execution_wave(), "Operation finished");
        outcome
    }

    async fn click_until_done(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        if ctx.options.preview {
            if self.projector.project_all_waves(ctx, result).await? == ProjectionOutcome::Aborted {
                result.record_not_applicable("aborted");
            }
            return Ok(());
        }

        let mut restarts = 0u32;
        loop {
            if self.projector.project(ctx, result).await? == ProjectionOutcome::Aborted {
                result.record_not_applicable("aborted");
                return Ok(());
            }

            match self.executor.execute(ctx, result).await? {
                ExecutionOutcome::Completed => {}
                ExecutionOutcome::RestartRequested => {
                    restarts += 1;
                    if restarts > self.config.max_restarts {
                        return Err(ProjectorError::internal(format!(
                            "operation restarted {restarts} times, giving up"
                        )));
                    }
                    info!(restarts, wave = ctx.execution_wave(), "Restarting wave");
                    ctx.rot();
                    ctx.reset_projection_wave();
                    continue;
                }
                ExecutionOutcome::Aborted => {
                    result.record_not_applicable("aborted");
                    return Ok(());
                }
            }

            if ctx.is_execution_complete() {
                return Ok(());
            }
        }
    }

    /// Compute every wave without executing anything.
    #[instrument(skip(self, ctx, result), fields(request_id = %ctx.request_id))]
    pub async fn preview(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        let outcome = self.projector.project_all_waves(ctx, result).await;
        match &outcome {
            Ok(ProjectionOutcome::Aborted) => result.record_not_applicable("aborted"),
            Ok(ProjectionOutcome::Completed) => {}
            Err(err) => result.record_fatal_error(err),
        }
        result.compute_status();
        outcome.map(|_| ())
    }
}

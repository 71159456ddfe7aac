//! Change executor.
//!
//! Applies the focus delta and then the deltas of the projections in the
//! current execution wave, lowest order first. Every delta goes through the
//! idempotency check; every attempt is recorded in the owner's executed
//! deltas. A projection failure breaks only that projection; a uniqueness
//! conflict on account creation asks the caller to restart the wave.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{ObjectStore, ResourceLayer};
use crate::context::{ExecutedDelta, SyncContext};
use crate::delta::{DeltaChange, ItemDelta, ObjectDelta, ObjectSnapshot, ObjectType, ShadowCoordinates};
use crate::error::{ProjectorError, ProjectorResult};
use crate::idempotency::{self, IdempotencyDecision};
use crate::result::OperationResult;
use crate::shadow::{SyncSituation, LINK_REF_ITEM, SITUATION_ITEM};

/// How an execution pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The wave was executed and the execution wave advanced.
    Completed,
    /// A conflict needs the wave to be computed again.
    RestartRequested,
    Aborted,
}

/// Where the changes of one object go.
#[async_trait]
pub trait ChangeTarget: Send + Sync {
    async fn create(&self, object: ObjectSnapshot) -> ProjectorResult<String>;

    /// Returns the oid after the change.
    async fn modify(&self, oid: &str, modifications: &[ItemDelta]) -> ProjectorResult<String>;

    async fn delete(&self, oid: &str) -> ProjectorResult<()>;
}

/// Focus objects in the object store.
pub struct FocusTarget {
    store: Arc<dyn ObjectStore>,
    object_type: ObjectType,
}

#[async_trait]
impl ChangeTarget for FocusTarget {
    async fn create(&self, object: ObjectSnapshot) -> ProjectorResult<String> {
        self.store.add(object).await
    }

    async fn modify(&self, oid: &str, modifications: &[ItemDelta]) -> ProjectorResult<String> {
        self.store.modify(self.object_type, oid, modifications).await?;
        Ok(oid.to_string())
    }

    async fn delete(&self, oid: &str) -> ProjectorResult<()> {
        self.store.delete(self.object_type, oid).await
    }
}

/// Accounts on a resource.
pub struct ProjectionTarget {
    resources: Arc<dyn ResourceLayer>,
    coordinates: ShadowCoordinates,
}

#[async_trait]
impl ChangeTarget for ProjectionTarget {
    async fn create(&self, object: ObjectSnapshot) -> ProjectorResult<String> {
        self.resources.add(object).await
    }

    async fn modify(&self, oid: &str, modifications: &[ItemDelta]) -> ProjectorResult<String> {
        self.resources.modify(&self.coordinates, oid, modifications).await
    }

    async fn delete(&self, oid: &str) -> ProjectorResult<()> {
        self.resources.delete(&self.coordinates, oid).await
    }
}

/// Send one delta to its target. Returns the resulting oid, `None` after a delete.
async fn dispatch(target: &dyn ChangeTarget, delta: &ObjectDelta) -> ProjectorResult<Option<String>> {
    match &delta.change {
        DeltaChange::Add { object } => target.create(object.clone()).await.map(Some),
        DeltaChange::Modify { modifications } => {
            let oid = delta
                .oid
                .as_deref()
                .ok_or_else(|| ProjectorError::schema("modify delta without oid"))?;
            target.modify(oid, modifications).await.map(Some)
        }
        DeltaChange::Delete => {
            let oid = delta
                .oid
                .as_deref()
                .ok_or_else(|| ProjectorError::schema("delete delta without oid"))?;
            target.delete(oid).await.map(|()| None)
        }
    }
}

/// Fold a successfully executed delta into the known current state.
fn fold(
    current: Option<&ObjectSnapshot>,
    delta: &ObjectDelta,
    oid: Option<&str>,
) -> ProjectorResult<Option<ObjectSnapshot>> {
    if !delta.is_add() && current.is_none() {
        return Ok(None);
    }
    let mut folded = delta.apply_to(current)?;
    if let (Some(object), Some(oid)) = (folded.as_mut(), oid) {
        object.oid = Some(oid.to_string());
    }
    Ok(folded)
}

/// Drop the parts of a MODIFY already reflected by the current object.
fn narrowed(delta: ObjectDelta, current: Option<&ObjectSnapshot>) -> ObjectDelta {
    match current {
        Some(current) if matches!(delta.change, DeltaChange::Modify { .. }) => delta.narrow(current),
        _ => delta,
    }
}

/// Result of executing one projection.
struct ProjectionExecution {
    restart: bool,
    deleted: bool,
    /// Oid of the account before execution, for link maintenance after deletion.
    oid_before: Option<String>,
}

/// Applies computed changes.
pub struct ChangeExecutor {
    store: Arc<dyn ObjectStore>,
    resources: Arc<dyn ResourceLayer>,
}

impl ChangeExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, resources: Arc<dyn ResourceLayer>) -> Self {
        Self { store, resources }
    }

    /// Execute the current execution wave.
    #[instrument(skip(self, ctx, result), fields(request_id = %ctx.request_id, wave = ctx.execution_wave()))]
    pub async fn execute(
        &self,
        ctx: &mut SyncContext,
        result: &mut OperationResult,
    ) -> ProjectorResult<ExecutionOutcome> {
        if ctx.abort.is_requested() {
            return Ok(ExecutionOutcome::Aborted);
        }

        self.execute_focus(ctx, result).await?;

        let wave = ctx.execution_wave();
        let mut ready: Vec<usize> = ctx
            .projections
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.wave == wave
                    && p.sync_decision.is_active()
                    && !p.discriminator.tombstone
                    && !p.dependencies_unsatisfied
            })
            .map(|(index, _)| index)
            .collect();
        ready.sort_by_key(|&index| ctx.projections[index].discriminator.order);

        let mut restart = false;
        for index in ready {
            if ctx.abort.is_requested() {
                info!(wave, "Execution aborted");
                return Ok(ExecutionOutcome::Aborted);
            }
            let mut projection_result = OperationResult::new("executor.projection");
            let execution = self.execute_projection(ctx, index, &mut projection_result).await?;
            if execution.restart {
                restart = true;
            } else if !ctx.projections[index].is_broken() {
                self.maintain_link(ctx, index, &execution, &mut projection_result).await;
                self.update_situation(ctx, index, &execution, &mut projection_result)
                    .await;
            }
            projection_result.compute_status();
            result.add_subresult(projection_result);
        }

        if restart {
            info!(wave, "Restart requested");
            return Ok(ExecutionOutcome::RestartRequested);
        }
        ctx.advance_execution_wave();
        Ok(ExecutionOutcome::Completed)
    }

    async fn execute_focus(&self, ctx: &mut SyncContext, result: &mut OperationResult) -> ProjectorResult<()> {
        let wave = ctx.execution_wave();
        let mut focus_result = OperationResult::new("executor.focus");
        let pending = ctx.focus.pending_delta()?;
        ctx.focus.mark_primary_executed();
        ctx.focus.secondary_delta = None;

        let Some(delta) = pending.map(|d| narrowed(d, ctx.focus.object_current.as_ref())) else {
            focus_result.record_not_applicable("no focus changes");
            result.add_subresult(focus_result);
            return Ok(());
        };
        if delta.is_empty() {
            focus_result.record_not_applicable("no focus changes");
            result.add_subresult(focus_result);
            return Ok(());
        }

        let delta = match idempotency::check(ctx.focus.executed_deltas(), delta)? {
            IdempotencyDecision::Skip => {
                debug!("Focus delta already executed");
                focus_result.record_success();
                result.add_subresult(focus_result);
                return Ok(());
            }
            IdempotencyDecision::Execute(delta) | IdempotencyDecision::ExecuteDifference(delta) => delta,
        };

        let target = FocusTarget {
            store: self.store.clone(),
            object_type: ctx.focus.object_type,
        };
        match dispatch(&target, &delta).await {
            Ok(oid) => {
                let current = fold(ctx.focus.object_current.as_ref(), &delta, oid.as_deref())?;
                ctx.focus.object_current = current;
                ctx.focus
                    .record_executed(ExecutedDelta::succeeded(delta, wave, oid)?);
                ctx.focus.recompute()?;
                focus_result.record_success();
                result.add_subresult(focus_result);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Focus change failed");
                ctx.focus
                    .record_executed(ExecutedDelta::failed(delta, wave, &err)?);
                focus_result.record_fatal_error(&err);
                result.add_subresult(focus_result);
                Err(err)
            }
        }
    }

    async fn execute_projection(
        &self,
        ctx: &mut SyncContext,
        index: usize,
        result: &mut OperationResult,
    ) -> ProjectorResult<ProjectionExecution> {
        let wave = ctx.execution_wave();
        let projection = &mut ctx.projections[index];
        let label = projection.discriminator.to_string();
        let mut execution = ProjectionExecution {
            restart: false,
            deleted: false,
            oid_before: projection.oid.clone(),
        };

        let delta = match projection.execution_delta() {
            Ok(Some(delta)) => narrowed(delta, projection.object_current.as_ref()),
            Ok(None) => {
                result.record_success();
                result.message = Some(label);
                return Ok(execution);
            }
            Err(err) => {
                projection.mark_broken(err.to_string());
                result.record_partial_error(&err);
                return Ok(execution);
            }
        };
        if delta.is_empty() {
            result.record_success();
            result.message = Some(label);
            return Ok(execution);
        }

        let delta = match idempotency::check(projection.executed_deltas(), delta)? {
            IdempotencyDecision::Skip => {
                debug!(projection = %label, "Projection delta already executed");
                result.record_success();
                result.message = Some(label);
                return Ok(execution);
            }
            IdempotencyDecision::Execute(delta) => delta,
            IdempotencyDecision::ExecuteDifference(delta) => {
                debug!(projection = %label, "Executing difference to earlier add");
                delta
            }
        };

        let target = ProjectionTarget {
            resources: self.resources.clone(),
            coordinates: projection.coordinates(),
        };
        match dispatch(&target, &delta).await {
            Ok(oid) => {
                if delta.is_delete() {
                    execution.deleted = true;
                    projection.oid = None;
                    projection.object_current = None;
                } else {
                    projection.object_current =
                        fold(projection.object_current.as_ref(), &delta, oid.as_deref())?;
                    if oid.is_some() {
                        projection.oid.clone_from(&oid);
                    }
                }
                projection.record_executed(ExecutedDelta::succeeded(delta, wave, oid)?);
                result.record_success();
                result.message = Some(label);
            }
            Err(err) if err.is_already_exists() && delta.is_add() => {
                let fingerprint = delta.fingerprint()?;
                let repeated = projection.executed_deltas().iter().any(|e| {
                    !e.is_success()
                        && e.fingerprint == fingerprint
                        && e.error_code.as_deref() == Some(err.error_code())
                });
                projection.record_executed(ExecutedDelta::failed(delta, wave, &err)?);
                if repeated {
                    warn!(projection = %label, "Repeated uniqueness conflict");
                    projection.mark_broken(err.to_string());
                    result.record_partial_error(&err);
                } else {
                    info!(projection = %label, iteration = projection.iteration, "Uniqueness conflict, restarting");
                    projection.conflict_detected = true;
                    result.record_handled_error(&err);
                    execution.restart = true;
                }
            }
            Err(err) if err.is_not_found() && delta.is_delete() => {
                projection.record_executed(ExecutedDelta::failed(delta, wave, &err)?);
                execution.deleted = true;
                projection.oid = None;
                projection.object_current = None;
                result.record_handled_error(&err);
                result.message = Some(format!("{label}: account was already gone"));
            }
            Err(err) => {
                warn!(projection = %label, error = %err, "Projection change failed");
                projection.record_executed(ExecutedDelta::failed(delta, wave, &err)?);
                projection.mark_broken(err.to_string());
                result.record_partial_error(&err);
            }
        }
        Ok(execution)
    }

    /// Add or remove the focus link to the projection's account.
    async fn maintain_link(
        &self,
        ctx: &mut SyncContext,
        index: usize,
        execution: &ProjectionExecution,
        result: &mut OperationResult,
    ) {
        let projection = &ctx.projections[index];
        let linked = projection.sync_decision.is_linked() && !execution.deleted;
        let Some(account_oid) = projection.oid.clone().or_else(|| execution.oid_before.clone()) else {
            return;
        };
        let Some(focus_oid) = ctx.focus.oid().map(str::to_string) else {
            return;
        };
        let link = serde_json::Value::from(account_oid.as_str());
        let has_link = ctx
            .focus
            .object_current
            .as_ref()
            .is_some_and(|f| f.has_value(LINK_REF_ITEM, &link));
        let item = match (linked, has_link) {
            (true, false) => ItemDelta::add(LINK_REF_ITEM, vec![link]),
            (false, true) => ItemDelta::delete(LINK_REF_ITEM, vec![link]),
            _ => return,
        };

        let wave = ctx.execution_wave();
        let delta = ObjectDelta::modify(ctx.focus.object_type, Some(focus_oid.clone()), vec![item.clone()]);
        let mut link_result = OperationResult::new("executor.link");
        match self
            .store
            .modify(ctx.focus.object_type, &focus_oid, std::slice::from_ref(&item))
            .await
        {
            Ok(()) => {
                debug!(account = %account_oid, linked, "Updated focus link");
                if let Some(focus) = ctx.focus.object_current.as_mut() {
                    let mut links = focus.values(LINK_REF_ITEM).to_vec();
                    item.apply_to(&mut links);
                    focus.set_values(LINK_REF_ITEM, links);
                }
                if let Ok(executed) = ExecutedDelta::succeeded(delta, wave, Some(focus_oid)) {
                    ctx.focus.record_executed(executed);
                }
                link_result.record_success();
            }
            Err(err) => {
                warn!(account = %account_oid, error = %err, "Cannot update focus link");
                if let Ok(executed) = ExecutedDelta::failed(delta, wave, &err) {
                    ctx.focus.record_executed(executed);
                }
                link_result.record_partial_error(&err);
            }
        }
        result.add_subresult(link_result);
    }

    /// Write the synchronization situation to the shadow record when it changed.
    async fn update_situation(
        &self,
        ctx: &mut SyncContext,
        index: usize,
        execution: &ProjectionExecution,
        result: &mut OperationResult,
    ) {
        let projection = &mut ctx.projections[index];
        let situation = SyncSituation::after_execution(projection.sync_decision, execution.deleted);
        if situation == projection.synchronization_situation {
            return;
        }
        let Some(oid) = projection.oid.clone().or_else(|| execution.oid_before.clone()) else {
            return;
        };

        let mut situation_result = OperationResult::new("executor.situation");
        let item = SyncSituation::item_delta(situation);
        let written = match self
            .store
            .modify(ObjectType::Shadow, &oid, std::slice::from_ref(&item))
            .await
        {
            Ok(()) => {
                situation_result.record_success();
                true
            }
            Err(err) if err.is_not_found() => match situation {
                Some(SyncSituation::Linked) => {
                    let record = ObjectSnapshot::shadow(projection.coordinates())
                        .with_oid(oid.clone())
                        .with_value(SITUATION_ITEM, SyncSituation::Linked.as_str());
                    match self.store.add(record).await {
                        Ok(_) => {
                            situation_result.record_success();
                            true
                        }
                        Err(err) => {
                            warn!(shadow = %oid, error = %err, "Cannot create shadow record");
                            situation_result.record_warning(err.to_string());
                            false
                        }
                    }
                }
                _ => {
                    debug!(shadow = %oid, "Shadow record is gone, situation not written");
                    situation_result.record_handled_error(&err);
                    true
                }
            },
            Err(err) => {
                warn!(shadow = %oid, error = %err, "Cannot write synchronization situation");
                situation_result.record_warning(err.to_string());
                false
            }
        };
        if written {
            projection.synchronization_situation = situation;
        }
        result.add_subresult(situation_result);
    }
}

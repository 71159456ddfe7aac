//! Projection dependencies and wave ordering.

use tracing::debug;

use crate::collaborators::DependencyProcessor;
use crate::context::{DependencyStrictness, ProjectionDependency, SyncContext};
use crate::error::{ProjectorError, ProjectorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done(u32),
}

/// Waves from declared dependencies: a projection runs one wave after the
/// latest of its dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDependencyProcessor;

impl DefaultDependencyProcessor {
    pub fn new() -> Self {
        Self
    }

    fn resolve(ctx: &SyncContext, dependency: &ProjectionDependency) -> Option<usize> {
        ctx.projections
            .iter()
            .position(|p| !p.discriminator.tombstone && dependency.targets(&p.discriminator))
    }

    fn wave_of(ctx: &SyncContext, index: usize, visits: &mut [Visit]) -> ProjectorResult<u32> {
        match visits[index] {
            Visit::Done(wave) => return Ok(wave),
            Visit::InProgress => {
                return Err(ProjectorError::configuration(format!(
                    "dependency cycle involving projection {}",
                    ctx.projections[index].discriminator
                )))
            }
            Visit::Unvisited => {}
        }
        visits[index] = Visit::InProgress;

        let mut wave = 0;
        for dependency in &ctx.projections[index].dependencies {
            if let Some(target) = Self::resolve(ctx, dependency) {
                wave = wave.max(Self::wave_of(ctx, target, visits)? + 1);
            }
        }

        visits[index] = Visit::Done(wave);
        Ok(wave)
    }
}

impl DependencyProcessor for DefaultDependencyProcessor {
    fn preprocess(&self, ctx: &mut SyncContext) -> ProjectorResult<()> {
        for projection in &mut ctx.projections {
            let d = &projection.discriminator;
            if d.order == 0 {
                continue;
            }
            let implicit = ProjectionDependency {
                resource_id: d.resource_id,
                kind: d.kind,
                intent: d.intent.clone(),
                order: d.order - 1,
                strictness: DependencyStrictness::Strict,
            };
            let present = projection.dependencies.iter().any(|dep| {
                dep.resource_id == implicit.resource_id
                    && dep.kind == implicit.kind
                    && dep.intent == implicit.intent
                    && dep.order == implicit.order
            });
            if !present {
                projection.dependencies.push(implicit);
            }
        }
        Ok(())
    }

    fn sort_projections_to_waves(&self, ctx: &mut SyncContext) -> ProjectorResult<()> {
        let mut visits = vec![Visit::Unvisited; ctx.projections.len()];
        let mut waves = Vec::with_capacity(ctx.projections.len());
        for index in 0..ctx.projections.len() {
            waves.push(Self::wave_of(ctx, index, &mut visits)?);
        }
        for (projection, wave) in ctx.projections.iter_mut().zip(waves) {
            if projection.wave != wave {
                debug!(projection = %projection.discriminator, wave, "Assigned projection wave");
            }
            projection.wave = wave;
        }
        Ok(())
    }

    fn compute_max_waves(&self, ctx: &SyncContext) -> u32 {
        ctx.projections
            .iter()
            .map(|p| p.wave + 1)
            .max()
            .unwrap_or(1)
            .max(1)
    }

    fn check_dependencies(&self, ctx: &SyncContext, index: usize) -> bool {
        let Some(projection) = ctx.projections.get(index) else {
            return false;
        };
        projection.dependencies.iter().all(|dependency| {
            let target = Self::resolve(ctx, dependency).map(|i| &ctx.projections[i]);
            let satisfied = match (dependency.strictness, target) {
                (DependencyStrictness::Lax, _) => true,
                (DependencyStrictness::Relaxed, None) => true,
                (_, Some(target)) => !target.is_broken(),
                (DependencyStrictness::Strict, None) => false,
            };
            if !satisfied {
                debug!(
                    projection = %projection.discriminator,
                    dependency = %dependency,
                    "Dependency not satisfied"
                );
            }
            satisfied
        })
    }
}

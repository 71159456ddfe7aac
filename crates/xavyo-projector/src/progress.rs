//! Progress reporting.

use std::fmt;

use tracing::{debug, info};

use crate::result::OperationStatus;

/// Part of the computation an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Focus,
    Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Entering,
    Exiting,
}

/// One step of the computation starting or finishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub state: ProgressState,
    /// Discriminator of the projection, for projection events.
    pub projection: Option<String>,
    pub wave: u32,
    /// Set on exit.
    pub outcome: Option<OperationStatus>,
}

impl ProgressEvent {
    pub fn entering(phase: ProgressPhase, projection: Option<String>, wave: u32) -> Self {
        Self {
            phase,
            state: ProgressState::Entering,
            projection,
            wave,
            outcome: None,
        }
    }

    pub fn exiting(
        phase: ProgressPhase,
        projection: Option<String>,
        wave: u32,
        outcome: OperationStatus,
    ) -> Self {
        Self {
            phase,
            state: ProgressState::Exiting,
            projection,
            wave,
            outcome: Some(outcome),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            ProgressState::Entering => "entering",
            ProgressState::Exiting => "exiting",
        };
        let phase = match self.phase {
            ProgressPhase::Focus => "focus",
            ProgressPhase::Projection => "projection",
        };
        write!(f, "{state} {phase}")?;
        if let Some(projection) = &self.projection {
            write!(f, " {projection}")?;
        }
        write!(f, " (wave {})", self.wave)?;
        if let Some(outcome) = self.outcome {
            write!(f, ": {outcome}")?;
        }
        Ok(())
    }
}

/// Receives progress events. Implementations must be cheap; they are called
/// inline from the wave loop.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Logs progress events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressListener;

impl ProgressListener for TracingProgressListener {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.state {
            ProgressState::Entering => debug!(
                wave = event.wave,
                projection = event.projection.as_deref(),
                "{event}"
            ),
            ProgressState::Exiting => info!(
                wave = event.wave,
                projection = event.projection.as_deref(),
                outcome = event.outcome.map(|o| o.as_str()),
                "{event}"
            ),
        }
    }
}

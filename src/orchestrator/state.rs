//! Per-invocation build state

use crate::builders::Framework;
use crate::error::{SparkleError, SparkleResult};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// Where a build stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotConfigured,
    Configured,
    Built,
    Archived,
    Signed,
    Launched,
}

impl BuildState {
    /// Forward edges: archive and signing are optional before launch
    pub fn can_transition_to(self, next: BuildState) -> bool {
        use BuildState::*;
        matches!(
            (self, next),
            (NotConfigured, Configured)
                | (Configured, Built)
                | (Built, Archived)
                | (Archived, Signed)
                | (Built | Archived | Signed, Launched)
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::NotConfigured => "not configured",
            BuildState::Configured => "configured",
            BuildState::Built => "built",
            BuildState::Archived => "archived",
            BuildState::Signed => "signed",
            BuildState::Launched => "launched",
        };
        write!(f, "{}", name)
    }
}

/// Tracks one framework's state and when it last changed
#[derive(Debug, Clone)]
pub struct BuildTracker {
    framework: Framework,
    state: BuildState,
    updated_at: DateTime<Utc>,
}

impl BuildTracker {
    pub fn new(framework: Framework) -> Self {
        Self {
            framework,
            state: BuildState::NotConfigured,
            updated_at: Utc::now(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Move to `next`; any edge outside the lifecycle is a bug
    pub fn advance(&mut self, next: BuildState) -> SparkleResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(SparkleError::Internal(format!(
                "{} build cannot go from {} to {}",
                self.framework, self.state, next
            )));
        }

        let now = Utc::now();
        debug!(
            "{}: {} -> {} after {}ms",
            self.framework,
            self.state,
            next,
            (now - self.updated_at).num_milliseconds()
        );
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}

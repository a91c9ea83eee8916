//! Production system - per-factory cycle state
//!
//! A factory runs one blueprint at a time. A cycle consumes the ingredients
//! up front, reserves space for the products, and completes when progress
//! reaches 1. Progress grows linearly at `progress_delta` per time unit.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Blueprint;
use crate::params::EconomyParams;
use crate::types::{EntityId, JobId, SimTime};

/// Where a factory is in its cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProductionState {
    Idle,
    Running,
}

/// Progress per time unit for a blueprint with the given crew.
///
/// `1 / fte` at full strength. Blueprints that need nobody always run at full
/// strength; otherwise the rate scales linearly with `workers / required`
/// (above 1 for a larger crew) and drops by the understaffed penalty when
/// short-handed. 0 means the cycle cannot advance.
pub fn production_delta(blueprint: &Blueprint, workers: usize, params: &EconomyParams) -> f64 {
    let fte = blueprint.options.full_time_equivalent;
    if fte <= 0.0 {
        return 0.0;
    }
    let base = 1.0 / fte;
    let required = blueprint.options.workers_required as usize;
    if required == 0 {
        return base;
    }
    if workers == 0 {
        return 0.0;
    }
    let crew = workers as f64 / required as f64;
    if workers < required {
        base * crew * params.understaffed_penalty
    } else {
        base * crew
    }
}

/// Cycle state of one factory
#[derive(Clone, Debug)]
pub struct ProductionSystem {
    pub(crate) factory: EntityId,
    pub(crate) blueprint: Option<Arc<Blueprint>>,
    pub(crate) state: ProductionState,
    /// Fraction of the current cycle done, in `[0, 1]`
    pub(crate) progress: f64,
    pub(crate) progress_delta: f64,
    pub(crate) last_update: SimTime,
    pub(crate) workers: BTreeSet<EntityId>,
    /// Staffing posting for the current blueprint
    pub(crate) posted_job: Option<JobId>,
    /// Bumped whenever the scheduled completion changes
    pub(crate) cycle_generation: u64,
    /// Bumped whenever an idle timeout is scheduled or cancelled
    pub(crate) idle_generation: u64,
    pub(crate) idle_timeout_pending: bool,
    pub(crate) cycles_completed: u64,
}

impl ProductionSystem {
    pub fn new(factory: EntityId, now: SimTime) -> Self {
        ProductionSystem {
            factory,
            blueprint: None,
            state: ProductionState::Idle,
            progress: 0.0,
            progress_delta: 0.0,
            last_update: now,
            workers: BTreeSet::new(),
            posted_job: None,
            cycle_generation: 0,
            idle_generation: 0,
            idle_timeout_pending: false,
            cycles_completed: 0,
        }
    }

    pub fn factory(&self) -> EntityId {
        self.factory
    }

    pub fn blueprint(&self) -> Option<&Arc<Blueprint>> {
        self.blueprint.as_ref()
    }

    pub fn state(&self) -> ProductionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ProductionState::Running
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn progress_delta(&self) -> f64 {
        self.progress_delta
    }

    pub fn workers(&self) -> &BTreeSet<EntityId> {
        &self.workers
    }

    pub fn posted_job(&self) -> Option<JobId> {
        self.posted_job
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Bring progress up to `now` at the current rate
    pub(crate) fn sync_progress(&mut self, now: SimTime) {
        if now > self.last_update && self.is_running() {
            let elapsed = (now - self.last_update) as f64;
            self.progress = (self.progress + elapsed * self.progress_delta).min(1.0);
        }
        self.last_update = self.last_update.max(now);
    }

    /// When the running cycle reaches 1 at the current rate
    pub(crate) fn completion_time(&self) -> Option<SimTime> {
        if !self.is_running() || self.progress_delta <= 0.0 {
            return None;
        }
        let remaining = (1.0 - self.progress).max(0.0);
        // Guard against 1/delta landing a hair above a whole number
        let duration = (remaining / self.progress_delta - 1e-9).ceil().max(0.0);
        Some(self.last_update + duration as SimTime)
    }
}

//! Configuration parameters for the settlement economy

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SimTime;

/// What the scheduler does when an activity hits an allocation or
/// reservation error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultPolicy {
    /// Stop the simulation and return the error to the caller
    Halt,
    /// Log the fault and discard the failing activity
    Drop,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            FaultPolicy::Halt
        } else {
            FaultPolicy::Drop
        }
    }
}

/// Main configuration for the economy engine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyParams {
    // Hauling
    /// Time units needed to load or unload one full stack of cargo
    pub load_time_per_stack: SimTime,
    /// Largest haul a single transport job may carry, in stacks of the material
    pub max_haul_stacks: u32,
    /// Upper bound on deals taken per material in one planning pass
    pub max_deals_per_pass: usize,

    // Scoring
    /// Travel distance at which a job's desirability bottoms out
    pub score_distance_cutoff: f64,
    /// Lowest desirability a reachable, eligible job can have
    pub min_distance_factor: f64,
    /// Desirability of a production job next door
    pub production_base_score: f64,
    /// Multiplier making transport mildly preferred over production
    pub transport_score_boost: f64,

    // Production
    /// Rate multiplier applied when a factory runs with fewer workers than required
    pub understaffed_penalty: f64,
    /// Time a factory waits while idle before dismissing its workers
    pub idle_timeout: SimTime,

    // Bookkeeping
    /// Maximum entries retained in the activity log
    pub activity_log_capacity: usize,
    /// Maximum status lines retained per agent
    pub agent_status_capacity: usize,
    /// Behaviour on allocation/reservation faults inside activities
    pub fault_policy: FaultPolicy,
}

impl Default for EconomyParams {
    fn default() -> Self {
        EconomyParams {
            // Hauling
            load_time_per_stack: 1000,
            max_haul_stacks: 2,
            max_deals_per_pass: 64,

            // Scoring
            score_distance_cutoff: 100.0,
            min_distance_factor: 0.01,
            production_base_score: 0.9,
            transport_score_boost: 1.05,

            // Production
            understaffed_penalty: 0.3,
            idle_timeout: 1,

            // Bookkeeping
            activity_log_capacity: 200,
            agent_status_capacity: 20,
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl EconomyParams {
    /// Load parameters from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Params for quick test runs: everything the defaults have, but faults always halt
    pub fn strict() -> Self {
        EconomyParams {
            fault_policy: FaultPolicy::Halt,
            ..Self::default()
        }
    }

    /// Linear distance decay shared by every job score, floored at `min_distance_factor`.
    pub fn distance_factor(&self, distance: f64) -> f64 {
        if self.score_distance_cutoff <= 0.0 {
            return self.min_distance_factor;
        }
        (1.0 - distance / self.score_distance_cutoff).max(self.min_distance_factor)
    }
}

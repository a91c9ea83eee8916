//! Activity Log System
//!
//! Records what the economy did (hauls, production cycles, job postings,
//! faults) so a UI or a report can show it. This is the event-log
//! collaborator that allocation faults are reported to.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};

use crate::types::{EntityId, JobId, SimTime, TileCoord};

/// Default number of entries kept when no capacity is configured
const DEFAULT_ACTIVITY_ENTRIES: usize = 200;

/// Category of activity event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCategory {
    /// Cargo picked up, carried or delivered
    Transport,
    /// Production cycle started, stopped or completed
    Production,
    /// Job posted, assigned, finished or withdrawn
    Jobs,
    /// Notable stock movement outside of a job
    Inventory,
    /// A worker died or was hurt
    Danger,
    /// Allocation or reservation error inside an activity
    Fault,
}

impl ActivityCategory {
    /// Get short label for display
    pub fn label(&self) -> &'static str {
        match self {
            ActivityCategory::Transport => "HAUL",
            ActivityCategory::Production => "PROD",
            ActivityCategory::Jobs => "JOB",
            ActivityCategory::Inventory => "INV",
            ActivityCategory::Danger => "!!",
            ActivityCategory::Fault => "ERR",
        }
    }

    /// Default importance for entries of this category
    pub fn importance(&self) -> u8 {
        match self {
            ActivityCategory::Fault => 10,
            ActivityCategory::Danger => 9,
            ActivityCategory::Production => 4,
            ActivityCategory::Transport => 3,
            ActivityCategory::Jobs => 2,
            ActivityCategory::Inventory => 1,
        }
    }
}

/// Entity involved in an activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActivityEntity {
    Agent { id: EntityId, name: String },
    Building { id: EntityId, name: String },
    Job { id: JobId },
}

impl ActivityEntity {
    pub fn name(&self) -> String {
        match self {
            ActivityEntity::Agent { name, .. } => name.clone(),
            ActivityEntity::Building { name, .. } => name.clone(),
            ActivityEntity::Job { id } => id.to_string(),
        }
    }
}

/// An activity log entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Time when this happened
    pub time: SimTime,
    /// Where it happened (if it has a place)
    pub location: Option<TileCoord>,
    pub category: ActivityCategory,
    /// Short description
    pub message: String,
    /// Entity involved (if any)
    pub entity: Option<ActivityEntity>,
    /// Importance (higher = more important)
    pub importance: u8,
}

/// Counters for stats
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_events: u64,
    pub deliveries: u64,
    pub cycles_completed: u64,
    pub jobs_posted: u64,
    pub abandoned_jobs: u64,
    pub faults: u64,
}

/// The activity log store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
    pub stats: ActivityStats,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_ENTRIES)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ActivityLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            stats: ActivityStats::default(),
        }
    }

    /// Add a new activity entry
    pub fn log(&mut self, entry: ActivityEntry) {
        self.stats.total_events += 1;
        if entry.category == ActivityCategory::Fault {
            self.stats.faults += 1;
        }

        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Log a plain message in a category
    pub fn record(
        &mut self,
        time: SimTime,
        location: Option<TileCoord>,
        category: ActivityCategory,
        entity: Option<ActivityEntity>,
        message: String,
    ) {
        self.log(ActivityEntry {
            time,
            location,
            category,
            message,
            entity,
            importance: category.importance(),
        });
    }

    /// Log a completed delivery
    pub fn log_delivery(&mut self, time: SimTime, location: TileCoord, agent: ActivityEntity, message: String) {
        self.stats.deliveries += 1;
        self.record(time, Some(location), ActivityCategory::Transport, Some(agent), message);
    }

    /// Log a finished production cycle
    pub fn log_cycle_completed(&mut self, time: SimTime, location: TileCoord, factory: ActivityEntity, message: String) {
        self.stats.cycles_completed += 1;
        self.record(time, Some(location), ActivityCategory::Production, Some(factory), message);
    }

    /// Log a job being put on the board
    pub fn log_job_posted(&mut self, time: SimTime, job: JobId, message: String) {
        self.stats.jobs_posted += 1;
        self.record(time, None, ActivityCategory::Jobs, Some(ActivityEntity::Job { id: job }), message);
    }

    /// Log a job abandoned because its worker died
    pub fn log_abandoned(&mut self, time: SimTime, location: TileCoord, agent: ActivityEntity, message: String) {
        self.stats.abandoned_jobs += 1;
        self.record(time, Some(location), ActivityCategory::Danger, Some(agent), message);
    }

    /// Log an allocation or reservation fault
    pub fn log_fault(&mut self, time: SimTime, message: String) {
        self.record(time, None, ActivityCategory::Fault, None, message);
    }

    /// Get recent entries (newest first)
    pub fn recent_entries(&self, count: usize) -> Vec<&ActivityEntry> {
        self.entries.iter().rev().take(count).collect()
    }

    /// Get entries in a category (oldest first)
    pub fn entries_in(&self, category: ActivityCategory) -> Vec<&ActivityEntry> {
        self.entries.iter().filter(|e| e.category == category).collect()
    }

    /// Get entries at a specific location
    pub fn entries_at(&self, location: TileCoord, count: usize) -> Vec<&ActivityEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.location == Some(location))
            .take(count)
            .collect()
    }

    /// Get high-importance entries (faults, deaths)
    pub fn important_entries(&self, count: usize) -> Vec<&ActivityEntry> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.importance.cmp(&a.importance));
        entries.into_iter().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

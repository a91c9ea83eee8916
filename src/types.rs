//! Core types for the settlement economy
//!
//! Identifiers, simulated time and tile coordinates shared by every subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated time in clock units. Monotonically increasing.
pub type SimTime = u64;

/// Unique identifier for an entity (worker, factory, storage building)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity#{}", self.0)
    }
}

/// Unique identifier for a job posting
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job#{}", self.0)
    }
}

/// Unique identifier for a running activity (an agent executing a job)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Activity#{}", self.0)
    }
}

/// Tile coordinate on the settlement grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        TileCoord { x, y }
    }

    /// Manhattan distance to another tile
    pub fn distance_to(&self, other: &TileCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// ID GENERATOR
// =============================================================================

/// Monotonic ID generator for a specific ID type.
///
/// Owned by the settlement that hands out the IDs; there is no process-wide
/// counter, so two settlements never interfere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Start from a specific value (useful when loading saves).
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Collection of ID generators for all identifier kinds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdGenerators {
    pub entity: IdGenerator,
    pub job: IdGenerator,
    pub activity: IdGenerator,
}

impl IdGenerators {
    pub fn next_entity(&mut self) -> EntityId {
        EntityId(self.entity.next_id())
    }

    pub fn next_job(&mut self) -> JobId {
        JobId(self.job.next_id())
    }

    pub fn next_activity(&mut self) -> ActivityId {
        ActivityId(self.activity.next_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_distance() {
        let a = TileCoord::new(0, 0);
        let b = TileCoord::new(10, 0);
        assert_eq!(a.distance_to(&b), 10);
        assert_eq!(TileCoord::new(-2, 3).distance_to(&TileCoord::new(1, -1)), 7);
    }

    #[test]
    fn test_id_generators_are_independent() {
        let mut ids = IdGenerators::default();
        assert_eq!(ids.next_entity(), EntityId(0));
        assert_eq!(ids.next_entity(), EntityId(1));
        assert_eq!(ids.next_job(), JobId(0));
        assert_eq!(ids.next_activity(), ActivityId(0));

        let mut resumed = IdGenerator::starting_at(40);
        assert_eq!(resumed.next_id(), 40);
    }
}

//! Agents - the workers that walk, haul and staff factories

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{ActivityId, SimTime, TileCoord};

/// A worker in the settlement
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub location: TileCoord,
    /// Where the agent is currently walking to
    pub destination: Option<TileCoord>,
    /// 0 or less means dead
    pub health: f32,
    /// Time units needed to cross one tile
    pub walk_time_per_tile: SimTime,
    /// Activity the agent is running, `None` when idle
    pub activity: Option<ActivityId>,
    status_log: VecDeque<(SimTime, String)>,
    status_capacity: usize,
}

impl Agent {
    pub fn new(name: &str, location: TileCoord, walk_time_per_tile: SimTime, status_capacity: usize) -> Self {
        Agent {
            name: name.to_string(),
            location,
            destination: None,
            health: 1.0,
            walk_time_per_tile,
            activity: None,
            status_log: VecDeque::new(),
            status_capacity: status_capacity.max(1),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn is_idle(&self) -> bool {
        self.activity.is_none()
    }

    /// Append a line to the agent's status log, oldest lines fall off
    pub fn push_status(&mut self, time: SimTime, status: String) {
        self.status_log.push_back((time, status));
        while self.status_log.len() > self.status_capacity {
            self.status_log.pop_front();
        }
    }

    /// Latest status line
    pub fn status(&self) -> Option<&str> {
        self.status_log.back().map(|(_, s)| s.as_str())
    }

    pub fn status_log(&self) -> impl Iterator<Item = &(SimTime, String)> {
        self.status_log.iter()
    }

    /// Walking time for a distance in tiles, rounded up
    pub fn walk_duration(&self, distance: f64) -> SimTime {
        (distance * self.walk_time_per_tile as f64).ceil().max(0.0) as SimTime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_log_is_bounded() {
        let mut agent = Agent::new("Ada", TileCoord::new(0, 0), 1000, 2);
        agent.push_status(0, "idle".into());
        agent.push_status(1, "walking".into());
        agent.push_status(2, "loading".into());
        assert_eq!(agent.status(), Some("loading"));
        assert_eq!(agent.status_log().count(), 2);
    }

    #[test]
    fn test_walk_duration_rounds_up() {
        let agent = Agent::new("Ada", TileCoord::new(0, 0), 1000, 4);
        assert_eq!(agent.walk_duration(10.0), 10_000);
        assert_eq!(agent.walk_duration(1.4142), 1415);
        assert_eq!(agent.walk_duration(0.0), 0);
    }

    #[test]
    fn test_health_decides_life() {
        let mut agent = Agent::new("Ada", TileCoord::new(0, 0), 1000, 4);
        assert!(agent.is_alive());
        agent.health = 0.0;
        assert!(!agent.is_alive());
    }
}

//! Reference decision maker: every idle agent takes its best-scoring job

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::jobs::JobCandidate;
use crate::settlement::world::Settlement;
use crate::types::{ActivityId, EntityId, SimTime};

/// Iterations at one instant before the driver forces the clock forward
const MAX_STEPS_PER_INSTANT: usize = 10_000;

impl Settlement {
    /// Best option for an agent: highest score above 0, first listed wins ties.
    pub fn best_candidate(&self, agent: EntityId) -> Option<JobCandidate> {
        let mut best: Option<JobCandidate> = None;
        for factory in self.board().for_entity(agent) {
            let Some(candidate) = factory.resolve(self) else {
                continue;
            };
            trace!(agent = %agent, label = %candidate.label, score = candidate.score, "candidate");
            if candidate.score > 0.0 && best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Let an idle, living agent pick and start its best job.
    pub fn seek_work(&mut self, agent: EntityId) -> Result<Option<ActivityId>> {
        let record = self.agent(agent)?;
        if !record.is_alive() || !record.is_idle() {
            return Ok(None);
        }
        let Some(candidate) = self.best_candidate(agent) else {
            return Ok(None);
        };
        debug!(agent = %agent, job = %candidate.label, score = candidate.score, "seeking work");
        candidate.execute(self)
    }

    /// Run `seek_work` for every idle agent. Returns how many started something.
    pub fn dispatch_idle_agents(&mut self) -> Result<usize> {
        let idle: Vec<EntityId> = self
            .agents()
            .filter(|(_, a)| a.is_alive() && a.is_idle())
            .map(|(id, _)| id)
            .collect();
        let mut started = 0;
        for agent in idle {
            if self.seek_work(agent)?.is_some() {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Drive the settlement to `end`, letting idle agents pick work whenever
    /// something happens.
    pub fn run_until(&mut self, end: SimTime) -> Result<()> {
        let mut last_time = self.now();
        let mut steps_at_instant = 0;
        loop {
            self.dispatch_changes()?;
            self.dispatch_idle_agents()?;

            let next = match self.next_wake() {
                Some(t) if t <= end => t,
                _ => {
                    self.advance_to(end)?;
                    return Ok(());
                }
            };

            if next == last_time {
                steps_at_instant += 1;
                if steps_at_instant > MAX_STEPS_PER_INSTANT {
                    warn!(time = next, "no progress at this instant, moving on");
                    self.advance_to(next + 1)?;
                    steps_at_instant = 0;
                    last_time = self.now();
                    continue;
                }
            } else {
                steps_at_instant = 0;
                last_time = next;
            }
            self.advance_to(next)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Material, MaterialDef};
    use crate::inventory::Capacity;
    use crate::logistics::StockPolicy;
    use crate::params::EconomyParams;
    use crate::types::TileCoord;

    fn village() -> (Settlement, Material, EntityId, EntityId) {
        let mut settlement = Settlement::new(EconomyParams::strict());
        let wood = Material::new(MaterialDef::new("wood", "Wood", 30));
        let pile = settlement.spawn_storage("Woodpile", TileCoord::new(0, 0), Capacity::Slots(20));
        settlement.inventory_mut(pile).unwrap().set(&wood, 300).unwrap();
        let hearth = settlement.spawn_storage("Hearth", TileCoord::new(5, 0), Capacity::Slots(4));
        settlement.set_stock_policy(pile, StockPolicy::supplier(&wood, 0)).unwrap();
        settlement.set_stock_policy(hearth, StockPolicy::consumer(&wood, 120)).unwrap();
        (settlement, wood, pile, hearth)
    }

    #[test]
    fn test_idle_agents_fill_the_hearth() {
        let (mut settlement, wood, pile, hearth) = village();
        settlement.spawn_worker("Fa", TileCoord::new(0, 0), 2, 100);
        settlement.spawn_worker("Gu", TileCoord::new(1, 0), 2, 100);
        settlement.run_until(50_000).unwrap();

        assert_eq!(settlement.inventory(hearth).unwrap().stock_of(&wood), 120);
        assert_eq!(settlement.inventory(pile).unwrap().stock_of(&wood), 180);
        assert_eq!(settlement.log().stats.deliveries, 2);
        assert_eq!(settlement.board().global_count(), 0);
        assert!(settlement.agents().all(|(_, a)| a.is_idle()));
        assert_eq!(settlement.now(), 50_000);
    }

    #[test]
    fn test_dead_agents_do_not_seek_work() {
        let (mut settlement, _, _, _) = village();
        let agent = settlement.spawn_worker("Ha", TileCoord::new(0, 0), 2, 100);
        settlement.dispatch_changes().unwrap();
        settlement.kill_agent(agent).unwrap();
        assert!(settlement.best_candidate(agent).is_none());
        assert_eq!(settlement.seek_work(agent).unwrap(), None);
        assert_eq!(settlement.dispatch_idle_agents().unwrap(), 0);
    }

    #[test]
    fn test_closest_worker_wins_the_better_score() {
        let (mut settlement, _, _, _) = village();
        let near = settlement.spawn_worker("Near", TileCoord::new(0, 0), 2, 100);
        let far = settlement.spawn_worker("Far", TileCoord::new(-30, 0), 2, 100);
        settlement.dispatch_changes().unwrap();
        let near_score = settlement.best_candidate(near).unwrap().score;
        let far_score = settlement.best_candidate(far).unwrap().score;
        assert!(near_score > far_score);
    }
}

//! Staffing job of a factory
//!
//! One posting per factory with as many vacancies as its blueprint needs
//! workers. A worker walks to the factory, joins the crew and stays until
//! the factory sends them home (or they die).

use tracing::{debug, warn};

use crate::activity_log::ActivityCategory;
use crate::error::Result;
use crate::jobs::JobPosting;
use crate::production::cycle::{has_materials_for_cycle, join_factory, leave_factory};
use crate::settlement::{Activity, Settlement, Step};
use crate::types::{EntityId, JobId};

#[derive(Clone, Debug)]
pub struct FactoryJob {
    id: JobId,
    factory: EntityId,
    vacancies: u32,
    label: String,
}

impl FactoryJob {
    pub fn new(id: JobId, factory: EntityId, vacancies: u32, label: String) -> Self {
        FactoryJob {
            id,
            factory,
            vacancies,
            label,
        }
    }

    pub fn factory(&self) -> EntityId {
        self.factory
    }
}

impl JobPosting for FactoryJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn vacancies(&self) -> u32 {
        self.vacancies
    }

    fn set_vacancies(&mut self, vacancies: u32) {
        self.vacancies = vacancies;
    }

    fn restore_vacancy_when_done(&self) -> bool {
        true
    }

    fn on_score(&self, settlement: &Settlement, agent: EntityId) -> f64 {
        let Ok(worker) = settlement.agent(agent) else {
            return 0.0;
        };
        let Ok(system) = settlement.factory(self.factory) else {
            return 0.0;
        };
        if !worker.is_alive() || system.workers().contains(&agent) {
            return 0.0;
        }
        // Nothing to work on and nothing running
        if !system.is_running() && !has_materials_for_cycle(settlement, self.factory) {
            return 0.0;
        }
        let Some(distance) = settlement
            .location_of(self.factory)
            .ok()
            .and_then(|at| settlement.walking_distance(worker.location, at))
        else {
            return 0.0;
        };
        let params = settlement.params();
        params.production_base_score * params.distance_factor(distance)
    }

    fn on_assign(&mut self, _settlement: &mut Settlement, agent: EntityId) -> Result<Box<dyn Activity>> {
        debug!(job = %self.id, agent = %agent, factory = %self.factory, "factory work assigned");
        Ok(Box::new(FactoryWork::new(self.factory, agent, self.label.clone())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WorkStage {
    Start,
    Walking,
    Working,
}

/// A worker's shift at a factory
#[derive(Debug)]
pub struct FactoryWork {
    factory: EntityId,
    worker: EntityId,
    label: String,
    stage: WorkStage,
}

impl FactoryWork {
    pub fn new(factory: EntityId, worker: EntityId, label: String) -> Self {
        FactoryWork {
            factory,
            worker,
            label,
            stage: WorkStage::Start,
        }
    }
}

impl Activity for FactoryWork {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn resume(&mut self, settlement: &mut Settlement) -> Result<Step> {
        match self.stage {
            WorkStage::Start => {
                let at = settlement.location_of(self.factory)?;
                let arrival = settlement.begin_walk(self.worker, at)?;
                self.stage = WorkStage::Walking;
                Ok(Step::WaitUntil(arrival))
            }
            WorkStage::Walking => {
                if !settlement.finish_walk(self.worker)? {
                    return Ok(Step::Done);
                }
                self.stage = WorkStage::Working;
                join_factory(settlement, self.factory, self.worker)?;
                Ok(Step::Suspend)
            }
            WorkStage::Working => {
                let alive = settlement.agent(self.worker)?.is_alive();
                let member = settlement.factory(self.factory)?.workers().contains(&self.worker);
                if alive && member {
                    return Ok(Step::Suspend);
                }
                leave_factory(settlement, self.factory, self.worker)?;
                Ok(Step::Done)
            }
        }
    }

    fn abort(&mut self, settlement: &mut Settlement) {
        if let Err(err) = leave_factory(settlement, self.factory, self.worker) {
            let message = format!(
                "{} could not leave the crew of {}: {}",
                settlement.name_of(self.worker),
                settlement.name_of(self.factory),
                err
            );
            warn!(factory = %self.factory, worker = %self.worker, "crew member not released");
            let now = settlement.now();
            settlement.log_mut().record(now, None, ActivityCategory::Fault, None, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::catalog::{Blueprint, BlueprintOptions, Material, MaterialDef, MaterialState};
    use crate::inventory::Capacity;
    use crate::params::EconomyParams;
    use crate::types::TileCoord;

    fn bakery(settlement: &mut Settlement) -> EntityId {
        let bread = Material::new(MaterialDef::new("bread", "Bread", 20));
        let oven = Arc::new(Blueprint::new(
            "baking",
            vec![],
            vec![MaterialState::new(&bread, 10)],
            BlueprintOptions {
                full_time_equivalent: 1000.0,
                workers_required: 1,
                building_name: None,
            },
        ));
        settlement
            .spawn_factory("Bakery", TileCoord::new(0, 0), Capacity::Slots(4), Some(oven))
            .unwrap()
    }

    #[test]
    fn test_abort_takes_worker_off_the_crew() {
        let mut settlement = Settlement::new(EconomyParams::strict());
        let factory = bakery(&mut settlement);
        let worker = settlement.spawn_worker("Jo", TileCoord::new(0, 0), 1, 1000);
        join_factory(&mut settlement, factory, worker).unwrap();
        assert!(settlement.factory(factory).unwrap().is_running());

        let mut shift = FactoryWork::new(factory, worker, "baking".into());
        shift.abort(&mut settlement);
        let system = settlement.factory(factory).unwrap();
        assert!(system.workers().is_empty());
        assert!(!system.is_running());
        assert_eq!(settlement.log().stats.faults, 0);
    }

    #[test]
    fn test_failed_abort_is_logged_as_fault() {
        let mut settlement = Settlement::new(EconomyParams::strict());
        let shed = settlement.spawn_storage("Shed", TileCoord::new(0, 0), Capacity::Slots(1));
        let worker = settlement.spawn_worker("Ko", TileCoord::new(0, 0), 1, 1000);

        let mut shift = FactoryWork::new(shed, worker, "nothing".into());
        shift.abort(&mut settlement);
        assert_eq!(settlement.log().stats.faults, 1);
        let faults = settlement.log().entries_in(ActivityCategory::Fault);
        assert!(faults[0].message.contains("could not leave the crew of Shed"));
    }
}

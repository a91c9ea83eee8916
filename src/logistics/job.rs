//! Transport job: carry one deal from supplier to destination
//!
//! Posting reserves the goods at the supplier and the space at the
//! destination. The worker who takes the job walks over, loads, walks to the
//! destination and unloads. Each reservation is cleared right before the
//! transfer it protected.

use tracing::{debug, info, warn};

use crate::activity_log::ActivityCategory;
use crate::catalog::MaterialState;
use crate::error::{EconomyError, Result};
use crate::inventory::ReservationKey;
use crate::jobs::JobPosting;
use crate::logistics::exchange::LogisticsDeal;
use crate::settlement::{Activity, Settlement, Step};
use crate::types::{EntityId, JobId, SimTime};

/// A posted haul of one deal
#[derive(Clone, Debug)]
pub struct LogisticsJob {
    id: JobId,
    deal: LogisticsDeal,
    vacancies: u32,
}

impl LogisticsJob {
    pub fn new(id: JobId, deal: LogisticsDeal) -> Self {
        LogisticsJob { id, deal, vacancies: 1 }
    }

    pub fn deal(&self) -> &LogisticsDeal {
        &self.deal
    }

    fn cargo(&self) -> MaterialState {
        MaterialState::new(&self.deal.material, self.deal.quantity)
    }
}

/// Time to move `quantity` of a material in or out of an inventory
pub fn load_time(settlement: &Settlement, deal: &LogisticsDeal) -> SimTime {
    let stacks = deal.quantity as f64 / deal.material.stack_size() as f64;
    (settlement.params().load_time_per_stack as f64 * stacks).ceil() as SimTime
}

impl JobPosting for LogisticsJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn label(&self) -> String {
        format!("Haul {} {}", self.deal.quantity, self.deal.material)
    }

    fn vacancies(&self) -> u32 {
        self.vacancies
    }

    fn set_vacancies(&mut self, vacancies: u32) {
        self.vacancies = vacancies;
    }

    fn restore_vacancy_when_done(&self) -> bool {
        false
    }

    fn on_post(&mut self, settlement: &mut Settlement) -> Result<()> {
        let key = ReservationKey::Job(self.id);
        let cargo = self.cargo();
        settlement
            .inventory_mut(self.deal.supplier)?
            .make_reservation(key.clone(), vec![cargo.negated()])?;
        let reserved = settlement
            .inventory_mut(self.deal.destination)
            .and_then(|inv| inv.make_reservation(key.clone(), vec![cargo]));
        if let Err(err) = reserved {
            settlement.inventory_mut(self.deal.supplier)?.clear_reservation(&key)?;
            return Err(err);
        }
        Ok(())
    }

    fn on_score(&self, settlement: &Settlement, agent: EntityId) -> f64 {
        let Ok(worker) = settlement.agent(agent) else {
            return 0.0;
        };
        if !worker.is_alive() {
            return 0.0;
        }
        let fits = settlement
            .inventory(agent)
            .map_or(false, |inv| inv.is_everything_additionally_allocatable(&[self.cargo()]));
        if !fits {
            return 0.0;
        }

        let (Ok(supplier), Ok(destination)) = (
            settlement.location_of(self.deal.supplier),
            settlement.location_of(self.deal.destination),
        ) else {
            return 0.0;
        };
        let (Some(to_supplier), Some(to_destination)) = (
            settlement.walking_distance(worker.location, supplier),
            settlement.walking_distance(supplier, destination),
        ) else {
            return 0.0;
        };

        let params = settlement.params();
        let score = params.production_base_score
            * params.transport_score_boost
            * params.distance_factor(to_supplier + to_destination);
        score.min(1.0)
    }

    fn on_assign(&mut self, settlement: &mut Settlement, agent: EntityId) -> Result<Box<dyn Activity>> {
        settlement.board_mut().remove_global(self.id);
        debug!(job = %self.id, agent = %agent, "haul assigned");
        Ok(Box::new(Haul::new(self.id, self.deal.clone(), agent)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HaulStage {
    Start,
    WalkingToSupplier,
    Loading,
    WalkingToDestination,
    Unloading,
    Finished,
}

/// The worker's side of a logistics job
#[derive(Debug)]
pub struct Haul {
    job: JobId,
    deal: LogisticsDeal,
    worker: EntityId,
    stage: HaulStage,
}

impl Haul {
    pub fn new(job: JobId, deal: LogisticsDeal, worker: EntityId) -> Self {
        Haul {
            job,
            deal,
            worker,
            stage: HaulStage::Start,
        }
    }

    fn job_key(&self) -> ReservationKey {
        ReservationKey::Job(self.job)
    }

    fn cargo_key(&self) -> ReservationKey {
        ReservationKey::Cargo(self.job)
    }

    /// Release every reservation the haul still holds. Material already
    /// moved stays where it is.
    fn release_holds(&mut self, settlement: &mut Settlement) -> Result<()> {
        // Taken from the supplier but not yet on the worker: put it back
        if self.stage == HaulStage::Loading {
            settlement
                .inventory_mut(self.deal.supplier)?
                .change(&self.deal.material, self.deal.quantity)?;
        }
        let holds = [
            (self.deal.supplier, self.job_key()),
            (self.worker, self.cargo_key()),
            (self.deal.destination, self.job_key()),
        ];
        for (entity, key) in holds {
            let inventory = settlement.inventory_mut(entity)?;
            if inventory.has_reservation(&key) {
                inventory.clear_reservation(&key)?;
            }
        }
        self.stage = HaulStage::Finished;
        settlement.request_planning();
        Ok(())
    }

    fn abandon(&mut self, settlement: &mut Settlement) -> Result<Step> {
        self.release_holds(settlement)?;
        let location = settlement.location_of(self.worker)?;
        let entity = settlement.entity_ref(self.worker);
        let message = format!(
            "{} abandoned the haul of {} {}",
            settlement.name_of(self.worker),
            self.deal.quantity,
            self.deal.material
        );
        warn!(job = %self.job, worker = %self.worker, "haul abandoned");
        let now = settlement.now();
        settlement.log_mut().log_abandoned(now, location, entity, message);
        Ok(Step::Done)
    }
}

impl Activity for Haul {
    fn label(&self) -> String {
        format!("hauling {} {}", self.deal.quantity, self.deal.material)
    }

    fn resume(&mut self, settlement: &mut Settlement) -> Result<Step> {
        let material = self.deal.material.clone();
        let quantity = self.deal.quantity;

        match self.stage {
            HaulStage::Start => {
                let supplier = settlement.location_of(self.deal.supplier)?;
                let arrival = settlement.begin_walk(self.worker, supplier)?;
                self.stage = HaulStage::WalkingToSupplier;
                Ok(Step::WaitUntil(arrival))
            }
            HaulStage::WalkingToSupplier => {
                if !settlement.finish_walk(self.worker)? {
                    return self.abandon(settlement);
                }
                let cargo = [MaterialState::new(&material, quantity)];
                if !settlement.inventory(self.worker)?.is_everything_additionally_allocatable(&cargo) {
                    return Err(EconomyError::InsufficientSpace);
                }
                let supplier = settlement.inventory_mut(self.deal.supplier)?;
                supplier.clear_reservation(&self.job_key())?;
                supplier.change(&material, -quantity)?;
                self.stage = HaulStage::Loading;
                Ok(Step::WaitUntil(settlement.now() + load_time(settlement, &self.deal)))
            }
            HaulStage::Loading => {
                let worker = settlement.inventory_mut(self.worker)?;
                worker.change_quiet(&material, quantity)?;
                worker.make_reservation(self.cargo_key(), vec![MaterialState::new(&material, -quantity)])?;

                let destination = settlement.location_of(self.deal.destination)?;
                let arrival = settlement.begin_walk(self.worker, destination)?;
                self.stage = HaulStage::WalkingToDestination;
                Ok(Step::WaitUntil(arrival))
            }
            HaulStage::WalkingToDestination => {
                if !settlement.finish_walk(self.worker)? {
                    return self.abandon(settlement);
                }
                let worker = settlement.inventory_mut(self.worker)?;
                worker.clear_reservation(&self.cargo_key())?;
                worker.change(&material, -quantity)?;
                self.stage = HaulStage::Unloading;
                Ok(Step::WaitUntil(settlement.now() + load_time(settlement, &self.deal)))
            }
            HaulStage::Unloading => {
                let destination = settlement.inventory_mut(self.deal.destination)?;
                destination.clear_reservation(&self.job_key())?;
                destination.change(&material, quantity)?;
                self.stage = HaulStage::Finished;

                let location = settlement.location_of(self.deal.destination)?;
                let entity = settlement.entity_ref(self.worker);
                let message = format!(
                    "{} delivered {} {} to {}",
                    settlement.name_of(self.worker),
                    quantity,
                    material,
                    settlement.name_of(self.deal.destination)
                );
                info!(job = %self.job, worker = %self.worker, "delivered");
                let now = settlement.now();
                settlement.log_mut().log_delivery(now, location, entity, message);
                Ok(Step::Done)
            }
            HaulStage::Finished => Ok(Step::Done),
        }
    }

    fn abort(&mut self, settlement: &mut Settlement) {
        if let Err(err) = self.release_holds(settlement) {
            let message = format!("could not release holds of {}: {}", self.job, err);
            let now = settlement.now();
            settlement.log_mut().record(now, None, ActivityCategory::Fault, None, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Material, MaterialDef};
    use crate::inventory::Capacity;
    use crate::logistics::planner::StockPolicy;
    use crate::params::{EconomyParams, FaultPolicy};
    use crate::types::TileCoord;

    struct Scene {
        settlement: Settlement,
        wheat: Material,
        supplier: EntityId,
        requester: EntityId,
        worker: EntityId,
    }

    /// Granary at (0,0) with 1000 wheat offering above 500, kitchen at
    /// (10,0) requesting below 50, one worker at the granary.
    fn scene() -> Scene {
        scene_with(EconomyParams::strict())
    }

    fn scene_with(params: EconomyParams) -> Scene {
        let mut settlement = Settlement::new(params);
        let wheat = Material::new(MaterialDef::new("wheat", "Wheat", 25));
        let supplier = settlement.spawn_storage("Granary", TileCoord::new(0, 0), Capacity::Slots(100));
        settlement.inventory_mut(supplier).unwrap().set(&wheat, 1000).unwrap();
        let requester = settlement.spawn_storage("Kitchen", TileCoord::new(10, 0), Capacity::Slots(10));
        let worker = settlement.spawn_worker("Ada", TileCoord::new(0, 0), 4, 1000);
        settlement
            .set_stock_policy(supplier, StockPolicy::supplier(&wheat, 500))
            .unwrap();
        settlement
            .set_stock_policy(requester, StockPolicy::consumer(&wheat, 50))
            .unwrap();
        settlement.dispatch_changes().unwrap();
        Scene {
            settlement,
            wheat,
            supplier,
            requester,
            worker,
        }
    }

    fn levels(s: &Settlement, entity: EntityId, wheat: &Material) -> (i64, i64, i64, i64) {
        let inv = s.inventory(entity).unwrap();
        (
            inv.stock_of(wheat),
            inv.available_of(wheat),
            inv.reserved_outgoing_of(wheat),
            inv.reserved_incoming_of(wheat),
        )
    }

    #[test]
    fn test_planner_posts_exactly_one_haul() {
        let Scene { settlement, wheat, supplier, requester, .. } = scene();
        assert_eq!(settlement.board().global_count(), 1);
        assert_eq!(levels(&settlement, supplier, &wheat), (1000, 950, 50, 0));
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));
    }

    #[test]
    fn test_haul_timeline_and_balances() {
        let Scene { mut settlement, wheat, supplier, requester, worker } = scene();

        let activity = settlement.seek_work(worker).unwrap();
        assert!(activity.is_some());
        assert_eq!(settlement.board().global_count(), 0);

        // Pickup at t=0: supplier debited, load until 2000
        settlement.advance_to(0).unwrap();
        assert_eq!(levels(&settlement, supplier, &wheat), (950, 950, 0, 0));
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));
        assert_eq!(levels(&settlement, worker, &wheat), (0, 0, 0, 0));
        assert_eq!(settlement.board().global_count(), 0);

        settlement.advance_to(1999).unwrap();
        assert_eq!(levels(&settlement, worker, &wheat), (0, 0, 0, 0));

        // Loaded at 2000, cargo held against the worker's own use
        settlement.advance_to(2000).unwrap();
        assert_eq!(levels(&settlement, worker, &wheat), (50, 0, 50, 0));
        assert_eq!(
            settlement.agent(worker).unwrap().destination,
            Some(TileCoord::new(10, 0))
        );

        // 10 tiles at 1000 per tile
        settlement.advance_to(11_999).unwrap();
        assert_eq!(settlement.agent(worker).unwrap().location, TileCoord::new(0, 0));
        settlement.advance_to(12_000).unwrap();
        assert_eq!(settlement.agent(worker).unwrap().location, TileCoord::new(10, 0));
        assert_eq!(levels(&settlement, worker, &wheat), (0, 0, 0, 0));
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));

        // Unloaded at 14000
        settlement.advance_to(13_999).unwrap();
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));
        settlement.advance_to(14_000).unwrap();
        assert_eq!(levels(&settlement, requester, &wheat), (50, 50, 0, 0));
        assert_eq!(levels(&settlement, supplier, &wheat), (950, 950, 0, 0));

        assert!(settlement.agent(worker).unwrap().is_idle());
        assert_eq!(settlement.board().global_count(), 0);
        assert_eq!(settlement.log().stats.deliveries, 1);
        assert_eq!(settlement.log().stats.jobs_posted, 1);
    }

    #[test]
    fn test_dead_worker_releases_reservations() {
        let Scene { mut settlement, wheat, supplier, requester, worker } = scene();
        settlement.seek_work(worker).unwrap();
        settlement.advance_to(5000).unwrap();
        settlement.kill_agent(worker).unwrap();
        settlement.advance_to(20_000).unwrap();

        // Cargo stays with the body, nothing is held for the dead haul
        let body = settlement.inventory(worker).unwrap();
        assert_eq!(body.stock_of(&wheat), 50);
        assert_eq!(body.reserved_outgoing_of(&wheat), 0);
        assert_eq!(settlement.agent(worker).unwrap().location, TileCoord::new(0, 0));
        assert!(settlement.agent(worker).unwrap().is_idle());
        assert_eq!(settlement.log().stats.abandoned_jobs, 1);
        assert_eq!(settlement.log().stats.deliveries, 0);

        // The kitchen is still short, so a fresh haul was posted
        assert_eq!(settlement.board().global_count(), 1);
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));
        assert_eq!(levels(&settlement, supplier, &wheat), (950, 900, 50, 0));
    }

    fn dropping() -> EconomyParams {
        EconomyParams {
            fault_policy: FaultPolicy::Drop,
            ..EconomyParams::default()
        }
    }

    #[test]
    fn test_worker_filled_before_pickup_leaves_supplier_whole() {
        let Scene { mut settlement, wheat, supplier, requester, worker } = scene_with(dropping());
        settlement.seek_work(worker).unwrap();
        let stone = Material::new(MaterialDef::new("stone", "Stone", 10));
        settlement.inventory_mut(worker).unwrap().set(&stone, 40).unwrap();

        settlement.advance_to(0).unwrap();
        assert_eq!(settlement.log().stats.faults, 1);
        assert!(settlement.agent(worker).unwrap().is_idle());
        assert_eq!(levels(&settlement, worker, &wheat), (0, 0, 0, 0));

        // Nothing left the granary; the deal is simply posted again
        assert_eq!(levels(&settlement, supplier, &wheat), (1000, 950, 50, 0));
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));
        assert_eq!(settlement.board().global_count(), 1);
    }

    #[test]
    fn test_failed_loading_returns_cargo_to_supplier() {
        let Scene { mut settlement, wheat, supplier, requester, worker } = scene_with(dropping());
        settlement.seek_work(worker).unwrap();
        settlement.advance_to(0).unwrap();
        assert_eq!(levels(&settlement, supplier, &wheat), (950, 950, 0, 0));

        // The worker's hands fill up while loading
        let stone = Material::new(MaterialDef::new("stone", "Stone", 10));
        settlement.inventory_mut(worker).unwrap().set(&stone, 40).unwrap();
        settlement.advance_to(2000).unwrap();

        assert_eq!(settlement.log().stats.faults, 1);
        assert_eq!(levels(&settlement, worker, &wheat), (0, 0, 0, 0));
        assert_eq!(levels(&settlement, supplier, &wheat), (1000, 950, 50, 0));
        assert_eq!(levels(&settlement, requester, &wheat), (0, 0, 0, 50));
        assert!(settlement.agent(worker).unwrap().is_idle());
    }

    #[test]
    fn test_full_worker_scores_zero() {
        let Scene { mut settlement, worker, .. } = scene();
        let stone = Material::new(MaterialDef::new("stone", "Stone", 10));
        settlement.inventory_mut(worker).unwrap().set(&stone, 40).unwrap();
        let candidates = settlement.board().for_entity(worker);
        assert_eq!(candidates.len(), 1);
        let candidate = candidates[0].resolve(&settlement).unwrap();
        assert_eq!(candidate.score, 0.0);
        assert!(settlement.seek_work(worker).unwrap().is_none());
    }

    #[test]
    fn test_score_decays_with_distance() {
        let Scene { mut settlement, worker, .. } = scene();
        let near = settlement.board().for_entity(worker)[0].resolve(&settlement).unwrap();
        let expected = 0.9 * 1.05 * 0.9;
        assert!((near.score - expected).abs() < 1e-9);

        settlement.agent_mut(worker).unwrap().location = TileCoord::new(-40, 0);
        let far = settlement.board().for_entity(worker)[0].resolve(&settlement).unwrap();
        assert!(far.score < near.score);
        assert!(far.score > 0.0);
    }

    #[test]
    fn test_failed_post_rolls_back_supplier() {
        let Scene { mut settlement, wheat, supplier, .. } = scene();
        let cramped = settlement.spawn_storage("Shed", TileCoord::new(3, 3), Capacity::Slots(1));
        let deal = LogisticsDeal {
            supplier,
            destination: cramped,
            material: wheat.clone(),
            quantity: 50,
        };
        let id = settlement.next_job_id();
        let before = levels(&settlement, supplier, &wheat);
        let err = settlement.add_global_job(Box::new(LogisticsJob::new(id, deal))).unwrap_err();
        assert!(err.is_reservation_protocol());
        assert_eq!(levels(&settlement, supplier, &wheat), before);
        assert!(!settlement.board().contains(id));
    }

    #[test]
    fn test_load_time_scales_with_stacks() {
        let Scene { settlement, wheat, supplier, requester, .. } = scene();
        let deal = LogisticsDeal {
            supplier,
            destination: requester,
            material: wheat,
            quantity: 30,
        };
        assert_eq!(load_time(&settlement, &deal), 1200);
    }
}

//! Production cycle transitions
//!
//! Idle -> Running when ingredients, product space and a crew are all there.
//! Running -> Idle when the cycle completes (products delivered) or when the
//! crew drops to nothing (ingredients forfeited). A completed cycle chains
//! straight into the next one when it can.

use std::sync::Arc;

use tracing::{debug, info};

use crate::activity_log::ActivityCategory;
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::inventory::ReservationKey;
use crate::production::factory_job::FactoryJob;
use crate::production::system::{production_delta, ProductionState};
use crate::settlement::{Settlement, Wake};
use crate::types::EntityId;

fn blueprint_of(settlement: &Settlement, factory: EntityId) -> Result<Option<Arc<Blueprint>>> {
    Ok(settlement.factory(factory)?.blueprint.clone())
}

fn log_production(settlement: &mut Settlement, factory: EntityId, message: String) -> Result<()> {
    let location = settlement.location_of(factory)?;
    let entity = settlement.entity_ref(factory);
    let now = settlement.now();
    settlement
        .log_mut()
        .record(now, Some(location), ActivityCategory::Production, Some(entity), message);
    Ok(())
}

/// Whether a new cycle could start right now
pub fn can_start_new_blueprint_cycle(settlement: &Settlement, factory: EntityId) -> bool {
    let (Ok(system), Ok(inventory)) = (settlement.factory(factory), settlement.inventory(factory)) else {
        return false;
    };
    let Some(blueprint) = &system.blueprint else {
        return false;
    };
    !system.is_running()
        && inventory.has_all_available(&blueprint.ingredients)
        && inventory.is_everything_additionally_allocatable(&blueprint.products)
        && production_delta(blueprint, system.workers.len(), settlement.params()) > 0.0
}

/// Whether the materials for a cycle are in place, crew aside
pub fn has_materials_for_cycle(settlement: &Settlement, factory: EntityId) -> bool {
    let (Ok(system), Ok(inventory)) = (settlement.factory(factory), settlement.inventory(factory)) else {
        return false;
    };
    system.blueprint.as_ref().map_or(false, |blueprint| {
        inventory.has_all_available(&blueprint.ingredients)
            && inventory.is_everything_additionally_allocatable(&blueprint.products)
    })
}

fn schedule_completion(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    let system = settlement.factory_mut(factory)?;
    system.cycle_generation += 1;
    let generation = system.cycle_generation;
    if let Some(at) = system.completion_time() {
        settlement.wakes.push(at, Wake::FactoryCycle { factory, generation });
    }
    Ok(())
}

fn cancel_idle_timeout(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    let system = settlement.factory_mut(factory)?;
    if system.idle_timeout_pending {
        system.idle_timeout_pending = false;
        system.idle_generation += 1;
    }
    Ok(())
}

/// Idle with a crew: give them a moment, then send them home
fn schedule_idle_timeout(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    let at = settlement.now() + settlement.params().idle_timeout;
    let system = settlement.factory_mut(factory)?;
    if system.is_running() || system.workers.is_empty() || system.idle_timeout_pending {
        return Ok(());
    }
    system.idle_timeout_pending = true;
    system.idle_generation += 1;
    let generation = system.idle_generation;
    settlement.wakes.push(at, Wake::FactoryIdle { factory, generation });
    Ok(())
}

fn start_cycle(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    let Some(blueprint) = blueprint_of(settlement, factory)? else {
        return Ok(());
    };
    let now = settlement.now();
    let inventory = settlement.inventory_mut(factory)?;
    if !blueprint.ingredients.is_empty() {
        let consumed: Vec<_> = blueprint.ingredients.iter().map(|s| s.negated()).collect();
        inventory.change_multiple(&consumed)?;
    }
    inventory.make_reservation(ReservationKey::Factory(factory), blueprint.products.clone())?;

    let params = settlement.params().clone();
    let system = settlement.factory_mut(factory)?;
    system.state = ProductionState::Running;
    system.progress = 0.0;
    system.last_update = now;
    system.progress_delta = production_delta(&blueprint, system.workers.len(), &params);
    cancel_idle_timeout(settlement, factory)?;
    schedule_completion(settlement, factory)?;

    debug!(factory = %factory, blueprint = %blueprint.name, "cycle started");
    log_production(settlement, factory, format!("Started {}", blueprint.name))
}

/// Start a cycle if possible; otherwise make sure an idle crew gets a timeout.
fn try_start(settlement: &mut Settlement, factory: EntityId) -> Result<bool> {
    if can_start_new_blueprint_cycle(settlement, factory) {
        start_cycle(settlement, factory)?;
        return Ok(true);
    }
    schedule_idle_timeout(settlement, factory)?;
    Ok(false)
}

/// Abort the running cycle. Consumed ingredients are not refunded.
fn stop_cycle(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    let system = settlement.factory_mut(factory)?;
    if !system.is_running() {
        return Ok(());
    }
    system.state = ProductionState::Idle;
    system.progress = 0.0;
    system.progress_delta = 0.0;
    system.cycle_generation += 1;

    let key = ReservationKey::Factory(factory);
    let inventory = settlement.inventory_mut(factory)?;
    if inventory.has_reservation(&key) {
        inventory.clear_reservation(&key)?;
    }
    debug!(factory = %factory, "cycle stopped");
    log_production(settlement, factory, "Stopped production, ingredients lost".to_string())
}

/// Change the recipe. A different blueprint (by identity) withdraws the old
/// staffing posting, stops any running cycle and posts a new one.
pub fn set_blueprint(settlement: &mut Settlement, factory: EntityId, blueprint: Option<Arc<Blueprint>>) -> Result<()> {
    let current = blueprint_of(settlement, factory)?;
    let unchanged = match (&current, &blueprint) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if unchanged {
        return Ok(());
    }

    stop_cycle(settlement, factory)?;
    if let Some(old) = settlement.factory_mut(factory)?.posted_job.take() {
        settlement.board_mut().remove_global(old);
    }
    settlement.factory_mut(factory)?.blueprint = blueprint.clone();

    if let Some(blueprint) = &blueprint {
        if blueprint.needs_workers() {
            let id = settlement.next_job_id();
            let label = format!("Work at {} ({})", settlement.name_of(factory), blueprint.name);
            let job = FactoryJob::new(id, factory, blueprint.options.workers_required, label);
            settlement.add_global_job(Box::new(job))?;
            settlement.factory_mut(factory)?.posted_job = Some(id);
        }
        info!(factory = %factory, blueprint = %blueprint.name, "blueprint set");
    }
    try_start(settlement, factory)?;
    Ok(())
}

/// Inventory of the factory changed: an idle factory may be able to start.
pub fn on_inventory_changed(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    if settlement.factory(factory)?.is_running() {
        return Ok(());
    }
    try_start(settlement, factory)?;
    Ok(())
}

/// Crew changed: bring progress up to date and re-rate the running cycle.
pub fn on_workers_changed(settlement: &mut Settlement, factory: EntityId) -> Result<()> {
    let now = settlement.now();
    let params = settlement.params().clone();
    let system = settlement.factory_mut(factory)?;
    if !system.is_running() {
        return try_start(settlement, factory).map(|_| ());
    }

    system.sync_progress(now);
    let delta = match &system.blueprint {
        Some(blueprint) => production_delta(blueprint, system.workers.len(), &params),
        None => 0.0,
    };
    if delta <= 0.0 {
        stop_cycle(settlement, factory)?;
        return schedule_idle_timeout(settlement, factory);
    }
    system.progress_delta = delta;
    schedule_completion(settlement, factory)
}

pub fn join_factory(settlement: &mut Settlement, factory: EntityId, worker: EntityId) -> Result<()> {
    if settlement.factory_mut(factory)?.workers.insert(worker) {
        on_workers_changed(settlement, factory)?;
    }
    Ok(())
}

pub fn leave_factory(settlement: &mut Settlement, factory: EntityId, worker: EntityId) -> Result<()> {
    if settlement.factory_mut(factory)?.workers.remove(&worker) {
        on_workers_changed(settlement, factory)?;
    }
    Ok(())
}

/// Scheduled completion. Stale wakes (rescheduled or stopped) are ignored.
pub fn complete_cycle(settlement: &mut Settlement, factory: EntityId, generation: u64) -> Result<()> {
    let now = settlement.now();
    let system = settlement.factory_mut(factory)?;
    if !system.is_running() || system.cycle_generation != generation {
        return Ok(());
    }
    system.sync_progress(now);
    system.progress = 1.0;
    system.state = ProductionState::Idle;
    system.progress_delta = 0.0;
    system.cycles_completed += 1;
    let Some(blueprint) = system.blueprint.clone() else {
        return Ok(());
    };

    let inventory = settlement.inventory_mut(factory)?;
    inventory.clear_reservation(&ReservationKey::Factory(factory))?;
    inventory.change_multiple(&blueprint.products)?;

    let location = settlement.location_of(factory)?;
    let entity = settlement.entity_ref(factory);
    let message = format!("Completed {} at {}", blueprint.name, settlement.name_of(factory));
    settlement.log_mut().log_cycle_completed(now, location, entity, message);
    info!(factory = %factory, blueprint = %blueprint.name, "cycle completed");

    try_start(settlement, factory)?;
    Ok(())
}

/// Idle timeout fired: dismiss the crew.
pub fn idle_timeout(settlement: &mut Settlement, factory: EntityId, generation: u64) -> Result<()> {
    let system = settlement.factory_mut(factory)?;
    if !system.idle_timeout_pending || system.idle_generation != generation {
        return Ok(());
    }
    system.idle_timeout_pending = false;
    if system.is_running() {
        return Ok(());
    }
    let dismissed: Vec<EntityId> = std::mem::take(&mut system.workers).into_iter().collect();
    if dismissed.is_empty() {
        return Ok(());
    }

    debug!(factory = %factory, workers = dismissed.len(), "crew dismissed");
    for worker in dismissed {
        if let Some(activity) = settlement.agent(worker).ok().and_then(|a| a.activity) {
            settlement.wake_activity(activity);
        }
    }
    log_production(settlement, factory, "Nothing to do, crew sent home".to_string())
}

/// Bring every running factory's progress up to the current time
pub fn sync_all_progress(settlement: &mut Settlement) {
    let now = settlement.now();
    for factory in settlement.factory_ids() {
        if let Ok(system) = settlement.factory_mut(factory) {
            system.sync_progress(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BlueprintOptions, Material, MaterialDef, MaterialState};
    use crate::inventory::Capacity;
    use crate::params::EconomyParams;
    use crate::types::TileCoord;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    struct Mill {
        settlement: Settlement,
        wheat: Material,
        flour: Material,
        factory: EntityId,
        worker: EntityId,
    }

    /// One-worker mill, 25 wheat -> 20 flour over 10000 time units
    fn mill(wheat_stock: i64) -> Mill {
        let mut settlement = Settlement::new(EconomyParams::strict());
        let wheat = Material::new(MaterialDef::new("wheat", "Wheat", 25));
        let flour = Material::new(MaterialDef::new("flour", "Flour", 50));
        let blueprint = Arc::new(Blueprint::new(
            "milling",
            vec![MaterialState::new(&wheat, 25)],
            vec![MaterialState::new(&flour, 20)],
            BlueprintOptions {
                full_time_equivalent: 10_000.0,
                workers_required: 1,
                building_name: Some("Mill".into()),
            },
        ));
        let at = TileCoord::new(2, 2);
        let factory = settlement
            .spawn_factory("Mill", at, Capacity::Slots(10), Some(blueprint))
            .unwrap();
        if wheat_stock > 0 {
            settlement.inventory_mut(factory).unwrap().set(&wheat, wheat_stock).unwrap();
        }
        let worker = settlement.spawn_worker("Bo", at, 2, 1000);
        settlement.dispatch_changes().unwrap();
        Mill {
            settlement,
            wheat,
            flour,
            factory,
            worker,
        }
    }

    fn vacancies(settlement: &Settlement, factory: EntityId) -> u32 {
        let job = settlement.factory(factory).unwrap().posted_job().unwrap();
        settlement.board().global(job).unwrap().vacancies()
    }

    #[test]
    fn test_needs_a_crew_to_start() {
        let Mill { settlement, factory, .. } = mill(25);
        let system = settlement.factory(factory).unwrap();
        assert!(!system.is_running());
        assert!(system.posted_job().is_some());
        assert!(!can_start_new_blueprint_cycle(&settlement, factory));
        assert!(has_materials_for_cycle(&settlement, factory));
        assert_eq!(vacancies(&settlement, factory), 1);
    }

    #[test]
    fn test_production_timing() {
        let Mill { mut settlement, wheat, flour, factory, worker } = mill(25);
        settlement.seek_work(worker).unwrap();
        assert_eq!(vacancies(&settlement, factory), 0);
        settlement.advance_to(0).unwrap();

        let system = settlement.factory(factory).unwrap();
        assert!(system.is_running());
        assert!(system.workers().contains(&worker));
        assert!(approx_eq(system.progress_delta(), 1.0 / 10_000.0));
        let inv = settlement.inventory(factory).unwrap();
        assert_eq!(inv.stock_of(&wheat), 0);
        assert_eq!(inv.reserved_incoming_of(&flour), 20);

        settlement.advance_to(500).unwrap();
        assert!(approx_eq(settlement.factory(factory).unwrap().progress(), 0.05));

        settlement.advance_to(9_999).unwrap();
        assert!(settlement.factory(factory).unwrap().is_running());
        assert_eq!(settlement.inventory(factory).unwrap().stock_of(&flour), 0);

        settlement.advance_to(10_000).unwrap();
        let system = settlement.factory(factory).unwrap();
        assert!(!system.is_running());
        assert_eq!(system.cycles_completed(), 1);
        let inv = settlement.inventory(factory).unwrap();
        assert_eq!(inv.stock_of(&flour), 20);
        assert_eq!(inv.reserved_incoming_of(&flour), 0);
        assert_eq!(settlement.log().stats.cycles_completed, 1);
    }

    #[test]
    fn test_idle_crew_is_sent_home() {
        let Mill { mut settlement, factory, worker, .. } = mill(25);
        settlement.seek_work(worker).unwrap();
        settlement.advance_to(10_000).unwrap();
        assert!(settlement.factory(factory).unwrap().workers().contains(&worker));

        settlement.advance_to(10_001).unwrap();
        assert!(settlement.factory(factory).unwrap().workers().is_empty());
        assert!(settlement.agent(worker).unwrap().is_idle());
        assert_eq!(vacancies(&settlement, factory), 1);
    }

    #[test]
    fn test_completion_chains_into_next_cycle() {
        let Mill { mut settlement, flour, factory, worker, .. } = mill(50);
        settlement.seek_work(worker).unwrap();
        settlement.advance_to(10_000).unwrap();
        let system = settlement.factory(factory).unwrap();
        assert!(system.is_running());
        assert!(approx_eq(system.progress(), 0.0));
        assert_eq!(settlement.inventory(factory).unwrap().stock_of(&flour), 20);

        settlement.advance_to(20_000).unwrap();
        assert_eq!(settlement.inventory(factory).unwrap().stock_of(&flour), 40);
        assert_eq!(settlement.factory(factory).unwrap().cycles_completed(), 2);
    }

    #[test]
    fn test_losing_the_crew_forfeits_ingredients() {
        let Mill { mut settlement, wheat, flour, factory, worker } = mill(25);
        settlement.seek_work(worker).unwrap();
        settlement.advance_to(5_000).unwrap();
        settlement.kill_agent(worker).unwrap();
        settlement.advance_to(5_000).unwrap();

        let system = settlement.factory(factory).unwrap();
        assert!(!system.is_running());
        assert!(system.workers().is_empty());
        assert_eq!(system.progress(), 0.0);
        let inv = settlement.inventory(factory).unwrap();
        assert_eq!(inv.stock_of(&wheat), 0);
        assert_eq!(inv.reserved_incoming_of(&flour), 0);
        assert!(inv.reservations().next().is_none());

        settlement.advance_to(20_000).unwrap();
        assert_eq!(settlement.inventory(factory).unwrap().stock_of(&flour), 0);
    }

    #[test]
    fn test_unattended_blueprint_stops_when_full() {
        let mut settlement = Settlement::new(EconomyParams::strict());
        let water = Material::new(MaterialDef::new("water", "Water", 100));
        let well = Arc::new(Blueprint::new(
            "drawing water",
            vec![],
            vec![MaterialState::new(&water, 50)],
            BlueprintOptions {
                full_time_equivalent: 2000.0,
                workers_required: 0,
                building_name: None,
            },
        ));
        let factory = settlement
            .spawn_factory("Well", TileCoord::new(0, 0), Capacity::Slots(1), Some(well))
            .unwrap();
        let system = settlement.factory(factory).unwrap();
        assert!(system.is_running());
        assert!(system.posted_job().is_none());

        settlement.advance_to(2_000).unwrap();
        assert_eq!(settlement.inventory(factory).unwrap().stock_of(&water), 50);
        assert!(settlement.factory(factory).unwrap().is_running());

        settlement.advance_to(10_000).unwrap();
        assert_eq!(settlement.inventory(factory).unwrap().stock_of(&water), 100);
        assert!(!settlement.factory(factory).unwrap().is_running());
        assert_eq!(settlement.factory(factory).unwrap().cycles_completed(), 2);
    }

    #[test]
    fn test_blueprint_change_reposts_by_identity() {
        let Mill { mut settlement, wheat, flour, factory, .. } = mill(0);
        let first = settlement.factory(factory).unwrap().posted_job().unwrap();
        let same = settlement.factory(factory).unwrap().blueprint().cloned();
        settlement.set_blueprint(factory, same).unwrap();
        assert_eq!(settlement.factory(factory).unwrap().posted_job(), Some(first));

        let coarse = Arc::new(Blueprint::new(
            "coarse milling",
            vec![MaterialState::new(&wheat, 25)],
            vec![MaterialState::new(&flour, 15)],
            BlueprintOptions {
                full_time_equivalent: 5_000.0,
                workers_required: 2,
                building_name: None,
            },
        ));
        settlement.set_blueprint(factory, Some(coarse)).unwrap();
        let second = settlement.factory(factory).unwrap().posted_job().unwrap();
        assert_ne!(first, second);
        assert!(!settlement.board().contains(first));
        assert_eq!(vacancies(&settlement, factory), 2);

        settlement.set_blueprint(factory, None).unwrap();
        assert!(settlement.factory(factory).unwrap().posted_job().is_none());
        assert_eq!(settlement.board().global_count(), 0);
    }
}

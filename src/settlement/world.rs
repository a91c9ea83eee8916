//! The settlement: entity store, clock and event dispatch
//!
//! Entities are plain ids. Components live in typed tables keyed by id:
//! inventories, agents, factories, stock policies. The settlement also owns
//! the job board, the activity log and the wake queue that drives time.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::activity_log::{ActivityCategory, ActivityEntity, ActivityLog};
use crate::catalog::Blueprint;
use crate::error::{EconomyError, Result};
use crate::inventory::{Capacity, Inventory};
use crate::jobs::{JobBoard, JobPosting, PersonalJob};
use crate::logistics::{plan_logistics, StockPolicy};
use crate::params::{EconomyParams, FaultPolicy};
use crate::production::{cycle, ProductionSystem};
use crate::settlement::activity::{Activity, RunningActivity, Step, Wake, WakeQueue};
use crate::settlement::agent::Agent;
use crate::settlement::terrain::{OpenTerrain, TileGraph};
use crate::types::{ActivityId, EntityId, IdGenerators, JobId, SimTime, TileCoord};

/// Rounds of change dispatch per instant before the rest is deferred
const MAX_DISPATCH_ROUNDS: usize = 32;

/// Kind of entity, for display and reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Worker,
    Storage,
    Factory,
}

/// Name and place of an entity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub kind: EntityKind,
    /// Fixed location of buildings; agents keep theirs on `Agent`
    pub location: TileCoord,
}

pub struct Settlement {
    params: EconomyParams,
    now: SimTime,
    ids: IdGenerators,
    terrain: Box<dyn TileGraph>,

    records: BTreeMap<EntityId, EntityRecord>,
    inventories: BTreeMap<EntityId, Inventory>,
    agents: BTreeMap<EntityId, Agent>,
    factories: BTreeMap<EntityId, ProductionSystem>,
    stock_policies: BTreeMap<EntityId, Vec<StockPolicy>>,

    board: JobBoard,
    log: ActivityLog,
    activities: BTreeMap<ActivityId, RunningActivity>,
    pub(crate) wakes: WakeQueue,
    planning_requested: bool,
}

impl Settlement {
    pub fn new(params: EconomyParams) -> Self {
        Self::with_terrain(params, Box::new(OpenTerrain))
    }

    pub fn with_terrain(params: EconomyParams, terrain: Box<dyn TileGraph>) -> Self {
        let log = ActivityLog::new(params.activity_log_capacity);
        Settlement {
            params,
            now: 0,
            ids: IdGenerators::default(),
            terrain,
            records: BTreeMap::new(),
            inventories: BTreeMap::new(),
            agents: BTreeMap::new(),
            factories: BTreeMap::new(),
            stock_policies: BTreeMap::new(),
            board: JobBoard::new(),
            log,
            activities: BTreeMap::new(),
            wakes: WakeQueue::new(),
            planning_requested: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn params(&self) -> &EconomyParams {
        &self.params
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut JobBoard {
        &mut self.board
    }

    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> {
        self.records.iter().map(|(&id, record)| (id, record))
    }

    pub fn name_of(&self, id: EntityId) -> String {
        self.records
            .get(&id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Current location: the agent's position, or the building's tile
    pub fn location_of(&self, id: EntityId) -> Result<TileCoord> {
        if let Some(agent) = self.agents.get(&id) {
            return Ok(agent.location);
        }
        self.records
            .get(&id)
            .map(|r| r.location)
            .ok_or(EconomyError::UnknownEntity(id))
    }

    pub fn inventory(&self, id: EntityId) -> Result<&Inventory> {
        self.inventories.get(&id).ok_or(EconomyError::MissingComponent {
            entity: id,
            component: "inventory",
        })
    }

    pub fn inventory_mut(&mut self, id: EntityId) -> Result<&mut Inventory> {
        self.inventories.get_mut(&id).ok_or(EconomyError::MissingComponent {
            entity: id,
            component: "inventory",
        })
    }

    pub fn inventories(&self) -> impl Iterator<Item = (EntityId, &Inventory)> {
        self.inventories.iter().map(|(&id, inv)| (id, inv))
    }

    pub fn agent(&self, id: EntityId) -> Result<&Agent> {
        self.agents.get(&id).ok_or(EconomyError::MissingComponent {
            entity: id,
            component: "agent",
        })
    }

    pub fn agent_mut(&mut self, id: EntityId) -> Result<&mut Agent> {
        self.agents.get_mut(&id).ok_or(EconomyError::MissingComponent {
            entity: id,
            component: "agent",
        })
    }

    pub fn agents(&self) -> impl Iterator<Item = (EntityId, &Agent)> {
        self.agents.iter().map(|(&id, agent)| (id, agent))
    }

    pub fn factory(&self, id: EntityId) -> Result<&ProductionSystem> {
        self.factories.get(&id).ok_or(EconomyError::MissingComponent {
            entity: id,
            component: "production",
        })
    }

    pub(crate) fn factory_mut(&mut self, id: EntityId) -> Result<&mut ProductionSystem> {
        self.factories.get_mut(&id).ok_or(EconomyError::MissingComponent {
            entity: id,
            component: "production",
        })
    }

    pub fn factories(&self) -> impl Iterator<Item = (EntityId, &ProductionSystem)> {
        self.factories.iter().map(|(&id, f)| (id, f))
    }

    pub fn stock_policies(&self) -> impl Iterator<Item = (EntityId, &StockPolicy)> {
        self.stock_policies
            .iter()
            .flat_map(|(&id, policies)| policies.iter().map(move |p| (id, p)))
    }

    pub fn walking_distance(&self, from: TileCoord, to: TileCoord) -> Option<f64> {
        self.terrain.walking_distance(from, to)
    }

    /// Log handle for an entity
    pub fn entity_ref(&self, id: EntityId) -> ActivityEntity {
        let name = self.name_of(id);
        if self.agents.contains_key(&id) {
            ActivityEntity::Agent { id, name }
        } else {
            ActivityEntity::Building { id, name }
        }
    }

    pub fn next_job_id(&mut self) -> JobId {
        self.ids.next_job()
    }

    pub fn running_activities(&self) -> usize {
        self.activities.len()
    }

    pub fn activity_label(&self, id: ActivityId) -> Option<String> {
        self.activities.get(&id).map(|r| r.activity.label())
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    fn spawn(&mut self, name: &str, kind: EntityKind, location: TileCoord, capacity: Capacity) -> EntityId {
        let id = self.ids.next_entity();
        self.records.insert(
            id,
            EntityRecord {
                name: name.to_string(),
                kind,
                location,
            },
        );
        self.inventories.insert(id, Inventory::new(capacity));
        debug!(entity = %id, name, ?kind, "spawned");
        id
    }

    pub fn spawn_storage(&mut self, name: &str, location: TileCoord, capacity: Capacity) -> EntityId {
        self.spawn(name, EntityKind::Storage, location, capacity)
    }

    /// A building with an inventory and a production system
    pub fn spawn_factory(
        &mut self,
        name: &str,
        location: TileCoord,
        capacity: Capacity,
        blueprint: Option<Arc<Blueprint>>,
    ) -> Result<EntityId> {
        let id = self.spawn(name, EntityKind::Factory, location, capacity);
        self.factories.insert(id, ProductionSystem::new(id, self.now));
        cycle::set_blueprint(self, id, blueprint)?;
        Ok(id)
    }

    /// A worker carrying a small inventory of `cargo_slots` stacks
    pub fn spawn_worker(&mut self, name: &str, location: TileCoord, cargo_slots: u32, walk_time_per_tile: SimTime) -> EntityId {
        let id = self.spawn(name, EntityKind::Worker, location, Capacity::Slots(cargo_slots));
        let agent = Agent::new(name, location, walk_time_per_tile, self.params.agent_status_capacity);
        self.agents.insert(id, agent);
        id
    }

    /// Set the stock thresholds of an entity for one material, replacing any
    /// earlier policy for that material.
    pub fn set_stock_policy(&mut self, entity: EntityId, policy: StockPolicy) -> Result<()> {
        if !self.inventories.contains_key(&entity) {
            return Err(EconomyError::MissingComponent {
                entity,
                component: "inventory",
            });
        }
        let policies = self.stock_policies.entry(entity).or_default();
        policies.retain(|p| p.material != policy.material);
        policies.push(policy);
        self.request_planning();
        Ok(())
    }

    pub fn clear_stock_policies(&mut self, entity: EntityId) {
        if self.stock_policies.remove(&entity).is_some() {
            self.request_planning();
        }
    }

    /// Change a factory's recipe
    pub fn set_blueprint(&mut self, factory: EntityId, blueprint: Option<Arc<Blueprint>>) -> Result<()> {
        cycle::set_blueprint(self, factory, blueprint)
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Put a posting on the board: `on_post` runs first, a failing hook
    /// keeps the posting off the board.
    pub fn add_global_job(&mut self, mut job: Box<dyn JobPosting>) -> Result<JobId> {
        job.on_post(self)?;
        let id = job.id();
        let label = job.label();
        self.log.log_job_posted(self.now, id, format!("Posted {}", label));
        info!(job = %id, %label, "job posted");
        self.board.insert_global(job);
        Ok(id)
    }

    pub fn add_personal_job(
        &mut self,
        agent: EntityId,
        label: &str,
        score: impl Fn(&Settlement, EntityId) -> f64 + 'static,
        start: impl Fn(&mut Settlement, EntityId) -> Result<Option<Box<dyn Activity>>> + 'static,
    ) -> Result<JobId> {
        self.agent(agent)?;
        let id = self.ids.next_job();
        self.board.add_personal(agent, PersonalJob::new(id, label, score, start));
        Ok(id)
    }

    fn ensure_idle(&self, agent: EntityId) -> Result<()> {
        if self.agent(agent)?.is_idle() {
            Ok(())
        } else {
            Err(EconomyError::AgentBusy(agent))
        }
    }

    /// Assign a global posting to an agent and start the activity it returns.
    pub fn execute_job(&mut self, job_id: JobId, agent: EntityId) -> Result<ActivityId> {
        self.ensure_idle(agent)?;
        let mut job = self.board.check_out(job_id)?;
        if job.vacancies() < 1 {
            self.board.check_in(job);
            return Err(EconomyError::NoVacancy(job_id));
        }
        job.set_vacancies(job.vacancies() - 1);
        let restore = job.restore_vacancy_when_done();
        let label = job.label();

        let assigned = job.on_assign(self, agent);
        if assigned.is_err() && restore {
            job.set_vacancies(job.vacancies() + 1);
        }
        self.board.check_in(job);
        let activity = assigned?;

        let message = format!("{} took {}", self.name_of(agent), label);
        let entity = self.entity_ref(agent);
        self.log.record(self.now, None, ActivityCategory::Jobs, Some(entity), message);
        self.start_activity(agent, restore.then_some(job_id), activity)
    }

    pub fn execute_personal_job(&mut self, agent: EntityId, id: JobId) -> Result<Option<ActivityId>> {
        self.ensure_idle(agent)?;
        let start = self.board.personal_start_fn(agent, id).ok_or(EconomyError::UnknownJob(id))?;
        match start(self, agent)? {
            Some(activity) => self.start_activity(agent, None, activity).map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Hand an activity to an idle agent and run it up to its first wait.
    pub fn start_activity(
        &mut self,
        agent: EntityId,
        restore_job: Option<JobId>,
        activity: Box<dyn Activity>,
    ) -> Result<ActivityId> {
        self.ensure_idle(agent)?;
        let id = self.ids.next_activity();
        let now = self.now;
        let label = activity.label();
        let record = self.agent_mut(agent)?;
        record.activity = Some(id);
        record.push_status(now, label);
        self.activities.insert(
            id,
            RunningActivity {
                agent,
                activity,
                restore_job,
                generation: 0,
                suspended: false,
            },
        );
        self.run_activity(id)?;
        Ok(id)
    }

    /// Resume a suspended activity at the current time
    pub fn wake_activity(&mut self, id: ActivityId) {
        let now = self.now;
        if let Some(running) = self.activities.get_mut(&id) {
            if running.suspended {
                running.suspended = false;
                running.generation += 1;
                self.wakes.push(now, Wake::Activity { id, generation: running.generation });
            }
        }
    }

    fn run_activity(&mut self, id: ActivityId) -> Result<()> {
        let Some(mut running) = self.activities.remove(&id) else {
            return Ok(());
        };
        running.suspended = false;
        match running.activity.resume(self) {
            Ok(Step::WaitUntil(time)) => {
                running.generation += 1;
                let wake = Wake::Activity { id, generation: running.generation };
                self.wakes.push(time.max(self.now), wake);
                self.activities.insert(id, running);
            }
            Ok(Step::Suspend) => {
                running.suspended = true;
                self.activities.insert(id, running);
            }
            Ok(Step::Done) => self.finish_activity(id, running),
            Err(err) => {
                let context = format!("{} of {}", running.activity.label(), self.name_of(running.agent));
                running.activity.abort(self);
                self.finish_activity(id, running);
                self.handle_fault(&context, err)?;
            }
        }
        Ok(())
    }

    fn finish_activity(&mut self, id: ActivityId, running: RunningActivity) {
        if let Some(job) = running.restore_job {
            self.board.restore_vacancy(job);
        }
        let now = self.now;
        if let Some(agent) = self.agents.get_mut(&running.agent) {
            if agent.activity == Some(id) {
                agent.activity = None;
                agent.destination = None;
                agent.push_status(now, "idle".to_string());
            }
        }
    }

    /// Apply the fault policy to an error raised while the simulation ran
    fn handle_fault(&mut self, context: &str, err: EconomyError) -> Result<()> {
        let message = format!("{} failed: {}", context, err);
        error!(time = self.now, "{}", message);
        self.log.log_fault(self.now, message);
        match self.params.fault_policy {
            FaultPolicy::Halt => Err(err),
            FaultPolicy::Drop => Ok(()),
        }
    }

    // =========================================================================
    // Walking and health
    // =========================================================================

    /// Start walking an agent to a tile. Returns the arrival time.
    pub fn begin_walk(&mut self, agent_id: EntityId, to: TileCoord) -> Result<SimTime> {
        let from = self.agent(agent_id)?.location;
        let distance = self
            .terrain
            .walking_distance(from, to)
            .ok_or(EconomyError::Unreachable { entity: agent_id, from, to })?;
        let now = self.now;
        let agent = self.agent_mut(agent_id)?;
        agent.destination = Some(to);
        agent.push_status(now, format!("walking to {}", to));
        Ok(now + agent.walk_duration(distance))
    }

    /// Complete a walk. `false` if the agent died on the way and never arrived.
    pub fn finish_walk(&mut self, agent_id: EntityId) -> Result<bool> {
        let agent = self.agent_mut(agent_id)?;
        let destination = agent.destination.take();
        if !agent.is_alive() {
            return Ok(false);
        }
        if let Some(to) = destination {
            agent.location = to;
        }
        Ok(true)
    }

    pub fn injure_agent(&mut self, agent_id: EntityId, amount: f32) -> Result<()> {
        let now = self.now;
        let agent = self.agent_mut(agent_id)?;
        let was_alive = agent.is_alive();
        agent.health -= amount;
        if was_alive && !agent.is_alive() {
            agent.push_status(now, "dead".to_string());
            let location = agent.location;
            let activity = agent.activity;
            let entity = self.entity_ref(agent_id);
            let message = format!("{} died", self.name_of(agent_id));
            warn!(time = now, agent = %agent_id, "agent died");
            self.log.record(now, Some(location), ActivityCategory::Danger, Some(entity), message);
            if let Some(activity) = activity {
                self.wake_activity(activity);
            }
        }
        Ok(())
    }

    pub fn kill_agent(&mut self, agent_id: EntityId) -> Result<()> {
        let health = self.agent(agent_id)?.health;
        self.injure_agent(agent_id, health.max(0.0) + 1.0)
    }

    // =========================================================================
    // Time and dispatch
    // =========================================================================

    /// Ask for a logistics planning pass at the next dispatch
    pub fn request_planning(&mut self) {
        self.planning_requested = true;
    }

    /// Deliver pending inventory change events: factories re-check whether
    /// they can start, and the logistics planner re-balances stock.
    pub fn dispatch_changes(&mut self) -> Result<()> {
        for _ in 0..MAX_DISPATCH_ROUNDS {
            let changed: Vec<EntityId> = self
                .inventories
                .iter_mut()
                .filter_map(|(&id, inv)| (!inv.take_changes().is_empty()).then_some(id))
                .collect();
            if changed.is_empty() && !self.planning_requested {
                return Ok(());
            }

            for &id in &changed {
                if self.factories.contains_key(&id) {
                    if let Err(err) = cycle::on_inventory_changed(self, id) {
                        let context = format!("production at {}", self.name_of(id));
                        self.handle_fault(&context, err)?;
                    }
                }
            }

            if self.planning_requested || changed.iter().any(|id| self.stock_policies.contains_key(id)) {
                self.planning_requested = false;
                if let Err(err) = plan_logistics(self) {
                    self.handle_fault("logistics planning", err)?;
                }
            }
        }
        warn!(time = self.now, "inventory changes kept cascading, deferring the rest");
        Ok(())
    }

    /// Run every wake due up to `time`, then move the clock there.
    pub fn advance_to(&mut self, time: SimTime) -> Result<()> {
        self.dispatch_changes()?;
        while let Some((at, wake)) = self.wakes.pop_due(time) {
            self.now = self.now.max(at);
            match wake {
                Wake::Activity { id, generation } => {
                    let current = self
                        .activities
                        .get(&id)
                        .map_or(false, |r| r.generation == generation && !r.suspended);
                    if current {
                        self.run_activity(id)?;
                    }
                }
                Wake::FactoryCycle { factory, generation } => {
                    if let Err(err) = cycle::complete_cycle(self, factory, generation) {
                        let context = format!("production at {}", self.name_of(factory));
                        self.handle_fault(&context, err)?;
                    }
                }
                Wake::FactoryIdle { factory, generation } => {
                    cycle::idle_timeout(self, factory, generation)?;
                }
            }
            self.dispatch_changes()?;
        }
        if time > self.now {
            self.now = time;
        }
        cycle::sync_all_progress(self);
        debug!(time = self.now, activities = self.activities.len(), "advanced");
        Ok(())
    }

    /// Time of the next scheduled wake
    pub fn next_wake(&self) -> Option<SimTime> {
        self.wakes.next_time()
    }

    pub(crate) fn factory_ids(&self) -> Vec<EntityId> {
        self.factories.keys().copied().collect()
    }
}

//! Job board - the registry of available work
//!
//! Global postings are open to every agent; personal jobs are registered for
//! one agent only. Agents never see postings directly: `for_entity` hands out
//! lazy `CandidateFactory` handles that resolve to a scored `JobCandidate`
//! when the decision maker asks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{EconomyError, Result};
use crate::jobs::posting::JobPosting;
use crate::settlement::{Activity, Settlement};
use crate::types::{ActivityId, EntityId, JobId};

/// Scores a personal job for its owner
pub type PersonalScoreFn = Rc<dyn Fn(&Settlement, EntityId) -> f64>;

/// Starts a personal job; `None` means it finished on the spot
pub type PersonalStartFn = Rc<dyn Fn(&mut Settlement, EntityId) -> Result<Option<Box<dyn Activity>>>>;

/// Work only one agent can take (eat, sleep, tidy own house, ...)
#[derive(Clone)]
pub struct PersonalJob {
    pub id: JobId,
    pub label: String,
    score: PersonalScoreFn,
    start: PersonalStartFn,
}

impl PersonalJob {
    pub fn new(
        id: JobId,
        label: &str,
        score: impl Fn(&Settlement, EntityId) -> f64 + 'static,
        start: impl Fn(&mut Settlement, EntityId) -> Result<Option<Box<dyn Activity>>> + 'static,
    ) -> Self {
        PersonalJob {
            id,
            label: label.to_string(),
            score: Rc::new(score),
            start: Rc::new(start),
        }
    }
}

impl fmt::Debug for PersonalJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersonalJob({}, {})", self.id, self.label)
    }
}

/// Where a candidate came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateSource {
    Global(JobId),
    Personal(JobId),
}

/// Lazy handle to one option an agent has
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateFactory {
    pub agent: EntityId,
    pub source: CandidateSource,
}

impl CandidateFactory {
    /// Score the option now. `None` if the job left the board in the meantime.
    pub fn resolve(&self, settlement: &Settlement) -> Option<JobCandidate> {
        let board = settlement.board();
        let (score, label) = match self.source {
            CandidateSource::Global(id) => {
                let job = board.global(id)?;
                (job.score_for_entity(settlement, self.agent), job.label())
            }
            CandidateSource::Personal(id) => {
                let job = board.personal(self.agent, id)?;
                ((job.score)(settlement, self.agent).clamp(0.0, 1.0), job.label.clone())
            }
        };
        Some(JobCandidate {
            agent: self.agent,
            source: self.source,
            score,
            label,
        })
    }
}

/// A scored option, ready to execute
#[derive(Clone, Debug, PartialEq)]
pub struct JobCandidate {
    pub agent: EntityId,
    pub source: CandidateSource,
    pub score: f64,
    pub label: String,
}

impl JobCandidate {
    /// Start the job for the agent. Returns the activity now running, if any.
    pub fn execute(&self, settlement: &mut Settlement) -> Result<Option<ActivityId>> {
        match self.source {
            CandidateSource::Global(id) => settlement.execute_job(id, self.agent).map(Some),
            CandidateSource::Personal(id) => settlement.execute_personal_job(self.agent, id),
        }
    }
}

/// Registry of global postings and per-agent personal jobs
#[derive(Default)]
pub struct JobBoard {
    global: BTreeMap<JobId, Box<dyn JobPosting>>,
    /// Postings taken off the board while their hook runs
    checked_out: BTreeSet<JobId>,
    /// Checked-out postings removed by their own hook
    withdrawn: BTreeSet<JobId>,
    personal: BTreeMap<EntityId, Vec<PersonalJob>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a posting whose `on_post` already ran. Use `Settlement::add_global_job`.
    pub(crate) fn insert_global(&mut self, job: Box<dyn JobPosting>) {
        self.global.insert(job.id(), job);
    }

    /// Withdraw a posting. No hook runs; reservations made in `on_post` stay
    /// with their owner.
    pub fn remove_global(&mut self, id: JobId) -> Option<Box<dyn JobPosting>> {
        if self.checked_out.contains(&id) {
            self.withdrawn.insert(id);
            return None;
        }
        self.global.remove(&id)
    }

    pub fn global(&self, id: JobId) -> Option<&dyn JobPosting> {
        self.global.get(&id).map(|job| job.as_ref())
    }

    pub fn contains(&self, id: JobId) -> bool {
        (self.global.contains_key(&id) || self.checked_out.contains(&id)) && !self.withdrawn.contains(&id)
    }

    pub fn global_jobs(&self) -> impl Iterator<Item = &dyn JobPosting> {
        self.global.values().map(|job| job.as_ref())
    }

    pub fn global_count(&self) -> usize {
        self.global.len() + self.checked_out.len() - self.withdrawn.len()
    }

    pub fn add_personal(&mut self, agent: EntityId, job: PersonalJob) {
        self.personal.entry(agent).or_default().push(job);
    }

    pub fn remove_personal(&mut self, agent: EntityId, id: JobId) -> Option<PersonalJob> {
        let jobs = self.personal.get_mut(&agent)?;
        let index = jobs.iter().position(|job| job.id == id)?;
        let job = jobs.remove(index);
        if jobs.is_empty() {
            self.personal.remove(&agent);
        }
        Some(job)
    }

    pub fn personal(&self, agent: EntityId, id: JobId) -> Option<&PersonalJob> {
        self.personal.get(&agent)?.iter().find(|job| job.id == id)
    }

    /// Every option the agent has right now: all global postings, then the
    /// agent's personal jobs.
    pub fn for_entity(&self, agent: EntityId) -> Vec<CandidateFactory> {
        let global = self.global.keys().map(|&id| CandidateFactory {
            agent,
            source: CandidateSource::Global(id),
        });
        let personal = self
            .personal
            .get(&agent)
            .into_iter()
            .flatten()
            .map(|job| CandidateFactory {
                agent,
                source: CandidateSource::Personal(job.id),
            });
        global.chain(personal).collect()
    }

    pub(crate) fn check_out(&mut self, id: JobId) -> Result<Box<dyn JobPosting>> {
        let job = self.global.remove(&id).ok_or(EconomyError::UnknownJob(id))?;
        self.checked_out.insert(id);
        Ok(job)
    }

    /// Put a checked-out posting back unless its hook withdrew it
    pub(crate) fn check_in(&mut self, job: Box<dyn JobPosting>) {
        let id = job.id();
        self.checked_out.remove(&id);
        if !self.withdrawn.remove(&id) {
            self.global.insert(id, job);
        }
    }

    pub(crate) fn restore_vacancy(&mut self, id: JobId) {
        if let Some(job) = self.global.get_mut(&id) {
            let vacancies = job.vacancies();
            job.set_vacancies(vacancies + 1);
        }
    }

    pub(crate) fn personal_start_fn(&self, agent: EntityId, id: JobId) -> Option<PersonalStartFn> {
        self.personal(agent, id).map(|job| Rc::clone(&job.start))
    }
}

impl fmt::Debug for JobBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobBoard")
            .field("global", &self.global.keys().collect::<Vec<_>>())
            .field("personal", &self.personal)
            .finish()
    }
}

//! Job postings: units of work agents can take

use crate::error::Result;
use crate::settlement::{Activity, Settlement};
use crate::types::{EntityId, JobId};

/// A unit of postable work.
///
/// Implementors provide the lifecycle hooks; the board and the settlement
/// drive them: `on_post` once when the posting goes on the board, `on_score`
/// whenever an agent weighs its options, `on_assign` when an agent takes a
/// vacancy. `on_assign` returns the state machine the agent then runs.
pub trait JobPosting {
    fn id(&self) -> JobId;

    /// Short description shown to decision makers
    fn label(&self) -> String;

    /// Remaining worker slots
    fn vacancies(&self) -> u32;

    fn set_vacancies(&mut self, vacancies: u32);

    /// Whether finishing the job reopens the slot it used
    fn restore_vacancy_when_done(&self) -> bool;

    fn on_post(&mut self, _settlement: &mut Settlement) -> Result<()> {
        Ok(())
    }

    /// Desirability in `[0, 1]`; 0 means never take it
    fn on_score(&self, settlement: &Settlement, agent: EntityId) -> f64;

    fn on_assign(&mut self, settlement: &mut Settlement, agent: EntityId) -> Result<Box<dyn Activity>>;

    /// Score with the vacancy rule applied: a full posting scores 0 for everyone.
    fn score_for_entity(&self, settlement: &Settlement, agent: EntityId) -> f64 {
        if self.vacancies() == 0 {
            return 0.0;
        }
        self.on_score(settlement, agent).clamp(0.0, 1.0)
    }
}

//! Activities and the wake queue
//!
//! A long-running job (walk, load, walk, unload) is an explicit state
//! machine. The settlement resumes it, it does the work that belongs to the
//! current instant and says when it wants to be resumed next.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::settlement::world::Settlement;
use crate::types::{ActivityId, EntityId, JobId, SimTime};

/// What an activity wants after a resume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Resume at this time (may be now)
    WaitUntil(SimTime),
    /// Sleep until somebody wakes the activity explicitly
    Suspend,
    Done,
}

/// A resumable piece of agent behaviour
pub trait Activity {
    fn label(&self) -> String;

    /// Advance the state machine at `settlement.now()`
    fn resume(&mut self, settlement: &mut Settlement) -> Result<Step>;

    /// Release whatever the activity still holds. Called when the activity
    /// is discarded after a fault.
    fn abort(&mut self, _settlement: &mut Settlement) {}
}

/// Running activity with its bookkeeping
pub(crate) struct RunningActivity {
    pub agent: EntityId,
    pub activity: Box<dyn Activity>,
    /// Posting to give a vacancy back to when done
    pub restore_job: Option<JobId>,
    /// Bumped on every reschedule; older wakes are stale
    pub generation: u64,
    pub suspended: bool,
}

/// Something scheduled to happen at a time
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Wake {
    Activity { id: ActivityId, generation: u64 },
    FactoryCycle { factory: EntityId, generation: u64 },
    FactoryIdle { factory: EntityId, generation: u64 },
}

/// Min-heap of wakes, FIFO among equal times
#[derive(Debug, Default)]
pub struct WakeQueue {
    heap: BinaryHeap<Reverse<(SimTime, u64, Wake)>>,
    seq: u64,
}

impl WakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: SimTime, wake: Wake) {
        self.seq += 1;
        self.heap.push(Reverse((time, self.seq, wake)));
    }

    /// Time of the earliest wake
    pub fn next_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|Reverse((time, _, _))| *time)
    }

    /// Pop the earliest wake if it is due by `limit`
    pub fn pop_due(&mut self, limit: SimTime) -> Option<(SimTime, Wake)> {
        if self.next_time()? > limit {
            return None;
        }
        self.heap.pop().map(|Reverse((time, _, wake))| (time, wake))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

//! Production - factories turning ingredients into products
//!
//! `system` holds per-factory cycle state, `cycle` the transitions between
//! idle and running, `factory_job` the staffing posting and the worker's
//! shift.

pub mod system;
pub mod cycle;
pub mod factory_job;

pub use system::{production_delta, ProductionState, ProductionSystem};
pub use cycle::{can_start_new_blueprint_cycle, join_factory, leave_factory};
pub use factory_job::{FactoryJob, FactoryWork};

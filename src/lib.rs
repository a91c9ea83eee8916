//! Settlement economy library
//!
//! Materials and blueprints, slot-limited inventories with reservations, a
//! logistics exchange that matches supply with demand, a job board, and the
//! hauling and production activities that move goods around a settlement.

pub mod activity_log;
pub mod catalog;
pub mod error;
pub mod export;
pub mod inventory;
pub mod jobs;
pub mod logistics;
pub mod params;
pub mod production;
pub mod scenario;
pub mod settlement;
pub mod types;

pub use error::{EconomyError, Result};
pub use params::{EconomyParams, FaultPolicy};
pub use settlement::Settlement;

//! Logistics - matching supply with demand and hauling the difference

pub mod exchange;
pub mod job;
pub mod planner;

pub use exchange::{LogisticsDeal, LogisticsExchange};
pub use job::{Haul, LogisticsJob};
pub use planner::{plan_logistics, StockPolicy};

//! Inventory system - stock ledger with capacity and reservations
//!
//! Every transfer in the economy goes through an `Inventory`: reservations
//! claim stock or space ahead of time, and mutators refuse anything that
//! would break a claim.

pub mod reservation;
pub mod ledger;
pub mod persistence;

pub use reservation::{Reservation, ReservationKey};
pub use ledger::{Capacity, Inventory, InventoryChange, StockEntry};
pub use persistence::{InventorySave, SavedItem};

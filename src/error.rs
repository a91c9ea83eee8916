//! Error taxonomy for the settlement economy
//!
//! Allocation and reservation errors are raised synchronously by the
//! inventory ledger; job and entity errors by the board and the settlement.
//! A failed match in the logistics exchange is not an error (it is `None`).

use thiserror::Error;

use crate::types::{EntityId, JobId, TileCoord};

#[derive(Debug, Error)]
pub enum EconomyError {
    // --- allocation ---
    #[error("cannot allocate {quantity} {material}: at most {allocatable} fits")]
    Allocation {
        material: String,
        quantity: i64,
        allocatable: i64,
    },

    #[error("cannot set {material} to a negative amount ({quantity})")]
    NegativeAmount { material: String, quantity: i64 },

    #[error("cannot set {material} to {quantity}: {reserved} is reserved for departure")]
    BreaksReservation {
        material: String,
        quantity: i64,
        reserved: i64,
    },

    // --- reservation protocol ---
    #[error("A reservation for already exists for this key")]
    DuplicateReservation,

    #[error("No such reservation")]
    MissingReservation,

    #[error("not enough space to reserve the incoming materials")]
    InsufficientSpace,

    #[error("not enough {material} to reserve: wanted {wanted}, {available} available")]
    InsufficientStock {
        material: String,
        wanted: i64,
        available: i64,
    },

    // --- persistence ---
    #[error("cannot restore an inventory of a different size (saved {saved}, target {target})")]
    DifferentSize { saved: String, target: String },

    #[error("unknown material key `{0}`")]
    UnknownMaterial(String),

    #[error("unknown blueprint `{0}`")]
    UnknownBlueprint(String),

    #[error("save data could not be parsed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    // --- jobs and entities ---
    #[error("{0} has no vacancies left")]
    NoVacancy(JobId),

    #[error("{0} is not on the job board")]
    UnknownJob(JobId),

    #[error("{0} does not exist")]
    UnknownEntity(EntityId),

    #[error("{0} is already busy with another activity")]
    AgentBusy(EntityId),

    #[error("{entity} has no {component} component")]
    MissingComponent {
        entity: EntityId,
        component: &'static str,
    },

    #[error("{entity} cannot walk from {from} to {to}")]
    Unreachable {
        entity: EntityId,
        from: TileCoord,
        to: TileCoord,
    },
}

impl EconomyError {
    /// Allocation errors: stock or space exceeded, negative quantity.
    pub fn is_allocation(&self) -> bool {
        matches!(
            self,
            EconomyError::Allocation { .. }
                | EconomyError::NegativeAmount { .. }
                | EconomyError::BreaksReservation { .. }
        )
    }

    /// Reservation-protocol errors: programmer errors, never expected in normal operation.
    pub fn is_reservation_protocol(&self) -> bool {
        matches!(
            self,
            EconomyError::DuplicateReservation
                | EconomyError::MissingReservation
                | EconomyError::InsufficientSpace
                | EconomyError::InsufficientStock { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EconomyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_messages() {
        assert_eq!(
            EconomyError::DuplicateReservation.to_string(),
            "A reservation for already exists for this key"
        );
        assert_eq!(EconomyError::MissingReservation.to_string(), "No such reservation");
    }

    #[test]
    fn test_classification() {
        let err = EconomyError::NegativeAmount {
            material: "wheat".into(),
            quantity: -1,
        };
        assert!(err.is_allocation());
        assert!(!err.is_reservation_protocol());
        assert!(EconomyError::InsufficientSpace.is_reservation_protocol());
    }
}

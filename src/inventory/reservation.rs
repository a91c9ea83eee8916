//! Reservations: named claims on future arrivals and departures

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Material, MaterialState};
use crate::types::{EntityId, JobId};

/// Opaque key a reservation is held under. At most one reservation per key
/// exists on an inventory at any time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReservationKey {
    /// Held by a job posting on the supplier and destination inventories
    Job(JobId),
    /// Held on a worker's own inventory for cargo in transit
    Cargo(JobId),
    /// Held by a factory on its own inventory for the products of the running cycle
    Factory(EntityId),
    /// Free-form key for external callers
    Named(String),
}

impl From<&str> for ReservationKey {
    fn from(name: &str) -> Self {
        ReservationKey::Named(name.to_string())
    }
}

impl fmt::Display for ReservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationKey::Job(id) => write!(f, "job:{}", id.0),
            ReservationKey::Cargo(id) => write!(f, "cargo:{}", id.0),
            ReservationKey::Factory(id) => write!(f, "factory:{}", id.0),
            ReservationKey::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Exchange-shaped list of deltas held against an inventory.
///
/// Positive entries reserve space for an expected arrival, negative entries
/// reserve stock for a departure. Reservations never expire.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reservation {
    pub key: ReservationKey,
    pub exchanged: Vec<MaterialState>,
}

impl Reservation {
    pub fn new(key: ReservationKey, exchanged: Vec<MaterialState>) -> Self {
        Reservation { key, exchanged }
    }

    /// Units of `material` this reservation expects to receive
    pub fn incoming_of(&self, material: &Material) -> i64 {
        self.exchanged
            .iter()
            .filter(|s| &s.material == material && s.quantity > 0)
            .map(|s| s.quantity)
            .sum()
    }

    /// Units of `material` this reservation holds back for departure (as a positive number)
    pub fn outgoing_of(&self, material: &Material) -> i64 {
        self.exchanged
            .iter()
            .filter(|s| &s.material == material && s.quantity < 0)
            .map(|s| -s.quantity)
            .sum()
    }

    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.exchanged.iter().map(|s| &s.material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MaterialDef;

    #[test]
    fn test_incoming_and_outgoing_sums() {
        let wheat = Material::new(MaterialDef::new("wheat", "Wheat", 25));
        let flour = Material::new(MaterialDef::new("flour", "Flour", 50));
        let reservation = Reservation::new(
            "t".into(),
            vec![
                MaterialState::new(&wheat, 5),
                MaterialState::new(&wheat, -2),
                MaterialState::new(&flour, -7),
            ],
        );
        assert_eq!(reservation.incoming_of(&wheat), 5);
        assert_eq!(reservation.outgoing_of(&wheat), 2);
        assert_eq!(reservation.outgoing_of(&flour), 7);
        assert_eq!(reservation.incoming_of(&flour), 0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ReservationKey::Job(JobId(3)).to_string(), "job:3");
        assert_eq!(ReservationKey::from("t").to_string(), "t");
    }
}

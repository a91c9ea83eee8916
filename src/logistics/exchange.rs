//! Per-material supply/demand matcher
//!
//! Participants announce a signed quantity: positive to offer that much,
//! negative to request that much. A later announcement replaces the earlier
//! one. The exchange pairs the largest offer with the largest request.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::Material;
use crate::types::EntityId;

/// A matched transfer between two participants
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogisticsDeal {
    pub supplier: EntityId,
    pub destination: EntityId,
    pub material: Material,
    pub quantity: i64,
}

/// Supply/demand book for one material
#[derive(Clone, Debug)]
pub struct LogisticsExchange {
    material: Material,
    participants: BTreeMap<EntityId, i64>,
}

impl LogisticsExchange {
    pub fn new(material: &Material) -> Self {
        LogisticsExchange {
            material: material.clone(),
            participants: BTreeMap::new(),
        }
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Replace the participant's announced quantity. Zero withdraws them.
    pub fn update_supply_demand(&mut self, participant: EntityId, delta: i64) {
        if delta == 0 {
            self.participants.remove(&participant);
        } else {
            self.participants.insert(participant, delta);
        }
    }

    pub fn supply_demand_of(&self, participant: EntityId) -> i64 {
        self.participants.get(&participant).copied().unwrap_or(0)
    }

    /// Largest offer against largest request. Ties go to the lowest entity id.
    /// `None` when nobody offers or nobody requests.
    pub fn get_largest_transfer_deal(&self) -> Option<LogisticsDeal> {
        let mut supplier: Option<(EntityId, i64)> = None;
        let mut destination: Option<(EntityId, i64)> = None;

        for (&participant, &quantity) in &self.participants {
            if quantity > 0 && supplier.map_or(true, |(_, best)| quantity > best) {
                supplier = Some((participant, quantity));
            }
            if quantity < 0 && destination.map_or(true, |(_, best)| -quantity > best) {
                destination = Some((participant, -quantity));
            }
        }

        let (supplier, supply) = supplier?;
        let (destination, demand) = destination?;
        Some(LogisticsDeal {
            supplier,
            destination,
            material: self.material.clone(),
            quantity: supply.min(demand),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

//! Logistics planner - turns stock policies into transport jobs
//!
//! Every entity with a stock policy announces a signed quantity per
//! material: stock above `offer_above` is offered, stock below
//! `request_below` is requested. The planner feeds those into one exchange
//! per material and posts a `LogisticsJob` for each deal it takes.
//! Announcements count reservations, so a pass never duplicates a haul that
//! is already on its way.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::catalog::Material;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::logistics::exchange::LogisticsExchange;
use crate::logistics::job::LogisticsJob;
use crate::settlement::Settlement;
use crate::types::{EntityId, JobId};

/// Stock thresholds of one entity for one material
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockPolicy {
    pub material: Material,
    /// Request deliveries while stock (incoming included) is below this
    pub request_below: i64,
    /// Offer whatever is available above this
    pub offer_above: i64,
}

impl StockPolicy {
    pub fn new(material: &Material, request_below: i64, offer_above: i64) -> Self {
        StockPolicy {
            material: material.clone(),
            request_below,
            offer_above,
        }
    }

    /// Only offer, never request
    pub fn supplier(material: &Material, offer_above: i64) -> Self {
        Self::new(material, 0, offer_above)
    }

    /// Only request, never offer
    pub fn consumer(material: &Material, request_below: i64) -> Self {
        Self::new(material, request_below, i64::MAX)
    }

    /// Signed announcement: positive offers, negative requests. Requests are
    /// capped by the free space left for the material.
    pub fn supply_demand(&self, inventory: &Inventory) -> i64 {
        let available = inventory.available_of(&self.material);
        if available > self.offer_above {
            return available - self.offer_above;
        }

        let expected = available + inventory.reserved_incoming_of(&self.material);
        if expected < self.request_below {
            let wanted = self.request_below - expected;
            let room = inventory
                .amount_additionally_allocatable_to(&self.material)
                .unwrap_or(wanted);
            return -wanted.min(room.max(0));
        }
        0
    }
}

fn announcement(settlement: &Settlement, entity: EntityId, policy: &StockPolicy) -> i64 {
    settlement
        .inventory(entity)
        .map_or(0, |inventory| policy.supply_demand(inventory))
}

/// One planning pass over every material some policy mentions.
/// Returns the ids of the jobs it posted.
pub fn plan_logistics(settlement: &mut Settlement) -> Result<Vec<JobId>> {
    let materials: BTreeSet<Material> = settlement
        .stock_policies()
        .map(|(_, policy)| policy.material.clone())
        .collect();

    let mut posted = Vec::new();
    for material in materials {
        let participants: Vec<(EntityId, StockPolicy)> = settlement
            .stock_policies()
            .filter(|(_, policy)| policy.material == material)
            .map(|(id, policy)| (id, policy.clone()))
            .collect();

        let mut exchange = LogisticsExchange::new(&material);
        for (entity, policy) in &participants {
            exchange.update_supply_demand(*entity, announcement(settlement, *entity, policy));
        }

        let max_haul = settlement.params().max_haul_stacks.max(1) as i64 * material.stack_size();
        for _ in 0..settlement.params().max_deals_per_pass {
            let Some(mut deal) = exchange.get_largest_transfer_deal() else {
                break;
            };
            deal.quantity = deal.quantity.min(max_haul);
            let (supplier, destination) = (deal.supplier, deal.destination);

            let id = settlement.next_job_id();
            debug!(job = %id, %material, quantity = deal.quantity, supplier = %supplier, destination = %destination, "deal");
            settlement.add_global_job(Box::new(LogisticsJob::new(id, deal)))?;
            posted.push(id);

            for (entity, policy) in &participants {
                if *entity == supplier || *entity == destination {
                    exchange.update_supply_demand(*entity, announcement(settlement, *entity, policy));
                }
            }
        }
    }
    Ok(posted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MaterialDef;
    use crate::inventory::ReservationKey;
    use crate::catalog::MaterialState;

    fn wheat() -> Material {
        Material::new(MaterialDef::new("wheat", "Wheat", 25))
    }

    #[test]
    fn test_surplus_is_offered() {
        let wheat = wheat();
        let mut inventory = Inventory::with_slots(100);
        inventory.set(&wheat, 1000).unwrap();
        let policy = StockPolicy::supplier(&wheat, 500);
        assert_eq!(policy.supply_demand(&inventory), 500);
    }

    #[test]
    fn test_shortfall_counts_incoming() {
        let wheat = wheat();
        let mut inventory = Inventory::with_slots(100);
        let policy = StockPolicy::consumer(&wheat, 50);
        assert_eq!(policy.supply_demand(&inventory), -50);

        inventory
            .make_reservation(ReservationKey::from("haul"), vec![MaterialState::new(&wheat, 30)])
            .unwrap();
        assert_eq!(policy.supply_demand(&inventory), -20);
    }

    #[test]
    fn test_request_is_capped_by_space() {
        let wheat = wheat();
        let inventory = Inventory::with_slots(1);
        let policy = StockPolicy::consumer(&wheat, 100);
        assert_eq!(policy.supply_demand(&inventory), -25);
    }

    #[test]
    fn test_between_thresholds_is_quiet() {
        let wheat = wheat();
        let mut inventory = Inventory::with_slots(100);
        inventory.set(&wheat, 60).unwrap();
        let policy = StockPolicy::new(&wheat, 50, 100);
        assert_eq!(policy.supply_demand(&inventory), 0);
    }
}

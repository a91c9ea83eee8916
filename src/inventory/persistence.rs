//! Inventory save/restore
//!
//! Save format: `{ "capacity": <slots or null>, "items": [{ "materialKey", "quantity" }] }`.
//! Reservations are not saved; they belong to the jobs that made them.

use serde::{Deserialize, Serialize};

use crate::catalog::{MaterialCatalog, MaterialState};
use crate::error::{EconomyError, Result};
use crate::inventory::ledger::{Capacity, Inventory};

/// A material amount keyed by material symbol
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItem {
    pub material_key: String,
    pub quantity: i64,
}

impl From<&MaterialState> for SavedItem {
    fn from(state: &MaterialState) -> Self {
        SavedItem {
            material_key: state.material.key.clone(),
            quantity: state.quantity,
        }
    }
}

/// Serialized inventory stock
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventorySave {
    /// Stack slots, `None` for unlimited
    pub capacity: Option<u32>,
    pub items: Vec<SavedItem>,
}

fn capacity_to_save(capacity: Capacity) -> Option<u32> {
    match capacity {
        Capacity::Slots(n) => Some(n),
        Capacity::Unlimited => None,
    }
}

fn describe(capacity: Option<u32>) -> String {
    match capacity {
        Some(n) => format!("{} slots", n),
        None => "unlimited".to_string(),
    }
}

impl Inventory {
    pub fn to_save(&self) -> InventorySave {
        InventorySave {
            capacity: capacity_to_save(self.capacity()),
            items: self.items().map(|s| SavedItem::from(&s)).collect(),
        }
    }

    pub fn to_save_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_save())?)
    }

    /// Replace all stock with the saved items. The capacities must match.
    /// No change notification is emitted.
    pub fn overwrite_from_save(&mut self, save: &InventorySave, materials: &MaterialCatalog) -> Result<()> {
        let target = capacity_to_save(self.capacity());
        if save.capacity != target {
            return Err(EconomyError::DifferentSize {
                saved: describe(save.capacity),
                target: describe(target),
            });
        }
        let levels = save
            .items
            .iter()
            .map(|item| Ok((materials.get(&item.material_key)?, item.quantity)))
            .collect::<Result<Vec<_>>>()?;
        self.replace_all_quiet(levels)
    }

    pub fn overwrite_from_save_json(&mut self, json: &str, materials: &MaterialCatalog) -> Result<()> {
        let save: InventorySave = serde_json::from_str(json)?;
        self.overwrite_from_save(&save, materials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MaterialDef;

    fn catalog() -> MaterialCatalog {
        let mut catalog = MaterialCatalog::new();
        catalog.register(MaterialDef::new("wheat", "Wheat", 25));
        catalog.register(MaterialDef::new("barley", "Barley", 33));
        catalog.register(MaterialDef::new("flour", "Flour", 50));
        catalog
    }

    #[test]
    fn test_round_trip() {
        let materials = catalog();
        let wheat = materials.get("wheat").unwrap();
        let barley = materials.get("barley").unwrap();
        let flour = materials.get("flour").unwrap();

        let mut stocked = Inventory::with_slots(8);
        stocked.set(&wheat, 10).unwrap();
        stocked.set(&barley, 100).unwrap();
        let json = stocked.to_save_json().unwrap();
        assert!(json.contains("\"materialKey\":\"wheat\""));

        let mut restored = Inventory::with_slots(8);
        restored.set(&flour, 3).unwrap();
        restored.take_changes();
        restored.overwrite_from_save_json(&json, &materials).unwrap();

        for material in [&wheat, &barley, &flour] {
            assert_eq!(restored.available_of(material), stocked.available_of(material));
        }
        assert!(!restored.has_pending_changes());
    }

    #[test]
    fn test_restore_into_different_size_fails() {
        let materials = catalog();
        let wheat = materials.get("wheat").unwrap();
        let mut stocked = Inventory::with_slots(4);
        stocked.set(&wheat, 10).unwrap();

        let mut bigger = Inventory::with_slots(5);
        let err = bigger.overwrite_from_save(&stocked.to_save(), &materials).unwrap_err();
        assert!(matches!(err, EconomyError::DifferentSize { .. }));
        assert!(err.to_string().contains("different size"));

        let mut unlimited = Inventory::unlimited();
        assert!(unlimited.overwrite_from_save(&stocked.to_save(), &materials).is_err());
    }

    #[test]
    fn test_restore_with_unknown_material_changes_nothing() {
        let materials = catalog();
        let wheat = materials.get("wheat").unwrap();
        let save = InventorySave {
            capacity: Some(4),
            items: vec![SavedItem { material_key: "rye".into(), quantity: 3 }],
        };
        let mut inventory = Inventory::with_slots(4);
        inventory.set(&wheat, 7).unwrap();
        assert!(inventory.overwrite_from_save(&save, &materials).is_err());
        assert_eq!(inventory.stock_of(&wheat), 7);
    }
}

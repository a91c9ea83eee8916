//! Default materials and blueprints for a small farming village

use crate::catalog::blueprint::{Blueprint, BlueprintCatalog, BlueprintOptions};
use crate::catalog::material::{MaterialCatalog, MaterialDef, MaterialState};
use crate::error::Result;

/// Material and blueprint lookup contexts bundled together
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub materials: MaterialCatalog,
    pub blueprints: BlueprintCatalog,
}

fn options(full_time_equivalent: f64, workers_required: u32, building: &str) -> BlueprintOptions {
    BlueprintOptions {
        full_time_equivalent,
        workers_required,
        building_name: Some(building.to_string()),
    }
}

/// Wheat, barley, flour, bread, water, wood and planks, with the buildings that make them.
pub fn village_catalog() -> Result<Catalog> {
    let mut materials = MaterialCatalog::new();
    materials.register(MaterialDef::new("wheat", "Wheat", 25).with_value(1.0).with_nutrition(0.2));
    materials.register(MaterialDef::new("barley", "Barley", 33).with_value(1.0).with_nutrition(0.2));
    materials.register(MaterialDef::new("flour", "Flour", 50).with_value(2.5));
    materials.register(MaterialDef::new("bread", "Bread", 20).with_value(6.0).with_nutrition(1.0));
    materials.register(MaterialDef::new("water", "Water", 100).with_value(0.1).with_hydration(1.0));
    materials.register(MaterialDef::new("wood", "Wood", 30).with_value(1.5));
    materials.register(MaterialDef::new("planks", "Planks", 40).with_value(3.0));

    let m = |key: &str, quantity: i64| -> Result<MaterialState> {
        Ok(MaterialState::new(&materials.get(key)?, quantity))
    };

    let mut blueprints = BlueprintCatalog::new();
    blueprints.register(Blueprint::new(
        "wheat-field",
        vec![],
        vec![m("wheat", 25)?],
        options(5000.0, 1, "Farm"),
    ));
    blueprints.register(Blueprint::new(
        "well",
        vec![],
        vec![m("water", 50)?],
        options(2000.0, 0, "Well"),
    ));
    blueprints.register(Blueprint::new(
        "flour-mill",
        vec![m("wheat", 25)?],
        vec![m("flour", 20)?],
        options(4000.0, 1, "Mill"),
    ));
    blueprints.register(Blueprint::new(
        "bakery",
        vec![m("flour", 10)?, m("water", 5)?],
        vec![m("bread", 10)?],
        options(3000.0, 1, "Bakery"),
    ));
    blueprints.register(Blueprint::new(
        "sawmill",
        vec![m("wood", 10)?],
        vec![m("planks", 8)?],
        options(3000.0, 2, "Sawmill"),
    ));

    Ok(Catalog { materials, blueprints })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_village_catalog_is_consistent() {
        let catalog = village_catalog().unwrap();
        assert_eq!(catalog.materials.len(), 7);
        let mill = catalog.blueprints.get("flour-mill").unwrap();
        assert_eq!(mill.ingredients[0].material, catalog.materials.get("wheat").unwrap());
        assert!(!catalog.blueprints.get("well").unwrap().needs_workers());
    }
}

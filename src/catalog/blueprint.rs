//! Blueprints: stateless production recipes
//!
//! Many factories can share one blueprint; it is handed around as `Arc<Blueprint>`
//! and compared by reference when a factory decides whether its recipe changed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::material::{MaterialCatalog, MaterialState};
use crate::error::{EconomyError, Result};
use crate::inventory::SavedItem;

/// Timing and staffing of a blueprint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlueprintOptions {
    /// Time units one cycle takes with a full crew
    pub full_time_equivalent: f64,
    /// Workers needed for full speed (0 = runs unattended)
    pub workers_required: u32,
    /// Building this blueprint belongs to, if any
    pub building_name: Option<String>,
}

impl Default for BlueprintOptions {
    fn default() -> Self {
        BlueprintOptions {
            full_time_equivalent: 1.0,
            workers_required: 0,
            building_name: None,
        }
    }
}

/// Ingredients in, products out
#[derive(Clone, Debug)]
pub struct Blueprint {
    pub name: String,
    pub ingredients: Vec<MaterialState>,
    pub products: Vec<MaterialState>,
    pub options: BlueprintOptions,
}

impl Blueprint {
    pub fn new(
        name: &str,
        ingredients: Vec<MaterialState>,
        products: Vec<MaterialState>,
        options: BlueprintOptions,
    ) -> Self {
        Blueprint {
            name: name.to_string(),
            ingredients,
            products,
            options,
        }
    }

    pub fn needs_workers(&self) -> bool {
        self.options.workers_required > 0
    }

    pub fn to_save(&self) -> BlueprintSave {
        BlueprintSave {
            name: self.name.clone(),
            ingredients: self.ingredients.iter().map(SavedItem::from).collect(),
            products: self.products.iter().map(SavedItem::from).collect(),
            options: self.options.clone(),
        }
    }

    pub fn from_save(save: &BlueprintSave, materials: &MaterialCatalog) -> Result<Self> {
        let resolve = |items: &[SavedItem]| -> Result<Vec<MaterialState>> {
            items
                .iter()
                .map(|item| Ok(MaterialState::new(&materials.get(&item.material_key)?, item.quantity)))
                .collect()
        };
        Ok(Blueprint {
            name: save.name.clone(),
            ingredients: resolve(&save.ingredients)?,
            products: resolve(&save.products)?,
            options: save.options.clone(),
        })
    }
}

/// Save format of a blueprint: materials by key plus options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlueprintSave {
    pub name: String,
    pub ingredients: Vec<SavedItem>,
    pub products: Vec<SavedItem>,
    pub options: BlueprintOptions,
}

/// Lookup context mapping blueprint names to shared instances
#[derive(Clone, Debug, Default)]
pub struct BlueprintCatalog {
    blueprints: BTreeMap<String, Arc<Blueprint>>,
}

impl BlueprintCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, blueprint: Blueprint) -> Arc<Blueprint> {
        let shared = Arc::new(blueprint);
        self.blueprints.insert(shared.name.clone(), shared.clone());
        shared
    }

    pub fn get(&self, name: &str) -> Result<Arc<Blueprint>> {
        self.blueprints
            .get(name)
            .cloned()
            .ok_or_else(|| EconomyError::UnknownBlueprint(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Blueprint>> {
        self.blueprints.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::material::MaterialDef;

    fn mill(catalog: &mut MaterialCatalog) -> Blueprint {
        let wheat = catalog.register(MaterialDef::new("wheat", "Wheat", 25));
        let flour = catalog.register(MaterialDef::new("flour", "Flour", 50));
        Blueprint::new(
            "mill",
            vec![MaterialState::new(&wheat, 10)],
            vec![MaterialState::new(&flour, 8)],
            BlueprintOptions {
                full_time_equivalent: 10000.0,
                workers_required: 1,
                building_name: Some("Mill".into()),
            },
        )
    }

    #[test]
    fn test_save_restores_by_key() {
        let mut materials = MaterialCatalog::new();
        let blueprint = mill(&mut materials);

        let json = serde_json::to_string(&blueprint.to_save()).unwrap();
        let save: BlueprintSave = serde_json::from_str(&json).unwrap();
        let restored = Blueprint::from_save(&save, &materials).unwrap();

        assert_eq!(restored.name, "mill");
        assert_eq!(restored.ingredients, blueprint.ingredients);
        assert_eq!(restored.products, blueprint.products);
        assert_eq!(restored.options, blueprint.options);
    }

    #[test]
    fn test_restore_needs_known_materials() {
        let mut materials = MaterialCatalog::new();
        let save = mill(&mut materials).to_save();
        let empty = MaterialCatalog::new();
        assert!(matches!(
            Blueprint::from_save(&save, &empty),
            Err(EconomyError::UnknownMaterial(key)) if key == "wheat"
        ));
    }

    #[test]
    fn test_catalog_shares_instances() {
        let mut materials = MaterialCatalog::new();
        let mut blueprints = BlueprintCatalog::new();
        let registered = blueprints.register(mill(&mut materials));
        let fetched = blueprints.get("mill").unwrap();
        assert!(Arc::ptr_eq(&registered, &fetched));
        assert!(blueprints.get("bakery").is_err());
    }
}

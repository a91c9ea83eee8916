//! Material and blueprint catalog - immutable value definitions

pub mod material;
pub mod blueprint;
pub mod defaults;

pub use material::{Material, MaterialCatalog, MaterialDef, MaterialState, totals_by_material};
pub use blueprint::{Blueprint, BlueprintCatalog, BlueprintOptions, BlueprintSave};
pub use defaults::{Catalog, village_catalog};

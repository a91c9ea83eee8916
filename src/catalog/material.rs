//! Material definitions
//!
//! A material is an immutable value shared by reference. Two handles are the
//! same material when their keys match; attributes never take part in equality.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{EconomyError, Result};

/// Physical and economic properties of a material
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialDef {
    /// Stable symbol used in save files
    pub key: String,
    /// Display label
    pub label: String,
    /// Maximum units per inventory stack
    pub stack_size: u32,
    /// Trade value per unit
    pub value: f32,
    pub hydration: Option<f32>,
    pub nutrition: Option<f32>,
    pub toxicity: Option<f32>,
}

impl MaterialDef {
    pub fn new(key: &str, label: &str, stack_size: u32) -> Self {
        MaterialDef {
            key: key.to_string(),
            label: label.to_string(),
            stack_size: stack_size.max(1),
            value: 1.0,
            hydration: None,
            nutrition: None,
            toxicity: None,
        }
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    pub fn with_nutrition(mut self, nutrition: f32) -> Self {
        self.nutrition = Some(nutrition);
        self
    }

    pub fn with_hydration(mut self, hydration: f32) -> Self {
        self.hydration = Some(hydration);
        self
    }

    pub fn with_toxicity(mut self, toxicity: f32) -> Self {
        self.toxicity = Some(toxicity);
        self
    }
}

/// Shared handle to a material definition
#[derive(Clone)]
pub struct Material(Arc<MaterialDef>);

impl Material {
    pub fn new(def: MaterialDef) -> Self {
        Material(Arc::new(def))
    }

    pub fn stack_size(&self) -> i64 {
        i64::from(self.0.stack_size.max(1))
    }

    /// Number of stacks needed to hold `quantity` units (ceiling)
    pub fn stacks_for(&self, quantity: i64) -> i64 {
        let quantity = quantity.max(0);
        let stack = self.stack_size();
        (quantity + stack - 1) / stack
    }
}

impl Deref for Material {
    type Target = MaterialDef;

    fn deref(&self) -> &MaterialDef {
        &self.0
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.key == other.0.key
    }
}

impl Eq for Material {}

impl Hash for Material {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl PartialOrd for Material {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Material {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.key.cmp(&other.0.key)
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Material({})", self.0.key)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.label)
    }
}

impl Serialize for Material {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.key)
    }
}

/// An amount of a material. In exchange contexts the sign gives the
/// direction: positive is incoming/supply, negative is outgoing/demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaterialState {
    pub material: Material,
    pub quantity: i64,
}

impl MaterialState {
    pub fn new(material: &Material, quantity: i64) -> Self {
        MaterialState {
            material: material.clone(),
            quantity,
        }
    }

    pub fn negated(&self) -> Self {
        MaterialState::new(&self.material, -self.quantity)
    }

    pub fn is_incoming(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_outgoing(&self) -> bool {
        self.quantity < 0
    }
}

impl fmt::Display for MaterialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x {}", self.quantity, self.material)
    }
}

/// Sum the quantities of a list of states per material, keeping first-seen order.
pub fn totals_by_material(states: &[MaterialState]) -> Vec<MaterialState> {
    let mut totals: Vec<MaterialState> = Vec::new();
    for state in states {
        match totals.iter_mut().find(|t| t.material == state.material) {
            Some(total) => total.quantity += state.quantity,
            None => totals.push(state.clone()),
        }
    }
    totals
}

/// Lookup context mapping save-file keys back to materials
#[derive(Clone, Debug, Default)]
pub struct MaterialCatalog {
    materials: BTreeMap<String, Material>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition; re-registering a key returns the existing handle.
    pub fn register(&mut self, def: MaterialDef) -> Material {
        self.materials
            .entry(def.key.clone())
            .or_insert_with(|| Material::new(def))
            .clone()
    }

    pub fn get(&self, key: &str) -> Result<Material> {
        self.materials
            .get(key)
            .cloned()
            .ok_or_else(|| EconomyError::UnknownMaterial(key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

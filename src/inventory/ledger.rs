//! Inventory ledger with stack-slot capacity and a reservation layer
//!
//! Stock is stored as one entry per material, in the order materials first
//! arrived. Stacks are only a view computed on read. Capacity counts stack
//! slots, and slots are shared between materials, so every space check is
//! done over the whole inventory rather than one material at a time.
//!
//! Invariants kept by every mutator:
//! - `available_of(m) = stock_of(m) - reserved_outgoing_of(m) >= 0`
//! - `stock_of(m) + reserved_incoming_of(m) <= amount_allocatable_to(m)`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::catalog::{totals_by_material, Material, MaterialState};
use crate::error::{EconomyError, Result};
use crate::inventory::reservation::{Reservation, ReservationKey};

/// Number of stack slots an inventory has
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    Slots(u32),
    Unlimited,
}

impl Capacity {
    pub fn slots(&self) -> Option<i64> {
        match self {
            Capacity::Slots(n) => Some(i64::from(*n)),
            Capacity::Unlimited => None,
        }
    }
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capacity::Slots(n) => write!(f, "{} slots", n),
            Capacity::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// One material's stock
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockEntry {
    pub material: Material,
    pub quantity: i64,
}

/// Change notification: one per notifying call, however many materials it touched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InventoryChange {
    pub revision: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Notify {
    Emit,
    Suppress,
}

/// Per-entity stock ledger
#[derive(Clone, Debug)]
pub struct Inventory {
    capacity: Capacity,
    stock: Vec<StockEntry>,
    reservations: BTreeMap<ReservationKey, Reservation>,
    changes: Vec<InventoryChange>,
    revision: u64,
}

fn level_in(stock: &[StockEntry], material: &Material) -> i64 {
    stock
        .iter()
        .find(|e| &e.material == material)
        .map_or(0, |e| e.quantity)
}

impl Inventory {
    pub fn new(capacity: Capacity) -> Self {
        Inventory {
            capacity,
            stock: Vec::new(),
            reservations: BTreeMap::new(),
            changes: Vec::new(),
            revision: 0,
        }
    }

    pub fn with_slots(slots: u32) -> Self {
        Self::new(Capacity::Slots(slots))
    }

    pub fn unlimited() -> Self {
        Self::new(Capacity::Unlimited)
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Total units held, reserved or not
    pub fn stock_of(&self, material: &Material) -> i64 {
        level_in(&self.stock, material)
    }

    /// Units that are free to be taken out
    pub fn available_of(&self, material: &Material) -> i64 {
        let available = self.stock_of(material) - self.reserved_outgoing_of(material);
        debug_assert!(
            available >= 0,
            "{} reserved for departure beyond stock ({})",
            material,
            available
        );
        available.max(0)
    }

    /// Units expected to arrive under active reservations
    pub fn reserved_incoming_of(&self, material: &Material) -> i64 {
        self.reservations.values().map(|r| r.incoming_of(material)).sum()
    }

    /// Units held back for departure under active reservations (positive number)
    pub fn reserved_outgoing_of(&self, material: &Material) -> i64 {
        self.reservations.values().map(|r| r.outgoing_of(material)).sum()
    }

    /// Every material that occupies or will occupy space: stock order first,
    /// then materials only known from reservations.
    fn held_materials(&self) -> Vec<Material> {
        let mut materials: Vec<Material> = self.stock.iter().map(|e| e.material.clone()).collect();
        for reservation in self.reservations.values() {
            for material in reservation.materials() {
                if !materials.contains(material) {
                    materials.push(material.clone());
                }
            }
        }
        materials
    }

    /// Stock plus expected arrivals of one material, against a given stock list
    fn held_in(&self, stock: &[StockEntry], material: &Material) -> i64 {
        level_in(stock, material) + self.reserved_incoming_of(material)
    }

    fn allocatable_in(&self, stock: &[StockEntry], material: &Material) -> Option<i64> {
        let slots = self.capacity.slots()?;
        let mut materials = self.held_materials();
        for entry in stock {
            if !materials.contains(&entry.material) {
                materials.push(entry.material.clone());
            }
        }
        let taken_by_others: i64 = materials
            .iter()
            .filter(|m| *m != material)
            .map(|m| m.stacks_for(self.held_in(stock, m)))
            .sum();
        Some((slots - taken_by_others).max(0) * material.stack_size())
    }

    /// Total units of `material` this inventory could hold, given the slots
    /// other materials occupy or will occupy. `None` means unlimited.
    pub fn amount_allocatable_to(&self, material: &Material) -> Option<i64> {
        self.allocatable_in(&self.stock, material)
    }

    /// Units of `material` that could still be added on top of stock and
    /// incoming reservations. `None` means unlimited.
    pub fn amount_additionally_allocatable_to(&self, material: &Material) -> Option<i64> {
        self.amount_allocatable_to(material).map(|allocatable| {
            (allocatable
                - self.available_of(material)
                - self.reserved_outgoing_of(material)
                - self.reserved_incoming_of(material))
            .max(0)
        })
    }

    pub fn is_additionally_allocatable_to(&self, material: &Material, quantity: i64) -> bool {
        self.amount_additionally_allocatable_to(material)
            .map_or(true, |room| quantity <= room)
    }

    /// Whether all of `cargo` fits on top of everything held and reserved.
    /// Computed over the combined stack count because slots are shared.
    pub fn is_everything_additionally_allocatable(&self, cargo: &[MaterialState]) -> bool {
        let Some(slots) = self.capacity.slots() else {
            return true;
        };
        let mut totals: Vec<(Material, i64)> = self
            .held_materials()
            .into_iter()
            .map(|m| {
                let held = self.held_in(&self.stock, &m);
                (m, held)
            })
            .collect();
        for item in cargo.iter().filter(|s| s.quantity > 0) {
            match totals.iter_mut().find(|(m, _)| *m == item.material) {
                Some((_, total)) => *total += item.quantity,
                None => totals.push((item.material.clone(), item.quantity)),
            }
        }
        let needed: i64 = totals.iter().map(|(m, q)| m.stacks_for(*q)).sum();
        needed <= slots
    }

    /// Whether every listed amount is available (not reserved) right now
    pub fn has_all_available(&self, states: &[MaterialState]) -> bool {
        totals_by_material(states)
            .iter()
            .all(|s| self.available_of(&s.material) >= s.quantity)
    }

    /// Stack slots in use by stock and expected arrivals
    pub fn used_slots(&self) -> i64 {
        self.held_materials()
            .iter()
            .map(|m| m.stacks_for(self.held_in(&self.stock, m)))
            .sum()
    }

    /// Stock entries in arrival order
    pub fn items(&self) -> impl Iterator<Item = MaterialState> + '_ {
        self.stock.iter().map(|e| MaterialState::new(&e.material, e.quantity))
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    /// Lazy view of the stock split into stacks. Each entry yields
    /// `ceil(quantity / stack_size)` stacks, the last one carrying the remainder.
    /// Call again to restart.
    pub fn get_stacks(&self) -> impl Iterator<Item = (Material, i64)> + '_ {
        self.stock.iter().flat_map(|entry| {
            let stack = entry.material.stack_size();
            let count = entry.material.stacks_for(entry.quantity);
            (0..count).map(move |i| {
                let quantity = if i == count - 1 {
                    entry.quantity - stack * (count - 1)
                } else {
                    stack
                };
                (entry.material.clone(), quantity)
            })
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    fn validate_level(&self, staged: &[StockEntry], material: &Material, quantity: i64) -> Result<()> {
        if quantity < 0 {
            return Err(EconomyError::NegativeAmount {
                material: material.key.clone(),
                quantity,
            });
        }
        let reserved = self.reserved_outgoing_of(material);
        if quantity < reserved {
            return Err(EconomyError::BreaksReservation {
                material: material.key.clone(),
                quantity,
                reserved,
            });
        }
        if let Some(allocatable) = self.allocatable_in(staged, material) {
            let incoming = self.reserved_incoming_of(material);
            if quantity + incoming > allocatable {
                return Err(EconomyError::Allocation {
                    material: material.key.clone(),
                    quantity,
                    allocatable: (allocatable - incoming).max(0),
                });
            }
        }
        Ok(())
    }

    /// Validate a whole batch of absolute levels on a scratch copy, then commit.
    /// Nothing is applied and nothing is emitted if any item fails.
    fn apply_levels(&mut self, levels: Vec<(Material, i64)>, notify: Notify) -> Result<()> {
        let mut staged = self.stock.clone();
        for (material, quantity) in levels {
            self.validate_level(&staged, &material, quantity)?;
            let position = staged.iter().position(|e| e.material == material);
            match (position, quantity) {
                (Some(i), 0) => {
                    staged.remove(i);
                }
                (Some(i), q) => staged[i].quantity = q,
                (None, 0) => {}
                (None, q) => staged.push(StockEntry { material, quantity: q }),
            }
        }
        self.stock = staged;
        if notify == Notify::Emit {
            self.emit_change();
        }
        Ok(())
    }

    fn deltas_to_levels(&self, states: &[MaterialState]) -> Vec<(Material, i64)> {
        let mut running: Vec<(Material, i64)> = Vec::new();
        let mut levels = Vec::with_capacity(states.len());
        for state in states {
            let current = match running.iter().find(|(m, _)| *m == state.material) {
                Some((_, level)) => *level,
                None => self.stock_of(&state.material),
            };
            let target = current + state.quantity;
            match running.iter_mut().find(|(m, _)| *m == state.material) {
                Some((_, level)) => *level = target,
                None => running.push((state.material.clone(), target)),
            }
            levels.push((state.material.clone(), target));
        }
        levels
    }

    fn emit_change(&mut self) {
        self.revision += 1;
        self.changes.push(InventoryChange { revision: self.revision });
        trace!(revision = self.revision, "inventory changed");
    }

    /// Set the stock of one material
    pub fn set(&mut self, material: &Material, quantity: i64) -> Result<()> {
        self.apply_levels(vec![(material.clone(), quantity)], Notify::Emit)
    }

    /// `set` without a change notification
    pub fn set_quiet(&mut self, material: &Material, quantity: i64) -> Result<()> {
        self.apply_levels(vec![(material.clone(), quantity)], Notify::Suppress)
    }

    /// Add (or with a negative delta, remove) units of one material
    pub fn change(&mut self, material: &Material, delta: i64) -> Result<()> {
        self.change_multiple(&[MaterialState::new(material, delta)])
    }

    /// `change` without a change notification
    pub fn change_quiet(&mut self, material: &Material, delta: i64) -> Result<()> {
        self.change_multiple_quiet(&[MaterialState::new(material, delta)])
    }

    /// Apply a batch of deltas, emitting one notification for the whole batch
    pub fn change_multiple(&mut self, states: &[MaterialState]) -> Result<()> {
        let levels = self.deltas_to_levels(states);
        self.apply_levels(levels, Notify::Emit)
    }

    /// `change_multiple` without a change notification
    pub fn change_multiple_quiet(&mut self, states: &[MaterialState]) -> Result<()> {
        let levels = self.deltas_to_levels(states);
        self.apply_levels(levels, Notify::Suppress)
    }

    /// Replace every stock level at once without notifying (used by restore)
    pub(crate) fn replace_all_quiet(&mut self, levels: Vec<(Material, i64)>) -> Result<()> {
        let mut all: Vec<(Material, i64)> = self
            .stock
            .iter()
            .filter(|e| !levels.iter().any(|(m, _)| *m == e.material))
            .map(|e| (e.material.clone(), 0))
            .collect();
        all.extend(levels);
        self.apply_levels(all, Notify::Suppress)
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Reserve space for the positive entries and stock for the negative ones.
    /// All or nothing.
    pub fn make_reservation(&mut self, key: ReservationKey, exchanged: Vec<MaterialState>) -> Result<()> {
        if self.reservations.contains_key(&key) {
            return Err(EconomyError::DuplicateReservation);
        }
        // Each direction is checked on its own; a +q/-q pair must not cancel out.
        let (incoming, outgoing): (Vec<MaterialState>, Vec<MaterialState>) = exchanged
            .iter()
            .filter(|s| s.quantity != 0)
            .cloned()
            .partition(|s| s.quantity > 0);

        if !self.is_everything_additionally_allocatable(&totals_by_material(&incoming)) {
            return Err(EconomyError::InsufficientSpace);
        }

        for outgoing in totals_by_material(&outgoing) {
            let available = self.available_of(&outgoing.material);
            if -outgoing.quantity > available {
                return Err(EconomyError::InsufficientStock {
                    material: outgoing.material.key.clone(),
                    wanted: -outgoing.quantity,
                    available,
                });
            }
        }

        trace!(%key, "reservation made");
        self.reservations.insert(key.clone(), Reservation::new(key, exchanged));
        Ok(())
    }

    pub fn clear_reservation(&mut self, key: &ReservationKey) -> Result<Reservation> {
        let removed = self.reservations.remove(key).ok_or(EconomyError::MissingReservation)?;
        trace!(%key, "reservation cleared");
        Ok(removed)
    }

    pub fn reservation(&self, key: &ReservationKey) -> Option<&Reservation> {
        self.reservations.get(key)
    }

    pub fn has_reservation(&self, key: &ReservationKey) -> bool {
        self.reservations.contains_key(key)
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    // =========================================================================
    // Change feed
    // =========================================================================

    /// Drain pending change notifications
    pub fn take_changes(&mut self) -> Vec<InventoryChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Number of notifying mutations so far
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

//! Settlement - entities, agents, time and the activities that run on them

pub mod activity;
pub mod agent;
pub mod driver;
pub mod terrain;
pub mod world;

pub use activity::{Activity, Step, Wake, WakeQueue};
pub use agent::Agent;
pub use terrain::{OpenTerrain, TileGraph, WalledTerrain};
pub use world::{EntityKind, EntityRecord, Settlement};

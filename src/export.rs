//! Export settlement state to JSON

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Local;
use serde::Serialize;

use crate::activity_log::{ActivityEntry, ActivityStats};
use crate::error::Result;
use crate::inventory::SavedItem;
use crate::settlement::{EntityKind, Settlement};
use crate::types::SimTime;

/// Number of log entries carried in a report
const REPORT_LOG_ENTRIES: usize = 50;

/// Exported settlement data
#[derive(Clone, Debug, Serialize)]
pub struct SettlementReport {
    pub seed: u64,
    pub generated_at: String,
    pub time: SimTime,
    pub stats: ActivityStats,
    pub entities: Vec<EntityExport>,
    pub jobs: Vec<JobExport>,
    pub recent_log: Vec<ActivityEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntityExport {
    pub id: u64,
    pub name: String,
    pub kind: EntityKind,
    pub location: (i32, i32),
    pub capacity: Option<u32>,
    pub stock: Vec<SavedItem>,
    pub reservations: Vec<ReservationExport>,
    pub factory: Option<FactoryExport>,
    pub agent: Option<AgentExport>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReservationExport {
    pub key: String,
    pub exchanged: Vec<SavedItem>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FactoryExport {
    pub blueprint: Option<String>,
    pub running: bool,
    pub progress: f64,
    pub progress_delta: f64,
    pub workers: Vec<u64>,
    pub cycles_completed: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentExport {
    pub health: f32,
    pub status: Option<String>,
    pub activity: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobExport {
    pub id: u64,
    pub label: String,
    pub vacancies: u32,
}

/// Build a report of the current settlement state
pub fn build_report(settlement: &Settlement, seed: u64) -> SettlementReport {
    let mut entities = Vec::new();
    for (id, record) in settlement.records() {
        let (capacity, stock, reservations) = match settlement.inventory(id) {
            Ok(inventory) => {
                let save = inventory.to_save();
                let reservations = inventory
                    .reservations()
                    .map(|r| ReservationExport {
                        key: r.key.to_string(),
                        exchanged: r.exchanged.iter().map(SavedItem::from).collect(),
                    })
                    .collect();
                (save.capacity, save.items, reservations)
            }
            Err(_) => (None, Vec::new(), Vec::new()),
        };

        let factory = settlement.factory(id).ok().map(|system| FactoryExport {
            blueprint: system.blueprint().map(|b| b.name.clone()),
            running: system.is_running(),
            progress: system.progress(),
            progress_delta: system.progress_delta(),
            workers: system.workers().iter().map(|w| w.0).collect(),
            cycles_completed: system.cycles_completed(),
        });

        let agent = settlement.agent(id).ok().map(|agent| AgentExport {
            health: agent.health,
            status: agent.status().map(str::to_string),
            activity: agent.activity.and_then(|a| settlement.activity_label(a)),
        });

        let location = settlement.location_of(id).unwrap_or(record.location);
        entities.push(EntityExport {
            id: id.0,
            name: record.name.clone(),
            kind: record.kind,
            location: (location.x, location.y),
            capacity,
            stock,
            reservations,
            factory,
            agent,
        });
    }

    let jobs = settlement
        .board()
        .global_jobs()
        .map(|job| JobExport {
            id: job.id().0,
            label: job.label(),
            vacancies: job.vacancies(),
        })
        .collect();

    let recent_log = settlement
        .log()
        .recent_entries(REPORT_LOG_ENTRIES)
        .into_iter()
        .cloned()
        .collect();

    SettlementReport {
        seed,
        generated_at: Local::now().to_rfc3339(),
        time: settlement.now(),
        stats: settlement.log().stats.clone(),
        entities,
        jobs,
        recent_log,
    }
}

/// Export the settlement to a JSON file
pub fn export_to_file(settlement: &Settlement, seed: u64, path: &Path) -> Result<()> {
    let report = build_report(settlement, seed);
    let json = serde_json::to_string_pretty(&report)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Plain-text summary of the settlement
pub fn generate_summary(settlement: &Settlement, seed: u64) -> String {
    let stats = &settlement.log().stats;
    let mut summary = String::new();

    summary.push_str(&format!("=== Settlement Summary (Seed: {}) ===\n", seed));
    summary.push_str(&format!("Time: {}\n\n", settlement.now()));

    summary.push_str("--- Statistics ---\n");
    summary.push_str(&format!(
        "Hauls: {} delivered, {} abandoned\n",
        stats.deliveries, stats.abandoned_jobs
    ));
    summary.push_str(&format!(
        "Production: {} cycles completed\n",
        stats.cycles_completed
    ));
    summary.push_str(&format!(
        "Jobs: {} posted, {} open\n",
        stats.jobs_posted,
        settlement.board().global_count()
    ));
    summary.push_str(&format!("Faults: {}\n\n", stats.faults));

    summary.push_str("--- Stock ---\n");
    for (id, record) in settlement.records() {
        if record.kind == EntityKind::Worker {
            continue;
        }
        let Ok(inventory) = settlement.inventory(id) else {
            continue;
        };
        let items: Vec<String> = inventory.items().map(|s| s.to_string()).collect();
        let line = if items.is_empty() {
            "empty".to_string()
        } else {
            items.join(", ")
        };
        summary.push_str(&format!("{:<12} {}\n", record.name, line));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Material, MaterialDef};
    use crate::inventory::Capacity;
    use crate::params::EconomyParams;
    use crate::types::TileCoord;

    #[test]
    fn test_report_lists_entities_and_stock() {
        let mut settlement = Settlement::new(EconomyParams::strict());
        let bread = Material::new(MaterialDef::new("bread", "Bread", 20));
        let shed = settlement.spawn_storage("Shed", TileCoord::new(1, 2), Capacity::Slots(3));
        settlement.inventory_mut(shed).unwrap().set(&bread, 7).unwrap();
        settlement.spawn_worker("Ida", TileCoord::new(0, 0), 1, 1000);

        let report = build_report(&settlement, 42);
        assert_eq!(report.seed, 42);
        assert_eq!(report.entities.len(), 2);
        let shed_export = &report.entities[0];
        assert_eq!(shed_export.location, (1, 2));
        assert_eq!(shed_export.capacity, Some(3));
        assert_eq!(shed_export.stock[0].quantity, 7);
        assert!(report.entities[1].agent.is_some());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"materialKey\":\"bread\""));

        let summary = generate_summary(&settlement, 42);
        assert!(summary.contains("Seed: 42"));
        assert!(summary.contains("Shed"));
    }
}

use crate::model::{Shop, Toy};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one seed run: what each step found or created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub shops: Vec<Shop>,
    /// Toys stocked by the featured shop
    pub shop_inventory: Vec<Toy>,
    pub lego_car_manual: Option<String>,
    /// Toys given a default manual during this run
    pub manuals_created: Vec<String>,
    pub manuals_existing: Vec<String>,
    pub lego_toys: Vec<Toy>,
    pub lego_toy_count: i64,
    pub spin_master_has_kinetic_sand: bool,
    /// `None` when no unassigned toy was left to assign
    pub lego_set_assigned: Option<bool>,
    /// Re-seeded toy name and whether it was newly created
    pub reseeded: Vec<(String, bool)>,
    /// Toy name and whether it has a manual
    pub manual_presence: Vec<(String, bool)>,
    pub eager_brand: String,
    pub eager_toys: Vec<Toy>,
    /// Rows per table at the end of the run
    pub row_counts: BTreeMap<String, i64>,
}

/// `- name, $price` lines
pub fn toy_lines(toys: &[Toy]) -> String {
    toys.iter()
        .map(|t| format!("- {}, {}", t.name, t.display_price()))
        .join("\n")
}

impl SeedReport {
    pub fn total_rows(&self) -> i64 {
        self.row_counts.values().sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows seeded ({})",
            self.total_rows(),
            self.row_counts
                .iter()
                .map(|(table, count)| format!("{}: {}", table, count))
                .join(", ")
        )
    }

    pub fn toys_without_manual(&self) -> Vec<&str> {
        self.manual_presence
            .iter()
            .filter(|(_, has)| !has)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

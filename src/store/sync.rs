use crate::error::SchemaError;
use crate::model::{EntityDef, Schema};
use crate::store::sql;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Columns of one live table, mapped to their reported data type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveTable {
    pub columns: BTreeMap<String, String>,
}

/// Storage structures as they currently exist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSchema {
    pub tables: BTreeMap<String, LiveTable>,
    /// Index names
    pub indexes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SyncStep {
    CreateTable {
        entity: String,
    },
    AddColumn {
        entity: String,
        column: String,
    },
    CreateUniqueIndex {
        entity: String,
        name: String,
        columns: Vec<String>,
    },
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::CreateTable { entity } => write!(f, "create table for {}", entity),
            SyncStep::AddColumn { entity, column } => write!(f, "add column {}.{}", entity, column),
            SyncStep::CreateUniqueIndex { name, .. } => write!(f, "create unique index {}", name),
        }
    }
}

impl SyncStep {
    /// PostgreSQL statement for this step
    pub fn to_sql(&self, schema: &Schema) -> Result<String, SchemaError> {
        match self {
            SyncStep::CreateTable { entity } => Ok(sql::create_table_sql(schema.entity(entity)?)),
            SyncStep::AddColumn { entity, column } => {
                let entity = schema.entity(entity)?;
                Ok(sql::add_column_sql(entity, entity.require_field(column)?))
            }
            SyncStep::CreateUniqueIndex {
                entity,
                name,
                columns,
            } => Ok(sql::create_unique_index_sql(
                &schema.entity(entity)?.table,
                name,
                columns,
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub steps: Vec<SyncStep>,
    /// Differences that are reported but never applied
    pub warnings: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Entities ordered so that every referenced table precedes its referrers.
/// Cycles fall back to declaration order for the remaining entities.
pub fn dependency_order(schema: &Schema) -> Vec<&EntityDef> {
    let mut ordered: Vec<&EntityDef> = Vec::with_capacity(schema.entities.len());
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut pending: Vec<&EntityDef> = schema.entities.iter().collect();

    while !pending.is_empty() {
        let ready: Vec<&EntityDef> = pending
            .iter()
            .copied()
            .filter(|e| e.referenced_tables().iter().all(|t| placed.contains(t)))
            .collect();

        if ready.is_empty() {
            log::warn!("Foreign key cycle between tables; creating in declaration order");
            ordered.append(&mut pending);
            break;
        }

        for entity in ready {
            placed.insert(entity.table.as_str());
            ordered.push(entity);
        }
        pending.retain(|e| !placed.contains(e.table.as_str()));
    }

    ordered
}

fn unique_indexes(entity: &EntityDef) -> Vec<(String, Vec<String>)> {
    let single = entity
        .fields
        .iter()
        .filter(|f| f.unique && !f.primary_key)
        .map(|f| vec![f.name.clone()]);
    single
        .chain(entity.unique_keys.iter().cloned())
        .map(|columns| (sql::unique_index_name(&entity.table, &columns), columns))
        .collect()
}

/// Compute the additive steps that bring `live` in line with `schema`.
pub fn plan_sync(schema: &Schema, live: &LiveSchema) -> Result<SyncPlan, SchemaError> {
    let mut plan = SyncPlan::default();

    for entity in dependency_order(schema) {
        match live.tables.get(&entity.table) {
            None => plan.steps.push(SyncStep::CreateTable {
                entity: entity.name.clone(),
            }),
            Some(table) => {
                for field in &entity.fields {
                    match table.columns.get(&field.name) {
                        None => plan.steps.push(SyncStep::AddColumn {
                            entity: entity.name.clone(),
                            column: field.name.clone(),
                        }),
                        Some(live_type) if !field.data_type.matches_live(live_type) => {
                            plan.warnings.push(format!(
                                "{}.{} is {} but declared as {:?}",
                                entity.table, field.name, live_type, field.data_type
                            ));
                        }
                        Some(_) => {}
                    }
                }
                for column in table.columns.keys() {
                    if entity.field(column).is_none() {
                        log::debug!("Leaving undeclared column {}.{} untouched", entity.table, column);
                    }
                }
            }
        }

        for (name, columns) in unique_indexes(entity) {
            if !live.indexes.contains(&name) {
                plan.steps.push(SyncStep::CreateUniqueIndex {
                    entity: entity.name.clone(),
                    name,
                    columns,
                });
            }
        }
    }

    for step in &plan.steps {
        log::debug!("Planned sync step: {}", step);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog_schema;

    /// Live structures exactly matching a schema, as if a previous sync had run
    fn live_from(schema: &Schema) -> LiveSchema {
        let mut live = LiveSchema::default();
        for entity in &schema.entities {
            let columns = entity
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.data_type.information_schema_name().to_string()))
                .collect();
            live.tables.insert(entity.table.clone(), LiveTable { columns });
            for (name, _) in unique_indexes(entity) {
                live.indexes.insert(name);
            }
        }
        live
    }

    #[test]
    fn test_empty_database_creates_everything_in_dependency_order() {
        let schema = catalog_schema().unwrap();
        let plan = plan_sync(&schema, &LiveSchema::default()).unwrap();

        let created: Vec<&str> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                SyncStep::CreateTable { entity } => Some(entity.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(created.len(), 5);

        let position = |name: &str| created.iter().position(|e| *e == name).unwrap();
        assert!(position("Brand") < position("Toy"));
        assert!(position("Toy") < position("Manual"));
        assert!(position("Shop") < position("ShopToys"));
        assert!(position("Toy") < position("ShopToys"));

        let indexes: BTreeSet<&str> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                SyncStep::CreateUniqueIndex { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            indexes,
            BTreeSet::from([
                "Brands_name_key",
                "Shops_name_key",
                "Manuals_ToyId_key",
                "Toys_name_BrandId_key",
            ])
        );
    }

    #[test]
    fn test_unchanged_schema_is_a_noop() {
        let schema = catalog_schema().unwrap();
        let plan = plan_sync(&schema, &live_from(&schema)).unwrap();
        assert!(plan.is_empty());
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_missing_column_is_added_and_extra_column_kept() {
        let schema = catalog_schema().unwrap();
        let mut live = live_from(&schema);
        let toys = live.tables.get_mut("Toys").unwrap();
        toys.columns.remove("category");
        toys.columns.insert("legacy_code".into(), "text".into());

        let plan = plan_sync(&schema, &live).unwrap();
        assert_eq!(
            plan.steps,
            vec![SyncStep::AddColumn {
                entity: "Toy".into(),
                column: "category".into()
            }]
        );
    }

    #[test]
    fn test_type_drift_is_only_a_warning() {
        let schema = catalog_schema().unwrap();
        let mut live = live_from(&schema);
        live.tables
            .get_mut("Toys")
            .unwrap()
            .columns
            .insert("price".into(), "text".into());

        let plan = plan_sync(&schema, &live).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("Toys.price"));
    }

    #[test]
    fn test_step_sql_rendering() {
        let schema = catalog_schema().unwrap();
        let step = SyncStep::CreateUniqueIndex {
            entity: "Toy".into(),
            name: "Toys_name_BrandId_key".into(),
            columns: vec!["name".into(), "BrandId".into()],
        };
        assert_eq!(
            step.to_sql(&schema).unwrap(),
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "Toys_name_BrandId_key" ON "Toys" ("name", "BrandId")"#
        );
        assert_eq!(step.to_string(), "create unique index Toys_name_BrandId_key");
    }
}

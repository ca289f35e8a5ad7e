use crate::model::{
    now_timestamp, EntityDef, EntityKind, Filter, Id, RelationshipDef, RelationshipKind, Row,
    Schema, ID_COLUMN, UPDATED_AT_COLUMN,
};
use crate::store::sync::{LiveSchema, LiveTable, SyncPlan, SyncStep};
use crate::store::traits::{RecordStore, RelationStore, SchemaStore, Store};
use anyhow::{anyhow, bail, Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    /// Column name to reported data type
    columns: BTreeMap<String, String>,
    rows: Vec<Row>,
    next_id: Id,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
    indexes: BTreeSet<String>,
}

/// In-process store with the same contracts as [`crate::store::PostgresStore`].
/// Tables only exist after a sync, exactly like a fresh database.
#[derive(Debug)]
pub struct MemoryStore {
    schema: Schema,
    state: RwLock<MemoryState>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            state: RwLock::new(MemoryState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Serve the existing tables and rows under `schema`, as a process
    /// restarted against the same database would. Tables are brought in line
    /// by the next sync.
    pub fn reopen(self, schema: Schema) -> Self {
        Self {
            schema,
            state: self.state,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            bail!("Store is closed");
        }
        Ok(())
    }

    /// Snapshot of every row of an entity's table, for inspection in tests
    pub fn rows(&self, entity: &str) -> Result<Vec<Row>> {
        let entity = self.schema.entity(entity)?;
        let state = self.state.read();
        Ok(state.table(entity)?.rows.clone())
    }
}

fn row_id(row: &Row) -> Option<Id> {
    row.get(ID_COLUMN).and_then(Value::as_i64)
}

fn sort_key(entity: &EntityDef, row: &Row) -> Vec<i64> {
    entity
        .primary_key()
        .iter()
        .map(|c| row.get(*c).and_then(Value::as_i64).unwrap_or_default())
        .collect()
}

fn touch(entity: &EntityDef, row: &mut Row) {
    if entity.field(UPDATED_AT_COLUMN).is_some() {
        row.insert(UPDATED_AT_COLUMN.to_string(), now_timestamp());
    }
}

/// Unique constraints of an entity as column lists, primary key included
fn unique_constraints(entity: &EntityDef) -> Vec<Vec<String>> {
    let mut constraints = Vec::new();
    if entity.kind == EntityKind::Join {
        constraints.push(entity.primary_key().iter().map(|c| c.to_string()).collect());
    }
    for field in entity.fields.iter().filter(|f| f.unique && !f.primary_key) {
        constraints.push(vec![field.name.clone()]);
    }
    constraints.extend(entity.unique_keys.iter().cloned());
    constraints
}

impl MemoryState {
    fn table(&self, entity: &EntityDef) -> Result<&MemoryTable> {
        self.tables
            .get(&entity.table)
            .ok_or_else(|| anyhow!("relation \"{}\" does not exist", entity.table))
    }

    fn table_mut(&mut self, entity: &EntityDef) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(&entity.table)
            .ok_or_else(|| anyhow!("relation \"{}\" does not exist", entity.table))
    }

    fn select(&self, entity: &EntityDef, filter: &Filter) -> Result<Vec<Row>> {
        let filter = filter.coerced(entity)?;
        let mut rows: Vec<Row> = self
            .table(entity)?
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by_key(|row| sort_key(entity, row));
        Ok(rows)
    }

    fn exists(&self, table: &str, id: Id) -> bool {
        self.tables
            .get(table)
            .map(|t| t.rows.iter().any(|r| row_id(r) == Some(id)))
            .unwrap_or(false)
    }

    fn check_references(&self, entity: &EntityDef, row: &Row) -> Result<()> {
        for field in &entity.fields {
            let (Some(fk), Some(id)) = (&field.references, row.get(&field.name).and_then(Value::as_i64))
            else {
                continue;
            };
            if !self.exists(&fk.table, id) {
                bail!(
                    "insert or update on table \"{}\" violates foreign key constraint on \"{}\": {} {} does not exist",
                    entity.table,
                    field.name,
                    fk.entity,
                    id
                );
            }
        }
        Ok(())
    }

    /// Name of the unique constraint `candidate` would violate. The row at
    /// `skip` (the row being updated) is ignored.
    fn unique_violation(
        &self,
        entity: &EntityDef,
        candidate: &Row,
        skip: Option<usize>,
    ) -> Result<Option<String>> {
        let rows = &self.table(entity)?.rows;
        for columns in unique_constraints(entity) {
            let values: Vec<&Value> = columns
                .iter()
                .map(|c| candidate.get(c).unwrap_or(&Value::Null))
                .collect();
            // NULLs never collide
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let collides = rows.iter().enumerate().any(|(index, row)| {
                Some(index) != skip
                    && columns
                        .iter()
                        .zip(&values)
                        .all(|(c, v)| row.get(c) == Some(*v))
            });
            if collides {
                return Ok(Some(crate::store::sql::unique_index_name(&entity.table, &columns)));
            }
        }
        Ok(None)
    }

    /// Insert prepared values. Returns `None` on a unique conflict.
    fn insert(&mut self, entity: &EntityDef, mut row: Row) -> Result<Option<Row>> {
        self.check_references(entity, &row)?;
        if let Some(index) = self.unique_violation(entity, &row, None)? {
            log::debug!("Insert into {} skipped: conflicts on {}", entity.table, index);
            return Ok(None);
        }

        let table = self.table_mut(entity)?;
        if entity.kind == EntityKind::Model {
            table.next_id += 1;
            row.insert(ID_COLUMN.to_string(), Value::from(table.next_id));
        }
        table.rows.push(row.clone());
        Ok(Some(row))
    }

    /// Set `column` of the row with `id`, enforcing references and uniqueness
    fn update_column(&mut self, entity: &EntityDef, id: Id, column: &str, value: Value) -> Result<()> {
        let index = self
            .table(entity)?
            .rows
            .iter()
            .position(|r| row_id(r) == Some(id))
            .ok_or_else(|| anyhow!("{} {} not found", entity.name, id))?;

        let mut updated = self.table(entity)?.rows[index].clone();
        updated.insert(column.to_string(), value);
        touch(entity, &mut updated);

        self.check_references(entity, &updated)?;
        if let Some(constraint) = self.unique_violation(entity, &updated, Some(index))? {
            bail!("duplicate key value violates unique constraint \"{}\"", constraint);
        }
        self.table_mut(entity)?.rows[index] = updated;
        Ok(())
    }

    fn related(&self, schema: &Schema, relation: &RelationshipDef, source_id: Id) -> Result<Vec<Row>> {
        let source = schema.entity(&relation.source)?;
        let target = schema.entity(&relation.target)?;

        let filter = match relation.kind {
            RelationshipKind::HasMany | RelationshipKind::HasOne => {
                Filter::new().eq(&relation.foreign_key, source_id)
            }
            RelationshipKind::BelongsTo => {
                let parent = self
                    .table(source)?
                    .rows
                    .iter()
                    .find(|r| row_id(r) == Some(source_id))
                    .and_then(|r| r.get(&relation.foreign_key))
                    .and_then(Value::as_i64);
                match parent {
                    Some(parent) => Filter::new().eq(ID_COLUMN, parent),
                    None => return Ok(Vec::new()),
                }
            }
            RelationshipKind::BelongsToMany => {
                let (join, other_key) = join_parts(schema, relation)?;
                let target_ids: Vec<Id> = self
                    .select(join, &Filter::new().eq(&relation.foreign_key, source_id))?
                    .iter()
                    .filter_map(|r| r.get(other_key).and_then(Value::as_i64))
                    .collect();
                Filter::new().any_of(ID_COLUMN, target_ids)
            }
        };
        self.select(target, &filter)
    }
}

fn join_parts<'a>(schema: &'a Schema, relation: &'a RelationshipDef) -> Result<(&'a EntityDef, &'a str)> {
    let through = relation
        .through
        .as_deref()
        .ok_or_else(|| anyhow!("{} has no join entity", relation.name))?;
    let other_key = relation
        .other_key
        .as_deref()
        .ok_or_else(|| anyhow!("{} has no target key", relation.name))?;
    Ok((schema.entity(through)?, other_key))
}

#[async_trait::async_trait]
impl SchemaStore for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn introspect(&self) -> Result<LiveSchema> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(LiveSchema {
            tables: state
                .tables
                .iter()
                .map(|(name, table)| {
                    (
                        name.clone(),
                        LiveTable {
                            columns: table.columns.clone(),
                        },
                    )
                })
                .collect(),
            indexes: state.indexes.clone(),
        })
    }

    async fn apply_sync(&self, plan: &SyncPlan) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.write();
        // Applied to a copy so a failing step leaves storage untouched
        let mut next = state.clone();

        for step in &plan.steps {
            match step {
                SyncStep::CreateTable { entity } => {
                    let entity = self.schema.entity(entity)?;
                    let columns = entity
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), f.data_type.information_schema_name().to_string()))
                        .collect();
                    next.tables.entry(entity.table.clone()).or_insert(MemoryTable {
                        columns,
                        ..MemoryTable::default()
                    });
                }
                SyncStep::AddColumn { entity, column } => {
                    let entity = self.schema.entity(entity)?;
                    let field = entity.require_field(column)?;
                    let table = next.table_mut(entity)?;
                    table.columns.insert(
                        field.name.clone(),
                        field.data_type.information_schema_name().to_string(),
                    );
                    let fill = if field.timestamp {
                        now_timestamp()
                    } else {
                        field.default.clone().unwrap_or(Value::Null)
                    };
                    for row in &mut table.rows {
                        row.entry(field.name.clone()).or_insert_with(|| fill.clone());
                    }
                }
                SyncStep::CreateUniqueIndex { entity, name, .. } => {
                    let entity = self.schema.entity(entity)?;
                    let rows = next.table(entity)?.rows.clone();
                    for (index, row) in rows.iter().enumerate() {
                        if next.unique_violation(entity, row, Some(index))?.is_some() {
                            bail!("could not create unique index \"{}\": duplicate rows", name);
                        }
                    }
                    next.indexes.insert(name.clone());
                }
            }
            log::debug!("Applied sync step: {}", step);
        }

        *state = next;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn find_one(&self, entity: &str, filter: &Filter) -> Result<Option<Row>> {
        Ok(self.find_all(entity, filter).await?.into_iter().next())
    }

    async fn find_all(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>> {
        self.ensure_open()?;
        let entity = self.schema.entity(entity)?;
        self.state.read().select(entity, filter)
    }

    async fn count(&self, entity: &str, filter: &Filter) -> Result<i64> {
        Ok(self.find_all(entity, filter).await?.len() as i64)
    }

    async fn create(&self, entity: &str, values: Row) -> Result<Row> {
        self.ensure_open()?;
        let entity = self.schema.entity(entity)?;
        let prepared = entity.prepare_insert(&values)?;
        let mut state = self.state.write();
        let row = state.insert(entity, prepared.clone())?;
        match row {
            Some(row) => Ok(row),
            None => {
                let constraint = state
                    .unique_violation(entity, &prepared, None)?
                    .unwrap_or_default();
                bail!("duplicate key value violates unique constraint \"{}\"", constraint)
            }
        }
    }

    async fn find_or_create(&self, entity: &str, key: Row, defaults: Row) -> Result<(Row, bool)> {
        self.ensure_open()?;
        let entity = self.schema.entity(entity)?;
        let key = entity.coerce_row(&key)?;
        let filter = Filter::from_key(&key);

        // The write lock spans lookup and insert
        let mut state = self.state.write();
        if let Some(row) = state.select(entity, &filter)?.into_iter().next() {
            return Ok((row, false));
        }

        let mut values = defaults;
        values.extend(key);
        let prepared = entity.prepare_insert(&values)?;
        if let Some(row) = state.insert(entity, prepared)? {
            return Ok((row, true));
        }

        // Lost to a unique constraint covering part of the key
        state
            .select(entity, &filter)?
            .into_iter()
            .next()
            .map(|row| (row, false))
            .with_context(|| format!("{} conflicted on insert but no match was found", entity.name))
    }
}

#[async_trait::async_trait]
impl RelationStore for MemoryStore {
    async fn get_related(&self, relation: &str, source_id: Id) -> Result<Vec<Row>> {
        self.ensure_open()?;
        let relation = self.schema.relationship(relation)?;
        self.state.read().related(&self.schema, relation, source_id)
    }

    async fn add_related(&self, relation: &str, source_id: Id, target_id: Id) -> Result<()> {
        self.ensure_open()?;
        let relation = self.schema.relationship(relation)?;
        let source = self.schema.entity(&relation.source)?;
        let target = self.schema.entity(&relation.target)?;
        let mut state = self.state.write();

        match relation.kind {
            RelationshipKind::HasMany => {
                if !state.exists(&source.table, source_id) {
                    bail!("{} {} not found", source.name, source_id);
                }
                state.update_column(target, target_id, &relation.foreign_key, Value::from(source_id))
            }
            RelationshipKind::HasOne => {
                if !state.exists(&source.table, source_id) {
                    bail!("{} {} not found", source.name, source_id);
                }
                if !state.exists(&target.table, target_id) {
                    bail!("{} {} not found", target.name, target_id);
                }
                let previous: Vec<Id> = state
                    .related(&self.schema, relation, source_id)?
                    .iter()
                    .filter_map(row_id)
                    .filter(|id| *id != target_id)
                    .collect();
                for id in previous {
                    state.update_column(target, id, &relation.foreign_key, Value::Null)?;
                }
                state.update_column(target, target_id, &relation.foreign_key, Value::from(source_id))
            }
            RelationshipKind::BelongsTo => {
                state.update_column(source, source_id, &relation.foreign_key, Value::from(target_id))
            }
            RelationshipKind::BelongsToMany => {
                let (join, other_key) = join_parts(&self.schema, relation)?;
                let pair = crate::row! {
                    relation.foreign_key.as_str() => source_id,
                    other_key => target_id,
                };
                let prepared = join.prepare_insert(&pair)?;
                // An existing pair is left as is
                state.insert(join, prepared)?;
                Ok(())
            }
        }
    }

    async fn count_related(&self, relation: &str, source_id: Id) -> Result<i64> {
        Ok(self.get_related(relation, source_id).await?.len() as i64)
    }

    async fn has_related(&self, relation: &str, source_id: Id, target_id: Id) -> Result<bool> {
        Ok(self
            .get_related(relation, source_id)
            .await?
            .iter()
            .any(|r| row_id(r) == Some(target_id)))
    }

    async fn find_with_related(
        &self,
        entity: &str,
        filter: &Filter,
        relation: &str,
    ) -> Result<Option<(Row, Vec<Row>)>> {
        self.ensure_open()?;
        let entity = self.schema.entity(entity)?;
        let relation = self.schema.relationship(relation)?;
        let state = self.state.read();

        let Some(parent) = state.select(entity, filter)?.into_iter().next() else {
            return Ok(None);
        };
        let parent_id = row_id(&parent).context("eager fetch requires an id")?;
        let related = state.related(&self.schema, relation, parent_id)?;
        Ok(Some((parent, related)))
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            log::warn!("Memory store closed twice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{catalog_schema, EntityDescriptor};
    use crate::row;
    use serde_json::json;

    async fn synced_store() -> MemoryStore {
        let store = MemoryStore::new(catalog_schema().unwrap());
        store.sync().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_tables_require_sync() {
        let store = MemoryStore::new(catalog_schema().unwrap());
        let err = store.find_all("Toy", &Filter::new()).await.unwrap_err();
        assert!(err.to_string().contains("\"Toys\" does not exist"));
    }

    #[tokio::test]
    async fn test_second_sync_is_noop() {
        let store = synced_store().await;
        let plan = store.sync().await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_ids() {
        let store = synced_store().await;
        let first = store.create("Toy", row! { "name" => "Yo-yo" }).await.unwrap();
        let second = store
            .create("Toy", row! { "name" => "Kite", "category" => "outdoor" })
            .await
            .unwrap();

        assert_eq!(first["id"], json!(1));
        assert_eq!(first["category"], json!("fun"));
        assert_eq!(second["id"], json!(2));
        assert_eq!(second["category"], json!("outdoor"));
    }

    #[tokio::test]
    async fn test_find_or_create_does_not_overwrite() {
        let store = synced_store().await;
        let (brand, created) = store
            .find_or_create("Brand", row! { "name" => "Lego" }, Row::new())
            .await
            .unwrap();
        assert!(created);

        let key = row! { "name" => "Lego Car", "BrandId" => brand["id"].clone() };
        let (toy, created) = store
            .find_or_create("Toy", key.clone(), row! { "price" => 19.99 })
            .await
            .unwrap();
        assert!(created);
        assert_eq!(toy["price"], json!(19.99));

        let (again, created) = store
            .find_or_create("Toy", key, row! { "price" => 25.00 })
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again["id"], toy["id"]);
        assert_eq!(again["price"], json!(19.99));
        assert_eq!(store.count("Toy", &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let store = synced_store().await;
        let err = store
            .create("Toy", row! { "name" => "Ghost", "BrandId" => 42 })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foreign key"));
    }

    #[tokio::test]
    async fn test_unique_natural_key_on_plain_create() {
        let store = synced_store().await;
        store.create("Brand", row! { "name" => "Lego" }).await.unwrap();
        let err = store
            .create("Brand", row! { "name" => "Lego" })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Brands_name_key"));
    }

    #[tokio::test]
    async fn test_many_to_many_add_is_idempotent() {
        let store = synced_store().await;
        let shop = store.create("Shop", row! { "name" => "Hamleys" }).await.unwrap();
        let toy = store.create("Toy", row! { "name" => "Kite" }).await.unwrap();
        let (shop_id, toy_id) = (row_id(&shop).unwrap(), row_id(&toy).unwrap());

        store.add_related("Shop.Toys", shop_id, toy_id).await.unwrap();
        store.add_related("Shop.Toys", shop_id, toy_id).await.unwrap();
        store.add_related("Toy.Shops", toy_id, shop_id).await.unwrap();

        assert_eq!(store.rows("ShopToys").unwrap().len(), 1);
        assert_eq!(store.count_related("Shop.Toys", shop_id).await.unwrap(), 1);
        assert!(store.has_related("Toy.Shops", toy_id, shop_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_one_moves_dependent() {
        let store = synced_store().await;
        let toy = store.create("Toy", row! { "name" => "Kite" }).await.unwrap();
        let toy_id = row_id(&toy).unwrap();
        let old = store
            .create("Manual", row! { "instructions" => "old", "ToyId" => toy_id })
            .await
            .unwrap();
        let new = store
            .create("Manual", row! { "instructions" => "new" })
            .await
            .unwrap();

        store
            .add_related("Toy.Manual", toy_id, row_id(&new).unwrap())
            .await
            .unwrap();

        let manuals = store.get_related("Toy.Manual", toy_id).await.unwrap();
        assert_eq!(manuals.len(), 1);
        assert_eq!(manuals[0]["instructions"], json!("new"));
        let old_manual = store
            .find_one("Manual", &Filter::new().eq("id", row_id(&old).unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old_manual["ToyId"], Value::Null);
    }

    #[tokio::test]
    async fn test_belongs_to_and_eager_fetch() {
        let store = synced_store().await;
        let brand = store.create("Brand", row! { "name" => "Funko" }).await.unwrap();
        let brand_id = row_id(&brand).unwrap();
        let toy = store.create("Toy", row! { "name" => "Pop Batman" }).await.unwrap();
        let toy_id = row_id(&toy).unwrap();

        assert_eq!(store.count_related("Toy.Brand", toy_id).await.unwrap(), 0);
        store.add_related("Toy.Brand", toy_id, brand_id).await.unwrap();
        assert!(store.has_related("Brand.Toys", brand_id, toy_id).await.unwrap());

        let (parent, toys) = store
            .find_with_related("Brand", &Filter::new().eq("name", "Funko"), "Brand.Toys")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parent["name"], json!("Funko"));
        assert_eq!(toys.len(), 1);
        assert_eq!(toys[0]["BrandId"], json!(brand_id));
    }

    /// Catalog as declared before Shop had a location and Toy a category
    fn earlier_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .define(
                EntityDescriptor::new("Toy")
                    .required("name", "string")
                    .field("price", "float"),
            )
            .unwrap();
        schema
            .define(
                EntityDescriptor::new("Shop")
                    .required("name", "string")
                    .natural_key(&["name"]),
            )
            .unwrap();
        schema
    }

    #[tokio::test]
    async fn test_grown_schema_keeps_existing_rows() {
        let store = MemoryStore::new(earlier_schema());
        store.sync().await.unwrap();
        store.create("Shop", row! { "name" => "Hamleys" }).await.unwrap();
        store
            .create("Toy", row! { "name" => "Kite", "price" => 4.5 })
            .await
            .unwrap();

        let store = store.reopen(catalog_schema().unwrap());
        let plan = store.sync().await.unwrap();

        for step in [
            SyncStep::AddColumn {
                entity: "Shop".into(),
                column: "location".into(),
            },
            SyncStep::AddColumn {
                entity: "Toy".into(),
                column: "category".into(),
            },
            SyncStep::AddColumn {
                entity: "Toy".into(),
                column: "BrandId".into(),
            },
            SyncStep::CreateTable {
                entity: "Brand".into(),
            },
            SyncStep::CreateUniqueIndex {
                entity: "Toy".into(),
                name: "Toys_name_BrandId_key".into(),
                columns: vec!["name".into(), "BrandId".into()],
            },
        ] {
            assert!(plan.steps.contains(&step), "missing {}", step);
        }
        assert!(!plan.steps.iter().any(|s| matches!(
            s,
            SyncStep::CreateTable { entity } if entity == "Shop" || entity == "Toy"
        )));

        let shops = store.find_all("Shop", &Filter::new()).await.unwrap();
        assert_eq!(shops.len(), 1);
        assert_eq!(shops[0]["name"], json!("Hamleys"));
        assert_eq!(shops[0]["location"], Value::Null);

        let toys = store.find_all("Toy", &Filter::new()).await.unwrap();
        assert_eq!(toys.len(), 1);
        assert_eq!(toys[0]["price"], json!(4.5));
        assert_eq!(toys[0]["category"], json!("fun"));
        assert_eq!(toys[0]["BrandId"], Value::Null);

        assert!(store.sync().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_over_long_name_is_rejected() {
        let store = synced_store().await;
        let err = store
            .create("Brand", row! { "name" => "x".repeat(256) })
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds the limit of 255"));
        assert_eq!(store.count("Brand", &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = synced_store().await;
        store.close().await;
        assert!(store.is_closed());
        assert!(store.find_all("Toy", &Filter::new()).await.is_err());
    }
}

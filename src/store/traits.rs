use crate::model::{Filter, Id, Row, Schema};
use crate::store::sync::{plan_sync, LiveSchema, SyncPlan};
use anyhow::Result;

/// Access to the declared schema and to the live storage structures.
#[async_trait::async_trait]
pub trait SchemaStore: Send + Sync {
    /// Declared schema this store serves
    fn schema(&self) -> &Schema;
    /// Read the tables, columns and indexes that currently exist
    async fn introspect(&self) -> Result<LiveSchema>;
    /// Apply every step of a plan atomically
    async fn apply_sync(&self, plan: &SyncPlan) -> Result<()>;

    /// Bring storage in line with the declared schema. Only additive steps are
    /// applied; an unchanged schema results in an empty plan.
    async fn sync(&self) -> Result<SyncPlan> {
        let live = self.introspect().await?;
        let plan = plan_sync(self.schema(), &live)?;
        for warning in &plan.warnings {
            log::warn!("Schema drift: {}", warning);
        }
        if !plan.is_empty() {
            self.apply_sync(&plan).await?;
        }
        Ok(plan)
    }
}

/// Record lookups and inserts keyed by entity name.
#[async_trait::async_trait]
pub trait RecordStore: SchemaStore {
    async fn find_one(&self, entity: &str, filter: &Filter) -> Result<Option<Row>>;
    async fn find_all(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>>;
    async fn count(&self, entity: &str, filter: &Filter) -> Result<i64>;
    /// Insert a record, applying declared defaults for omitted fields
    async fn create(&self, entity: &str, values: Row) -> Result<Row>;
    /// Return the record matching `key`, creating it from `key` plus `defaults`
    /// when absent. Atomic with respect to concurrent callers; the flag is
    /// true when a new record was created.
    async fn find_or_create(&self, entity: &str, key: Row, defaults: Row) -> Result<(Row, bool)>;
}

/// Uniform accessors over every declared relationship, addressed by its
/// `<Source>.<Alias>` name.
#[async_trait::async_trait]
pub trait RelationStore: SchemaStore {
    async fn get_related(&self, relation: &str, source_id: Id) -> Result<Vec<Row>>;
    /// Link `target_id` to the source; linking an existing pair is a no-op
    async fn add_related(&self, relation: &str, source_id: Id, target_id: Id) -> Result<()>;
    async fn count_related(&self, relation: &str, source_id: Id) -> Result<i64>;
    async fn has_related(&self, relation: &str, source_id: Id, target_id: Id) -> Result<bool>;
    /// First record matching `filter` together with its related records, in one round-trip
    async fn find_with_related(
        &self,
        entity: &str,
        filter: &Filter,
        relation: &str,
    ) -> Result<Option<(Row, Vec<Row>)>>;
}

#[async_trait::async_trait]
pub trait Store: RecordStore + RelationStore + Send + Sync {
    /// Release the underlying connection(s). Called once at shutdown.
    async fn close(&self);
}

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};

use crate::model::{DataType, EntityDef, Filter, Id, Row, Schema};
use crate::store::sql::{self, Param, RELATED_COLUMN};
use crate::store::sync::{LiveSchema, LiveTable, SyncPlan};
use crate::store::traits::{RecordStore, RelationStore, SchemaStore, Store};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    schema: Schema,
}

impl PostgresStore {
    /// Open a connection pool serving `schema`
    pub async fn connect(database_url: &str, max_connections: u32, schema: Schema) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool, schema })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Ids are SERIAL/INTEGER columns
fn int4(id: Id) -> Result<i32> {
    i32::try_from(id).with_context(|| format!("Id {} out of range for an INTEGER column", id))
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    (data_type, value): &Param,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let query = match data_type {
        DataType::String | DataType::Text => query.bind(value.as_str().map(str::to_string)),
        DataType::Float => query.bind(value.as_f64()),
        DataType::Integer => query.bind(value.as_i64().map(int4).transpose()?),
        DataType::Boolean => query.bind(value.as_bool()),
        DataType::Date => {
            let timestamp = match value.as_str() {
                Some(s) => Some(
                    DateTime::parse_from_rfc3339(s)
                        .with_context(|| format!("Invalid timestamp {}", s))?
                        .with_timezone(&Utc),
                ),
                None => None,
            };
            query.bind(timestamp)
        }
    };
    Ok(query)
}

fn build_query<'q>(sql: &'q str, params: &[Param]) -> Result<Query<'q, Postgres, PgArguments>> {
    params.iter().try_fold(sqlx::query(sql), bind_param)
}

/// Decode the declared columns of `entity` from a result row
fn decode_row(entity: &EntityDef, row: &PgRow) -> Result<Row> {
    let mut decoded = Row::new();
    for field in &entity.fields {
        let name = field.name.as_str();
        let value = match field.data_type {
            DataType::String | DataType::Text => row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map(Value::from)),
            DataType::Float => row.try_get::<Option<f64>, _>(name).map(|v| v.map(Value::from)),
            DataType::Integer => row
                .try_get::<Option<i32>, _>(name)
                .map(|v| v.map(|i| Value::from(i64::from(i)))),
            DataType::Boolean => row.try_get::<Option<bool>, _>(name).map(|v| v.map(Value::from)),
            DataType::Date => row
                .try_get::<Option<DateTime<Utc>>, _>(name)
                .map(|v| v.map(|d| Value::from(d.to_rfc3339()))),
        }
        .with_context(|| format!("Failed to decode {}.{}", entity.table, name))?;
        decoded.insert(field.name.clone(), value.unwrap_or(Value::Null));
    }
    Ok(decoded)
}

/// Rebuild a row from a `json_agg` element, keeping declared columns only
fn normalize_json_row(entity: &EntityDef, value: Value) -> Result<Row> {
    let Value::Object(object) = value else {
        bail!("Expected a JSON object for {} row", entity.name);
    };
    let mut row = Row::new();
    for field in &entity.fields {
        let value = object.get(&field.name).unwrap_or(&Value::Null);
        row.insert(field.name.clone(), field.data_type.coerce(value)?);
    }
    Ok(row)
}

#[async_trait::async_trait]
impl SchemaStore for PostgresStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn introspect(&self) -> Result<LiveSchema> {
        let columns = sqlx::query(
            "SELECT table_name::text AS table_name, column_name::text AS column_name, data_type::text AS data_type \
             FROM information_schema.columns WHERE table_schema = current_schema()",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read table columns")?;

        let mut live = LiveSchema::default();
        for row in columns {
            let table: String = row.try_get("table_name")?;
            let column: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            live.tables
                .entry(table)
                .or_insert_with(LiveTable::default)
                .columns
                .insert(column, data_type);
        }

        let indexes = sqlx::query(
            "SELECT indexname::text AS indexname FROM pg_indexes WHERE schemaname = current_schema()",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read indexes")?;
        for row in indexes {
            live.indexes.insert(row.try_get("indexname")?);
        }

        Ok(live)
    }

    async fn apply_sync(&self, plan: &SyncPlan) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin sync")?;
        for step in &plan.steps {
            let statement = step.to_sql(&self.schema)?;
            log::debug!("{}", statement);
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to apply schema sync step: {}", step))?;
        }
        tx.commit().await.context("Failed to commit schema sync")?;
        log::info!("Applied {} schema sync step(s)", plan.steps.len());
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    async fn find_one(&self, entity: &str, filter: &Filter) -> Result<Option<Row>> {
        let entity = self.schema.entity(entity)?;
        let (statement, params) = sql::select_sql(entity, &filter.coerced(entity)?, Some(1))?;
        let row = build_query(&statement, &params)?
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {}", entity.name))?;

        row.map(|row| decode_row(entity, &row)).transpose()
    }

    async fn find_all(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>> {
        let entity = self.schema.entity(entity)?;
        let (statement, params) = sql::select_sql(entity, &filter.coerced(entity)?, None)?;
        let rows = build_query(&statement, &params)?
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list {}", entity.table))?;

        rows.iter().map(|row| decode_row(entity, row)).collect()
    }

    async fn count(&self, entity: &str, filter: &Filter) -> Result<i64> {
        let entity = self.schema.entity(entity)?;
        let (statement, params) = sql::count_sql(entity, &filter.coerced(entity)?)?;
        let row = build_query(&statement, &params)?
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", entity.table))?;

        Ok(row.try_get(0)?)
    }

    async fn create(&self, entity: &str, values: Row) -> Result<Row> {
        let entity = self.schema.entity(entity)?;
        let prepared = entity.prepare_insert(&values)?;
        let (statement, params) = sql::insert_sql(entity, &prepared, false)?;
        let row = build_query(&statement, &params)?
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to create {}", entity.name))?;

        decode_row(entity, &row)
    }

    async fn find_or_create(&self, entity: &str, key: Row, defaults: Row) -> Result<(Row, bool)> {
        let entity = self.schema.entity(entity)?;
        let key = entity.coerce_row(&key)?;
        let filter = Filter::from_key(&key);
        let (select, select_params) = sql::select_sql(entity, &filter, Some(1))?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // Serializes concurrent callers racing on the same key
        let lock_key = format!("{}:{}", entity.table, Value::Object(key.clone()));
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(lock_key)
            .execute(&mut *tx)
            .await
            .context("Failed to acquire find-or-create lock")?;

        let existing = build_query(&select, &select_params)?
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to look up {}", entity.name))?;
        if let Some(row) = existing {
            let row = decode_row(entity, &row)?;
            tx.commit().await?;
            return Ok((row, false));
        }

        let mut values = defaults;
        values.extend(key);
        let prepared = entity.prepare_insert(&values)?;
        let (insert, insert_params) = sql::insert_sql(entity, &prepared, true)?;
        let inserted = build_query(&insert, &insert_params)?
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to create {}", entity.name))?;

        let (row, created) = match inserted {
            Some(row) => (row, true),
            None => {
                let row = build_query(&select, &select_params)?
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| {
                        anyhow!("{} conflicted on insert but no match was found", entity.name)
                    })?;
                (row, false)
            }
        };
        let row = decode_row(entity, &row)?;
        tx.commit().await.context("Failed to commit find-or-create")?;
        Ok((row, created))
    }
}

#[async_trait::async_trait]
impl RelationStore for PostgresStore {
    async fn get_related(&self, relation: &str, source_id: Id) -> Result<Vec<Row>> {
        let relation = self.schema.relationship(relation)?;
        let target = self.schema.entity(&relation.target)?;
        let statement = sql::get_related_sql(&self.schema, relation)?;
        let rows = sqlx::query(&statement)
            .bind(int4(source_id)?)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {}", relation.name))?;

        rows.iter().map(|row| decode_row(target, row)).collect()
    }

    async fn add_related(&self, relation: &str, source_id: Id, target_id: Id) -> Result<()> {
        let relation = self.schema.relationship(relation)?;
        let statements = sql::add_related_sql(&self.schema, relation)?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for (statement, must_hit_row) in &statements {
            let result = sqlx::query(statement)
                .bind(int4(source_id)?)
                .bind(int4(target_id)?)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to link {} {} -> {}", relation.name, source_id, target_id))?;
            if *must_hit_row && result.rows_affected() == 0 {
                bail!("{}: record {} -> {} not found", relation.name, source_id, target_id);
            }
        }
        tx.commit().await.context("Failed to commit link")?;
        Ok(())
    }

    async fn count_related(&self, relation: &str, source_id: Id) -> Result<i64> {
        let relation = self.schema.relationship(relation)?;
        let statement = sql::count_related_sql(&self.schema, relation)?;
        let row = sqlx::query(&statement)
            .bind(int4(source_id)?)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", relation.name))?;

        Ok(row.try_get(0)?)
    }

    async fn has_related(&self, relation: &str, source_id: Id, target_id: Id) -> Result<bool> {
        let relation = self.schema.relationship(relation)?;
        let statement = sql::has_related_sql(&self.schema, relation)?;
        let row = sqlx::query(&statement)
            .bind(int4(source_id)?)
            .bind(int4(target_id)?)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to check {}", relation.name))?;

        Ok(row.try_get(0)?)
    }

    async fn find_with_related(
        &self,
        entity: &str,
        filter: &Filter,
        relation: &str,
    ) -> Result<Option<(Row, Vec<Row>)>> {
        let entity = self.schema.entity(entity)?;
        let relation = self.schema.relationship(relation)?;
        let target = self.schema.entity(&relation.target)?;
        let (statement, params) =
            sql::find_with_related_sql(&self.schema, entity, &filter.coerced(entity)?, relation)?;

        let Some(row) = build_query(&statement, &params)?
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {} with {}", entity.name, relation.name))?
        else {
            return Ok(None);
        };

        let parent = decode_row(entity, &row)?;
        let related = match row.try_get::<Value, _>(RELATED_COLUMN)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| normalize_json_row(target, item))
                .collect::<Result<Vec<_>>>()?,
            other => bail!("Unexpected {} payload: {}", RELATED_COLUMN, other),
        };
        Ok(Some((parent, related)))
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn close(&self) {
        self.pool.close().await;
        log::debug!("PostgreSQL pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog_schema;
    use serde_json::json;

    #[test]
    fn test_int4_range() {
        assert_eq!(int4(7).unwrap(), 7);
        assert!(int4(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn test_normalize_json_row_coerces_and_drops_undeclared() {
        let schema = catalog_schema().unwrap();
        let toy = schema.entity("Toy").unwrap();
        let row = normalize_json_row(
            toy,
            json!({
                "id": 3,
                "name": "Lego Car",
                "price": 19.99,
                "category": "fun",
                "BrandId": 1,
                "createdAt": "2024-05-01T12:00:00.123456+00:00",
                "updatedAt": "2024-05-01T12:00:00.123456+00:00",
                "legacy_code": "x"
            }),
        )
        .unwrap();

        assert_eq!(row["id"], json!(3));
        assert_eq!(row["price"], json!(19.99));
        assert!(!row.contains_key("legacy_code"));
        assert!(row["createdAt"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
    }

    #[test]
    fn test_normalize_json_row_rejects_non_objects() {
        let schema = catalog_schema().unwrap();
        assert!(normalize_json_row(schema.entity("Brand").unwrap(), json!([1, 2])).is_err());
    }
}

//! PostgreSQL statement builders driven by the declared schema.
//!
//! Every builder returns the SQL text together with the typed parameters it
//! expects, numbered `$1..$n` in order.

use crate::error::SchemaError;
use crate::model::{
    Condition, DataType, EntityDef, FieldDef, Filter, RelationshipDef, RelationshipKind, Row,
    Schema, ID_COLUMN, UPDATED_AT_COLUMN,
};
use serde_json::Value;

/// A bound parameter and the column type it is encoded as
pub type Param = (DataType, Value);

/// Column alias carrying the eagerly fetched related rows
pub const RELATED_COLUMN: &str = "__related";

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_columns<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn qualified(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{}.{}", alias, quote_identifier(column)),
        None => quote_identifier(column),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

// =============================================================================
// DDL
// =============================================================================

/// Column definition. Columns added to an existing table only get `NOT NULL`
/// when a default can fill the rows already present.
pub fn column_definition(field: &FieldDef, new_table: bool) -> String {
    if field.auto_increment {
        return format!("{} SERIAL", quote_identifier(&field.name));
    }

    let mut definition = format!("{} {}", quote_identifier(&field.name), field.data_type.sql_type());

    let default = if field.timestamp {
        Some("NOW()".to_string())
    } else {
        field.default.as_ref().map(literal)
    };
    if !field.allow_null && (new_table || default.is_some()) {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = default {
        definition.push_str(" DEFAULT ");
        definition.push_str(&default);
    }
    if let Some(fk) = &field.references {
        definition.push_str(&format!(
            " REFERENCES {} ({}) ON DELETE {} ON UPDATE CASCADE",
            quote_identifier(&fk.table),
            quote_identifier(ID_COLUMN),
            fk.on_delete.sql()
        ));
    }
    definition
}

pub fn create_table_sql(entity: &EntityDef) -> String {
    let mut lines: Vec<String> = entity
        .fields
        .iter()
        .map(|f| format!("    {}", column_definition(f, true)))
        .collect();
    lines.push(format!("    PRIMARY KEY ({})", quote_columns(&entity.primary_key())));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_identifier(&entity.table),
        lines.join(",\n")
    )
}

pub fn add_column_sql(entity: &EntityDef, field: &FieldDef) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
        quote_identifier(&entity.table),
        column_definition(field, false)
    )
}

/// `<table>_<col>[_<col>]_key`, matching PostgreSQL's own naming of unique constraints
pub fn unique_index_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let columns: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    format!("{}_{}_key", table, columns.join("_"))
}

pub fn create_unique_index_sql<S: AsRef<str>>(table: &str, name: &str, columns: &[S]) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_identifier(name),
        quote_identifier(table),
        quote_columns(columns)
    )
}

// =============================================================================
// DML
// =============================================================================

fn where_clause(
    entity: &EntityDef,
    filter: &Filter,
    alias: Option<&str>,
    params: &mut Vec<Param>,
) -> Result<String, SchemaError> {
    if filter.conditions.is_empty() {
        return Ok("TRUE".to_string());
    }

    let mut predicates = Vec::with_capacity(filter.conditions.len());
    for (column, condition) in &filter.conditions {
        let data_type = entity.require_field(column)?.data_type;
        let column = qualified(alias, column);
        let predicate = match condition {
            Condition::Eq(value) => {
                params.push((data_type, value.clone()));
                format!("{} = ${}", column, params.len())
            }
            Condition::In(values) if values.is_empty() => "FALSE".to_string(),
            Condition::In(values) => {
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|value| {
                        params.push((data_type, value.clone()));
                        format!("${}", params.len())
                    })
                    .collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            Condition::Null => format!("{} IS NULL", column),
        };
        predicates.push(predicate);
    }
    Ok(predicates.join(" AND "))
}

fn order_by(entity: &EntityDef, alias: Option<&str>) -> String {
    entity
        .primary_key()
        .iter()
        .map(|c| qualified(alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn select_sql(
    entity: &EntityDef,
    filter: &Filter,
    limit: Option<u32>,
) -> Result<(String, Vec<Param>), SchemaError> {
    let mut params = Vec::new();
    let predicate = where_clause(entity, filter, None, &mut params)?;
    let mut sql = format!(
        "SELECT * FROM {} WHERE {} ORDER BY {}",
        quote_identifier(&entity.table),
        predicate,
        order_by(entity, None)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok((sql, params))
}

pub fn count_sql(entity: &EntityDef, filter: &Filter) -> Result<(String, Vec<Param>), SchemaError> {
    let mut params = Vec::new();
    let predicate = where_clause(entity, filter, None, &mut params)?;
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        quote_identifier(&entity.table),
        predicate
    );
    Ok((sql, params))
}

/// INSERT of prepared values. With `skip_conflicts` a unique violation
/// returns no row instead of failing.
pub fn insert_sql(
    entity: &EntityDef,
    values: &Row,
    skip_conflicts: bool,
) -> Result<(String, Vec<Param>), SchemaError> {
    let mut columns = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (column, value) in values {
        let data_type = entity.require_field(column)?.data_type;
        columns.push(column.as_str());
        params.push((data_type, value.clone()));
    }

    let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("${}", i)).collect();
    let conflict = if skip_conflicts { " ON CONFLICT DO NOTHING" } else { "" };
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){} RETURNING *",
        quote_identifier(&entity.table),
        quote_columns(&columns),
        placeholders.join(", "),
        conflict
    );
    Ok((sql, params))
}

/// How the source record is referenced inside a relationship query
#[derive(Debug, Clone, Copy)]
pub enum SourceRef<'a> {
    /// Source id bound as `$n`
    Param(usize),
    /// Source row available under this table alias
    Alias(&'a str),
}

/// SELECT of the target rows related to the source, aliased `t`.
pub fn related_rows_sql(
    schema: &Schema,
    relation: &RelationshipDef,
    source: SourceRef<'_>,
) -> Result<String, SchemaError> {
    let source_entity = schema.entity(&relation.source)?;
    let target = schema.entity(&relation.target)?;
    let target_table = quote_identifier(&target.table);
    let fk = quote_identifier(&relation.foreign_key);
    let id = quote_identifier(ID_COLUMN);

    let source_id = match source {
        SourceRef::Param(n) => format!("${}", n),
        SourceRef::Alias(alias) => format!("{}.{}", alias, id),
    };

    let sql = match relation.kind {
        RelationshipKind::HasMany | RelationshipKind::HasOne => {
            format!("SELECT t.* FROM {} t WHERE t.{} = {}", target_table, fk, source_id)
        }
        RelationshipKind::BelongsTo => {
            let source_fk = match source {
                SourceRef::Param(n) => format!(
                    "(SELECT s.{} FROM {} s WHERE s.{} = ${})",
                    fk,
                    quote_identifier(&source_entity.table),
                    id,
                    n
                ),
                SourceRef::Alias(alias) => format!("{}.{}", alias, fk),
            };
            format!("SELECT t.* FROM {} t WHERE t.{} = {}", target_table, id, source_fk)
        }
        RelationshipKind::BelongsToMany => {
            let through = relation
                .through
                .as_deref()
                .ok_or_else(|| SchemaError::UnknownRelationship(relation.name.clone()))?;
            let join = schema.entity(through)?;
            let other_key = relation
                .other_key
                .as_deref()
                .ok_or_else(|| SchemaError::UnknownRelationship(relation.name.clone()))?;
            format!(
                "SELECT t.* FROM {} t JOIN {} j ON j.{} = t.{} WHERE j.{} = {}",
                target_table,
                quote_identifier(&join.table),
                quote_identifier(other_key),
                id,
                fk,
                source_id
            )
        }
    };
    Ok(sql)
}

/// Related rows of `$1`, ordered by id
pub fn get_related_sql(schema: &Schema, relation: &RelationshipDef) -> Result<String, SchemaError> {
    Ok(format!(
        "{} ORDER BY t.{}",
        related_rows_sql(schema, relation, SourceRef::Param(1))?,
        quote_identifier(ID_COLUMN)
    ))
}

pub fn count_related_sql(schema: &Schema, relation: &RelationshipDef) -> Result<String, SchemaError> {
    Ok(format!(
        "SELECT COUNT(*) FROM ({}) r",
        related_rows_sql(schema, relation, SourceRef::Param(1))?
    ))
}

/// Whether target `$2` is related to source `$1`
pub fn has_related_sql(schema: &Schema, relation: &RelationshipDef) -> Result<String, SchemaError> {
    Ok(format!(
        "SELECT EXISTS (SELECT 1 FROM ({}) r WHERE r.{} = $2)",
        related_rows_sql(schema, relation, SourceRef::Param(1))?,
        quote_identifier(ID_COLUMN)
    ))
}

fn touch(entity: &EntityDef) -> String {
    if entity.field(UPDATED_AT_COLUMN).is_some() {
        format!(", {} = NOW()", quote_identifier(UPDATED_AT_COLUMN))
    } else {
        String::new()
    }
}

/// Statements linking target `$2` to source `$1`, run in order inside one
/// transaction. UPDATE statements that must hit a row are flagged `true`.
pub fn add_related_sql(
    schema: &Schema,
    relation: &RelationshipDef,
) -> Result<Vec<(String, bool)>, SchemaError> {
    let fk = quote_identifier(&relation.foreign_key);
    let id = quote_identifier(ID_COLUMN);

    let statements = match relation.kind {
        RelationshipKind::HasMany => {
            let target = schema.entity(&relation.target)?;
            vec![(
                format!(
                    "UPDATE {} SET {} = $1{} WHERE {} = $2",
                    quote_identifier(&target.table),
                    fk,
                    touch(target),
                    id
                ),
                true,
            )]
        }
        RelationshipKind::HasOne => {
            let target = schema.entity(&relation.target)?;
            let table = quote_identifier(&target.table);
            vec![
                (
                    format!(
                        "UPDATE {} SET {} = NULL{} WHERE {} = $1 AND {} <> $2",
                        table,
                        fk,
                        touch(target),
                        fk,
                        id
                    ),
                    false,
                ),
                (
                    format!(
                        "UPDATE {} SET {} = $1{} WHERE {} = $2",
                        table,
                        fk,
                        touch(target),
                        id
                    ),
                    true,
                ),
            ]
        }
        RelationshipKind::BelongsTo => {
            let source = schema.entity(&relation.source)?;
            vec![(
                format!(
                    "UPDATE {} SET {} = $2{} WHERE {} = $1",
                    quote_identifier(&source.table),
                    fk,
                    touch(source),
                    id
                ),
                true,
            )]
        }
        RelationshipKind::BelongsToMany => {
            let through = relation
                .through
                .as_deref()
                .ok_or_else(|| SchemaError::UnknownRelationship(relation.name.clone()))?;
            let join = schema.entity(through)?;
            let other_key = relation
                .other_key
                .as_deref()
                .ok_or_else(|| SchemaError::UnknownRelationship(relation.name.clone()))?;

            let mut columns = vec![relation.foreign_key.as_str(), other_key];
            let mut values = vec!["$1", "$2"];
            for field in join.fields.iter().filter(|f| f.timestamp) {
                columns.push(field.name.as_str());
                values.push("NOW()");
            }
            vec![(
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
                    quote_identifier(&join.table),
                    quote_columns(&columns),
                    values.join(", ")
                ),
                false,
            )]
        }
    };
    Ok(statements)
}

/// First parent row matching `filter` with its related rows aggregated as JSON
/// into [`RELATED_COLUMN`].
pub fn find_with_related_sql(
    schema: &Schema,
    entity: &EntityDef,
    filter: &Filter,
    relation: &RelationshipDef,
) -> Result<(String, Vec<Param>), SchemaError> {
    let mut params = Vec::new();
    let predicate = where_clause(entity, filter, Some("p"), &mut params)?;
    let related = related_rows_sql(schema, relation, SourceRef::Alias("p"))?;
    let sql = format!(
        "SELECT p.*, COALESCE((SELECT json_agg(r ORDER BY r.{id}) FROM ({related}) r), '[]'::json) AS {alias} \
         FROM {table} p WHERE {predicate} ORDER BY {order} LIMIT 1",
        id = quote_identifier(ID_COLUMN),
        related = related,
        alias = quote_identifier(RELATED_COLUMN),
        table = quote_identifier(&entity.table),
        predicate = predicate,
        order = order_by(entity, Some("p")),
    );
    Ok((sql, params))
}

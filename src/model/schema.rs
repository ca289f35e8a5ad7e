use crate::error::SchemaError;
use crate::model::{now_timestamp, DataType, RelationshipDef, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "createdAt";
pub const UPDATED_AT_COLUMN: &str = "updatedAt";

fn default_true() -> bool {
    true
}

/// Declarative description of one field, as handed to [`Schema::define`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default = "default_true")]
    pub allow_null: bool,
    #[serde(default)]
    pub unique: bool,
}

/// Declarative description of an entity: name, optional table name and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    /// Columns identifying "the same" record across runs; backed by a unique index
    #[serde(default)]
    pub natural_key: Vec<String>,
}

impl EntityDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            fields: Vec::new(),
            natural_key: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, type_name: &str) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            type_name: type_name.to_string(),
            default: None,
            allow_null: true,
            unique: false,
        });
        self
    }

    /// A field that must be present on every record
    pub fn required(mut self, name: &str, type_name: &str) -> Self {
        self = self.field(name, type_name);
        if let Some(field) = self.fields.last_mut() {
            field.allow_null = false;
        }
        self
    }

    pub fn field_with_default(mut self, name: &str, type_name: &str, default: Value) -> Self {
        self = self.field(name, type_name);
        if let Some(field) = self.fields.last_mut() {
            field.default = Some(default);
        }
        self
    }

    pub fn natural_key(mut self, columns: &[&str]) -> Self {
        self.natural_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDelete {
    SetNull,
    Cascade,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::SetNull => "SET NULL",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced entity name
    pub entity: String,
    pub table: String,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub allow_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    /// Generated by the store (serial id)
    pub auto_increment: bool,
    /// Maintained by the store (createdAt/updatedAt)
    pub timestamp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKey>,
}

impl FieldDef {
    fn plain(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            default: None,
            allow_null: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            timestamp: false,
            references: None,
        }
    }

    fn serial_id() -> Self {
        Self {
            allow_null: false,
            primary_key: true,
            auto_increment: true,
            ..Self::plain(ID_COLUMN, DataType::Integer)
        }
    }

    fn timestamp(name: &str) -> Self {
        Self {
            allow_null: false,
            timestamp: true,
            ..Self::plain(name, DataType::Date)
        }
    }

    pub(crate) fn foreign_key(name: &str, references: ForeignKey, primary_key: bool) -> Self {
        Self {
            allow_null: !primary_key,
            primary_key,
            references: Some(references),
            ..Self::plain(name, DataType::Integer)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Regular entity with a generated integer id
    Model,
    /// Pure pair table of a many-to-many association
    Join,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub table: String,
    pub kind: EntityKind,
    pub fields: Vec<FieldDef>,
    /// Composite unique keys (natural keys); single-column uniqueness lives on the field
    pub unique_keys: Vec<Vec<String>>,
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut FieldDef> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn require_field(&self, name: &str) -> Result<&FieldDef, SchemaError> {
        self.field(name).ok_or_else(|| SchemaError::UnknownColumn {
            entity: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn has_timestamps(&self) -> bool {
        self.fields.iter().any(|f| f.timestamp)
    }

    /// Coerce every value of `row` to its column type.
    pub fn coerce_row(&self, row: &Row) -> Result<Row, SchemaError> {
        row.iter()
            .map(|(column, value)| {
                let field = self.require_field(column)?;
                Ok((column.clone(), field.data_type.coerce(value)?))
            })
            .collect()
    }

    /// Build the column values of a new record: coerce the supplied values,
    /// fill declared defaults for omitted fields, stamp timestamps and check
    /// nullability. Store-generated ids are never part of the result.
    pub fn prepare_insert(&self, values: &Row) -> Result<Row, SchemaError> {
        let mut prepared = Row::new();

        for field in &self.fields {
            if field.auto_increment {
                continue;
            }
            if field.timestamp {
                prepared.insert(field.name.clone(), now_timestamp());
                continue;
            }

            let value = match values.get(&field.name) {
                Some(value) => field.data_type.coerce(value)?,
                None => field.default.clone().unwrap_or(Value::Null),
            };

            if value.is_null() && !field.allow_null {
                return Err(SchemaError::NullNotAllowed {
                    column: format!("{}.{}", self.name, field.name),
                });
            }
            prepared.insert(field.name.clone(), value);
        }

        if let Some(column) = values.keys().find(|c| self.field(c).is_none()) {
            return Err(SchemaError::UnknownColumn {
                entity: self.name.clone(),
                column: column.clone(),
            });
        }

        Ok(prepared)
    }

    /// Tables this entity references through foreign keys
    pub fn referenced_tables(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter_map(|f| f.references.as_ref())
            .map(|fk| fk.table.as_str())
            .filter(|table| *table != self.table)
            .collect()
    }
}

/// The declared entities and relationships of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub entities: Vec<EntityDef>,
    pub relationships: Vec<RelationshipDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an entity definition by name
    pub fn entity(&self, name: &str) -> Result<&EntityDef, SchemaError> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    pub(crate) fn entity_mut(&mut self, name: &str) -> Result<&mut EntityDef, SchemaError> {
        self.entities
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    /// Declare a model entity from its descriptor.
    pub fn define(&mut self, descriptor: EntityDescriptor) -> Result<&EntityDef, SchemaError> {
        let table = descriptor
            .table
            .clone()
            .unwrap_or_else(|| format!("{}s", descriptor.name));

        if self
            .entities
            .iter()
            .any(|e| e.name == descriptor.name || e.table == table)
        {
            return Err(SchemaError::DuplicateEntity(descriptor.name));
        }

        let mut fields = vec![FieldDef::serial_id()];

        for field in &descriptor.fields {
            let duplicate = fields.iter().any(|f| f.name == field.name)
                || field.name == CREATED_AT_COLUMN
                || field.name == UPDATED_AT_COLUMN;
            if duplicate {
                return Err(SchemaError::DuplicateField {
                    entity: descriptor.name.clone(),
                    field: field.name.clone(),
                });
            }

            let data_type =
                DataType::parse(&field.type_name).ok_or_else(|| SchemaError::UnknownFieldType {
                    entity: descriptor.name.clone(),
                    field: field.name.clone(),
                    type_name: field.type_name.clone(),
                })?;

            let default = match &field.default {
                Some(value) => {
                    let coerced =
                        data_type
                            .coerce(value)
                            .map_err(|e| SchemaError::InvalidDefault {
                                entity: descriptor.name.clone(),
                                field: field.name.clone(),
                                reason: e.to_string(),
                            })?;
                    if coerced.is_null() && !field.allow_null {
                        return Err(SchemaError::InvalidDefault {
                            entity: descriptor.name.clone(),
                            field: field.name.clone(),
                            reason: "null default on a required field".to_string(),
                        });
                    }
                    Some(coerced)
                }
                None => None,
            };

            fields.push(FieldDef {
                default,
                allow_null: field.allow_null,
                unique: field.unique,
                ..FieldDef::plain(&field.name, data_type)
            });
        }

        fields.push(FieldDef::timestamp(CREATED_AT_COLUMN));
        fields.push(FieldDef::timestamp(UPDATED_AT_COLUMN));

        let entity_name = descriptor.name.clone();
        let mut entity = EntityDef {
            name: descriptor.name,
            table,
            kind: EntityKind::Model,
            fields,
            unique_keys: Vec::new(),
        };

        match descriptor.natural_key.as_slice() {
            [] => {}
            [column] => {
                match entity.field_mut(column) {
                    Some(field) => field.unique = true,
                    None => {
                        return Err(SchemaError::UnknownColumn {
                            entity: entity_name,
                            column: column.clone(),
                        })
                    }
                }
            }
            columns => {
                for column in columns {
                    entity.require_field(column)?;
                }
                entity.unique_keys.push(columns.to_vec());
            }
        }

        self.entities.push(entity);
        Ok(&self.entities[self.entities.len() - 1])
    }

    /// Add a composite unique key once all of its columns exist, e.g. a natural
    /// key spanning a foreign key added by a relationship.
    pub fn add_unique_key(&mut self, entity: &str, columns: &[&str]) -> Result<(), SchemaError> {
        let entity = self.entity_mut(entity)?;
        for column in columns {
            entity.require_field(column)?;
        }
        let key: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        if !entity.unique_keys.contains(&key) {
            entity.unique_keys.push(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn toy_descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Toy")
            .required("name", "string")
            .field("price", "float")
            .field_with_default("category", "string", json!("fun"))
    }

    #[test]
    fn test_define_adds_implicit_columns() {
        let mut schema = Schema::new();
        let toy = schema.define(toy_descriptor()).unwrap();

        assert_eq!(toy.table, "Toys");
        let names: Vec<&str> = toy.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["id", "name", "price", "category", "createdAt", "updatedAt"]
        );
        assert_eq!(toy.primary_key(), vec!["id"]);
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let mut schema = Schema::new();
        let err = schema
            .define(EntityDescriptor::new("Toy").field("weight", "tensor"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFieldType { ref type_name, .. } if type_name == "tensor"));
    }

    #[test]
    fn test_invalid_default_rejected() {
        let mut schema = Schema::new();
        let err = schema
            .define(EntityDescriptor::new("Toy").field_with_default("price", "float", json!("cheap")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn test_duplicate_entity_and_field_rejected() {
        let mut schema = Schema::new();
        schema.define(toy_descriptor()).unwrap();
        assert_eq!(
            schema.define(toy_descriptor()).unwrap_err(),
            SchemaError::DuplicateEntity("Toy".to_string())
        );

        let err = schema
            .define(EntityDescriptor::new("Shop").field("name", "string").field("name", "text"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn test_prepare_insert_applies_default_category() {
        let mut schema = Schema::new();
        let toy = schema.define(toy_descriptor()).unwrap().clone();

        let mut values = Row::new();
        values.insert("name".into(), json!("Lego Set"));
        let prepared = toy.prepare_insert(&values).unwrap();
        assert_eq!(prepared["category"], json!("fun"));
        assert_eq!(prepared["price"], Value::Null);
        assert!(prepared.contains_key("createdAt"));
        assert!(!prepared.contains_key("id"));

        values.insert("category".into(), json!("puzzle"));
        let prepared = toy.prepare_insert(&values).unwrap();
        assert_eq!(prepared["category"], json!("puzzle"));
    }

    #[test]
    fn test_prepare_insert_rejects_missing_required_and_unknown_columns() {
        let mut schema = Schema::new();
        let toy = schema.define(toy_descriptor()).unwrap().clone();

        let err = toy.prepare_insert(&Row::new()).unwrap_err();
        assert!(matches!(err, SchemaError::NullNotAllowed { .. }));

        let mut values = Row::new();
        values.insert("name".into(), json!("Yo-yo"));
        values.insert("colour".into(), json!("red"));
        let err = toy.prepare_insert(&values).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { .. }));
    }

    #[test]
    fn test_single_column_natural_key_marks_field_unique() {
        let mut schema = Schema::new();
        let brand = schema
            .define(
                EntityDescriptor::new("Brand")
                    .required("name", "string")
                    .natural_key(&["name"]),
            )
            .unwrap();
        assert!(brand.field("name").unwrap().unique);
        assert!(brand.unique_keys.is_empty());
    }
}

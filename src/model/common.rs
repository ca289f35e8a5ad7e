use crate::error::SchemaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Generated primary key of every model entity.
pub type Id = i64;

/// A record as the store sees it: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Build a [`Row`] from `column => value` pairs.
#[macro_export]
macro_rules! row {
    ($($column:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut row = $crate::model::Row::new();
        $(row.insert($column.to_string(), ::serde_json::Value::from($value));)*
        row
    }};
}

/// Character limit of [`DataType::String`] columns (`VARCHAR(255)`)
pub const MAX_STRING_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    String,
    Text,
    Float,
    Integer,
    Boolean,
    Date,
}

impl DataType {
    /// Resolve a descriptor type name. Unknown names yield `None`.
    pub fn parse(type_name: &str) -> Option<Self> {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "string" | "varchar" => Some(DataType::String),
            "text" => Some(DataType::Text),
            "float" | "double" | "decimal" | "real" => Some(DataType::Float),
            "integer" | "int" => Some(DataType::Integer),
            "boolean" | "bool" => Some(DataType::Boolean),
            "date" | "datetime" | "timestamp" => Some(DataType::Date),
            _ => None,
        }
    }

    /// Column type used in PostgreSQL DDL
    pub fn sql_type(&self) -> &'static str {
        match self {
            DataType::String => "VARCHAR(255)",
            DataType::Text => "TEXT",
            DataType::Float => "DOUBLE PRECISION",
            DataType::Integer => "INTEGER",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "TIMESTAMP WITH TIME ZONE",
        }
    }

    /// `information_schema.columns.data_type` reported for a column created with [`Self::sql_type`]
    pub fn information_schema_name(&self) -> &'static str {
        match self {
            DataType::String => "character varying",
            DataType::Text => "text",
            DataType::Float => "double precision",
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Date => "timestamp with time zone",
        }
    }

    /// Whether an `information_schema.columns.data_type` value is compatible
    /// with this declared type.
    pub fn matches_live(&self, live_type: &str) -> bool {
        let live_type = live_type.to_ascii_lowercase();
        match self {
            DataType::String => live_type == "character varying" || live_type == "text",
            DataType::Text => live_type == "text",
            DataType::Float => live_type == "double precision" || live_type == "real",
            DataType::Integer => live_type == "integer" || live_type == "bigint",
            DataType::Boolean => live_type == "boolean",
            DataType::Date => live_type.starts_with("timestamp"),
        }
    }

    /// Coerce a JSON value into the canonical representation of this type.
    /// Null passes through; nullability is enforced by the caller.
    pub fn coerce(&self, value: &Value) -> Result<Value, SchemaError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let coerced = match (self, value) {
            (DataType::String | DataType::Text, Value::String(_)) => Some(value.clone()),
            (DataType::String | DataType::Text, Value::Number(n)) => {
                Some(Value::String(n.to_string()))
            }
            (DataType::String | DataType::Text, Value::Bool(b)) => {
                Some(Value::String(b.to_string()))
            }
            (DataType::Float, Value::Number(n)) => n.as_f64().and_then(float_value),
            (DataType::Float, Value::String(s)) => {
                s.trim().parse::<f64>().ok().and_then(float_value)
            }
            (DataType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Some(Value::from(i)),
                None => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::from(f as i64)),
            },
            (DataType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (DataType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (DataType::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (DataType::Date, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| Value::String(d.with_timezone(&Utc).to_rfc3339())),
            _ => None,
        };

        let coerced = coerced.ok_or_else(|| SchemaError::TypeMismatch {
            expected: format!("{:?}", self),
            found: value_kind(value).to_string(),
        })?;

        if let (DataType::String, Value::String(s)) = (self, &coerced) {
            let length = s.chars().count();
            if length > MAX_STRING_LENGTH {
                return Err(SchemaError::ValueTooLong {
                    max: MAX_STRING_LENGTH,
                    length,
                });
            }
        }
        Ok(coerced)
    }
}

fn float_value(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Timestamp written into `createdAt`/`updatedAt` by the stores
pub fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

use crate::error::SchemaError;
use crate::model::{EntityDef, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "op", content = "value")]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
    Null,
}

/// Conjunction of column predicates. Results are always ordered by primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`; a null value means `column IS NULL`
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let condition = if value.is_null() {
            Condition::Null
        } else {
            Condition::Eq(value)
        };
        self.conditions.push((column.to_string(), condition));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push((column.to_string(), Condition::Null));
        self
    }

    /// `column IN (values)`; an empty list matches nothing
    pub fn any_of<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push((column.to_string(), Condition::In(values)));
        self
    }

    /// Equality filter over every column of a natural key
    pub fn from_key(key: &Row) -> Self {
        key.iter()
            .fold(Self::new(), |filter, (column, value)| filter.eq(column, value.clone()))
    }

    /// Coerce every compared value to its column type
    pub fn coerced(&self, entity: &EntityDef) -> Result<Filter, SchemaError> {
        let conditions = self
            .conditions
            .iter()
            .map(|(column, condition)| {
                let data_type = entity.require_field(column)?.data_type;
                let condition = match condition {
                    Condition::Eq(value) => Condition::Eq(data_type.coerce(value)?),
                    Condition::In(values) => Condition::In(
                        values
                            .iter()
                            .map(|v| data_type.coerce(v))
                            .collect::<Result<_, _>>()?,
                    ),
                    Condition::Null => Condition::Null,
                };
                Ok((column.clone(), condition))
            })
            .collect::<Result<_, SchemaError>>()?;
        Ok(Filter { conditions })
    }

    /// Evaluate against a row holding coerced values
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, condition)| {
            let value = row.get(column).unwrap_or(&Value::Null);
            match condition {
                Condition::Eq(expected) => !value.is_null() && value == expected,
                Condition::In(candidates) => !value.is_null() && candidates.contains(value),
                Condition::Null => value.is_null(),
            }
        })
    }
}

use crate::model::{Id, Row};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed view over rows of one declared entity.
pub trait Record: DeserializeOwned + Send + Sync + 'static {
    /// Entity name as declared in the schema
    const ENTITY: &'static str;

    fn id(&self) -> Id;

    fn from_row(row: Row) -> Result<Self> {
        serde_json::from_value(Value::Object(row))
            .with_context(|| format!("Failed to decode {} row", Self::ENTITY))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toy {
    pub id: Id,
    pub name: String,
    pub price: Option<f64>,
    pub category: String,
    #[serde(rename = "BrandId")]
    pub brand_id: Option<Id>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Toy {
    /// `$19.99`, or `$-` when no price was ever set
    pub fn display_price(&self) -> String {
        match self.price {
            Some(price) => format!("${}", price),
            None => "$-".to_string(),
        }
    }
}

impl Record for Toy {
    const ENTITY: &'static str = "Toy";

    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: Id,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Brand {
    const ENTITY: &'static str = "Brand";

    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: Id,
    pub name: String,
    pub location: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Shop {
    const ENTITY: &'static str = "Shop";

    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manual {
    pub id: Id,
    pub instructions: Option<String>,
    #[serde(rename = "ToyId")]
    pub toy_id: Option<Id>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Manual {
    const ENTITY: &'static str = "Manual";

    fn id(&self) -> Id {
        self.id
    }
}

use crate::error::SchemaError;
use crate::model::{Brand, EntityDescriptor, Manual, Schema, Shop, Toy};
use crate::store::Relation;
use serde_json::json;

pub const SHOP_TOYS_JOIN: &str = "ShopToys";

pub const BRAND_TOYS: Relation<Brand, Toy> = Relation::new("Brand.Toys");
pub const TOY_BRAND: Relation<Toy, Brand> = Relation::new("Toy.Brand");
pub const SHOP_TOYS: Relation<Shop, Toy> = Relation::new("Shop.Toys");
pub const TOY_SHOPS: Relation<Toy, Shop> = Relation::new("Toy.Shops");
pub const TOY_MANUAL: Relation<Toy, Manual> = Relation::new("Toy.Manual");
pub const MANUAL_TOY: Relation<Manual, Toy> = Relation::new("Manual.Toy");

/// Entities and associations of the toy catalog
pub fn catalog_schema() -> Result<Schema, SchemaError> {
    let mut schema = Schema::new();

    schema.define(
        EntityDescriptor::new("Toy")
            .required("name", "string")
            .field("price", "float")
            .field_with_default("category", "string", json!("fun")),
    )?;
    schema.define(
        EntityDescriptor::new("Brand")
            .required("name", "string")
            .natural_key(&["name"]),
    )?;
    schema.define(
        EntityDescriptor::new("Shop")
            .required("name", "string")
            .field("location", "string")
            .natural_key(&["name"]),
    )?;
    schema.define(EntityDescriptor::new("Manual").field("instructions", "text"))?;

    // One brand makes many toys; each toy belongs to one brand
    schema.has_many("Brand", "Toy")?;
    schema.belongs_to("Toy", "Brand")?;

    schema.belongs_to_many("Shop", "Toy", SHOP_TOYS_JOIN)?;
    schema.belongs_to_many("Toy", "Shop", SHOP_TOYS_JOIN)?;

    // One toy has one manual; each manual belongs to one toy
    schema.has_one("Toy", "Manual")?;
    schema.belongs_to("Manual", "Toy")?;

    schema.add_unique_key("Toy", &["name", "BrandId"])?;

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, RelationshipKind};

    #[test]
    fn test_catalog_schema_declares_all_relations() {
        let schema = catalog_schema().unwrap();

        for (name, kind) in [
            (BRAND_TOYS.name(), RelationshipKind::HasMany),
            (TOY_BRAND.name(), RelationshipKind::BelongsTo),
            (SHOP_TOYS.name(), RelationshipKind::BelongsToMany),
            (TOY_SHOPS.name(), RelationshipKind::BelongsToMany),
            (TOY_MANUAL.name(), RelationshipKind::HasOne),
            (MANUAL_TOY.name(), RelationshipKind::BelongsTo),
        ] {
            assert_eq!(schema.relationship(name).unwrap().kind, kind, "{}", name);
        }
    }

    #[test]
    fn test_catalog_schema_shapes() {
        let schema = catalog_schema().unwrap();

        let toy = schema.entity("Toy").unwrap();
        assert_eq!(toy.field("category").unwrap().default, Some(json!("fun")));
        assert_eq!(toy.unique_keys, vec![vec!["name".to_string(), "BrandId".to_string()]]);

        let manual = schema.entity("Manual").unwrap();
        assert!(manual.field("ToyId").unwrap().unique);

        let join = schema.entity(SHOP_TOYS_JOIN).unwrap();
        assert_eq!(join.kind, EntityKind::Join);
        assert_eq!(join.primary_key(), vec!["ShopId", "ToyId"]);
    }
}

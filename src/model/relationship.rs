use crate::error::SchemaError;
use crate::model::{
    EntityDef, EntityKind, FieldDef, ForeignKey, OnDelete, Schema, CREATED_AT_COLUMN,
    UPDATED_AT_COLUMN,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// Parent side of one-to-many; FK on the target
    HasMany,
    /// Child side of one-to-many or one-to-one; FK on the source
    BelongsTo,
    /// Parent side of one-to-one; unique FK on the target
    HasOne,
    /// Many-to-many through a join entity
    BelongsToMany,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    /// `<Source>.<Alias>`, e.g. `Brand.Toys`
    pub name: String,
    pub alias: String,
    pub source: String,
    pub target: String,
    pub kind: RelationshipKind,
    /// FK column: on the target (has-many/has-one), on the source (belongs-to)
    /// or the source-side column of the join entity (belongs-to-many)
    pub foreign_key: String,
    /// Target-side column of the join entity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_key: Option<String>,
    /// Join entity name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
}

impl RelationshipDef {
    /// Whether at most one record can be related to a source
    pub fn is_singular(&self) -> bool {
        matches!(
            self.kind,
            RelationshipKind::BelongsTo | RelationshipKind::HasOne
        )
    }
}

fn foreign_key_name(entity: &str) -> String {
    format!("{}Id", entity)
}

impl Schema {
    /// Find a relationship by its `<Source>.<Alias>` name
    pub fn relationship(&self, name: &str) -> Result<&RelationshipDef, SchemaError> {
        self.relationships
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| SchemaError::UnknownRelationship(name.to_string()))
    }

    /// One source owns many targets; adds `<Source>Id` to the target.
    pub fn has_many(&mut self, source: &str, target: &str) -> Result<&RelationshipDef, SchemaError> {
        let alias = self.entity(target)?.table.clone();
        let foreign_key = foreign_key_name(source);
        self.ensure_foreign_key(target, &foreign_key, source, false)?;
        self.register(source, target, &alias, RelationshipKind::HasMany, foreign_key, None, None)
    }

    /// The source points at one target; adds `<Target>Id` to the source.
    pub fn belongs_to(&mut self, source: &str, target: &str) -> Result<&RelationshipDef, SchemaError> {
        let alias = self.entity(target)?.name.clone();
        let foreign_key = foreign_key_name(target);
        self.ensure_foreign_key(source, &foreign_key, target, false)?;
        self.register(source, target, &alias, RelationshipKind::BelongsTo, foreign_key, None, None)
    }

    /// One source has at most one target; adds a unique `<Source>Id` to the target.
    pub fn has_one(&mut self, source: &str, target: &str) -> Result<&RelationshipDef, SchemaError> {
        let alias = self.entity(target)?.name.clone();
        let foreign_key = foreign_key_name(source);
        self.ensure_foreign_key(target, &foreign_key, source, true)?;
        self.register(source, target, &alias, RelationshipKind::HasOne, foreign_key, None, None)
    }

    /// Many-to-many through `through`. The join entity is created on first
    /// registration and reused by the inverse direction.
    pub fn belongs_to_many(
        &mut self,
        source: &str,
        target: &str,
        through: &str,
    ) -> Result<&RelationshipDef, SchemaError> {
        let alias = self.entity(target)?.table.clone();
        let source_key = foreign_key_name(source);
        let target_key = foreign_key_name(target);

        let existing = self.entities.iter().position(|e| e.name == through);
        match existing {
            Some(index) => {
                let join = &self.entities[index];
                for column in [&source_key, &target_key] {
                    let linked = join
                        .field(column)
                        .map(|f| f.primary_key && f.references.is_some())
                        .unwrap_or(false);
                    if join.kind != EntityKind::Join || !linked {
                        return Err(SchemaError::ConflictingForeignKey {
                            entity: through.to_string(),
                            column: column.clone(),
                        });
                    }
                }
            }
            None => {
                let join = self.join_entity(through, source, target)?;
                self.entities.push(join);
            }
        }

        self.register(
            source,
            target,
            &alias,
            RelationshipKind::BelongsToMany,
            source_key,
            Some(target_key),
            Some(through.to_string()),
        )
    }

    fn join_entity(&self, through: &str, left: &str, right: &str) -> Result<EntityDef, SchemaError> {
        let mut fields = Vec::new();
        for entity in [left, right] {
            let referenced = self.entity(entity)?;
            fields.push(FieldDef::foreign_key(
                &foreign_key_name(entity),
                ForeignKey {
                    entity: referenced.name.clone(),
                    table: referenced.table.clone(),
                    on_delete: OnDelete::Cascade,
                },
                true,
            ));
        }

        // Reuse the timestamp columns of a model definition
        let timestamps = self
            .entity(left)?
            .fields
            .iter()
            .filter(|f| f.name == CREATED_AT_COLUMN || f.name == UPDATED_AT_COLUMN)
            .cloned();
        fields.extend(timestamps);

        Ok(EntityDef {
            name: through.to_string(),
            table: through.to_string(),
            kind: EntityKind::Join,
            fields,
            unique_keys: Vec::new(),
        })
    }

    fn ensure_foreign_key(
        &mut self,
        entity: &str,
        column: &str,
        referenced: &str,
        unique: bool,
    ) -> Result<(), SchemaError> {
        let referenced = self.entity(referenced)?;
        let references = ForeignKey {
            entity: referenced.name.clone(),
            table: referenced.table.clone(),
            on_delete: OnDelete::SetNull,
        };

        let owner = self.entity_mut(entity)?;
        match owner.field_mut(column) {
            Some(existing) => {
                let same_target = existing
                    .references
                    .as_ref()
                    .map(|fk| fk.table == references.table)
                    .unwrap_or(false);
                if !same_target {
                    return Err(SchemaError::ConflictingForeignKey {
                        entity: entity.to_string(),
                        column: column.to_string(),
                    });
                }
                existing.unique |= unique;
            }
            None => {
                let mut field = FieldDef::foreign_key(column, references, false);
                field.unique = unique;
                owner.fields.push(field);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &mut self,
        source: &str,
        target: &str,
        alias: &str,
        kind: RelationshipKind,
        foreign_key: String,
        other_key: Option<String>,
        through: Option<String>,
    ) -> Result<&RelationshipDef, SchemaError> {
        let name = format!("{}.{}", source, alias);
        if self.relationships.iter().any(|r| r.name == name) {
            return Err(SchemaError::DuplicateRelationship(name));
        }

        self.relationships.push(RelationshipDef {
            name,
            alias: alias.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            kind,
            foreign_key,
            other_key,
            through,
        });
        Ok(&self.relationships[self.relationships.len() - 1])
    }
}

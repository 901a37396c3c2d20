//! Registry of entity schemas with forward and reverse relationship lookups.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{EntitySchema, IndexDef, Reference, TableDef};
use crate::errors::{VestigeError, VestigeResult};

/// One end of a many-to-many relation as seen from a participating entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEnd {
    /// Entity declaring the relation.
    pub owner: String,
    /// Relation name on the owner.
    pub relation: String,
    pub through: String,
    /// Join column pointing at the entity we navigate from.
    pub near_column: String,
    /// Join column pointing at the entity we navigate to.
    pub far_column: String,
    pub far_entity: String,
    pub symmetrical: bool,
}

/// A to-one reference seen from its target: the referencing entity and the
/// reference it declares.
#[derive(Debug, Clone)]
pub struct ReverseReference {
    pub entity: Arc<EntitySchema>,
    pub reference: Reference,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity and the join tables of its many-to-many relations.
    pub fn register(&mut self, schema: EntitySchema) -> VestigeResult<()> {
        schema.check()?;
        if self.entities.contains_key(schema.name()) {
            return Err(VestigeError::InvalidArgument(format!(
                "entity {} is already registered",
                schema.name()
            )));
        }
        for relation in schema.relations() {
            if self.entities.contains_key(&relation.through) {
                return Err(VestigeError::InvalidArgument(format!(
                    "join table {} collides with a registered entity",
                    relation.through
                )));
            }
            let through = relation.through_schema();
            debug!(entity = schema.name(), through = %relation.through, "registered join table");
            self.entities.insert(relation.through.clone(), Arc::new(through));
        }
        debug!(
            entity = schema.name(),
            versioned = schema.is_versioned(),
            references = schema.references().len(),
            relations = schema.relations().len(),
            "registered entity"
        );
        self.entities
            .insert(schema.name().to_string(), Arc::new(schema));
        Ok(())
    }

    pub fn with(mut self, schema: EntitySchema) -> VestigeResult<Self> {
        self.register(schema)?;
        Ok(self)
    }

    /// Cross-entity checks: every target exists, reverse names do not clash.
    pub fn validate(&self) -> VestigeResult<()> {
        for schema in self.entities.values() {
            for reference in schema.references() {
                let target = self.entity(&reference.target)?;
                if target.is_auto_created() {
                    return Err(VestigeError::InvalidArgument(format!(
                        "{}.{} targets join table {}",
                        schema.name(),
                        reference.name,
                        reference.target
                    )));
                }
            }
            for relation in schema.relations() {
                let target = self.entity(&relation.target)?;
                if !schema.is_versioned() || !target.is_versioned() {
                    return Err(VestigeError::InvalidArgument(format!(
                        "{}.{} links a plain entity; many-to-many needs versioned participants",
                        schema.name(),
                        relation.name
                    )));
                }
            }
        }
        for schema in self.entities.values() {
            let mut names: Vec<String> = self
                .referencing(schema.name())
                .into_iter()
                .map(|r| reverse_name(&r.entity, &r.reference))
                .collect();
            names.extend(
                self.relation_ends(schema.name())
                    .into_iter()
                    .map(|end| end.relation),
            );
            names.sort();
            if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
                return Err(VestigeError::InvalidArgument(format!(
                    "{} has two accessors named {}",
                    schema.name(),
                    pair[0]
                )));
            }
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> VestigeResult<&Arc<EntitySchema>> {
        self.entities
            .get(name)
            .ok_or_else(|| VestigeError::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.entities.values()
    }

    /// Every to-one reference pointing at `target`.
    pub fn referencing(&self, target: &str) -> Vec<ReverseReference> {
        self.entities
            .values()
            .flat_map(|schema| {
                schema
                    .references()
                    .iter()
                    .filter(|r| r.target == target)
                    .map(move |r| ReverseReference {
                        entity: Arc::clone(schema),
                        reference: r.clone(),
                    })
            })
            .collect()
    }

    /// Reverse to-one accessor on `target` named `name`.
    pub fn reverse_reference(&self, target: &str, name: &str) -> Option<ReverseReference> {
        self.referencing(target)
            .into_iter()
            .find(|r| reverse_name(&r.entity, &r.reference) == name)
    }

    /// Many-to-many ends navigable from `entity`, by accessor name.
    ///
    /// Forward ends are named after the relation; reverse ends after the
    /// related name, defaulting to `<owner>_set`. A symmetrical relation has
    /// only its forward end.
    pub fn relation_ends(&self, entity: &str) -> Vec<RelationEnd> {
        let mut ends = Vec::new();
        for schema in self.entities.values() {
            for relation in schema.relations() {
                if schema.name() == entity {
                    ends.push(RelationEnd {
                        owner: schema.name().to_string(),
                        relation: relation.name.clone(),
                        through: relation.through.clone(),
                        near_column: relation.source_column.clone(),
                        far_column: relation.target_column.clone(),
                        far_entity: relation.target.clone(),
                        symmetrical: relation.symmetrical,
                    });
                }
                if relation.target == entity && !relation.symmetrical {
                    ends.push(RelationEnd {
                        owner: schema.name().to_string(),
                        relation: relation
                            .related_name
                            .clone()
                            .unwrap_or_else(|| format!("{}_set", schema.name())),
                        through: relation.through.clone(),
                        near_column: relation.target_column.clone(),
                        far_column: relation.source_column.clone(),
                        far_entity: schema.name().to_string(),
                        symmetrical: false,
                    });
                }
            }
        }
        ends
    }

    pub fn relation_end(&self, entity: &str, name: &str) -> Option<RelationEnd> {
        self.relation_ends(entity)
            .into_iter()
            .find(|end| end.relation == name)
    }

    /// Join tables touching `entity`, once per relation, with the column
    /// that points at `entity`. Self-referential relations yield both columns.
    pub fn join_columns(&self, entity: &str) -> Vec<(String, String)> {
        let mut columns = Vec::new();
        for schema in self.entities.values() {
            for relation in schema.relations() {
                if schema.name() == entity {
                    columns.push((relation.through.clone(), relation.source_column.clone()));
                }
                if relation.target == entity {
                    columns.push((relation.through.clone(), relation.target_column.clone()));
                }
            }
        }
        columns
    }

    /// Every table to create, join tables included.
    pub fn table_defs(&self) -> Vec<TableDef> {
        self.entities
            .values()
            .map(|schema| schema.table_def())
            .collect()
    }

    pub fn index_defs(&self) -> Vec<IndexDef> {
        let mut indexes = Vec::new();
        for schema in self.entities.values() {
            if schema.is_auto_created() {
                continue;
            }
            indexes.extend(schema.index_defs());
            for relation in schema.relations() {
                indexes.extend(relation.through_index_defs());
            }
        }
        indexes
    }
}

/// Accessor name of a reverse to-one relationship.
pub fn reverse_name(entity: &EntitySchema, reference: &Reference) -> String {
    reference
        .related_name
        .clone()
        .unwrap_or_else(|| format!("{}_set", entity.name()))
}

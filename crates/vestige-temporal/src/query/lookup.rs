//! Compiles dotted lookup paths into joins and filters into predicates.

use std::collections::BTreeMap;
use std::sync::Arc;

use vestige_core::models::{IDENTITY_COLUMN, KEY_COLUMN};
use vestige_core::query::{ColumnRef, Join, JoinKind, Predicate};
use vestige_core::schema::EntitySchema;
use vestige_core::{QueryTime, Value, VestigeError, VestigeResult};

use super::Filter;
use crate::relations::relation_time;
use crate::engine::{VersionEngine, BASE_ALIAS};

#[derive(Clone)]
struct Hop {
    alias: String,
    schema: Arc<EntitySchema>,
}

/// Join state shared by every path of one query. Hops are joined once per
/// path prefix, each restricted to the time relations of the query's rows
/// resolve at.
pub(crate) struct PathCompiler<'e> {
    engine: &'e VersionEngine,
    base: Arc<EntitySchema>,
    time: QueryTime,
    hops: BTreeMap<String, Hop>,
    joins: Vec<Join>,
    next_alias: usize,
    multi_valued: bool,
}

impl<'e> PathCompiler<'e> {
    pub fn new(engine: &'e VersionEngine, base: Arc<EntitySchema>, time: QueryTime) -> Self {
        Self {
            engine,
            base,
            time: relation_time(time),
            hops: BTreeMap::new(),
            joins: Vec::new(),
            next_alias: 1,
            multi_valued: false,
        }
    }

    /// Joins added so far, and whether any of them can repeat base rows.
    pub fn finish(self) -> (Vec<Join>, bool) {
        (self.joins, self.multi_valued)
    }

    pub fn compile(&mut self, filter: &Filter) -> VestigeResult<Predicate> {
        Ok(match filter {
            Filter::Compare { path, op, value } => {
                Predicate::compare(self.column(path)?, *op, value.clone())
            }
            Filter::IsNull { path, null: true } => Predicate::IsNull(self.column(path)?),
            Filter::IsNull { path, null: false } => Predicate::IsNotNull(self.column(path)?),
            Filter::In { path, values } => Predicate::In {
                column: self.column(path)?,
                values: values.clone(),
            },
            Filter::RefersTo { path, identity } => {
                Predicate::eq(self.column(path)?, Value::Key(*identity))
            }
            Filter::And(parts) => Predicate::all(
                parts
                    .iter()
                    .map(|part| self.compile(part))
                    .collect::<VestigeResult<Vec<_>>>()?,
            ),
            Filter::Or(parts) => Predicate::Or(
                parts
                    .iter()
                    .map(|part| self.compile(part))
                    .collect::<VestigeResult<Vec<_>>>()?,
            ),
            Filter::Not(inner) => Predicate::Not(Box::new(self.compile(inner)?)),
        })
    }

    /// Column a path ends at, joining every relationship hop on the way.
    pub fn column(&mut self, path: &str) -> VestigeResult<ColumnRef> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, hops) = segments
            .split_last()
            .ok_or_else(|| VestigeError::InvalidArgument("empty lookup path".to_string()))?;

        let mut current = Hop {
            alias: BASE_ALIAS.to_string(),
            schema: Arc::clone(&self.base),
        };
        let mut prefix = String::new();
        for segment in hops {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            current = self.hop(&prefix, &current, segment)?;
        }

        if current.schema.column_kind(last).is_some() {
            return Ok(ColumnRef::new(&current.alias, *last));
        }
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(last);
        let far = self.hop(&prefix, &current, last)?;
        Ok(ColumnRef::new(far.alias, IDENTITY_COLUMN))
    }

    fn alias(&mut self, prefix: char) -> String {
        let alias = format!("{prefix}{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn left_join(&mut self, table: &str, alias: &str, on: Predicate) {
        self.joins.push(Join {
            kind: JoinKind::Left,
            table: table.to_string(),
            alias: alias.to_string(),
            on,
        });
    }

    /// Join the relationship `segment` of `from`, reusing the join made for
    /// the same path prefix.
    fn hop(&mut self, prefix: &str, from: &Hop, segment: &str) -> VestigeResult<Hop> {
        if let Some(hop) = self.hops.get(prefix) {
            return Ok(hop.clone());
        }
        let engine = self.engine;
        let entity = from.schema.name();

        let hop = if let Some(reference) = from.schema.find_reference(segment) {
            let target = engine.schema(&reference.target)?;
            let alias = self.alias('t');
            let on = Predicate::all([
                Predicate::ColumnEq {
                    left: ColumnRef::new(&alias, IDENTITY_COLUMN),
                    right: ColumnRef::new(&from.alias, segment),
                },
                engine.temporal(&target, &alias, self.time),
            ]);
            self.left_join(target.name(), &alias, on);
            Hop { alias, schema: target }
        } else if let Some(reverse) = engine.catalog.reverse_reference(entity, segment) {
            let source = reverse.entity;
            let alias = self.alias('t');
            let on = Predicate::all([
                Predicate::ColumnEq {
                    left: ColumnRef::new(&alias, &reverse.reference.name),
                    right: ColumnRef::new(&from.alias, IDENTITY_COLUMN),
                },
                engine.temporal(&source, &alias, self.time),
            ]);
            self.left_join(source.name(), &alias, on);
            self.multi_valued = true;
            Hop { alias, schema: source }
        } else if let Some(end) = engine.catalog.relation_end(entity, segment) {
            // Join rows may name any version of either participant, so both
            // ends are matched by identity, as `related` does.
            let far = engine.schema(&end.far_entity)?;
            let near_versions = self.alias('v');
            self.left_join(
                entity,
                &near_versions,
                Predicate::ColumnEq {
                    left: ColumnRef::new(&near_versions, IDENTITY_COLUMN),
                    right: ColumnRef::new(&from.alias, IDENTITY_COLUMN),
                },
            );
            let through = self.alias('j');
            let on = Predicate::all([
                Predicate::ColumnEq {
                    left: ColumnRef::new(&through, &end.near_column),
                    right: ColumnRef::new(&near_versions, KEY_COLUMN),
                },
                Predicate::temporal(&through, self.time),
            ]);
            self.left_join(&end.through, &through, on);
            let far_versions = self.alias('k');
            self.left_join(
                far.name(),
                &far_versions,
                Predicate::ColumnEq {
                    left: ColumnRef::new(&far_versions, KEY_COLUMN),
                    right: ColumnRef::new(&through, &end.far_column),
                },
            );
            let alias = self.alias('t');
            let on = Predicate::all([
                Predicate::ColumnEq {
                    left: ColumnRef::new(&alias, IDENTITY_COLUMN),
                    right: ColumnRef::new(&far_versions, IDENTITY_COLUMN),
                },
                engine.temporal(&far, &alias, self.time),
            ]);
            self.left_join(far.name(), &alias, on);
            self.multi_valued = true;
            Hop { alias, schema: far }
        } else {
            return Err(VestigeError::UnknownField {
                entity: entity.to_string(),
                field: segment.to_string(),
            });
        };

        self.hops.insert(prefix.to_string(), hop.clone());
        Ok(hop)
    }
}

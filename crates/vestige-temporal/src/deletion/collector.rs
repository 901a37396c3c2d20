//! Walks reverse references from the rows being deleted and plans the
//! cascade before anything is written.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::trace;

use vestige_core::query::{ColumnRef, Predicate};
use vestige_core::{OnDelete, QueryTime, Value, VersionKey, VersionRow, VestigeError, VestigeResult};

use crate::engine::{VersionEngine, BASE_ALIAS};

/// Identifies an object across its versions.
pub(crate) type ObjectId = (String, VersionKey);

pub(crate) fn object_id(row: &VersionRow) -> ObjectId {
    (row.entity().to_string(), row.identity())
}

/// A reference of a surviving row that must change because its target goes.
#[derive(Debug)]
pub(crate) struct FieldUpdate {
    pub reference: String,
    pub value: Value,
}

#[derive(Debug)]
struct ProtectedHit {
    target: ObjectId,
    referrer: ObjectId,
    referrer_entity: String,
    reference: String,
}

/// Everything one delete will do, in collection order.
#[derive(Debug, Default)]
pub(crate) struct DeletePlan {
    pub deletes: Vec<VersionRow>,
    /// Referencing rows to rewrite, keyed by object, with their pending
    /// reference changes.
    pub updates: BTreeMap<ObjectId, (VersionRow, Vec<FieldUpdate>)>,
}

pub(crate) struct Collector<'e> {
    engine: &'e VersionEngine,
    seen: BTreeSet<ObjectId>,
    plan: DeletePlan,
    protected: Vec<ProtectedHit>,
}

impl<'e> Collector<'e> {
    pub fn new(engine: &'e VersionEngine) -> Self {
        Self {
            engine,
            seen: BTreeSet::new(),
            plan: DeletePlan::default(),
            protected: Vec::new(),
        }
    }

    /// Collect `roots` and everything that cascades from them.
    ///
    /// Fails with `ProtectedReference` when a row outside the delete set
    /// protects one inside it.
    pub fn collect(mut self, roots: Vec<VersionRow>) -> VestigeResult<DeletePlan> {
        let mut queue = VecDeque::new();
        for root in roots {
            if self.seen.insert(object_id(&root)) {
                queue.push_back(root);
            }
        }
        while let Some(row) = queue.pop_front() {
            self.visit(&row, &mut queue)?;
            self.plan.deletes.push(row);
        }

        if let Some(hit) = self
            .protected
            .iter()
            .find(|hit| !self.seen.contains(&hit.referrer))
        {
            return Err(VestigeError::ProtectedReference {
                entity: hit.target.0.clone(),
                identity: hit.target.1.to_string(),
                referrer: hit.referrer_entity.clone(),
                reference: hit.reference.clone(),
            });
        }
        let seen = &self.seen;
        self.plan.updates.retain(|id, _| !seen.contains(id));
        Ok(self.plan)
    }

    fn visit(&mut self, row: &VersionRow, queue: &mut VecDeque<VersionRow>) -> VestigeResult<()> {
        for reverse in self.engine.catalog.referencing(row.entity()) {
            let schema = &reverse.entity;
            let name = &reverse.reference.name;
            if matches!(reverse.reference.on_delete, OnDelete::NoAction) {
                continue;
            }
            let select = self
                .engine
                .base_select(schema, None)?
                .filter(Predicate::eq(ColumnRef::new(BASE_ALIAS, name), row.identity()))
                .filter(self.engine.temporal(schema, BASE_ALIAS, QueryTime::Current));
            let referrers = self
                .engine
                .fetch_rows(schema, &select, QueryTime::Current, false)?;
            trace!(
                entity = row.entity(),
                referrer = schema.name(),
                reference = %name,
                found = referrers.len(),
                "collecting"
            );

            for referrer in referrers {
                let id = object_id(&referrer);
                match &reverse.reference.on_delete {
                    OnDelete::Cascade => {
                        if self.seen.insert(id) {
                            queue.push_back(referrer);
                        }
                    }
                    OnDelete::Protect => self.protected.push(ProtectedHit {
                        target: object_id(row),
                        referrer: id,
                        referrer_entity: schema.name().to_string(),
                        reference: name.clone(),
                    }),
                    OnDelete::SetNull => self.update(referrer, name, Value::Null),
                    OnDelete::SetDefault(default) => {
                        self.update(referrer, name, default.resolve())
                    }
                    OnDelete::NoAction => {}
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, referrer: VersionRow, reference: &str, value: Value) {
        let change = FieldUpdate {
            reference: reference.to_string(),
            value,
        };
        self.plan
            .updates
            .entry(object_id(&referrer))
            .or_insert_with(|| (referrer, Vec::new()))
            .1
            .push(change);
    }
}

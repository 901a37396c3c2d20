//! Pluggable behaviour around soft deletes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use vestige_core::{VersionRow, VestigeError, VestigeResult};

use crate::engine::VersionEngine;
use crate::mutation::terminate::terminate;

/// Hooks invoked by the deletion collector for every versioned row it
/// terminates. Rows of auto-created join tables skip `pre_delete` and
/// `post_delete`.
pub trait ICollectorHooks: Send + Sync {
    fn pre_delete(&self, _row: &VersionRow, _at: DateTime<Utc>) -> VestigeResult<()> {
        Ok(())
    }

    fn post_delete(&self, _row: &VersionRow, _at: DateTime<Utc>) -> VestigeResult<()> {
        Ok(())
    }

    /// Close `row` at `at`. The default is the compare-and-swap termination.
    fn terminate(
        &self,
        engine: &VersionEngine,
        row: &mut VersionRow,
        at: DateTime<Utc>,
    ) -> VestigeResult<()> {
        let schema = engine.versioned_schema(row.entity(), "terminate")?;
        terminate(engine, &schema, row, at)
    }
}

/// Hooks that only terminate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCollectorHooks;

impl ICollectorHooks for DefaultCollectorHooks {}

type HookFactory = Arc<dyn Fn() -> Arc<dyn ICollectorHooks> + Send + Sync>;

/// Named collector hook implementations.
///
/// Factories are resolved once per key and cached; registering a key again
/// replaces its factory and drops the cached instance.
pub struct CollectorRegistry {
    factories: DashMap<String, HookFactory>,
    resolved: DashMap<String, Arc<dyn ICollectorHooks>>,
}

pub const DEFAULT_COLLECTOR: &str = "default";

impl CollectorRegistry {
    /// A registry without any entry, not even the default.
    pub fn empty() -> Self {
        Self {
            factories: DashMap::new(),
            resolved: DashMap::new(),
        }
    }

    pub fn register<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ICollectorHooks> + Send + Sync + 'static,
    {
        let key = key.into();
        self.resolved.remove(&key);
        debug!(collector = %key, "collector hooks registered");
        self.factories.insert(key, Arc::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn resolve(&self, key: &str) -> VestigeResult<Arc<dyn ICollectorHooks>> {
        if let Some(hooks) = self.resolved.get(key) {
            return Ok(Arc::clone(hooks.value()));
        }
        let factory = self
            .factories
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| VestigeError::Config(format!("unknown collector `{key}`")))?;
        let hooks = factory();
        self.resolved.insert(key.to_string(), Arc::clone(&hooks));
        Ok(hooks)
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.register(DEFAULT_COLLECTOR, || Arc::new(DefaultCollectorHooks));
        registry
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        f.debug_struct("CollectorRegistry").field("keys", &keys).finish()
    }
}

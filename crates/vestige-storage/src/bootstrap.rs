//! Schema bootstrap: tables and indexes for every entity in a catalog.

use tracing::{debug, info, warn};

use vestige_core::schema::{Catalog, IndexDef};
use vestige_core::traits::IVersionStorage;
use vestige_core::VestigeResult;

/// Create every table and any missing index inside one transaction.
/// Returns the number of indexes created; 0 when the schema is up to date.
pub fn ensure_schema(storage: &dyn IVersionStorage, catalog: &Catalog) -> VestigeResult<usize> {
    storage.begin()?;
    match create_all(storage, catalog) {
        Ok(created) => {
            storage.commit()?;
            if created == 0 {
                debug!("schema is up to date");
            } else {
                info!(indexes = created, "schema bootstrapped");
            }
            Ok(created)
        }
        Err(e) => {
            warn!("schema bootstrap failed: {e}, rolling back");
            storage.rollback()?;
            Err(e)
        }
    }
}

fn create_all(storage: &dyn IVersionStorage, catalog: &Catalog) -> VestigeResult<usize> {
    for table in catalog.table_defs() {
        storage.create_table(&table)?;
    }
    let mut created = 0;
    for index in catalog.index_defs() {
        if create_index_if_missing(storage, &index)? {
            created += 1;
        }
    }
    Ok(created)
}

/// Returns whether the index had to be created.
pub fn create_index_if_missing(
    storage: &dyn IVersionStorage,
    index: &IndexDef,
) -> VestigeResult<bool> {
    if storage.index_exists(&index.name)? {
        return Ok(false);
    }
    storage.create_index(index)?;
    Ok(true)
}

/// Names of catalog indexes not present in storage.
pub fn missing_indexes(storage: &dyn IVersionStorage, catalog: &Catalog) -> VestigeResult<Vec<String>> {
    let mut missing = Vec::new();
    for index in catalog.index_defs() {
        if !storage.index_exists(&index.name)? {
            missing.push(index.name);
        }
    }
    Ok(missing)
}

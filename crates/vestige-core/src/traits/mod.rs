mod version_storage;

pub use version_storage::{IVersionStorage, Record};

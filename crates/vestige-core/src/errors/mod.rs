mod storage_error;
mod vestige_error;

pub use storage_error::StorageError;
pub use vestige_error::{VestigeError, VestigeResult};

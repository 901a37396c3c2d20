//! Data model: identifiers, values, query time and version rows.

mod identifier;
mod query_time;
mod value;
mod version_row;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

pub use identifier::VersionKey;
pub use query_time::QueryTime;
pub use value::{Value, ValueKind};
pub use version_row::{RowParts, VersionRow};

/// Names of the bookkeeping columns every version row carries.
pub const KEY_COLUMN: &str = "id";
pub const IDENTITY_COLUMN: &str = "identity";
pub const VALID_FROM_COLUMN: &str = "valid_from";
pub const VALID_UNTIL_COLUMN: &str = "valid_until";
pub const BORN_AT_COLUMN: &str = "born_at";

/// All bookkeeping columns, in table order.
pub const VERSION_COLUMNS: [&str; 5] = [
    KEY_COLUMN,
    IDENTITY_COLUMN,
    VALID_FROM_COLUMN,
    VALID_UNTIL_COLUMN,
    BORN_AT_COLUMN,
];

/// Current UTC time at storage precision (microseconds).
pub fn now() -> DateTime<Utc> {
    normalize_timestamp(Utc::now())
}

/// Truncate a timestamp to the precision timestamps are persisted with.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 rendering; lexical order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

mod constants;
mod snapshot;

pub mod kills;
pub mod record;
pub mod respawn;
pub mod schema;

pub use constants::*;
pub use kills::KillTracker;
pub use record::{Decoded, RecordDecoder, parse_record};
pub use respawn::RespawnEstimator;
pub use schema::{ColumnMap, DEFAULT_COLUMNS, detect_schema, is_header_row, split_record};
pub use snapshot::*;

mod database;

pub use database::{blocking, format_timestamp, parse_timestamp, Database, Result, StorageError};

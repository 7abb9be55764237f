// Postgres storage layer with sqlx
//
// Owns the fixed-size connection pool, the idempotent schema bootstrap, and
// the repository methods the api and notify crates run their queries through.

pub mod config;
pub mod models;
pub mod repositories;
mod schema;

pub use config::StorageConfig;
pub use models::*;
pub use repositories::Database;

//! LinkNest database layer.
//!
//! Provides SQLite connection management and schema migrations for the
//! self-hosted bookmark store.
//!
//! ```no_run
//! use linknest::database::Database;
//!
//! let db = Database::open("linknest.db").expect("failed to open database");
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;

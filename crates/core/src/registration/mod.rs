//! Registration storage: the read-only work source and the final flag update.
//!
//! Every logical query opens its own short-lived connection through
//! [`Database`]; no connection is held across an external process or a
//! network call.

mod config;
mod database;
mod error;
pub mod schema;
mod sqlite;
mod traits;
mod types;

pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{PersistenceError, RegistrationError};
pub use sqlite::{SqliteRegistrationSource, SqliteStateTransitioner};
pub use traits::{query_source, RegistrationSource, StateTransitioner};
pub use types::{ItemType, ProcessingFlag, RegistrationKey};

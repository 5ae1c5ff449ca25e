//! SQLite backend for feedstash.
//!
//! - [`SqliteStore`]: the item repository. Opens a connection per logical
//!   operation, so the database file is never held open between calls.
//! - [`MigrationManager`]: applies ordered SQL migration scripts with a
//!   backup taken before each one.
//! - [`SqliteIndex`]: a similarity-search index persisted in its own SQLite
//!   file, with embeddings supplied by an [`Embedder`](feedstash_core::index::Embedder).
//!
//! All database access goes through [`tokio_rusqlite`] so it runs on a
//! dedicated thread without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod index;
pub mod migrate;

pub use error::{Error, Result};
pub use index::SqliteIndex;
pub use migrate::{Migration, MigrationManager, MigrationReport};
pub use store::SqliteStore;

//! SQLite driver for the Warden document store.
//!
//! Each collection is a table of JSON documents. Filters are compiled to
//! SQLite JSON1 expressions. All database access runs on the dedicated
//! thread owned by [`tokio_rusqlite`] so the async runtime never blocks.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{IN_MEMORY, SqliteDocStore};

#[cfg(test)]
mod tests;

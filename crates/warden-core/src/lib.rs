//! Core types and trait definitions for the Warden account service.
//!
//! No HTTP or database code lives here. Storage drivers implement
//! [`store::DocumentStore`]; the account service builds on the types in
//! [`account`] and [`credential`].

// Drivers implement the store trait with `async fn`; the trait itself spells
// out the `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod credential;
pub mod document;
pub mod error;
pub mod store;

pub use error::{Error, Result};

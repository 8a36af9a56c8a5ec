//! The Warden account service.
//!
//! [`repo::Accounts`] implements registration, edit, lookup and deletion on
//! top of any [`warden_core::store::DocumentStore`]. [`session::Sessions`]
//! handles login and token verification. [`driver::create_and_connect`]
//! builds the driver named in configuration.

#![allow(async_fn_in_trait)]

pub mod address;
pub mod driver;
pub mod error;
pub mod repo;
pub mod session;
pub mod token;

pub use error::{Error, ErrorKind, Result};

#[cfg(test)]
mod tests;

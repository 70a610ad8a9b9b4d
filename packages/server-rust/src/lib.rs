//! Event board server: request pipeline, storage, and HTTP surface for the
//! event listing API.

pub mod auth;
pub mod network;
pub mod observability;
pub mod service;
pub mod storage;
pub mod traits;

pub use traits::{DataStore, IdentityProvider};

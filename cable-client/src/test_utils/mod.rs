//! Test utilities and helpers
//!
//! Fixtures, async helpers and an in-memory store shared by the unit tests,
//! the integration tests and the benches.

pub mod async_helpers;
pub mod fixtures;
pub mod mock_store;

pub use async_helpers::*;
pub use fixtures::*;
pub use mock_store::*;

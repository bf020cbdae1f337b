//! Storage gateway for the vindex worker.
//!
//! A narrow, typed set of operations over a pooled Postgres connection:
//! atomic job claiming, conflict-tolerant bulk inserts, embedding updates
//! and the read-only projections behind the health view.

pub mod error;
pub mod gateway;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use gateway::PgGateway;
pub use traits::{JobSource, Storage};

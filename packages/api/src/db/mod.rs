//! # PostgreSQL persistence
//!
//! The pool is opened once by the binary with [`connect`], migrated with
//! [`migrate`], and wrapped in a [`PgStore`] that implements every store
//! trait from the `store` crate. Handlers only ever see `Arc<dyn Store>`.

mod pg;
mod pool;

pub use pg::PgStore;
pub use pool::{connect, migrate};

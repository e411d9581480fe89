//! Core data structures shared by the validator and the loader
//!
//! A [`Batch`] is an ordered sequence of [`Record`]s, each mapping column
//! names to typed [`Value`]s. Entities are identified by a business [`Key`]
//! built from one or more key columns.

pub mod record;
pub mod value;

pub use record::{Batch, BatchReadError, Key, Record, RowRef};
pub use value::Value;

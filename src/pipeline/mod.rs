//! Pipeline orchestration
//!
//! Orders entities so referenced tables load first, validates each batch
//! within a shared reference scope and loads it with bounded retries.

pub mod error;
pub mod executor;
pub mod plan;
pub mod retry;

pub use error::PipelineError;
pub use executor::{EntityReport, PipelineExecutor, PipelineReport};
pub use plan::{load_order, order_entities};
pub use retry::RetryPolicy;

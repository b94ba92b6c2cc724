//! crisiswire Runtime
//!
//! Wires the core model to a store and to collectors:
//! - **IngestionPipeline**: validate, sanitize, assign an id, commit
//! - **VoteAggregator**: per-record serialized vote updates with audit entries
//! - **Core**: the facade callers hold, with an explicit close
//! - **Harvester**: runs collectors on an interval and forwards what they find

pub mod aggregator;
pub mod error;
pub mod facade;
pub mod harvester;
pub mod pipeline;

pub use aggregator::*;
pub use error::*;
pub use facade::*;
pub use harvester::*;
pub use pipeline::*;

use std::future::Future;
use std::time::Duration;

use crisiswire_store::StoreError;

/// Run a store call under a deadline
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
    }
}

//! crisiswire Collectors
//!
//! Independent signal collectors and the path from them into the core:
//! - **FeedCollector**: pulls JSON feeds of raw crisis signals
//! - **PageCollector**: scrapes individual report pages
//! - **classify**: keyword classifier for category and severity
//! - **Forwarder**: sanitizes candidates and submits them one by one to an
//!   [`IngestTarget`] with a bounded per-item timeout

pub mod classify;
pub mod feed;
pub mod forwarder;
pub mod http;
pub mod page;
pub mod traits;

pub use classify::*;
pub use feed::*;
pub use forwarder::*;
pub use http::*;
pub use page::*;
pub use traits::*;

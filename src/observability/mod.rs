//! Observability for store operations
//!
//! - Structured `tracing` events named by `Event`
//! - Monotonic operation counters in `StoreMetrics`
//! - Subscriber setup for binaries
//!
//! # Usage
//!
//! ```ignore
//! use docmodel::observability::{init_logging, Event, LogFormat, StoreMetrics};
//!
//! init_logging(LogFormat::Json);
//! tracing::debug!(event = %Event::DocumentRead, id = "abc");
//!
//! let metrics = StoreMetrics::new();
//! metrics.increment_reads();
//! ```

mod events;
mod logging;
mod metrics;

pub use events::Event;
pub use logging::{init_logging, LogFormat};
pub use metrics::{MetricsSnapshot, StoreMetrics};

//! # Metrics / Event Logger
//!
//! Append-only event log of cache and upstream activity, process-lifetime counters,
//! and metrics derived on demand from the log and the store.
//!
//! Counters are monotonically increasing for the lifetime of the process; there is
//! no reset operation.

pub mod collector;
pub mod event_log;
pub mod events;

pub use collector::{CacheMetrics, MetricsCollector, MetricsSummary};
pub use event_log::{EventLog, EventLogError, FileEventLog, MemoryEventLog};
pub use events::{CacheEvent, CacheEventType};

//! SignalTap collector runtime
//!
//! Wires the content selector, engagement tracker and dispatcher into a single-task collector
//! and replays recorded page sessions through it.

pub mod collector;
pub mod config;
pub mod errors;
pub mod trace;

pub use collector::{Collector, CollectorHandle, CollectorReport, HostEvent, Page, PageClock};
pub use config::{load_config, CollectorConfig, LoadedConfig};
pub use errors::{CollectorError, ConfigError, TraceError};
pub use trace::{CompiledTrace, Trace, TraceAction, TraceEvent};

//! Batching and delivery of engagement snapshots.
//!
//! Snapshots are queued by the [`Dispatcher`], merged by content at flush time ([`Merger`]),
//! filtered by an engagement floor, and posted to the collector through a [`Transport`], or handed
//! off as a beacon when the page is going away.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod identity;
pub mod merge;
pub mod metrics;
pub mod payload;
pub mod transport;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, FlushMode, FlushOutcome};
pub use errors::{DispatchError, TransportError};
pub use identity::{IdentityProvider, StaticIdentity};
pub use merge::{MergedBatch, Merger};
pub use metrics::DispatchMetrics;
pub use payload::{IdRef, SelectedText, SignalBatch, WireElement};
pub use transport::{Delivery, DeliveryMode, HttpTransport, MemoryTransport, Transport};

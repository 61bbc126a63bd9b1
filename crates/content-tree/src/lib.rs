//! Content selection for the SignalTap collector.
//!
//! Decides which elements of a host document represent meaningful content. The host tree is
//! reached only through [`DomView`]; [`ArenaDocument`] is the in-memory implementation used by
//! trace replay and tests.

pub mod classify;
pub mod config;
pub mod dom;
pub mod errors;
pub mod extract;
pub mod selector;

pub use classify::{classify, direct_text, label_text, Classification};
pub use config::ContentConfig;
pub use dom::{ArenaDocument, DomView, ElementSpec, NodeKind, NodeSpec};
pub use errors::DomError;
pub use extract::{collapse_whitespace, extract_content};
pub use selector::{Candidate, ContentSelector, ProcessedMarkers, Viewport};

use signaltap_core_types::NodeId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomError {
    #[error("document root must be an element")]
    RootNotElement,
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("{0} is not an element")]
    NotAnElement(NodeId),
    #[error("cannot detach the document root")]
    DetachRoot,
}

//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Structural violations of the tree model.
///
/// These are contract violations by the caller; the offending operation
/// never applies partially.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperation {
    #[error("node does not allow children")]
    ChildrenNotAllowed,

    #[error("node would become its own ancestor")]
    WouldCycle,

    #[error("root node cannot be attached to a parent")]
    RootCannotBeChild,

    #[error("node is still attached to another parent")]
    AlreadyAttached,

    #[error("node is not part of this tree")]
    NodeNotFound,
}

/// Domain errors represent tree model violations.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] InvalidOperation),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

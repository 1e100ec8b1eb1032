//! Error Types
//!
//! This module defines the error type returned by every fallible graph
//! operation.
//!
//! # Overview
//!
//! [`GraphError`] covers the local, recoverable failure modes of the slot graph:
//! - Name lookups and name collisions in components
//! - Writes to read-only (connected or procedural) slots
//! - Out-of-range array access
//! - Resize requests rejected by a downstream dependent
//! - Registration bookkeeping of dependents and size constraints
//!
//! No error leaves the graph half-mutated: a failing operation restores the
//! sizes, values and validity flags it touched before the error reaches the
//! caller.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth::errors::{GraphError, Result};
//!
//! fn scale_of(graph: &mut SlotGraph, obj: &WorldObject) -> Result<DVec3> {
//!     graph.get(obj.transform.scale)
//! }
//! ```

use thiserror::Error;

/// The error type of the slot graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    // ========================================================================
    // Naming
    // ========================================================================
    /// A slot or attribute name was not found, or collides with an existing one.
    #[error("Key error: {0}")]
    Key(String),

    // ========================================================================
    // Access
    // ========================================================================
    /// Write to a connected or read-only slot, direct resize of a constrained
    /// array, disallowed (re)connection and similar misuse.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Out-of-range array element access.
    #[error("Index out of range: {context} (index: {index}, len: {len})")]
    Index {
        /// Description of what was being accessed
        context: String,
        /// The first offending index
        index: usize,
        /// Number of items available
        len: usize,
    },

    /// A typed handle was used with a slot holding a different payload type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The payload type requested by the caller
        expected: &'static str,
        /// The payload type stored in the slot
        found: &'static str,
    },

    // ========================================================================
    // Resizing
    // ========================================================================
    /// A resize was rejected by a downstream size constraint or dependent.
    #[error("Resize to {size} items was vetoed")]
    Vetoed {
        /// The rejected size
        size: usize,
    },

    // ========================================================================
    // Bookkeeping
    // ========================================================================
    /// A dependent, slot or constraint registration already exists.
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// A handle, dependent or registration does not exist (anymore).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A dependency cycle was detected.
    #[error("Dependency cycle: {0}")]
    Cycle(String),

    // ========================================================================
    // Consumers
    // ========================================================================
    /// The requested operation has no implementation for this target.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Flat discriminant of [`GraphError`].
///
/// Host bindings map this onto their own exception hierarchy without matching
/// on the payload of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Key,
    InvalidOperation,
    Index,
    TypeMismatch,
    Vetoed,
    AlreadyRegistered,
    NotFound,
    Cycle,
    NotImplemented,
}

impl GraphError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Key(_) => ErrorKind::Key,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::Index { .. } => ErrorKind::Index,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Vetoed { .. } => ErrorKind::Vetoed,
            Self::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cycle(_) => ErrorKind::Cycle,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }

    pub(crate) fn key(msg: impl Into<String>) -> Self {
        Self::Key(msg.into())
    }
}

// ============================================================================
// Shorthand constructors
// ============================================================================

impl GraphError {
    /// Shorthand for [`GraphError::InvalidOperation`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Shorthand for [`GraphError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Shorthand for [`GraphError::Key`] naming a missing slot.
    pub fn missing_slot(name: &str) -> Self {
        Self::key(format!("Slot \"{name}\" does not exist."))
    }

    /// Shorthand for [`GraphError::Key`] naming a duplicate slot.
    pub fn duplicate_slot(name: &str) -> Self {
        Self::key(format!("Slot \"{name}\" already exists."))
    }
}

/// Alias for `Result<T, GraphError>`.
pub type Result<T> = std::result::Result<T, GraphError>;

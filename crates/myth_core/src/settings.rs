//! Graph Settings
//!
//! Creation-time configuration of a slot graph.
//!
//! ```rust,ignore
//! use myth::{GraphSettings, SlotGraph};
//!
//! // Defaults: cycle detection on, no per-notification tracing
//! let graph = SlotGraph::new();
//!
//! // Large generated graphs whose producers guarantee acyclicity
//! let graph = SlotGraph::with_settings(GraphSettings {
//!     detect_cycles: false,
//!     ..Default::default()
//! });
//! ```

/// Configuration for a `SlotGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSettings {
    /// Reject `connect`, `add_dependent` and `register_slot` calls that would
    /// close a dependency cycle.
    ///
    /// Link operations walk the downstream graph, so very large graphs built
    /// by trusted code may switch this off. Re-entrant evaluation of a
    /// procedural slot is always reported as [`GraphError::Cycle`](crate::GraphError::Cycle)
    /// regardless of this flag.
    pub detect_cycles: bool,

    /// Emit a `log::trace!` line for every delivered notification.
    pub trace_notifications: bool,
}

impl Default for GraphSettings {
    #[inline]
    fn default() -> Self {
        Self {
            detect_cycles: true,
            trace_notifications: false,
        }
    }
}

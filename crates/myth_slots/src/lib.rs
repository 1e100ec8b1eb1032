//! Myth Slots
//!
//! The reactive attribute graph. Scene entities expose their attributes as
//! slots living in a [`SlotGraph`]:
//!
//! - [`Slot`]: one typed value, stored, connected to a controller, or
//!   computed on demand by a [`Procedure`]
//! - [`ArraySlot`]: a resizable sequence of items whose size may be tied to
//!   other arrays through size constraints
//! - [`Dependent`]: the observer protocol every notification goes through
//! - [`Component`]: a named registry of slots
//!
//! # Example
//!
//! ```rust,ignore
//! use myth_slots::{FnProcedure, SlotGraph};
//!
//! let mut graph = SlotGraph::new();
//! let width = graph.add_slot(2.0_f64);
//! let height = graph.add_slot(3.0_f64);
//! let area = graph.add_procedural(FnProcedure::new(move |g| {
//!     Ok(g.get(width)? * g.get(height)?)
//! }));
//! graph.add_dependent(width, area)?;
//! graph.add_dependent(height, area)?;
//!
//! assert_eq!(graph.get(area)?, 6.0);
//! graph.set(width, 4.0)?;
//! assert_eq!(graph.get(area)?, 12.0);
//! ```

pub mod array;
pub mod component;
pub mod constraint;
pub mod dependent;
pub mod graph;
pub mod handle;
mod notify;
pub mod procedural;
pub mod storage;

pub use component::{Component, SlotOwnership};
pub use constraint::SizeConstraintKind;
pub use dependent::{Dependent, DependentId, Forwarder};
pub use graph::{ConnectionPolicy, SlotGraph};
pub use handle::{AnySlot, ArraySlot, Slot, SlotHandle};
pub use procedural::{FnProcedure, Procedure};
pub use storage::{ArrayValue, SlotValue};

pub use myth_core::{
    ComponentKey, ConstraintKey, ErrorKind, GraphError, GraphSettings, ObserverKey, Result,
    SlotKey,
};

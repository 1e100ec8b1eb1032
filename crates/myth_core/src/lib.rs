//! Myth Core
//!
//! Foundational types shared by every crate of the slot graph:
//!
//! - [`errors`]: the [`GraphError`] taxonomy and the crate-wide [`Result`] alias
//! - [`keys`]: generational arena keys for slots, constraints, observers and components
//! - [`settings`]: [`GraphSettings`], the knobs a graph is created with

pub mod errors;
pub mod keys;
pub mod settings;

pub use errors::{ErrorKind, GraphError, Result};
pub use keys::{ComponentKey, ConstraintKey, ObserverKey, SlotKey};
pub use settings::GraphSettings;

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Myth
//!
//! A reactive attribute graph for scene description. Entities expose typed,
//! named attributes ("slots") that are stored, mirrored from another slot, or
//! computed lazily from other slots, with array slots whose sizes are
//! negotiated through size constraints.
//!
//! - [`slots`]: the graph itself
//! - [`scene`]: transforms, world objects and geometry built on it
//! - [`errors`]: the error taxonomy shared by both
//!
//! ```rust,ignore
//! use myth::prelude::*;
//!
//! let mut graph = SlotGraph::new();
//! let obj = WorldObject::new(&mut graph, "cube")?;
//! graph.set(obj.transform.pos, DVec3::new(1.0, 0.0, 0.0))?;
//! let world = graph.get(obj.worldtransform)?;
//! ```

pub use myth_core::{errors, settings};
pub use myth_scene as scene;
pub use myth_slots as slots;

pub use glam;

pub use myth_core::{ErrorKind, GraphError, GraphSettings, Result};
pub use myth_scene::{
    BoundingBox, GeomObject, PrimVarInfo, TransformGroup, TriMesh, VarStorage, VarType,
    WorldObject,
};
pub use myth_slots::{
    ArraySlot, Component, ConnectionPolicy, Dependent, DependentId, FnProcedure, Forwarder,
    Procedure, SizeConstraintKind, Slot, SlotGraph, SlotHandle, SlotOwnership,
};

/// Everything needed to build and query a scene graph.
pub mod prelude {
    pub use glam::{DMat3, DMat4, DVec3, DVec4};

    pub use crate::{
        ArraySlot, BoundingBox, ConnectionPolicy, Dependent, FnProcedure, Forwarder, GeomObject,
        GraphError, Result, Slot, SlotGraph, SlotHandle, TransformGroup, TriMesh, VarStorage,
        VarType, WorldObject,
    };
}

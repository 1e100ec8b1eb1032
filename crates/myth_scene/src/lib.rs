//! Myth Scene
//!
//! Scene objects whose attributes live in a [`SlotGraph`](myth_slots::SlotGraph):
//!
//! - [`TransformGroup`]: a local matrix kept consistent with its position,
//!   rotation and scale parts
//! - [`WorldObject`]: parenting, world transform and mass attributes
//! - [`GeomObject`]: primitive variables sized by the geometry's topology
//! - [`TriMesh`]: a triangle mesh with cached bounds and mass properties

pub mod bounding_box;
pub mod geometry;
pub mod transform;
pub mod trimesh;
pub mod world_object;

pub use bounding_box::BoundingBox;
pub use geometry::{GeomObject, PrimVarInfo, PrimVars, VarStorage, VarType};
pub use transform::{TransformGroup, compose_trs};
pub use trimesh::{MassProperties, TriMesh, mass_properties};
pub use world_object::WorldObject;

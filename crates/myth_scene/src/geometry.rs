//! Geometry & Primitive Variables
//!
//! A primitive variable is a named, typed array attached to a geometry, with
//! one entry per element of some storage class (one per face, one per vertex,
//! one per face corner, ...). Its size is tied to the geometry's topology
//! through a size constraint, so resizing the vertex array resizes every
//! per-vertex variable along with it.

use glam::{DMat4, DVec3, DVec4};
use rustc_hash::FxHashMap;

use myth_core::{ComponentKey, ConstraintKey, GraphError, Result};
use myth_slots::{AnySlot, ArraySlot, ArrayValue, SlotGraph};

use crate::bounding_box::BoundingBox;

/// How many entries a primitive variable holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarStorage {
    /// Exactly one entry.
    Constant,
    /// One entry per face.
    Uniform,
    /// One entry per vertex, interpolated.
    Varying,
    /// One entry per vertex, interpolated like the geometry itself.
    Vertex,
    /// One entry per face corner.
    FaceVarying,
    /// One entry per face corner, interpolated like the geometry itself.
    FaceVertex,
    /// Caller-chosen size, unconstrained.
    User,
}

/// Element type of a primitive variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Int,
    Float,
    String,
    Color,
    Point,
    Vector,
    Normal,
    Matrix,
    HPoint,
}

impl VarType {
    /// Creates an array slot of the matching Rust element type:
    ///
    /// | VarType                          | element  |
    /// |----------------------------------|----------|
    /// | Int                              | `i32`    |
    /// | Float                            | `f64`    |
    /// | String                           | `String` |
    /// | Color, Point, Vector, Normal     | `DVec3`  |
    /// | HPoint                           | `DVec4`  |
    /// | Matrix                           | `DMat4`  |
    fn create_array(
        self,
        graph: &mut SlotGraph,
        multiplicity: usize,
        constraint: Option<ConstraintKey>,
    ) -> Result<AnySlot> {
        fn make<T: ArrayValue>(
            graph: &mut SlotGraph,
            multiplicity: usize,
            constraint: Option<ConstraintKey>,
        ) -> Result<AnySlot> {
            let slot = match constraint {
                Some(constraint) => graph.add_array_with_constraint::<T>(multiplicity, constraint)?,
                None => graph.add_array::<T>(multiplicity)?,
            };
            Ok(slot.key())
        }

        match self {
            Self::Int => make::<i32>(graph, multiplicity, constraint),
            Self::Float => make::<f64>(graph, multiplicity, constraint),
            Self::String => make::<String>(graph, multiplicity, constraint),
            Self::Color | Self::Point | Self::Vector | Self::Normal => {
                make::<DVec3>(graph, multiplicity, constraint)
            }
            Self::HPoint => make::<DVec4>(graph, multiplicity, constraint),
            Self::Matrix => make::<DMat4>(graph, multiplicity, constraint),
        }
    }
}

/// Descriptor of one primitive variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimVarInfo {
    pub storage: VarStorage,
    pub ty: VarType,
    pub multiplicity: usize,
    pub slot: AnySlot,
}

impl PrimVarInfo {
    /// Typed handle of the variable's array slot.
    pub fn array<T: ArrayValue>(&self, graph: &SlotGraph) -> Result<ArraySlot<T>> {
        graph.typed_array(self.slot)
    }
}

/// Primitive variable registry of one geometry.
#[derive(Debug, Default)]
pub struct PrimVars {
    vars: FxHashMap<String, PrimVarInfo>,
}

impl PrimVars {
    pub fn get(&self, name: &str) -> Option<&PrimVarInfo> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrimVarInfo)> {
        let mut vars: Vec<_> = self.vars.iter().map(|(k, v)| (k.as_str(), v)).collect();
        vars.sort_unstable_by_key(|(name, _)| *name);
        vars.into_iter()
    }
}

/// A geometry: a component whose primitive variables track its topology.
///
/// Implementors supply the component, the registry and the size constraint
/// of each topological storage class; variable management comes for free.
pub trait GeomObject {
    fn component(&self) -> ComponentKey;
    fn prim_vars(&self) -> &PrimVars;
    fn prim_vars_mut(&mut self) -> &mut PrimVars;

    /// Constraint sizing variables of the given storage class. Never asked
    /// for `Constant` or `User`.
    ///
    /// The default allows no entries at all.
    fn slot_size_constraint(&self, graph: &mut SlotGraph, storage: VarStorage) -> ConstraintKey {
        let _ = storage;
        graph.fixed_size_constraint(0)
    }

    fn bounding_box(&self, graph: &SlotGraph) -> Result<BoundingBox>;

    /// Converts this geometry into `target`.
    fn convert(&self, graph: &mut SlotGraph, target: &mut dyn GeomObject) -> Result<()> {
        let _ = (graph, target);
        Err(GraphError::NotImplemented("geometry conversion".into()))
    }

    /// Number of entries a variable of the storage class holds; `None` for
    /// `User`.
    fn count(&self, graph: &mut SlotGraph, storage: VarStorage) -> Option<usize> {
        match storage {
            VarStorage::Constant => Some(1),
            VarStorage::User => None,
            _ => {
                let constraint = self.slot_size_constraint(graph, storage);
                graph.constraint_size(constraint).ok()
            }
        }
    }

    /// Creates a primitive variable and adds its slot to the component.
    ///
    /// `user_n` is the initial size of a `User` variable and ignored
    /// otherwise. Fails with `Key` if the name is taken.
    fn new_variable(
        &mut self,
        graph: &mut SlotGraph,
        name: &str,
        storage: VarStorage,
        ty: VarType,
        multiplicity: usize,
        user_n: usize,
    ) -> Result<AnySlot> {
        let component = self.component();
        if self.prim_vars().contains(name) || graph.component(component)?.has_slot(name) {
            return Err(GraphError::duplicate_slot(name));
        }

        let constraint = match storage {
            VarStorage::Constant => Some(graph.fixed_size_constraint(1)),
            VarStorage::User => None,
            _ => Some(self.slot_size_constraint(graph, storage)),
        };
        let slot = ty.create_array(graph, multiplicity, constraint)?;

        let attached = if storage == VarStorage::User {
            graph.resize(slot, user_n)
        } else {
            Ok(())
        }
        .and_then(|()| graph.add_owned_slot(component, name, slot));
        if let Err(err) = attached {
            graph.remove_slot(slot)?;
            return Err(err);
        }

        self.prim_vars_mut().vars.insert(
            name.to_owned(),
            PrimVarInfo {
                storage,
                ty,
                multiplicity,
                slot,
            },
        );
        log::debug!("new_variable \"{name}\" {storage:?} {ty:?}x{multiplicity}");
        Ok(slot)
    }

    /// Deletes a primitive variable and its slot. Fails with `Key` if absent.
    fn delete_variable(&mut self, graph: &mut SlotGraph, name: &str) -> Result<()> {
        if self.prim_vars_mut().vars.remove(name).is_none() {
            return Err(GraphError::missing_slot(name));
        }
        graph.remove_component_slot(self.component(), name)
    }

    fn delete_all_variables(&mut self, graph: &mut SlotGraph) -> Result<()> {
        let names: Vec<String> = self.prim_vars().vars.keys().cloned().collect();
        for name in names {
            self.delete_variable(graph, &name)?;
        }
        Ok(())
    }

    fn find_variable(&self, name: &str) -> Option<&PrimVarInfo> {
        self.prim_vars().get(name)
    }
}

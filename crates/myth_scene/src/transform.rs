//! Compound Transform
//!
//! Four slots that always agree: the local `transform` matrix and its
//! decomposed `pos`, `rot` and `scale` parts.
//!
//! Consistency is lazy. The group remembers which side was written last (the
//! *authority*) and every read derives the other side on demand:
//!
//! - Writing `transform` makes the matrix authoritative. The parts are
//!   decomposed from it the first time one of them is read or written.
//! - Writing a part makes the parts authoritative. If the matrix was
//!   authoritative, it is decomposed once first, so writing `pos` keeps the
//!   rotation and scale of the previous matrix.
//!
//! Parts can be connected to controllers. While any part is connected the
//! matrix is composed from the effective parts, so connected values win over
//! values decomposed from a written matrix.
//!
//! The matrix itself does not take input connections; drive the parts
//! instead.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DMat3, DMat4, DVec3};

use myth_core::{ComponentKey, GraphError, Result};
use myth_slots::{ConnectionPolicy, FnProcedure, Slot, SlotGraph, SlotValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authority {
    Transform,
    Parts,
}

#[derive(Debug)]
struct TrsState {
    transform: DMat4,
    pos: DVec3,
    rot: DMat3,
    scale: DVec3,
    authority: Authority,
    /// Parts hold the decomposition of `transform`.
    decomposed: bool,
}

impl Default for TrsState {
    fn default() -> Self {
        Self {
            transform: DMat4::IDENTITY,
            pos: DVec3::ZERO,
            rot: DMat3::IDENTITY,
            scale: DVec3::ONE,
            authority: Authority::Transform,
            decomposed: true,
        }
    }
}

impl TrsState {
    /// Decomposes the authoritative matrix into the parts, once.
    fn sync_parts(&mut self) {
        if self.authority == Authority::Transform && !self.decomposed {
            let (scale, rotation, translation) = self.transform.to_scale_rotation_translation();
            self.pos = translation;
            self.rot = DMat3::from_quat(rotation);
            self.scale = scale;
            self.decomposed = true;
        }
    }

    fn write_part(&mut self, write: impl FnOnce(&mut Self)) {
        self.sync_parts();
        self.authority = Authority::Parts;
        write(self);
    }
}

/// `T * R * S`
#[inline]
pub fn compose_trs(pos: DVec3, rot: DMat3, scale: DVec3) -> DMat4 {
    DMat4::from_translation(pos) * DMat4::from_mat3(rot) * DMat4::from_scale(scale)
}

type Shared = Rc<RefCell<TrsState>>;

/// Handles of the four slots of a compound transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformGroup {
    pub transform: Slot<DMat4>,
    pub pos: Slot<DVec3>,
    pub rot: Slot<DMat3>,
    pub scale: Slot<DVec3>,
}

impl TransformGroup {
    /// Creates the group at the identity.
    pub fn new(graph: &mut SlotGraph) -> Result<Self> {
        let state: Shared = Rc::default();

        let pos = add_part(graph, &state, |s| s.pos, |s, v| s.pos = v);
        let rot = add_part(graph, &state, |s| s.rot, |s, v| s.rot = v);
        let scale = add_part(graph, &state, |s| s.scale, |s, v| s.scale = v);

        let reader = state.clone();
        let writer = state;
        let procedure = FnProcedure::new(move |g: &mut SlotGraph| {
            let (authority, stored) = {
                let s = reader.borrow();
                (s.authority, s.transform)
            };
            let connected = g.controller(pos)?.is_some()
                || g.controller(rot)?.is_some()
                || g.controller(scale)?.is_some();
            if authority == Authority::Transform && !connected {
                return Ok(stored);
            }
            Ok(compose_trs(g.get(pos)?, g.get(rot)?, g.get(scale)?))
        })
        .with_setter(move |g, matrix| {
            {
                let mut s = writer.borrow_mut();
                s.transform = matrix;
                s.authority = Authority::Transform;
                s.decomposed = false;
            }
            g.invalidate(pos)?;
            g.invalidate(rot)?;
            g.invalidate(scale)?;
            Ok(())
        });
        let transform = graph.add_derived(procedure, ConnectionPolicy::NoInput);

        graph.add_dependent(pos, transform)?;
        graph.add_dependent(rot, transform)?;
        graph.add_dependent(scale, transform)?;

        Ok(Self {
            transform,
            pos,
            rot,
            scale,
        })
    }

    /// Indexes the four slots in `component` under their usual names.
    pub fn register(&self, graph: &mut SlotGraph, component: ComponentKey) -> Result<()> {
        graph.add_borrowed_slot(component, "transform", self.transform)?;
        graph.add_borrowed_slot(component, "pos", self.pos)?;
        graph.add_borrowed_slot(component, "rot", self.rot)?;
        graph.add_borrowed_slot(component, "scale", self.scale)?;
        Ok(())
    }

    /// Destroys the four slots.
    pub fn remove(self, graph: &mut SlotGraph) -> Result<()> {
        graph.remove_slot(self.transform)?;
        graph.remove_slot(self.pos)?;
        graph.remove_slot(self.rot)?;
        graph.remove_slot(self.scale)?;
        Ok(())
    }

    /// Sets the rotation from Euler angles in radians.
    pub fn set_rotation_euler(&self, graph: &mut SlotGraph, order: glam::EulerRot, a: f64, b: f64, c: f64) -> Result<()> {
        graph.set(self.rot, DMat3::from_euler(order, a, b, c))
    }

    /// Points the negative z axis at `target`, keeping position and scale.
    ///
    /// Fails with `InvalidOperation`, leaving the rotation alone, when the
    /// target sits on the position or in line with `up`.
    pub fn look_at(&self, graph: &mut SlotGraph, target: DVec3, up: DVec3) -> Result<()> {
        let pos = graph.get(self.pos)?;
        let forward = (target - pos).normalize_or_zero();
        if forward.cross(up).length_squared() < 1e-8 {
            return Err(GraphError::invalid(
                "look_at: the view direction is undefined or parallel to the up vector",
            ));
        }
        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();
        graph.set(self.rot, DMat3::from_cols(right, new_up, -forward))
    }
}

fn add_part<T: SlotValue>(
    graph: &mut SlotGraph,
    state: &Shared,
    read: fn(&TrsState) -> T,
    write: fn(&mut TrsState, T),
) -> Slot<T> {
    let reader = state.clone();
    let writer = state.clone();
    let procedure = FnProcedure::new(move |_: &mut SlotGraph| {
        let mut s = reader.borrow_mut();
        s.sync_parts();
        Ok(read(&s))
    })
    .with_setter(move |_, value| {
        writer.borrow_mut().write_part(|s| write(s, value));
        Ok(())
    });
    graph.add_derived(procedure, ConnectionPolicy::Single)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_identity() {
        let mut graph = SlotGraph::new();
        let group = TransformGroup::new(&mut graph).unwrap();
        assert_eq!(graph.get(group.transform).unwrap(), DMat4::IDENTITY);
        assert_eq!(graph.get(group.scale).unwrap(), DVec3::ONE);
        assert_eq!(graph.get(group.rot).unwrap(), DMat3::IDENTITY);
    }

    #[test]
    fn matrix_does_not_take_connections() {
        let mut graph = SlotGraph::new();
        let group = TransformGroup::new(&mut graph).unwrap();
        let driver = graph.add_slot(DMat4::IDENTITY);
        assert!(graph.connect(driver, group.transform).is_err());
    }
}

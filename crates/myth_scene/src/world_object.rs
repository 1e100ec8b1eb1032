//! World Objects
//!
//! A world object is a component carrying a compound local transform plus the
//! attributes every scene object shares. Its `worldtransform` is procedural:
//! `parent.worldtransform * transform`, recomputed only when the local
//! transform or any ancestor changes. `totalmass` sums the object's own mass
//! and the total mass of its children the same way.
//!
//! ```rust,ignore
//! let mut graph = SlotGraph::new();
//! let parent = WorldObject::new(&mut graph, "parent")?;
//! let child = WorldObject::new(&mut graph, "child")?;
//! child.set_parent(&mut graph, Some(&parent))?;
//!
//! graph.set(parent.transform.pos, DVec3::X)?;
//! let world = graph.get(child.worldtransform)?; // translated by +X
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use glam::{DMat4, DVec3};

use myth_core::{ComponentKey, ErrorKind, Result};
use myth_slots::{FnProcedure, Slot, SlotGraph};

use crate::transform::TransformGroup;

#[derive(Debug, Clone)]
struct ParentLink {
    worldtransform: Slot<DMat4>,
    totalmass: Slot<f64>,
    hierarchy: Rc<RefCell<Hierarchy>>,
}

#[derive(Debug, Default)]
struct Hierarchy {
    parent: Option<ParentLink>,
    children_mass: Vec<Slot<f64>>,
}

/// Scene object with a local transform, parenting and mass attributes.
#[derive(Debug)]
pub struct WorldObject {
    pub component: ComponentKey,
    pub transform: TransformGroup,
    pub worldtransform: Slot<DMat4>,
    pub visible: Slot<bool>,
    pub mass: Slot<f64>,
    pub totalmass: Slot<f64>,
    pub linearvel: Slot<DVec3>,
    pub angularvel: Slot<DVec3>,
    hierarchy: Rc<RefCell<Hierarchy>>,
}

impl WorldObject {
    pub fn new(graph: &mut SlotGraph, name: &str) -> Result<Self> {
        let component = graph.add_component(name);
        let transform = TransformGroup::new(graph)?;
        let hierarchy: Rc<RefCell<Hierarchy>> = Rc::default();

        let local = transform.transform;
        let links = hierarchy.clone();
        let worldtransform = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
            let parent = links.borrow().parent.as_ref().map(|p| p.worldtransform);
            let local = g.get(local)?;
            match parent.map(|p| g.get(p)) {
                Some(Ok(parent)) => Ok(parent * local),
                // A destroyed parent leaves the object at its local placement.
                Some(Err(err)) if err.kind() == ErrorKind::NotFound => Ok(local),
                Some(Err(err)) => Err(err),
                None => Ok(local),
            }
        }));
        graph.add_dependent(local, worldtransform)?;

        let mass = graph.add_slot(0.0_f64);
        let links = hierarchy.clone();
        let totalmass = graph.add_procedural(FnProcedure::new(move |g: &mut SlotGraph| {
            let children = links.borrow().children_mass.clone();
            let mut total = g.get(mass)?;
            for child in children {
                total += g.get(child)?;
            }
            Ok(total)
        }));
        graph.add_dependent(mass, totalmass)?;

        let obj = Self {
            component,
            transform,
            worldtransform,
            visible: graph.add_slot(true),
            mass,
            totalmass,
            linearvel: graph.add_slot(DVec3::ZERO),
            angularvel: graph.add_slot(DVec3::ZERO),
            hierarchy,
        };

        transform.register(graph, component)?;
        graph.add_borrowed_slot(component, "worldtransform", obj.worldtransform)?;
        graph.add_borrowed_slot(component, "visible", obj.visible)?;
        graph.add_borrowed_slot(component, "mass", obj.mass)?;
        graph.add_borrowed_slot(component, "totalmass", obj.totalmass)?;
        graph.add_borrowed_slot(component, "linearvel", obj.linearvel)?;
        graph.add_borrowed_slot(component, "angularvel", obj.angularvel)?;
        log::debug!("WorldObject \"{name}\" created");
        Ok(obj)
    }

    pub fn name<'g>(&self, graph: &'g SlotGraph) -> Result<&'g str> {
        Ok(graph.component(self.component)?.name())
    }

    pub fn has_parent(&self) -> bool {
        self.hierarchy.borrow().parent.is_some()
    }

    /// Re-parents the object. `None` makes it a root.
    ///
    /// Fails with `Cycle` if `parent` is the object itself or one of its
    /// descendants; the previous parent stays in place then.
    pub fn set_parent(&self, graph: &mut SlotGraph, parent: Option<&WorldObject>) -> Result<()> {
        let current = self.hierarchy.borrow().parent.as_ref().map(|p| p.worldtransform);
        if current == parent.map(|p| p.worldtransform) {
            return Ok(());
        }
        if let Some(parent) = parent {
            // Link the new parent first; a cycle error leaves everything as is.
            graph.add_dependent(parent.worldtransform, self.worldtransform)?;
            if let Err(err) = graph.add_dependent(self.totalmass, parent.totalmass) {
                graph.remove_dependent(parent.worldtransform, self.worldtransform)?;
                return Err(err);
            }
        }

        let old = self.hierarchy.borrow_mut().parent.take();
        if let Some(old) = old {
            // The old parent may already be destroyed.
            skip_missing(graph.remove_dependent(old.worldtransform, self.worldtransform))?;
            skip_missing(graph.remove_dependent(self.totalmass, old.totalmass))?;
            old.hierarchy
                .borrow_mut()
                .children_mass
                .retain(|m| *m != self.totalmass);
            skip_missing(graph.invalidate(old.totalmass))?;
        }

        if let Some(parent) = parent {
            parent.hierarchy.borrow_mut().children_mass.push(self.totalmass);
            self.hierarchy.borrow_mut().parent = Some(ParentLink {
                worldtransform: parent.worldtransform,
                totalmass: parent.totalmass,
                hierarchy: parent.hierarchy.clone(),
            });
            graph.invalidate(parent.totalmass)?;
        }

        graph.invalidate(self.worldtransform)
    }

    /// Detaches the object from its parent and destroys its component and
    /// slots.
    pub fn destroy(self, graph: &mut SlotGraph) -> Result<()> {
        self.set_parent(graph, None)?;
        graph.remove_component(self.component)?;
        graph.remove_slot(self.worldtransform)?;
        graph.remove_slot(self.totalmass)?;
        graph.remove_slot(self.visible)?;
        graph.remove_slot(self.mass)?;
        graph.remove_slot(self.linearvel)?;
        graph.remove_slot(self.angularvel)?;
        self.transform.remove(graph)
    }
}

fn skip_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

//! Size Constraints
//!
//! A size constraint ties the item count of one or more array slots together.
//! Every registered slot holds exactly [`constraint_size`](SlotGraph::constraint_size)
//! items outside of an in-flight resize.
//!
//! - **User** constraints are resized by the caller.
//! - **Fixed** constraints never change size. They are shared per graph through
//!   [`fixed_size_constraint`](SlotGraph::fixed_size_constraint), so every
//!   "always one item" array can point at the same constraint.
//! - **Linear** constraints follow a controlling array: `size = a * n + b`
//!   whenever the controller holds `n` items. They veto a controller resize
//!   that one of their slots could not follow.
//!
//! Resizing is transactional. If a registered slot fails to follow, the
//! constraint restores its previous size, and every slot that had already
//! followed gets its old items back, before the error is returned.

use smallvec::SmallVec;

use myth_core::{ConstraintKey, GraphError, Result, SlotKey};

use crate::array::{ResizeOrigin, ResizeUndo};
use crate::dependent::DependentId;
use crate::graph::{SlotBody, SlotGraph};
use crate::handle::SlotHandle;

/// Sizing rule of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeConstraintKind {
    /// Size set with `set_constraint_size`.
    User,
    /// Immutable size.
    Fixed,
    /// `a * n + b`, where `n` is the size of `controller`.
    Linear {
        /// `None` once the controller has been destroyed.
        controller: Option<SlotKey>,
        a: usize,
        b: usize,
    },
}

#[derive(Debug)]
pub(crate) struct ConstraintNode {
    pub(crate) size: usize,
    pub(crate) slots: SmallVec<[SlotKey; 4]>,
    pub(crate) kind: SizeConstraintKind,
}

impl ConstraintNode {
    fn new(size: usize, kind: SizeConstraintKind) -> Self {
        Self {
            size,
            slots: SmallVec::new(),
            kind,
        }
    }

    pub(crate) fn detach_controller(&mut self) {
        if let SizeConstraintKind::Linear { controller, .. } = &mut self.kind {
            *controller = None;
        }
    }
}

/// A committed constraint resize, kept until the resize that caused it has
/// committed too.
pub(crate) struct ConstraintUndo {
    key: ConstraintKey,
    previous: usize,
    resized: SmallVec<[ResizeUndo; 4]>,
}

fn linear_size(a: usize, n: usize, b: usize) -> Result<usize> {
    a.checked_mul(n)
        .and_then(|an| an.checked_add(b))
        .ok_or_else(|| GraphError::invalid(format!("{a} * {n} + {b} items exceed the addressable size")))
}

impl SlotGraph {
    pub(crate) fn constraint(&self, key: ConstraintKey) -> Result<&ConstraintNode> {
        self.constraints
            .get(key)
            .ok_or_else(|| GraphError::not_found(format!("size constraint {key:?} does not exist")))
    }

    fn constraint_mut(&mut self, key: ConstraintKey) -> Result<&mut ConstraintNode> {
        self.constraints
            .get_mut(key)
            .ok_or_else(|| GraphError::not_found(format!("size constraint {key:?} does not exist")))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Adds a constraint whose size is set by the caller.
    pub fn add_user_constraint(&mut self, size: usize) -> ConstraintKey {
        let key = self
            .constraints
            .insert(ConstraintNode::new(size, SizeConstraintKind::User));
        log::debug!("add_user_constraint {key:?} ({size})");
        key
    }

    /// Returns the shared immutable constraint of the given size, creating it
    /// on first use.
    pub fn fixed_size_constraint(&mut self, size: usize) -> ConstraintKey {
        if let Some(&key) = self.fixed_constraints.get(&size)
            && self.constraints.contains_key(key)
        {
            return key;
        }
        let key = self
            .constraints
            .insert(ConstraintNode::new(size, SizeConstraintKind::Fixed));
        self.fixed_constraints.insert(size, key);
        log::debug!("fixed_size_constraint {key:?} ({size})");
        key
    }

    /// Adds a constraint that holds `a * n + b` items whenever `controller`
    /// holds `n`.
    pub fn add_linear_constraint(&mut self, controller: impl SlotHandle, a: usize, b: usize) -> Result<ConstraintKey> {
        let controller = controller.key();
        if !self.node(controller)?.is_array() {
            return Err(GraphError::invalid("a linear constraint needs an array controller"));
        }
        let size = linear_size(a, self.array_size_of(controller)?, b)?;
        let key = self.constraints.insert(ConstraintNode::new(
            size,
            SizeConstraintKind::Linear {
                controller: Some(controller),
                a,
                b,
            },
        ));
        self.node_mut(controller)?
            .dependents
            .push(DependentId::Constraint(key));
        log::debug!("add_linear_constraint {key:?} = {a} * {controller:?} + {b}");
        Ok(key)
    }

    /// Destroys a constraint. Fails while slots are registered with it.
    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Result<()> {
        let node = self.constraint(key)?;
        if !node.slots.is_empty() {
            return Err(GraphError::invalid(format!(
                "size constraint {key:?} still governs {} slot(s)",
                node.slots.len()
            )));
        }
        let kind = node.kind;
        let size = node.size;

        match kind {
            SizeConstraintKind::Linear {
                controller: Some(controller),
                ..
            } => self.detach_dependent(controller, DependentId::Constraint(key)),
            SizeConstraintKind::Fixed => {
                if self.fixed_constraints.get(&size) == Some(&key) {
                    self.fixed_constraints.remove(&size);
                }
            }
            _ => {}
        }
        self.constraints.remove(key);
        log::debug!("remove_constraint {key:?}");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn constraint_size(&self, key: ConstraintKey) -> Result<usize> {
        Ok(self.constraint(key)?.size)
    }

    pub fn constraint_kind(&self, key: ConstraintKey) -> Result<SizeConstraintKind> {
        Ok(self.constraint(key)?.kind)
    }

    /// Slots registered with the constraint, in registration order.
    pub fn constraint_slots(&self, key: ConstraintKey) -> Result<&[SlotKey]> {
        Ok(&self.constraint(key)?.slots)
    }

    /// The constraint governing `slot`, if any.
    pub fn slot_constraint(&self, slot: impl SlotHandle) -> Result<Option<ConstraintKey>> {
        match &self.node(slot.key())?.body {
            SlotBody::Array(cell) => Ok(cell.constraint),
            SlotBody::Value(_) => Ok(None),
        }
    }

    /// Whether a linear constraint would reject its controller resizing to
    /// `controller_size` items. Other constraints never veto.
    pub fn query_resize_veto(&mut self, key: ConstraintKey, controller_size: usize) -> Result<bool> {
        self.constraint(key)?;
        Ok(self.constraint_vetoes(key, controller_size))
    }

    pub(crate) fn constraint_vetoes(&mut self, key: ConstraintKey, controller_size: usize) -> bool {
        let Some(node) = self.constraints.get(key) else {
            return false;
        };
        let SizeConstraintKind::Linear { a, b, .. } = node.kind else {
            return false;
        };
        let Ok(size) = linear_size(a, controller_size, b) else {
            return true;
        };
        let slots = node.slots.clone();
        slots
            .into_iter()
            .any(|slot| !self.is_resizable(slot, size, true).unwrap_or(false))
    }

    // ========================================================================
    // Resizing
    // ========================================================================

    /// Resizes a user constraint and every slot registered with it.
    pub fn set_constraint_size(&mut self, key: ConstraintKey, size: usize) -> Result<()> {
        match self.constraint(key)?.kind {
            SizeConstraintKind::User => self.apply_constraint_size(key, size),
            SizeConstraintKind::Fixed => {
                Err(GraphError::invalid("fixed size constraints cannot be resized"))
            }
            SizeConstraintKind::Linear { .. } => Err(GraphError::invalid(
                "linear size constraints follow their controller",
            )),
        }
    }

    /// Changes the coefficients of a linear constraint and resizes its slots.
    /// On failure the previous coefficients stay in effect.
    pub fn set_linear_coeffs(&mut self, key: ConstraintKey, a: usize, b: usize) -> Result<()> {
        let SizeConstraintKind::Linear {
            controller,
            a: old_a,
            b: old_b,
        } = self.constraint(key)?.kind
        else {
            return Err(GraphError::invalid("not a linear size constraint"));
        };
        let size = match controller {
            Some(controller) => Some(linear_size(a, self.array_size_of(controller)?, b)?),
            None => None,
        };
        self.constraint_mut(key)?.kind = SizeConstraintKind::Linear { controller, a, b };

        let Some(size) = size else {
            return Ok(());
        };
        if let Err(err) = self.apply_constraint_size(key, size) {
            if let Some(node) = self.constraints.get_mut(key) {
                node.kind = SizeConstraintKind::Linear {
                    controller,
                    a: old_a,
                    b: old_b,
                };
            }
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn constraint_on_controller_resize(
        &mut self,
        key: ConstraintKey,
        controller_size: usize,
    ) -> Result<Option<ConstraintUndo>> {
        let Some(node) = self.constraints.get(key) else {
            return Ok(None);
        };
        let SizeConstraintKind::Linear { a, b, .. } = node.kind else {
            return Ok(None);
        };
        self.commit_constraint_size(key, linear_size(a, controller_size, b)?)
    }

    fn apply_constraint_size(&mut self, key: ConstraintKey, size: usize) -> Result<()> {
        self.commit_constraint_size(key, size).map(|_| ())
    }

    /// Records `size` and resizes every registered slot. If a slot fails, the
    /// slots already resized get their old size and contents back.
    fn commit_constraint_size(&mut self, key: ConstraintKey, size: usize) -> Result<Option<ConstraintUndo>> {
        let node = self.constraint_mut(key)?;
        let previous = node.size;
        if previous == size {
            return Ok(None);
        }
        node.size = size;
        let slots = node.slots.clone();
        log::trace!("constraint {key:?}: {previous} -> {size}");

        let mut undo = ConstraintUndo {
            key,
            previous,
            resized: SmallVec::new(),
        };
        for slot in slots {
            match self.commit_resize(slot, size, ResizeOrigin::Constraint(key)) {
                Ok(resized) => undo.resized.extend(resized),
                Err(err) => {
                    self.undo_constraint_size(undo);
                    return Err(err);
                }
            }
        }
        Ok(Some(undo))
    }

    /// Restores the size a committed constraint resize replaced, on the
    /// constraint and on its slots in reverse order.
    pub(crate) fn undo_constraint_size(&mut self, undo: ConstraintUndo) {
        let ConstraintUndo { key, previous, resized } = undo;
        if let Some(node) = self.constraints.get_mut(key) {
            node.size = previous;
        }
        log::trace!("constraint {key:?}: back to {previous}");
        for slot in resized.into_iter().rev() {
            self.undo_resize(slot);
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Puts `slot` under the constraint and resizes it to the constraint's
    /// size. If that resize fails the slot stays unregistered.
    pub fn register_slot(&mut self, key: ConstraintKey, slot: impl SlotHandle) -> Result<()> {
        let slot = slot.key();
        let constraint = self.constraint(key)?;
        let size = constraint.size;
        let controller = match constraint.kind {
            SizeConstraintKind::Linear { controller, .. } => controller,
            _ => None,
        };

        let node = self.node(slot)?;
        let SlotBody::Array(cell) = &node.body else {
            return Err(GraphError::invalid("only array slots can be size constrained"));
        };
        if let Some(existing) = cell.constraint {
            return Err(GraphError::AlreadyRegistered(if existing == key {
                format!("slot {slot:?} is already registered with {key:?}")
            } else {
                format!("slot {slot:?} is registered with another size constraint {existing:?}")
            }));
        }
        if node.controller.is_some() {
            return Err(GraphError::invalid(
                "a connected array slot cannot be size constrained",
            ));
        }
        if let Some(controller) = controller
            && (controller == slot || (self.settings.detect_cycles && self.reaches(slot, controller)))
        {
            return Err(GraphError::Cycle(format!(
                "{slot:?} cannot follow a constraint driven by its own size"
            )));
        }

        if let SlotBody::Array(cell) = &mut self.node_mut(slot)?.body {
            cell.constraint = Some(key);
        }
        self.constraint_mut(key)?.slots.push(slot);
        log::debug!("register_slot {slot:?} with {key:?}");

        if let Err(err) = self.resize_array(slot, size, ResizeOrigin::Constraint(key)) {
            self.detach_from_constraint(key, slot);
            return Err(err);
        }
        Ok(())
    }

    /// Releases `slot` from the constraint. The slot keeps its size.
    pub fn unregister_slot(&mut self, key: ConstraintKey, slot: impl SlotHandle) -> Result<()> {
        let slot = slot.key();
        if !self.constraint(key)?.slots.contains(&slot) {
            return Err(GraphError::not_found(format!(
                "slot {slot:?} is not registered with {key:?}"
            )));
        }
        self.detach_from_constraint(key, slot);
        log::debug!("unregister_slot {slot:?} from {key:?}");
        Ok(())
    }

    fn detach_from_constraint(&mut self, key: ConstraintKey, slot: SlotKey) {
        if let Some(node) = self.constraints.get_mut(key) {
            node.slots.retain(|s| *s != slot);
        }
        if let Some(node) = self.slots.get_mut(slot)
            && let SlotBody::Array(cell) = &mut node.body
        {
            cell.constraint = None;
        }
    }
}

//! Notification dispatch.
//!
//! Every event is delivered synchronously and depth first: a dependent slot
//! forwards the event to its own dependents before the next sibling is
//! visited. Dependents are snapshotted before the fan-out so hooks may add
//! or remove registrations without disturbing the pass in flight.
//!
//! Routing rules:
//!
//! | Receiver              | value / range                  | resize                      |
//! |-----------------------|--------------------------------|-----------------------------|
//! | stored slot           | ignored                        | ignored                     |
//! | procedural / derived  | invalidate, forward, hook      | invalidate, forward, hook   |
//! | connected scalar      | forward as value change        | forward as value change     |
//! | connected array       | forward range                  | forward resize              |
//! | size constraint       | ignored                        | recompute size, resize      |
//! | observer              | hook                           | hook                        |

use smallvec::SmallVec;

use myth_core::{ConstraintKey, Result, SlotKey};

use crate::constraint::ConstraintUndo;
use crate::dependent::DependentId;
use crate::graph::{SlotBody, SlotGraph};
use crate::procedural::ProcedureState;

type Fanout = SmallVec<[DependentId; 4]>;

/// Constraint resizes made while following one controller resize.
type Followed = SmallVec<[ConstraintUndo; 2]>;

#[derive(Clone, Copy)]
enum Event {
    Value,
    Range(usize, usize),
    Resize(usize),
}

impl SlotGraph {
    fn fanout(&self, key: SlotKey) -> Fanout {
        self.slots
            .get(key)
            .map(|node| node.dependents.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Value changes
    // ========================================================================

    /// Tells the dependents of `key` that its scalar value changed.
    pub(crate) fn notify_value_changed(&mut self, key: SlotKey) {
        for dependent in self.fanout(key) {
            if self.settings.trace_notifications {
                log::trace!("value_changed {key:?} -> {dependent:?}");
            }
            match dependent {
                DependentId::Slot(slot) => self.slot_on_value_changed(slot),
                DependentId::Observer(observer) => {
                    if let Some(observer) = self.observers.get_mut(observer) {
                        observer.hook.on_value_changed();
                    }
                }
                DependentId::Constraint(_) => {}
            }
        }
    }

    /// Tells the dependents of `key` that items `[start, end)` changed.
    pub(crate) fn notify_range_changed(&mut self, key: SlotKey, start: usize, end: usize) {
        for dependent in self.fanout(key) {
            if self.settings.trace_notifications {
                log::trace!("range_changed {key:?}[{start}..{end}] -> {dependent:?}");
            }
            match dependent {
                DependentId::Slot(slot) => self.deliver(slot, Event::Range(start, end)),
                DependentId::Observer(observer) => {
                    if let Some(observer) = self.observers.get_mut(observer) {
                        observer.hook.on_value_changed_range(start, end);
                    }
                }
                DependentId::Constraint(_) => {}
            }
        }
    }

    pub(crate) fn slot_on_value_changed(&mut self, slot: SlotKey) {
        self.deliver(slot, Event::Value);
    }

    /// Applies a value or range event to a dependent slot.
    fn deliver(&mut self, slot: SlotKey, event: Event) {
        let Some(node) = self.slots.get_mut(slot) else {
            return;
        };
        if !node.is_derived() {
            return;
        }

        match &mut node.body {
            SlotBody::Value(cell) => {
                if cell.procedure.is_procedural() {
                    cell.valid = false;
                }
                self.notify_value_changed(slot);
                self.run_hook(slot, event);
            }
            SlotBody::Array(_) => match event {
                Event::Range(start, end) => self.notify_range_changed(slot, start, end),
                Event::Value | Event::Resize(_) => {
                    if let Ok(size) = self.array_size_of(slot) {
                        self.notify_range_changed(slot, 0, size);
                    }
                }
            },
        }
    }

    fn run_hook(&mut self, slot: SlotKey, event: Event) {
        let Some(SlotBody::Value(cell)) = self.slots.get_mut(slot).map(|n| &mut n.body) else {
            return;
        };
        // A running procedure has been taken out of its slot.
        let ProcedureState::Idle(procedure) = &mut cell.procedure else {
            return;
        };
        match event {
            Event::Value => procedure.on_value_changed(),
            Event::Range(start, end) => procedure.on_value_changed_range(start, end),
            Event::Resize(size) => procedure.on_resize(size),
        }
    }

    // ========================================================================
    // Resizing
    // ========================================================================

    /// Tells the dependents of `key` that it now holds `size` items.
    ///
    /// Stops at the first dependent that fails. Size constraints that already
    /// followed are put back before the error is returned; the caller restores
    /// `key` itself.
    pub(crate) fn notify_resize(&mut self, key: SlotKey, size: usize) -> Result<()> {
        let mut followed = Followed::new();
        let result = self.propagate_resize(key, size, &mut followed);
        if result.is_err() {
            for undo in followed.into_iter().rev() {
                self.undo_constraint_size(undo);
            }
        }
        result
    }

    fn propagate_resize(&mut self, key: SlotKey, size: usize, followed: &mut Followed) -> Result<()> {
        for dependent in self.fanout(key) {
            if self.settings.trace_notifications {
                log::trace!("resize {key:?} ({size}) -> {dependent:?}");
            }
            match dependent {
                DependentId::Slot(slot) => self.slot_on_resize(slot, size, followed)?,
                DependentId::Constraint(constraint) => {
                    followed.extend(self.constraint_on_controller_resize(constraint, size)?);
                }
                DependentId::Observer(observer) => {
                    if let Some(observer) = self.observers.get_mut(observer) {
                        observer.hook.on_resize(size);
                    }
                }
            }
        }
        Ok(())
    }

    fn slot_on_resize(&mut self, slot: SlotKey, size: usize, followed: &mut Followed) -> Result<()> {
        let Some(node) = self.slots.get_mut(slot) else {
            return Ok(());
        };
        if !node.is_derived() {
            return Ok(());
        }

        match &mut node.body {
            SlotBody::Value(cell) => {
                if cell.procedure.is_procedural() {
                    cell.valid = false;
                }
                self.notify_value_changed(slot);
                self.run_hook(slot, Event::Resize(size));
                Ok(())
            }
            SlotBody::Array(_) => self.propagate_resize(slot, size, followed),
        }
    }

    /// Re-announces a restored size after a failed resize. Failures here can
    /// only be logged; the original error is what the caller sees.
    pub(crate) fn renotify_resize(&mut self, key: SlotKey, size: usize) {
        if let Err(err) = self.notify_resize(key, size) {
            log::error!("rollback of {key:?} to {size} items failed: {err}");
        }
    }

    /// Whether any dependent of `key` rejects it holding `size` items.
    pub(crate) fn slot_resize_vetoed(&mut self, key: SlotKey, size: usize) -> bool {
        for dependent in self.fanout(key) {
            let vetoed = match dependent {
                DependentId::Slot(slot) => self
                    .slots
                    .get(slot)
                    .is_some_and(|n| n.is_array() && n.controller == Some(key))
                    && self.slot_resize_vetoed(slot, size),
                DependentId::Constraint(constraint) => self.constraint_vetoes(constraint, size),
                DependentId::Observer(observer) => self
                    .observers
                    .get_mut(observer)
                    .is_some_and(|observer| observer.hook.query_resize_veto(size)),
            };
            if vetoed {
                log::debug!("resize of {key:?} to {size} vetoed by {dependent:?}");
                return true;
            }
        }
        false
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Detaches every dependent of `key` ahead of its destruction.
    pub(crate) fn notify_controller_deleted(&mut self, key: SlotKey) {
        for dependent in self.fanout(key) {
            match dependent {
                DependentId::Slot(slot) => self.slot_on_controller_deleted(slot, key),
                DependentId::Constraint(constraint) => self.constraint_on_controller_deleted(constraint),
                DependentId::Observer(observer) => {
                    if let Some(observer) = self.observers.get_mut(observer) {
                        observer.hook.on_controller_deleted();
                        if let Some(pos) = observer.sources.iter().position(|&s| s == key) {
                            observer.sources.remove(pos);
                        }
                    }
                }
            }
        }
        if let Some(node) = self.slots.get_mut(key) {
            node.dependents.clear();
        }
    }

    fn slot_on_controller_deleted(&mut self, slot: SlotKey, key: SlotKey) {
        let Some(node) = self.slots.get(slot) else {
            return;
        };

        if node.controller == Some(key) {
            let snapshot = self.controller_snapshot(slot);
            self.unlink_controller(slot);
            match snapshot {
                Ok(snapshot) => self.adopt(slot, snapshot),
                Err(err) => log::warn!("{slot:?} lost the value of its deleted controller {key:?}: {err}"),
            }
            return;
        }

        if let Some(node) = self.slots.get_mut(slot)
            && let Some(pos) = node.sources.iter().position(|&s| s == key)
        {
            node.sources.remove(pos);
        }
        // Procedures may have read from the deleted slot.
        if let Some(node) = self.slots.get_mut(slot)
            && let SlotBody::Value(cell) = &mut node.body
            && cell.procedure.is_procedural()
        {
            cell.valid = false;
            self.notify_value_changed(slot);
        }
    }

    fn constraint_on_controller_deleted(&mut self, constraint: ConstraintKey) {
        if let Some(node) = self.constraints.get_mut(constraint) {
            log::debug!("controller of {constraint:?} deleted; keeping size {}", node.size);
            node.detach_controller();
        }
    }
}

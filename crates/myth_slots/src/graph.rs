//! Slot Graph
//!
//! [`SlotGraph`] owns every slot, size constraint, observer and component of a
//! scene in generational arenas and implements the scalar slot contract:
//!
//! - **Stored** slots hold a value written with [`SlotGraph::set`].
//! - **Connected** slots mirror a controller slot and are read-only.
//! - **Procedural** slots compute their value lazily through a
//!   [`Procedure`] and cache it until an upstream change invalidates it.
//!
//! # Ownership
//!
//! All cross references are arena keys with back edges: a slot knows its
//! controller and every slot it registered with, an observer knows its sources,
//! a constraint knows its registered slots. Destroying an entity walks those
//! edges, so no key is left pointing at a live entity that does not know about
//! it, and keys of destroyed entities fail with `NotFound`.
//!
//! # Threading
//!
//! The graph is single threaded and synchronous. A mutation fully propagates,
//! including every downstream invalidation and owner callback, before the call
//! returns. Share it across threads only behind external synchronization.

use std::any::{Any, TypeId};
use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use myth_core::{
    ComponentKey, ConstraintKey, GraphError, GraphSettings, ObserverKey, Result, SlotKey,
};

use crate::component::Component;
use crate::constraint::ConstraintNode;
use crate::dependent::{Dependent, DependentId};
use crate::handle::{ArraySlot, Slot, SlotHandle};
use crate::procedural::{Procedure, ProcedureState};
use crate::storage::{ArrayStorage, ArrayValue, ErasedValue, SlotValue};

/// How many input connections a slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPolicy {
    /// The slot never takes a controller (procedural slots).
    NoInput,
    /// At most one controller; reconnecting requires a `disconnect` first.
    #[default]
    Single,
    /// `connect` replaces an existing controller.
    Multiple,
}

// ============================================================================
// Nodes
// ============================================================================

pub(crate) struct ValueCell {
    /// `None` only for a procedural slot that has never been computed.
    pub(crate) value: Option<Box<dyn ErasedValue>>,
    pub(crate) valid: bool,
    pub(crate) procedure: ProcedureState,
}

pub(crate) struct ArrayCell {
    pub(crate) storage: Box<dyn ArrayStorage>,
    pub(crate) multiplicity: usize,
    /// Number of items; storage holds `size * multiplicity` elements.
    pub(crate) size: usize,
    pub(crate) constraint: Option<ConstraintKey>,
}

pub(crate) enum SlotBody {
    Value(ValueCell),
    Array(ArrayCell),
}

pub(crate) struct SlotNode {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) policy: ConnectionPolicy,
    pub(crate) controller: Option<SlotKey>,
    pub(crate) dependents: SmallVec<[DependentId; 4]>,
    /// Slots this one registered with through `add_dependent`.
    pub(crate) sources: SmallVec<[SlotKey; 2]>,
    pub(crate) owner: Option<ComponentKey>,
    pub(crate) indexed_by: SmallVec<[ComponentKey; 1]>,
    pub(crate) body: SlotBody,
}

impl SlotNode {
    fn new<T: 'static>(policy: ConnectionPolicy, body: SlotBody) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            policy,
            controller: None,
            dependents: SmallVec::new(),
            sources: SmallVec::new(),
            owner: None,
            indexed_by: SmallVec::new(),
            body,
        }
    }

    pub(crate) fn is_array(&self) -> bool {
        matches!(self.body, SlotBody::Array(_))
    }

    /// Whether the value depends on something upstream.
    pub(crate) fn is_derived(&self) -> bool {
        self.controller.is_some()
            || matches!(&self.body, SlotBody::Value(cell) if cell.procedure.is_procedural())
    }

    pub(crate) fn expect<T: 'static>(&self, array: bool) -> Result<()> {
        if self.type_id != TypeId::of::<T>() || self.is_array() != array {
            return Err(GraphError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: self.type_name,
            });
        }
        Ok(())
    }
}

/// Copy of a slot's payload, taken before its connection goes away.
pub(crate) enum Snapshot {
    Value(Option<Box<dyn ErasedValue>>),
    Array(Box<dyn ArrayStorage>, usize),
}

pub(crate) struct ObserverNode {
    pub(crate) hook: Box<dyn Dependent>,
    pub(crate) sources: SmallVec<[SlotKey; 2]>,
}

// ============================================================================
// SlotGraph
// ============================================================================

/// Arena of slots, size constraints, observers and components.
pub struct SlotGraph {
    pub(crate) settings: GraphSettings,
    pub(crate) slots: SlotMap<SlotKey, SlotNode>,
    pub(crate) constraints: SlotMap<ConstraintKey, ConstraintNode>,
    pub(crate) observers: SlotMap<ObserverKey, ObserverNode>,
    pub(crate) components: SlotMap<ComponentKey, Component>,
    pub(crate) fixed_constraints: FxHashMap<usize, ConstraintKey>,
}

impl Default for SlotGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlotGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotGraph")
            .field("settings", &self.settings)
            .field("slots", &self.slots.len())
            .field("constraints", &self.constraints.len())
            .field("observers", &self.observers.len())
            .field("components", &self.components.len())
            .finish()
    }
}

impl SlotGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(GraphSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: GraphSettings) -> Self {
        Self {
            settings,
            slots: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            observers: SlotMap::with_key(),
            components: SlotMap::with_key(),
            fixed_constraints: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Number of live slots.
    #[inline]
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Whether `slot` still refers to a live slot.
    #[must_use]
    pub fn contains(&self, slot: impl SlotHandle) -> bool {
        self.slots.contains_key(slot.key())
    }

    /// Whether `slot` is an array slot.
    pub fn is_array(&self, slot: impl SlotHandle) -> Result<bool> {
        Ok(self.node(slot.key())?.is_array())
    }

    /// Name of the payload (element) type of `slot`.
    pub fn type_name(&self, slot: impl SlotHandle) -> Result<&'static str> {
        Ok(self.node(slot.key())?.type_name)
    }

    pub(crate) fn node(&self, key: SlotKey) -> Result<&SlotNode> {
        self.slots
            .get(key)
            .ok_or_else(|| GraphError::not_found(format!("slot {key:?} does not exist")))
    }

    pub(crate) fn node_mut(&mut self, key: SlotKey) -> Result<&mut SlotNode> {
        self.slots
            .get_mut(key)
            .ok_or_else(|| GraphError::not_found(format!("slot {key:?} does not exist")))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Adds a stored slot that accepts one input connection.
    pub fn add_slot<T: SlotValue>(&mut self, value: T) -> Slot<T> {
        self.add_slot_with_policy(value, ConnectionPolicy::Single)
    }

    pub fn add_slot_with_policy<T: SlotValue>(&mut self, value: T, policy: ConnectionPolicy) -> Slot<T> {
        let cell = ValueCell {
            value: Some(Box::new(value)),
            valid: true,
            procedure: ProcedureState::None,
        };
        let key = self.slots.insert(SlotNode::new::<T>(policy, SlotBody::Value(cell)));
        log::trace!("add_slot {key:?} <{}>", std::any::type_name::<T>());
        Slot::from_key(key)
    }

    /// Adds a procedural slot. It never accepts input connections.
    pub fn add_procedural<P: Procedure>(&mut self, procedure: P) -> Slot<P::Output> {
        self.add_derived(procedure, ConnectionPolicy::NoInput)
    }

    /// Adds a slot whose value comes from `procedure` while it is not
    /// connected to a controller.
    pub fn add_derived<P: Procedure>(&mut self, procedure: P, policy: ConnectionPolicy) -> Slot<P::Output> {
        let cell = ValueCell {
            value: None,
            valid: false,
            procedure: ProcedureState::Idle(Box::new(procedure)),
        };
        let key = self
            .slots
            .insert(SlotNode::new::<P::Output>(policy, SlotBody::Value(cell)));
        log::trace!("add_procedural {key:?} <{}>", std::any::type_name::<P::Output>());
        Slot::from_key(key)
    }

    /// Adds an unconstrained, empty array slot whose items hold
    /// `multiplicity` elements each.
    pub fn add_array<T: ArrayValue>(&mut self, multiplicity: usize) -> Result<ArraySlot<T>> {
        if multiplicity == 0 {
            return Err(GraphError::invalid("array multiplicity must be at least 1"));
        }
        let cell = ArrayCell {
            storage: Box::new(Vec::<T>::new()),
            multiplicity,
            size: 0,
            constraint: None,
        };
        let key = self
            .slots
            .insert(SlotNode::new::<T>(ConnectionPolicy::Single, SlotBody::Array(cell)));
        log::trace!("add_array {key:?} <{}> x{multiplicity}", std::any::type_name::<T>());
        Ok(ArraySlot::from_key(key))
    }

    /// Adds an array slot governed by `constraint`; it starts at the
    /// constraint's size.
    pub fn add_array_with_constraint<T: ArrayValue>(
        &mut self,
        multiplicity: usize,
        constraint: ConstraintKey,
    ) -> Result<ArraySlot<T>> {
        self.constraint(constraint)?;
        let slot = self.add_array::<T>(multiplicity)?;
        if let Err(err) = self.register_slot(constraint, slot) {
            self.slots.remove(slot.key());
            return Err(err);
        }
        Ok(slot)
    }

    /// Recovers a typed scalar handle from an untyped key.
    pub fn typed_slot<T: SlotValue>(&self, key: SlotKey) -> Result<Slot<T>> {
        self.node(key)?.expect::<T>(false)?;
        Ok(Slot::from_key(key))
    }

    /// Recovers a typed array handle from an untyped key.
    pub fn typed_array<T: ArrayValue>(&self, key: SlotKey) -> Result<ArraySlot<T>> {
        self.node(key)?.expect::<T>(true)?;
        Ok(ArraySlot::from_key(key))
    }

    // ========================================================================
    // Scalar values
    // ========================================================================

    /// Returns a reference to the current value, recomputing it first if the
    /// slot (or the root of its controller chain) is a stale procedural slot.
    pub fn value<T: SlotValue>(&mut self, slot: Slot<T>) -> Result<&T> {
        self.node(slot.key())?.expect::<T>(false)?;
        let root = self.resolve_controller(slot.key())?;
        self.ensure_current(root)?;

        let node = self.node(root)?;
        let SlotBody::Value(cell) = &node.body else {
            return Err(GraphError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: node.type_name,
            });
        };
        cell.value
            .as_deref()
            .and_then(|value| value.as_any().downcast_ref::<T>())
            .ok_or_else(|| GraphError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: node.type_name,
            })
    }

    /// Returns a copy of the current value.
    pub fn get<T: SlotValue>(&mut self, slot: Slot<T>) -> Result<T> {
        self.value(slot).cloned()
    }

    /// Writes a value and notifies every dependent.
    ///
    /// Fails with `InvalidOperation` on connected slots and on procedural
    /// slots without a setter.
    pub fn set<T: SlotValue>(&mut self, slot: Slot<T>, value: T) -> Result<()> {
        let key = slot.key();
        let node = self.node_mut(key)?;
        node.expect::<T>(false)?;
        if node.controller.is_some() {
            return Err(GraphError::invalid(
                "slot is connected to a controller and cannot be set",
            ));
        }
        let SlotBody::Value(cell) = &mut node.body else {
            return Err(GraphError::invalid("array slots are written with set_values"));
        };

        if cell.procedure.is_procedural() {
            self.run_setter(key, Box::new(value))?;
        } else {
            cell.value = Some(Box::new(value));
            cell.valid = true;
        }

        self.notify_value_changed(key);
        Ok(())
    }

    /// Hands a written value to the procedure of `key` and marks the slot
    /// stale on success.
    fn run_setter(&mut self, key: SlotKey, value: Box<dyn Any>) -> Result<()> {
        let SlotBody::Value(cell) = &mut self.node_mut(key)?.body else {
            return Err(GraphError::invalid("array slots are written with set_values"));
        };
        let mut procedure = match std::mem::replace(&mut cell.procedure, ProcedureState::Running) {
            ProcedureState::Idle(procedure) => procedure,
            ProcedureState::Running => {
                return Err(GraphError::Cycle(format!(
                    "slot {key:?} was written while its procedure was running"
                )));
            }
            ProcedureState::None => {
                cell.procedure = ProcedureState::None;
                return Err(GraphError::invalid("slot has no procedure"));
            }
        };

        let result = procedure.set(self, value);
        if let Some(SlotBody::Value(cell)) = self.slots.get_mut(key).map(|n| &mut n.body) {
            cell.procedure = ProcedureState::Idle(procedure);
            if result.is_ok() {
                cell.valid = false;
            }
        }
        result
    }

    /// Marks a derived value stale and notifies every dependent.
    ///
    /// Owners use this when state a procedure reads from changed outside the
    /// graph.
    pub fn invalidate(&mut self, slot: impl SlotHandle) -> Result<()> {
        let key = slot.key();
        let node = self.node_mut(key)?;
        match &mut node.body {
            SlotBody::Value(cell) => {
                if cell.procedure.is_procedural() {
                    cell.valid = false;
                }
                self.notify_value_changed(key);
            }
            SlotBody::Array(_) => {
                let size = self.array_size_of(key)?;
                self.notify_range_changed(key, 0, size);
            }
        }
        Ok(())
    }

    /// Whether a procedural slot currently holds a computed value. Stored
    /// slots are always cached.
    pub fn is_cached(&self, slot: impl SlotHandle) -> Result<bool> {
        match &self.node(slot.key())?.body {
            SlotBody::Value(cell) => Ok(cell.valid),
            SlotBody::Array(_) => Ok(true),
        }
    }

    /// Follows the controller chain of `key` to the slot that owns the value.
    pub(crate) fn resolve_controller(&self, key: SlotKey) -> Result<SlotKey> {
        let mut current = key;
        for _ in 0..=self.slots.len() {
            match self.node(current)?.controller {
                Some(controller) => current = controller,
                None => return Ok(current),
            }
        }
        Err(GraphError::Cycle(format!("controller chain of slot {key:?} loops")))
    }

    /// Recomputes a stale procedural slot. Stored slots are left untouched.
    pub(crate) fn ensure_current(&mut self, key: SlotKey) -> Result<()> {
        let node = self.node_mut(key)?;
        let SlotBody::Value(cell) = &mut node.body else {
            return Ok(());
        };
        if cell.valid {
            return Ok(());
        }

        let mut procedure = match std::mem::replace(&mut cell.procedure, ProcedureState::Running) {
            ProcedureState::Idle(procedure) => procedure,
            ProcedureState::Running => {
                return Err(GraphError::Cycle(format!(
                    "slot {key:?} was read while computing its own value"
                )));
            }
            ProcedureState::None => {
                cell.procedure = ProcedureState::None;
                cell.valid = true;
                return Ok(());
            }
        };

        log::trace!("recompute {key:?}");
        let result = procedure.compute(self);

        // The procedure may have destroyed its own slot.
        let Some(SlotBody::Value(cell)) = self.slots.get_mut(key).map(|n| &mut n.body) else {
            return result.map(drop);
        };
        cell.procedure = ProcedureState::Idle(procedure);
        cell.value = Some(result?);
        cell.valid = true;
        Ok(())
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Makes `slot` mirror `controller`.
    pub fn connect<H: SlotHandle>(&mut self, controller: H, slot: H) -> Result<()> {
        self.connect_any(controller.key(), slot.key())
    }

    /// Untyped [`connect`](Self::connect); payload types are checked at runtime.
    pub fn connect_any(&mut self, controller: SlotKey, slot: SlotKey) -> Result<()> {
        if controller == slot {
            return Err(GraphError::Cycle("a slot cannot control itself".into()));
        }
        let ctrl = self.node(controller)?;
        let node = self.node(slot)?;
        if ctrl.type_id != node.type_id || ctrl.is_array() != node.is_array() {
            return Err(GraphError::TypeMismatch {
                expected: node.type_name,
                found: ctrl.type_name,
            });
        }
        if node.controller == Some(controller) {
            return Ok(());
        }
        match node.policy {
            ConnectionPolicy::NoInput => {
                return Err(GraphError::invalid("slot does not accept input connections"));
            }
            ConnectionPolicy::Single if node.controller.is_some() => {
                return Err(GraphError::invalid(
                    "slot is already connected; disconnect it first",
                ));
            }
            _ => {}
        }
        if let (SlotBody::Array(ctrl_cell), SlotBody::Array(cell)) = (&ctrl.body, &node.body) {
            if ctrl_cell.multiplicity != cell.multiplicity {
                return Err(GraphError::invalid(format!(
                    "cannot connect arrays of multiplicity {} and {}",
                    ctrl_cell.multiplicity, cell.multiplicity
                )));
            }
            if cell.constraint.is_some() {
                return Err(GraphError::invalid(
                    "a size-constrained array cannot take an input connection",
                ));
            }
        }
        if self.settings.detect_cycles && self.reaches(slot, controller) {
            return Err(GraphError::Cycle(format!(
                "connecting {controller:?} -> {slot:?} would close a cycle"
            )));
        }

        let is_array = node.is_array();
        let previous = node.controller;
        let old_size = if is_array { Some(self.array_size_of(slot)?) } else { None };
        if let Some(old_size) = old_size {
            let new_size = self.array_size_of(controller)?;
            if old_size != new_size && self.slot_resize_vetoed(slot, new_size) {
                return Err(GraphError::Vetoed { size: new_size });
            }
        }

        self.link_controller(slot, controller, previous);
        log::debug!("connect {controller:?} -> {slot:?}");

        if let Some(old_size) = old_size {
            let new_size = self.array_size_of(slot)?;
            if new_size != old_size
                && let Err(err) = self.notify_resize(slot, new_size)
            {
                self.unlink_controller(slot);
                if let Some(previous) = previous {
                    self.link_controller(slot, previous, None);
                }
                self.renotify_resize(slot, old_size);
                return Err(err);
            }
            self.notify_range_changed(slot, 0, new_size);
        } else {
            self.slot_on_value_changed(slot);
        }
        Ok(())
    }

    /// Removes the input connection of `slot`. The slot keeps a copy of the
    /// controller's current value; derived slots receive it through their
    /// procedure's setter.
    pub fn disconnect(&mut self, slot: impl SlotHandle) -> Result<()> {
        let key = slot.key();
        if self.node(key)?.controller.is_none() {
            return Err(GraphError::not_found(format!("slot {key:?} is not connected")));
        }
        let snapshot = self.controller_snapshot(key)?;
        self.unlink_controller(key);
        log::debug!("disconnect {key:?}");
        self.adopt(key, snapshot);
        Ok(())
    }

    /// Returns the controller `slot` is connected to, if any.
    pub fn controller(&self, slot: impl SlotHandle) -> Result<Option<SlotKey>> {
        Ok(self.node(slot.key())?.controller)
    }

    fn link_controller(&mut self, slot: SlotKey, controller: SlotKey, previous: Option<SlotKey>) {
        if let Some(previous) = previous {
            self.detach_dependent(previous, DependentId::Slot(slot));
        }
        if let Some(node) = self.slots.get_mut(slot) {
            node.controller = Some(controller);
        }
        if let Some(ctrl) = self.slots.get_mut(controller) {
            ctrl.dependents.push(DependentId::Slot(slot));
        }
    }

    pub(crate) fn unlink_controller(&mut self, slot: SlotKey) {
        let Some(controller) = self.slots.get_mut(slot).and_then(|n| n.controller.take()) else {
            return;
        };
        self.detach_dependent(controller, DependentId::Slot(slot));
    }

    /// Copies the current value of the controller chain `key` mirrors.
    pub(crate) fn controller_snapshot(&mut self, key: SlotKey) -> Result<Snapshot> {
        let root = self.resolve_controller(key)?;
        self.ensure_current(root)?;
        Ok(match &self.node(root)?.body {
            SlotBody::Value(cell) => Snapshot::Value(cell.value.as_deref().map(|v| v.clone_value())),
            SlotBody::Array(cell) => Snapshot::Array(cell.storage.clone_storage(), cell.size),
        })
    }

    /// Stores a snapshot in a slot that has just lost its controller.
    pub(crate) fn adopt(&mut self, key: SlotKey, snapshot: Snapshot) {
        let Some(node) = self.slots.get_mut(key) else {
            return;
        };
        match (&mut node.body, snapshot) {
            (SlotBody::Array(cell), Snapshot::Array(storage, size)) => {
                cell.storage = storage;
                cell.size = size;
            }
            (SlotBody::Value(cell), Snapshot::Value(value)) if !cell.procedure.is_procedural() => {
                cell.value = value;
                cell.valid = true;
            }
            (SlotBody::Value(cell), Snapshot::Value(value)) => {
                cell.valid = false;
                if let Some(value) = value
                    && let Err(err) = self.run_setter(key, ErasedValue::into_any(value))
                {
                    log::debug!("{key:?} falls back to its procedure: {err}");
                }
                self.notify_value_changed(key);
            }
            _ => {}
        }
    }

    // ========================================================================
    // Dependents
    // ========================================================================

    /// Registers `dependent` to be notified when `source` changes.
    pub fn add_dependent(&mut self, source: impl SlotHandle, dependent: impl Into<DependentId>) -> Result<()> {
        let source = source.key();
        let dependent = dependent.into();
        if self.node(source)?.dependents.contains(&dependent) {
            return Err(GraphError::AlreadyRegistered(format!(
                "{dependent:?} already depends on slot {source:?}"
            )));
        }

        match dependent {
            DependentId::Slot(key) => {
                self.node(key)?;
                if key == source || (self.settings.detect_cycles && self.reaches(key, source)) {
                    return Err(GraphError::Cycle(format!(
                        "{key:?} depending on {source:?} would close a cycle"
                    )));
                }
                self.node_mut(key)?.sources.push(source);
            }
            DependentId::Observer(key) => {
                let observer = self
                    .observers
                    .get_mut(key)
                    .ok_or_else(|| GraphError::not_found(format!("observer {key:?} does not exist")))?;
                observer.sources.push(source);
            }
            DependentId::Constraint(_) => {
                return Err(GraphError::invalid(
                    "size constraints follow their controller; use add_linear_constraint",
                ));
            }
        }

        self.node_mut(source)?.dependents.push(dependent);
        log::debug!("add_dependent {source:?} -> {dependent:?}");
        Ok(())
    }

    /// Unregisters a dependent added with [`add_dependent`](Self::add_dependent).
    pub fn remove_dependent(&mut self, source: impl SlotHandle, dependent: impl Into<DependentId>) -> Result<()> {
        let source = source.key();
        let dependent = dependent.into();
        let node = self.node(source)?;
        if !node.dependents.contains(&dependent) {
            return Err(GraphError::not_found(format!(
                "{dependent:?} is not a dependent of slot {source:?}"
            )));
        }

        match dependent {
            DependentId::Slot(key) => {
                let dep = self.node_mut(key)?;
                if dep.controller == Some(source) {
                    return Err(GraphError::invalid("connected slots are detached with disconnect"));
                }
                if let Some(pos) = dep.sources.iter().position(|&s| s == source) {
                    dep.sources.remove(pos);
                }
            }
            DependentId::Observer(key) => {
                if let Some(observer) = self.observers.get_mut(key)
                    && let Some(pos) = observer.sources.iter().position(|&s| s == source)
                {
                    observer.sources.remove(pos);
                }
            }
            DependentId::Constraint(_) => {
                return Err(GraphError::invalid(
                    "size constraints are detached with remove_constraint",
                ));
            }
        }

        self.detach_dependent(source, dependent);
        log::debug!("remove_dependent {source:?} -> {dependent:?}");
        Ok(())
    }

    /// Dependents of `source`, in notification order.
    pub fn dependents(&self, source: impl SlotHandle) -> Result<&[DependentId]> {
        Ok(&self.node(source.key())?.dependents)
    }

    pub(crate) fn detach_dependent(&mut self, source: SlotKey, dependent: DependentId) {
        if let Some(node) = self.slots.get_mut(source)
            && let Some(pos) = node.dependents.iter().position(|&d| d == dependent)
        {
            node.dependents.remove(pos);
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Moves an external dependent into the graph. Attach it to slots with
    /// [`add_dependent`](Self::add_dependent).
    pub fn add_observer(&mut self, observer: impl Dependent + 'static) -> ObserverKey {
        self.observers.insert(ObserverNode {
            hook: Box::new(observer),
            sources: SmallVec::new(),
        })
    }

    /// Detaches an observer from every slot and hands it back.
    pub fn remove_observer(&mut self, key: ObserverKey) -> Result<Box<dyn Dependent>> {
        let observer = self
            .observers
            .remove(key)
            .ok_or_else(|| GraphError::not_found(format!("observer {key:?} does not exist")))?;
        for source in observer.sources {
            self.detach_dependent(source, DependentId::Observer(key));
        }
        Ok(observer.hook)
    }

    // ========================================================================
    // Destruction
    // ========================================================================

    /// Destroys a slot.
    ///
    /// Dependents receive `on_controller_deleted` while the slot still exists;
    /// connected mirrors keep a copy of its last value. Afterwards the slot is
    /// detached from its controller, its sources, its size constraint and
    /// every component indexing it.
    pub fn remove_slot(&mut self, slot: impl SlotHandle) -> Result<()> {
        let key = slot.key();
        self.node(key)?;
        log::debug!("remove_slot {key:?}");

        self.notify_controller_deleted(key);

        let Some(node) = self.slots.remove(key) else {
            return Ok(());
        };
        if let Some(controller) = node.controller {
            self.detach_dependent(controller, DependentId::Slot(key));
        }
        for source in node.sources {
            self.detach_dependent(source, DependentId::Slot(key));
        }
        if let SlotBody::Array(cell) = &node.body
            && let Some(constraint) = cell.constraint
            && let Some(constraint) = self.constraints.get_mut(constraint)
        {
            constraint.slots.retain(|s| *s != key);
        }
        for component in node.indexed_by {
            if let Some(component) = self.components.get_mut(component) {
                component.forget(key);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Cycle detection
    // ========================================================================

    /// Whether `to` is reachable from `from` along notification edges.
    pub(crate) fn reaches(&self, from: SlotKey, to: SlotKey) -> bool {
        let mut stack: SmallVec<[SlotKey; 16]> = SmallVec::new();
        let mut visited = rustc_hash::FxHashSet::default();
        stack.push(from);

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.slots.get(current) else {
                continue;
            };
            for dependent in &node.dependents {
                match *dependent {
                    DependentId::Slot(next) => stack.push(next),
                    DependentId::Constraint(c) => {
                        if let Some(constraint) = self.constraints.get(c) {
                            stack.extend(constraint.slots.iter().copied());
                        }
                    }
                    DependentId::Observer(_) => {}
                }
            }
        }
        false
    }
}

//! Dependents
//!
//! A dependent is anything that must react when a slot changes: another slot,
//! a size constraint, or an external observer such as a cache flag kept by a
//! geometry. The graph records dependents by [`DependentId`] and delivers the
//! notifications synchronously, depth first, in registration order.
//!
//! External code takes part in the protocol by implementing [`Dependent`]
//! (every hook defaults to a no-op) or by wrapping closures in a
//! [`Forwarder`], and handing the object to `SlotGraph::add_observer`.

use std::fmt;

use myth_core::{ConstraintKey, ObserverKey, SlotKey};

use crate::handle::{ArraySlot, Slot};

/// Observer capability.
///
/// Hooks receive no access to the graph: they run in the middle of a
/// notification pass and may only update state they own.
pub trait Dependent {
    /// The value of a scalar controller changed.
    fn on_value_changed(&mut self) {}

    /// Items `[start, end)` of an array controller changed.
    fn on_value_changed_range(&mut self, start: usize, end: usize) {
        let _ = (start, end);
    }

    /// An array controller now holds `size` items.
    fn on_resize(&mut self, size: usize) {
        let _ = size;
    }

    /// Returns `true` to reject resizing the controller to `size` items.
    fn query_resize_veto(&mut self, size: usize) -> bool {
        let _ = size;
        false
    }

    /// The controller is about to be destroyed. The observer is detached from
    /// it automatically afterwards.
    fn on_controller_deleted(&mut self) {}
}

/// Identifies a dependent registered with a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependentId {
    /// Another slot (a connected mirror or a procedural consumer).
    Slot(SlotKey),
    /// A size constraint driven by the slot's size.
    Constraint(ConstraintKey),
    /// An external observer.
    Observer(ObserverKey),
}

impl From<SlotKey> for DependentId {
    fn from(key: SlotKey) -> Self {
        Self::Slot(key)
    }
}

impl<T> From<Slot<T>> for DependentId {
    fn from(slot: Slot<T>) -> Self {
        Self::Slot(slot.key())
    }
}

impl<T> From<ArraySlot<T>> for DependentId {
    fn from(slot: ArraySlot<T>) -> Self {
        Self::Slot(slot.key())
    }
}

impl From<ConstraintKey> for DependentId {
    fn from(key: ConstraintKey) -> Self {
        Self::Constraint(key)
    }
}

impl From<ObserverKey> for DependentId {
    fn from(key: ObserverKey) -> Self {
        Self::Observer(key)
    }
}

// ============================================================================
// Forwarder
// ============================================================================

type ValueChangedFn = Box<dyn FnMut()>;
type RangeChangedFn = Box<dyn FnMut(usize, usize)>;
type ResizeFn = Box<dyn FnMut(usize)>;
type VetoFn = Box<dyn FnMut(usize) -> bool>;
type DeletedFn = Box<dyn FnMut()>;

/// Forwards slot events to closures.
///
/// Lets an owner keep ordinary member state (a bounding box cache flag, a
/// "mass properties valid" flag) in sync with slot events without that state
/// being a slot itself. The closures usually capture an `Rc<Cell<_>>` shared
/// with the owner.
///
/// ```rust,ignore
/// let bb_valid = Rc::new(Cell::new(true));
/// let flag = bb_valid.clone();
/// let forwarder = Forwarder::new()
///     .on_value_changed_range(move |_, _| flag.set(false));
/// let observer = graph.add_observer(forwarder);
/// graph.add_dependent(mesh.verts, observer)?;
/// ```
#[derive(Default)]
pub struct Forwarder {
    value_changed: Option<ValueChangedFn>,
    range_changed: Option<RangeChangedFn>,
    resize: Option<ResizeFn>,
    veto: Option<VetoFn>,
    deleted: Option<DeletedFn>,
}

impl Forwarder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_value_changed(mut self, f: impl FnMut() + 'static) -> Self {
        self.value_changed = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_value_changed_range(mut self, f: impl FnMut(usize, usize) + 'static) -> Self {
        self.range_changed = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_resize(mut self, f: impl FnMut(usize) + 'static) -> Self {
        self.resize = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn query_resize_veto(mut self, f: impl FnMut(usize) -> bool + 'static) -> Self {
        self.veto = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_controller_deleted(mut self, f: impl FnMut() + 'static) -> Self {
        self.deleted = Some(Box::new(f));
        self
    }
}

impl Dependent for Forwarder {
    fn on_value_changed(&mut self) {
        if let Some(f) = &mut self.value_changed {
            f();
        }
    }

    fn on_value_changed_range(&mut self, start: usize, end: usize) {
        if let Some(f) = &mut self.range_changed {
            f(start, end);
        }
    }

    fn on_resize(&mut self, size: usize) {
        if let Some(f) = &mut self.resize {
            f(size);
        }
    }

    fn query_resize_veto(&mut self, size: usize) -> bool {
        self.veto.as_mut().is_some_and(|f| f(size))
    }

    fn on_controller_deleted(&mut self) {
        if let Some(f) = &mut self.deleted {
            f();
        }
    }
}

impl fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarder")
            .field("value_changed", &self.value_changed.is_some())
            .field("range_changed", &self.range_changed.is_some())
            .field("resize", &self.resize.is_some())
            .field("veto", &self.veto.is_some())
            .field("deleted", &self.deleted.is_some())
            .finish()
    }
}

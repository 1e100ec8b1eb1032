//! Procedural slots.
//!
//! A procedural slot computes its value instead of storing it. The slot never
//! knows how: it delegates to a [`Procedure`] supplied by the owner (usually
//! the component the slot belongs to). The graph calls
//! [`compute_value`](Procedure::compute_value) lazily, on the first read after
//! an invalidation, and caches the result until the next invalidation.
//!
//! Besides computing, a procedure receives the slot's invalidation events
//! (after the graph has marked the cache stale and forwarded the event), so
//! owner state that is not a slot can follow along.

use std::any::Any;
use std::fmt;

use myth_core::{GraphError, Result};

use crate::graph::SlotGraph;
use crate::storage::{ErasedValue, SlotValue};

/// Computation delegate of a procedural slot.
pub trait Procedure: 'static {
    /// The payload type of the slot.
    type Output: SlotValue;

    /// Produces the current value. Other slots may be read through `graph`.
    fn compute_value(&mut self, graph: &mut SlotGraph) -> Result<Self::Output>;

    /// Accepts a value written through `SlotGraph::set`.
    ///
    /// Procedural slots are read-only unless the owner wires a setter here.
    /// After a successful call the slot is invalidated, so the next read goes
    /// through [`compute_value`](Self::compute_value) again.
    fn set_value(&mut self, graph: &mut SlotGraph, value: Self::Output) -> Result<()> {
        let _ = (graph, value);
        Err(GraphError::invalid("procedural slot has no setter"))
    }

    /// A scalar upstream slot changed.
    fn on_value_changed(&mut self) {}

    /// Items `[start, end)` of an upstream array changed.
    fn on_value_changed_range(&mut self, start: usize, end: usize) {
        let _ = (start, end);
    }

    /// An upstream array now holds `size` items.
    fn on_resize(&mut self, size: usize) {
        let _ = size;
    }
}

// ============================================================================
// Closure adapter
// ============================================================================

type ComputeFn<T> = Box<dyn FnMut(&mut SlotGraph) -> Result<T>>;
type SetFn<T> = Box<dyn FnMut(&mut SlotGraph, T) -> Result<()>>;

/// [`Procedure`] built from closures.
///
/// ```rust,ignore
/// let area = graph.add_procedural(FnProcedure::new(move |g| {
///     Ok(g.get(width)? * g.get(height)?)
/// }));
/// graph.add_dependent(width, area)?;
/// graph.add_dependent(height, area)?;
/// ```
pub struct FnProcedure<T> {
    compute: ComputeFn<T>,
    set: Option<SetFn<T>>,
    changed: Option<Box<dyn FnMut()>>,
    range_changed: Option<Box<dyn FnMut(usize, usize)>>,
    resize: Option<Box<dyn FnMut(usize)>>,
}

impl<T: SlotValue> FnProcedure<T> {
    pub fn new(compute: impl FnMut(&mut SlotGraph) -> Result<T> + 'static) -> Self {
        Self {
            compute: Box::new(compute),
            set: None,
            changed: None,
            range_changed: None,
            resize: None,
        }
    }

    /// Wires a setter, making the slot writable.
    #[must_use]
    pub fn with_setter(mut self, set: impl FnMut(&mut SlotGraph, T) -> Result<()> + 'static) -> Self {
        self.set = Some(Box::new(set));
        self
    }

    #[must_use]
    pub fn on_value_changed(mut self, f: impl FnMut() + 'static) -> Self {
        self.changed = Some(Box::new(f));
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
}

impl<T: SlotValue> Procedure for FnProcedure<T> {
    type Output = T;

    fn compute_value(&mut self, graph: &mut SlotGraph) -> Result<T> {
        (self.compute)(graph)
    }

    fn set_value(&mut self, graph: &mut SlotGraph, value: T) -> Result<()> {
        match &mut self.set {
            Some(set) => set(graph, value),
            None => Err(GraphError::invalid("procedural slot has no setter")),
        }
    }

    fn on_value_changed(&mut self) {
        if let Some(f) = &mut self.changed {
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
}

impl<T> fmt::Debug for FnProcedure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcedure")
            .field("output", &std::any::type_name::<T>())
            .field("setter", &self.set.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Type erasure
// ============================================================================

pub(crate) trait ErasedProcedure {
    fn compute(&mut self, graph: &mut SlotGraph) -> Result<Box<dyn ErasedValue>>;
    fn set(&mut self, graph: &mut SlotGraph, value: Box<dyn Any>) -> Result<()>;
    fn on_value_changed(&mut self);
    fn on_value_changed_range(&mut self, start: usize, end: usize);
    fn on_resize(&mut self, size: usize);
}

impl<P: Procedure> ErasedProcedure for P {
    fn compute(&mut self, graph: &mut SlotGraph) -> Result<Box<dyn ErasedValue>> {
        let value = self.compute_value(graph)?;
        Ok(Box::new(value))
    }

    fn set(&mut self, graph: &mut SlotGraph, value: Box<dyn Any>) -> Result<()> {
        let value = value.downcast::<P::Output>().map_err(|_| GraphError::TypeMismatch {
            expected: std::any::type_name::<P::Output>(),
            found: "<erased value>",
        })?;
        self.set_value(graph, *value)
    }

    fn on_value_changed(&mut self) {
        Procedure::on_value_changed(self);
    }

    fn on_value_changed_range(&mut self, start: usize, end: usize) {
        Procedure::on_value_changed_range(self, start, end);
    }

    fn on_resize(&mut self, size: usize) {
        Procedure::on_resize(self, size);
    }
}

/// Lifecycle of the procedure attached to a scalar slot.
pub(crate) enum ProcedureState {
    /// Plain stored slot.
    None,
    Idle(Box<dyn ErasedProcedure>),
    /// Taken out of the slot while it computes or accepts a value.
    Running,
}

impl ProcedureState {
    pub(crate) fn is_procedural(&self) -> bool {
        !matches!(self, Self::None)
    }
}

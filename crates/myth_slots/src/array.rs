//! Array slots.
//!
//! An array slot holds `size` items of `multiplicity` elements each, stored
//! contiguously in a `Vec<T>` of `size * multiplicity` elements. A triangle
//! face list, for instance, is an `ArraySlot<i32>` with multiplicity 3.
//!
//! Dependents see two kinds of events: a range of items changed, or the array
//! now holds a different number of items. A resize is negotiated first: any
//! dependent (including a linear size constraint fed by this array) may veto
//! it, in which case nothing changes.

use myth_core::{ConstraintKey, GraphError, Result, SlotKey};

use crate::graph::{ArrayCell, SlotBody, SlotGraph};
use crate::handle::{ArraySlot, SlotHandle};
use crate::storage::{ArrayValue, Tail};

/// A committed resize: the slot, its old item count and the elements a
/// shrink cut off.
pub(crate) struct ResizeUndo {
    key: SlotKey,
    previous: usize,
    tail: Tail,
}

/// Who asked for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResizeOrigin {
    External,
    Constraint(ConstraintKey),
}

fn not_an_array(key: SlotKey) -> GraphError {
    GraphError::invalid(format!("slot {key:?} is not an array slot"))
}

fn element_count(size: usize, multiplicity: usize) -> Result<usize> {
    size.checked_mul(multiplicity).ok_or_else(|| {
        GraphError::invalid(format!(
            "{size} items of multiplicity {multiplicity} exceed the addressable element count"
        ))
    })
}

fn elements<'a, T: ArrayValue>(cell: &'a ArrayCell, type_name: &'static str) -> Result<&'a Vec<T>> {
    cell.storage
        .as_any()
        .downcast_ref::<Vec<T>>()
        .ok_or(GraphError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: type_name,
        })
}

fn elements_mut<'a, T: ArrayValue>(cell: &'a mut ArrayCell, type_name: &'static str) -> Result<&'a mut Vec<T>> {
    cell.storage
        .as_any_mut()
        .downcast_mut::<Vec<T>>()
        .ok_or(GraphError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: type_name,
        })
}

impl SlotGraph {
    pub(crate) fn array_cell(&self, key: SlotKey) -> Result<&ArrayCell> {
        match &self.node(key)?.body {
            SlotBody::Array(cell) => Ok(cell),
            SlotBody::Value(_) => Err(not_an_array(key)),
        }
    }

    /// Item count of the array `key` mirrors (itself when unconnected).
    pub(crate) fn array_size_of(&self, key: SlotKey) -> Result<usize> {
        let root = self.resolve_controller(key)?;
        Ok(self.array_cell(root)?.size)
    }

    /// Number of items in the array.
    pub fn array_size(&self, slot: impl SlotHandle) -> Result<usize> {
        self.array_size_of(slot.key())
    }

    /// Number of elements per item.
    pub fn multiplicity(&self, slot: impl SlotHandle) -> Result<usize> {
        Ok(self.array_cell(slot.key())?.multiplicity)
    }

    // ========================================================================
    // Resizing
    // ========================================================================

    /// Resizes an unconstrained, unconnected array to `size` items.
    ///
    /// New items are default-filled. Fails with `Vetoed` (nothing changed) if
    /// a dependent rejects the size, and restores the previous contents if a
    /// dependent fails while following the resize.
    pub fn resize(&mut self, slot: impl SlotHandle, size: usize) -> Result<()> {
        self.resize_array(slot.key(), size, ResizeOrigin::External)
    }

    /// Whether `slot` could be resized to `size` items right now.
    ///
    /// With `ignore_constraint` the slot's own size constraint is not
    /// consulted; that is how a constraint asks its slots before committing.
    pub fn is_resizable(&mut self, slot: impl SlotHandle, size: usize, ignore_constraint: bool) -> Result<bool> {
        let key = slot.key();
        let node = self.node(key)?;
        let SlotBody::Array(cell) = &node.body else {
            return Err(not_an_array(key));
        };
        if cell.size == size && node.controller.is_none() {
            return Ok(true);
        }
        if node.controller.is_some()
            || (cell.constraint.is_some() && !ignore_constraint)
            || element_count(size, cell.multiplicity).is_err()
        {
            return Ok(false);
        }
        Ok(!self.slot_resize_vetoed(key, size))
    }

    pub(crate) fn resize_array(&mut self, key: SlotKey, size: usize, origin: ResizeOrigin) -> Result<()> {
        self.commit_resize(key, size, origin).map(|_| ())
    }

    /// Resizes and notifies. Returns what [`undo_resize`](Self::undo_resize)
    /// needs to take the resize back, or `None` if the size did not change.
    /// A failure leaves the slot as it was.
    pub(crate) fn commit_resize(&mut self, key: SlotKey, size: usize, origin: ResizeOrigin) -> Result<Option<ResizeUndo>> {
        let node = self.node(key)?;
        let SlotBody::Array(cell) = &node.body else {
            return Err(not_an_array(key));
        };
        if node.controller.is_some() {
            return Err(GraphError::invalid(
                "connected array slots follow the size of their controller",
            ));
        }
        match (cell.constraint, origin) {
            (Some(_), ResizeOrigin::External) => {
                return Err(GraphError::invalid(
                    "array slot is size constrained; resize it through its constraint",
                ));
            }
            (Some(owner), ResizeOrigin::Constraint(by)) if owner != by => {
                return Err(GraphError::invalid(
                    "array slot is governed by a different size constraint",
                ));
            }
            _ => {}
        }
        let previous = cell.size;
        if previous == size {
            return Ok(None);
        }
        let len = element_count(size, cell.multiplicity)?;

        if self.slot_resize_vetoed(key, size) {
            return Err(GraphError::Vetoed { size });
        }

        let cell = self.array_cell_mut(key)?;
        let tail = cell
            .storage
            .resize_elems(len)
            .map_err(|err| GraphError::invalid(format!("cannot hold {size} items: {err}")))?;
        cell.size = size;
        log::trace!("resize {key:?}: {previous} -> {size}");

        let undo = ResizeUndo { key, previous, tail };
        if let Err(err) = self.notify_resize(key, size) {
            self.undo_resize(undo);
            return Err(err);
        }
        Ok(Some(undo))
    }

    /// Puts back the size and contents a committed resize replaced, then
    /// announces the old size again.
    pub(crate) fn undo_resize(&mut self, undo: ResizeUndo) {
        let ResizeUndo { key, previous, tail } = undo;
        if let Ok(cell) = self.array_cell_mut(key) {
            // `previous` items were held before, so the product fits.
            cell.storage.restore_elems(previous * cell.multiplicity, tail);
            cell.size = previous;
        }
        self.renotify_resize(key, previous);
    }

    fn array_cell_mut(&mut self, key: SlotKey) -> Result<&mut ArrayCell> {
        match &mut self.node_mut(key)?.body {
            SlotBody::Array(cell) => Ok(cell),
            SlotBody::Value(_) => Err(not_an_array(key)),
        }
    }

    // ========================================================================
    // Element access
    // ========================================================================

    /// The backing buffer, `size * multiplicity` elements long.
    ///
    /// The borrow keeps the graph immutable, so the slice can never outlive a
    /// resize.
    pub fn values<T: ArrayValue>(&self, slot: ArraySlot<T>) -> Result<&[T]> {
        let node = self.node(slot.key())?;
        node.expect::<T>(true)?;
        let root = self.resolve_controller(slot.key())?;
        let type_name = node.type_name;
        Ok(elements::<T>(self.array_cell(root)?, type_name)?.as_slice())
    }

    /// Copies `count` items starting at item `index`.
    pub fn get_values<T: ArrayValue>(&self, slot: ArraySlot<T>, index: usize, count: usize) -> Result<Vec<T>> {
        let node = self.node(slot.key())?;
        node.expect::<T>(true)?;
        let root = self.resolve_controller(slot.key())?;
        let cell = self.array_cell(root)?;
        check_range("get_values", index, count, cell.size)?;

        let data = elements::<T>(cell, node.type_name)?;
        let m = cell.multiplicity;
        Ok(data[index * m..(index + count) * m].to_vec())
    }

    /// Overwrites items starting at item `index`. `values` must hold a whole
    /// number of items.
    pub fn set_values<T: ArrayValue>(&mut self, slot: ArraySlot<T>, index: usize, values: &[T]) -> Result<()> {
        let key = slot.key();
        let node = self.node_mut(key)?;
        node.expect::<T>(true)?;
        if node.controller.is_some() {
            return Err(GraphError::invalid(
                "slot is connected to a controller and cannot be set",
            ));
        }
        let type_name = node.type_name;
        let SlotBody::Array(cell) = &mut node.body else {
            return Err(not_an_array(key));
        };
        let m = cell.multiplicity;
        if values.len() % m != 0 {
            return Err(GraphError::invalid(format!(
                "{} elements do not form whole items of multiplicity {m}",
                values.len()
            )));
        }
        let count = values.len() / m;
        check_range("set_values", index, count, cell.size)?;

        let data = elements_mut::<T>(cell, type_name)?;
        data[index * m..(index + count) * m].clone_from_slice(values);

        if count > 0 {
            self.notify_range_changed(key, index, index + count);
        }
        Ok(())
    }

    /// Edits the whole buffer in place, then notifies a change of every item.
    pub fn modify_values<T: ArrayValue, R>(
        &mut self,
        slot: ArraySlot<T>,
        edit: impl FnOnce(&mut [T]) -> R,
    ) -> Result<R> {
        let key = slot.key();
        let node = self.node_mut(key)?;
        node.expect::<T>(true)?;
        if node.controller.is_some() {
            return Err(GraphError::invalid(
                "slot is connected to a controller and cannot be set",
            ));
        }
        let type_name = node.type_name;
        let SlotBody::Array(cell) = &mut node.body else {
            return Err(not_an_array(key));
        };
        let size = cell.size;
        let result = edit(elements_mut::<T>(cell, type_name)?.as_mut_slice());

        self.notify_range_changed(key, 0, size);
        Ok(result)
    }
}

fn check_range(context: &str, index: usize, count: usize, len: usize) -> Result<()> {
    if index.checked_add(count).is_none_or(|end| end > len) {
        return Err(GraphError::Index {
            context: context.to_owned(),
            index: index.max(len),
            len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_tracks_multiplicity() {
        let mut graph = SlotGraph::new();
        let faces = graph.add_array::<i32>(3).unwrap();
        graph.resize(faces, 2).unwrap();
        assert_eq!(graph.values(faces).unwrap().len(), 6);

        graph.set_values(faces, 1, &[3, 4, 5]).unwrap();
        assert_eq!(graph.get_values(faces, 1, 1).unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn partial_items_are_rejected() {
        let mut graph = SlotGraph::new();
        let faces = graph.add_array::<i32>(3).unwrap();
        graph.resize(faces, 1).unwrap();
        let err = graph.set_values(faces, 0, &[1, 2]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidOperation(_)));
    }

    #[test]
    fn out_of_range_access_is_an_index_error() {
        let mut graph = SlotGraph::new();
        let verts = graph.add_array::<f64>(1).unwrap();
        graph.resize(verts, 2).unwrap();
        assert!(matches!(
            graph.get_values(verts, 1, 2),
            Err(GraphError::Index { len: 2, .. })
        ));
        assert!(matches!(
            graph.set_values(verts, 2, &[1.0]),
            Err(GraphError::Index { index: 2, .. })
        ));
    }
}

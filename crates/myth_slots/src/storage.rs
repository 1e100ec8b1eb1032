//! Type-erased slot payloads.
//!
//! Scalar slots store a `Box<dyn ErasedValue>`, array slots a
//! `Box<dyn ArrayStorage>`. Both can clone themselves without knowing `T`,
//! which is what lets a slot keep a private copy of its controller's value
//! when the connection goes away.

use std::any::Any;
use std::collections::TryReserveError;

/// Payload bound of scalar slots.
pub trait SlotValue: Clone + 'static {}

impl<T: Clone + 'static> SlotValue for T {}

/// Element bound of array slots. New items are filled with `T::default()`.
pub trait ArrayValue: Clone + Default + 'static {}

impl<T: Clone + Default + 'static> ArrayValue for T {}

pub(crate) trait ErasedValue: Any {
    fn clone_value(&self) -> Box<dyn ErasedValue>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: SlotValue> ErasedValue for T {
    fn clone_value(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Elements removed by a shrinking resize, kept until the resize commits.
pub(crate) type Tail = Option<Box<dyn Any>>;

pub(crate) trait ArrayStorage: Any {
    fn len(&self) -> usize;

    /// Resizes to `len` elements; when shrinking, returns the removed tail.
    /// Fails without touching the buffer if growing cannot be allocated.
    fn resize_elems(&mut self, len: usize) -> Result<Tail, TryReserveError>;

    /// Undoes a `resize_elems` call: truncates back to `len` elements or
    /// re-appends the saved tail.
    fn restore_elems(&mut self, len: usize, tail: Tail);

    fn clone_storage(&self) -> Box<dyn ArrayStorage>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ArrayValue> ArrayStorage for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn resize_elems(&mut self, len: usize) -> Result<Tail, TryReserveError> {
        if len < Vec::len(self) {
            return Ok(Some(Box::new(self.split_off(len))));
        }
        self.try_reserve(len - Vec::len(self))?;
        self.resize(len, T::default());
        Ok(None)
    }

    fn restore_elems(&mut self, len: usize, tail: Tail) {
        self.truncate(len);
        if let Some(tail) = tail
            && let Ok(mut tail) = tail.downcast::<Vec<T>>()
        {
            self.append(&mut tail);
        }
        // A default-filled gap is only possible if the tail was lost.
        self.resize(len, T::default());
    }

    fn clone_storage(&self) -> Box<dyn ArrayStorage> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_then_restore_keeps_elements() {
        let mut data: Vec<i32> = vec![1, 2, 3, 4, 5];
        let tail = data.resize_elems(2).unwrap();
        assert_eq!(data, vec![1, 2]);

        data.restore_elems(5, tail);
        assert_eq!(data, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn grow_then_restore_truncates() {
        let mut data: Vec<i32> = vec![7, 8];
        let tail = data.resize_elems(4).unwrap();
        assert!(tail.is_none());
        assert_eq!(data, vec![7, 8, 0, 0]);

        data.restore_elems(2, tail);
        assert_eq!(data, vec![7, 8]);
    }

    #[test]
    fn unallocatable_growth_leaves_buffer_alone() {
        let mut data: Vec<u64> = vec![1, 2];
        assert!(data.resize_elems(usize::MAX).is_err());
        assert_eq!(data, vec![1, 2]);
    }
}

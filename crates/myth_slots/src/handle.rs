//! Typed slot handles.
//!
//! The graph stores every slot type-erased under a [`SlotKey`]. The handles in
//! this module add the payload type back at compile time, so that
//! `graph.get(pos)` returns a `DVec3` without any runtime downcast failing.
//!
//! Handles are `Copy` and never own anything: destroying the slot makes every
//! handle to it stale, and stale handles fail with `NotFound`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use myth_core::SlotKey;

/// Untyped slot key as returned by component lookups.
pub type AnySlot = SlotKey;

/// Common surface of [`Slot`] and [`ArraySlot`].
pub trait SlotHandle: Copy {
    /// Returns the untyped key of the slot.
    fn key(self) -> SlotKey;
}

impl SlotHandle for SlotKey {
    #[inline]
    fn key(self) -> SlotKey {
        self
    }
}

/// Handle of a scalar slot holding one `T`.
pub struct Slot<T> {
    key: SlotKey,
    _marker: PhantomData<fn() -> T>,
}

/// Handle of an array slot holding a resizable sequence of `T`.
pub struct ArraySlot<T> {
    key: SlotKey,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! impl_handle {
    ($name:ident) => {
        impl<T> $name<T> {
            #[inline]
            pub(crate) fn from_key(key: SlotKey) -> Self {
                Self {
                    key,
                    _marker: PhantomData,
                }
            }

            /// Returns the untyped key of the slot.
            #[inline]
            #[must_use]
            pub fn key(self) -> SlotKey {
                self.key
            }
        }

        impl<T> SlotHandle for $name<T> {
            #[inline]
            fn key(self) -> SlotKey {
                self.key
            }
        }

        impl<T> Clone for $name<T> {
            #[inline]
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.key == other.key
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> Hash for $name<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.key.hash(state);
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}<{}>({:?})",
                    stringify!($name),
                    std::any::type_name::<T>(),
                    self.key
                )
            }
        }

        impl<T> From<$name<T>> for SlotKey {
            #[inline]
            fn from(handle: $name<T>) -> Self {
                handle.key
            }
        }
    };
}

impl_handle!(Slot);
impl_handle!(ArraySlot);

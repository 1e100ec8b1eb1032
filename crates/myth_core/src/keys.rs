//! Arena keys.
//!
//! Every entity of the graph lives in a `SlotMap` owned by the graph and is
//! referred to by one of these generational keys. A key whose entity has been
//! removed never resolves again, even if the arena reuses the storage.

use slotmap::new_key_type;

new_key_type! {
    /// Key of a slot (scalar or array) inside a `SlotGraph`.
    pub struct SlotKey;
    /// Key of a size constraint.
    pub struct ConstraintKey;
    /// Key of an external observer (a boxed `Dependent`).
    pub struct ObserverKey;
    /// Key of a component (named slot registry).
    pub struct ComponentKey;
}

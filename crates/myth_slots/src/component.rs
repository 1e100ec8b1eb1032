//! Components
//!
//! A component is a named, dynamically extensible bag of slots, looked up by
//! string key. It is the outward-facing object of a scene entity: a world
//! object, a geometry, a material.
//!
//! Each entry either **owns** its slot (the slot is destroyed with the entry or
//! the component) or **borrows** it (the slot belongs to the surrounding
//! object and is only indexed). A slot has at most one owning component but
//! may be indexed by any number of components.

use rustc_hash::FxHashMap;

use myth_core::{ComponentKey, GraphError, Result, SlotKey};

use crate::graph::SlotGraph;
use crate::handle::{AnySlot, ArraySlot, Slot, SlotHandle};
use crate::storage::{ArrayValue, SlotValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOwnership {
    /// Destroyed together with the entry.
    Owned,
    /// Only indexed.
    Borrowed,
}

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    slot: SlotKey,
    ownership: SlotOwnership,
}

/// Name-to-slot registry of one scene entity.
#[derive(Debug, Default)]
pub struct Component {
    name: String,
    slots: FxHashMap<String, SlotEntry>,
}

impl Component {
    fn new(name: String) -> Self {
        Self {
            name,
            slots: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Looks up a slot by name. Fails with `Key` if absent.
    pub fn slot(&self, name: &str) -> Result<AnySlot> {
        self.entry(name).map(|entry| entry.slot)
    }

    pub fn ownership(&self, name: &str) -> Result<SlotOwnership> {
        self.entry(name).map(|entry| entry.ownership)
    }

    /// Slot names in lexicographic order.
    #[must_use]
    pub fn slot_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn entry(&self, name: &str) -> Result<SlotEntry> {
        self.slots
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::missing_slot(name))
    }

    fn indexes(&self, slot: SlotKey) -> bool {
        self.slots.values().any(|entry| entry.slot == slot)
    }

    /// Drops every entry naming a destroyed slot.
    pub(crate) fn forget(&mut self, slot: SlotKey) {
        self.slots.retain(|_, entry| entry.slot != slot);
    }
}

impl SlotGraph {
    fn component_mut(&mut self, key: ComponentKey) -> Result<&mut Component> {
        self.components
            .get_mut(key)
            .ok_or_else(|| GraphError::not_found(format!("component {key:?} does not exist")))
    }

    pub fn add_component(&mut self, name: impl Into<String>) -> ComponentKey {
        let name = name.into();
        log::debug!("add_component \"{name}\"");
        self.components.insert(Component::new(name))
    }

    pub fn component(&self, key: ComponentKey) -> Result<&Component> {
        self.components
            .get(key)
            .ok_or_else(|| GraphError::not_found(format!("component {key:?} does not exist")))
    }

    pub fn set_component_name(&mut self, key: ComponentKey, name: impl Into<String>) -> Result<()> {
        self.component_mut(key)?.name = name.into();
        Ok(())
    }

    /// Adds `slot` under `name`; the component takes ownership.
    pub fn add_owned_slot(&mut self, key: ComponentKey, name: &str, slot: impl SlotHandle) -> Result<()> {
        let slot = slot.key();
        self.check_new_entry(key, name, slot)?;
        if let Some(owner) = self.node(slot)?.owner {
            return Err(GraphError::AlreadyRegistered(format!(
                "slot {slot:?} is already owned by component {owner:?}"
            )));
        }
        self.node_mut(slot)?.owner = Some(key);
        self.insert_entry(key, name, slot, SlotOwnership::Owned)
    }

    /// Indexes `slot` under `name` without taking ownership.
    pub fn add_borrowed_slot(&mut self, key: ComponentKey, name: &str, slot: impl SlotHandle) -> Result<()> {
        let slot = slot.key();
        self.check_new_entry(key, name, slot)?;
        self.insert_entry(key, name, slot, SlotOwnership::Borrowed)
    }

    fn check_new_entry(&self, key: ComponentKey, name: &str, slot: SlotKey) -> Result<()> {
        if self.component(key)?.has_slot(name) {
            return Err(GraphError::duplicate_slot(name));
        }
        self.node(slot)?;
        Ok(())
    }

    fn insert_entry(&mut self, key: ComponentKey, name: &str, slot: SlotKey, ownership: SlotOwnership) -> Result<()> {
        let node = self.node_mut(slot)?;
        if !node.indexed_by.contains(&key) {
            node.indexed_by.push(key);
        }
        self.component_mut(key)?
            .slots
            .insert(name.to_owned(), SlotEntry { slot, ownership });
        log::debug!("component {key:?}: add {ownership:?} slot \"{name}\"");
        Ok(())
    }

    /// Removes the entry `name`, destroying the slot if it was owned.
    pub fn remove_component_slot(&mut self, key: ComponentKey, name: &str) -> Result<()> {
        let component = self.component_mut(key)?;
        let entry = component
            .slots
            .remove(name)
            .ok_or_else(|| GraphError::missing_slot(name))?;
        let still_indexed = component.indexes(entry.slot);
        log::debug!("component {key:?}: remove slot \"{name}\"");

        match entry.ownership {
            SlotOwnership::Owned => self.remove_slot(entry.slot),
            SlotOwnership::Borrowed => {
                if !still_indexed && let Some(node) = self.slots.get_mut(entry.slot) {
                    node.indexed_by.retain(|c| *c != key);
                }
                Ok(())
            }
        }
    }

    /// Destroys a component together with its owned slots.
    pub fn remove_component(&mut self, key: ComponentKey) -> Result<()> {
        let component = self
            .components
            .remove(key)
            .ok_or_else(|| GraphError::not_found(format!("component {key:?} does not exist")))?;
        log::debug!("remove_component \"{}\"", component.name);

        for entry in component.slots.into_values() {
            match entry.ownership {
                SlotOwnership::Owned => {
                    // Owned slots may appear twice under different names.
                    if self.slots.contains_key(entry.slot) {
                        self.remove_slot(entry.slot)?;
                    }
                }
                SlotOwnership::Borrowed => {
                    if let Some(node) = self.slots.get_mut(entry.slot) {
                        node.indexed_by.retain(|c| *c != key);
                    }
                }
            }
        }
        Ok(())
    }

    /// Typed lookup of a scalar slot by name.
    pub fn component_slot<T: SlotValue>(&self, key: ComponentKey, name: &str) -> Result<Slot<T>> {
        let slot = self.component(key)?.slot(name)?;
        self.typed_slot(slot)
    }

    /// Typed lookup of an array slot by name.
    pub fn component_array<T: ArrayValue>(&self, key: ComponentKey, name: &str) -> Result<ArraySlot<T>> {
        let slot = self.component(key)?.slot(name)?;
        self.typed_array(slot)
    }
}

//! Script objects: named member slots behind a shared reference

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use super::{InterpResult, RuntimeError, RuntimeSlot, SlotAttributes, Value};
use crate::contract::{ArithmeticMode, Contract, CustomContract};

/// Object with named member slots.
///
/// Also carries the monitor used by synchronized bodies that target it, so
/// mutual exclusion is scoped to the object rather than global.
#[derive(Default)]
pub struct ScriptObject {
    members: RwLock<BTreeMap<String, Arc<RuntimeSlot>>>,
    constructor: Option<Arc<CustomContract>>,
    monitor: ReentrantMutex<()>,
}

impl ScriptObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object stamped with a custom contract's identity
    pub fn with_constructor(constructor: Arc<CustomContract>) -> Self {
        Self {
            constructor: Some(constructor),
            ..Self::default()
        }
    }

    pub fn constructor(&self) -> Option<&Arc<CustomContract>> {
        self.constructor.as_ref()
    }

    pub fn monitor(&self) -> &ReentrantMutex<()> {
        &self.monitor
    }

    /// Create or replace a mutable member holding `value`
    pub fn define(&self, name: &str, value: Value, contract: Option<Contract>) {
        let slot = RuntimeSlot::initialized(SlotAttributes::Plain, value, contract);
        self.members.write().insert(name.to_string(), Arc::new(slot));
    }

    /// Create or replace an immutable member
    pub fn define_constant(&self, name: &str, value: Value) {
        let slot = RuntimeSlot::initialized(SlotAttributes::Immutable, value, None);
        self.members.write().insert(name.to_string(), Arc::new(slot));
    }

    pub fn slot(&self, name: &str) -> Option<Arc<RuntimeSlot>> {
        self.members.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.read().contains_key(name)
    }

    /// Current value of an initialized member
    pub fn peek(&self, name: &str) -> Option<Value> {
        self.slot(name).and_then(|slot| slot.peek())
    }

    /// Read a member (the `getSlot` capability)
    pub fn get(&self, name: &str, mode: ArithmeticMode) -> InterpResult<Value> {
        match self.slot(name) {
            Some(slot) => slot.read(name, mode),
            None => Err(RuntimeError::missing_member(name)),
        }
    }

    /// Write a member, creating a mutable one when absent
    pub fn set(&self, name: &str, value: Value, mode: ArithmeticMode) -> InterpResult<()> {
        if let Some(slot) = self.slot(name) {
            return slot.write(name, value, mode);
        }
        let mut members = self.members.write();
        // Another writer may have created it in between
        match members.get(name) {
            Some(slot) => {
                let slot = Arc::clone(slot);
                drop(members);
                slot.write(name, value, mode)
            }
            None => {
                members.insert(
                    name.to_string(),
                    Arc::new(RuntimeSlot::initialized(SlotAttributes::Plain, value, None)),
                );
                Ok(())
            }
        }
    }

    /// Snapshot of initialized members in name order
    pub fn members(&self) -> Vec<(String, Value)> {
        self.members
            .read()
            .iter()
            .filter_map(|(name, slot)| slot.peek().map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl std::fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptObject")
            .field("members", &self.names())
            .field("constructor", &self.constructor.as_ref().map(|c| c.name()))
            .finish()
    }
}

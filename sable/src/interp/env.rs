//! Environments: one slot array per routine activation

use std::sync::Arc;

use super::{RuntimeSlot, SlotAttributes};

/// Slot attributes of a routine activation, fixed at compile time
pub type Layout = Arc<[SlotAttributes]>;

/// Slots of one routine activation plus the activation it was defined in.
///
/// The compiler resolves every local to a `(hops, index)` pair: `hops`
/// counts routine boundaries to walk up, `index` picks the slot.
#[derive(Debug, Default)]
pub struct Environment {
    slots: Box<[RuntimeSlot]>,
    parent: Option<Arc<Environment>>,
}

impl Environment {
    /// Fresh uninitialized activation for `layout`
    pub fn new(layout: &[SlotAttributes], parent: Option<Arc<Environment>>) -> Arc<Self> {
        Arc::new(Environment {
            slots: layout.iter().map(|attrs| RuntimeSlot::new(*attrs)).collect(),
            parent,
        })
    }

    pub fn parent(&self) -> Option<&Arc<Environment>> {
        self.parent.as_ref()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot `index` of the activation `hops` levels up.
    ///
    /// Indices come from the compiler, so a miss is an internal error and
    /// panics.
    pub fn slot(&self, hops: usize, index: usize) -> &RuntimeSlot {
        let mut env = self;
        for _ in 0..hops {
            env = env
                .parent
                .as_deref()
                .unwrap_or_else(|| panic!("environment chain shorter than {hops}"));
        }
        &env.slots[index]
    }

    /// Deep copy of the whole chain. Values are copied; objects inside them
    /// remain shared references.
    pub fn snapshot(&self) -> Arc<Environment> {
        Arc::new(Environment {
            slots: self.slots.iter().map(RuntimeSlot::snapshot).collect(),
            parent: self.parent.as_ref().map(|parent| parent.snapshot()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ArithmeticMode;
    use crate::interp::Value;

    const CHECKED: ArithmeticMode = ArithmeticMode::Checked;

    #[test]
    fn test_slot_lookup_through_parents() {
        let outer = Environment::new(&[SlotAttributes::Plain], None);
        outer.slot(0, 0).write("x", Value::Integer(1), CHECKED).unwrap();

        let inner = Environment::new(&[SlotAttributes::Plain], Some(Arc::clone(&outer)));
        inner.slot(0, 0).write("y", Value::Integer(2), CHECKED).unwrap();

        assert_eq!(inner.slot(1, 0).peek(), Some(Value::Integer(1)));
        assert_eq!(inner.slot(0, 0).peek(), Some(Value::Integer(2)));
    }

    #[test]
    fn test_shared_parent_sees_writes() {
        let outer = Environment::new(&[SlotAttributes::Plain], None);
        let inner = Environment::new(&[], Some(Arc::clone(&outer)));
        inner.slot(1, 0).write("x", Value::Integer(9), CHECKED).unwrap();
        assert_eq!(outer.slot(0, 0).peek(), Some(Value::Integer(9)));
    }

    #[test]
    fn test_snapshot_detaches_chain() {
        let outer = Environment::new(&[SlotAttributes::Plain], None);
        outer.slot(0, 0).write("x", Value::Integer(1), CHECKED).unwrap();
        let inner = Environment::new(&[SlotAttributes::Immutable], Some(Arc::clone(&outer)));

        let copy = inner.snapshot();
        outer.slot(0, 0).write("x", Value::Integer(2), CHECKED).unwrap();
        assert_eq!(copy.slot(1, 0).peek(), Some(Value::Integer(1)));
        assert!(copy.slot(0, 0).is_immutable());
    }
}

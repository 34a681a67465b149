//! Runtime slots: typed storage cells

use parking_lot::RwLock;

use super::{InterpResult, RuntimeError, Value};
use crate::contract::{convert, ArithmeticMode, Contract};

/// Mutability of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotAttributes {
    #[default]
    Plain,
    /// Accepts exactly one write after each declaration
    Immutable,
}

#[derive(Debug, Clone, Default)]
struct Cell {
    value: Option<Value>,
    contract: Option<Contract>,
}

/// Storage cell holding at most one value.
///
/// A slot starts uninitialized and becomes initialized on its first write.
/// When a contract is bound, every write is converted through it.
#[derive(Debug, Default)]
pub struct RuntimeSlot {
    attributes: SlotAttributes,
    cell: RwLock<Cell>,
}

impl RuntimeSlot {
    pub fn new(attributes: SlotAttributes) -> Self {
        RuntimeSlot {
            attributes,
            cell: RwLock::new(Cell::default()),
        }
    }

    /// Slot that already holds `value`. The value is stored as given.
    pub fn initialized(attributes: SlotAttributes, value: Value, contract: Option<Contract>) -> Self {
        RuntimeSlot {
            attributes,
            cell: RwLock::new(Cell {
                value: Some(value),
                contract,
            }),
        }
    }

    pub fn attributes(&self) -> SlotAttributes {
        self.attributes
    }

    pub fn is_immutable(&self) -> bool {
        self.attributes == SlotAttributes::Immutable
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.read().value.is_some()
    }

    pub fn contract(&self) -> Option<Contract> {
        self.cell.read().contract.clone()
    }

    /// Current value, if any, without mode checks
    pub fn peek(&self) -> Option<Value> {
        self.cell.read().value.clone()
    }

    /// Read the value. An uninitialized slot fails in checked mode and reads
    /// as void in unchecked mode.
    pub fn read(&self, name: &str, mode: ArithmeticMode) -> InterpResult<Value> {
        match &self.cell.read().value {
            Some(value) => Ok(value.clone()),
            None if mode.is_checked() => Err(RuntimeError::unassigned(name)),
            None => Ok(Value::Void),
        }
    }

    /// Store a value, converting it through the bound contract
    pub fn write(&self, name: &str, value: Value, mode: ArithmeticMode) -> InterpResult<()> {
        let contract = {
            let cell = self.cell.read();
            if self.is_immutable() && cell.value.is_some() {
                return Err(RuntimeError::constant_mutation(name));
            }
            cell.contract.clone()
        };
        // Conversion may block on a proxy, so it runs outside the lock
        let value = match &contract {
            Some(contract) => convert(&value, contract, mode)?,
            None => value,
        };
        let mut cell = self.cell.write();
        if self.is_immutable() && cell.value.is_some() {
            return Err(RuntimeError::constant_mutation(name));
        }
        cell.value = Some(value);
        Ok(())
    }

    /// Re-run a declaration: bind `contract` and store `value` (if any),
    /// discarding whatever the slot held before. Immutable slots accept this
    /// because each pass over a declaration creates a fresh binding.
    pub fn declare(
        &self,
        value: Option<Value>,
        contract: Option<Contract>,
        mode: ArithmeticMode,
    ) -> InterpResult<()> {
        let value = match (value, &contract) {
            (Some(value), Some(contract)) => Some(convert(&value, contract, mode)?),
            (value, _) => value,
        };
        *self.cell.write() = Cell { value, contract };
        Ok(())
    }

    /// Like [`declare`](Self::declare) for a value already converted to
    /// `contract`. Later writes still convert.
    pub fn bind(&self, value: Value, contract: Option<Contract>) {
        *self.cell.write() = Cell {
            value: Some(value),
            contract,
        };
    }

    /// Return the slot to the uninitialized state
    pub fn delete(&self, name: &str) -> InterpResult<()> {
        if self.is_immutable() {
            return Err(RuntimeError::constant_mutation(name));
        }
        self.cell.write().value = None;
        Ok(())
    }

    /// Independent copy with the same attributes, contract and value
    pub fn snapshot(&self) -> RuntimeSlot {
        RuntimeSlot {
            attributes: self.attributes,
            cell: RwLock::new(self.cell.read().clone()),
        }
    }
}

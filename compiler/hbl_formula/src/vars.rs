//! Variable table.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::Value;

/// Stable handle to a variable slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct Slot {
    name: Rc<str>,
    value: Value,
}

/// Fully qualified variable names and their current values.
///
/// Slots are never removed; deleting a variable resets it to
/// [`Value::Undefined`], so a parsed formula's [`VarId`] stays valid for the
/// life of the table.
#[derive(Default)]
pub struct VariableTable {
    index: FxHashMap<Rc<str>, VarId>,
    slots: Vec<Slot>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `name`, creating an undefined one on first use.
    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = VarId(self.slots.len() as u32);
        let name: Rc<str> = name.into();
        self.slots.push(Slot {
            name: Rc::clone(&name),
            value: Value::Undefined,
        });
        self.index.insert(name, id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn get(&self, id: VarId) -> &Value {
        self.slots
            .get(id.index())
            .map_or(&Value::Undefined, |slot| &slot.value)
    }

    /// Value by name; unknown names read as undefined.
    pub fn get_by_name(&self, name: &str) -> &Value {
        self.lookup(name).map_or(&Value::Undefined, |id| self.get(id))
    }

    pub fn set(&mut self, id: VarId, value: Value) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.value = value;
        }
    }

    pub fn set_by_name(&mut self, name: &str, value: Value) -> VarId {
        let id = self.intern(name);
        self.set(id, value);
        id
    }

    /// Mutable access for in-place matrix and dictionary updates.
    pub fn get_mut(&mut self, id: VarId) -> Option<&mut Value> {
        self.slots.get_mut(id.index()).map(|slot| &mut slot.value)
    }

    /// Take the value out, leaving the slot undefined.
    pub fn take(&mut self, id: VarId) -> Value {
        self.get_mut(id).map(std::mem::take).unwrap_or_default()
    }

    pub fn name(&self, id: VarId) -> &str {
        self.slots.get(id.index()).map_or("", |slot| &slot.name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        !self.get_by_name(name).is_undefined()
    }

    /// Defined variables, by name.
    pub fn defined(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots
            .iter()
            .filter(|slot| !slot.value.is_undefined())
            .map(|slot| (&*slot.name, &slot.value))
    }

    /// Slots whose name lies inside namespace `prefix`.
    pub fn in_namespace(&self, prefix: &str) -> Vec<VarId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
            })
            .map(|(i, _)| VarId(i as u32))
            .collect()
    }
}

impl std::fmt::Debug for VariableTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.defined().map(|(name, value)| (name, value)))
            .finish()
    }
}

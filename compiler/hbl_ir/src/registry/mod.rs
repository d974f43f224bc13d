//! User function registry.
//!
//! Functions live in numbered slots. A formula binds a call to a slot at
//! parse time, so the slot of a name must not move: redeclaring a function
//! replaces the entry in place, and [`FunctionRegistry::clear_from`] only
//! ever drops a tail of slots which later declarations refill in order.

use std::rc::Rc;

use hbl_formula::FunctionLookup;
use rustc_hash::FxHashMap;

use crate::{namespace, InstructionList};


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    Value,
    /// Declared with a trailing `&`; the caller's variable receives the
    /// final value.
    Reference,
}

/// How a call scopes the body's variables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionClass {
    /// `function`
    Ordinary,
    /// `ffunction`: no dependent-value refresh after the call.
    SkipUpdate,
    /// `lfunction`: every variable lives in a private namespace.
    Local,
}

impl FunctionClass {
    pub fn keyword(self) -> &'static str {
        match self {
            FunctionClass::Ordinary => "function",
            FunctionClass::SkipUpdate => "ffunction",
            FunctionClass::Local => "lfunction",
        }
    }
}

#[derive(Debug)]
pub struct FunctionEntry {
    /// Namespace-qualified name.
    pub name: String,
    pub body: Rc<InstructionList>,
    /// Qualified parameter names, `&` stripped.
    pub parameters: Vec<String>,
    pub kinds: Vec<ParameterKind>,
    pub class: FunctionClass,
    /// The declaration as written.
    pub source: String,
}

impl FunctionEntry {
    /// Declaration text for `Export`.
    pub fn export(&self) -> String {
        self.source.clone()
    }
}

/// Outcome of [`FunctionRegistry::declare`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Declared {
    New(usize),
    /// An existing function of the same name was replaced in its slot.
    Replaced(usize),
}

impl Declared {
    pub fn slot(self) -> usize {
        match self {
            Declared::New(slot) | Declared::Replaced(slot) => slot,
        }
    }
}

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    slots: Vec<Option<FunctionEntry>>,
    by_name: FxHashMap<String, usize>,
    generated_namespaces: u32,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` as seen from `current_namespace`.
    ///
    /// Tries `ns.name`, then strips one trailing segment off `ns` at a time,
    /// then the bare name.
    pub fn find(&self, name: &str, current_namespace: Option<&str>) -> Option<usize> {
        if let Some(global) = name.strip_prefix('^') {
            return self.by_name.get(global).copied();
        }
        let mut scope = current_namespace.filter(|ns| !ns.is_empty());
        while let Some(ns) = scope {
            if let Some(&slot) = self.by_name.get(&namespace::qualify(name, Some(ns))) {
                return Some(slot);
            }
            scope = namespace::parent(ns);
        }
        self.by_name.get(name).copied()
    }

    /// Install `entry`, reusing the slot of a same-named function.
    pub fn declare(&mut self, entry: FunctionEntry) -> Declared {
        if let Some(&slot) = self.by_name.get(&entry.name) {
            if let Some(existing) = self.slots.get_mut(slot) {
                *existing = Some(entry);
                return Declared::Replaced(slot);
            }
        }
        let slot = self.slots.len();
        self.by_name.insert(entry.name.clone(), slot);
        self.slots.push(Some(entry));
        Declared::New(slot)
    }

    /// Remove every slot from `start` on.
    pub fn clear_from(&mut self, start: usize) {
        if start >= self.slots.len() {
            return;
        }
        for entry in self.slots.drain(start..).flatten() {
            self.by_name.remove(&entry.name);
        }
        tracing::debug!(start, remaining = self.slots.len(), "cleared function slots");
    }

    pub fn get(&self, slot: usize) -> Option<&FunctionEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&FunctionEntry> {
        self.by_name.get(name).and_then(|&slot| self.get(slot))
    }

    /// Slot count, including slots whose entry was removed.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &FunctionEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|e| (slot, e)))
    }

    /// A namespace name no other `lfunction` uses.
    pub fn fresh_namespace(&mut self) -> String {
        self.generated_namespaces += 1;
        format!("_lfn{}", self.generated_namespaces)
    }
}

impl FunctionLookup for FunctionRegistry {
    fn find_function(&self, name: &str, namespace: Option<&str>) -> Option<usize> {
        self.find(name, namespace)
    }
}

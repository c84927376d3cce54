//! Named variable store
//!
//! Holds the mutable variables that descriptor expressions assign and read.
//! Callers construct one table per logical session and pass it into each
//! evaluation; there is no hidden process-global state.
//!
//! Slots live in an arena and are addressed by [`VarId`] handles. A store to
//! an existing name allocates a fresh slot and repoints the name, so a handle
//! obtained earlier keeps reading the value it was bound to. Slots are only
//! released by [`VariableTable::clear_all`].

use crate::types::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Handle to a variable slot
///
/// Stable for the lifetime of the table (until `clear_all`), even across
/// later stores to the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

/// One variable slot: its name and the value it held when stored
#[derive(Debug, Clone)]
struct Slot {
    name: String,
    value: Value,
}

#[derive(Debug, Default)]
struct TableInner {
    slots: Vec<Slot>,
    by_name: HashMap<String, VarId>,
}

/// The variable table shared by all evaluations of one session
///
/// The internal mutex guards individual map operations only; it is never held
/// across a nested evaluation, so re-entrant evaluation (a typedef member
/// offset expression evaluating through the same table) cannot deadlock.
#[derive(Debug, Default)]
pub struct VariableTable {
    inner: Mutex<TableInner>,
}

impl VariableTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TableInner> {
        // A poisoned lock only means another evaluation panicked between a
        // lock and unlock of a plain map operation; the map is still intact.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up the slot currently bound to `name`
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.lock().by_name.get(name).copied()
    }

    /// Read the value held by a slot
    ///
    /// Returns `None` only for a handle that outlived a `clear_all`.
    pub fn value_of(&self, id: VarId) -> Option<Value> {
        self.lock().slots.get(id.0).map(|slot| slot.value.clone())
    }

    /// Name of the variable a slot was created for
    pub fn name_of(&self, id: VarId) -> Option<String> {
        self.lock().slots.get(id.0).map(|slot| slot.name.clone())
    }

    /// Store `value` under `name`, creating the variable if absent
    ///
    /// Always allocates a fresh slot and repoints the name to it. Handles
    /// bound before the store keep reading the previous value.
    pub fn set(&self, name: &str, value: Value) -> VarId {
        let mut inner = self.lock();
        let id = VarId(inner.slots.len());
        inner.slots.push(Slot {
            name: name.to_string(),
            value,
        });
        inner.by_name.insert(name.to_string(), id);
        id
    }

    /// Number of named variables currently defined
    pub fn len(&self) -> usize {
        self.lock().by_name.len()
    }

    /// True if no variables are defined
    pub fn is_empty(&self) -> bool {
        self.lock().by_name.is_empty()
    }

    /// Remove every variable and invalidate all outstanding handles
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.by_name.clear();
    }
}

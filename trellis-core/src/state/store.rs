//! Live state instances.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::schema::{FieldKind, StateSchema};
use crate::error::StateError;

/// Saved field values, keyed by schema name and then field name.
pub type StateSnapshot = IndexMap<String, IndexMap<String, Value>>;

/// Whether connections get their own store or share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateScope {
    #[default]
    PerConnection,

    /// One store for the whole process. Handlers on different connections
    /// may interleave their writes.
    Shared,
}

/// One live instance of a [`StateSchema`].
#[derive(Debug)]
pub struct State {
    schema: Arc<StateSchema>,
    values: IndexMap<String, Value>,
    changed: IndexSet<String>,
    writes: u64,
    changes: u64,
}

impl State {
    /// Create an instance holding the schema's defaults.
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let values = defaults(&schema);
        Self {
            schema,
            values,
            changed: IndexSet::new(),
            writes: 0,
            changes: 0,
        }
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    /// Current value of a declared field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Recompute a computed field.
    pub fn computed(&self, name: &str) -> Option<Value> {
        self.schema.compute(name, self)
    }

    /// Read a declared or computed field.
    pub fn read(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().or_else(|| self.computed(name))
    }

    /// Read and convert a declared or computed field.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, StateError> {
        let value = self
            .read(name)
            .ok_or_else(|| self.schema.unknown_field(name))?;
        serde_json::from_value(value).map_err(|source| StateError::Convert {
            field: name.to_string(),
            source,
        })
    }

    /// Write a field.
    ///
    /// Returns `Ok(false)` when `value` equals the current value; nothing is
    /// recorded in that case.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<bool, StateError> {
        let value = value.into();
        if self.schema.is_computed(field) {
            return Err(StateError::ReadOnly {
                state: self.schema.name().to_string(),
                field: field.to_string(),
            });
        }
        let def = self
            .schema
            .field_def(field)
            .ok_or_else(|| self.schema.unknown_field(field))?;
        if !def.kind.accepts(&value) {
            return Err(StateError::TypeMismatch {
                state: self.schema.name().to_string(),
                field: field.to_string(),
                expected: def.kind,
                found: FieldKind::of(&value),
            });
        }

        self.writes += 1;
        let slot = self.values.entry(field.to_string()).or_insert(Value::Null);
        if *slot == value {
            trace!(state = self.schema.name(), field, "unchanged write");
            return Ok(false);
        }
        *slot = value;
        self.changes += 1;
        self.changed.insert(field.to_string());
        Ok(true)
    }

    /// Read a field, transform it and write it back.
    pub fn update<T, F>(&mut self, field: &str, f: F) -> Result<bool, StateError>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(T) -> T,
    {
        let current: T = self.get_as(field)?;
        let next = serde_json::to_value(f(current)).map_err(|source| StateError::Convert {
            field: field.to_string(),
            source,
        })?;
        self.set(field, next)
    }

    /// Whether any field changed since the last [`State::take_changes`].
    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Names of fields changed since the last call, in change order.
    pub fn take_changes(&mut self) -> IndexSet<String> {
        std::mem::take(&mut self.changed)
    }

    /// Put every field back to its default.
    pub fn reset(&mut self) {
        for def in self.schema.fields() {
            if self.values.get(&def.name) != Some(&def.default) {
                self.values.insert(def.name.clone(), def.default.clone());
                self.changed.insert(def.name.clone());
                self.changes += 1;
            }
        }
    }

    /// Current field values. Computed fields are not included.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.values.clone()
    }

    /// Load saved values. Unknown fields and values of the wrong kind are
    /// skipped. Restoring does not mark the instance dirty.
    pub fn restore(&mut self, saved: IndexMap<String, Value>) {
        for (field, value) in saved {
            match self.schema.field_def(&field) {
                Some(def) if def.kind.accepts(&value) => {
                    self.values.insert(field, value);
                }
                _ => trace!(state = self.schema.name(), %field, "skipping saved field"),
            }
        }
    }

    fn take_activity(&mut self) -> Activity {
        let activity = Activity {
            writes: self.writes,
            changes: self.changes,
        };
        self.writes = 0;
        self.changes = 0;
        activity
    }
}

fn defaults(schema: &StateSchema) -> IndexMap<String, Value> {
    schema
        .fields()
        .map(|def| (def.name.clone(), def.default.clone()))
        .collect()
}

/// Write counters accumulated between two calls to
/// [`StateStore::take_activity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    /// Every accepted `set`, including no-ops.
    pub writes: u64,

    /// Writes that actually changed a value.
    pub changes: u64,
}

impl Activity {
    /// True when something was written but nothing changed.
    pub fn only_noops(&self) -> bool {
        self.writes > 0 && self.changes == 0
    }
}

/// All state instances of one session or connection.
#[derive(Debug, Default)]
pub struct StateStore {
    instances: IndexMap<String, State>,
    pending: StateSnapshot,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that will apply `snapshot` to each instance as it is created.
    pub fn restored(snapshot: StateSnapshot) -> Self {
        Self {
            instances: IndexMap::new(),
            pending: snapshot,
        }
    }

    /// The live instance for `schema`, created on first use.
    pub fn instance(&mut self, schema: &Arc<StateSchema>) -> &mut State {
        let pending = &mut self.pending;
        self.instances
            .entry(schema.name().to_string())
            .or_insert_with(|| {
                let mut state = State::new(Arc::clone(schema));
                if let Some(saved) = pending.shift_remove(schema.name()) {
                    debug!(state = schema.name(), "restoring saved state");
                    state.restore(saved);
                }
                state
            })
    }

    /// The instance for a schema name, if it has been created.
    pub fn get(&self, name: &str) -> Option<&State> {
        self.instances.get(name)
    }

    /// Apply saved values to live instances and keep the rest for later.
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        for (name, values) in snapshot {
            match self.instances.get_mut(&name) {
                Some(state) => state.restore(values),
                None => {
                    self.pending.insert(name, values);
                }
            }
        }
    }

    /// Values of every live instance, plus saved values not yet applied.
    pub fn snapshot(&self) -> StateSnapshot {
        let mut snapshot = self.pending.clone();
        for (name, state) in &self.instances {
            snapshot.insert(name.clone(), state.snapshot());
        }
        snapshot
    }

    /// Sum and reset the write counters of every instance.
    pub fn take_activity(&mut self) -> Activity {
        self.instances
            .values_mut()
            .map(State::take_activity)
            .fold(Activity::default(), |acc, a| Activity {
                writes: acc.writes + a.writes,
                changes: acc.changes + a.changes,
            })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Shared, lockable reference to a [`StateStore`].
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<Mutex<StateStore>>);

impl StateHandle {
    pub fn new(store: StateStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    /// Run `f` with the store locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut StateStore) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Run `f` against the instance for `schema`.
    pub fn with_instance<R>(&self, schema: &Arc<StateSchema>, f: impl FnOnce(&mut State) -> R) -> R {
        self.with(|store| f(store.instance(schema)))
    }

    /// Read a declared or computed field of `schema`'s instance.
    pub fn read(&self, schema: &Arc<StateSchema>, name: &str) -> Option<Value> {
        self.with_instance(schema, |state| state.read(name))
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.0.lock().snapshot()
    }

    pub fn take_activity(&self) -> Activity {
        self.0.lock().take_activity()
    }

    /// Whether both handles point at the same store.
    pub fn ptr_eq(&self, other: &StateHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

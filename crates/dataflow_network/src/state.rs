// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module state: persisted parameters plus transient values.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Double(f64),
    /// Text
    String(String),
    /// Nested list
    List(Vec<StateValue>),
}

impl StateValue {
    /// Value as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as double; integers are widened
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Value as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Value as list
    pub fn as_list(&self) -> Option<&[StateValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(v: Vec<StateValue>) -> Self {
        Self::List(v)
    }
}

/// Non-persisted value of any type, e.g. a cached intermediate result
pub type TransientValue = Arc<dyn Any + Send + Sync>;

/// Key-value state owned by a module.
///
/// Parameter writes that change a value advance [`ModuleState::generation`];
/// transient writes never do.
pub trait ModuleState: Send + Sync + fmt::Debug {
    /// Read a parameter
    fn get_value(&self, key: &str) -> Option<StateValue>;

    /// Write a parameter
    fn set_value(&self, key: &str, value: StateValue);

    /// Whether a parameter exists
    fn contains_key(&self, key: &str) -> bool;

    /// Parameter names, in insertion order
    fn keys(&self) -> Vec<String>;

    /// Snapshot of every parameter
    fn values(&self) -> IndexMap<String, StateValue>;

    /// Read a transient value
    fn get_transient_value(&self, key: &str) -> Option<TransientValue>;

    /// Write a transient value
    fn set_transient_value(&self, key: &str, value: TransientValue);

    /// Counter advanced on every effective parameter change
    fn generation(&self) -> u64;
}

impl dyn ModuleState {
    /// Read a transient value as a concrete type
    pub fn transient<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get_transient_value(key)
            .and_then(|value| value.downcast::<T>().ok())
    }
}

/// Shared handle to a module's state
pub type ModuleStateHandle = Arc<dyn ModuleState>;

#[derive(Default)]
struct MapState {
    values: IndexMap<String, StateValue>,
    transient: IndexMap<String, TransientValue>,
    generation: u64,
}

/// State backed by an ordered map
#[derive(Default)]
pub struct SimpleMapModuleState {
    inner: RwLock<MapState>,
}

impl SimpleMapModuleState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for SimpleMapModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SimpleMapModuleState")
            .field("values", &inner.values)
            .field("transient", &inner.transient.keys().collect::<Vec<_>>())
            .field("generation", &inner.generation)
            .finish()
    }
}

impl ModuleState for SimpleMapModuleState {
    fn get_value(&self, key: &str) -> Option<StateValue> {
        self.inner.read().values.get(key).cloned()
    }

    fn set_value(&self, key: &str, value: StateValue) {
        let mut inner = self.inner.write();
        if inner.values.get(key) == Some(&value) {
            return;
        }
        inner.values.insert(key.to_string(), value);
        inner.generation += 1;
    }

    fn contains_key(&self, key: &str) -> bool {
        self.inner.read().values.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.read().values.keys().cloned().collect()
    }

    fn values(&self) -> IndexMap<String, StateValue> {
        self.inner.read().values.clone()
    }

    fn get_transient_value(&self, key: &str) -> Option<TransientValue> {
        self.inner.read().transient.get(key).cloned()
    }

    fn set_transient_value(&self, key: &str, value: TransientValue) {
        self.inner.write().transient.insert(key.to_string(), value);
    }

    fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}

/// Creates the state object for a new module
pub trait ModuleStateFactory: Send + Sync {
    /// Make a fresh state
    fn make_state(&self, module_name: &str) -> ModuleStateHandle;
}

/// Factory producing [`SimpleMapModuleState`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleMapModuleStateFactory;

impl ModuleStateFactory for SimpleMapModuleStateFactory {
    fn make_state(&self, _module_name: &str) -> ModuleStateHandle {
        Arc::new(SimpleMapModuleState::new())
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Algorithm boundary.
//!
//! Numerical work lives behind a uniform `run(input) -> output` contract keyed
//! by named slots, so modules stay agnostic of what happens inside.

use crate::port::DatatypeHandle;
use crate::state::StateValue;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Algorithm failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgorithmError {
    /// A named input slot was empty or held the wrong type
    #[error("Missing algorithm input: {0}")]
    MissingInput(String),

    /// A parameter was absent or out of range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The computation itself failed
    #[error("Algorithm failed: {0}")]
    Failed(String),
}

/// Named input slots plus parameters
#[derive(Clone, Default)]
pub struct AlgorithmInput {
    data: IndexMap<String, DatatypeHandle>,
    parameters: IndexMap<String, StateValue>,
}

impl AlgorithmInput {
    /// Empty input
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data slot
    pub fn with_data(mut self, slot: impl Into<String>, data: DatatypeHandle) -> Self {
        self.data.insert(slot.into(), data);
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Add parameters from a state snapshot
    pub fn with_parameters(mut self, parameters: IndexMap<String, StateValue>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Raw data in a slot
    pub fn data(&self, slot: &str) -> Option<&DatatypeHandle> {
        self.data.get(slot)
    }

    /// Typed data in a slot; [`AlgorithmError::MissingInput`] if absent or
    /// of another type
    pub fn get<T: Any + Send + Sync>(&self, slot: &str) -> Result<Arc<T>, AlgorithmError> {
        self.data
            .get(slot)
            .cloned()
            .and_then(|data| data.downcast::<T>().ok())
            .ok_or_else(|| AlgorithmError::MissingInput(slot.to_string()))
    }

    /// Parameter value
    pub fn parameter(&self, name: &str) -> Option<&StateValue> {
        self.parameters.get(name)
    }
}

/// Named output slots
#[derive(Clone, Default)]
pub struct AlgorithmOutput {
    data: IndexMap<String, DatatypeHandle>,
}

impl AlgorithmOutput {
    /// Empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value in a slot
    pub fn set<T: Any + Send + Sync>(&mut self, slot: impl Into<String>, data: T) {
        self.data.insert(slot.into(), Arc::new(data));
    }

    /// Raw data in a slot
    pub fn data(&self, slot: &str) -> Option<&DatatypeHandle> {
        self.data.get(slot)
    }

    /// Typed data in a slot
    pub fn get<T: Any + Send + Sync>(&self, slot: &str) -> Option<Arc<T>> {
        self.data
            .get(slot)
            .cloned()
            .and_then(|data| data.downcast::<T>().ok())
    }

    /// Slot names, in insertion order
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }
}

/// A computation behind the algorithm boundary
pub trait Algorithm: Send + Sync {
    /// Run on the given input
    fn run(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError>;
}

/// Shared algorithm handle
pub type AlgorithmHandle = Arc<dyn Algorithm>;

/// Looks algorithms up by name
pub trait AlgorithmFactory: Send + Sync {
    /// Create the named algorithm
    fn create(&self, name: &str) -> Option<AlgorithmHandle>;
}

/// Registry of available algorithms
#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: IndexMap<String, AlgorithmHandle>,
}

impl AlgorithmRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an algorithm
    pub fn register(&mut self, name: impl Into<String>, algorithm: AlgorithmHandle) {
        self.algorithms.insert(name.into(), algorithm);
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.algorithms.keys().map(String::as_str)
    }
}

impl AlgorithmFactory for AlgorithmRegistry {
    fn create(&self, name: &str) -> Option<AlgorithmHandle> {
        self.algorithms.get(name).cloned()
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Predicates restricting which modules take part in a scheduling pass.

use crate::module::{Module, ModuleId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Module predicate used to schedule a subnetwork.
///
/// Connections participate only when both endpoints pass the filter.
#[derive(Clone)]
pub struct ModuleFilter(Arc<dyn Fn(&Module) -> bool + Send + Sync>);

impl ModuleFilter {
    /// Accept every module
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    /// Filter from an arbitrary predicate
    pub fn new(predicate: impl Fn(&Module) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Accept only the listed modules
    pub fn only(ids: impl IntoIterator<Item = ModuleId>) -> Self {
        let ids: HashSet<ModuleId> = ids.into_iter().collect();
        Self::new(move |module| ids.contains(module.id()))
    }

    /// Accept everything except the listed modules
    pub fn excluding(ids: impl IntoIterator<Item = ModuleId>) -> Self {
        let ids: HashSet<ModuleId> = ids.into_iter().collect();
        Self::new(move |module| !ids.contains(module.id()))
    }

    /// Accept modules that are not disabled
    pub fn enabled() -> Self {
        Self::new(|module| !module.is_disabled())
    }

    /// Accept modules passing both filters
    pub fn and(self, other: ModuleFilter) -> Self {
        Self::new(move |module| self.accepts(module) && other.accepts(module))
    }

    /// Evaluate the predicate
    pub fn accepts(&self, module: &Module) -> bool {
        (self.0)(module)
    }
}

impl Default for ModuleFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for ModuleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModuleFilter")
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration, stored as RON.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// How scheduled modules are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulingMode {
    /// One module at a time in topological order
    Serial,
    /// Wave by wave, modules of a wave on the worker pool
    #[default]
    Parallel,
}

/// Which modules run in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReexecutionMode {
    /// Every scheduled module
    Always,
    /// Only modules whose inputs or parameters changed
    #[default]
    Dynamic,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Settings format version
    pub version: u32,
    /// Execution strategy
    #[serde(default)]
    pub scheduling: SchedulingMode,
    /// Worker pool capacity for parallel waves
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Reexecution policy
    #[serde(default)]
    pub reexecution: ReexecutionMode,
    /// `EnvFilter` directive used by [`crate::logging::init_logging`]
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            scheduling: SchedulingMode::default(),
            worker_threads: default_worker_threads(),
            reexecution: ReexecutionMode::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Serial execution with the given reexecution policy
    pub fn serial(reexecution: ReexecutionMode) -> Self {
        Self {
            scheduling: SchedulingMode::Serial,
            reexecution,
            ..Self::default()
        }
    }

    /// Parallel execution on `worker_threads` workers
    pub fn parallel(worker_threads: usize, reexecution: ReexecutionMode) -> Self {
        Self {
            scheduling: SchedulingMode::Parallel,
            worker_threads,
            reexecution,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.version > CONFIG_FORMAT_VERSION {
            return Err(EngineError::Config(format!(
                "Config version {} is newer than supported version {}",
                self.version, CONFIG_FORMAT_VERSION
            )));
        }
        if self.worker_threads == 0 {
            return Err(EngineError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            ron::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty RON text
    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        ron::ser::to_string_pretty(self, pretty).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

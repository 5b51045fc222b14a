//! Shared policy handle with atomic replacement.
//!
//! Long-running embedders validate against a snapshot while a reload swaps in
//! a freshly loaded policy file behind them.

use std::path::Path;
use std::sync::{Arc, RwLock};

use cg_policy::PolicyConfig;

use crate::config::{Config, ConfigError};

/// Shared, atomically replaceable policy.
///
/// `snapshot` hands out an `Arc` clone; callers keep validating against the
/// snapshot they took even while a reload installs a replacement.
pub struct PolicyHandle {
    inner: RwLock<Arc<PolicyConfig>>,
}

impl PolicyHandle {
    pub fn new(policy: PolicyConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(policy)),
        }
    }

    /// The currently installed policy.
    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the installed policy.
    pub fn install(&self, policy: PolicyConfig) {
        let policy = Arc::new(policy);
        match self.inner.write() {
            Ok(mut guard) => *guard = policy,
            Err(poisoned) => *poisoned.into_inner() = policy,
        }
    }

    /// Reload the policy from a file. The old policy stays installed when
    /// the file fails to load or compile.
    pub fn reload_from(&self, path: &Path) -> Result<(), ConfigError> {
        let policy = Config::load(path)?.build_policy()?;
        self.install(policy);
        Ok(())
    }
}

//! cg-core: policy file loading, audit logging, and the cmdgate CLI.
//!
//! This crate turns TOML policy files into engine policies for `cg_policy`
//! and records verdicts to an audit log. Exposed as a library for
//! integration testing.

pub mod audit;
pub mod config;
pub mod reload;

pub use audit::AuditLogger;
pub use config::{config_path, env_policy_path, AuditConfig, Config, ConfigError};
pub use reload::PolicyHandle;

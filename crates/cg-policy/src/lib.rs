//! Shell command allow/deny policy validation engine.
//!
//! Decides whether a raw shell command string may be executed by evaluating
//! it against a configurable policy before any process is spawned. The
//! string is split into its constituent sub-commands — honoring quotes,
//! escapes, operators, and command substitution — and each one must clear a
//! redirection guard, the deny rules, nested-command checks for `xargs` and
//! `find -exec`, and finally the allow rules. A command no allow rule
//! speaks for is rejected.
//!
//! # Architecture
//!
//! - `extract` — splits a raw string into sub-commands
//! - `redirect` — detects unquoted output redirection
//! - `matcher` — deny and allow rule evaluation
//! - `indirect` — nested-command extraction for `xargs` and `find -exec`
//! - `validate` — the pipeline tying the phases together
//! - `rules` / `verdict` — the policy and verdict data model
//!
//! # Usage
//!
//! ```
//! use cg_policy::{validate, AllowRule, DenyRule, PolicyConfig};
//!
//! let policy = PolicyConfig::new(
//!     vec![AllowRule::simple("ls")],
//!     vec![DenyRule::literal("rm").with_message("use trash instead")],
//! );
//!
//! assert!(validate("ls -la", &policy).is_valid);
//! assert!(!validate("rm -rf /", &policy).is_valid);
//! ```

pub mod extract;
pub mod indirect;
pub mod matcher;
pub mod redirect;
pub mod rules;
pub mod validate;
pub mod verdict;

pub use extract::{base_command, extract, subcommand, tokens, MAX_SUBSTITUTION_DEPTH};
pub use matcher::AllowOutcome;
pub use redirect::check_redirection;
pub use rules::{
    AllowRule, DenyRule, PolicyConfig, PolicyError, SubcommandPolicy, DEFAULT_DENY_MESSAGE,
};
pub use validate::validate;
pub use verdict::{BlockLocation, BlockReason, Verdict};

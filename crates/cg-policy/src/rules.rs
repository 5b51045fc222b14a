//! Policy rule types: which commands may run, which must not, and how
//! subcommands are scoped.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Message used when a command is rejected and no rule supplies its own.
pub const DEFAULT_DENY_MESSAGE: &str = "command is not permitted by the current policy";

/// Error raised while building policy rules.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid deny pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// Subcommand scoping for a scoped allow rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubcommandPolicy {
    /// Any subcommand may run.
    Unrestricted,
    /// Only the listed subcommands may run; everything else is rejected.
    AllowList(BTreeSet<String>),
    /// The listed subcommands are rejected; everything else may run.
    DenyList(BTreeSet<String>),
}

/// A command the policy permits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowRule {
    /// Bare command name; arguments and subcommands are unconstrained.
    Simple(String),
    /// Command whose subcommands are scoped.
    Scoped {
        command: String,
        subcommands: SubcommandPolicy,
    },
}

impl AllowRule {
    /// Allow a command with no subcommand constraints.
    pub fn simple(command: impl Into<String>) -> Self {
        AllowRule::Simple(command.into())
    }

    /// Allow a command, restricted to the listed subcommands.
    pub fn subcommand_allowlist<I, S>(command: impl Into<String>, subcommands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowRule::Scoped {
            command: command.into(),
            subcommands: SubcommandPolicy::AllowList(
                subcommands.into_iter().map(Into::into).collect(),
            ),
        }
    }

    /// Allow a command except for the listed subcommands.
    pub fn subcommand_denylist<I, S>(command: impl Into<String>, subcommands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowRule::Scoped {
            command: command.into(),
            subcommands: SubcommandPolicy::DenyList(
                subcommands.into_iter().map(Into::into).collect(),
            ),
        }
    }

    /// The command name this rule applies to.
    pub fn command(&self) -> &str {
        match self {
            AllowRule::Simple(command) => command,
            AllowRule::Scoped { command, .. } => command,
        }
    }
}

/// A command or pattern the policy forbids.
///
/// Pattern rules carry their compiled regex alongside the source text;
/// equality and serialization use the source text only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyRule {
    Literal {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Pattern {
        pattern: String,
        #[serde(skip)]
        regex: Regex,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl DenyRule {
    /// Deny a command by exact name.
    pub fn literal(command: impl Into<String>) -> Self {
        DenyRule::Literal {
            command: command.into(),
            message: None,
        }
    }

    /// Deny any command whose text matches the regular expression.
    pub fn pattern(pattern: &str) -> Result<Self, PolicyError> {
        let regex = Regex::new(pattern).map_err(|source| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;
        Ok(DenyRule::Pattern {
            pattern: pattern.to_string(),
            regex,
            message: None,
        })
    }

    /// Attach a custom denial message shown instead of the policy default.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            DenyRule::Literal { command, .. } => DenyRule::Literal {
                command,
                message: Some(message.into()),
            },
            DenyRule::Pattern { pattern, regex, .. } => DenyRule::Pattern {
                pattern,
                regex,
                message: Some(message.into()),
            },
        }
    }

    /// The rule's custom message, if one was set.
    pub fn message(&self) -> Option<&str> {
        match self {
            DenyRule::Literal { message, .. } => message.as_deref(),
            DenyRule::Pattern { message, .. } => message.as_deref(),
        }
    }
}

impl PartialEq for DenyRule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                DenyRule::Literal {
                    command: a,
                    message: am,
                },
                DenyRule::Literal {
                    command: b,
                    message: bm,
                },
            ) => a == b && am == bm,
            (
                DenyRule::Pattern {
                    pattern: a,
                    message: am,
                    ..
                },
                DenyRule::Pattern {
                    pattern: b,
                    message: bm,
                    ..
                },
            ) => a == b && am == bm,
            _ => false,
        }
    }
}

impl fmt::Display for DenyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyRule::Literal { command, .. } => write!(f, "{command}"),
            DenyRule::Pattern { pattern, .. } => write!(f, "{pattern}"),
        }
    }
}

/// A complete, immutable policy.
///
/// Rule order matters: the first matching rule in each list wins. An empty
/// allow list rejects everything (fail-closed).
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub allow_rules: Vec<AllowRule>,
    pub deny_rules: Vec<DenyRule>,
    pub default_message: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            allow_rules: Vec::new(),
            deny_rules: Vec::new(),
            default_message: DEFAULT_DENY_MESSAGE.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Build a policy from rule lists, using the default denial message.
    pub fn new(allow_rules: Vec<AllowRule>, deny_rules: Vec<DenyRule>) -> Self {
        PolicyConfig {
            allow_rules,
            deny_rules,
            default_message: DEFAULT_DENY_MESSAGE.to_string(),
        }
    }

    /// Replace the default denial message.
    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }
}

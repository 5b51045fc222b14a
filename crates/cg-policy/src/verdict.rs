//! Validation verdicts and the denial taxonomy.
//!
//! Every rejection is a value, not an error: callers branch on `is_valid`
//! and report `message`, while audit tooling keys off the location tag.

use serde::Serialize;

use crate::rules::DenyRule;

/// Where in the validation pipeline a command was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLocation {
    EmptyCommand,
    OutputRedirectionDetected,
    DeniedByLiteralRule,
    DeniedByPatternRule,
    NotInAllowlist,
    SubcommandDenied,
    SubcommandNotInAllowlist,
    NestedCommandDenied,
    NestedCommandNotInAllowlist,
    SubstitutionDepthExceeded,
}

impl BlockLocation {
    /// Machine-readable tag for audit logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockLocation::EmptyCommand => "empty_command",
            BlockLocation::OutputRedirectionDetected => "output_redirection_detected",
            BlockLocation::DeniedByLiteralRule => "denied_by_literal_rule",
            BlockLocation::DeniedByPatternRule => "denied_by_pattern_rule",
            BlockLocation::NotInAllowlist => "not_in_allowlist",
            BlockLocation::SubcommandDenied => "subcommand_denied",
            BlockLocation::SubcommandNotInAllowlist => "subcommand_not_in_allowlist",
            BlockLocation::NestedCommandDenied => "nested_command_denied",
            BlockLocation::NestedCommandNotInAllowlist => "nested_command_not_in_allowlist",
            BlockLocation::SubstitutionDepthExceeded => "substitution_depth_exceeded",
        }
    }
}

/// Why a command was blocked: the pipeline phase, plus the deny rule that
/// fired when one did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReason {
    pub location: BlockLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<DenyRule>,
}

/// Outcome of validating one command string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub is_valid: bool,
    /// The exact text that was evaluated: the whole input for whole-string
    /// failures and for valid verdicts, otherwise the offending sub-command.
    pub command: String,
    /// First token of `command`, assignments skipped.
    pub base_command: String,
    /// Denial reason; empty for valid verdicts.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<BlockReason>,
}

impl Verdict {
    /// A command that passed every check.
    pub fn valid(command: &str, base_command: &str) -> Self {
        Verdict {
            is_valid: true,
            command: command.to_string(),
            base_command: base_command.to_string(),
            message: String::new(),
            block_reason: None,
        }
    }

    /// A blocked command with no specific deny rule attached.
    pub fn blocked(
        command: &str,
        base_command: &str,
        message: impl Into<String>,
        location: BlockLocation,
    ) -> Self {
        Verdict {
            is_valid: false,
            command: command.to_string(),
            base_command: base_command.to_string(),
            message: message.into(),
            block_reason: Some(BlockReason {
                location,
                matched_rule: None,
            }),
        }
    }

    /// A blocked command attributed to the deny rule that matched it.
    pub fn blocked_by_rule(
        command: &str,
        base_command: &str,
        message: impl Into<String>,
        location: BlockLocation,
        rule: DenyRule,
    ) -> Self {
        Verdict {
            is_valid: false,
            command: command.to_string(),
            base_command: base_command.to_string(),
            message: message.into(),
            block_reason: Some(BlockReason {
                location,
                matched_rule: Some(rule),
            }),
        }
    }

    /// The location tag, if this verdict is a denial.
    pub fn location(&self) -> Option<BlockLocation> {
        self.block_reason.as_ref().map(|reason| reason.location)
    }
}

//! The validation pipeline: one command string in, one verdict out.

use tracing::debug;

use crate::extract;
use crate::indirect;
use crate::matcher::{self, AllowOutcome};
use crate::redirect;
use crate::rules::{DenyRule, PolicyConfig};
use crate::verdict::{BlockLocation, Verdict};

/// Validate a command string against a policy.
///
/// Phases, first failure wins: redirection guard over the whole string,
/// extraction into sub-commands, then per sub-command the redirection guard
/// again, the deny rules, nested-command checks for exec introducers, and
/// finally the allow rules. A command no allow rule speaks for is rejected.
pub fn validate(command: &str, policy: &PolicyConfig) -> Verdict {
    let verdict = run_pipeline(command, policy);
    if !verdict.is_valid {
        debug!(
            command = %verdict.command,
            location = verdict
                .block_reason
                .as_ref()
                .map(|reason| reason.location.as_str())
                .unwrap_or(""),
            "command blocked"
        );
    }
    verdict
}

fn run_pipeline(command: &str, policy: &PolicyConfig) -> Verdict {
    let input_base = extract::base_command(command).unwrap_or_default();

    if let Some(message) = redirect::check_redirection(command) {
        return Verdict::blocked(
            command,
            &input_base,
            message,
            BlockLocation::OutputRedirectionDetected,
        );
    }

    let extraction = extract::extraction(command);
    if extraction.depth_exceeded {
        return Verdict::blocked(
            command,
            &input_base,
            "command substitutions nest too deeply to validate",
            BlockLocation::SubstitutionDepthExceeded,
        );
    }
    if extraction.commands.is_empty() {
        return Verdict::blocked(command, "", "empty command", BlockLocation::EmptyCommand);
    }

    for sub in &extraction.commands {
        if let Some(verdict) = screen_command(sub, policy) {
            return verdict;
        }
    }

    let first_base = extraction
        .commands
        .iter()
        .find_map(|cmd| extract::base_command(cmd))
        .unwrap_or_default();
    Verdict::valid(command, &first_base)
}

/// Run one extracted command through the per-command phases.
/// `None` means it passed all of them.
fn screen_command(command: &str, policy: &PolicyConfig) -> Option<Verdict> {
    if let Some(message) = redirect::check_redirection(command) {
        let base = extract::base_command(command).unwrap_or_default();
        return Some(Verdict::blocked(
            command,
            &base,
            message,
            BlockLocation::OutputRedirectionDetected,
        ));
    }

    // A segment of nothing but assignments runs no program.
    let base = extract::base_command(command)?;

    if let Some(rule) = matcher::match_deny(&base, command, &policy.deny_rules) {
        return Some(Verdict::blocked_by_rule(
            command,
            &base,
            denial_message(rule, policy),
            deny_location(rule),
            rule.clone(),
        ));
    }

    if indirect::is_exec_introducer(&base) {
        if let Some(verdict) = screen_nested(command, &base, policy) {
            return Some(verdict);
        }
    }

    let sub = extract::subcommand(command);
    match matcher::evaluate_allow(&base, sub.as_deref(), &policy.allow_rules) {
        AllowOutcome::Permitted(_) => None,
        AllowOutcome::NoRule => Some(Verdict::blocked(
            command,
            &base,
            format!("{}: '{base}'", policy.default_message),
            BlockLocation::NotInAllowlist,
        )),
        AllowOutcome::SubcommandDenied { subcommand, .. } => Some(Verdict::blocked(
            command,
            &base,
            format!("subcommand '{subcommand}' is denied for '{base}'"),
            BlockLocation::SubcommandDenied,
        )),
        AllowOutcome::SubcommandNotAllowed { subcommand, .. } => Some(Verdict::blocked(
            command,
            &base,
            format!("subcommand '{subcommand}' is not in the allow list for '{base}'"),
            BlockLocation::SubcommandNotInAllowlist,
        )),
    }
}

/// Deny- and allow-check the command an introducer hands off to. Failures
/// are attributed to the outer command, citing the nested one.
fn screen_nested(command: &str, base: &str, policy: &PolicyConfig) -> Option<Verdict> {
    let (nested, nested_sub) = indirect::nested_command(command)?;

    if let Some(rule) = matcher::match_deny(&nested, &nested, &policy.deny_rules) {
        let message = match rule.message() {
            Some(custom) => format!("nested command '{nested}' is denied: {custom}"),
            None => format!("nested command '{nested}' is denied by policy"),
        };
        return Some(Verdict::blocked_by_rule(
            command,
            base,
            message,
            BlockLocation::NestedCommandDenied,
            rule.clone(),
        ));
    }

    match matcher::evaluate_allow(&nested, nested_sub.as_deref(), &policy.allow_rules) {
        AllowOutcome::Permitted(_) => None,
        AllowOutcome::NoRule => Some(Verdict::blocked(
            command,
            base,
            format!("nested command '{nested}' is not in the allow list"),
            BlockLocation::NestedCommandNotInAllowlist,
        )),
        AllowOutcome::SubcommandDenied { subcommand, .. } => Some(Verdict::blocked(
            command,
            base,
            format!("nested command '{nested} {subcommand}' is denied"),
            BlockLocation::NestedCommandDenied,
        )),
        AllowOutcome::SubcommandNotAllowed { subcommand, .. } => Some(Verdict::blocked(
            command,
            base,
            format!("nested subcommand '{subcommand}' of '{nested}' is not in the allow list"),
            BlockLocation::NestedCommandNotInAllowlist,
        )),
    }
}

fn deny_location(rule: &DenyRule) -> BlockLocation {
    match rule {
        DenyRule::Literal { .. } => BlockLocation::DeniedByLiteralRule,
        DenyRule::Pattern { .. } => BlockLocation::DeniedByPatternRule,
    }
}

fn denial_message(rule: &DenyRule, policy: &PolicyConfig) -> String {
    match rule.message() {
        Some(custom) => custom.to_string(),
        None => format!("{} (deny rule '{rule}')", policy.default_message),
    }
}

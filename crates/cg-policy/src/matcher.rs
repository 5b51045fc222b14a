//! Matching extracted commands against the policy's rule sets.
//!
//! Deny rules are consulted before allow rules, and a command no rule
//! speaks for is rejected.

use crate::extract::{basename, mask_quoted};
use crate::rules::{AllowRule, DenyRule, SubcommandPolicy};

/// Outcome of looking a base command up in the allow rules.
#[derive(Debug, Clone, PartialEq)]
pub enum AllowOutcome<'a> {
    /// A rule matched and its subcommand scoping passed.
    Permitted(&'a AllowRule),
    /// A scoped rule matched but the subcommand is on its deny list.
    SubcommandDenied {
        rule: &'a AllowRule,
        subcommand: String,
    },
    /// A scoped rule matched but the subcommand is not on its allow list.
    SubcommandNotAllowed {
        rule: &'a AllowRule,
        subcommand: String,
    },
    /// No rule speaks for this command.
    NoRule,
}

/// Find the first deny rule matching a command.
///
/// Literal rules compare against the base command token and against its path
/// basename, so `/bin/rm` cannot dodge a `rm` rule. Pattern rules run
/// against the command text with quoted span contents masked out, so string
/// arguments can never trigger them.
pub fn match_deny<'a>(base: &str, command: &str, rules: &'a [DenyRule]) -> Option<&'a DenyRule> {
    let masked = mask_quoted(command);

    rules.iter().find(|rule| match rule {
        DenyRule::Literal { command: name, .. } => base == name || basename(base) == name,
        DenyRule::Pattern { regex, .. } => regex.is_match(&masked),
    })
}

/// Look a base command up in the allow rules and apply subcommand scoping.
///
/// The first rule whose name equals the base command decides; a bare scoped
/// command with no subcommand token is permitted.
pub fn evaluate_allow<'a>(
    base: &str,
    subcommand: Option<&str>,
    rules: &'a [AllowRule],
) -> AllowOutcome<'a> {
    let Some(rule) = rules.iter().find(|rule| rule.command() == base) else {
        return AllowOutcome::NoRule;
    };

    let subcommands = match rule {
        AllowRule::Simple(_) => return AllowOutcome::Permitted(rule),
        AllowRule::Scoped { subcommands, .. } => subcommands,
    };

    match subcommands {
        SubcommandPolicy::Unrestricted => AllowOutcome::Permitted(rule),
        SubcommandPolicy::AllowList(listed) => match subcommand {
            Some(sub) if !listed.contains(sub) => AllowOutcome::SubcommandNotAllowed {
                rule,
                subcommand: sub.to_string(),
            },
            _ => AllowOutcome::Permitted(rule),
        },
        SubcommandPolicy::DenyList(listed) => match subcommand {
            Some(sub) if listed.contains(sub) => AllowOutcome::SubcommandDenied {
                rule,
                subcommand: sub.to_string(),
            },
            _ => AllowOutcome::Permitted(rule),
        },
    }
}

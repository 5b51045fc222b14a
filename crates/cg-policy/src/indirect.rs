//! Nested-command extraction for commands that run other commands.
//!
//! `xargs rm` executes `rm`; `find . -exec rm {} \;` does too. The command
//! handed off must clear the same deny and allow checks as a directly typed
//! one, with the failure attributed to the outer command.

use crate::extract::{basename, tokens};

/// Commands that execute another command given in their arguments.
pub const EXEC_INTRODUCERS: &[&str] = &["xargs", "find"];

/// xargs flags that consume the following token as their value.
const XARGS_VALUE_FLAGS: &[&str] = &[
    "-a", "-d", "-E", "-e", "-I", "-i", "-J", "-L", "-l", "-n", "-P", "-R", "-S", "-s",
];

/// Long xargs flags that consume the following token when not using `=`.
const XARGS_LONG_VALUE_FLAGS: &[&str] = &[
    "--arg-file",
    "--delimiter",
    "--eof",
    "--max-args",
    "--max-chars",
    "--max-lines",
    "--max-procs",
];

/// find primaries whose next token is a command to execute.
const FIND_EXEC_PRIMARIES: &[&str] = &["-exec", "-execdir", "-ok", "-okdir"];

/// Whether a base command hands execution to a command in its arguments.
pub fn is_exec_introducer(base: &str) -> bool {
    EXEC_INTRODUCERS.contains(&basename(base))
}

/// The command an introducer invocation hands off to, plus the token after
/// it (the nested subcommand position), if any.
pub fn nested_command(command: &str) -> Option<(String, Option<String>)> {
    let words = tokens(command);
    let start = words
        .iter()
        .position(|word| EXEC_INTRODUCERS.contains(&basename(word)))?;

    match basename(&words[start]) {
        "xargs" => nested_in_xargs(&words[start + 1..]),
        "find" => nested_in_find(&words[start + 1..]),
        _ => None,
    }
}

fn nested_in_xargs(args: &[String]) -> Option<(String, Option<String>)> {
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if let Some(rest) = arg.strip_prefix("--") {
            // `--max-args=2` carries its value; `--max-args 2` does not
            if !rest.contains('=') && XARGS_LONG_VALUE_FLAGS.contains(&arg) {
                i += 1;
            }
            i += 1;
            continue;
        }
        if arg.starts_with('-') && arg.len() > 1 {
            // a bare value flag consumes the next token; glued values
            // (`-n1`, `-I{}`) are self-contained
            if XARGS_VALUE_FLAGS.contains(&arg) {
                i += 1;
            }
            i += 1;
            continue;
        }
        let subcommand = args
            .get(i + 1)
            .filter(|tok| !is_exec_terminator(tok.as_str()))
            .cloned();
        return Some((args[i].clone(), subcommand));
    }
    None
}

fn nested_in_find(args: &[String]) -> Option<(String, Option<String>)> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if FIND_EXEC_PRIMARIES.contains(&arg.as_str()) {
            let command = iter.next()?.clone();
            let subcommand = iter
                .next()
                .filter(|tok| !is_exec_terminator(tok.as_str()))
                .cloned();
            return Some((command, subcommand));
        }
    }
    None
}

/// Tokens that end or fill a `-exec` argument list rather than naming a
/// subcommand: the `{}` placeholder and the `;` / `+` terminators.
fn is_exec_terminator(token: &str) -> bool {
    matches!(token, "{}" | ";" | "+")
}

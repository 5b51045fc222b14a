//! Detection of unquoted output redirection.

/// Check a command string for unquoted output redirection.
///
/// Returns a denial message naming the operator found (`>` overwrite, `>>`
/// append, `&>`/`&>>` both streams), or `None` when the string is clean.
/// Only operators with whitespace (or the start of the string) on their left
/// count; glued forms like `2>` and `a>b` are argument text, and fd
/// duplications like `>&2` write no file.
pub fn check_redirection(command: &str) -> Option<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '\\' && !in_single {
            i += 2;
            continue;
        }
        if ch == '\'' && !in_double {
            in_single = !in_single;
            i += 1;
            continue;
        }
        if ch == '"' && !in_single {
            in_double = !in_double;
            i += 1;
            continue;
        }
        if in_single || in_double {
            i += 1;
            continue;
        }

        let at_boundary = i == 0 || chars[i - 1].is_whitespace();

        if ch == '&' && at_boundary && chars.get(i + 1) == Some(&'>') {
            let operator = if chars.get(i + 2) == Some(&'>') {
                "&>>"
            } else {
                "&>"
            };
            return Some(denial(operator));
        }

        if ch == '>' && at_boundary && !is_fd_duplication(&chars, i) {
            let operator = if chars.get(i + 1) == Some(&'>') {
                ">>"
            } else {
                ">"
            };
            return Some(denial(operator));
        }

        i += 1;
    }

    None
}

fn denial(operator: &str) -> String {
    let effect = match operator {
        ">>" | "&>>" => "append",
        _ => "overwrite",
    };
    format!("output redirection `{operator}` would {effect} a file and is not allowed")
}

/// True for `>&N` / `>>&N` forms that duplicate or close a file descriptor.
fn is_fd_duplication(chars: &[char], gt: usize) -> bool {
    let mut i = gt + 1;
    if chars.get(i) == Some(&'>') {
        i += 1;
    }
    if chars.get(i) != Some(&'&') {
        return false;
    }
    i += 1;
    let target: String = chars[i..]
        .iter()
        .take_while(|c| !c.is_whitespace())
        .collect();
    target == "-" || (!target.is_empty() && target.chars().all(|c| c.is_ascii_digit()))
}

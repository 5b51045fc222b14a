//! Splitting a raw command string into the individual commands it would run.
//!
//! A character-cursor scanner walks the string once, tracking quote and
//! escape state. Unquoted operators split segments, `$(...)` and backtick
//! substitutions are resolved depth-first so inner commands are validated
//! on their own, and `find -exec` argument lists are kept intact.

/// Maximum nesting depth for command substitutions.
pub const MAX_SUBSTITUTION_DEPTH: usize = 32;

/// Everything the scanner learned about one input string.
#[derive(Debug, Default)]
pub(crate) struct Extraction {
    pub commands: Vec<String>,
    pub depth_exceeded: bool,
}

/// Split a command string into its constituent commands.
///
/// Commands inside `$(...)` and backtick substitutions appear before the
/// command that contains them. Blank input yields an empty list; the
/// function never fails.
pub fn extract(command: &str) -> Vec<String> {
    extraction(command).commands
}

pub(crate) fn extraction(command: &str) -> Extraction {
    let mut out = Extraction::default();
    scan(command, 0, &mut out);
    out
}

fn scan(input: &str, depth: usize, out: &mut Extraction) {
    if depth > MAX_SUBSTITUTION_DEPTH {
        out.depth_exceeded = true;
        return;
    }

    let chars: Vec<char> = input.chars().collect();
    let mut segment = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut find_mode = false;
    let mut segment_started = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        // Segment boundaries only occur outside quotes, so the first
        // non-whitespace character of a segment is always unquoted.
        if !segment_started && !ch.is_whitespace() {
            segment_started = true;
            find_mode = token_at(&chars, i) == "find" && contains_from(&chars, i, "-exec");
        }

        // An escaped character never acts as syntax; keep the raw text.
        if ch == '\\' && !in_single {
            segment.push(ch);
            if let Some(&next) = chars.get(i + 1) {
                segment.push(next);
            }
            i += 2;
            continue;
        }

        if ch == '\'' && !in_double {
            in_single = !in_single;
            segment.push(ch);
            i += 1;
            continue;
        }

        if ch == '"' && !in_single {
            in_double = !in_double;
            segment.push(ch);
            i += 1;
            continue;
        }

        if in_single {
            segment.push(ch);
            i += 1;
            continue;
        }

        // Substitutions stay live inside double quotes, as in a real shell.
        if ch == '$' && chars.get(i + 1) == Some(&'(') {
            // `$((...))` is arithmetic only while the span parses as
            // arithmetic; a shell that cannot read it that way falls back
            // to a substitution opening a subshell, so we must too.
            if chars.get(i + 2) == Some(&'(') {
                let end = balanced_parens_end(&chars, i + 1);
                if is_arithmetic(&chars[i + 2..end.saturating_sub(1)]) {
                    segment.extend(&chars[i..end]);
                    i = end;
                    continue;
                }
            }
            let (inner, end) = substitution_span(&chars, i + 2);
            scan(&inner, depth + 1, out);
            segment.extend(&chars[i..end]);
            i = end;
            continue;
        }

        if ch == '`' {
            let (inner, end) = backtick_span(&chars, i + 1);
            scan(&inner, depth + 1, out);
            segment.extend(&chars[i..end]);
            i = end;
            continue;
        }

        if in_double {
            segment.push(ch);
            i += 1;
            continue;
        }

        if find_mode {
            // Dedicated find scan: only `&&`, `;`, and newlines separate,
            // so `-exec` argument lists with `{}` and pipes survive intact.
            if ch == ';' || ch == '\n' {
                flush(&mut segment, out, &mut segment_started, &mut find_mode);
                i += 1;
                continue;
            }
            if ch == '&' && chars.get(i + 1) == Some(&'&') {
                flush(&mut segment, out, &mut segment_started, &mut find_mode);
                i += 2;
                continue;
            }
            segment.push(ch);
            i += 1;
            continue;
        }

        match ch {
            ';' | '\n' => {
                flush(&mut segment, out, &mut segment_started, &mut find_mode);
                i += 1;
            }
            '|' => {
                flush(&mut segment, out, &mut segment_started, &mut find_mode);
                i += if chars.get(i + 1) == Some(&'|') { 2 } else { 1 };
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    flush(&mut segment, out, &mut segment_started, &mut find_mode);
                    i += 2;
                } else if (i > 0 && chars[i - 1] == '>') || chars.get(i + 1) == Some(&'>') {
                    // part of a redirection form (`2>&1`, `&>file`), not a separator
                    segment.push(ch);
                    i += 1;
                } else {
                    flush(&mut segment, out, &mut segment_started, &mut find_mode);
                    i += 1;
                }
            }
            '(' | ')' => {
                flush(&mut segment, out, &mut segment_started, &mut find_mode);
                i += 1;
            }
            '{' | '}' => {
                // Braces only group when they stand alone as a word;
                // `{a,b}` expansions and find's `{}` are ordinary text.
                if standalone_brace(&chars, i) {
                    flush(&mut segment, out, &mut segment_started, &mut find_mode);
                } else {
                    segment.push(ch);
                }
                i += 1;
            }
            _ => {
                segment.push(ch);
                i += 1;
            }
        }
    }

    flush(&mut segment, out, &mut segment_started, &mut find_mode);
}

fn flush(segment: &mut String, out: &mut Extraction, segment_started: &mut bool, find_mode: &mut bool) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        out.commands.push(trimmed.to_string());
    }
    segment.clear();
    *segment_started = false;
    *find_mode = false;
}

/// Scan from just past `$(` to the matching `)`, honoring quotes, escapes,
/// and nested parentheses. Returns the inner text and the index one past the
/// closing paren; an unterminated substitution runs to the end of input.
fn substitution_span(chars: &[char], start: usize) -> (String, usize) {
    let mut inner = String::new();
    let mut depth = 1usize;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = start;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' && !in_single {
            inner.push(ch);
            if let Some(&next) = chars.get(i + 1) {
                inner.push(next);
            }
            i += 2;
            continue;
        }
        if ch == '\'' && !in_double {
            in_single = !in_single;
        } else if ch == '"' && !in_single {
            in_double = !in_double;
        } else if !in_single && !in_double {
            if ch == '(' {
                depth += 1;
            } else if ch == ')' {
                depth -= 1;
                if depth == 0 {
                    return (inner, i + 1);
                }
            }
        }
        inner.push(ch);
        i += 1;
    }

    (inner, chars.len())
}

/// Scan from just past an opening backtick to the next unescaped backtick.
/// The shell unescapes `` \` `` inside a backtick span to nest substitutions,
/// so the backslash is dropped there and the recursive scan sees a live pair;
/// every other escape is kept verbatim.
fn backtick_span(chars: &[char], start: usize) -> (String, usize) {
    let mut inner = String::new();
    let mut i = start;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' && i + 1 < chars.len() {
            if chars[i + 1] == '`' {
                inner.push('`');
            } else {
                inner.push(ch);
                inner.push(chars[i + 1]);
            }
            i += 2;
            continue;
        }
        if ch == '`' {
            return (inner, i + 1);
        }
        inner.push(ch);
        i += 1;
    }

    (inner, chars.len())
}

/// An arithmetic body holds operators and operands, never shell syntax.
/// Separators, backticks, and quotes mean the shell would re-read the
/// construct as a command substitution, so those spans must be recursed.
fn is_arithmetic(body: &[char]) -> bool {
    !body
        .iter()
        .any(|c| matches!(c, ';' | '|' | '&' | '`' | '\'' | '"'))
}

/// Index one past the parenthesized span opening at `open`.
fn balanced_parens_end(chars: &[char], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

/// The whitespace-delimited token starting at or after `from`.
fn token_at(chars: &[char], from: usize) -> String {
    chars[from..]
        .iter()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| !c.is_whitespace())
        .collect()
}

fn contains_from(chars: &[char], from: usize, needle: &str) -> bool {
    let needle: Vec<char> = needle.chars().collect();
    chars[from..]
        .windows(needle.len())
        .any(|window| window == needle.as_slice())
}

/// A brace splits only when it stands alone as a word.
fn standalone_brace(chars: &[char], i: usize) -> bool {
    let before_ok = i == 0 || chars[i - 1].is_whitespace();
    let after_ok = match chars.get(i + 1) {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, ';' | '&' | '|' | ')'),
    };
    before_ok && after_ok
}

/// Split a command into words, honoring quotes and backslash escapes.
/// Quote characters are stripped; escaped characters are kept verbatim.
pub fn tokens(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape_next = false;

    for ch in command.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        if ch == '\\' && !in_single {
            escape_next = true;
            continue;
        }

        if ch == '\'' && !in_double {
            in_single = !in_single;
            continue;
        }

        if ch == '"' && !in_single {
            in_double = !in_double;
            continue;
        }

        if ch.is_whitespace() && !in_single && !in_double {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// First word of a command, with `VAR=value` assignment words skipped.
pub fn base_command(command: &str) -> Option<String> {
    tokens(command)
        .into_iter()
        .find(|token| !is_assignment(token))
}

/// Second word of a command (the subcommand position), if present.
pub fn subcommand(command: &str) -> Option<String> {
    let tokens = tokens(command);
    let base = tokens.iter().position(|token| !is_assignment(token))?;
    tokens.into_iter().nth(base + 1)
}

/// Extract the basename from a path (e.g., "/usr/bin/rm" -> "rm").
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Replace the contents of quoted spans, keeping the quote characters, so
/// deny patterns cannot match inside string arguments.
pub(crate) fn mask_quoted(text: &str) -> String {
    let mut out = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            if !in_single && !in_double {
                out.push(ch);
            }
            continue;
        }

        if ch == '\\' && !in_single {
            escape_next = true;
            if !in_double {
                out.push(ch);
            }
            continue;
        }

        if ch == '\'' && !in_double {
            in_single = !in_single;
            out.push(ch);
            continue;
        }

        if ch == '"' && !in_single {
            in_double = !in_double;
            out.push(ch);
            continue;
        }

        if in_single || in_double {
            continue;
        }

        out.push(ch);
    }

    out
}

fn is_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Plain splitting ---

    #[test]
    fn single_command_passes_through() {
        assert_eq!(extract("ls -la /tmp"), vec!["ls -la /tmp"]);
        assert_eq!(extract("  ls -la  "), vec!["ls -la"]);
    }

    #[test]
    fn splits_on_operators() {
        assert_eq!(extract("a; b; c"), vec!["a", "b", "c"]);
        assert_eq!(extract("a && b || c"), vec!["a", "b", "c"]);
        assert_eq!(extract("a | b"), vec!["a", "b"]);
        assert_eq!(extract("a & b"), vec!["a", "b"]);
    }

    #[test]
    fn newline_separates_commands() {
        assert_eq!(extract("ls\npwd"), vec!["ls", "pwd"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("   ").is_empty());
        assert!(extract(" ; ; ").is_empty());
    }

    #[test]
    fn trailing_background_ampersand() {
        assert_eq!(extract("sleep 5 &"), vec!["sleep 5"]);
    }

    // --- Quoting and escaping ---

    #[test]
    fn quoted_operators_stay_literal() {
        assert_eq!(extract(r#"echo "a;b""#), vec![r#"echo "a;b""#]);
        assert_eq!(extract("echo 'a && b'"), vec!["echo 'a && b'"]);
    }

    #[test]
    fn escaped_semicolon_stays_literal() {
        assert_eq!(extract(r"echo a\;b"), vec![r"echo a\;b"]);
    }

    #[test]
    fn fd_redirection_forms_not_split() {
        assert_eq!(extract("cmd 2>&1"), vec!["cmd 2>&1"]);
        assert_eq!(extract("cmd &> log"), vec!["cmd &> log"]);
    }

    // --- Command substitution ---

    #[test]
    fn substitution_inner_command_first() {
        assert_eq!(extract("echo $(whoami)"), vec!["whoami", "echo $(whoami)"]);
    }

    #[test]
    fn nested_substitutions_deepest_first() {
        assert_eq!(
            extract("echo $(echo $(whoami))"),
            vec!["whoami", "echo $(whoami)", "echo $(echo $(whoami))"]
        );
    }

    #[test]
    fn substitution_live_inside_double_quotes() {
        assert_eq!(
            extract(r#"echo "$(id -u)""#),
            vec!["id -u", r#"echo "$(id -u)""#]
        );
    }

    #[test]
    fn single_quotes_suppress_substitution() {
        assert_eq!(extract("echo '$(id)'"), vec!["echo '$(id)'"]);
    }

    #[test]
    fn substitution_with_operators_inside() {
        assert_eq!(
            extract("echo $(ls; whoami)"),
            vec!["ls", "whoami", "echo $(ls; whoami)"]
        );
    }

    #[test]
    fn backticks_extracted() {
        assert_eq!(extract("echo `date`"), vec!["date", "echo `date`"]);
    }

    #[test]
    fn arithmetic_is_not_a_command() {
        assert_eq!(extract("echo $((1+2))"), vec!["echo $((1+2))"]);
        assert_eq!(extract("echo $((x * 3))"), vec!["echo $((x * 3))"]);
    }

    #[test]
    fn arithmetic_lookalike_subshell_is_extracted() {
        // A shell that cannot parse the span as arithmetic re-reads it as
        // a substitution holding a subshell and runs the contents.
        assert_eq!(
            extract("echo $((rm -rf /tmp/x); true)"),
            vec!["rm -rf /tmp/x", "true", "echo $((rm -rf /tmp/x); true)"]
        );
    }

    #[test]
    fn escaped_backtick_opens_nested_substitution() {
        assert_eq!(
            extract(r"echo `echo \`whoami\``"),
            vec!["whoami", "echo `whoami`", r"echo `echo \`whoami\``"]
        );
    }

    #[test]
    fn depth_limit_flagged() {
        let mut nested = "whoami".to_string();
        for _ in 0..40 {
            nested = format!("$({nested})");
        }
        let result = extraction(&format!("echo {nested}"));
        assert!(result.depth_exceeded);

        let shallow = extraction("echo $(echo $(whoami))");
        assert!(!shallow.depth_exceeded);
    }

    // --- find -exec ---

    #[test]
    fn find_exec_kept_intact() {
        assert_eq!(
            extract(r"find . -name '*.pyc' -exec rm {} \;"),
            vec![r"find . -name '*.pyc' -exec rm {} \;"]
        );
    }

    #[test]
    fn find_exec_with_trailing_chain() {
        assert_eq!(
            extract(r"find . -exec rm {} \; && ls"),
            vec![r"find . -exec rm {} \;", "ls"]
        );
    }

    #[test]
    fn find_behind_other_commands_still_protected() {
        assert_eq!(
            extract(r"ls; find . -exec rm {} \;"),
            vec!["ls", r"find . -exec rm {} \;"]
        );
    }

    #[test]
    fn find_without_exec_splits_normally() {
        assert_eq!(
            extract("find . -name '*.rs' | head"),
            vec!["find . -name '*.rs'", "head"]
        );
    }

    // --- Grouping ---

    #[test]
    fn subshell_contents_split() {
        assert_eq!(extract("(cd /tmp && ls)"), vec!["cd /tmp", "ls"]);
    }

    #[test]
    fn brace_group_split() {
        assert_eq!(extract("{ ls; pwd; }"), vec!["ls", "pwd"]);
    }

    #[test]
    fn brace_expansion_stays_literal() {
        assert_eq!(extract("echo {a,b}"), vec!["echo {a,b}"]);
    }

    // --- Word helpers ---

    #[test]
    fn tokens_respect_quotes() {
        assert_eq!(tokens(r#"echo "a b" c"#), vec!["echo", "a b", "c"]);
        assert_eq!(tokens(r"a\ b"), vec!["a b"]);
        assert_eq!(tokens("  "), Vec::<String>::new());
    }

    #[test]
    fn base_command_skips_assignments() {
        assert_eq!(base_command("ls -la"), Some("ls".to_string()));
        assert_eq!(base_command("FOO=1 rm -rf /"), Some("rm".to_string()));
        assert_eq!(base_command("FOO=1 BAR=2 git push"), Some("git".to_string()));
        assert_eq!(base_command("FOO=1"), None);
        assert_eq!(base_command(""), None);
    }

    #[test]
    fn subcommand_is_second_word() {
        assert_eq!(subcommand("git status"), Some("status".to_string()));
        assert_eq!(subcommand("git"), None);
        assert_eq!(subcommand("FOO=1 git push"), Some("push".to_string()));
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("/usr/bin/rm"), "rm");
        assert_eq!(basename("rm"), "rm");
        assert_eq!(basename("./rm"), "rm");
    }

    #[test]
    fn mask_quoted_strips_contents() {
        assert_eq!(mask_quoted(r#"echo "a sudo b""#), r#"echo """#);
        assert_eq!(mask_quoted("echo 'sudo'"), "echo ''");
        assert_eq!(mask_quoted("xargs sudo rm"), "xargs sudo rm");
        assert_eq!(mask_quoted(r#"echo "a \" sudo""#), r#"echo """#);
    }
}

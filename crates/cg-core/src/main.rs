use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;

use cg_core::audit::AuditLogger;
use cg_core::config::{env_policy_path, Config};
use cg_policy::{validate, Verdict};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("cmdgate — shell command policy gate");
    println!();
    println!("Usage:");
    println!("  cmdgate \"command string\"       Validate one command");
    println!("  echo \"cmd\" | cmdgate           Validate each line read from stdin");
    println!();
    println!("Options:");
    println!("  --policy <file>   Load the policy from <file> instead of the default");
    println!("                    location ($XDG_CONFIG_HOME/cmdgate/policy.toml) or");
    println!("                    the CMDGATE_POLICY environment variable");
    println!("  --json            Print full verdicts as JSON, one per line");
    println!("  --quiet           No output; the exit code carries the verdict");
    println!("  --version         Print version");
    println!("  --help            Print this help");
    println!();
    println!("Exit codes:");
    println!("  0  every command was allowed");
    println!("  1  at least one command was denied");
    println!("  2  usage or policy file error");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn report(verdict: &Verdict, json_output: bool, quiet: bool, audit: &mut AuditLogger) {
    if verdict.is_valid {
        audit.log_allowed(verdict);
    } else {
        audit.log_denied(verdict);
    }

    if quiet {
        return;
    }

    if json_output {
        match serde_json::to_string(verdict) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("error: failed to encode verdict: {e}"),
        }
        return;
    }

    if verdict.is_valid {
        println!("allow: {}", verdict.command);
    } else {
        println!("deny: {} ({})", verdict.command, verdict.message);
    }
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut policy_path: Option<PathBuf> = None;
    let mut json_output = false;
    let mut quiet = false;
    let mut command_arg: Option<String> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return;
            }
            "--version" | "-V" => {
                println!("cmdgate {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--json" => json_output = true,
            "--quiet" | "-q" => quiet = true,
            "--policy" => match iter.next() {
                Some(value) => policy_path = Some(PathBuf::from(value)),
                None => {
                    eprintln!("error: --policy requires a file argument");
                    std::process::exit(2);
                }
            },
            other if other.starts_with("--policy=") => {
                policy_path = Some(PathBuf::from(&other["--policy=".len()..]));
            }
            other if other.starts_with('-') && other.len() > 1 => {
                eprintln!("error: unknown option '{other}' (quote the command string)");
                std::process::exit(2);
            }
            other => {
                if command_arg.is_some() {
                    eprintln!("error: expected a single command string (quote the command)");
                    std::process::exit(2);
                }
                command_arg = Some(other.to_string());
            }
        }
    }

    // Explicit path (flag, then environment) must load; only the default
    // location falls back to the baseline policy when no file exists.
    let config_result = match policy_path.or_else(env_policy_path) {
        Some(path) => Config::load(&path),
        None => Config::load_default(),
    };
    let config = match config_result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let audit_config = config.audit.clone();
    let policy = match config.build_policy() {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let mut audit = AuditLogger::from_config(&audit_config);

    if let Some(command) = command_arg {
        let verdict = validate(&command, &policy);
        report(&verdict, json_output, quiet, &mut audit);
        std::process::exit(if verdict.is_valid { 0 } else { 1 });
    }

    // Line mode: one command per stdin line, exit 1 if any is denied.
    if !io::stdin().is_terminal() {
        let mut denied_any = false;
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    eprintln!("error: failed to read stdin: {e}");
                    std::process::exit(2);
                }
            };
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            let verdict = validate(command, &policy);
            if !verdict.is_valid {
                denied_any = true;
            }
            report(&verdict, json_output, quiet, &mut audit);
        }
        std::process::exit(if denied_any { 1 } else { 0 });
    }

    eprintln!("error: no command given (pass a command string or pipe one per line on stdin)");
    eprintln!("hint: run `cmdgate --help` for usage");
    std::process::exit(2);
}

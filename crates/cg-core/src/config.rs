use std::path::{Path, PathBuf};

use cg_policy::{AllowRule, DenyRule, PolicyConfig, PolicyError};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Parsed policy file.
///
/// Every section is optional; an absent file is not. A file that exists but
/// cannot be read or parsed is a hard error, because falling back to a wider
/// policy on a broken file would defeat the point of having one.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Message used for rejections that no deny rule claims.
    pub default_message: Option<String>,
    /// Commands that may run. Empty means nothing runs.
    pub allow: Vec<AllowEntry>,
    /// Commands that must not run, checked before the allow list.
    pub deny: Vec<DenyEntry>,
    pub audit: AuditConfig,
}

/// One entry in the `allow` array: either a bare command name or a table
/// that scopes the command's subcommands.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AllowEntry {
    Name(String),
    Detailed {
        command: String,
        #[serde(default)]
        subcommands: Option<Vec<String>>,
        #[serde(default)]
        deny_subcommands: Option<Vec<String>>,
    },
}

/// One `[[deny]]` table: a literal command name or a regular expression,
/// with an optional message shown on rejection.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DenyEntry {
    pub command: Option<String>,
    pub pattern: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable audit logging.
    pub enabled: bool,
    /// Custom audit log path. Defaults to ~/.local/share/cmdgate/audit.jsonl.
    pub log_path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: None,
        }
    }
}

impl AuditConfig {
    pub fn resolve_log_path(&self) -> PathBuf {
        if let Some(ref custom) = self.log_path {
            return PathBuf::from(custom);
        }

        let base = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".local").join("share")
            });
        base.join("cmdgate").join("audit.jsonl")
    }
}

/// Error loading or compiling a policy file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read policy file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse policy file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("invalid policy rule: {0}")]
    Rule(String),
    #[error(transparent)]
    Pattern(#[from] PolicyError),
}

impl AllowEntry {
    fn into_rule(self) -> Result<AllowRule, ConfigError> {
        match self {
            AllowEntry::Name(command) => Ok(AllowRule::simple(command)),
            AllowEntry::Detailed {
                command,
                subcommands: Some(_),
                deny_subcommands: Some(_),
            } => Err(ConfigError::Rule(format!(
                "allow entry `{command}` sets both subcommands and deny_subcommands"
            ))),
            AllowEntry::Detailed {
                command,
                subcommands: Some(subcommands),
                ..
            } => Ok(AllowRule::subcommand_allowlist(command, subcommands)),
            AllowEntry::Detailed {
                command,
                deny_subcommands: Some(subcommands),
                ..
            } => Ok(AllowRule::subcommand_denylist(command, subcommands)),
            AllowEntry::Detailed { command, .. } => Ok(AllowRule::simple(command)),
        }
    }
}

impl DenyEntry {
    fn literal(command: &str, message: &str) -> Self {
        DenyEntry {
            command: Some(command.to_string()),
            pattern: None,
            message: Some(message.to_string()),
        }
    }

    fn matching(pattern: &str, message: &str) -> Self {
        DenyEntry {
            command: None,
            pattern: Some(pattern.to_string()),
            message: Some(message.to_string()),
        }
    }

    fn into_rule(self) -> Result<DenyRule, ConfigError> {
        let DenyEntry {
            command,
            pattern,
            message,
        } = self;
        let rule = match (command, pattern) {
            (Some(command), None) => DenyRule::literal(command),
            (None, Some(pattern)) => DenyRule::pattern(&pattern)?,
            (Some(command), Some(_)) => {
                return Err(ConfigError::Rule(format!(
                    "deny entry `{command}` sets both command and pattern"
                )))
            }
            (None, None) => {
                return Err(ConfigError::Rule(
                    "deny entry must set either command or pattern".to_string(),
                ))
            }
        };
        Ok(match message {
            Some(message) => rule.with_message(message),
            None => rule,
        })
    }
}

/// Commands the built-in baseline policy permits.
const BASELINE_ALLOW: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "wc", "file", "stat", "pwd", "echo", "printf", "date",
    "whoami", "which", "env", "sort", "uniq", "cut", "tr", "diff", "du", "df", "find", "xargs",
];

impl Config {
    /// Read and parse a policy file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        debug!(
            path = %path.display(),
            allow = config.allow.len(),
            deny = config.deny.len(),
            "loaded policy file"
        );
        Ok(config)
    }

    /// Load the policy file from the default location, falling back to the
    /// built-in baseline when no file exists there.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = config_path();
        if path.exists() {
            Config::load(&path)
        } else {
            debug!(path = %path.display(), "no policy file; using baseline policy");
            Ok(Config::baseline())
        }
    }

    /// Built-in policy used when no policy file is present: common read-only
    /// tools are allowed, destructive and privilege-escalation commands are
    /// denied with explanatory messages.
    pub fn baseline() -> Self {
        let mut allow: Vec<AllowEntry> = BASELINE_ALLOW
            .iter()
            .map(|name| AllowEntry::Name((*name).to_string()))
            .collect();
        allow.push(AllowEntry::Detailed {
            command: "git".to_string(),
            subcommands: Some(
                ["status", "log", "diff", "show", "branch"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            deny_subcommands: None,
        });

        let deny = vec![
            DenyEntry::literal("rm", "destructive removal is blocked by the baseline policy"),
            DenyEntry::literal("dd", "raw disk writes are blocked by the baseline policy"),
            DenyEntry::literal("sudo", "privilege escalation is blocked by the baseline policy"),
            DenyEntry::literal("su", "privilege escalation is blocked by the baseline policy"),
            DenyEntry::literal("doas", "privilege escalation is blocked by the baseline policy"),
            DenyEntry::literal("shutdown", "host power control is blocked by the baseline policy"),
            DenyEntry::literal("reboot", "host power control is blocked by the baseline policy"),
            DenyEntry::matching("^mkfs", "filesystem tools are blocked by the baseline policy"),
        ];

        Config {
            default_message: None,
            allow,
            deny,
            audit: AuditConfig::default(),
        }
    }

    /// Compile the parsed entries into an engine policy.
    pub fn build_policy(self) -> Result<PolicyConfig, ConfigError> {
        let mut allow_rules = Vec::with_capacity(self.allow.len());
        for entry in self.allow {
            allow_rules.push(entry.into_rule()?);
        }
        let mut deny_rules = Vec::with_capacity(self.deny.len());
        for entry in self.deny {
            deny_rules.push(entry.into_rule()?);
        }

        let policy = PolicyConfig::new(allow_rules, deny_rules);
        Ok(match self.default_message {
            Some(message) => policy.with_default_message(message),
            None => policy,
        })
    }
}

/// Default policy file location: $XDG_CONFIG_HOME/cmdgate/policy.toml.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cmdgate").join("policy.toml")
}

/// Policy file named by `CMDGATE_POLICY`, if the variable is set and non-empty.
pub fn env_policy_path() -> Option<PathBuf> {
    std::env::var("CMDGATE_POLICY")
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_policy::validate;

    #[test]
    fn default_config() {
        let cfg = Config::default();
        assert!(cfg.default_message.is_none());
        assert!(cfg.allow.is_empty());
        assert!(cfg.deny.is_empty());
        assert!(cfg.audit.enabled);
        assert!(cfg.audit.log_path.is_none());
    }

    #[test]
    fn parse_empty_toml() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parse_bare_allow_names() {
        let cfg: Config = toml::from_str(r#"allow = ["ls", "cat"]"#).unwrap();
        assert_eq!(
            cfg.allow,
            vec![
                AllowEntry::Name("ls".to_string()),
                AllowEntry::Name("cat".to_string()),
            ]
        );
    }

    #[test]
    fn parse_scoped_allow_entries() {
        let toml = r#"
            allow = [
                "ls",
                { command = "git", subcommands = ["status", "log"] },
                { command = "cargo", deny_subcommands = ["publish"] },
            ]
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.allow.len(), 3);
        assert_eq!(
            cfg.allow[1],
            AllowEntry::Detailed {
                command: "git".to_string(),
                subcommands: Some(vec!["status".to_string(), "log".to_string()]),
                deny_subcommands: None,
            }
        );
        assert_eq!(
            cfg.allow[2],
            AllowEntry::Detailed {
                command: "cargo".to_string(),
                subcommands: None,
                deny_subcommands: Some(vec!["publish".to_string()]),
            }
        );
    }

    #[test]
    fn parse_deny_tables() {
        let toml = r#"
            [[deny]]
            command = "rm"
            message = "use trash instead of rm"

            [[deny]]
            pattern = "\\bsudo\\b"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.deny.len(), 2);
        assert_eq!(cfg.deny[0].command.as_deref(), Some("rm"));
        assert_eq!(cfg.deny[0].message.as_deref(), Some("use trash instead of rm"));
        assert_eq!(cfg.deny[1].pattern.as_deref(), Some(r"\bsudo\b"));
        assert!(cfg.deny[1].message.is_none());
    }

    #[test]
    fn parse_default_message() {
        let cfg: Config = toml::from_str(r#"default_message = "ask an operator""#).unwrap();
        assert_eq!(cfg.default_message.as_deref(), Some("ask an operator"));
    }

    #[test]
    fn parse_audit_section() {
        let toml = r#"
            [audit]
            enabled = false
            log_path = "/tmp/audit.jsonl"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert!(!cfg.audit.enabled);
        assert_eq!(cfg.audit.log_path.as_deref(), Some("/tmp/audit.jsonl"));
    }

    #[test]
    fn build_simple_and_scoped_rules() {
        let toml = r#"
            allow = ["ls", { command = "git", subcommands = ["status"] }]
        "#;
        let policy = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap();
        assert_eq!(policy.allow_rules[0], AllowRule::simple("ls"));
        assert_eq!(
            policy.allow_rules[1],
            AllowRule::subcommand_allowlist("git", ["status"])
        );
    }

    #[test]
    fn build_deny_rules_with_messages() {
        let toml = r#"
            [[deny]]
            command = "rm"
            message = "use trash instead of rm"

            [[deny]]
            pattern = "^dd\\b"
        "#;
        let policy = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap();
        assert_eq!(
            policy.deny_rules[0],
            DenyRule::literal("rm").with_message("use trash instead of rm")
        );
        assert_eq!(policy.deny_rules[1], DenyRule::pattern(r"^dd\b").unwrap());
    }

    #[test]
    fn build_applies_default_message() {
        let toml = r#"default_message = "blocked in CI""#;
        let policy = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap();
        assert_eq!(policy.default_message, "blocked in CI");
    }

    #[test]
    fn build_rejects_conflicting_allow_entry() {
        let toml = r#"
            allow = [{ command = "git", subcommands = ["status"], deny_subcommands = ["push"] }]
        "#;
        let err = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap_err();
        assert!(matches!(err, ConfigError::Rule(_)));
        assert!(err.to_string().contains("git"));
    }

    #[test]
    fn build_rejects_conflicting_deny_entry() {
        let toml = r#"
            [[deny]]
            command = "rm"
            pattern = "rm"
        "#;
        let err = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap_err();
        assert!(matches!(err, ConfigError::Rule(_)));
    }

    #[test]
    fn build_rejects_empty_deny_entry() {
        let toml = r#"
            [[deny]]
            message = "no rule here"
        "#;
        let err = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap_err();
        assert!(matches!(err, ConfigError::Rule(_)));
    }

    #[test]
    fn build_rejects_invalid_pattern() {
        let toml = r#"
            [[deny]]
            pattern = "(unclosed"
        "#;
        let err = toml::from_str::<Config>(toml).unwrap().build_policy().unwrap_err();
        assert!(matches!(err, ConfigError::Pattern(_)));
    }

    #[test]
    fn baseline_allows_read_only_commands() {
        let policy = Config::baseline().build_policy().unwrap();
        assert!(validate("ls -la /tmp", &policy).is_valid);
        assert!(validate("cat notes.txt | grep done", &policy).is_valid);
        assert!(validate("git status", &policy).is_valid);
        assert!(!validate("git push origin main", &policy).is_valid);
    }

    #[test]
    fn baseline_denies_destructive_commands() {
        let policy = Config::baseline().build_policy().unwrap();
        let verdict = validate("rm -rf /tmp/data", &policy);
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("baseline"));
        assert!(!validate("sudo ls", &policy).is_valid);
        assert!(!validate("mkfs.ext4 /dev/sda1", &policy).is_valid);
    }

    #[test]
    fn load_reads_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, "allow = [\"ls\"]\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.allow, vec![AllowEntry::Name("ls".to_string())]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, "allow = [unclosed\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn config_path_under_config_dir() {
        let path = config_path();
        assert!(path.to_string_lossy().ends_with("cmdgate/policy.toml"));
    }

    #[test]
    fn resolve_log_path_custom() {
        let cfg = AuditConfig {
            log_path: Some("/custom/path/audit.jsonl".to_string()),
            ..Default::default()
        };
        assert_eq!(
            cfg.resolve_log_path(),
            PathBuf::from("/custom/path/audit.jsonl")
        );
    }

    #[test]
    fn resolve_log_path_default() {
        let cfg = AuditConfig::default();
        let path = cfg.resolve_log_path();
        assert!(path.to_string_lossy().ends_with("cmdgate/audit.jsonl"));
    }
}

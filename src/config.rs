//! Process configuration.
//!
//! Read once at startup from the environment:
//! - `IMAGE_POLICY_RULES_PATH` - JSON rules file (built-in blacklist when unset)
//! - `WEBHOOK_CERT_PATH` / `WEBHOOK_KEY_PATH` - PEM certificate and key
//! - `WEBHOOK_PORT` - TLS review listener
//! - `HEALTH_PORT` - plain-HTTP probe and metrics listener
//!
//! Any error here is fatal. The webhook never serves with a partial policy.
//!
//! Rules file format:
//!
//! ```json
//! { "rules": [
//!     { "type": "substring", "token": "nginx:1.19" },
//!     { "type": "version_range", "repository": "nginx", "range": "<1.20",
//!       "id": "old-nginx", "description": "upgrade to 1.20 or later" }
//! ] }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::webhooks::policies::{
    ExactRule, PatternRule, PrefixRule, Rule, RuleSet, SubstringRule, UnpinnedRule,
    VersionRangeRule,
};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook-certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook-certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8080;
/// Default health server port
pub const HEALTH_PORT: u16 = 8081;

const RULES_PATH_ENV: &str = "IMAGE_POLICY_RULES_PATH";
const CERT_PATH_ENV: &str = "WEBHOOK_CERT_PATH";
const KEY_PATH_ENV: &str = "WEBHOOK_KEY_PATH";
const WEBHOOK_PORT_ENV: &str = "WEBHOOK_PORT";
const HEALTH_PORT_ENV: &str = "HEALTH_PORT";

/// Errors that prevent the webhook from starting
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Rules file could not be read
    #[error("failed to read rules file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rules file is not valid JSON of the expected shape
    #[error("failed to decode rules file {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Rules file decoded to zero rules
    #[error("rule set is empty; refusing to start without a policy")]
    EmptyRuleSet,

    /// A rule definition is invalid
    #[error("rule #{index}: {message}")]
    InvalidRule { index: usize, message: String },

    /// Two rules share an identifier, making denial reasons ambiguous
    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),

    /// An environment variable holds an unusable value
    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

/// Top-level shape of the rules file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    pub rules: Vec<RuleSpec>,
}

/// One rule definition: the matcher plus optional id and description
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Matcher variants, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Substring { token: String },
    Exact { image: String },
    Prefix { prefix: String },
    Regex { pattern: String },
    VersionRange { repository: String, range: String },
    Unpinned {
        #[serde(default)]
        repository: Option<String>,
    },
}

impl RuleSpec {
    /// Build the rule, rejecting blank operands and invalid expressions
    fn build(&self, index: usize) -> Result<Rule, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidRule { index, message };
        let non_blank = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(invalid(format!("'{}' must not be blank", field)))
            } else {
                Ok(())
            }
        };

        let mut rule = match &self.kind {
            RuleKind::Substring { token } => {
                non_blank("token", token)?;
                Rule::new(SubstringRule::new(token.as_str()))
            }
            RuleKind::Exact { image } => {
                non_blank("image", image)?;
                Rule::new(ExactRule::new(image.as_str()))
            }
            RuleKind::Prefix { prefix } => {
                non_blank("prefix", prefix)?;
                Rule::new(PrefixRule::new(prefix.as_str()))
            }
            RuleKind::Regex { pattern } => {
                non_blank("pattern", pattern)?;
                let matcher = PatternRule::new(pattern)
                    .map_err(|e| invalid(format!("invalid pattern '{}': {}", pattern, e)))?;
                Rule::new(matcher)
            }
            RuleKind::VersionRange { repository, range } => {
                non_blank("repository", repository)?;
                let matcher = VersionRangeRule::new(repository, range)
                    .map_err(|e| invalid(format!("invalid version range '{}': {}", range, e)))?;
                Rule::new(matcher)
            }
            RuleKind::Unpinned { repository } => match repository {
                Some(repository) => {
                    non_blank("repository", repository)?;
                    Rule::new(UnpinnedRule::for_repository(repository.as_str()))
                }
                None => Rule::new(UnpinnedRule::any()),
            },
        };

        if let Some(id) = &self.id {
            non_blank("id", id)?;
            rule = rule.with_id(id.as_str());
        }
        if let Some(description) = &self.description {
            rule = rule.with_description(description.as_str());
        }
        Ok(rule)
    }
}

impl RulesFile {
    /// Read and decode a rules file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the immutable rule set, preserving file order
    pub fn into_rule_set(self) -> Result<RuleSet, ConfigError> {
        if self.rules.is_empty() {
            return Err(ConfigError::EmptyRuleSet);
        }

        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.build(index))
            .collect::<Result<Vec<_>, _>>()?;

        ensure_unique_ids(&rules)?;
        Ok(RuleSet::new(rules))
    }
}

fn ensure_unique_ids(rules: &[Rule]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id()) {
            return Err(ConfigError::DuplicateRuleId(rule.id().to_string()));
        }
    }
    Ok(())
}

/// Webhook process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Rules file; `None` selects the built-in blacklist
    pub rules_path: Option<PathBuf>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub webhook_port: u16,
    pub health_port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
        }
    }
}

impl WebhookConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`; unset or empty values take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            rules_path: get(RULES_PATH_ENV).map(PathBuf::from),
            cert_path: get(CERT_PATH_ENV).map_or(defaults.cert_path, PathBuf::from),
            key_path: get(KEY_PATH_ENV).map_or(defaults.key_path, PathBuf::from),
            webhook_port: parse_port(WEBHOOK_PORT_ENV, get(WEBHOOK_PORT_ENV))?
                .unwrap_or(defaults.webhook_port),
            health_port: parse_port(HEALTH_PORT_ENV, get(HEALTH_PORT_ENV))?
                .unwrap_or(defaults.health_port),
        })
    }

    /// Build the rule set this configuration selects
    pub fn load_rules(&self) -> Result<RuleSet, ConfigError> {
        match &self.rules_path {
            Some(path) => RulesFile::load(path)?.into_rule_set(),
            None => Ok(RuleSet::builtin()),
        }
    }
}

fn parse_port(name: &'static str, value: Option<String>) -> Result<Option<u16>, ConfigError> {
    value
        .map(|value| match value.trim().parse::<u16>() {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::InvalidEnv { name, value }),
        })
        .transpose()
}

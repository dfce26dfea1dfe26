//! Image blacklist policies and the evaluation engine.
//!
//! A [`RuleSet`] is an ordered list of [`Rule`]s, each wrapping an
//! [`ImageMatcher`]. Evaluation scans containers in request order and, for each
//! image, rules in rule-set order. The first match denies the review and stops
//! the scan.
//!
//! Rule variants:
//! - `substring`: image contains a forbidden token (baseline)
//! - `exact`: image equals a forbidden reference
//! - `prefix`: image starts with a forbidden registry or repository path
//! - `pattern`: image matches a regular expression
//! - `version_range`: repository tag falls inside a semver range
//! - `digest`: image is not pinned by digest

pub mod digest;
pub mod exact;
pub mod pattern;
pub mod prefix;
pub mod reference;
pub mod substring;
pub mod version_range;

use std::fmt;

use crate::review::ContainerSpec;

pub use digest::UnpinnedRule;
pub use exact::ExactRule;
pub use pattern::PatternRule;
pub use prefix::PrefixRule;
pub use reference::ImageReference;
pub use substring::SubstringRule;
pub use version_range::VersionRangeRule;

/// Images the webhook has always refused: releases with known vulnerabilities.
pub const BUILTIN_BLACKLIST: [&str; 3] = ["nginx:1.19", "nginx:1.18", "ubuntu:18.04"];

/// Description attached to the built-in blacklist rules
const BUILTIN_DESCRIPTION: &str = "contains known vulnerabilities, use a more recent version";

/// A predicate over image reference strings.
///
/// Implementations must be pure: the same image always yields the same answer.
pub trait ImageMatcher: fmt::Debug + Send + Sync {
    /// Identifier cited in denial reasons
    fn id(&self) -> &str;

    /// Whether `image` is forbidden by this matcher
    fn matches(&self, image: &str) -> bool;
}

/// A configured blacklist rule: a matcher plus optional id override and description.
#[derive(Debug)]
pub struct Rule {
    matcher: Box<dyn ImageMatcher>,
    id: Option<String>,
    description: Option<String>,
}

impl Rule {
    pub fn new(matcher: impl ImageMatcher + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
            id: None,
            description: None,
        }
    }

    /// Override the matcher's default identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_else(|| self.matcher.id())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn matches(&self, image: &str) -> bool {
        self.matcher.matches(image)
    }
}

/// Immutable, ordered collection of rules built once at startup.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Substring rules for each token, in order
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            tokens
                .into_iter()
                .map(|token| Rule::new(SubstringRule::new(token)))
                .collect(),
        )
    }

    /// The default blacklist used when no rules file is configured
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_BLACKLIST
                .iter()
                .map(|token| {
                    Rule::new(SubstringRule::new(*token)).with_description(BUILTIN_DESCRIPTION)
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// First rule (in rule-set order) forbidding `image`
    pub fn first_match(&self, image: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(image))
    }
}

/// Details of the first rule violation found in a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The offending image, exactly as submitted
    pub image: String,
    /// Identifier of the violated rule
    pub rule_id: String,
    /// Human-readable reason returned to the API server
    pub reason: String,
}

impl Violation {
    pub fn new(image: &str, rule_id: &str, description: Option<&str>) -> Self {
        let mut reason = format!("SECURITY: Image {} is forbidden by rule '{}'", image, rule_id);
        if let Some(description) = description {
            reason.push_str(": ");
            reason.push_str(description);
        }
        Self {
            image: image.to_string(),
            rule_id: rule_id.to_string(),
            reason,
        }
    }

    fn from_rule(image: &str, rule: &Rule) -> Self {
        Self::new(image, rule.id(), rule.description())
    }
}

/// Outcome of evaluating a review. A reason exists only for denials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(Violation),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        self.violation().map(|v| v.reason.as_str())
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied(violation) => Some(violation),
        }
    }
}

/// Evaluate containers against the rule set.
///
/// Container-major, rule-minor scan; the first match wins and ends the scan.
/// Total over all inputs: empty or malformed images simply match nothing.
pub fn evaluate(containers: &[ContainerSpec], rules: &RuleSet) -> Verdict {
    containers
        .iter()
        .find_map(|container| {
            rules
                .first_match(&container.image)
                .map(|rule| Violation::from_rule(&container.image, rule))
        })
        .map_or(Verdict::Allowed, Verdict::Denied)
}

//! Cleanup and organization rules.
//!
//! Rules arrive as serde/builder `*Spec` values and are compiled into their
//! runtime form once. Compilation is where every shape error is caught: a
//! compiled rule is always usable.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::condition::Condition;
use crate::config::PathMatcher;
use crate::error::TidyError;
use crate::record::FileRecord;
use crate::template::DestinationTemplate;

const DAY: u64 = 86_400;

/// What a cleanup rule does with a matching entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleAction {
    /// Remove the entry (recursively for directories).
    Delete,
    /// Move the entry into the rule's destination.
    Move,
}

/// Declarative form of a cleanup rule.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate", error = "TidyError"))]
pub struct CleanupRuleSpec {
    /// Unique rule name.
    pub name: String,
    /// Glob selecting entries.
    pub pattern: String,
    /// Action to take.
    pub action: RuleAction,
    /// Extra predicate on age, size and emptiness.
    #[builder(default)]
    #[serde(default)]
    pub condition: Condition,
    /// Target directory, required for `move`.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub destination: Option<String>,
}

impl CleanupRuleSpecBuilder {
    fn validate(&self) -> Result<(), TidyError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(pattern) = &self.pattern {
            PathMatcher::new(pattern)?;
        }
        if self.action == Some(RuleAction::Move)
            && !matches!(&self.destination, Some(Some(d)) if !d.is_empty())
        {
            return Err(TidyError::validation("Move action requires a destination"));
        }
        Ok(())
    }
}

impl CleanupRuleSpec {
    /// Create a new spec builder.
    pub fn builder() -> CleanupRuleSpecBuilder {
        CleanupRuleSpecBuilder::default()
    }

    /// The stock housekeeping rules: temp and cache files older than a day,
    /// log files older than a week.
    pub fn defaults() -> Vec<Self> {
        let delete_older = |name: &str, pattern: &str, age: u64| Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            action: RuleAction::Delete,
            condition: Condition::older_than(age),
            destination: None,
        };
        vec![
            delete_older("clean_temp_files", "*.tmp", DAY),
            delete_older("clean_cache_files", "*.cache", DAY),
            delete_older("clean_log_files", "*.log", 7 * DAY),
        ]
    }
}

fn check_name(name: &str) -> Result<(), TidyError> {
    if name.trim().is_empty() {
        return Err(TidyError::validation("Rule name cannot be empty"));
    }
    Ok(())
}

/// A compiled, immutable cleanup rule.
#[derive(Debug, Clone)]
pub struct CleanupRule {
    name: String,
    matcher: PathMatcher,
    action: RuleAction,
    condition: Condition,
    destination: Option<PathBuf>,
}

impl CleanupRule {
    /// Compile a spec.
    pub fn new(spec: CleanupRuleSpec) -> Result<Self, TidyError> {
        check_name(&spec.name)?;
        let matcher = PathMatcher::new(&spec.pattern)?;
        let destination = match (spec.action, spec.destination) {
            (RuleAction::Move, Some(dest)) if !dest.is_empty() => Some(PathBuf::from(dest)),
            (RuleAction::Move, _) => {
                return Err(TidyError::validation(format!(
                    "Rule '{}': move action requires a destination",
                    spec.name
                )));
            }
            (RuleAction::Delete, dest) => dest.filter(|d| !d.is_empty()).map(PathBuf::from),
        };

        Ok(Self {
            name: spec.name,
            matcher,
            action: spec.action,
            condition: spec.condition,
            destination,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Destination as written; may be relative.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Destination resolved against the directory the rule runs on.
    pub fn resolved_destination(&self, target_dir: &Path) -> Option<PathBuf> {
        self.destination.as_ref().map(|d| {
            if d.is_absolute() {
                d.clone()
            } else {
                target_dir.join(d)
            }
        })
    }

    /// Glob and condition both hold for `record`.
    pub fn matches(&self, record: &FileRecord, root: &Path, now: SystemTime) -> bool {
        self.matcher.is_match(&record.path, root) && self.condition.matches(record, now)
    }
}

impl TryFrom<CleanupRuleSpec> for CleanupRule {
    type Error = TidyError;

    fn try_from(spec: CleanupRuleSpec) -> Result<Self, Self::Error> {
        Self::new(spec)
    }
}

/// Declarative form of an organization rule.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate", error = "TidyError"))]
pub struct OrganizationRuleSpec {
    /// Unique rule name.
    pub name: String,
    /// Glob selecting files.
    pub pattern: String,
    /// Destination directory template.
    pub destination: String,
    #[builder(default)]
    #[serde(default)]
    pub condition: Condition,
}

impl OrganizationRuleSpecBuilder {
    fn validate(&self) -> Result<(), TidyError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(pattern) = &self.pattern {
            PathMatcher::new(pattern)?;
        }
        if let Some(destination) = &self.destination {
            DestinationTemplate::parse(destination)?;
        }
        Ok(())
    }
}

impl OrganizationRuleSpec {
    pub fn builder() -> OrganizationRuleSpecBuilder {
        OrganizationRuleSpecBuilder::default()
    }
}

/// A compiled organization rule with its parsed destination template.
#[derive(Debug, Clone)]
pub struct OrganizationRule {
    name: String,
    matcher: PathMatcher,
    template: DestinationTemplate,
    condition: Condition,
}

impl OrganizationRule {
    /// Compile a spec.
    pub fn new(spec: OrganizationRuleSpec) -> Result<Self, TidyError> {
        check_name(&spec.name)?;
        Ok(Self {
            matcher: PathMatcher::new(&spec.pattern)?,
            template: DestinationTemplate::parse(&spec.destination)?,
            name: spec.name,
            condition: spec.condition,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn template(&self) -> &DestinationTemplate {
        &self.template
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn matches(&self, record: &FileRecord, root: &Path, now: SystemTime) -> bool {
        self.matcher.is_match(&record.path, root) && self.condition.matches(record, now)
    }
}

impl TryFrom<OrganizationRuleSpec> for OrganizationRule {
    type Error = TidyError;

    fn try_from(spec: OrganizationRuleSpec) -> Result<Self, Self::Error> {
        Self::new(spec)
    }
}

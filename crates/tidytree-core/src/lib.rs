//! Core types for tidytree.
//!
//! This crate holds the data model shared by the scanner, the duplicate
//! analysis and the rule engines: file records, rules and their conditions,
//! destination templates, batch reports and the settings file.

mod condition;
mod config;
mod error;
mod policy;
mod record;
mod report;
mod rule;
mod settings;
mod template;

pub use condition::Condition;
pub use config::{PathMatcher, ScanConfig, ScanConfigBuilder, compile_glob};
pub use error::{ScanWarning, TidyError, WarningKind};
pub use policy::KeepPolicy;
pub use record::{FileRecord, Fingerprint};
pub use report::{ActionKind, ActionRecord, BatchReport, OperationError, Summary};
pub use rule::{
    CleanupRule, CleanupRuleSpec, CleanupRuleSpecBuilder, OrganizationRule, OrganizationRuleSpec,
    OrganizationRuleSpecBuilder, RuleAction,
};
pub use settings::{FALLBACK_CATEGORY, Settings, category_for, size_bucket_for};
pub use template::{DestinationTemplate, Slot, TemplateContext};

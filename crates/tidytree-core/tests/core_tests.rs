use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tidytree_core::{
    CleanupRule, CleanupRuleSpec, Condition, DestinationTemplate, FileRecord, OrganizationRule,
    OrganizationRuleSpec, RuleAction, ScanConfig, Settings, TemplateContext, TidyError,
};

#[test]
fn test_scan_config_builder_defaults() {
    let config = ScanConfig::builder().root("/data").build().unwrap();

    assert_eq!(config.root, PathBuf::from("/data"));
    assert!(config.pattern.is_none());
    assert!(!config.include_dirs);
    assert!(config.include_hidden);
    assert!(config.max_depth.is_none());
    assert!(config.ignore_patterns.is_empty());
}

#[test]
fn test_scan_config_empty_root() {
    let err = ScanConfig::builder().root("").build().unwrap_err();
    assert!(matches!(err, TidyError::Validation { .. }));
}

#[test]
fn test_temp_rule_matches_only_old_files() {
    let spec = CleanupRuleSpec::builder()
        .name("clean_temp_files")
        .pattern("*.tmp")
        .action(RuleAction::Delete)
        .condition(Condition::older_than(86_400))
        .build()
        .unwrap();
    let rule = CleanupRule::new(spec).unwrap();

    let now = SystemTime::now();
    let root = Path::new("/work");
    let old = FileRecord::file("/work/old.tmp", 3, now - Duration::from_secs(2 * 86_400));
    let new = FileRecord::file("/work/new.tmp", 3, now - Duration::from_secs(3600));
    let other = FileRecord::file("/work/old.txt", 3, now - Duration::from_secs(2 * 86_400));

    assert!(rule.matches(&old, root, now));
    assert!(!rule.matches(&new, root, now));
    assert!(!rule.matches(&other, root, now));
}

#[test]
fn test_rule_spec_from_toml() {
    let spec: CleanupRuleSpec = toml_rule(
        r#"
        name = "empty_dirs"
        pattern = "*"
        action = "delete"
        condition = { empty = true }
        "#,
    );
    let rule = CleanupRule::try_from(spec).unwrap();
    assert!(rule.condition().empty);
    assert_eq!(rule.pattern(), "*");
    assert!(rule.destination().is_none());
}

fn toml_rule(text: &str) -> CleanupRuleSpec {
    let settings = Settings::from_toml(&format!("[[cleanup_rules]]\n{text}")).unwrap();
    settings.cleanup_rules.into_iter().next().unwrap()
}

#[test]
fn test_organization_rule_expands_template() {
    let spec = OrganizationRuleSpec::builder()
        .name("pdfs")
        .pattern("*.pdf")
        .destination("docs/{ext}/{year}")
        .build()
        .unwrap();
    let rule = OrganizationRule::new(spec).unwrap();

    let path = Path::new("/in/report.pdf");
    let ctx = TemplateContext::for_file(path, SystemTime::now());
    let dest = rule.template().expand(&ctx, Path::new("/in"));

    let year = dest.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(year.len(), 4);
    assert!(dest.starts_with("/in/docs/pdf"));
}

#[test]
fn test_template_slots_are_closed() {
    for template in ["{name}", "{ext}", "{parent}", "{year}", "{month}", "{day}"] {
        assert!(DestinationTemplate::parse(template).is_ok(), "{template}");
    }
    for template in ["{Name}", "{size}", "{}", "{year"] {
        assert!(DestinationTemplate::parse(template).is_err(), "{template}");
    }
}

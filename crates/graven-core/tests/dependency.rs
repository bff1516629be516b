use graven_core::coordinate::LogicalId;
use graven_core::dependency::{Dependency, Exclusion, VersionConstraint};
use graven_core::scope::Scope;
use graven_core::version::MavenVersion;

#[test]
fn parse_soft_constraint() {
    let dep = Dependency::parse("org.example:lib:1.5").unwrap();
    assert!(!dep.constraint.is_hard());
    assert_eq!(dep.constraint.soft_version().unwrap().as_str(), "1.5");
    assert_eq!(dep.scope, Scope::Compile);
}

#[test]
fn parse_range_constraint() {
    let dep = Dependency::parse("org.example:lib:[1.0,2.0)").unwrap();
    assert!(dep.constraint.is_hard());
    assert!(dep.constraint.allows(&MavenVersion::parse("1.9")));
    assert!(!dep.constraint.allows(&MavenVersion::parse("2.0")));
    assert_eq!(dep.constraint.to_string(), "[1.0,2.0)");
}

#[test]
fn parse_latest_constraint() {
    let dep = Dependency::parse("org.example:lib:LATEST").unwrap();
    assert_eq!(dep.constraint, VersionConstraint::Latest);
    assert_eq!(dep.constraint.to_query().to_string(), "(,)");
}

#[test]
fn parse_malformed_range_is_error() {
    let err = Dependency::parse("org.example:lib:[1.0,2.0").unwrap_err();
    assert!(err.to_string().contains("org.example:lib:[1.0,2.0"), "got: {err}");
}

#[test]
fn parse_rejects_wrong_segment_count() {
    assert!(Dependency::parse("lib:1.0").is_err());
}

#[test]
fn constraints_compare_by_text() {
    assert_eq!(
        VersionConstraint::parse("[1.0,2.0)").unwrap(),
        VersionConstraint::parse("[1.0, 2.0)").unwrap()
    );
    assert_ne!(
        VersionConstraint::parse("1.0").unwrap(),
        VersionConstraint::parse("[1.0]").unwrap()
    );
}

#[test]
fn exclusion_wildcards() {
    let id = LogicalId::new("commons-logging", "commons-logging");
    assert!(Exclusion::new("commons-logging", "commons-logging").matches(&id));
    assert!(Exclusion::group("commons-logging").matches(&id));
    assert!(Exclusion::new("*", "*").matches(&id));
    assert!(Exclusion::new("commons-logging", "*").matches(&id));
    assert!(!Exclusion::new("org.slf4j", "*").matches(&id));
}

#[test]
fn system_dependencies_lack_descriptors() {
    let dep = Dependency::parse("com.sun:tools:1.8").unwrap();
    assert!(!dep.lacks_descriptor());
    assert!(dep.clone().with_scope(Scope::System).lacks_descriptor());
}

#[test]
fn relocation_keeps_edge_metadata() {
    let dep = Dependency::parse("old:lib:1.0")
        .unwrap()
        .with_scope(Scope::Runtime)
        .with_exclusion(Exclusion::group("x"));
    let target = graven_core::coordinate::Coordinate::new("new", "lib", "1.0");
    let moved = dep.relocated_to(&target);
    assert_eq!(moved.group, "new");
    assert_eq!(moved.scope, Scope::Runtime);
    assert_eq!(moved.exclusions.len(), 1);
}

#[test]
fn managed_dependency_parses_version_only() {
    use graven_core::dependency::ManagedDependency;

    let managed = ManagedDependency::parse("org.example:lib:2.0").unwrap();
    assert_eq!(managed.id, LogicalId::new("org.example", "lib"));
    assert_eq!(managed.constraint.unwrap().to_string(), "2.0");
    assert_eq!(managed.scope, None);
}

#[test]
fn validate_rejects_separator_in_name() {
    let dep = Dependency::new("org.example", "bad name", VersionConstraint::Latest);
    assert!(dep.validate().unwrap_err().contains("name"));
    assert!(Dependency::parse("org.example:lib:1.0").unwrap().validate().is_ok());
}

#[test]
fn system_dependencies_need_an_exact_version() {
    let ranged = Dependency::parse("g:tools:[1.0,2.0)").unwrap().with_scope(Scope::System);
    let reason = ranged.validate().unwrap_err();
    assert!(reason.contains("[1.0,2.0)"), "got: {reason}");
    let pinned = Dependency::parse("g:tools:1.8").unwrap().with_scope(Scope::System);
    assert!(pinned.validate().is_ok());
}

use graven_core::coordinate::{Coordinate, LogicalId};

#[test]
fn coordinate_parse_three_parts() {
    let coord = Coordinate::parse("com.example:my-lib:1.0.0").unwrap();
    assert_eq!(coord.group, "com.example");
    assert_eq!(coord.name, "my-lib");
    assert_eq!(coord.classifier, None);
    assert_eq!(coord.version, "1.0.0");
}

#[test]
fn coordinate_parse_with_classifier() {
    let coord = Coordinate::parse("com.example:my-lib:jdk8:1.0.0").unwrap();
    assert_eq!(coord.classifier.as_deref(), Some("jdk8"));
    assert_eq!(coord.to_string(), "com.example:my-lib:jdk8:1.0.0");
}

#[test]
fn coordinate_parse_two_parts_is_error() {
    let err = Coordinate::parse("group:artifact").unwrap_err();
    assert!(err.to_string().contains("expected 3 or 4 segments"), "got: {err}");
}

#[test]
fn coordinate_parse_empty_segment_is_error() {
    assert!(Coordinate::parse("group::1.0").is_err());
    assert!(Coordinate::parse("").is_err());
}

#[test]
fn coordinate_display_roundtrip() {
    let s = "com.example:my-lib:1.0.0";
    assert_eq!(Coordinate::parse(s).unwrap().to_string(), s);
}

#[test]
fn logical_id_ignores_version() {
    let a = Coordinate::new("org.a", "lib", "1.0");
    let b = Coordinate::new("org.a", "lib", "2.0");
    assert_ne!(a, b);
    assert_eq!(a.logical_id(), b.logical_id());
    assert_eq!(a.logical_id(), LogicalId::new("org.a", "lib"));
    assert_eq!(a.logical_id().to_string(), "org.a:lib");
}

#[test]
fn classifier_is_part_of_logical_id() {
    let plain = Coordinate::new("org.a", "lib", "1.0");
    let classified = plain.clone().with_classifier("sources");
    assert_ne!(plain.logical_id(), classified.logical_id());
}

#[test]
fn ordering_uses_all_fields() {
    let mut coords = vec![
        Coordinate::new("org.b", "lib", "1.0"),
        Coordinate::new("org.a", "lib", "2.0"),
        Coordinate::new("org.a", "lib", "1.0"),
    ];
    coords.sort();
    assert_eq!(coords[0].to_string(), "org.a:lib:1.0");
    assert_eq!(coords[2].group, "org.b");
}

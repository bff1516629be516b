//! Every (parent, child) pair of the scope derivation table.

use graven_core::scope::{derive, Scope};
use Scope::*;

#[test]
fn parent_absent_keeps_child() {
    assert_eq!(derive(None, Compile), Compile);
    assert_eq!(derive(None, Runtime), Runtime);
    assert_eq!(derive(None, Test), Test);
    assert_eq!(derive(None, Provided), Provided);
    assert_eq!(derive(None, System), System);
    assert_eq!(derive(None, Annotation), Annotation);
}

#[test]
fn parent_compile() {
    assert_eq!(derive(Some(Compile), Compile), Compile);
    assert_eq!(derive(Some(Compile), Runtime), Runtime);
    assert_eq!(derive(Some(Compile), Test), Test);
    assert_eq!(derive(Some(Compile), Provided), Provided);
    assert_eq!(derive(Some(Compile), System), System);
    assert_eq!(derive(Some(Compile), Annotation), Annotation);
}

#[test]
fn parent_runtime() {
    assert_eq!(derive(Some(Runtime), Compile), Runtime);
    assert_eq!(derive(Some(Runtime), Runtime), Runtime);
    assert_eq!(derive(Some(Runtime), Test), Test);
    assert_eq!(derive(Some(Runtime), Provided), Runtime);
    assert_eq!(derive(Some(Runtime), System), System);
    assert_eq!(derive(Some(Runtime), Annotation), Runtime);
}

#[test]
fn parent_test() {
    assert_eq!(derive(Some(Test), Compile), Test);
    assert_eq!(derive(Some(Test), Runtime), Test);
    assert_eq!(derive(Some(Test), Test), Test);
    assert_eq!(derive(Some(Test), Provided), Test);
    assert_eq!(derive(Some(Test), System), System);
    assert_eq!(derive(Some(Test), Annotation), Test);
}

#[test]
fn parent_provided() {
    assert_eq!(derive(Some(Provided), Compile), Provided);
    assert_eq!(derive(Some(Provided), Runtime), Provided);
    assert_eq!(derive(Some(Provided), Test), Test);
    assert_eq!(derive(Some(Provided), Provided), Provided);
    assert_eq!(derive(Some(Provided), System), System);
    assert_eq!(derive(Some(Provided), Annotation), Provided);
}

#[test]
fn parent_system() {
    assert_eq!(derive(Some(System), Compile), Provided);
    assert_eq!(derive(Some(System), Runtime), Provided);
    assert_eq!(derive(Some(System), Test), Test);
    assert_eq!(derive(Some(System), Provided), Provided);
    assert_eq!(derive(Some(System), System), System);
    assert_eq!(derive(Some(System), Annotation), Provided);
}

#[test]
fn parent_annotation() {
    assert_eq!(derive(Some(Annotation), Compile), Annotation);
    assert_eq!(derive(Some(Annotation), Runtime), Annotation);
    assert_eq!(derive(Some(Annotation), Test), Test);
    assert_eq!(derive(Some(Annotation), Provided), Annotation);
    assert_eq!(derive(Some(Annotation), System), System);
    assert_eq!(derive(Some(Annotation), Annotation), Annotation);
}

#[test]
fn acceptance_table() {
    let expected: [(Scope, &[&str]); 6] = [
        (Compile, &["compile", "provided", "system"]),
        (Runtime, &["runtime", "compile"]),
        (Test, &["test"]),
        (Provided, &["provided"]),
        (System, &["system"]),
        (Annotation, &["annotation"]),
    ];
    for (filter, accepted) in expected {
        for candidate in Scope::ALL {
            assert_eq!(
                filter.accepts(Some(candidate.id())),
                accepted.contains(&candidate.id()),
                "{filter} accepting {candidate}"
            );
        }
    }
}

//! Tests for the definition language parser and variable tree

use super::*;
use serde_json::json;

#[test]
fn test_scalar_passthrough() {
    let var = parse_variable(&json!(42)).unwrap();
    assert_eq!(var, Variable::Scalar(json!(42)));

    let var = parse_variable(&json!("bert-base")).unwrap();
    assert_eq!(var.as_scalar(), Some(&json!("bert-base")));
}

#[test]
fn test_undetermined_sentinel() {
    let var = parse_variable(&json!("UNDETERMINED")).unwrap();
    assert_eq!(var, Variable::Undetermined);

    // Only the exact sentinel spelling is reserved.
    let var = parse_variable(&json!("undetermined")).unwrap();
    assert!(matches!(var, Variable::Scalar(_)));
}

#[test]
fn test_plain_mapping_becomes_definition() {
    let var = parse_variable(&json!({"model_path": "m.bin", "epochs": 3})).unwrap();
    let def = var.as_definition().unwrap();
    assert_eq!(def.len(), 2);
    assert_eq!(def.get("epochs").unwrap().as_scalar(), Some(&json!(3)));
}

#[test]
fn test_type_tag_any_casing() {
    for tag in ["objectType", "objecttype", "OBJECTTYPE", "ObjectType"] {
        let var = parse_variable(&json!({tag: "vsm", "min_score": 0.5})).unwrap();
        match var {
            Variable::Typed(typed) => {
                assert_eq!(typed.object_type, "vsm");
                assert!(typed.body.contains_key("min_score"));
                assert!(!typed.body.contains_key(tag));
            }
            other => panic!("expected typed variable, got {other:?}"),
        }
    }
}

#[test]
fn test_invalid_type_tag() {
    let err = parse_variable(&json!({"objectType": 7})).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTypeTag(_)));

    let err = parse_variable(&json!({"objectType": ""})).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTypeTag(_)));
}

#[test]
fn test_expect_typed_rejects_plain_definition() {
    let var = parse_variable(&json!({"size": 4})).unwrap();
    let err = var.expect_typed().unwrap_err();
    assert!(matches!(err, ConfigError::MissingTypeTag));
}

#[test]
fn test_multi_marker() {
    let var = parse_variable(&json!({"*": [0.1, 0.01, 0.001]})).unwrap();
    match var {
        Variable::Multi(multi) => {
            assert_eq!(multi.len(), 3);
            assert_eq!(multi.alternatives()[1].as_scalar(), Some(&json!(0.01)));
        }
        other => panic!("expected multi variable, got {other:?}"),
    }
}

#[test]
fn test_empty_multi_is_config_error() {
    let err = parse_variable(&json!({"*": []})).unwrap_err();
    assert!(matches!(err, ConfigError::EmptyMulti));

    let err = parse_variable(&json!({"*": "not-an-array"})).unwrap_err();
    assert!(matches!(err, ConfigError::EmptyMulti));
}

#[test]
fn test_stray_multi_marker() {
    let err = parse_variable(&json!({"*": [1, 2], "other": 3})).unwrap_err();
    assert!(matches!(err, ConfigError::StrayMultiMarker));
}

#[test]
fn test_case_insensitive_lookup() {
    let def = parse_definition(&json!({"Model_Path": "m.bin"})).unwrap();
    let expected = def.get("Model_Path").cloned();
    assert!(expected.is_some());
    assert_eq!(def.get("model_path").cloned(), expected);
    assert_eq!(def.get("MODEL_PATH").cloned(), expected);
}

#[test]
fn test_duplicate_keys_differing_in_case() {
    let err = parse_definition(&json!({"Size": 1, "size": 2})).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateKey(_)));
}

#[test]
fn test_non_mapping_root() {
    let err = parse_definition(&json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, ConfigError::NonMappingRoot(_)));

    let err = parse_definition(&json!({"*": [1, 2]})).unwrap_err();
    assert!(matches!(err, ConfigError::NonMappingRoot(_)));
}

#[test]
fn test_contains_multi_at_depth() {
    let def = parse_definition(&json!({
        "trainer": {
            "objectType": "vsm",
            "min_score": {"*": [0.0, 0.5]},
        }
    }))
    .unwrap();
    assert!(def.contains_multi());

    let flat = parse_definition(&json!({"trainer": {"objectType": "vsm"}})).unwrap();
    assert!(!flat.contains_multi());
}

#[test]
fn test_set_replaces_case_insensitively() {
    let mut def = DefinitionVariable::new();
    def.insert("Model_Path", Variable::scalar("a")).unwrap();
    def.set("model_path", Variable::scalar("b"));
    assert_eq!(def.len(), 1);
    assert_eq!(def.get("MODEL_PATH").unwrap().as_scalar(), Some(&json!("b")));
}

#[test]
fn test_fill_undetermined_by_key() {
    let mut def = parse_definition(&json!({
        "target": "UNDETERMINED",
        "nested": {"Model_Path": "UNDETERMINED"},
        "fixed": 1,
    }))
    .unwrap();

    let mut feedback = std::collections::HashMap::new();
    feedback.insert("TARGET".to_string(), json!("runs/v0"));
    feedback.insert("model_path".to_string(), json!("runs/v0/model.json"));
    def.fill_undetermined(&feedback);

    assert_eq!(def.get("target").unwrap().as_scalar(), Some(&json!("runs/v0")));
    let nested = def.get("nested").unwrap().as_definition().unwrap();
    assert_eq!(
        nested.get("model_path").unwrap().as_scalar(),
        Some(&json!("runs/v0/model.json"))
    );
    assert_eq!(def.get("fixed").unwrap().as_scalar(), Some(&json!(1)));
}

#[test]
fn test_fill_undetermined_without_feedback_is_left_in_place() {
    let mut def = parse_definition(&json!({"target": "UNDETERMINED"})).unwrap();
    def.fill_undetermined(&std::collections::HashMap::new());
    assert_eq!(def.get("target"), Some(&Variable::Undetermined));
}

#[test]
fn test_to_json_round_trip() {
    let raw = json!({
        "objectType": "vsm",
        "min_score": {"*": [0.0, 0.5]},
        "checkpoint": "UNDETERMINED",
        "layers": ["q", "v"],
    });
    let var = parse_variable(&raw).unwrap();
    let back = var.to_json();
    assert_eq!(parse_variable(&back).unwrap(), var);
}

//! Preprocessor properties and scenarios (spec §4.4, §8.1 item 11, §8.2 S8).

use indexmap::IndexMap;
use sparkwheel::Tree;
use sparkwheel::preprocessor::preprocess;

fn map(pairs: Vec<(&str, Tree)>) -> Tree {
    Tree::Map(IndexMap::from_iter(pairs.into_iter().map(|(k, v)| (k.to_string(), v))))
}

#[test]
fn relative_refs_rewrite_to_absolute_everywhere_in_the_tree() {
    let t = map(vec![(
        "parent",
        map(vec![(
            "child",
            map(vec![("sib", Tree::Int(1)), ("ref", Tree::String("@::sib".to_string()))]),
        )]),
    )]);
    let out = preprocess(&t, None).unwrap();
    assert_eq!(
        out.get_path("parent::child::ref"),
        Some(&Tree::String("@parent::child::sib".to_string()))
    );
}

#[test]
fn scenario_s8_macro_expansion_is_independent_of_its_source() {
    let mut t = map(vec![("t", map(vec![("a", Tree::Int(1))])), ("c", Tree::String("%t".to_string()))]);
    let out = preprocess(&t, None).unwrap();
    t.set_path("t::a", Tree::Int(99)).unwrap();
    assert_eq!(out.get_path("c::a"), Some(&Tree::Int(1)));
    assert_eq!(t.get_path("t::a"), Some(&Tree::Int(99)));
}

#[test]
fn same_file_macro_with_path_inlines_a_subtree() {
    let t = map(vec![
        ("common", map(vec![("lr", Tree::Float(0.001)), ("h", Tree::Int(512))])),
        ("model", Tree::String("%common".to_string())),
    ]);
    let out = preprocess(&t, None).unwrap();
    assert_eq!(out.get_path("model::lr"), Some(&Tree::Float(0.001)));
    assert_eq!(out.get_path("model::h"), Some(&Tree::Int(512)));
}

#[test]
fn direct_macro_self_cycle_is_a_circular_macro_error() {
    let t = map(vec![("a", Tree::String("%a".to_string()))]);
    let err = preprocess(&t, None).unwrap_err();
    assert!(matches!(err.kind, sparkwheel::ErrorKind::CircularMacro { .. }));
}

#[test]
fn indirect_macro_cycle_between_two_keys_is_detected() {
    let t = map(vec![("a", Tree::String("%b".to_string())), ("b", Tree::String("%a".to_string()))]);
    let err = preprocess(&t, None).unwrap_err();
    assert!(matches!(err.kind, sparkwheel::ErrorKind::CircularMacro { .. }));
}

#[test]
fn relative_prefix_deeper_than_current_depth_errors() {
    let t = map(vec![("a", Tree::String("@::::too_far".to_string()))]);
    assert!(preprocess(&t, None).is_err());
}

#[test]
fn macro_targeting_meta_without_a_path_is_rejected() {
    let t = map(vec![
        ("_meta_", map(vec![("owner", Tree::String("team".to_string()))])),
        ("c", Tree::String("%_meta_".to_string())),
    ]);
    assert!(preprocess(&t, None).is_err());
}

#[test]
fn non_string_scalars_and_already_absolute_refs_pass_through_unchanged() {
    let t = map(vec![
        ("n", Tree::Int(5)),
        ("f", Tree::Float(1.5)),
        ("b", Tree::Bool(true)),
        ("u", Tree::Null),
        ("r", Tree::String("@n".to_string())),
    ]);
    let out = preprocess(&t, None).unwrap();
    assert_eq!(out, t);
}

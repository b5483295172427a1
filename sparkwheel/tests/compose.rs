//! Composer properties and scenarios (spec §8.1 items 3-7, §8.2 S4-S5).

use indexmap::IndexMap;
use rstest::rstest;
use sparkwheel::Tree;
use sparkwheel::composer::merge;

fn map(pairs: Vec<(&str, Tree)>) -> Tree {
    Tree::Map(IndexMap::from_iter(pairs.into_iter().map(|(k, v)| (k.to_string(), v))))
}

#[test]
fn compose_identity_both_sides() {
    let t = map(vec![("a", Tree::Int(1)), ("b", Tree::List(vec![Tree::Int(1)]))]);
    assert_eq!(merge(&t, &Tree::empty_map()).unwrap(), t);
    assert_eq!(merge(&Tree::empty_map(), &t).unwrap(), t);
}

#[test]
fn compose_is_pure_and_does_not_mutate_base() {
    let base = map(vec![("m", map(vec![("lr", Tree::Float(0.001))]))]);
    let base_before = base.clone();
    let override_ = map(vec![("m", map(vec![("h", Tree::Int(512))]))]);
    let first = merge(&base, &override_).unwrap();
    let second = merge(&base, &override_).unwrap();
    assert_eq!(base, base_before);
    assert_eq!(first, second);
}

#[rstest]
#[case(Tree::Null)]
#[case(Tree::String(String::new()))]
fn delete_is_idempotent_for_a_missing_key(#[case] remove_spec: Tree) {
    let base = Tree::empty_map();
    let override_ = map(vec![("~k", remove_spec)]);
    let once = merge(&base, &override_).unwrap();
    let twice = merge(&once, &override_).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once, Tree::empty_map());
}

#[test]
fn scenario_s4_default_compose_vs_replace() {
    let base = map(vec![("m", map(vec![("lr", Tree::Float(0.001)), ("h", Tree::Int(512))]))]);

    let composed = merge(&base, &map(vec![("m", map(vec![("dropout", Tree::Float(0.1))]))])).unwrap();
    assert_eq!(
        composed,
        map(vec![(
            "m",
            map(vec![
                ("lr", Tree::Float(0.001)),
                ("h", Tree::Int(512)),
                ("dropout", Tree::Float(0.1)),
            ])
        )])
    );

    let replaced = merge(&base, &map(vec![("=m", map(vec![("dropout", Tree::Float(0.1))]))])).unwrap();
    assert_eq!(replaced, map(vec![("m", map(vec![("dropout", Tree::Float(0.1))]))]));
}

#[test]
fn scenario_s5_batch_list_delete() {
    let base = map(vec![(
        "p",
        Tree::List(vec![
            Tree::String("a".into()),
            Tree::String("b".into()),
            Tree::String("c".into()),
            Tree::String("d".into()),
            Tree::String("e".into()),
        ]),
    )]);
    let override_ = map(vec![("~p", Tree::List(vec![Tree::Int(0), Tree::Int(2), Tree::Int(4)]))]);
    let got = merge(&base, &override_).unwrap();
    assert_eq!(
        got,
        map(vec![(
            "p",
            Tree::List(vec![Tree::String("b".into()), Tree::String("d".into())])
        )])
    );
}

#[rstest]
#[case(vec![Tree::Int(0), Tree::Int(0)], vec!["b", "c"])]
#[case(vec![Tree::Int(-1)], vec!["a", "b"])]
fn batch_delete_collapses_duplicates_and_accepts_negative_indices(
    #[case] drop: Vec<Tree>,
    #[case] expect: Vec<&str>,
) {
    let base = map(vec![(
        "p",
        Tree::List(vec![Tree::String("a".into()), Tree::String("b".into()), Tree::String("c".into())]),
    )]);
    let override_ = map(vec![("~p", Tree::List(drop))]);
    let got = merge(&base, &override_).unwrap();
    let expected = Tree::List(expect.into_iter().map(|s| Tree::String(s.to_string())).collect());
    assert_eq!(got.get_path("p"), Some(&expected));
}

#[test]
fn batch_delete_out_of_range_index_is_fatal() {
    let base = map(vec![("p", Tree::List(vec![Tree::Int(1)]))]);
    let override_ = map(vec![("~p", Tree::List(vec![Tree::Int(5)]))]);
    assert!(merge(&base, &override_).is_err());
}

#[test]
fn dict_batch_delete_requires_every_key_present() {
    let base = map(vec![("d", map(vec![("x", Tree::Int(1)), ("y", Tree::Int(2))]))]);
    let ok = merge(&base, &map(vec![("~d", Tree::List(vec![Tree::String("x".into())]))])).unwrap();
    assert_eq!(ok.get_path("d::x"), None);
    assert_eq!(ok.get_path("d::y"), Some(&Tree::Int(2)));

    let bad = merge(&base, &map(vec![("~d", Tree::List(vec![Tree::String("missing".into())]))]));
    assert!(bad.is_err());
}

#[test]
fn extend_semantics_list_concat_preserves_duplicates_and_order() {
    let base = map(vec![("xs", Tree::List(vec![Tree::Int(1), Tree::Int(2)]))]);
    let override_ = map(vec![("xs", Tree::List(vec![Tree::Int(2), Tree::Int(3)]))]);
    let got = merge(&base, &override_).unwrap();
    assert_eq!(
        got.get_path("xs"),
        Some(&Tree::List(vec![Tree::Int(1), Tree::Int(2), Tree::Int(2), Tree::Int(3)]))
    );
}

#[test]
fn legacy_plus_prefix_is_a_compose_alias() {
    let base = map(vec![("m", map(vec![("lr", Tree::Float(0.001))]))]);
    let via_plus = merge(&base, &map(vec![("+m", map(vec![("h", Tree::Int(512))]))])).unwrap();
    let via_plain = merge(&base, &map(vec![("m", map(vec![("h", Tree::Int(512))]))])).unwrap();
    assert_eq!(via_plus, via_plain);
}

#[test]
fn non_mapping_override_replaces_base_outright() {
    let base = map(vec![("a", Tree::Int(1))]);
    assert_eq!(merge(&base, &Tree::Int(9)).unwrap(), Tree::Int(9));
    assert_eq!(merge(&Tree::Int(9), &base).unwrap(), base);
}

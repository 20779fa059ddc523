//! Target extraction from excerpt payloads.

mod common;

use construe_core::{derive_targets, ExcerptError, PracticeMode, Role, UnmarkedPairing};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::fixtures;
use common::TestContext;

#[test]
fn test_malformed_constructions_degrade_gracefully() {
    let excerpt = fixtures::excerpt(json!([{
        "sid": "5.1",
        "tokens": fixtures::tokens(&["Caesar", "castra", "posuit", "ut", "hostes", "videret", "."]),
        "constructions": [
            { "type": "purpose_clause", "subtype": "ut_ne", "start": 3, "end": 5 },
            { "type": "ablative_thing", "start": 0, "end": 1 },
            { "type": "gerund" },
            { "type": "cum_clause", "start": 2, "end": 40 }
        ]
    }]));

    let (targets, skipped) = derive_targets(&excerpt.sentences[0], UnmarkedPairing::Permissive);
    assert_eq!(targets.len(), 1);
    assert_eq!(skipped.len(), 3);
    assert!(matches!(skipped[0].error, ExcerptError::UnknownType { ordinal: 1, .. }));
    assert!(matches!(skipped[1].error, ExcerptError::MissingSpan { ordinal: 2 }));
    assert!(matches!(skipped[2].error, ExcerptError::SpanOutOfRange { ordinal: 3, .. }));

    let mut ctx = TestContext::new(PracticeMode::Mixed);
    ctx.load(excerpt);
    assert_eq!(ctx.session.targets().len(), 1);
}

#[test]
fn test_duplicate_tags_yield_one_target() {
    let excerpt = fixtures::excerpt(json!([{
        "sid": "5.2",
        "tokens": fixtures::tokens(&["Ad", "eam", "rem", "gerendam", "venit", "."]),
        "constructions": [
            { "type": "gerundive", "start": 0, "end": 3 },
            { "type": "gerundive", "start": 0, "end": 3 }
        ]
    }]));

    let (targets, _) = derive_targets(&excerpt.sentences[0], UnmarkedPairing::Permissive);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].id, "5.2:gerundive:-:0-3#0");
}

#[test]
fn test_highlight_spans_become_bands() {
    let excerpt = fixtures::excerpt(json!([{
        "sid": "5.3",
        "tokens": fixtures::tokens(&["Tanta", "erat", "vis", "ut", "nemo", "resisteret", "."]),
        "constructions": [
            {
                "type": "result_clause", "subtype": "ut", "start": 0, "end": 5,
                "highlight_spans": [[0, 0], [3, 5]]
            }
        ]
    }]));

    let (targets, _) = derive_targets(&excerpt.sentences[0], UnmarkedPairing::Permissive);
    let bands: Vec<String> = targets[0].bands.iter().map(|b| b.to_string()).collect();
    assert_eq!(bands, vec!["0-0", "3-5"]);
}

#[test]
fn test_shared_apodosis_serves_two_protases() {
    let conditional = |protasis: Option<usize>, shared: Vec<usize>| {
        json!({
            "label": "present_general",
            "protasis": { "verb_index": protasis },
            "apodosis": { "verb_index": 8 },
            "protasis_verb_indexes": shared
        })
    };
    let excerpt = fixtures::excerpt(json!([{
        "sid": "6.1",
        "tokens": fixtures::tokens(&["Si", "pugnant", "et", "si", "vincunt", ",", "tum", "omnes", "laudamus", "."]),
        "constructions": [
            { "type": "conditional_protasis", "start": 0, "end": 1, "conditional": conditional(Some(1), vec![]) },
            { "type": "conditional_protasis", "start": 3, "end": 4, "conditional": conditional(Some(4), vec![]) },
            { "type": "conditional_apodosis", "start": 6, "end": 8, "conditional": conditional(None, vec![1, 4]) }
        ]
    }]));

    let (targets, _) = derive_targets(&excerpt.sentences[0], UnmarkedPairing::Permissive);
    let apodoses: Vec<_> = targets.iter().filter(|t| t.role == Some(Role::Apodosis)).collect();
    assert_eq!(targets.len(), 4);
    assert_eq!(apodoses.len(), 2);
    assert_ne!(apodoses[0].pair_key, apodoses[1].pair_key);
    assert_ne!(apodoses[0].id, apodoses[1].id);
}

#[test]
fn test_shared_apodosis_listing_protasis_verbs() {
    let protasis = |verb: usize| {
        json!({
            "label": "future_more_vivid",
            "protasis": { "verb_index": verb },
            "apodosis": { "verb_index": 5 }
        })
    };
    let excerpt = fixtures::excerpt(json!([{
        "sid": "6.3",
        "tokens": fixtures::tokens(&["Si", "venies", ",", "si", "manebis", "gaudebo", "."]),
        "constructions": [
            { "type": "conditional_protasis", "start": 0, "end": 1, "conditional": protasis(1) },
            { "type": "conditional_protasis", "start": 3, "end": 4, "conditional": protasis(4) },
            {
                "type": "conditional_apodosis", "start": 5, "end": 5,
                "conditional": { "label": "future_more_vivid", "protasis_verb_indexes": [1, 4] }
            }
        ]
    }]));

    let (targets, _) = derive_targets(&excerpt.sentences[0], UnmarkedPairing::Strict);
    let keys: Vec<Option<&str>> = targets.iter().map(|t| t.pair_key.as_deref()).collect();
    assert_eq!(
        keys,
        vec![Some("6.3#v1~5"), Some("6.3#v1~5"), Some("6.3#v4~5"), Some("6.3#v4~5")]
    );
    assert_eq!(targets[1].role, Some(Role::Apodosis));
    assert_eq!(targets[3].role, Some(Role::Apodosis));
}

#[test]
fn test_unmarked_conditionals_follow_pairing_setting() {
    let excerpt = fixtures::excerpt(json!([{
        "sid": "6.2",
        "tokens": fixtures::tokens(&["Si", "vales", ",", "bene", "est", "."]),
        "constructions": [
            { "type": "conditional_protasis", "subtype": "present_simple", "start": 0, "end": 1 },
            { "type": "conditional_apodosis", "subtype": "present_simple", "start": 3, "end": 4 }
        ]
    }]));
    let sentence = &excerpt.sentences[0];

    let (permissive, _) = derive_targets(sentence, UnmarkedPairing::Permissive);
    assert_eq!(permissive[0].pair_key, permissive[1].pair_key);
    assert_eq!(permissive[0].label.as_deref(), Some("present_simple"));

    let (strict, _) = derive_targets(sentence, UnmarkedPairing::Strict);
    assert_ne!(strict[0].pair_key, strict[1].pair_key);
}

//! End-to-end grading scenarios through the practice session.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use construe_core::{
    ConstructionType, GradeFailure, MasteryBucket, Outcome, Phase, PracticeMode, Role, Submission,
};
use pretty_assertions::assert_eq;

use common::fixtures;
use common::TestContext;

#[test]
fn test_trailing_punctuation_is_trimmed() {
    let mut ctx = TestContext::new(PracticeMode::Mixed);
    ctx.load(fixtures::ablative_absolute_excerpt());

    let verdict = ctx
        .session
        .submit(&Submission::new("1.1", 2, 6).with_type(ConstructionType::AblAbs));

    match &verdict.outcome {
        Outcome::Found {
            target_id,
            construction_type,
            ..
        } => {
            assert_eq!(*construction_type, ConstructionType::AblAbs);
            assert_eq!(target_id, "1.1:abl_abs:-:2-5#0");
        }
        other => panic!("expected a find, got {:?}", other),
    }
    assert_eq!(verdict.phase, Phase::Complete);
    assert_eq!(verdict.events.len(), 1);
    assert!(verdict.events[0].correct);
    assert!(ctx.session.ledger().correct_ids()[&ConstructionType::AblAbs].contains("1.1:abl_abs:-:2-5#0"));
}

#[test]
fn test_pair_lock_rejects_unrelated_span() {
    let mut ctx = TestContext::new(PracticeMode::Conditionals);
    ctx.load(fixtures::conditional_excerpt());

    let first = ctx.session.submit(&Submission::new("2.4", 0, 1));
    assert!(matches!(first.outcome, Outcome::Found { role: Some(Role::Protasis), .. }));
    assert_eq!(
        first.pair_lock.as_ref().map(|l| l.required_role),
        Some(Role::Apodosis)
    );

    // The ablative absolute is a perfectly good span, but the lock wants the apodosis.
    let locked = ctx
        .session
        .submit(&Submission::new("2.4", 3, 4).with_type(ConstructionType::AblAbs));
    assert_eq!(
        locked.failure(),
        Some(&GradeFailure::PairIncomplete {
            pair_key: "2.4#v1~6".to_string(),
            required_role: Some(Role::Apodosis),
        })
    );

    let second = ctx.session.submit(&Submission::new("2.4", 6, 7));
    assert!(matches!(second.outcome, Outcome::Found { awaiting_label: true, .. }));
    assert!(second.pair_lock.is_none());
}

#[test]
fn test_conditional_pair_is_mastered_after_classification() {
    let mut ctx = TestContext::new(PracticeMode::Conditionals);
    ctx.load(fixtures::conditional_excerpt());

    ctx.session.submit(&Submission::new("2.4", 0, 1));
    ctx.session.submit(&Submission::new("2.4", 6, 7));
    let wrong = ctx.session.classify("2.4#v1~6", "present_general", false);
    assert!(matches!(
        wrong.failure(),
        Some(GradeFailure::WrongConditionalLabel { .. })
    ));
    let verdict = ctx.session.classify("2.4#v1~6", "future_more_vivid", false);
    assert_eq!(verdict.phase, Phase::Complete);

    let report = ctx.session.teardown().expect("Failed to finalize");
    let bucket = MasteryBucket::Conditional("future_more_vivid".to_string());
    // The wrong label was not hinted, so the pair is still eligible.
    assert_eq!(
        report.committed.get(&bucket),
        Some(&BTreeSet::from(["2.4#v1~6".to_string()]))
    );
}

#[test]
fn test_shared_apodosis_found_first_locks_every_pair() {
    let mut ctx = TestContext::new(PracticeMode::Conditionals);
    ctx.load(fixtures::shared_apodosis_excerpt());
    assert_eq!(ctx.session.targets().len(), 4);

    let apodosis = ctx.session.submit(&Submission::new("6.3", 6, 6));
    assert!(matches!(apodosis.outcome, Outcome::Found { role: Some(Role::Apodosis), .. }));
    // Both copies of the clause are credited at once.
    assert_eq!(apodosis.events.len(), 2);
    let lock = apodosis.pair_lock.clone().expect("lock after shared apodosis");
    assert_eq!(
        lock.pair_keys().into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from(["6.3#v1~6".to_string(), "6.3#v4~6".to_string()])
    );
    assert_eq!(lock.required_role, Role::Protasis);

    // The second protasis completes its own pair.
    let second = ctx.session.submit(&Submission::new("6.3", 3, 4));
    assert!(matches!(second.outcome, Outcome::Found { awaiting_label: true, .. }));
    assert_eq!(
        second.pair_lock.as_ref().map(|l| l.pair_key.as_str()),
        Some("6.3#v1~6")
    );

    let first = ctx.session.submit(&Submission::new("6.3", 0, 1));
    assert!(matches!(first.outcome, Outcome::Found { awaiting_label: true, .. }));
    assert!(first.pair_lock.is_none());

    ctx.session.classify("6.3#v4~6", "future_more_vivid", false);
    let done = ctx.session.classify("6.3#v1~6", "future_more_vivid", false);
    assert_eq!(done.phase, Phase::Complete);
}

#[test]
fn test_mixed_mode_conditional_side_is_mastered_by_type() {
    let mut ctx = TestContext::new(PracticeMode::Mixed);
    ctx.load(fixtures::conditional_excerpt());
    let protasis = ctx.target("conditional_protasis").id.clone();

    let verdict = ctx
        .session
        .submit(&Submission::new("2.4", 0, 1).with_type(ConstructionType::ConditionalProtasis));
    assert!(matches!(verdict.outcome, Outcome::Found { .. }));
    let bucket = MasteryBucket::Construction(ConstructionType::ConditionalProtasis);
    assert_eq!(verdict.events[0].bucket, bucket);
    assert_eq!(verdict.events[0].instance_id, protasis);
    assert!(ctx.session.ledger().successes()[&bucket].contains(&protasis));

    let report = ctx.session.teardown().expect("Failed to finalize");
    assert_eq!(report.committed.get(&bucket), Some(&BTreeSet::from([protasis.clone()])));

    // The next mixed session skips the mastered side but keeps the apodosis.
    let mastered = ctx.session.store().mastered().expect("load");
    let mut next = TestContext::with_mastered(PracticeMode::Mixed, mastered);
    next.session.set_totals(BTreeMap::from([(bucket, 2)]));
    next.session
        .load_excerpt(fixtures::conditional_excerpt())
        .expect("Failed to load excerpt");
    assert!(next.session.targets().iter().all(|t| t.id != protasis));
    assert!(next
        .session
        .targets()
        .iter()
        .any(|t| t.construction_type == ConstructionType::ConditionalApodosis));
}

#[test]
fn test_fully_mastered_type_is_not_filtered() {
    let bucket = MasteryBucket::Construction(ConstructionType::PurposeClause);
    let all = BTreeSet::from([
        "3.1:purpose_clause:ut_ne:1-2#0".to_string(),
        "3.2:purpose_clause:ad_noun_gerundive:2-4#0".to_string(),
    ]);
    let mut ctx = TestContext::with_mastered(
        PracticeMode::Focus(ConstructionType::PurposeClause),
        BTreeMap::from([(bucket.clone(), all)]),
    );
    ctx.load(fixtures::purpose_excerpt());
    assert_eq!(ctx.session.targets().len(), 2);

    let partial = BTreeSet::from(["3.1:purpose_clause:ut_ne:1-2#0".to_string()]);
    let mut ctx = TestContext::with_mastered(
        PracticeMode::Focus(ConstructionType::PurposeClause),
        BTreeMap::from([(bucket, partial)]),
    );
    ctx.load(fixtures::purpose_excerpt());
    assert_eq!(ctx.session.targets().len(), 1);
    assert_eq!(ctx.session.targets()[0].sid, "3.2");
}

#[test]
fn test_reveal_grants_nothing() {
    let mut ctx = TestContext::new(PracticeMode::Mixed);
    ctx.load(fixtures::three_target_excerpt());

    let verdict = ctx.session.reveal();
    match &verdict.outcome {
        Outcome::Revealed { unfound } => assert_eq!(unfound.len(), 3),
        other => panic!("expected reveal, got {:?}", other),
    }
    assert_eq!(verdict.events.len(), 3);
    assert!(verdict.events.iter().all(|e| !e.correct && e.hinted));
    assert_eq!(ctx.session.sink().len(), 3);

    let report = ctx.session.teardown().expect("Failed to finalize");
    assert!(report.committed.is_empty());
    assert!(ctx.session.store().mastered().expect("load").is_empty());
}

#[test]
fn test_finalize_twice_is_a_no_op() {
    let mut ctx = TestContext::new(PracticeMode::Mixed);
    ctx.load(fixtures::ablative_absolute_excerpt());
    ctx.session
        .submit(&Submission::new("1.1", 2, 5).with_type(ConstructionType::AblAbs));

    let first = ctx.session.teardown().expect("Failed to finalize");
    let mastered = ctx.session.store().mastered().expect("load");
    let second = ctx.session.teardown().expect("Failed to finalize");

    assert!(!first.committed.is_empty());
    assert!(second.already_finalized);
    assert_eq!(ctx.session.store().mastered().expect("load"), mastered);
}

#[test]
fn test_reselecting_found_target_never_fails() {
    let mut ctx = TestContext::new(PracticeMode::Mixed);
    ctx.load(fixtures::three_target_excerpt());
    let gerund = Submission::new("4.2", 9, 10).with_type(ConstructionType::Gerund);

    assert!(!ctx.session.submit(&gerund).is_failure());
    for _ in 0..3 {
        let verdict = ctx.session.submit(&gerund);
        assert!(matches!(verdict.outcome, Outcome::AlreadyFound { .. }));
        assert!(verdict.events.is_empty());
    }
    let progress = ctx.session.progress().expect("session loaded");
    assert_eq!(progress.found, 1);
    assert_eq!(progress.total, 3);
}

#[test]
fn test_hinted_success_is_withheld() {
    let mut ctx = TestContext::new(PracticeMode::Focus(ConstructionType::PurposeClause));
    ctx.load(fixtures::purpose_excerpt());

    ctx.session
        .submit(&Submission::new("3.1", 1, 2).with_subtype("ut_ne").hinted());
    ctx.session
        .submit(&Submission::new("3.2", 2, 4).with_subtype("ad_noun_gerundive"));

    let report = ctx.session.teardown().expect("Failed to finalize");
    let bucket = MasteryBucket::Construction(ConstructionType::PurposeClause);
    assert_eq!(
        report.withheld.get(&bucket),
        Some(&BTreeSet::from(["3.1:purpose_clause:ut_ne:1-2#0".to_string()]))
    );
    assert_eq!(
        report.committed.get(&bucket),
        Some(&BTreeSet::from(["3.2:purpose_clause:ad_noun_gerundive:2-4#0".to_string()]))
    );
}

#[test]
fn test_wrong_subtype_keeps_target_open() {
    let mut ctx = TestContext::new(PracticeMode::Focus(ConstructionType::PurposeClause));
    ctx.load(fixtures::purpose_excerpt());

    let verdict = ctx
        .session
        .submit(&Submission::new("3.2", 2, 4).with_subtype("ut_ne"));
    assert!(matches!(verdict.failure(), Some(GradeFailure::WrongSubtype { .. })));
    assert!(ctx.session.ledger().found().is_empty());
    let target = ctx.target("3.2:purpose_clause");
    assert!(ctx
        .session
        .grading()
        .expect("session loaded")
        .near_misses()
        .contains(&target.id));
}

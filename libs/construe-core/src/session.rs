//! Practice session facade.
//!
//! Wires extraction, grading and the mastery store together for one learner
//! working through excerpts. Every session boundary (new excerpt, mode
//! switch, teardown) finalizes the outgoing ledger before any ephemeral
//! state is reset.

use crate::construction::SkippedConstruction;
use crate::error::Result;
use crate::grading::{GradingSession, Outcome, Phase, Progress, Submission, Verdict};
use crate::mastery::{AttemptSink, CorpusTotals, FinalizeReport, MasteryRepository, MasteryStore, SessionLedger};
use crate::targets::{extract_excerpt, ExtractionContext, Target};
use crate::types::{EffectiveSettings, Excerpt, GradingSettings, ModeSettings, PracticeMode};
use serde::Serialize;
use std::collections::HashSet;

/// What happened when an excerpt was loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Finalize result for the outgoing session, if there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized: Option<FinalizeReport>,
    pub targets: usize,
    pub filtered: Vec<String>,
    pub skipped: Vec<SkippedConstruction>,
}

pub struct PracticeSession<R, S> {
    store: MasteryStore<R>,
    sink: S,
    settings: GradingSettings,
    mode_settings: Vec<ModeSettings>,
    totals: CorpusTotals,
    mode: PracticeMode,
    excerpt: Option<Excerpt>,
    grading: Option<GradingSession>,
    ledger: SessionLedger,
}

impl<R: MasteryRepository, S: AttemptSink> PracticeSession<R, S> {
    pub fn new(repository: R, sink: S, settings: GradingSettings, mode: PracticeMode) -> Self {
        let store = MasteryStore::new(repository).with_window(settings.eligibility_window);
        Self {
            store,
            sink,
            settings,
            mode_settings: Vec::new(),
            totals: CorpusTotals::new(),
            mode: mode.normalized(),
            excerpt: None,
            grading: None,
            ledger: SessionLedger::new(),
        }
    }

    /// Per-mode overrides; the last entry for a mode wins.
    pub fn with_mode_settings(mut self, overrides: Vec<ModeSettings>) -> Self {
        self.mode_settings = overrides;
        self
    }

    /// Corpus-wide instance counts used to lift filtering on fully mastered buckets.
    pub fn with_totals(mut self, totals: CorpusTotals) -> Self {
        self.totals = totals;
        self
    }

    pub fn set_totals(&mut self, totals: CorpusTotals) {
        self.totals = totals;
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn effective_settings(&self) -> EffectiveSettings {
        let overrides = self
            .mode_settings
            .iter()
            .rev()
            .find(|m| m.mode.normalized() == self.mode);
        EffectiveSettings::merge(&self.settings, overrides)
    }

    /// Finalize the outgoing session and start grading `excerpt`.
    pub fn load_excerpt(&mut self, excerpt: Excerpt) -> Result<LoadReport> {
        let finalized = self.close_current()?;

        let settings = self.effective_settings();
        let mastered = self.store.mastered()?;
        let confirmed = HashSet::new();
        let ctx = ExtractionContext {
            confirmed: &confirmed,
            mastered: &mastered,
            totals: &self.totals,
            unmarked_pairing: settings.unmarked_pairing,
            mode: self.mode,
        };
        let extraction = extract_excerpt(&excerpt, &ctx);

        self.store.set_window(settings.eligibility_window);
        self.store.begin_session();
        self.ledger = SessionLedger::new();
        let grading = GradingSession::new(&excerpt, extraction.targets, self.mode, settings);

        tracing::info!(
            excerpt = excerpt.id.as_deref().unwrap_or("-"),
            mode = %self.mode,
            targets = grading.targets().len(),
            filtered = extraction.filtered.len(),
            skipped = extraction.skipped.len(),
            "excerpt loaded"
        );

        let report = LoadReport {
            finalized,
            targets: grading.targets().len(),
            filtered: extraction.filtered,
            skipped: extraction.skipped,
        };
        self.grading = Some(grading);
        self.excerpt = Some(excerpt);
        Ok(report)
    }

    /// Reload the current excerpt as a fresh session.
    pub fn reload(&mut self) -> Result<Option<LoadReport>> {
        match self.excerpt.clone() {
            Some(excerpt) => self.load_excerpt(excerpt).map(Some),
            None => Ok(None),
        }
    }

    /// Change practice mode; the current excerpt restarts in the new mode.
    pub fn switch_mode(&mut self, mode: PracticeMode) -> Result<Option<LoadReport>> {
        let mode = mode.normalized();
        if self.excerpt.is_none() {
            self.mode = mode;
            return Ok(None);
        }
        let finalized = self.close_current()?;
        self.mode = mode;
        let report = self.reload()?;
        Ok(report.map(|r| LoadReport {
            finalized: finalized.or(r.finalized),
            ..r
        }))
    }

    /// Finalize the current session without loading another.
    pub fn teardown(&mut self) -> Result<FinalizeReport> {
        let report = self.store.finalize_session(&self.ledger)?;
        self.grading = None;
        Ok(report)
    }

    fn close_current(&mut self) -> Result<Option<FinalizeReport>> {
        if self.grading.is_none() {
            return Ok(None);
        }
        let report = self.store.finalize_session(&self.ledger)?;
        self.grading = None;
        Ok(Some(report))
    }

    pub fn submit(&mut self, submission: &Submission) -> Verdict {
        let verdict = match self.grading.as_mut() {
            Some(grading) => grading.submit(&mut self.ledger, submission),
            None => idle(),
        };
        self.forward(&verdict);
        verdict
    }

    pub fn classify(&mut self, pair_key: &str, label: &str, hinted: bool) -> Verdict {
        let verdict = match self.grading.as_mut() {
            Some(grading) => grading.classify(&mut self.ledger, pair_key, label, hinted),
            None => idle(),
        };
        self.forward(&verdict);
        verdict
    }

    pub fn reveal(&mut self) -> Verdict {
        let verdict = match self.grading.as_mut() {
            Some(grading) => grading.reveal(&self.ledger),
            None => idle(),
        };
        self.forward(&verdict);
        verdict
    }

    fn forward(&mut self, verdict: &Verdict) {
        for event in &verdict.events {
            self.store.record_attempt(event);
            self.sink.record(event);
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        self.grading.as_ref().map(|g| g.progress(&self.ledger))
    }

    pub fn targets(&self) -> &[Target] {
        match &self.grading {
            Some(grading) => grading.targets(),
            None => &[],
        }
    }

    pub fn grading(&self) -> Option<&GradingSession> {
        self.grading.as_ref()
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub fn store(&self) -> &MasteryStore<R> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MasteryStore<R> {
        &mut self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn idle() -> Verdict {
    Verdict {
        outcome: Outcome::Closed,
        phase: Phase::Complete,
        pair_lock: None,
        events: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::{AttemptLog, InMemoryMasteryRepository, MasterySet};
    use crate::types::{ConstructionType, MasteryBucket, RawConstruction, Sentence, Token};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};

    fn excerpt() -> Excerpt {
        Excerpt {
            id: Some("bg-1".to_string()),
            sentences: vec![Sentence {
                sid: "1".to_string(),
                tokens: (0..10).map(|i| Token::word(&format!("w{}", i), "X")).collect(),
                constructions: vec![
                    RawConstruction::new(ConstructionType::AblAbs, 2, 5),
                    RawConstruction::new(ConstructionType::Gerund, 8, 8),
                ],
            }],
        }
    }

    fn session() -> PracticeSession<InMemoryMasteryRepository, AttemptLog> {
        PracticeSession::new(
            InMemoryMasteryRepository::new(),
            AttemptLog::new(),
            GradingSettings::default(),
            PracticeMode::Mixed,
        )
    }

    #[test]
    fn load_finalizes_outgoing_session() {
        let mut s = session();
        s.load_excerpt(excerpt()).unwrap();
        s.submit(&Submission::new("1", 2, 5).with_type(ConstructionType::AblAbs));

        let report = s.load_excerpt(excerpt()).unwrap();
        let finalized = report.finalized.expect("outgoing session finalized");
        assert_eq!(
            finalized.committed.get(&MasteryBucket::Construction(ConstructionType::AblAbs)).map(BTreeSet::len),
            Some(1)
        );
        // Mastered abl_abs is now filtered.
        assert_eq!(report.targets, 1);
        assert_eq!(report.filtered.len(), 1);
        assert!(s.ledger().found().is_empty());
    }

    #[test]
    fn events_reach_store_and_sink() {
        let mut s = session();
        s.load_excerpt(excerpt()).unwrap();
        s.submit(&Submission::new("1", 2, 5).with_type(ConstructionType::Gerund));
        s.reveal();

        assert_eq!(s.sink().len(), 3);
        assert_eq!(s.store().history().len(), 3);
    }

    #[test]
    fn teardown_after_reveal_commits_nothing() {
        let mut s = session();
        s.load_excerpt(excerpt()).unwrap();
        s.reveal();
        let report = s.teardown().unwrap();
        assert!(report.committed.is_empty());
        assert!(s.store().mastered().unwrap().is_empty());

        let again = s.teardown().unwrap();
        assert!(again.already_finalized);
    }

    #[test]
    fn switch_mode_restarts_excerpt() {
        let mut s = session();
        s.load_excerpt(excerpt()).unwrap();
        let report = s
            .switch_mode(PracticeMode::Focus(ConstructionType::Gerund))
            .unwrap()
            .expect("excerpt reloaded");
        assert!(report.finalized.is_some());
        assert_eq!(s.targets().len(), 1);
        assert_eq!(s.mode(), PracticeMode::Focus(ConstructionType::Gerund));
    }

    #[test]
    fn idle_session_is_closed() {
        let mut s = session();
        let verdict = s.submit(&Submission::new("1", 2, 5));
        assert_eq!(verdict.outcome, Outcome::Closed);
        assert!(s.progress().is_none());
    }

    #[test]
    fn mode_overrides_apply() {
        let mut strict = ModeSettings::new(PracticeMode::Mixed);
        strict.max_edge_drift = Some(0);
        let mut s = session().with_mode_settings(vec![strict]);
        s.load_excerpt(excerpt()).unwrap();

        let verdict = s.submit(&Submission::new("1", 2, 6).with_type(ConstructionType::AblAbs));
        assert!(verdict.is_failure());
        assert_eq!(s.effective_settings().max_edge_drift, 0);
    }

    #[test]
    fn fully_mastered_bucket_is_not_filtered() {
        let bucket = MasteryBucket::Construction(ConstructionType::AblAbs);
        let mastered: MasterySet = BTreeMap::from([(bucket.clone(), BTreeSet::from(["1:abl_abs:-:2-5#0".to_string()]))]);
        let mut s = PracticeSession::new(
            InMemoryMasteryRepository::with_mastered(mastered),
            AttemptLog::new(),
            GradingSettings::default(),
            PracticeMode::Mixed,
        )
        .with_totals(BTreeMap::from([(bucket, 1)]));

        let report = s.load_excerpt(excerpt()).unwrap();
        assert_eq!(report.targets, 2);
        assert!(report.filtered.is_empty());
    }
}

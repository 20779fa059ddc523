//! Session-scoped mastery ledger with deferred, finalize-once commit.

use crate::error::Result;
use crate::types::{ConstructionType, MasteryBucket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Mastered instance ids per bucket.
pub type MasterySet = BTreeMap<MasteryBucket, BTreeSet<String>>;

/// Corpus-wide instance counts per bucket.
pub type CorpusTotals = BTreeMap<MasteryBucket, usize>;

/// One grading outcome, for statistics and eligibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptEvent {
    pub bucket: MasteryBucket,
    pub instance_id: String,
    pub sid: String,
    pub correct: bool,
    pub hinted: bool,
    pub revealed: bool,
    pub at: DateTime<Utc>,
}

impl AttemptEvent {
    pub fn new(bucket: MasteryBucket, instance_id: &str, sid: &str, correct: bool) -> Self {
        Self {
            bucket,
            instance_id: instance_id.to_string(),
            sid: sid.to_string(),
            correct,
            hinted: false,
            revealed: false,
            at: Utc::now(),
        }
    }

    pub fn with_hint(mut self, hinted: bool) -> Self {
        self.hinted = hinted;
        self
    }

    /// Negative attempt produced by revealing the answer.
    pub fn revealed(bucket: MasteryBucket, instance_id: &str, sid: &str) -> Self {
        Self {
            hinted: true,
            revealed: true,
            ..Self::new(bucket, instance_id, sid, false)
        }
    }

    /// Whether the learner was helped on this attempt.
    pub fn assisted(&self) -> bool {
        self.hinted || self.revealed
    }
}

/// Receiver of attempt events.
pub trait AttemptSink {
    fn record(&mut self, event: &AttemptEvent);
}

/// In-memory attempt history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptLog {
    events: Vec<AttemptEvent>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<AttemptEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[AttemptEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Attempts for one instance, oldest first.
    pub fn for_instance(&self, bucket: &MasteryBucket, instance_id: &str) -> Vec<&AttemptEvent> {
        self.events
            .iter()
            .filter(|e| &e.bucket == bucket && e.instance_id == instance_id)
            .collect()
    }
}

impl AttemptSink for AttemptLog {
    fn record(&mut self, event: &AttemptEvent) {
        self.events.push(event.clone());
    }
}

/// Whether an instance may be promoted to mastered.
///
/// False when any of the most recent `window` attempts was hinted or
/// revealed. An instance with no attempts is eligible.
pub fn is_eligible(prior: &[&AttemptEvent], window: usize) -> bool {
    prior.iter().rev().take(window).all(|e| !e.assisted())
}

/// Persisted mastered set.
pub trait MasteryRepository {
    fn load(&self) -> Result<MasterySet>;
    /// Add ids; existing ids are kept.
    fn commit(&mut self, additions: &MasterySet) -> Result<()>;
    /// Remove every id of `bucket`, or of every bucket when `None`.
    fn reset(&mut self, bucket: Option<&MasteryBucket>) -> Result<()>;
}

/// Mastery repository held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryMasteryRepository {
    mastered: MasterySet,
}

impl InMemoryMasteryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mastered(mastered: MasterySet) -> Self {
        Self { mastered }
    }
}

impl MasteryRepository for InMemoryMasteryRepository {
    fn load(&self) -> Result<MasterySet> {
        Ok(self.mastered.clone())
    }

    fn commit(&mut self, additions: &MasterySet) -> Result<()> {
        merge_into(&mut self.mastered, additions);
        Ok(())
    }

    fn reset(&mut self, bucket: Option<&MasteryBucket>) -> Result<()> {
        match bucket {
            Some(b) => {
                self.mastered.remove(b);
            }
            None => self.mastered.clear(),
        }
        Ok(())
    }
}

/// Union `additions` into `set`.
pub fn merge_into(set: &mut MasterySet, additions: &MasterySet) {
    for (bucket, ids) in additions {
        set.entry(bucket.clone())
            .or_default()
            .extend(ids.iter().cloned());
    }
}

/// Accumulators for one excerpt session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLedger {
    found: HashSet<String>,
    correct_ids: BTreeMap<ConstructionType, BTreeSet<String>>,
    correct_pair_keys: BTreeMap<String, BTreeSet<String>>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a target found. Returns false if it already was.
    pub fn mark_found(&mut self, target_id: &str) -> bool {
        self.found.insert(target_id.to_string())
    }

    pub fn is_found(&self, target_id: &str) -> bool {
        self.found.contains(target_id)
    }

    pub fn found(&self) -> &HashSet<String> {
        &self.found
    }

    pub fn record_success(&mut self, construction_type: ConstructionType, target_id: &str) {
        self.correct_ids
            .entry(construction_type)
            .or_default()
            .insert(target_id.to_string());
    }

    pub fn record_pair_success(&mut self, label: &str, pair_key: &str) {
        self.correct_pair_keys
            .entry(label.to_string())
            .or_default()
            .insert(pair_key.to_string());
    }

    pub fn correct_ids(&self) -> &BTreeMap<ConstructionType, BTreeSet<String>> {
        &self.correct_ids
    }

    pub fn correct_pair_keys(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.correct_pair_keys
    }

    /// Session successes keyed by mastery bucket.
    pub fn successes(&self) -> MasterySet {
        let mut out = MasterySet::new();
        for (t, ids) in &self.correct_ids {
            out.insert(MasteryBucket::Construction(*t), ids.clone());
        }
        for (label, keys) in &self.correct_pair_keys {
            out.insert(MasteryBucket::Conditional(label.clone()), keys.clone());
        }
        out
    }
}

/// Outcome of a finalize call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub committed: MasterySet,
    /// Session successes withheld because of hints or reveals.
    pub withheld: MasterySet,
    /// True when the session had already been finalized; nothing was done.
    pub already_finalized: bool,
}

/// Mastery store: persisted set, attempt history and the finalize guard.
#[derive(Debug)]
pub struct MasteryStore<R> {
    repository: R,
    history: AttemptLog,
    window: usize,
    finalized: bool,
}

impl<R: MasteryRepository> MasteryStore<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            history: AttemptLog::new(),
            window: 2,
            finalized: false,
        }
    }

    /// Seed attempt history from earlier sessions.
    pub fn with_history(mut self, history: AttemptLog) -> Self {
        self.history = history;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn set_window(&mut self, window: usize) {
        self.window = window;
    }

    /// Start a new session; re-arms finalize.
    pub fn begin_session(&mut self) {
        self.finalized = false;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn record_attempt(&mut self, event: &AttemptEvent) {
        self.history.record(event);
    }

    pub fn history(&self) -> &AttemptLog {
        &self.history
    }

    pub fn mastered(&self) -> Result<MasterySet> {
        self.repository.load()
    }

    pub fn reset(&mut self, bucket: Option<&MasteryBucket>) -> Result<()> {
        self.repository.reset(bucket)
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    /// Commit the eligible successes of `ledger`, once per session.
    ///
    /// Later calls before [`begin_session`](Self::begin_session) are no-ops.
    /// A failed commit leaves the session open so it can be retried.
    pub fn finalize_session(&mut self, ledger: &SessionLedger) -> Result<FinalizeReport> {
        if self.finalized {
            return Ok(FinalizeReport {
                already_finalized: true,
                ..Default::default()
            });
        }

        let mut report = FinalizeReport::default();
        for (bucket, ids) in ledger.successes() {
            for id in ids {
                let prior = self.history.for_instance(&bucket, &id);
                let dest = if is_eligible(&prior, self.window) {
                    &mut report.committed
                } else {
                    &mut report.withheld
                };
                dest.entry(bucket.clone()).or_default().insert(id);
            }
        }

        if !report.committed.is_empty() {
            self.repository.commit(&report.committed)?;
        }
        self.finalized = true;

        tracing::info!(
            committed = count(&report.committed),
            withheld = count(&report.withheld),
            "session finalized"
        );
        Ok(report)
    }
}

fn count(set: &MasterySet) -> usize {
    set.values().map(BTreeSet::len).sum()
}

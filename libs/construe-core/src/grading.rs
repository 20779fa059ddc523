//! Grading state machine for one excerpt session.
//!
//! A session starts in [`Phase::Hunting`] and ends either in
//! [`Phase::Complete`], once every in-scope target is found (and, in
//! conditionals mode, every pair classified), or in [`Phase::Revealed`]
//! after the learner gives up. Failures never touch the found set or the
//! ledger's successes.

use crate::mastery::{AttemptEvent, SessionLedger};
use crate::matching::{best_match, trim_punctuation, FoundFilter, MatchCandidate, MatchScope, Tolerance};
use crate::targets::{MasteryKey, Target};
use crate::types::{ConstructionType, EffectiveSettings, Excerpt, PracticeMode, Role, Span, Token};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Hunting,
    Revealed,
    Complete,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Hunting)
    }
}

/// Requirement that the next find be the partner of a half-found pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairLock {
    pub pair_key: String,
    /// Further pairs whose side was credited by the same find.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_with: Vec<String>,
    pub required_role: Role,
}

impl PairLock {
    /// Every pair key the next find may complete.
    pub fn pair_keys(&self) -> Vec<String> {
        std::iter::once(self.pair_key.clone())
            .chain(self.shared_with.iter().cloned())
            .collect()
    }
}

/// Why a submission was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GradeFailure {
    WrongSpan,
    WrongType {
        target_id: String,
    },
    /// Right area, wrong subtype.
    WrongSubtype {
        target_id: String,
    },
    PairIncomplete {
        pair_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        required_role: Option<Role>,
    },
    WrongConditionalLabel {
        pair_key: String,
    },
}

/// What a submission did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Found {
        target_id: String,
        construction_type: ConstructionType,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pair_key: Option<String>,
        /// Pair now needs its conditional-type classification.
        awaiting_label: bool,
    },
    AlreadyFound {
        target_id: String,
    },
    Classified {
        pair_key: String,
        label: String,
    },
    Revealed {
        unfound: Vec<String>,
    },
    Failed {
        failure: GradeFailure,
    },
    /// The session is over; nothing was graded.
    Closed,
}

/// Result of one grading call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_lock: Option<PairLock>,
    /// Attempt events produced by this call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<AttemptEvent>,
}

impl Verdict {
    pub fn failure(&self) -> Option<&GradeFailure> {
        match &self.outcome {
            Outcome::Failed { failure } => Some(failure),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure().is_some()
    }
}

/// A learner's span selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub sid: String,
    pub selection: Span,
    #[serde(default)]
    pub chosen_type: Option<ConstructionType>,
    #[serde(default)]
    pub chosen_subtype: Option<String>,
    #[serde(default)]
    pub hinted: bool,
}

impl Submission {
    pub fn new(sid: &str, start: usize, end: usize) -> Self {
        Self {
            sid: sid.to_string(),
            selection: Span::new(start.min(end), start.max(end)),
            chosen_type: None,
            chosen_subtype: None,
            hinted: false,
        }
    }

    pub fn with_type(mut self, construction_type: ConstructionType) -> Self {
        self.chosen_type = Some(construction_type);
        self
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.chosen_subtype = Some(subtype.to_string());
        self
    }

    pub fn hinted(mut self) -> Self {
        self.hinted = true;
        self
    }
}

/// Progress counters for the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub phase: Phase,
    pub mode: PracticeMode,
    pub found: usize,
    pub total: usize,
    pub pairs_classified: usize,
    pub pairs_total: usize,
    pub remaining: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_lock: Option<PairLock>,
}

/// Grading state for one excerpt in one practice mode.
#[derive(Debug, Clone)]
pub struct GradingSession {
    mode: PracticeMode,
    settings: EffectiveSettings,
    tokens: HashMap<String, Vec<Token>>,
    targets: Vec<Target>,
    phase: Phase,
    pair_lock: Option<PairLock>,
    classified: HashSet<String>,
    near_misses: HashSet<String>,
}

enum Judgement {
    Accept,
    Reject(GradeFailure),
}

impl GradingSession {
    /// Start hunting over `targets`; targets outside `mode` are dropped.
    pub fn new(excerpt: &Excerpt, targets: Vec<Target>, mode: PracticeMode, settings: EffectiveSettings) -> Self {
        let mode = mode.normalized();
        let targets: Vec<Target> = targets
            .into_iter()
            .filter(|t| mode.includes(t.construction_type))
            .collect();
        let tokens = excerpt
            .sentences
            .iter()
            .map(|s| (s.sid.clone(), s.tokens.clone()))
            .collect();

        let mut session = Self {
            mode,
            settings,
            tokens,
            targets,
            phase: Phase::Hunting,
            pair_lock: None,
            classified: HashSet::new(),
            near_misses: HashSet::new(),
        };
        if session.targets.is_empty() {
            session.phase = Phase::Complete;
        }
        session
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pair_lock(&self) -> Option<&PairLock> {
        self.pair_lock.as_ref()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn settings(&self) -> &EffectiveSettings {
        &self.settings
    }

    /// Targets credited as the right area but with the wrong subtype.
    pub fn near_misses(&self) -> &HashSet<String> {
        &self.near_misses
    }

    /// Pair keys of every in-scope conditional pair.
    pub fn pair_keys(&self) -> BTreeSet<&str> {
        if !self.mode.pairs_conditionals() {
            return BTreeSet::new();
        }
        self.targets
            .iter()
            .filter_map(|t| t.pair_key.as_deref())
            .collect()
    }

    fn pair_members<'a>(&'a self, pair_key: &'a str) -> impl Iterator<Item = &'a Target> + 'a {
        self.targets
            .iter()
            .filter(move |t| t.pair_key.as_deref() == Some(pair_key))
    }

    /// First side of a pair still unfound, if any.
    fn missing_role(&self, ledger: &SessionLedger, pair_key: &str) -> Option<Role> {
        self.pair_members(pair_key)
            .find(|t| !ledger.is_found(&t.id))
            .and_then(|t| t.role)
    }

    fn verdict(&self, outcome: Outcome, events: Vec<AttemptEvent>) -> Verdict {
        Verdict {
            outcome,
            phase: self.phase,
            pair_lock: self.pair_lock.clone(),
            events,
        }
    }

    fn fail(&self, failure: GradeFailure, events: Vec<AttemptEvent>) -> Verdict {
        tracing::debug!(?failure, "submission rejected");
        self.verdict(Outcome::Failed { failure }, events)
    }

    /// Key under which attempts on `target` are recorded in this mode.
    fn attempt_key(&self, target: &Target) -> MasteryKey {
        target.mastery_key_in(self.mode)
    }

    /// Other copies of a clause shared by several pairs.
    fn siblings<'a>(&'a self, target: &'a Target) -> impl Iterator<Item = &'a Target> + 'a {
        self.targets.iter().filter(move |t| {
            t.id != target.id
                && t.is_conditional()
                && t.sid == target.sid
                && t.role == target.role
                && t.construction_type == target.construction_type
                && t.bands == target.bands
        })
    }

    fn attempt(&self, target: &Target, correct: bool, hinted: bool) -> AttemptEvent {
        let key = self.attempt_key(target);
        AttemptEvent::new(key.bucket, &key.id, &target.sid, correct).with_hint(hinted)
    }

    fn judge(&self, target: &Target, submission: &Submission) -> Judgement {
        if self.mode.requires_type_selection() && submission.chosen_type != Some(target.construction_type) {
            return Judgement::Reject(GradeFailure::WrongType {
                target_id: target.id.clone(),
            });
        }
        if self.settings.require_subtypes && target.construction_type.requires_subtype() {
            if let Some(expected) = &target.subtype {
                if submission.chosen_subtype.as_deref() != Some(expected.as_str()) {
                    return Judgement::Reject(GradeFailure::WrongSubtype {
                        target_id: target.id.clone(),
                    });
                }
            }
        }
        Judgement::Accept
    }

    /// Grade a span selection.
    pub fn submit(&mut self, ledger: &mut SessionLedger, submission: &Submission) -> Verdict {
        if self.phase.is_terminal() {
            return self.verdict(Outcome::Closed, Vec::new());
        }

        let Some(tokens) = self.tokens.get(&submission.sid) else {
            return self.fail(GradeFailure::WrongSpan, Vec::new());
        };
        let selection = if self.settings.trim_punctuation {
            trim_punctuation(tokens, submission.selection)
        } else {
            submission.selection
        };

        let tolerance = Tolerance::from(&self.settings);
        let lock = self.pair_lock.as_ref().map(|l| (l.pair_keys(), l.required_role));
        let mut scope = MatchScope::unfound(ledger.found());
        if let Some((keys, role)) = &lock {
            scope = scope.locked_to(keys, *role);
        }
        let fresh = best_match(&submission.sid, selection, &self.targets, &scope, &tolerance);
        let found_scope = MatchScope::unfound(ledger.found()).with_found_filter(FoundFilter::Only);
        let seen = best_match(&submission.sid, selection, &self.targets, &found_scope, &tolerance);

        let (fresh, seen) = (fresh.map(|c| owned(&c)), seen.map(|c| owned(&c)));

        match (fresh, seen) {
            (Some(fresh), seen) => {
                let Some(target) = self.targets.get(fresh.index).cloned() else {
                    return self.fail(GradeFailure::WrongSpan, Vec::new());
                };
                if let Some(seen) = &seen {
                    if seen.total < fresh.total {
                        return self.already_found(seen.index);
                    }
                }
                match self.judge(&target, submission) {
                    Judgement::Accept => self.accept(ledger, &target, submission.hinted),
                    Judgement::Reject(failure) => match seen {
                        // Re-selecting a found target is never wrong.
                        Some(seen) if seen.total <= fresh.total => self.already_found(seen.index),
                        _ => {
                            if let GradeFailure::WrongSubtype { target_id } = &failure {
                                self.near_misses.insert(target_id.clone());
                            }
                            let event = self.attempt(&target, false, submission.hinted);
                            self.fail(failure, vec![event])
                        }
                    },
                }
            }
            (None, Some(seen)) => self.already_found(seen.index),
            (None, None) => match &self.pair_lock {
                Some(lock) => self.fail(
                    GradeFailure::PairIncomplete {
                        pair_key: lock.pair_key.clone(),
                        required_role: Some(lock.required_role),
                    },
                    Vec::new(),
                ),
                None => self.fail(GradeFailure::WrongSpan, Vec::new()),
            },
        }
    }

    fn already_found(&self, index: usize) -> Verdict {
        let target_id = self
            .targets
            .get(index)
            .map(|t| t.id.clone())
            .unwrap_or_default();
        self.verdict(Outcome::AlreadyFound { target_id }, Vec::new())
    }

    fn accept(&mut self, ledger: &mut SessionLedger, target: &Target, hinted: bool) -> Verdict {
        // A clause shared by several pairs is found once for all of them.
        let credited: Vec<Target> = std::iter::once(target)
            .chain(self.siblings(target).filter(|t| !ledger.is_found(&t.id)))
            .cloned()
            .collect();

        let mut events = Vec::with_capacity(credited.len());
        for t in &credited {
            ledger.mark_found(&t.id);
            self.near_misses.remove(&t.id);
            if !t.is_conditional() || !self.mode.pairs_conditionals() {
                ledger.record_success(t.construction_type, &t.id);
            }
            events.push(self.attempt(t, true, hinted));
        }

        let mut awaiting_label = false;
        if self.mode.pairs_conditionals() {
            if let Some(role) = target.role {
                let mut waiting = Vec::new();
                for pair_key in credited.iter().filter_map(|t| t.pair_key.as_deref()) {
                    let partner_missing = self
                        .pair_members(pair_key)
                        .any(|t| t.role == Some(role.partner()) && !ledger.is_found(&t.id));
                    if partner_missing {
                        waiting.push(pair_key.to_string());
                    } else if !self.classified.contains(pair_key) {
                        awaiting_label = true;
                    }
                }
                // Pairs left half-found by an earlier shared find stay locked.
                let carried = self.pair_lock.take().and_then(|lock| {
                    let open: Vec<String> = lock
                        .pair_keys()
                        .into_iter()
                        .filter(|k| {
                            self.pair_members(k)
                                .any(|t| t.role == Some(lock.required_role) && !ledger.is_found(&t.id))
                        })
                        .collect();
                    (!open.is_empty()).then_some((open, lock.required_role))
                });
                let (waiting, required_role) = carried.unwrap_or((waiting, role.partner()));
                let mut waiting = waiting.into_iter();
                self.pair_lock = waiting.next().map(|pair_key| PairLock {
                    pair_key,
                    shared_with: waiting.collect(),
                    required_role,
                });
            }
        }

        tracing::debug!(target_id = %target.id, awaiting_label, "target found");
        self.update_phase(ledger);
        self.verdict(
            Outcome::Found {
                target_id: target.id.clone(),
                construction_type: target.construction_type,
                role: target.role,
                pair_key: target.pair_key.clone(),
                awaiting_label,
            },
            events,
        )
    }

    /// Classify a completed pair's conditional type.
    pub fn classify(&mut self, ledger: &mut SessionLedger, pair_key: &str, label: &str, hinted: bool) -> Verdict {
        if self.phase.is_terminal() {
            return self.verdict(Outcome::Closed, Vec::new());
        }

        let Some(target) = self.pair_members(pair_key).next().cloned() else {
            return self.fail(
                GradeFailure::PairIncomplete {
                    pair_key: pair_key.to_string(),
                    required_role: None,
                },
                Vec::new(),
            );
        };
        let correct_label = target.label.clone().unwrap_or_default();
        if !self.mode.pairs_conditionals() {
            return self.fail(
                GradeFailure::PairIncomplete {
                    pair_key: pair_key.to_string(),
                    required_role: None,
                },
                Vec::new(),
            );
        }
        if let Some(role) = self.missing_role(ledger, pair_key) {
            return self.fail(
                GradeFailure::PairIncomplete {
                    pair_key: pair_key.to_string(),
                    required_role: Some(role),
                },
                Vec::new(),
            );
        }
        if self.classified.contains(pair_key) {
            return self.verdict(
                Outcome::Classified {
                    pair_key: pair_key.to_string(),
                    label: correct_label,
                },
                Vec::new(),
            );
        }

        if normalize_label(label) != normalize_label(&correct_label) {
            let event = self.attempt(&target, false, hinted);
            return self.fail(
                GradeFailure::WrongConditionalLabel {
                    pair_key: pair_key.to_string(),
                },
                vec![event],
            );
        }

        self.classified.insert(pair_key.to_string());
        ledger.record_pair_success(&correct_label, pair_key);
        let event = self.attempt(&target, true, hinted);
        self.update_phase(ledger);
        self.verdict(
            Outcome::Classified {
                pair_key: pair_key.to_string(),
                label: correct_label,
            },
            vec![event],
        )
    }

    /// Give up: show every answer and forfeit credit for what is unfound.
    pub fn reveal(&mut self, ledger: &SessionLedger) -> Verdict {
        if self.phase.is_terminal() {
            return self.verdict(Outcome::Closed, Vec::new());
        }

        let unfound: Vec<&Target> = self
            .targets
            .iter()
            .filter(|t| !ledger.is_found(&t.id))
            .collect();
        let events = unfound
            .iter()
            .map(|t| {
                let key = self.attempt_key(t);
                AttemptEvent::revealed(key.bucket, &key.id, &t.sid)
            })
            .collect();
        let unfound = unfound.iter().map(|t| t.id.clone()).collect();

        self.phase = Phase::Revealed;
        self.pair_lock = None;
        tracing::debug!("excerpt revealed");
        self.verdict(Outcome::Revealed { unfound }, events)
    }

    fn is_complete(&self, ledger: &SessionLedger) -> bool {
        let all_found = self.targets.iter().all(|t| ledger.is_found(&t.id));
        let all_classified = !self.mode.pairs_conditionals()
            || self.pair_keys().iter().all(|k| self.classified.contains(*k));
        all_found && all_classified
    }

    fn update_phase(&mut self, ledger: &SessionLedger) {
        if self.phase == Phase::Hunting && self.is_complete(ledger) {
            tracing::debug!("excerpt complete");
            self.phase = Phase::Complete;
            self.pair_lock = None;
        }
    }

    pub fn progress(&self, ledger: &SessionLedger) -> Progress {
        let pair_keys = self.pair_keys();
        let remaining: Vec<String> = self
            .targets
            .iter()
            .filter(|t| !ledger.is_found(&t.id))
            .map(|t| t.id.clone())
            .collect();
        Progress {
            phase: self.phase,
            mode: self.mode,
            found: self.targets.len() - remaining.len(),
            total: self.targets.len(),
            pairs_classified: pair_keys.iter().filter(|k| self.classified.contains(**k)).count(),
            pairs_total: pair_keys.len(),
            remaining,
            pair_lock: self.pair_lock.clone(),
        }
    }
}

/// Index and score of a candidate, detached from the target borrow.
struct Hit {
    index: usize,
    total: usize,
}

fn owned(c: &MatchCandidate<'_>) -> Hit {
    Hit {
        index: c.order.0,
        total: c.score.total(),
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '-'], "_")
}

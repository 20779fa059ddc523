//! Construction-identification grading engine.
//!
//! Provides:
//! - Validation and normalization of tagged constructions
//! - Target extraction with mastery filtering
//! - Conditional protasis/apodosis pairing
//! - Tolerant span matching for learner selections
//! - A grading state machine with pair locks and classification
//! - A session-scoped mastery ledger with finalize-once commit

pub mod construction;
pub mod error;
pub mod grading;
pub mod mastery;
pub mod matching;
pub mod pairing;
pub mod session;
pub mod targets;
pub mod types;

pub use construction::{normalize_sentence, validate, ConstructionKind, NormalizedConstruction, SkippedConstruction};
pub use error::{ExcerptError, MasteryError, Result};
pub use grading::{GradeFailure, GradingSession, Outcome, PairLock, Phase, Progress, Submission, Verdict};
pub use mastery::{
    is_eligible, AttemptEvent, AttemptLog, AttemptSink, CorpusTotals, FinalizeReport, InMemoryMasteryRepository,
    MasteryRepository, MasterySet, MasteryStore, SessionLedger,
};
pub use matching::{best_match, trim_punctuation, FoundFilter, MatchScope, Tolerance};
pub use pairing::{pair_key, resolve_pairs, Linkage};
pub use session::{LoadReport, PracticeSession};
pub use targets::{corpus_totals, derive_targets, extract_excerpt, extract_targets, ExtractionContext, MasteryKey, Target};
pub use types::{
    ConstructionType, EffectiveSettings, Excerpt, GradingSettings, MasteryBucket, ModeSettings, PracticeMode,
    RawConstruction, Role, Sentence, Span, Token, UnmarkedPairing,
};

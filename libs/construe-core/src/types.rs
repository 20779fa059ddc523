//! Core types for construction drilling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive token span `[start, end]` within one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of tokens covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Number of tokens shared with `other`.
    pub fn overlap(&self, other: &Span) -> usize {
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        if hi < lo {
            0
        } else {
            hi - lo + 1
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// Smallest span covering both.
    pub fn envelope(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A token of a loaded sentence. Its position in `Sentence::tokens` is its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprel: Option<String>,
}

impl Token {
    pub fn word(text: &str, upos: &str) -> Self {
        Self {
            text: text.to_string(),
            lemma: None,
            upos: Some(upos.to_string()),
            feats: None,
            deprel: None,
        }
    }

    pub fn punct(text: &str) -> Self {
        Self::word(text, "PUNCT")
    }

    /// Whether the token is punctuation, either by tag or by surface form.
    pub fn is_punctuation(&self) -> bool {
        if self.upos.as_deref() == Some("PUNCT") || self.deprel.as_deref() == Some("punct") {
            return true;
        }
        !self.text.is_empty()
            && self.text.chars().all(|c| {
                c.is_ascii_punctuation() || matches!(c, '—' | '–' | '«' | '»' | '“' | '”' | '‘' | '’')
            })
    }
}

/// Kinds of tagged grammatical constructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionType {
    CumClause,
    AblAbs,
    IndirectStatement,
    PurposeClause,
    ResultClause,
    RelativeClause,
    SubjunctiveRelativeClause,
    Gerund,
    Gerundive,
    GerundGerundiveFlip,
    ConditionalProtasis,
    ConditionalApodosis,
}

impl ConstructionType {
    pub const ALL: [ConstructionType; 12] = [
        Self::CumClause,
        Self::AblAbs,
        Self::IndirectStatement,
        Self::PurposeClause,
        Self::ResultClause,
        Self::RelativeClause,
        Self::SubjunctiveRelativeClause,
        Self::Gerund,
        Self::Gerundive,
        Self::GerundGerundiveFlip,
        Self::ConditionalProtasis,
        Self::ConditionalApodosis,
    ];

    /// Get the type name as it appears in excerpt payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CumClause => "cum_clause",
            Self::AblAbs => "abl_abs",
            Self::IndirectStatement => "indirect_statement",
            Self::PurposeClause => "purpose_clause",
            Self::ResultClause => "result_clause",
            Self::RelativeClause => "relative_clause",
            Self::SubjunctiveRelativeClause => "subjunctive_relative_clause",
            Self::Gerund => "gerund",
            Self::Gerundive => "gerundive",
            Self::GerundGerundiveFlip => "gerund_gerundive_flip",
            Self::ConditionalProtasis => "conditional_protasis",
            Self::ConditionalApodosis => "conditional_apodosis",
        }
    }

    /// Parse from a payload type name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalProtasis | Self::ConditionalApodosis)
    }

    /// Types whose subtype is part of a correct answer.
    ///
    /// Conditional subtypes mirror the conditional label and are graded by
    /// classification instead.
    pub fn requires_subtype(&self) -> bool {
        matches!(
            self,
            Self::PurposeClause
                | Self::ResultClause
                | Self::RelativeClause
                | Self::GerundGerundiveFlip
        )
    }

    /// Conditional role carried by this type, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::ConditionalProtasis => Some(Role::Protasis),
            Self::ConditionalApodosis => Some(Role::Apodosis),
            _ => None,
        }
    }
}

impl fmt::Display for ConstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a conditional sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Protasis,
    Apodosis,
}

impl Role {
    pub fn partner(self) -> Self {
        match self {
            Self::Protasis => Self::Apodosis,
            Self::Apodosis => Self::Protasis,
        }
    }

    pub fn construction_type(self) -> ConstructionType {
        match self {
            Self::Protasis => ConstructionType::ConditionalProtasis,
            Self::Apodosis => ConstructionType::ConditionalApodosis,
        }
    }
}

/// Verb linkage for one side of a conditional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClauseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tense: Option<String>,
}

/// Conditional payload attached to protasis/apodosis constructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protasis: Option<ClauseMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apodosis: Option<ClauseMeta>,
    /// Present on a shared apodosis: verb indices of every protasis it answers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protasis_verb_indexes: Vec<usize>,
}

/// Construction as tagged in an excerpt payload (may be malformed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConstruction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_spans: Option<Vec<Vec<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<ConditionalMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RawConstruction {
    /// Create a construction over `[start, end]` with no optional payload.
    pub fn new(construction_type: ConstructionType, start: usize, end: usize) -> Self {
        Self {
            kind: construction_type.as_str().to_string(),
            subtype: None,
            start: Some(start as i64),
            end: Some(end as i64),
            highlight_spans: None,
            conditional: None,
            confidence: None,
        }
    }
}

/// A sentence of an excerpt with its tagged constructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub sid: String,
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub constructions: Vec<RawConstruction>,
}

/// Atomic excerpt payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sentences: Vec<Sentence>,
}

impl Excerpt {
    pub fn sentence(&self, sid: &str) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.sid == sid)
    }
}

/// Practice mode for an excerpt session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PracticeMode {
    /// Every target in scope; the learner names the type.
    Mixed,
    /// One type in scope; the type is implied.
    Focus(ConstructionType),
    /// Conditional targets only, graded as linked pairs.
    Conditionals,
}

impl Default for PracticeMode {
    fn default() -> Self {
        Self::Mixed
    }
}

impl PracticeMode {
    /// Focus on a conditional side is the conditionals mode.
    pub fn normalized(self) -> Self {
        match self {
            Self::Focus(t) if t.is_conditional() => Self::Conditionals,
            other => other,
        }
    }

    pub fn requires_type_selection(&self) -> bool {
        matches!(self, Self::Mixed)
    }

    pub fn pairs_conditionals(&self) -> bool {
        matches!(self, Self::Conditionals)
    }

    /// Whether targets of `construction_type` are graded in this mode.
    pub fn includes(&self, construction_type: ConstructionType) -> bool {
        match self {
            Self::Mixed => true,
            Self::Focus(t) => *t == construction_type,
            Self::Conditionals => construction_type.is_conditional(),
        }
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mixed => f.write_str("mixed"),
            Self::Focus(t) => write!(f, "focus:{}", t),
            Self::Conditionals => f.write_str("conditionals"),
        }
    }
}

impl FromStr for PracticeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mixed" => Ok(Self::Mixed),
            "conditionals" => Ok(Self::Conditionals),
            other => other
                .strip_prefix("focus:")
                .and_then(ConstructionType::parse)
                .map(|t| Self::Focus(t).normalized())
                .ok_or_else(|| format!("unknown practice mode: {}", other)),
        }
    }
}

impl TryFrom<String> for PracticeMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PracticeMode> for String {
    fn from(mode: PracticeMode) -> Self {
        mode.to_string()
    }
}

/// Mastery bucket: a construction type, or a conditional label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MasteryBucket {
    Construction(ConstructionType),
    Conditional(String),
}

const CONDITIONAL_BUCKET_PREFIX: &str = "conditional_label:";

impl fmt::Display for MasteryBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction(t) => f.write_str(t.as_str()),
            Self::Conditional(label) => write!(f, "{}{}", CONDITIONAL_BUCKET_PREFIX, label),
        }
    }
}

impl FromStr for MasteryBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(label) = s.strip_prefix(CONDITIONAL_BUCKET_PREFIX) {
            return Ok(Self::Conditional(label.to_string()));
        }
        ConstructionType::parse(s)
            .map(Self::Construction)
            .ok_or_else(|| format!("unknown mastery bucket: {}", s))
    }
}

impl TryFrom<String> for MasteryBucket {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MasteryBucket> for String {
    fn from(bucket: MasteryBucket) -> Self {
        bucket.to_string()
    }
}

/// How to pair a protasis and an apodosis when neither carries verb indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmarkedPairing {
    /// Pair with the first unclaimed unmarked apodosis of the sentence.
    Permissive,
    /// Never pair; both sides become solo targets.
    Strict,
}

impl Default for UnmarkedPairing {
    fn default() -> Self {
        Self::Permissive
    }
}

/// Global grading settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingSettings {
    pub max_edge_drift: usize,
    pub min_overlap_ratio: f64,
    pub trim_punctuation: bool,
    pub require_subtypes: bool,
    pub unmarked_pairing: UnmarkedPairing,
    pub eligibility_window: usize,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            max_edge_drift: 2,
            min_overlap_ratio: 0.5,
            trim_punctuation: true,
            require_subtypes: true,
            unmarked_pairing: UnmarkedPairing::default(),
            eligibility_window: 2,
        }
    }
}

/// Per-mode settings (all fields optional for overrides).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSettings {
    pub mode: PracticeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_edge_drift: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_overlap_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_punctuation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_subtypes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmarked_pairing: Option<UnmarkedPairing>,
}

impl ModeSettings {
    /// Create new mode settings with only the mode set.
    pub fn new(mode: PracticeMode) -> Self {
        Self {
            mode,
            max_edge_drift: None,
            min_overlap_ratio: None,
            trim_punctuation: None,
            require_subtypes: None,
            unmarked_pairing: None,
        }
    }
}

/// Effective settings (global merged with mode overrides).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub max_edge_drift: usize,
    pub min_overlap_ratio: f64,
    pub trim_punctuation: bool,
    pub require_subtypes: bool,
    pub unmarked_pairing: UnmarkedPairing,
    pub eligibility_window: usize,
}

impl EffectiveSettings {
    /// Merge global settings with optional mode settings.
    pub fn merge(global: &GradingSettings, mode: Option<&ModeSettings>) -> Self {
        match mode {
            Some(m) => Self {
                max_edge_drift: m.max_edge_drift.unwrap_or(global.max_edge_drift),
                min_overlap_ratio: m.min_overlap_ratio.unwrap_or(global.min_overlap_ratio),
                trim_punctuation: m.trim_punctuation.unwrap_or(global.trim_punctuation),
                require_subtypes: m.require_subtypes.unwrap_or(global.require_subtypes),
                unmarked_pairing: m.unmarked_pairing.unwrap_or(global.unmarked_pairing),
                eligibility_window: global.eligibility_window,
            },
            None => Self {
                max_edge_drift: global.max_edge_drift,
                min_overlap_ratio: global.min_overlap_ratio,
                trim_punctuation: global.trim_punctuation,
                require_subtypes: global.require_subtypes,
                unmarked_pairing: global.unmarked_pairing,
                eligibility_window: global.eligibility_window,
            },
        }
    }
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self::merge(&GradingSettings::default(), None)
    }
}

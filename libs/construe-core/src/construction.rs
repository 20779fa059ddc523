//! Validation and normalization of tagged constructions.
//!
//! Raw payload constructions carry optional fields whose presence depends on
//! the type. Normalization turns each one into a [`NormalizedConstruction`]
//! whose [`ConstructionKind`] says up front whether conditional linkage
//! exists, so later stages never probe optional fields.

use crate::error::ExcerptError;
use crate::types::{ConditionalMeta, ConstructionType, RawConstruction, Sentence, Span};
use serde::Serialize;
use std::collections::HashSet;

const UNKNOWN_LABEL: &str = "unknown";

/// Conditional linkage of a protasis or apodosis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionalLink {
    /// Correct conditional-type label for classification.
    pub label: String,
    pub discourse: Option<String>,
    pub sequence: Option<String>,
    pub protasis_verb: Option<usize>,
    pub apodosis_verb: Option<usize>,
    /// Shared apodosis: verb indices of every protasis it answers.
    pub protasis_verb_indexes: Vec<usize>,
}

impl ConditionalLink {
    fn from_meta(meta: Option<&ConditionalMeta>, subtype: Option<&str>) -> Self {
        let label = meta
            .and_then(|m| m.label.as_deref())
            .or(subtype)
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(UNKNOWN_LABEL)
            .to_string();

        Self {
            label,
            discourse: meta.and_then(|m| m.discourse.clone()),
            sequence: meta.and_then(|m| m.sequence.clone()),
            protasis_verb: meta.and_then(|m| m.protasis.as_ref()?.verb_index),
            apodosis_verb: meta.and_then(|m| m.apodosis.as_ref()?.verb_index),
            protasis_verb_indexes: meta
                .map(|m| m.protasis_verb_indexes.clone())
                .unwrap_or_default(),
        }
    }

    /// Whether any verb-index linkage is present.
    pub fn has_verb_data(&self) -> bool {
        self.protasis_verb.is_some()
            || self.apodosis_verb.is_some()
            || !self.protasis_verb_indexes.is_empty()
    }
}

/// What a construction is, beyond its type and span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstructionKind {
    Plain,
    Protasis(ConditionalLink),
    Apodosis(ConditionalLink),
}

impl ConstructionKind {
    pub fn link(&self) -> Option<&ConditionalLink> {
        match self {
            Self::Plain => None,
            Self::Protasis(link) | Self::Apodosis(link) => Some(link),
        }
    }
}

/// A construction with a resolved span, ready for target extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedConstruction {
    /// Position in the sentence's raw construction list.
    pub ordinal: usize,
    pub construction_type: ConstructionType,
    pub subtype: Option<String>,
    pub span: Span,
    /// Matchable and highlighted regions; never empty.
    pub bands: Vec<Span>,
    pub kind: ConstructionKind,
}

/// A construction dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedConstruction {
    pub sid: String,
    pub error: ExcerptError,
}

/// Result of normalizing one sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSentence {
    pub constructions: Vec<NormalizedConstruction>,
    pub skipped: Vec<SkippedConstruction>,
    /// Ordinals removed as duplicates of an earlier construction.
    pub duplicates: Vec<usize>,
}

/// List every problem with a raw construction against a sentence of `len` tokens.
pub fn validate(ordinal: usize, raw: &RawConstruction, len: usize) -> Vec<ExcerptError> {
    let mut problems = Vec::new();

    if ConstructionType::parse(&raw.kind).is_none() {
        problems.push(ExcerptError::UnknownType {
            ordinal,
            value: raw.kind.clone(),
        });
    }

    match (raw.start, raw.end) {
        (Some(start), Some(end)) => {
            if let Err(e) = check_span(ordinal, start, end, len) {
                problems.push(e);
            }
        }
        _ => {
            if raw.highlight_spans.as_ref().map_or(true, |h| h.is_empty()) {
                problems.push(ExcerptError::MissingSpan { ordinal });
            }
        }
    }

    if let Some(spans) = &raw.highlight_spans {
        for pair in spans {
            if let Err(e) = check_highlight(ordinal, pair, len) {
                problems.push(e);
            }
        }
    }

    problems
}

fn check_span(ordinal: usize, start: i64, end: i64, len: usize) -> Result<Span, ExcerptError> {
    let len_i = len as i64;
    if start < 0 || end < 0 || start >= len_i || end >= len_i {
        return Err(ExcerptError::SpanOutOfRange {
            ordinal,
            start,
            end,
            len,
        });
    }
    if start > end {
        return Err(ExcerptError::ReversedSpan {
            ordinal,
            start,
            end,
        });
    }
    Ok(Span::new(start as usize, end as usize))
}

fn check_highlight(ordinal: usize, pair: &[i64], len: usize) -> Result<Span, ExcerptError> {
    match pair {
        [start, end] => check_span(ordinal, *start, *end, len).map_err(|e| {
            ExcerptError::BadHighlightSpan {
                ordinal,
                detail: e.to_string(),
            }
        }),
        other => Err(ExcerptError::BadHighlightSpan {
            ordinal,
            detail: format!("expected [start, end], got {:?}", other),
        }),
    }
}

/// Normalize a single raw construction.
///
/// Bad highlight spans are dropped individually. When the primary span is
/// unusable but highlight spans survive, their envelope becomes the span.
pub fn normalize(
    ordinal: usize,
    raw: &RawConstruction,
    len: usize,
) -> Result<NormalizedConstruction, ExcerptError> {
    let construction_type =
        ConstructionType::parse(&raw.kind).ok_or_else(|| ExcerptError::UnknownType {
            ordinal,
            value: raw.kind.clone(),
        })?;

    let highlights: Vec<Span> = raw
        .highlight_spans
        .iter()
        .flatten()
        .filter_map(|pair| match check_highlight(ordinal, pair, len) {
            Ok(span) => Some(span),
            Err(e) => {
                tracing::warn!(error = %e, "dropping highlight span");
                None
            }
        })
        .collect();

    let primary = match (raw.start, raw.end) {
        (Some(start), Some(end)) => check_span(ordinal, start, end, len),
        _ => Err(ExcerptError::MissingSpan { ordinal }),
    };

    let span = match primary {
        Ok(span) => span,
        Err(e) => match highlights.iter().copied().reduce(|a, b| a.envelope(&b)) {
            Some(envelope) => envelope,
            None => return Err(e),
        },
    };

    let bands = if highlights.is_empty() {
        vec![span]
    } else {
        highlights
    };

    let subtype = raw.subtype.clone().filter(|s| !s.trim().is_empty());
    let kind = match construction_type {
        ConstructionType::ConditionalProtasis => ConstructionKind::Protasis(
            ConditionalLink::from_meta(raw.conditional.as_ref(), subtype.as_deref()),
        ),
        ConstructionType::ConditionalApodosis => ConstructionKind::Apodosis(
            ConditionalLink::from_meta(raw.conditional.as_ref(), subtype.as_deref()),
        ),
        ConstructionType::CumClause
        | ConstructionType::AblAbs
        | ConstructionType::IndirectStatement
        | ConstructionType::PurposeClause
        | ConstructionType::ResultClause
        | ConstructionType::RelativeClause
        | ConstructionType::SubjunctiveRelativeClause
        | ConstructionType::Gerund
        | ConstructionType::Gerundive
        | ConstructionType::GerundGerundiveFlip => ConstructionKind::Plain,
    };

    Ok(NormalizedConstruction {
        ordinal,
        construction_type,
        subtype,
        span,
        bands,
        kind,
    })
}

/// Normalize and de-duplicate every construction of a sentence.
pub fn normalize_sentence(sentence: &Sentence) -> NormalizedSentence {
    let len = sentence.tokens.len();
    let mut out = NormalizedSentence::default();
    let mut seen = HashSet::new();

    for (ordinal, raw) in sentence.constructions.iter().enumerate() {
        match normalize(ordinal, raw, len) {
            Ok(c) => {
                let key = (
                    c.construction_type,
                    c.subtype.clone(),
                    c.bands.clone(),
                    c.kind.clone(),
                );
                if seen.insert(key) {
                    out.constructions.push(c);
                } else {
                    tracing::debug!(sid = %sentence.sid, ordinal, "duplicate construction");
                    out.duplicates.push(ordinal);
                }
            }
            Err(error) => {
                tracing::warn!(sid = %sentence.sid, error = %error, "skipping construction");
                out.skipped.push(SkippedConstruction {
                    sid: sentence.sid.clone(),
                    error,
                });
            }
        }
    }

    out
}

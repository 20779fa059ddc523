//! Target extraction: matchable units derived from tagged constructions.

use crate::construction::{normalize_sentence, ConstructionKind, NormalizedConstruction, SkippedConstruction};
use crate::mastery::{CorpusTotals, MasterySet};
use crate::pairing::resolve_pairs;
use crate::types::{ConstructionType, Excerpt, MasteryBucket, PracticeMode, Role, Sentence, Span, UnmarkedPairing};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Identity under which a target's mastery is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MasteryKey {
    pub bucket: MasteryBucket,
    pub id: String,
}

/// A matchable unit derived from a construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub sid: String,
    pub construction_type: ConstructionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_key: Option<String>,
    /// Correct conditional label for the target's pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub span: Span,
    pub bands: Vec<Span>,
    pub tokens: BTreeSet<usize>,
    pub mastery: MasteryKey,
}

impl Target {
    pub fn is_conditional(&self) -> bool {
        self.role.is_some()
    }

    /// Typed key: the construction bucket and the target's own id.
    pub fn typed_key(&self) -> MasteryKey {
        MasteryKey {
            bucket: MasteryBucket::Construction(self.construction_type),
            id: self.id.clone(),
        }
    }

    /// Key under which this target is tracked in `mode`.
    ///
    /// Conditional sides are tracked per pair only when the mode grades
    /// pairs; elsewhere they are ordinary typed targets.
    pub fn mastery_key_in(&self, mode: PracticeMode) -> MasteryKey {
        if self.is_conditional() && !mode.pairs_conditionals() {
            self.typed_key()
        } else {
            self.mastery.clone()
        }
    }

    fn from_construction(sid: &str, c: &NormalizedConstruction, ordinal: usize) -> Self {
        let id = target_id(sid, c.construction_type, c.subtype.as_deref(), c.span, ordinal);
        Self {
            mastery: MasteryKey {
                bucket: MasteryBucket::Construction(c.construction_type),
                id: id.clone(),
            },
            id,
            sid: sid.to_string(),
            construction_type: c.construction_type,
            subtype: c.subtype.clone(),
            role: c.construction_type.role(),
            pair_key: None,
            label: None,
            span: c.span,
            tokens: c.bands.iter().flat_map(|b| b.start..=b.end).collect(),
            bands: c.bands.clone(),
        }
    }

    fn conditional(sid: &str, c: &NormalizedConstruction, ordinal: usize, pair_key: &str, label: &str) -> Self {
        let mut target = Self::from_construction(sid, c, ordinal);
        target.pair_key = Some(pair_key.to_string());
        target.label = Some(label.to_string());
        target.mastery = MasteryKey {
            bucket: MasteryBucket::Conditional(label.to_string()),
            id: pair_key.to_string(),
        };
        target
    }
}

/// Stable target id.
pub fn target_id(
    sid: &str,
    construction_type: ConstructionType,
    subtype: Option<&str>,
    span: Span,
    ordinal: usize,
) -> String {
    format!(
        "{}:{}:{}:{}#{}",
        sid,
        construction_type,
        subtype.unwrap_or("-"),
        span,
        ordinal
    )
}

/// Inputs to mastery filtering.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    /// Target ids already confirmed in the current session.
    pub confirmed: &'a HashSet<String>,
    pub mastered: &'a MasterySet,
    pub totals: &'a CorpusTotals,
    pub unmarked_pairing: UnmarkedPairing,
    /// Mode whose mastery keys apply.
    pub mode: PracticeMode,
}

/// Targets for a sentence or excerpt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub targets: Vec<Target>,
    /// Ids suppressed because they are already mastered.
    pub filtered: Vec<String>,
    pub skipped: Vec<SkippedConstruction>,
}

/// Every target of a sentence, before mastery filtering.
pub fn derive_targets(sentence: &Sentence, unmarked: UnmarkedPairing) -> (Vec<Target>, Vec<SkippedConstruction>) {
    let normalized = normalize_sentence(sentence);
    let sid = sentence.sid.as_str();

    let mut ordered: Vec<(usize, u8, Target)> = normalized
        .constructions
        .iter()
        .filter(|c| matches!(c.kind, ConstructionKind::Plain))
        .map(|c| (c.ordinal, 0, Target::from_construction(sid, c, c.ordinal)))
        .collect();

    for pair in resolve_pairs(sid, &normalized.constructions, unmarked) {
        if let Some(p) = pair.protasis {
            ordered.push((
                pair.ordinal,
                0,
                Target::conditional(sid, p, pair.ordinal, &pair.key, &pair.label),
            ));
        }
        if let Some(a) = pair.apodosis {
            ordered.push((
                pair.ordinal,
                1,
                Target::conditional(sid, a, pair.ordinal, &pair.key, &pair.label),
            ));
        }
    }

    ordered.sort_by_key(|(ordinal, side, _)| (*ordinal, *side));
    let targets = ordered.into_iter().map(|(_, _, t)| t).collect();
    (targets, normalized.skipped)
}

/// Extract the targets of one sentence, applying mastery filtering.
///
/// A target is dropped when its mastery key is mastered, no target sharing
/// that key was confirmed this session, and its bucket is not yet fully
/// mastered across the corpus. In conditionals mode the sides share their
/// pair's key, so a pair is kept or dropped as a unit.
pub fn extract_targets(sentence: &Sentence, ctx: &ExtractionContext<'_>) -> Extraction {
    let (targets, skipped) = derive_targets(sentence, ctx.unmarked_pairing);

    let keys: Vec<MasteryKey> = targets.iter().map(|t| t.mastery_key_in(ctx.mode)).collect();
    let confirmed_keys: HashSet<&MasteryKey> = targets
        .iter()
        .zip(&keys)
        .filter(|(t, _)| ctx.confirmed.contains(&t.id))
        .map(|(_, key)| key)
        .collect();

    let suppressed: Vec<bool> = keys
        .iter()
        .map(|key| !confirmed_keys.contains(key) && is_filtered_by_mastery(key, ctx))
        .collect();

    let mut out = Extraction {
        skipped,
        ..Default::default()
    };
    for (target, dropped) in targets.into_iter().zip(suppressed) {
        if dropped {
            out.filtered.push(target.id);
        } else {
            out.targets.push(target);
        }
    }
    out
}

fn is_filtered_by_mastery(key: &MasteryKey, ctx: &ExtractionContext<'_>) -> bool {
    let Some(ids) = ctx.mastered.get(&key.bucket) else {
        return false;
    };
    if !ids.contains(&key.id) {
        return false;
    }
    match ctx.totals.get(&key.bucket) {
        // Fully mastered buckets come back for review.
        Some(total) => ids.len() < *total,
        None => true,
    }
}

/// Extract the targets of every sentence of an excerpt.
pub fn extract_excerpt(excerpt: &Excerpt, ctx: &ExtractionContext<'_>) -> Extraction {
    let mut out = Extraction::default();
    for sentence in &excerpt.sentences {
        let part = extract_targets(sentence, ctx);
        out.targets.extend(part.targets);
        out.filtered.extend(part.filtered);
        out.skipped.extend(part.skipped);
    }
    tracing::debug!(
        targets = out.targets.len(),
        filtered = out.filtered.len(),
        skipped = out.skipped.len(),
        "extracted targets"
    );
    out
}

/// Count distinct mastery instances per bucket across a corpus.
///
/// Conditional sides count once under their pair bucket and once under
/// their construction type.
pub fn corpus_totals<'a, I>(excerpts: I, unmarked: UnmarkedPairing) -> CorpusTotals
where
    I: IntoIterator<Item = &'a Excerpt>,
{
    let mut instances: BTreeMap<MasteryBucket, BTreeSet<String>> = BTreeMap::new();
    for excerpt in excerpts {
        for sentence in &excerpt.sentences {
            let (targets, _) = derive_targets(sentence, unmarked);
            for t in targets {
                if t.is_conditional() {
                    let typed = t.typed_key();
                    instances.entry(typed.bucket).or_default().insert(typed.id);
                }
                instances.entry(t.mastery.bucket).or_default().insert(t.mastery.id);
            }
        }
    }
    instances.into_iter().map(|(b, ids)| (b, ids.len())).collect()
}

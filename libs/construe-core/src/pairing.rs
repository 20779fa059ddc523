//! Protasis/apodosis linkage for conditional constructions.

use crate::construction::{ConditionalLink, ConstructionKind, NormalizedConstruction};
use crate::types::{Span, UnmarkedPairing};
use std::collections::HashSet;

/// How a protasis was linked to an apodosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Both sides name the same apodosis verb.
    ApodosisVerb,
    /// The apodosis lists the protasis among the protases it answers.
    SharedApodosis,
    /// Neither side carries verb indices.
    Unmarked,
}

/// Decide whether a protasis and a candidate apodosis belong together.
///
/// Checks, in order: equal explicit apodosis verb indices; membership of
/// either protasis-side verb in the apodosis's `protasis_verb_indexes`; and,
/// only when neither side has any verb data, the `unmarked` fallback.
pub fn link(
    protasis: &ConditionalLink,
    apodosis: &ConditionalLink,
    unmarked: UnmarkedPairing,
) -> Option<Linkage> {
    if let (Some(p), Some(a)) = (protasis.apodosis_verb, apodosis.apodosis_verb) {
        return (p == a).then_some(Linkage::ApodosisVerb);
    }

    if !apodosis.protasis_verb_indexes.is_empty() {
        let listed = [protasis.protasis_verb, protasis.apodosis_verb]
            .iter()
            .flatten()
            .any(|v| apodosis.protasis_verb_indexes.contains(v));
        return listed.then_some(Linkage::SharedApodosis);
    }

    if !protasis.has_verb_data() && !apodosis.has_verb_data() {
        return match unmarked {
            UnmarkedPairing::Permissive => Some(Linkage::Unmarked),
            UnmarkedPairing::Strict => None,
        };
    }

    None
}

/// Boolean form of [`link`].
pub fn matches(
    protasis: &ConditionalLink,
    apodosis: &ConditionalLink,
    unmarked: UnmarkedPairing,
) -> bool {
    link(protasis, apodosis, unmarked).is_some()
}

/// Verb indices identifying a pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerbLink {
    pub protasis: Option<usize>,
    pub apodosis: Option<usize>,
}

/// Deterministic key for a pair.
///
/// Uses verb indices when either side has one, span positions otherwise.
/// A protasis without its own verb index is identified by its span, so
/// protases sharing an apodosis verb still get distinct keys.
pub fn pair_key(sid: &str, protasis: Option<Span>, apodosis: Option<Span>, verbs: VerbLink) -> String {
    fn part<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| "_".to_string(), |v| v.to_string())
    }

    match (verbs.protasis, verbs.apodosis, protasis) {
        (Some(pv), av, _) => format!("{}#v{}~{}", sid, pv, part(av)),
        (None, Some(av), Some(span)) => format!("{}#v_@{}~{}", sid, span, av),
        (None, Some(av), None) => format!("{}#v_~{}", sid, av),
        (None, None, _) => format!("{}#s{}~{}", sid, part(protasis), part(apodosis)),
    }
}

/// A protasis and, when present, its apodosis.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPair<'a> {
    pub key: String,
    /// Ordinal used for the ids of both sides.
    pub ordinal: usize,
    pub label: String,
    pub protasis: Option<&'a NormalizedConstruction>,
    pub apodosis: Option<&'a NormalizedConstruction>,
    pub linkage: Option<Linkage>,
}

impl ResolvedPair<'_> {
    pub fn is_solo(&self) -> bool {
        self.protasis.is_none() || self.apodosis.is_none()
    }
}

/// Pair every conditional construction of one sentence.
///
/// Verb-linked apodoses may be shared by several protases; an unmarked
/// apodosis is claimed by at most one protasis. Apodoses nobody claims
/// become solo pairs.
pub fn resolve_pairs<'a>(
    sid: &str,
    constructions: &'a [NormalizedConstruction],
    unmarked: UnmarkedPairing,
) -> Vec<ResolvedPair<'a>> {
    let protases: Vec<(&NormalizedConstruction, &ConditionalLink)> = constructions
        .iter()
        .filter_map(|c| match &c.kind {
            ConstructionKind::Protasis(link) => Some((c, link)),
            _ => None,
        })
        .collect();
    let apodoses: Vec<(&NormalizedConstruction, &ConditionalLink)> = constructions
        .iter()
        .filter_map(|c| match &c.kind {
            ConstructionKind::Apodosis(link) => Some((c, link)),
            _ => None,
        })
        .collect();

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut pairs = Vec::new();

    for (prot, plink) in &protases {
        let verb_match = apodoses.iter().find_map(|(apod, alink)| {
            match link(plink, alink, UnmarkedPairing::Strict) {
                Some(l) => Some((*apod, *alink, l)),
                None => None,
            }
        });
        let found = verb_match.or_else(|| {
            apodoses
                .iter()
                .filter(|(apod, _)| !claimed.contains(&apod.ordinal))
                .find_map(|(apod, alink)| match link(plink, alink, unmarked) {
                    Some(Linkage::Unmarked) => Some((*apod, *alink, Linkage::Unmarked)),
                    _ => None,
                })
        });

        let pair = match found {
            Some((apod, alink, linkage)) => {
                claimed.insert(apod.ordinal);
                let verbs = VerbLink {
                    protasis: plink.protasis_verb,
                    apodosis: alink.apodosis_verb.or(plink.apodosis_verb),
                };
                ResolvedPair {
                    key: pair_key(sid, Some(prot.span), Some(apod.span), verbs),
                    ordinal: prot.ordinal,
                    label: plink.label.clone(),
                    protasis: Some(*prot),
                    apodosis: Some(apod),
                    linkage: Some(linkage),
                }
            }
            None => {
                tracing::debug!(sid, ordinal = prot.ordinal, "solo protasis");
                let verbs = VerbLink {
                    protasis: plink.protasis_verb,
                    apodosis: None,
                };
                ResolvedPair {
                    key: pair_key(sid, Some(prot.span), None, verbs),
                    ordinal: prot.ordinal,
                    label: plink.label.clone(),
                    protasis: Some(*prot),
                    apodosis: None,
                    linkage: None,
                }
            }
        };
        pairs.push(pair);
    }

    for (apod, alink) in &apodoses {
        if claimed.contains(&apod.ordinal) {
            continue;
        }
        let verbs = VerbLink {
            protasis: None,
            apodosis: alink.apodosis_verb,
        };
        pairs.push(ResolvedPair {
            key: pair_key(sid, None, Some(apod.span), verbs),
            ordinal: apod.ordinal,
            label: alink.label.clone(),
            protasis: None,
            apodosis: Some(*apod),
            linkage: None,
        });
    }

    pairs
}

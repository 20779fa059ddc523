//! Span matching for learner selections.

use crate::targets::Target;
use crate::types::{EffectiveSettings, Role, Span, Token};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Positional tolerance for a selection to count as a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Maximum distance between selection and band edges, per edge.
    pub max_edge_drift: usize,
    /// Minimum share of the band covered by the selection.
    pub min_overlap_ratio: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            max_edge_drift: 2,
            min_overlap_ratio: 0.5,
        }
    }
}

impl From<&EffectiveSettings> for Tolerance {
    fn from(settings: &EffectiveSettings) -> Self {
        Self {
            max_edge_drift: settings.max_edge_drift,
            min_overlap_ratio: settings.min_overlap_ratio,
        }
    }
}

/// Which targets are eligible with respect to the found set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundFilter {
    Exclude,
    Include,
    Only,
}

/// Restrictions on which targets a selection may match.
#[derive(Debug, Clone, Copy)]
pub struct MatchScope<'a> {
    pub found: &'a HashSet<String>,
    pub found_filter: FoundFilter,
    /// Pair keys a locked selection may land on.
    pub pair_keys: Option<&'a [String]>,
    pub role: Option<Role>,
}

impl<'a> MatchScope<'a> {
    /// Unfound targets only, unrestricted.
    pub fn unfound(found: &'a HashSet<String>) -> Self {
        Self {
            found,
            found_filter: FoundFilter::Exclude,
            pair_keys: None,
            role: None,
        }
    }

    pub fn with_found_filter(mut self, filter: FoundFilter) -> Self {
        self.found_filter = filter;
        self
    }

    /// Restrict to one side of the given pairs.
    pub fn locked_to(mut self, pair_keys: &'a [String], role: Role) -> Self {
        self.pair_keys = Some(pair_keys);
        self.role = Some(role);
        self
    }

    fn admits(&self, target: &Target) -> bool {
        let is_found = self.found.contains(&target.id);
        let found_ok = match self.found_filter {
            FoundFilter::Exclude => !is_found,
            FoundFilter::Include => true,
            FoundFilter::Only => is_found,
        };
        found_ok
            && self
                .pair_keys
                .map_or(true, |keys| keys.iter().any(|k| target.pair_key.as_ref() == Some(k)))
            && self.role.map_or(true, |role| target.role == Some(role))
    }
}

/// Distance of a selection from one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanScore {
    pub start_drift: usize,
    pub end_drift: usize,
    pub overlap_ratio: f64,
}

impl SpanScore {
    pub fn total(&self) -> usize {
        self.start_drift + self.end_drift
    }

    pub fn within(&self, tolerance: &Tolerance) -> bool {
        self.start_drift <= tolerance.max_edge_drift
            && self.end_drift <= tolerance.max_edge_drift
            && self.overlap_ratio >= tolerance.min_overlap_ratio
    }
}

/// Score a selection against a band.
pub fn score_band(selection: Span, band: Span) -> SpanScore {
    SpanScore {
        start_drift: selection.start.abs_diff(band.start),
        end_drift: selection.end.abs_diff(band.end),
        overlap_ratio: selection.overlap(&band) as f64 / band.len() as f64,
    }
}

/// A target admitted by the tolerance model.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a> {
    pub target: &'a Target,
    pub band: Span,
    pub score: SpanScore,
    /// Encounter order (target position, then band position).
    pub order: (usize, usize),
}

impl MatchCandidate<'_> {
    /// Lower total drift wins; ties go to the earlier encounter.
    pub fn rank(&self, other: &Self) -> Ordering {
        self.score
            .total()
            .cmp(&other.score.total())
            .then(self.order.cmp(&other.order))
    }
}

/// Drop punctuation tokens from both ends of a selection.
///
/// A selection made only of punctuation is returned unchanged.
pub fn trim_punctuation(tokens: &[Token], selection: Span) -> Span {
    let is_punct = |i: usize| tokens.get(i).map_or(false, Token::is_punctuation);
    let mut start = selection.start;
    let mut end = selection.end;
    while start < end && is_punct(start) {
        start += 1;
    }
    while end > start && is_punct(end) {
        end -= 1;
    }
    if start == end && is_punct(start) {
        return selection;
    }
    Span::new(start, end)
}

/// Every target of sentence `sid` matched by `selection`, best first.
pub fn candidates<'a>(
    sid: &str,
    selection: Span,
    targets: &'a [Target],
    scope: &MatchScope<'_>,
    tolerance: &Tolerance,
) -> Vec<MatchCandidate<'a>> {
    let mut out = Vec::new();
    for (ti, target) in targets.iter().enumerate() {
        if target.sid != sid || !scope.admits(target) {
            continue;
        }
        let best = target
            .bands
            .iter()
            .enumerate()
            .map(|(bi, band)| MatchCandidate {
                target,
                band: *band,
                score: score_band(selection, *band),
                order: (ti, bi),
            })
            .filter(|c| c.score.within(tolerance))
            .min_by(|a, b| a.rank(b));
        if let Some(c) = best {
            out.push(c);
        }
    }
    out.sort_by(|a, b| a.rank(b));
    out
}

/// The single best target for a selection, if any.
pub fn best_match<'a>(
    sid: &str,
    selection: Span,
    targets: &'a [Target],
    scope: &MatchScope<'_>,
    tolerance: &Tolerance,
) -> Option<MatchCandidate<'a>> {
    let best = candidates(sid, selection, targets, scope, tolerance)
        .into_iter()
        .next();
    if let Some(c) = &best {
        tracing::debug!(
            target_id = %c.target.id,
            start_drift = c.score.start_drift,
            end_drift = c.score.end_drift,
            overlap = c.score.overlap_ratio,
            "selection matched"
        );
    }
    best
}

//! Dominant caption style detection.
//!
//! Documents tend to stick to one caption form ("Fig. 3." vs "Figure 3:"). The
//! estimator tallies which rule recognised each caption on the first few pages
//! and reports the most frequent rule per kind.

use super::CaptionRule;
use crate::types::{CaptionAnnotation, CaptionKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The most frequent rule for one caption kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionStyle {
    pub kind: CaptionKind,
    /// Position of the rule in the configured rule list.
    pub rule: usize,
    pub pattern: String,
    /// Captions of this kind recognised by the rule within the sampled pages.
    pub matches: usize,
}

#[derive(Debug, Clone)]
pub struct CaptionStyleEstimator {
    sample_pages: usize,
    counts: IndexMap<(CaptionKind, usize), usize>,
}

impl CaptionStyleEstimator {
    pub fn new(sample_pages: usize) -> Self {
        Self {
            sample_pages,
            counts: IndexMap::new(),
        }
    }

    /// Record the captions found on `page`. Pages past the sample window are ignored.
    pub fn observe<'a, I>(&mut self, page: usize, captions: I)
    where
        I: IntoIterator<Item = &'a CaptionAnnotation>,
    {
        if page >= self.sample_pages {
            return;
        }
        for caption in captions {
            *self.counts.entry((caption.kind, caption.rule)).or_insert(0) += 1;
        }
    }

    /// Dominant style per kind, figures first. Ties go to the earlier rule.
    pub fn finish(self, rules: &[CaptionRule]) -> Vec<CaptionStyle> {
        let mut best: IndexMap<CaptionKind, (usize, usize)> = IndexMap::new();

        for (&(kind, rule), &count) in &self.counts {
            best.entry(kind)
                .and_modify(|(best_rule, best_count)| {
                    if count > *best_count || (count == *best_count && rule < *best_rule) {
                        *best_rule = rule;
                        *best_count = count;
                    }
                })
                .or_insert((rule, count));
        }

        best.sort_keys();

        best.into_iter()
            .filter_map(|(kind, (rule, matches))| {
                let pattern = rules.get(rule)?.pattern.clone();
                Some(CaptionStyle {
                    kind,
                    rule,
                    pattern,
                    matches,
                })
            })
            .collect()
    }
}

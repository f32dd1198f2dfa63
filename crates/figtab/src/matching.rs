//! Cluster-to-caption assignment.
//!
//! Candidate pairs are ranked by vertical gap (ascending), horizontal overlap
//! (descending) and caption number (ascending), then assigned greedily so that each
//! cluster and each caption is used at most once.

use crate::types::{CaptionAnnotation, CaptionKind, ElementCluster};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Where a caption may sit relative to its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionDirection {
    Either,
    Above,
    Below,
}

impl CaptionDirection {
    fn admits(&self, cluster: &ElementCluster, caption: &CaptionAnnotation) -> bool {
        let below = caption.bbox.y0 >= cluster.bbox.y1;
        let above = caption.bbox.y1 <= cluster.bbox.y0;
        // A caption that overlaps the cluster vertically sits on neither side.
        let overlapping = !below && !above;
        match self {
            CaptionDirection::Either => true,
            CaptionDirection::Above => above || overlapping,
            CaptionDirection::Below => below || overlapping,
        }
    }
}

/// Candidate window for the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Minimum shared x-range over the narrower width, in `[0, 1]`.
    pub min_overlap_ratio: f64,
    /// Maximum vertical gap as a fraction of the page height.
    pub max_gap_fraction: f64,
    pub figure_direction: CaptionDirection,
    pub table_direction: CaptionDirection,
}

impl MatchingConfig {
    pub fn direction_for(&self, kind: CaptionKind) -> CaptionDirection {
        match kind {
            CaptionKind::Figure => self.figure_direction,
            CaptionKind::Table => self.table_direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub cluster: Arc<ElementCluster>,
    pub caption: Arc<CaptionAnnotation>,
    pub gap: f64,
    pub overlap: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// In assignment order.
    pub pairs: Vec<MatchedPair>,
    /// Input order.
    pub unmatched_clusters: Vec<Arc<ElementCluster>>,
    /// Input order.
    pub unmatched_captions: Vec<Arc<CaptionAnnotation>>,
}

struct Candidate {
    cluster: usize,
    caption: usize,
    gap: f64,
    overlap: f64,
}

#[derive(Debug, Clone)]
pub struct CaptionMatcher {
    config: MatchingConfig,
}

impl CaptionMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Match clusters and captions of a page whose height is `page_height`.
    pub fn match_page(
        &self,
        clusters: Vec<Arc<ElementCluster>>,
        captions: Vec<Arc<CaptionAnnotation>>,
        page_height: f64,
    ) -> MatchOutcome {
        let max_gap = self.config.max_gap_fraction * page_height;

        let mut candidates: Vec<Candidate> = Vec::new();
        for (ci, cluster) in clusters.iter().enumerate() {
            for (ai, caption) in captions.iter().enumerate() {
                if cluster.page != caption.page {
                    continue;
                }
                if !self.config.direction_for(caption.kind).admits(cluster, caption) {
                    continue;
                }
                let overlap = cluster.bbox.horizontal_overlap_ratio(&caption.bbox);
                if overlap < self.config.min_overlap_ratio {
                    continue;
                }
                let gap = cluster.bbox.vertical_gap(&caption.bbox);
                if gap > max_gap {
                    continue;
                }
                candidates.push(Candidate {
                    cluster: ci,
                    caption: ai,
                    gap,
                    overlap,
                });
            }
        }

        candidates.sort_by(|a, b| {
            rank(
                (a.gap, a.overlap, captions[a.caption].index),
                (b.gap, b.overlap, captions[b.caption].index),
            )
            .then(a.caption.cmp(&b.caption))
            .then(a.cluster.cmp(&b.cluster))
        });

        let mut cluster_taken = vec![false; clusters.len()];
        let mut caption_taken = vec![false; captions.len()];
        let mut pairs = Vec::new();

        for candidate in &candidates {
            if cluster_taken[candidate.cluster] || caption_taken[candidate.caption] {
                continue;
            }
            cluster_taken[candidate.cluster] = true;
            caption_taken[candidate.caption] = true;
            pairs.push(MatchedPair {
                cluster: Arc::clone(&clusters[candidate.cluster]),
                caption: Arc::clone(&captions[candidate.caption]),
                gap: candidate.gap,
                overlap: candidate.overlap,
            });
        }

        let unmatched_clusters = clusters
            .into_iter()
            .zip(cluster_taken)
            .filter_map(|(cluster, taken)| (!taken).then_some(cluster))
            .collect();
        let unmatched_captions = captions
            .into_iter()
            .zip(caption_taken)
            .filter_map(|(caption, taken)| (!taken).then_some(caption))
            .collect();

        tracing::debug!(
            candidates = candidates.len(),
            matched = pairs.len(),
            "Matched clusters to captions"
        );

        MatchOutcome {
            pairs,
            unmatched_clusters,
            unmatched_captions,
        }
    }
}

/// Candidate order over `(gap, overlap, caption index)`. Input positions break any
/// remaining tie.
fn rank(a: (f64, f64, u32), b: (f64, f64, u32)) -> Ordering {
    a.0.total_cmp(&b.0).then(b.1.total_cmp(&a.1)).then(a.2.cmp(&b.2))
}

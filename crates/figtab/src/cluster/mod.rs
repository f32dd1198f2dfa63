//! Grouping of drawing primitives into connected clusters.
//!
//! Two primitives are adjacent when their boxes, each grown by `epsilon` on every
//! side, intersect (touching counts). Clusters are the connected components of that
//! relation, computed with a disjoint-set forest. Candidate pairs come from an R-tree
//! over the grown boxes and are confirmed with the exact closed-interval test, so the
//! result is identical to comparing every pair.
//!
//! Output order is canonical: members are sorted by their boxes and clusters by
//! their union boxes. Permuting the input therefore yields the same clusters.

pub mod union_find;

pub use union_find::UnionFind;

use crate::geometry::Rect;
use crate::types::{DrawingPrimitive, ElementCluster};
use rstar::{AABB, RTree, RTreeObject};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
struct GrownEnvelope {
    aabb: AABB<[f64; 2]>,
    id: usize,
}

impl RTreeObject for GrownEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Index envelope of a grown box.
///
/// Infinite corners saturate to `±f64::MAX` and inverted corners are normalized, so
/// the envelope always covers every box the exact test can accept. A NaN corner
/// fails every comparison, so such a box is left out of the index.
fn to_aabb(rect: &Rect) -> Option<AABB<[f64; 2]>> {
    let corners = [rect.x0, rect.y0, rect.x1, rect.y1];
    if corners.iter().any(|c| c.is_nan()) {
        return None;
    }
    let [x0, y0, x1, y1] = corners.map(|c| c.clamp(-f64::MAX, f64::MAX));
    Some(AABB::from_corners([x0, y0], [x1, y1]))
}

/// Connected-component clusterer for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementClusterer {
    epsilon: f64,
}

impl ElementClusterer {
    /// Negative or NaN tolerances are treated as zero. An infinite tolerance joins
    /// every finite primitive into one cluster.
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.max(0.0),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Cluster the primitives of a single page using the spatial index.
    pub fn cluster(&self, primitives: &[DrawingPrimitive]) -> Vec<ElementCluster> {
        if primitives.is_empty() {
            return Vec::new();
        }

        let grown: Vec<Rect> = primitives.iter().map(|p| p.bbox.expand(self.epsilon)).collect();

        let envelopes: Vec<GrownEnvelope> = grown
            .iter()
            .enumerate()
            .filter_map(|(id, rect)| to_aabb(rect).map(|aabb| GrownEnvelope { aabb, id }))
            .collect();
        let tree = RTree::bulk_load(envelopes.clone());

        let mut forest = UnionFind::new(primitives.len());
        for envelope in &envelopes {
            for candidate in tree.locate_in_envelope_intersecting(&envelope.aabb) {
                if candidate.id > envelope.id && grown[envelope.id].intersects(&grown[candidate.id]) {
                    forest.union(envelope.id, candidate.id);
                }
            }
        }

        let clusters = collect_clusters(primitives, &mut forest);
        tracing::debug!(
            primitives = primitives.len(),
            clusters = clusters.len(),
            epsilon = self.epsilon,
            "Clustered drawing primitives"
        );
        clusters
    }

    /// Reference clustering that tests every pair. Quadratic; used to verify the
    /// indexed path and for very small pages.
    pub fn cluster_pairwise(&self, primitives: &[DrawingPrimitive]) -> Vec<ElementCluster> {
        let grown: Vec<Rect> = primitives.iter().map(|p| p.bbox.expand(self.epsilon)).collect();
        let mut forest = UnionFind::new(primitives.len());

        for i in 0..grown.len() {
            for j in (i + 1)..grown.len() {
                if grown[i].intersects(&grown[j]) {
                    forest.union(i, j);
                }
            }
        }

        collect_clusters(primitives, &mut forest)
    }
}

fn compare_rects(a: &Rect, b: &Rect) -> Ordering {
    a.y0.total_cmp(&b.y0)
        .then(a.x0.total_cmp(&b.x0))
        .then(a.y1.total_cmp(&b.y1))
        .then(a.x1.total_cmp(&b.x1))
}

fn collect_clusters(primitives: &[DrawingPrimitive], forest: &mut UnionFind) -> Vec<ElementCluster> {
    let mut clusters: Vec<ElementCluster> = forest
        .groups()
        .into_iter()
        .filter_map(|group| {
            let mut members: Vec<DrawingPrimitive> = group.into_iter().map(|i| primitives[i]).collect();
            members.sort_by(|a, b| compare_rects(&a.bbox, &b.bbox).then(a.page.cmp(&b.page)));
            let page = members.first()?.page;
            ElementCluster::from_members(page, members)
        })
        .collect();

    clusters.sort_by(|a, b| {
        compare_rects(&a.bbox, &b.bbox)
            .then(a.members.len().cmp(&b.members.len()))
            .then_with(|| {
                a.members
                    .iter()
                    .zip(&b.members)
                    .map(|(x, y)| compare_rects(&x.bbox, &y.bbox))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    });

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prim(x0: f64, y0: f64, x1: f64, y1: f64) -> DrawingPrimitive {
        DrawingPrimitive::new(0, Rect::new(x0, y0, x1, y1))
    }

    #[test]
    fn test_touching_primitives_form_one_cluster() {
        let clusters = ElementClusterer::new(0.0).cluster(&[prim(0.0, 0.0, 10.0, 10.0), prim(10.0, 0.0, 20.0, 10.0)]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].bbox, Rect::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn test_gap_splits_clusters() {
        let clusters = ElementClusterer::new(0.0).cluster(&[prim(0.0, 0.0, 10.0, 10.0), prim(10.5, 0.0, 20.5, 10.0)]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_epsilon_bridges_gap() {
        // Each side grows by 0.25, closing the 0.5 gap exactly.
        let clusters =
            ElementClusterer::new(0.25).cluster(&[prim(0.0, 0.0, 10.0, 10.0), prim(10.5, 0.0, 20.5, 10.0)]);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_transitive_chain() {
        let prims = [
            prim(40.0, 0.0, 50.0, 10.0),
            prim(0.0, 0.0, 10.0, 10.0),
            prim(20.0, 0.0, 30.0, 10.0),
            prim(10.0, 0.0, 20.0, 10.0),
            prim(30.0, 0.0, 40.0, 10.0),
        ];
        let clusters = ElementClusterer::new(0.0).cluster(&prims);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].bbox, Rect::new(0.0, 0.0, 50.0, 10.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(ElementClusterer::new(1.0).cluster(&[]).is_empty());
    }

    #[test]
    fn test_order_independent() {
        let prims = vec![
            prim(0.0, 0.0, 5.0, 5.0),
            prim(100.0, 100.0, 120.0, 130.0),
            prim(5.5, 0.0, 9.0, 4.0),
            prim(119.0, 129.0, 150.0, 150.0),
            prim(300.0, 10.0, 310.0, 20.0),
        ];
        let clusterer = ElementClusterer::new(1.0);
        let forward = clusterer.cluster(&prims);
        let mut reversed = prims.clone();
        reversed.reverse();
        assert_eq!(forward, clusterer.cluster(&reversed));
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn test_matches_pairwise_reference() {
        let prims: Vec<DrawingPrimitive> = (0..60)
            .map(|i| {
                let x = ((i * 37) % 200) as f64;
                let y = ((i * 53) % 300) as f64;
                prim(x, y, x + 6.0, y + 4.0)
            })
            .collect();
        let clusterer = ElementClusterer::new(2.0);
        assert_eq!(clusterer.cluster(&prims), clusterer.cluster_pairwise(&prims));
    }

    #[test]
    fn test_invalid_box_stays_singleton() {
        let prims = [prim(0.0, 0.0, 10.0, 10.0), prim(f64::NAN, 0.0, 10.0, 10.0)];
        let clusters = ElementClusterer::new(1.0).cluster(&prims);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters.iter().map(|c| c.len()).sum::<usize>(), 2);
    }

    #[test]
    fn test_infinite_epsilon_matches_pairwise() {
        let prims = [prim(0.0, 0.0, 10.0, 10.0), prim(110.0, 0.0, 120.0, 10.0), prim(0.0, 500.0, 5.0, 505.0)];
        for epsilon in [f64::INFINITY, f64::MAX] {
            let clusterer = ElementClusterer::new(epsilon);
            let clusters = clusterer.cluster(&prims);
            assert_eq!(clusters.len(), 1);
            assert_eq!(clusters, clusterer.cluster_pairwise(&prims));
        }
    }

    #[test]
    fn test_inverted_box_matches_pairwise() {
        let prims = [prim(0.0, 0.0, 20.0, 10.0), prim(10.0, 0.0, 5.0, 10.0), prim(40.0, 0.0, 50.0, 10.0)];
        let clusterer = ElementClusterer::new(0.0);
        let clusters = clusterer.cluster(&prims);
        assert_eq!(clusters, clusterer.cluster_pairwise(&prims));
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_negative_epsilon_is_zero() {
        assert_eq!(ElementClusterer::new(-3.0).epsilon(), 0.0);
    }
}

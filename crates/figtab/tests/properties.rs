//! Property-Based Tests
//!
//! Invariants checked over generated pages:
//! - Clustering closure, partition and order independence
//! - Indexed clustering agrees with the pairwise definition
//! - Caption matching is one-to-one
//! - Filters only remove regions
//! - Region boxes contain their cluster and caption boxes

use figtab::{
    CaptionAnnotation, CaptionKind, CaptionMatcher, DrawingPrimitive, ElementCluster, ElementClusterer,
    ExtractorConfig, FilterPipeline, FilterSpec, PageContent, PageContext, Rect, Region, RegionExtractor,
    RegionKind, UnknownPolicy,
};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;

// ============================================================================
// Strategies
// ============================================================================

/// Boxes on a half-point grid, so touching edges and duplicates are common.
fn rect_strategy() -> impl Strategy<Value = Rect> {
    (0u32..1000, 0u32..1400, 0u32..80, 0u32..80).prop_map(|(x, y, w, h)| {
        let (x, y) = (x as f64 * 0.5, y as f64 * 0.5);
        Rect::new(x, y, x + w as f64 * 0.5, y + h as f64 * 0.5)
    })
}

fn primitives_strategy(max: usize) -> impl Strategy<Value = Vec<DrawingPrimitive>> {
    prop::collection::vec(rect_strategy().prop_map(|bbox| DrawingPrimitive::new(0, bbox)), 0..max)
}

fn epsilon_strategy() -> impl Strategy<Value = f64> {
    (0u32..8).prop_map(|e| e as f64 * 0.5)
}

fn caption_strategy() -> impl Strategy<Value = CaptionAnnotation> {
    (rect_strategy(), any::<bool>(), 1u32..20).prop_map(|(bbox, figure, index)| CaptionAnnotation {
        page: 0,
        kind: if figure { CaptionKind::Figure } else { CaptionKind::Table },
        index,
        bbox,
        source_text: format!("{} {}:", if figure { "Figure" } else { "Table" }, index),
        rule: 0,
    })
}

fn cmp_rect(a: &Rect, b: &Rect) -> Ordering {
    a.x0.total_cmp(&b.x0)
        .then(a.y0.total_cmp(&b.y0))
        .then(a.x1.total_cmp(&b.x1))
        .then(a.y1.total_cmp(&b.y1))
}

fn cluster_of(clusters: &[ElementCluster], primitive: &DrawingPrimitive) -> Option<usize> {
    clusters.iter().position(|c| c.members.contains(primitive))
}

// ============================================================================
// Clustering Properties
// ============================================================================

/// Property: adjacent primitives always share a cluster
#[test]
fn proptest_clustering_closure() {
    proptest!(|(primitives in primitives_strategy(60), epsilon in epsilon_strategy())| {
        let clusters = ElementClusterer::new(epsilon).cluster(&primitives);

        for a in &primitives {
            for b in &primitives {
                if a.bbox.expand(epsilon).intersects(&b.bbox.expand(epsilon)) {
                    prop_assert_eq!(cluster_of(&clusters, a), cluster_of(&clusters, b));
                }
            }
        }
    });
}

/// Property: clusters partition the input
#[test]
fn proptest_clustering_partition() {
    proptest!(|(primitives in primitives_strategy(60), epsilon in epsilon_strategy())| {
        let clusters = ElementClusterer::new(epsilon).cluster(&primitives);

        prop_assert!(clusters.iter().all(|c| !c.is_empty()));

        let mut members: Vec<Rect> = clusters.iter().flat_map(|c| c.members.iter().map(|m| m.bbox)).collect();
        let mut input: Vec<Rect> = primitives.iter().map(|p| p.bbox).collect();
        members.sort_by(cmp_rect);
        input.sort_by(cmp_rect);
        prop_assert_eq!(members, input);

        for cluster in &clusters {
            for member in &cluster.members {
                prop_assert!(cluster.bbox.contains(&member.bbox));
            }
        }
    });
}

/// Property: permuting the input yields the same clusters
#[test]
fn proptest_clustering_order_independent() {
    let shuffled = primitives_strategy(60).prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()));

    proptest!(|((primitives, permuted) in shuffled, epsilon in epsilon_strategy())| {
        let clusterer = ElementClusterer::new(epsilon);
        prop_assert_eq!(clusterer.cluster(&primitives), clusterer.cluster(&permuted));
    });
}

/// Property: the R-tree path agrees with comparing every pair
#[test]
fn proptest_indexed_matches_pairwise() {
    proptest!(ProptestConfig::with_cases(128), |(primitives in primitives_strategy(120), epsilon in epsilon_strategy())| {
        let clusterer = ElementClusterer::new(epsilon);
        prop_assert_eq!(clusterer.cluster(&primitives), clusterer.cluster_pairwise(&primitives));
    });
}

// ============================================================================
// Matching Properties
// ============================================================================

/// Property: no cluster or caption is used twice, and nothing is lost
#[test]
fn proptest_matching_is_injective() {
    proptest!(|(
        primitives in primitives_strategy(30),
        captions in prop::collection::vec(caption_strategy(), 0..12)
    )| {
        let clusters: Vec<Arc<ElementCluster>> =
            ElementClusterer::new(1.0).cluster(&primitives).into_iter().map(Arc::new).collect();
        let captions: Vec<Arc<CaptionAnnotation>> = captions.into_iter().map(Arc::new).collect();
        let (cluster_count, caption_count) = (clusters.len(), captions.len());

        let matcher = CaptionMatcher::new(ExtractorConfig::standard().matching);
        let outcome = matcher.match_page(clusters, captions, PAGE_HEIGHT);

        for (i, a) in outcome.pairs.iter().enumerate() {
            for b in &outcome.pairs[i + 1..] {
                prop_assert!(!Arc::ptr_eq(&a.cluster, &b.cluster));
                prop_assert!(!Arc::ptr_eq(&a.caption, &b.caption));
            }
        }
        prop_assert_eq!(outcome.pairs.len() + outcome.unmatched_clusters.len(), cluster_count);
        prop_assert_eq!(outcome.pairs.len() + outcome.unmatched_captions.len(), caption_count);
    });
}

// ============================================================================
// Filter Properties
// ============================================================================

/// Property: filtering only removes, and survivors are unchanged
#[test]
fn proptest_filter_monotonicity() {
    proptest!(|(
        rects in prop::collection::vec(rect_strategy(), 0..30),
        captions in prop::collection::vec(prop::option::of(caption_strategy()), 0..30)
    )| {
        let regions: Vec<Region> = rects
            .iter()
            .zip(captions.into_iter().chain(std::iter::repeat(None)))
            .map(|(&bbox, caption)| {
                let cluster = Arc::new(ElementCluster::from_members(0, vec![DrawingPrimitive::new(0, bbox)]).unwrap());
                Region::new(cluster, caption.map(|c| (Arc::new(c), 0.0)))
            })
            .collect();

        let mut specs = ExtractorConfig::standard().filters;
        specs.push(FilterSpec::Margin { top: 0.05, bottom: 0.05, left: 0.0, right: 0.0, tolerance: 2.0 });
        specs.push(FilterSpec::Unclassified { policy: UnknownPolicy::Keep });
        let pipeline = FilterPipeline::from_specs(&specs).unwrap();
        let ctx = PageContext { page: 0, width: PAGE_WIDTH, height: PAGE_HEIGHT };

        let outcome = pipeline.apply(regions.clone(), &ctx);

        prop_assert!(outcome.kept.len() <= regions.len());
        prop_assert_eq!(outcome.kept.len() + outcome.removed.len(), regions.len());
        for kept in &outcome.kept {
            prop_assert!(regions.contains(kept));
        }
    });
}

// ============================================================================
// Assembly Properties
// ============================================================================

/// Property: every region box covers its cluster and caption
#[test]
fn proptest_region_contains_sources() {
    let text_strategy = (rect_strategy(), 0usize..4, 1u32..9).prop_map(|(bbox, form, n)| {
        let text = match form {
            0 => format!("Figure {}: generated", n),
            1 => format!("Fig. {}. generated", n),
            2 => format!("Table {}: generated", n),
            _ => format!("body text {}", n),
        };
        (bbox, text)
    });

    proptest!(ProptestConfig::with_cases(128), |(
        primitives in primitives_strategy(40),
        texts in prop::collection::vec(text_strategy, 0..8)
    )| {
        let mut config = ExtractorConfig::standard();
        config.filters.retain(|f| !matches!(f, FilterSpec::Unclassified { .. }));
        let extractor = RegionExtractor::new(config).unwrap();

        let mut page = PageContent::new(0, PAGE_WIDTH, PAGE_HEIGHT);
        page.primitives = primitives;
        for (bbox, text) in texts {
            page = page.with_text(bbox, text);
        }

        let result = extractor.extract_page(&page).unwrap();
        for region in &result.regions {
            prop_assert!(region.bbox.contains(&region.source_cluster.bbox));
            if let Some(caption) = &region.caption {
                prop_assert!(region.bbox.contains(&caption.bbox));
                prop_assert_eq!(region.kind, RegionKind::from(caption.kind));
            }
        }
    });
}

//! Per-page orchestration and document-level extraction.
//!
//! For each page: recognize captions, drop primitives that leave the page, cluster
//! the rest, match clusters to captions, build provisional regions, filter, then
//! number the survivors per kind in reading order. Pages share nothing, so a document is decoded sequentially
//! through its [`PageSource`] and the decoded pages are processed in parallel.

use crate::caption::{CaptionRecognizer, CaptionStyleEstimator};
use crate::cluster::ElementClusterer;
use crate::config::ExtractorConfig;
use crate::error::{DecodeError, FigtabError, Result};
use crate::filters::{FilterPipeline, PageContext, RegionFilter};
use crate::geometry::Rect;
use crate::matching::CaptionMatcher;
use crate::result::{DocumentResult, PageError};
use crate::source::{PageSource, validate_page};
use crate::types::{DrawingPrimitive, PageContent, PageResult, Region, RegionKind};
use ahash::AHashMap;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

/// The configured pipeline.
///
/// Construction validates the whole configuration, so a built extractor never fails
/// for configuration reasons while processing pages.
///
/// # Example
///
/// ```rust
/// use figtab::{ExtractorConfig, PageContent, Rect, RegionExtractor, RegionKind};
///
/// let extractor = RegionExtractor::new(ExtractorConfig::standard()).unwrap();
/// let page = PageContent::new(0, 612.0, 792.0)
///     .with_primitive(Rect::new(100.0, 100.0, 300.0, 300.0))
///     .with_text(Rect::new(100.0, 305.0, 300.0, 317.0), "Figure 1: Overview");
///
/// let result = extractor.extract_page(&page).unwrap();
/// assert_eq!(result.count(RegionKind::Figure), 1);
/// assert_eq!(result.regions[0].file_stem(), "page_1_figure_1");
/// ```
#[derive(Debug, Clone)]
pub struct RegionExtractor {
    config: ExtractorConfig,
    recognizer: CaptionRecognizer,
    clusterer: ElementClusterer,
    matcher: CaptionMatcher,
    filters: FilterPipeline,
}

impl RegionExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate_settings()?;

        let recognizer = CaptionRecognizer::new(&config.captions)?;
        let clusterer = ElementClusterer::new(config.clustering.epsilon);
        let matcher = CaptionMatcher::new(config.matching.clone());
        let filters = FilterPipeline::from_specs(&config.filters)?;

        Ok(Self {
            config,
            recognizer,
            clusterer,
            matcher,
            filters,
        })
    }

    /// Append a custom filter after the configured ones.
    pub fn with_filter(mut self, filter: Arc<dyn RegionFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn recognizer(&self) -> &CaptionRecognizer {
        &self.recognizer
    }

    pub fn filters(&self) -> &FilterPipeline {
        &self.filters
    }

    /// Run the full pipeline over one decoded page.
    pub fn extract_page(&self, content: &PageContent) -> std::result::Result<PageResult, DecodeError> {
        let _span = tracing::debug_span!("page", page = content.page).entered();

        validate_page(content)?;

        let captions: Vec<_> = self
            .recognizer
            .recognize_all(&content.text_blocks)
            .into_iter()
            .map(Arc::new)
            .collect();
        let page_rect = Rect::page(content.width, content.height);
        let on_page: Vec<DrawingPrimitive> = content
            .primitives
            .iter()
            .filter(|p| p.bbox.overflow(&page_rect) <= self.config.clustering.page_tolerance)
            .copied()
            .collect();
        let clusters: Vec<_> = self.clusterer.cluster(&on_page).into_iter().map(Arc::new).collect();

        tracing::debug!(
            primitives = content.primitives.len(),
            off_page = content.primitives.len() - on_page.len(),
            text_blocks = content.text_blocks.len(),
            captions = captions.len(),
            clusters = clusters.len(),
            "Decoded page analysed"
        );

        let outcome = self.matcher.match_page(clusters, captions, content.height);

        let mut provisional: Vec<Region> = outcome
            .pairs
            .into_iter()
            .map(|pair| Region::new(pair.cluster, Some((pair.caption, pair.gap))))
            .collect();
        provisional.extend(outcome.unmatched_clusters.into_iter().map(|cluster| Region::new(cluster, None)));
        provisional.sort_by(|a, b| reading_order(&a.bbox, &b.bbox));

        let ctx = PageContext {
            page: content.page,
            width: content.width,
            height: content.height,
        };
        let filtered = self.filters.apply(provisional, &ctx);

        let mut unmatched_captions = outcome.unmatched_captions;
        let mut discarded_clusters = Vec::with_capacity(filtered.removed.len());
        for removed in filtered.removed {
            discarded_clusters.push(removed.region.source_cluster);
            if let Some(caption) = removed.region.caption {
                unmatched_captions.push(caption);
            }
        }
        unmatched_captions.sort_by(|a, b| reading_order(&a.bbox, &b.bbox));
        discarded_clusters.sort_by(|a, b| reading_order(&a.bbox, &b.bbox));

        let mut regions = filtered.kept;
        assign_indexes(&mut regions);

        tracing::debug!(
            regions = regions.len(),
            unmatched_captions = unmatched_captions.len(),
            discarded_clusters = discarded_clusters.len(),
            "Page assembled"
        );

        Ok(PageResult {
            page: content.page,
            width: content.width,
            height: content.height,
            regions,
            unmatched_captions,
            discarded_clusters,
            primitive_count: content.primitives.len(),
            text_block_count: content.text_blocks.len(),
        })
    }

    /// Process already-decoded pages in parallel. Decode failures are recorded, not raised.
    pub fn extract_pages(&self, pages: Vec<std::result::Result<PageContent, DecodeError>>) -> Result<DocumentResult> {
        let outcomes: Vec<std::result::Result<PageResult, DecodeError>> = self.run_parallel(|| {
            pages
                .into_par_iter()
                .map(|page| page.and_then(|content| self.extract_page(&content)))
                .collect()
        })?;

        let mut document = DocumentResult::default();
        let mut estimator = CaptionStyleEstimator::new(self.config.estimation.sample_pages);

        for outcome in outcomes {
            match outcome {
                Ok(page) => {
                    estimator.observe(page.page, page.captions());
                    document.pages.push(page);
                }
                Err(error) => {
                    tracing::warn!(page = error.page(), error = %error, "Page could not be processed");
                    document.errors.push(PageError {
                        page: error.page(),
                        error,
                    });
                }
            }
        }

        document.pages.sort_by_key(|p| p.page);
        document.errors.sort_by_key(|e| e.page);
        document.caption_styles = estimator.finish(&self.config.captions);

        tracing::debug!(
            pages = document.pages.len(),
            failed = document.errors.len(),
            "Document extraction complete"
        );

        Ok(document)
    }

    /// Read every page of `source` on the calling thread, then process them in parallel.
    pub fn extract_document<S>(&self, source: &mut S) -> Result<DocumentResult>
    where
        S: PageSource + ?Sized,
    {
        let count = source.page_count();
        let pages: Vec<_> = (0..count).map(|page| source.load_page(page)).collect();
        self.extract_pages(pages)
    }

    fn run_parallel<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match self.config.max_threads {
            None => Ok(work()),
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("figtab-page-{}", i))
                    .build()
                    .map_err(|e| {
                        FigtabError::configuration_with_source(format!("Failed to build thread pool: {}", e), e)
                    })?;
                Ok(pool.install(work))
            }
        }
    }
}

fn reading_order(a: &Rect, b: &Rect) -> Ordering {
    a.y0.total_cmp(&b.y0).then(a.x0.total_cmp(&b.x0))
}

/// Number regions 1.. per kind in ascending top coordinate.
fn assign_indexes(regions: &mut [Region]) {
    regions.sort_by(|a, b| reading_order(&a.bbox, &b.bbox));

    let mut next: AHashMap<RegionKind, u32> = AHashMap::new();
    for region in regions.iter_mut() {
        let counter = next.entry(region.kind).or_insert(0);
        *counter += 1;
        region.index = *counter;
    }
}

//! Document-level results and the query surface over them.

use crate::caption::CaptionStyle;
use crate::error::{DecodeError, Result};
use crate::types::{CaptionAnnotation, ElementCluster, PageResult, Region, RegionKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A page that could not be processed, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageError {
    pub page: usize,
    pub error: DecodeError,
}

/// Counts for one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: usize,
    pub figures: usize,
    pub tables: usize,
    pub unknown: usize,
    pub primitives: usize,
    pub text_blocks: usize,
    pub unmatched_captions: usize,
    pub discarded_clusters: usize,
}

impl PageSummary {
    pub fn from_page(result: &PageResult) -> Self {
        Self {
            page: result.page,
            figures: result.count(RegionKind::Figure),
            tables: result.count(RegionKind::Table),
            unknown: result.count(RegionKind::Unknown),
            primitives: result.primitive_count,
            text_blocks: result.text_block_count,
            unmatched_captions: result.unmatched_captions.len(),
            discarded_clusters: result.discarded_clusters.len(),
        }
    }
}

/// Totals over every successfully processed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub pages: usize,
    pub failed_pages: usize,
    pub figures: usize,
    pub tables: usize,
    pub unknown: usize,
    pub unmatched_captions: usize,
    pub discarded_clusters: usize,
}

/// Output of [`RegionExtractor::extract_document`](crate::RegionExtractor::extract_document).
///
/// Successful pages are kept in page order. Failed pages appear only in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub pages: Vec<PageResult>,
    pub errors: Vec<PageError>,
    /// Dominant caption rule per kind over the leading pages.
    pub caption_styles: Vec<CaptionStyle>,
}

impl DocumentResult {
    pub fn page(&self, page: usize) -> Option<&PageResult> {
        self.pages
            .binary_search_by_key(&page, |p| p.page)
            .ok()
            .map(|i| &self.pages[i])
    }

    /// Regions filtered by page and/or kind, in page then reading order.
    pub fn regions(&self, page: Option<usize>, kind: Option<RegionKind>) -> Vec<&Region> {
        self.pages
            .iter()
            .filter(|p| page.is_none_or(|wanted| p.page == wanted))
            .flat_map(|p| p.regions.iter())
            .filter(|r| kind.is_none_or(|wanted| r.kind == wanted))
            .collect()
    }

    /// Captions no surviving region claimed, optionally restricted to one page.
    pub fn unmatched_captions(&self, page: Option<usize>) -> Vec<&Arc<CaptionAnnotation>> {
        self.pages
            .iter()
            .filter(|p| page.is_none_or(|wanted| p.page == wanted))
            .flat_map(|p| p.unmatched_captions.iter())
            .collect()
    }

    /// Clusters that did not become a surviving region, optionally restricted to one page.
    pub fn discarded_clusters(&self, page: Option<usize>) -> Vec<&Arc<ElementCluster>> {
        self.pages
            .iter()
            .filter(|p| page.is_none_or(|wanted| p.page == wanted))
            .flat_map(|p| p.discarded_clusters.iter())
            .collect()
    }

    pub fn page_summary(&self, page: usize) -> Option<PageSummary> {
        self.page(page).map(PageSummary::from_page)
    }

    pub fn summaries(&self) -> Vec<PageSummary> {
        self.pages.iter().map(PageSummary::from_page).collect()
    }

    pub fn totals(&self) -> DocumentTotals {
        self.summaries().iter().fold(
            DocumentTotals {
                failed_pages: self.errors.len(),
                ..DocumentTotals::default()
            },
            |mut totals, s| {
                totals.pages += 1;
                totals.figures += s.figures;
                totals.tables += s.tables;
                totals.unknown += s.unknown;
                totals.unmatched_captions += s.unmatched_captions;
                totals.discarded_clusters += s.discarded_clusters;
                totals
            },
        )
    }

    pub fn errors(&self) -> &[PageError] {
        &self.errors
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

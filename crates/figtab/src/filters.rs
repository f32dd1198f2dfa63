//! Region filters.
//!
//! Filters run in configured order and each one sees only what the previous ones
//! kept. A filter decides through a keep mask and never gets mutable access to a
//! region, so filtering can only remove regions and never alters a survivor.

use crate::error::{FigtabError, Result};
use crate::geometry::Rect;
use crate::types::{Region, RegionKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Page facts a filter may consult.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageContext {
    pub page: usize,
    pub width: f64,
    pub height: f64,
}

impl PageContext {
    pub fn page_rect(&self) -> Rect {
        Rect::page(self.width, self.height)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

pub trait RegionFilter: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Per-region decision.
    fn keep(&self, region: &Region, ctx: &PageContext) -> bool;

    /// Keep mask over the whole surviving set. Filters that compare regions with
    /// each other override this; the default asks [`keep`](Self::keep) per region.
    fn select(&self, regions: &[Region], ctx: &PageContext) -> Vec<bool> {
        regions.iter().map(|region| self.keep(region, ctx)).collect()
    }
}

/// What to do with clusters that no caption claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    Drop,
    Keep,
}

/// Serializable description of a standard filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum FilterSpec {
    Size { min_area: f64, max_page_fraction: f64 },
    AspectRatio { max_ratio: f64 },
    /// Band widths are fractions of the page dimension; `tolerance` is in page units.
    Margin {
        top: f64,
        bottom: f64,
        left: f64,
        right: f64,
        tolerance: f64,
    },
    MinHeight { min_height: f64 },
    Boundary { tolerance: f64 },
    DuplicateOverlap { iou_threshold: f64 },
    Unclassified { policy: UnknownPolicy },
}

fn require(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok { Ok(()) } else { Err(FigtabError::configuration(message())) }
}

fn finite_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn fraction(value: f64) -> bool {
    finite_non_negative(value) && value <= 1.0
}

impl FilterSpec {
    pub fn validate(&self) -> Result<()> {
        match *self {
            FilterSpec::Size {
                min_area,
                max_page_fraction,
            } => {
                require(finite_non_negative(min_area), || {
                    format!("size.min_area must be a non-negative number, got {}", min_area)
                })?;
                require(max_page_fraction.is_finite() && max_page_fraction > 0.0, || {
                    format!(
                        "size.max_page_fraction must be a positive number, got {}",
                        max_page_fraction
                    )
                })
            }
            FilterSpec::AspectRatio { max_ratio } => require(max_ratio.is_finite() && max_ratio >= 1.0, || {
                format!("aspect_ratio.max_ratio must be at least 1, got {}", max_ratio)
            }),
            FilterSpec::Margin {
                top,
                bottom,
                left,
                right,
                tolerance,
            } => {
                for (name, value) in [("top", top), ("bottom", bottom), ("left", left), ("right", right)] {
                    require(fraction(value), || {
                        format!("margin.{} must be a page fraction in [0, 1], got {}", name, value)
                    })?;
                }
                require(finite_non_negative(tolerance), || {
                    format!("margin.tolerance must be a non-negative number, got {}", tolerance)
                })
            }
            FilterSpec::MinHeight { min_height } => require(finite_non_negative(min_height), || {
                format!("min_height.min_height must be a non-negative number, got {}", min_height)
            }),
            FilterSpec::Boundary { tolerance } => require(finite_non_negative(tolerance), || {
                format!("boundary.tolerance must be a non-negative number, got {}", tolerance)
            }),
            FilterSpec::DuplicateOverlap { iou_threshold } => require(fraction(iou_threshold), || {
                format!(
                    "duplicate_overlap.iou_threshold must be in [0, 1], got {}",
                    iou_threshold
                )
            }),
            FilterSpec::Unclassified { .. } => Ok(()),
        }
    }

    pub fn build(&self) -> Arc<dyn RegionFilter> {
        match *self {
            FilterSpec::Size {
                min_area,
                max_page_fraction,
            } => Arc::new(SizeFilter {
                min_area,
                max_page_fraction,
            }),
            FilterSpec::AspectRatio { max_ratio } => Arc::new(AspectRatioFilter { max_ratio }),
            FilterSpec::Margin {
                top,
                bottom,
                left,
                right,
                tolerance,
            } => Arc::new(MarginFilter {
                top,
                bottom,
                left,
                right,
                tolerance,
            }),
            FilterSpec::MinHeight { min_height } => Arc::new(MinHeightFilter { min_height }),
            FilterSpec::Boundary { tolerance } => Arc::new(BoundaryFilter { tolerance }),
            FilterSpec::DuplicateOverlap { iou_threshold } => Arc::new(DuplicateOverlapFilter { iou_threshold }),
            FilterSpec::Unclassified { policy } => Arc::new(UnclassifiedFilter { policy }),
        }
    }
}

/// Drops regions below `min_area` or above `max_page_fraction` of the page area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeFilter {
    pub min_area: f64,
    pub max_page_fraction: f64,
}

impl RegionFilter for SizeFilter {
    fn name(&self) -> &str {
        "size"
    }

    fn keep(&self, region: &Region, ctx: &PageContext) -> bool {
        let area = region.bbox.area();
        area >= self.min_area && area <= self.max_page_fraction * ctx.area()
    }
}

/// Drops slivers whose long side exceeds `max_ratio` times the short side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatioFilter {
    pub max_ratio: f64,
}

impl RegionFilter for AspectRatioFilter {
    fn name(&self) -> &str {
        "aspect_ratio"
    }

    fn keep(&self, region: &Region, _ctx: &PageContext) -> bool {
        let (w, h) = (region.bbox.width(), region.bbox.height());
        let (long, short) = (w.max(h), w.min(h));
        if long <= 0.0 {
            return true;
        }
        short > 0.0 && long / short <= self.max_ratio
    }
}

/// Drops regions reaching into a header, footer or side band by more than `tolerance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginFilter {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
    pub tolerance: f64,
}

impl RegionFilter for MarginFilter {
    fn name(&self) -> &str {
        "margin"
    }

    fn keep(&self, region: &Region, ctx: &PageContext) -> bool {
        let b = &region.bbox;
        let intrusion = (self.top * ctx.height - b.y0)
            .max(b.y1 - (1.0 - self.bottom) * ctx.height)
            .max(self.left * ctx.width - b.x0)
            .max(b.x1 - (1.0 - self.right) * ctx.width);
        intrusion <= self.tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinHeightFilter {
    pub min_height: f64,
}

impl RegionFilter for MinHeightFilter {
    fn name(&self) -> &str {
        "min_height"
    }

    fn keep(&self, region: &Region, _ctx: &PageContext) -> bool {
        region.bbox.height() >= self.min_height
    }
}

/// Drops regions that leave the page by more than `tolerance` page units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryFilter {
    pub tolerance: f64,
}

impl RegionFilter for BoundaryFilter {
    fn name(&self) -> &str {
        "boundary"
    }

    fn keep(&self, region: &Region, ctx: &PageContext) -> bool {
        region.bbox.overflow(&ctx.page_rect()) <= self.tolerance
    }
}

/// Keeps the larger of any two regions whose IoU exceeds the threshold.
///
/// Regions are visited by descending area (input order on ties); a region is dropped
/// when it overlaps any already kept region above the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateOverlapFilter {
    pub iou_threshold: f64,
}

impl RegionFilter for DuplicateOverlapFilter {
    fn name(&self) -> &str {
        "duplicate_overlap"
    }

    fn keep(&self, _region: &Region, _ctx: &PageContext) -> bool {
        true
    }

    fn select(&self, regions: &[Region], _ctx: &PageContext) -> Vec<bool> {
        let mut order: Vec<usize> = (0..regions.len()).collect();
        order.sort_by(|&a, &b| regions[b].bbox.area().total_cmp(&regions[a].bbox.area()));

        let mut mask = vec![false; regions.len()];
        let mut kept: Vec<&Rect> = Vec::new();
        for i in order {
            let bbox = &regions[i].bbox;
            if kept.iter().all(|k| k.iou(bbox) <= self.iou_threshold) {
                mask[i] = true;
                kept.push(bbox);
            }
        }
        mask
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnclassifiedFilter {
    pub policy: UnknownPolicy,
}

impl RegionFilter for UnclassifiedFilter {
    fn name(&self) -> &str {
        "unclassified"
    }

    fn keep(&self, region: &Region, _ctx: &PageContext) -> bool {
        match self.policy {
            UnknownPolicy::Keep => true,
            UnknownPolicy::Drop => region.kind != RegionKind::Unknown,
        }
    }
}

/// A region removed by a named filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub filter: String,
    pub region: Region,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<Region>,
    pub removed: Vec<Removed>,
}

/// Ordered chain of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn RegionFilter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and build every spec, keeping their order.
    pub fn from_specs(specs: &[FilterSpec]) -> Result<Self> {
        let filters = specs
            .iter()
            .map(|spec| {
                spec.validate()?;
                Ok(spec.build())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    pub fn push(&mut self, filter: Arc<dyn RegionFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn apply(&self, regions: Vec<Region>, ctx: &PageContext) -> FilterOutcome {
        let mut kept = regions;
        let mut removed = Vec::new();

        for filter in &self.filters {
            let mask = filter.select(&kept, ctx);
            let before = kept.len();

            let mut survivors = Vec::with_capacity(before);
            for (region, keep) in kept.into_iter().zip(mask.into_iter().chain(std::iter::repeat(true))) {
                if keep {
                    survivors.push(region);
                } else {
                    removed.push(Removed {
                        filter: filter.name().to_string(),
                        region,
                    });
                }
            }
            kept = survivors;

            if kept.len() != before {
                tracing::debug!(
                    page = ctx.page,
                    filter = filter.name(),
                    removed = before - kept.len(),
                    remaining = kept.len(),
                    "Filter removed regions"
                );
            }
        }

        FilterOutcome { kept, removed }
    }
}

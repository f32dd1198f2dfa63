//! Rasterizer boundary and crop planning.
//!
//! Planning is pure: every surviving region becomes a [`CropRequest`] whose rectangle
//! is the region box grown by a padding and clipped to the page. Drawing pixels is
//! left to a [`Rasterizer`] implementation.

use crate::error::{FigtabError, Result};
use crate::geometry::Rect;
use crate::result::DocumentResult;
use crate::types::{PageResult, RegionKind};
use serde::{Deserialize, Serialize};

/// Produces raster images for page areas.
pub trait Rasterizer {
    type Image;

    /// Render `rect` (page units) of page `page` at `scale` pixels per page unit.
    fn crop(&self, page: usize, rect: &Rect, scale: f64) -> Result<Self::Image>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CropOptions {
    /// Page units added on every side before clipping to the page.
    pub padding: f64,
    /// Pixels per page unit.
    pub scale: f64,
}

impl CropOptions {
    /// 10pt padding at 3x.
    pub const fn standard() -> Self {
        Self {
            padding: 10.0,
            scale: 3.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(FigtabError::configuration(format!(
                "crop padding must be a non-negative number, got {}",
                self.padding
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(FigtabError::configuration(format!(
                "crop scale must be a positive number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRequest {
    pub page: usize,
    pub kind: RegionKind,
    pub rect: Rect,
    pub scale: f64,
    pub file_stem: String,
}

impl CropRequest {
    /// Pixel rectangle `(x0, y0, x1, y1)` in the page raster at this request's scale.
    pub fn pixel_bounds(&self) -> (u32, u32, u32, u32) {
        let px = |v: f64| (v * self.scale).max(0.0) as u32;
        (px(self.rect.x0), px(self.rect.y0), px(self.rect.x1), px(self.rect.y1))
    }
}

/// Crop requests for one page, in region order. Empty crops are skipped.
pub fn plan_page_crops(page: &PageResult, options: &CropOptions) -> Vec<CropRequest> {
    let bounds = Rect::page(page.width, page.height);

    page.regions
        .iter()
        .filter_map(|region| {
            let rect = region.bbox.expand(options.padding).clamp_to(&bounds);
            if rect.width() <= 0.0 || rect.height() <= 0.0 {
                tracing::debug!(page = page.page, stem = %region.file_stem(), "Skipping empty crop");
                return None;
            }
            Some(CropRequest {
                page: page.page,
                kind: region.kind,
                rect,
                scale: options.scale,
                file_stem: region.file_stem(),
            })
        })
        .collect()
}

/// Crop requests for every page of a document.
pub fn plan_crops(result: &DocumentResult, options: &CropOptions) -> Vec<CropRequest> {
    result
        .pages
        .iter()
        .flat_map(|page| plan_page_crops(page, options))
        .collect()
}

#[derive(Debug, Clone)]
pub struct RenderedCrop<I> {
    pub request: CropRequest,
    pub image: I,
}

#[derive(Debug)]
pub struct CropFailure {
    pub request: CropRequest,
    pub error: FigtabError,
}

#[derive(Debug)]
pub struct RenderReport<I> {
    pub crops: Vec<RenderedCrop<I>>,
    pub failures: Vec<CropFailure>,
}

/// Drive the rasterizer over a plan. A failed crop is reported and does not stop the rest.
pub fn render_crops<R: Rasterizer>(rasterizer: &R, plan: &[CropRequest]) -> RenderReport<R::Image> {
    let mut crops = Vec::with_capacity(plan.len());
    let mut failures = Vec::new();

    for request in plan {
        match rasterizer.crop(request.page, &request.rect, request.scale) {
            Ok(image) => crops.push(RenderedCrop {
                request: request.clone(),
                image,
            }),
            Err(error) => {
                tracing::warn!(page = request.page, stem = %request.file_stem, error = %error, "Crop failed");
                failures.push(CropFailure {
                    request: request.clone(),
                    error,
                });
            }
        }
    }

    RenderReport { crops, failures }
}

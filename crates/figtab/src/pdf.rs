//! PDF decoding and rasterization through `pdfium-render`.
//!
//! Requires the `pdf` feature and a system Pdfium library.
//!
//! ```rust,no_run
//! use figtab::pdf::{PdfiumPageSource, PdfiumRasterizer};
//! use figtab::render::{CropOptions, plan_crops, render_crops};
//! use figtab::{ExtractorConfig, RegionExtractor};
//!
//! # fn example() -> figtab::Result<()> {
//! let bytes = std::fs::read("paper.pdf")?;
//! let mut source = PdfiumPageSource::from_bytes(&bytes, None)?;
//! let extractor = RegionExtractor::new(ExtractorConfig::standard())?;
//! let document = extractor.extract_document(&mut source)?;
//!
//! let rasterizer = PdfiumRasterizer::new(bytes, None)?;
//! let report = render_crops(&rasterizer, &plan_crops(&document, &CropOptions::standard()));
//! for crop in report.crops {
//!     crop.image.save(format!("{}.png", crop.request.file_stem)).ok();
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{DecodeError, FigtabError, Result};
use crate::geometry::Rect;
use crate::render::Rasterizer;
use crate::source::{PageSource, TextSegment, group_segments_into_blocks};
use crate::types::{DrawingPrimitive, PageContent};
use image::DynamicImage;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use std::sync::{Arc, Mutex};

enum BindingState {
    Uninitialized,
    Ready,
    Failed(String),
}

static PDFIUM_STATE: Lazy<Mutex<BindingState>> = Lazy::new(|| Mutex::new(BindingState::Uninitialized));

/// Bind to the system Pdfium library, remembering a failed first attempt.
fn bind_pdfium(context: &'static str) -> Result<Pdfium> {
    let mut state = PDFIUM_STATE
        .lock()
        .map_err(|e| FigtabError::decode(format!("Failed to acquire lock on Pdfium state ({}): {}", context, e)))?;

    if let BindingState::Failed(err) = &*state {
        return Err(FigtabError::decode(format!(
            "Pdfium initialization previously failed ({}): {}",
            context, err
        )));
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            *state = BindingState::Ready;
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            if matches!(*state, BindingState::Uninitialized) {
                *state = BindingState::Failed(e.to_string());
            }
            Err(FigtabError::decode(format!("Pdfium initialization failed ({}): {}", context, e)))
        }
    }
}

fn load_error(err: PdfiumError) -> FigtabError {
    let message = err.to_string();
    if message.contains("password") || message.contains("Password") {
        FigtabError::decode(format!("PDF is password-protected or the password is wrong: {}", message))
    } else {
        FigtabError::decode(format!("Invalid PDF: {}", message))
    }
}

/// Form objects nested deeper than this are not searched for paths.
const MAX_FORM_DEPTH: usize = 16;

/// PDF points with a bottom-left origin to page units with a top-left origin.
fn flip(left: f32, top: f32, right: f32, bottom: f32, page_height: f64) -> Rect {
    Rect::new(
        left as f64,
        page_height - top as f64,
        right as f64,
        page_height - bottom as f64,
    )
}

/// Affine map `[a b c d e f]` in PDF convention: `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine([f64; 6]);

impl Affine {
    const IDENTITY: Affine = Affine([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Map applying `inner` first, then `self`.
    fn compose(&self, inner: &Affine) -> Affine {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = inner.0;
        Affine([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    /// Bounding box of the mapped rectangle, in PDF coordinates (left, bottom, right, top).
    fn map_bounds(&self, left: f64, bottom: f64, right: f64, top: f64) -> (f64, f64, f64, f64) {
        let corners = [
            self.apply(left, bottom),
            self.apply(right, bottom),
            self.apply(left, top),
            self.apply(right, top),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

fn form_matrix(object: &PdfPageObject) -> Affine {
    object
        .matrix()
        .map(|m| {
            Affine([
                m.a() as f64,
                m.b() as f64,
                m.c() as f64,
                m.d() as f64,
                m.e() as f64,
                m.f() as f64,
            ])
        })
        .unwrap_or(Affine::IDENTITY)
}

/// Push the page-space box of every path under `object`, descending into form objects.
///
/// Bounds of objects inside a form are in the form's space, so they are mapped through
/// the accumulated form matrices before the y-flip.
fn collect_paths(
    object: &PdfPageObject,
    to_page: &Affine,
    depth: usize,
    index: usize,
    height: f64,
    out: &mut Vec<DrawingPrimitive>,
) -> std::result::Result<(), DecodeError> {
    match object {
        PdfPageObject::Path(_) => {
            let bounds = object.bounds().map_err(|e| DecodeError::Corrupt {
                page: index,
                message: format!("Failed to read path bounds: {}", e),
            })?;
            let (left, bottom, right, top) = to_page.map_bounds(
                bounds.left().value as f64,
                bounds.bottom().value as f64,
                bounds.right().value as f64,
                bounds.top().value as f64,
            );
            let bbox = flip(left as f32, top as f32, right as f32, bottom as f32, height);
            out.push(DrawingPrimitive::new(index, bbox));
        }
        PdfPageObject::XObjectForm(form) => {
            if depth >= MAX_FORM_DEPTH {
                tracing::debug!(page = index, depth, "Form nesting too deep, skipping");
                return Ok(());
            }
            let inner = to_page.compose(&form_matrix(object));
            for child_index in 0..form.len() {
                let child = form.get(child_index).map_err(|e| DecodeError::Corrupt {
                    page: index,
                    message: format!("Failed to read form object {}: {}", child_index, e),
                })?;
                collect_paths(&child, &inner, depth + 1, index, height, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn decode_page(index: usize, page: &PdfPage) -> std::result::Result<PageContent, DecodeError> {
    let width = page.width().value as f64;
    let height = page.height().value as f64;
    let mut content = PageContent::new(index, width, height);

    for object in page.objects().iter() {
        collect_paths(&object, &Affine::IDENTITY, 0, index, height, &mut content.primitives)?;
    }

    let text = page.text().map_err(|e| DecodeError::Unsupported {
        page: index,
        message: format!("Failed to get page text: {}", e),
    })?;

    let segments: Vec<TextSegment> = text
        .segments()
        .iter()
        .map(|segment| {
            let bounds = segment.bounds();
            TextSegment {
                bbox: flip(
                    bounds.left().value,
                    bounds.top().value,
                    bounds.right().value,
                    bounds.bottom().value,
                    height,
                ),
                text: segment.text(),
            }
        })
        .collect();
    content.text_blocks = group_segments_into_blocks(index, &segments);

    tracing::debug!(
        page = index,
        primitives = content.primitives.len(),
        text_blocks = content.text_blocks.len(),
        "Decoded PDF page"
    );

    Ok(content)
}

/// Every page of a PDF, decoded up front on the calling thread.
///
/// A page that fails to decode is stored as its [`DecodeError`] and reported when
/// loaded; the rest of the document stays usable.
#[derive(Debug, Clone)]
pub struct PdfiumPageSource {
    pages: Vec<std::result::Result<PageContent, DecodeError>>,
}

impl PdfiumPageSource {
    pub fn from_bytes(bytes: &[u8], password: Option<&str>) -> Result<Self> {
        let pdfium = bind_pdfium("page decoding")?;
        let document = pdfium.load_pdf_from_byte_slice(bytes, password).map_err(load_error)?;

        let pages = document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| decode_page(index, &page))
            .collect();

        Ok(Self { pages })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>, password: Option<&str>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes, password)
    }
}

impl PageSource for PdfiumPageSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&mut self, page: usize) -> std::result::Result<PageContent, DecodeError> {
        self.pages
            .get(page)
            .cloned()
            .unwrap_or(Err(DecodeError::PageNotFound { page }))
    }
}

struct RenderedPage {
    page: usize,
    scale_bits: u64,
    image: Arc<DynamicImage>,
}

/// The most recently rendered page.
///
/// Crop plans are ordered by page, so holding one page renders each page once per plan.
#[derive(Default)]
struct LastPage(Mutex<Option<RenderedPage>>);

impl LastPage {
    fn get_or_render<F>(&self, page: usize, scale: f64, render: F) -> Result<Arc<DynamicImage>>
    where
        F: FnOnce() -> Result<DynamicImage>,
    {
        let mut cached = self
            .0
            .lock()
            .map_err(|e| FigtabError::rendering(format!("Failed to acquire lock on page cache: {}", e)))?;

        let scale_bits = scale.to_bits();
        if let Some(hit) = cached.as_ref().filter(|c| c.page == page && c.scale_bits == scale_bits) {
            return Ok(Arc::clone(&hit.image));
        }

        let image = Arc::new(render()?);
        *cached = Some(RenderedPage {
            page,
            scale_bits,
            image: Arc::clone(&image),
        });
        Ok(image)
    }
}

/// Cut `rect` (page units) out of a page image rendered at `scale`.
fn crop_rendered(image: &DynamicImage, page: usize, rect: &Rect, scale: f64) -> Result<DynamicImage> {
    let px = |v: f64, limit: u32| ((v * scale).max(0.0) as u32).min(limit);
    let (x0, y0) = (px(rect.x0, image.width()), px(rect.y0, image.height()));
    let (x1, y1) = (px(rect.x1, image.width()), px(rect.y1, image.height()));
    if x1 <= x0 || y1 <= y0 {
        return Err(FigtabError::rendering(format!(
            "Crop {:?} is empty at scale {} on page {}",
            rect, scale, page
        )));
    }

    Ok(image.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

/// Renders pages with Pdfium and crops the requested area.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    bytes: Vec<u8>,
    password: Option<String>,
    last_page: LastPage,
}

impl PdfiumRasterizer {
    pub fn new(bytes: Vec<u8>, password: Option<String>) -> Result<Self> {
        let pdfium = bind_pdfium("page rendering")?;
        Ok(Self {
            pdfium,
            bytes,
            password,
            last_page: LastPage::default(),
        })
    }

    fn render_page(&self, page: usize, scale: f64) -> Result<DynamicImage> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, self.password.as_deref())
            .map_err(load_error)?;

        let index = u16::try_from(page).map_err(|_| FigtabError::rendering(format!("Page {} not found", page)))?;
        let pdf_page = document
            .pages()
            .get(index)
            .map_err(|_| FigtabError::rendering(format!("Page {} not found", page)))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(scale as f32);
        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|e| FigtabError::rendering(format!("Failed to render page {}: {}", page, e)))?;

        tracing::debug!(page, scale, "Rendered PDF page");
        Ok(DynamicImage::ImageRgb8(bitmap.as_image().into_rgb8()))
    }
}

impl Rasterizer for PdfiumRasterizer {
    type Image = DynamicImage;

    fn crop(&self, page: usize, rect: &Rect, scale: f64) -> Result<Self::Image> {
        let image = self
            .last_page
            .get_or_render(page, scale, || self.render_page(page, scale))?;
        crop_rendered(&image, page, rect, scale)
    }
}

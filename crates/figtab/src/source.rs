//! Decoder boundary.
//!
//! A [`PageSource`] hands out one decoded page at a time. Loading takes `&mut self`:
//! document handles are generally not thread-safe, so pages are read sequentially
//! and only the decoded copies travel to worker threads.

use crate::error::{DecodeError, FigtabError, Result};
use crate::geometry::Rect;
use crate::types::{PageContent, TextBlock};
use ahash::AHashMap;
use std::path::Path;

pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Decode page `page` (0-based).
    fn load_page(&mut self, page: usize) -> std::result::Result<PageContent, DecodeError>;
}

/// Pre-decoded pages held in memory.
///
/// Useful for replaying decoder dumps and for tests; failures can be injected per page.
#[derive(Debug, Clone, Default)]
pub struct MemoryPageSource {
    pages: Vec<PageContent>,
    failures: AHashMap<usize, DecodeError>,
}

impl MemoryPageSource {
    /// Pages are ordered by their `page` field; gaps are reported as missing pages.
    pub fn new(mut pages: Vec<PageContent>) -> Self {
        pages.sort_by_key(|p| p.page);
        Self {
            pages,
            failures: AHashMap::new(),
        }
    }

    /// Make `load_page(page)` fail with `error`.
    pub fn with_failure(mut self, page: usize, error: DecodeError) -> Self {
        self.failures.insert(page, error);
        self
    }

    /// Parse a JSON array of [`PageContent`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let pages: Vec<PageContent> = serde_json::from_str(json)?;
        Ok(Self::new(pages))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str::<Vec<PageContent>>(&content)
            .map(Self::new)
            .map_err(|e| {
                FigtabError::serialization_with_source(
                    format!("Invalid page dump {}: {}", path.as_ref().display(), e),
                    e,
                )
            })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.pages)?)
    }

    pub fn pages(&self) -> &[PageContent] {
        &self.pages
    }
}

impl PageSource for MemoryPageSource {
    fn page_count(&self) -> usize {
        let decoded = self.pages.last().map_or(0, |p| p.page + 1);
        let failed = self.failures.keys().max().map_or(0, |&p| p + 1);
        decoded.max(failed)
    }

    fn load_page(&mut self, page: usize) -> std::result::Result<PageContent, DecodeError> {
        if let Some(error) = self.failures.get(&page) {
            return Err(error.clone());
        }
        self.pages
            .binary_search_by_key(&page, |p| p.page)
            .map(|i| self.pages[i].clone())
            .map_err(|_| DecodeError::PageNotFound { page })
    }
}

/// Check that a decoded page is usable: positive finite dimensions and valid boxes.
pub fn validate_page(content: &PageContent) -> std::result::Result<(), DecodeError> {
    let page = content.page;
    let invalid = |message: String| DecodeError::InvalidGeometry { page, message };

    if !(content.width.is_finite() && content.height.is_finite() && content.width > 0.0 && content.height > 0.0) {
        return Err(invalid(format!(
            "page dimensions must be positive, got {}x{}",
            content.width, content.height
        )));
    }

    if let Some((i, p)) = content
        .primitives
        .iter()
        .enumerate()
        .find(|(_, p)| !p.bbox.is_valid() || p.page != page)
    {
        return Err(invalid(format!("primitive {} has an invalid box {:?} (page {})", i, p.bbox, p.page)));
    }

    if let Some((i, b)) = content
        .text_blocks
        .iter()
        .enumerate()
        .find(|(_, b)| !b.bbox.is_valid() || b.page != page)
    {
        return Err(invalid(format!("text block {} has an invalid box {:?} (page {})", i, b.bbox, b.page)));
    }

    Ok(())
}

/// A run of text as reported by a decoder, before layout grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub bbox: Rect,
    pub text: String,
}

/// Merge decoder text segments into lines and lines into blocks.
///
/// Segments on the same baseline that sit close together form a line; lines that
/// follow each other closely and overlap horizontally form a block. Block text joins
/// lines with `\n`, so a caption keeps its marker at the start of the block.
pub fn group_segments_into_blocks(page: usize, segments: &[TextSegment]) -> Vec<TextBlock> {
    let mut sorted: Vec<&TextSegment> = segments.iter().filter(|s| !s.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0).then(a.bbox.x0.total_cmp(&b.bbox.x0)));

    let mut lines: Vec<(Rect, String)> = Vec::new();
    for segment in sorted {
        let joined = lines.iter_mut().rev().find(|(bbox, _)| same_line(bbox, &segment.bbox));
        match joined {
            Some((bbox, text)) => {
                *bbox = bbox.union(&segment.bbox);
                text.push(' ');
                text.push_str(segment.text.trim());
            }
            None => lines.push((segment.bbox, segment.text.trim().to_string())),
        }
    }

    for (_, text) in &mut lines {
        *text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    lines.sort_by(|a, b| a.0.y0.total_cmp(&b.0.y0).then(a.0.x0.total_cmp(&b.0.x0)));

    // Each block tracks its box, the box of its last line, and its text.
    let mut blocks: Vec<(Rect, Rect, String)> = Vec::new();
    for (line_box, line_text) in lines {
        let continued = blocks
            .iter_mut()
            .find(|(_, last, _)| continues_block(last, &line_box));
        match continued {
            Some((bbox, last, text)) => {
                *bbox = bbox.union(&line_box);
                *last = line_box;
                text.push('\n');
                text.push_str(&line_text);
            }
            None => blocks.push((line_box, line_box, line_text)),
        }
    }

    blocks
        .into_iter()
        .map(|(bbox, _, text)| TextBlock::new(page, bbox, text))
        .collect()
}

fn same_line(line: &Rect, segment: &Rect) -> bool {
    let shared = line.y1.min(segment.y1) - line.y0.max(segment.y0);
    let shorter = line.height().min(segment.height());
    let horizontal_gap = (segment.x0 - line.x1).max(line.x0 - segment.x1);
    shared > 0.5 * shorter && horizontal_gap <= 2.0 * segment.height().max(line.height()).max(1.0)
}

fn continues_block(last_line: &Rect, line: &Rect) -> bool {
    let gap = line.y0 - last_line.y1;
    let line_height = last_line.height().max(line.height());
    gap >= -0.5 * line.height() && gap <= 0.6 * line_height && last_line.horizontal_overlap_ratio(line) > 0.0
}

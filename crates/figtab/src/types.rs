use crate::geometry::{Rect, union_all};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Decoder output
// ============================================================================

/// Bounding box of one vector drawing operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawingPrimitive {
    pub page: usize,
    pub bbox: Rect,
}

impl DrawingPrimitive {
    pub const fn new(page: usize, bbox: Rect) -> Self {
        Self { page, bbox }
    }
}

/// A block of text with its bounding box, as laid out by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub page: usize,
    pub bbox: Rect,
    pub text: String,
}

impl TextBlock {
    pub fn new(page: usize, bbox: Rect, text: impl Into<String>) -> Self {
        Self {
            page,
            bbox,
            text: text.into(),
        }
    }
}

/// Everything the pipeline needs from one decoded page.
///
/// `width` and `height` are the page dimensions in the same units as the boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub page: usize,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub primitives: Vec<DrawingPrimitive>,
    #[serde(default)]
    pub text_blocks: Vec<TextBlock>,
}

impl PageContent {
    pub fn new(page: usize, width: f64, height: f64) -> Self {
        Self {
            page,
            width,
            height,
            primitives: Vec::new(),
            text_blocks: Vec::new(),
        }
    }

    /// Add a primitive on this page.
    pub fn with_primitive(mut self, bbox: Rect) -> Self {
        self.primitives.push(DrawingPrimitive::new(self.page, bbox));
        self
    }

    /// Add a text block on this page.
    pub fn with_text(mut self, bbox: Rect, text: impl Into<String>) -> Self {
        self.text_blocks.push(TextBlock::new(self.page, bbox, text));
        self
    }

    pub fn page_rect(&self) -> Rect {
        Rect::page(self.width, self.height)
    }
}

// ============================================================================
// Derived model
// ============================================================================

/// Kind of element a caption announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionKind {
    Figure,
    Table,
}

impl CaptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionKind::Figure => "figure",
            CaptionKind::Table => "table",
        }
    }
}

impl fmt::Display for CaptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of an assembled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Figure,
    Table,
    /// A cluster that no caption claimed.
    Unknown,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Figure => "figure",
            RegionKind::Table => "table",
            RegionKind::Unknown => "unknown",
        }
    }
}

impl From<CaptionKind> for RegionKind {
    fn from(kind: CaptionKind) -> Self {
        match kind {
            CaptionKind::Figure => RegionKind::Figure,
            CaptionKind::Table => RegionKind::Table,
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognised "Figure N" / "Table N" marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionAnnotation {
    pub page: usize,
    pub kind: CaptionKind,
    /// Caption number, always positive.
    pub index: u32,
    pub bbox: Rect,
    /// Block text with leading whitespace removed.
    pub source_text: String,
    /// Position of the rule that recognised this caption in the configured rule list.
    pub rule: usize,
}

/// Connected group of drawing primitives on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCluster {
    pub page: usize,
    pub members: Vec<DrawingPrimitive>,
    pub bbox: Rect,
}

impl ElementCluster {
    /// Build a cluster from a non-empty member list, computing the union box.
    ///
    /// Returns `None` for an empty member list.
    pub fn from_members(page: usize, members: Vec<DrawingPrimitive>) -> Option<Self> {
        let bbox = union_all(members.iter().map(|m| &m.bbox))?;
        Some(Self { page, members, bbox })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A classified, caption-associated bounding region.
///
/// `source_cluster` and `caption` are shared with the matcher output rather than copied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub page: usize,
    pub kind: RegionKind,
    pub bbox: Rect,
    pub caption: Option<Arc<CaptionAnnotation>>,
    pub source_cluster: Arc<ElementCluster>,
    /// 1-based reading-order index within (page, kind); zero until assembly assigns it.
    pub index: u32,
    /// Vertical distance between the cluster and its caption.
    pub caption_gap: Option<f64>,
}

impl Region {
    /// Region built from a cluster and, optionally, its matched caption.
    ///
    /// The box is the union of the cluster box and the caption box.
    pub fn new(cluster: Arc<ElementCluster>, caption: Option<(Arc<CaptionAnnotation>, f64)>) -> Self {
        match caption {
            Some((caption, gap)) => Self {
                page: cluster.page,
                kind: caption.kind.into(),
                bbox: cluster.bbox.union(&caption.bbox),
                caption: Some(caption),
                source_cluster: cluster,
                index: 0,
                caption_gap: Some(gap),
            },
            None => Self {
                page: cluster.page,
                kind: RegionKind::Unknown,
                bbox: cluster.bbox,
                caption: None,
                source_cluster: cluster,
                index: 0,
                caption_gap: None,
            },
        }
    }

    /// Output name such as `page_3_figure_2`, or `page_3_unknown_1` without a caption.
    ///
    /// Page numbers in file names are 1-based.
    pub fn file_stem(&self) -> String {
        match &self.caption {
            Some(caption) => format!("page_{}_{}_{}", self.page + 1, caption.kind, caption.index),
            None => format!("page_{}_{}_{}", self.page + 1, self.kind, self.index),
        }
    }
}

/// Final per-page output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub page: usize,
    pub width: f64,
    pub height: f64,
    pub regions: Vec<Region>,
    pub unmatched_captions: Vec<Arc<CaptionAnnotation>>,
    pub discarded_clusters: Vec<Arc<ElementCluster>>,
    /// Number of drawing primitives decoded on the page.
    pub primitive_count: usize,
    /// Number of text blocks decoded on the page.
    pub text_block_count: usize,
}

impl PageResult {
    pub fn regions_of(&self, kind: RegionKind) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.kind == kind)
    }

    pub fn count(&self, kind: RegionKind) -> usize {
        self.regions_of(kind).count()
    }

    /// Every caption recognised on the page, claimed or not.
    pub fn captions(&self) -> impl Iterator<Item = &CaptionAnnotation> {
        self.regions
            .iter()
            .filter_map(|r| r.caption.as_deref())
            .chain(self.unmatched_captions.iter().map(|c| c.as_ref()))
    }
}

//! figtab - Figure and Table Region Extraction
//!
//! figtab locates figures and tables on the pages of a document from two inputs per
//! page: the bounding boxes of its vector drawing primitives and its positioned text
//! blocks. Primitives are grouped into clusters, captions such as "Figure 3:" or
//! "Table II." are recognized in the text, clusters are paired with captions, and
//! heuristic filters discard noise before the surviving regions are numbered.
//!
//! # Quick Start
//!
//! ```rust
//! use figtab::{ExtractorConfig, MemoryPageSource, PageContent, Rect, RegionExtractor, RegionKind};
//!
//! # fn main() -> figtab::Result<()> {
//! let page = PageContent::new(0, 612.0, 792.0)
//!     .with_primitive(Rect::new(72.0, 400.0, 300.0, 600.0))
//!     .with_text(Rect::new(72.0, 380.0, 300.0, 392.0), "Table 1: Results");
//!
//! let mut source = MemoryPageSource::new(vec![page]);
//! let extractor = RegionExtractor::new(ExtractorConfig::standard())?;
//! let document = extractor.extract_document(&mut source)?;
//!
//! assert_eq!(document.regions(None, Some(RegionKind::Table)).len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Captions** (`caption`): ordered pattern rules and dominant-style estimation
//! - **Clustering** (`cluster`): epsilon-proximity grouping over an R-tree
//! - **Matching** (`matching`): greedy one-to-one cluster/caption pairing
//! - **Filters** (`filters`): composable region filters built from config
//! - **Assembly** (`assembler`): per-page pipeline and parallel document runs
//! - **Rendering** (`render`, `pdf`): crop planning and the Pdfium backend
//!
//! # Features
//!
//! - `pdf`: decode PDFs and rasterize crops with `pdfium-render`

#![deny(unsafe_code)]

pub mod assembler;
pub mod caption;
pub mod cluster;
pub mod config;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod matching;
pub mod render;
pub mod result;
pub mod source;
pub mod types;

#[cfg(feature = "pdf")]
pub mod pdf;

pub use error::{DecodeError, FigtabError, Result};

pub use assembler::RegionExtractor;
pub use caption::{CaptionRecognizer, CaptionRule, CaptionStyle, NumberStyle};
pub use cluster::ElementClusterer;
pub use config::{ClusteringConfig, EstimationConfig, ExtractorConfig};
pub use filters::{FilterPipeline, FilterSpec, PageContext, RegionFilter, UnknownPolicy};
pub use geometry::Rect;
pub use matching::{CaptionDirection, CaptionMatcher, MatchingConfig};
pub use result::{DocumentResult, DocumentTotals, PageError, PageSummary};
pub use source::{MemoryPageSource, PageSource};
pub use types::{
    CaptionAnnotation, CaptionKind, DrawingPrimitive, ElementCluster, PageContent, PageResult, Region, RegionKind,
    TextBlock,
};

//! Extraction configuration.
//!
//! Every behaviour knob is a required field: a config file must spell out the full
//! pipeline, so runs are reproducible from the file alone.
//! [`ExtractorConfig::standard`] builds the stock preset in code, and the shipped
//! `config/figtab.toml` mirrors it.

use crate::caption::{CaptionRecognizer, CaptionRule};
use crate::error::{FigtabError, Result};
use crate::filters::{FilterSpec, UnknownPolicy};
use crate::matching::{CaptionDirection, MatchingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusteringConfig {
    /// Distance within which two primitive boxes count as adjacent.
    pub epsilon: f64,
    /// Primitives leaving the page rectangle by more than this are dropped before
    /// clustering, so a clipped stroke past the edge cannot drag a figure off the page.
    pub page_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimationConfig {
    /// Number of leading pages used to detect the dominant caption style.
    pub sample_pages: usize,
}

/// Full pipeline configuration.
///
/// # Example
///
/// ```rust
/// use figtab::ExtractorConfig;
///
/// let config = ExtractorConfig::from_toml_str(
///     r#"
///     captions = [{ kind = "figure", pattern = 'Figure\s*(\d+)', numbering = "decimal", case_insensitive = true }]
///     filters = [{ type = "unclassified", policy = "drop" }]
///
///     [clustering]
///     epsilon = 1.0
///     page_tolerance = 1.0
///
///     [matching]
///     min_overlap_ratio = 0.5
///     max_gap_fraction = 0.06
///     figure_direction = "either"
///     table_direction = "either"
///
///     [estimation]
///     sample_pages = 5
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.captions.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractorConfig {
    pub clustering: ClusteringConfig,
    pub matching: MatchingConfig,
    pub estimation: EstimationConfig,
    /// Ordered; the first matching rule decides.
    pub captions: Vec<CaptionRule>,
    /// Ordered; each filter sees only what earlier filters kept.
    pub filters: Vec<FilterSpec>,
    /// Worker threads for document extraction. `None` uses the global rayon pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,
}

impl ExtractorConfig {
    /// The stock preset.
    ///
    /// Filter order: boundary, size, min height, aspect ratio, duplicate overlap,
    /// then unclassified regions are dropped.
    pub fn standard() -> Self {
        Self {
            clustering: ClusteringConfig {
                epsilon: 1.0,
                page_tolerance: 1.0,
            },
            matching: MatchingConfig {
                min_overlap_ratio: 0.5,
                max_gap_fraction: 50.0 / 792.0,
                figure_direction: CaptionDirection::Either,
                table_direction: CaptionDirection::Either,
            },
            estimation: EstimationConfig { sample_pages: 5 },
            captions: CaptionRule::standard_rules(),
            filters: vec![
                FilterSpec::Boundary { tolerance: 1.0 },
                FilterSpec::Size {
                    min_area: 10.0,
                    max_page_fraction: 0.8,
                },
                FilterSpec::MinHeight { min_height: 20.0 },
                FilterSpec::AspectRatio { max_ratio: 40.0 },
                FilterSpec::DuplicateOverlap { iou_threshold: 0.8 },
                FilterSpec::Unclassified {
                    policy: UnknownPolicy::Drop,
                },
            ],
            max_threads: None,
        }
    }

    /// Check every threshold and compile every caption pattern.
    pub fn validate(&self) -> Result<()> {
        self.validate_settings()?;
        CaptionRecognizer::new(&self.captions)?;
        Ok(())
    }

    /// Check thresholds and filter specs without compiling caption patterns.
    pub(crate) fn validate_settings(&self) -> Result<()> {
        let epsilon = self.clustering.epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(FigtabError::configuration(format!(
                "clustering.epsilon must be a non-negative number, got {}",
                epsilon
            )));
        }

        let page_tolerance = self.clustering.page_tolerance;
        if !page_tolerance.is_finite() || page_tolerance < 0.0 {
            return Err(FigtabError::configuration(format!(
                "clustering.page_tolerance must be a non-negative number, got {}",
                page_tolerance
            )));
        }

        let overlap = self.matching.min_overlap_ratio;
        if !(0.0..=1.0).contains(&overlap) {
            return Err(FigtabError::configuration(format!(
                "matching.min_overlap_ratio must be in [0, 1], got {}",
                overlap
            )));
        }

        let gap = self.matching.max_gap_fraction;
        if !gap.is_finite() || gap < 0.0 {
            return Err(FigtabError::configuration(format!(
                "matching.max_gap_fraction must be a non-negative number, got {}",
                gap
            )));
        }

        if self.max_threads == Some(0) {
            return Err(FigtabError::configuration("max_threads must be at least 1"));
        }

        for spec in &self.filters {
            spec.validate()?;
        }

        Ok(())
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| FigtabError::configuration(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| FigtabError::configuration(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| FigtabError::configuration(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration, choosing the format from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("toml") => Self::from_toml_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(FigtabError::configuration(format!(
                "Unsupported config file format: {} (expected .toml, .yaml, .yml or .json)",
                path.display()
            ))),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FigtabError::configuration(format!("Invalid TOML: {}", e)))
    }

    /// Discover `figtab.toml` in the current directory or any parent.
    ///
    /// Returns `Ok(None)` when no file is found.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(FigtabError::Io)?;

        loop {
            let figtab_toml = current.join("figtab.toml");
            if figtab_toml.exists() {
                return Ok(Some(Self::from_toml_file(figtab_toml)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        FigtabError::configuration_with_source(format!("Failed to read config file {}: {}", path.display(), e), e)
    })
}

//! Caption recognition.
//!
//! A caption rule pairs a [`CaptionKind`] with a regular expression holding exactly
//! one capture group for the caption number. Rules are ordered: the first rule that
//! matches the start of a block's trimmed text decides the annotation.

pub mod estimator;
pub mod recognizer;

pub use estimator::{CaptionStyle, CaptionStyleEstimator};
pub use recognizer::CaptionRecognizer;

use crate::types::CaptionKind;
use serde::{Deserialize, Serialize};

/// How the captured caption number is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStyle {
    /// Base-10 digits.
    Decimal,
    /// Upper-case Roman numerals (`I` through `MMMCMXCIX`).
    Roman,
}

/// One entry of the ordered caption rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionRule {
    pub kind: CaptionKind,
    /// Regex matched at the start of the block text. Must contain exactly one capture group.
    pub pattern: String,
    pub numbering: NumberStyle,
    pub case_insensitive: bool,
}

impl CaptionRule {
    pub fn new(kind: CaptionKind, pattern: impl Into<String>, numbering: NumberStyle, case_insensitive: bool) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
            numbering,
            case_insensitive,
        }
    }

    /// The stock English rule set.
    ///
    /// Punctuated forms come before bare forms and full words before abbreviations.
    /// Bare decimal forms accept a subfigure letter ("Figure 3a"). Roman numeral
    /// rules come last and only accept upper-case numerals; the bare Roman forms
    /// cover IEEE-style "TABLE II" headings with the title on the next line.
    pub fn standard_rules() -> Vec<CaptionRule> {
        use CaptionKind::{Figure, Table};
        use NumberStyle::{Decimal, Roman};

        vec![
            CaptionRule::new(Figure, r"Figure\s*(\d+)\s*[:.]", Decimal, true),
            CaptionRule::new(Figure, r"Fig\.\s*(\d+)\s*[:.]", Decimal, true),
            CaptionRule::new(Table, r"Table\s*(\d+)\s*[:.]", Decimal, true),
            CaptionRule::new(Table, r"Tab\.\s*(\d+)\s*[:.]", Decimal, true),
            CaptionRule::new(Figure, r"Figure\s*(\d+)[a-z]?\b", Decimal, true),
            CaptionRule::new(Figure, r"Fig\.\s*(\d+)[a-z]?\b", Decimal, true),
            CaptionRule::new(Table, r"Table\s*(\d+)[a-z]?\b", Decimal, true),
            CaptionRule::new(Table, r"Tab\.\s*(\d+)[a-z]?\b", Decimal, true),
            CaptionRule::new(Figure, r"(?i:Figure|Fig\.)\s*([IVXLCDM]+)\s*[:.]", Roman, false),
            CaptionRule::new(Table, r"(?i:Table|Tab\.)\s*([IVXLCDM]+)\s*[:.]", Roman, false),
            CaptionRule::new(Figure, r"(?i:Figure|Fig\.)\s*([IVXLCDM]+)\b", Roman, false),
            CaptionRule::new(Table, r"(?i:Table|Tab\.)\s*([IVXLCDM]+)\b", Roman, false),
        ]
    }
}

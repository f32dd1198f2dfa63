use super::{CaptionRule, NumberStyle};
use crate::error::{FigtabError, Result};
use crate::types::{CaptionAnnotation, CaptionKind, TextBlock};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static ROMAN_NUMERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^M{0,3}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$")
        .expect("Roman numeral regex pattern is valid and should compile")
});

#[derive(Debug, Clone)]
struct CompiledRule {
    kind: CaptionKind,
    numbering: NumberStyle,
    regex: Regex,
}

/// Classifies text blocks into caption annotations using an ordered rule list.
#[derive(Debug, Clone)]
pub struct CaptionRecognizer {
    rules: Vec<CompiledRule>,
}

impl CaptionRecognizer {
    /// Compile a rule list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the list is empty, a pattern does not
    /// compile, or a pattern does not have exactly one capture group.
    pub fn new(rules: &[CaptionRule]) -> Result<Self> {
        if rules.is_empty() {
            return Err(FigtabError::configuration("Caption rule list must not be empty"));
        }

        let compiled = rules
            .iter()
            .enumerate()
            .map(|(position, rule)| {
                let anchored = format!("^(?:{})", rule.pattern);
                let regex = RegexBuilder::new(&anchored)
                    .case_insensitive(rule.case_insensitive)
                    .build()
                    .map_err(|e| {
                        FigtabError::configuration_with_source(
                            format!("Invalid caption pattern #{} '{}': {}", position, rule.pattern, e),
                            e,
                        )
                    })?;

                // captures_len counts the implicit whole-match group.
                if regex.captures_len() != 2 {
                    return Err(FigtabError::configuration(format!(
                        "Caption pattern #{} '{}' must have exactly one capture group, found {}",
                        position,
                        rule.pattern,
                        regex.captures_len() - 1
                    )));
                }

                Ok(CompiledRule {
                    kind: rule.kind,
                    numbering: rule.numbering,
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules: compiled })
    }

    /// Recognizer over [`CaptionRule::standard_rules`].
    pub fn standard() -> Result<Self> {
        Self::new(&CaptionRule::standard_rules())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Classify one block.
    ///
    /// Only the first matching rule is consulted. A number that fails to parse
    /// (overflow, bad numeral, zero) leaves the block unrecognized.
    pub fn recognize(&self, block: &TextBlock) -> Option<CaptionAnnotation> {
        let text = block.text.trim_start();

        let (position, rule, captures) = self
            .rules
            .iter()
            .enumerate()
            .find_map(|(position, rule)| rule.regex.captures(text).map(|caps| (position, rule, caps)))?;

        let raw = captures.get(1)?.as_str();
        let Some(index) = parse_number(raw, rule.numbering) else {
            tracing::debug!(
                page = block.page,
                rule = position,
                number = raw,
                "Caption rule matched but number did not parse"
            );
            return None;
        };

        Some(CaptionAnnotation {
            page: block.page,
            kind: rule.kind,
            index,
            bbox: block.bbox,
            source_text: text.to_string(),
            rule: position,
        })
    }

    /// Recognize every block, keeping input order.
    pub fn recognize_all(&self, blocks: &[TextBlock]) -> Vec<CaptionAnnotation> {
        blocks.iter().filter_map(|block| self.recognize(block)).collect()
    }
}

fn parse_number(raw: &str, numbering: NumberStyle) -> Option<u32> {
    let value = match numbering {
        NumberStyle::Decimal => raw.parse::<u32>().ok()?,
        NumberStyle::Roman => parse_roman(raw)?,
    };
    (value > 0).then_some(value)
}

/// Convert a canonical upper-case Roman numeral.
pub fn parse_roman(raw: &str) -> Option<u32> {
    if raw.is_empty() || !ROMAN_NUMERAL_REGEX.is_match(raw) {
        return None;
    }

    let digit = |c: char| match c {
        'I' => 1,
        'V' => 5,
        'X' => 10,
        'L' => 50,
        'C' => 100,
        'D' => 500,
        'M' => 1000,
        _ => 0,
    };

    let values: Vec<u32> = raw.chars().map(digit).collect();
    let mut total = 0;
    for (i, &value) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(&next) if next > value => total -= value as i64,
            _ => total += value as i64,
        }
    }
    u32::try_from(total).ok()
}

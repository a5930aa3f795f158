use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lines::{SegmentedLine, segment_lines};
use crate::types::{ExtractedLabel, LabelKind, PageFragments};

/// Caption conventions for figures, tried in order; first match wins.
/// The label number is digits plus an optional suffix letter, and must be
/// immediately followed by whitespace, `.`, or `:`.
static FIGURE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"^Figure\s+(\d+[a-zA-Z]?)[\s.:]",
        r"^Fig\.\s+(\d+[a-zA-Z]?)[\s.:]",
        r"^FIGURE\s+(\d+[a-zA-Z]?)[\s.:]",
    ])
});

/// Equation conventions: textual labels, plus a line that is nothing but a
/// parenthesized number (right-aligned display equation numbering).
static EQUATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"^Equation\s+(\d+[a-zA-Z]?)[\s.:]",
        r"^Eq\.\s+(\d+[a-zA-Z]?)[\s.:]",
        r"^\((\d+[a-zA-Z]?)\)$",
    ])
});

fn compile_patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|src| Regex::new(src).expect("label pattern must compile"))
        .collect()
}

/// Run the cascaded pattern list over a line, returning the label number
/// from the first pattern that matches.
fn match_number<'a>(patterns: &[Regex], text: &'a str) -> Option<&'a str> {
    patterns
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()))
}

fn label_from_line(
    kind: LabelKind,
    patterns: &[Regex],
    line: &SegmentedLine,
    page_number: usize,
) -> Option<ExtractedLabel> {
    let trimmed = line.text.trim();
    let number = match_number(patterns, trimmed)?;
    Some(ExtractedLabel {
        kind,
        number: number.to_string(),
        page_number,
        anchor_y: line.anchor_y,
        label_text: trimmed.to_string(),
    })
}

/// Segment one page into lines and fold any figure/equation labels into the
/// registries. A later match with the same number overwrites the earlier one.
pub fn scan_page_labels(
    page: &PageFragments,
    figures: &mut BTreeMap<String, ExtractedLabel>,
    equations: &mut BTreeMap<String, ExtractedLabel>,
) {
    for line in segment_lines(&page.fragments) {
        if let Some(label) =
            label_from_line(LabelKind::Figure, &FIGURE_PATTERNS, &line, page.page_number)
        {
            figures.insert(label.number.clone(), label);
        }
        if let Some(label) =
            label_from_line(LabelKind::Equation, &EQUATION_PATTERNS, &line, page.page_number)
        {
            equations.insert(label.number.clone(), label);
        }
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{BoundingBox, CitationKind, CitationOccurrence, PageFragments, PositionedFragment};

/// Bracketed numeric lists: [1], [1,2], [1-3], [4, 7-9].
static BRACKETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)(?:\s*[,\-–]\s*\d+)*\]").unwrap());

/// Parenthetical author-year: (Smith, 2020), (Smith et al., 2020),
/// (Smith & Jones, 2020).
static AUTHOR_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([A-Z][A-Za-z'’\-]+)(?:\s+et\s+al\.?|\s*&\s*[A-Z][A-Za-z'’\-]+)?,\s*(\d{4})\)")
        .unwrap()
});

/// Runs of Unicode superscript digits.
static SUPERSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{2070}\u{00B9}\u{00B2}\u{00B3}\u{2074}-\u{2079}]+").unwrap());

/// Fixed glyph table mapping superscript digits to ASCII digits.
const SUPERSCRIPT_DIGITS: [(char, char); 10] = [
    ('\u{2070}', '0'),
    ('\u{00B9}', '1'),
    ('\u{00B2}', '2'),
    ('\u{00B3}', '3'),
    ('\u{2074}', '4'),
    ('\u{2075}', '5'),
    ('\u{2076}', '6'),
    ('\u{2077}', '7'),
    ('\u{2078}', '8'),
    ('\u{2079}', '9'),
];

fn superscript_to_digits(text: &str) -> String {
    text.chars()
        .filter_map(|ch| {
            SUPERSCRIPT_DIGITS
                .iter()
                .find(|(glyph, _)| *glyph == ch)
                .map(|(_, digit)| *digit)
        })
        .collect()
}

fn is_superscript_run(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|ch| SUPERSCRIPT_DIGITS.iter().any(|(glyph, _)| *glyph == ch))
}

/// Classify a citation's form from the matched text's shape alone, so a
/// caller can reclassify without knowing which pattern family produced it.
pub fn classify_citation(raw_text: &str) -> CitationKind {
    if is_superscript_run(raw_text) {
        CitationKind::Superscript
    } else if raw_text.starts_with('(') {
        CitationKind::AuthorYear
    } else {
        CitationKind::Numbered
    }
}

fn occurrence(fragment: &PositionedFragment, raw_text: &str, key: String) -> CitationOccurrence {
    CitationOccurrence {
        raw_text: raw_text.to_string(),
        reference_key: key,
        kind: classify_citation(raw_text),
        page_number: fragment.page_number,
        bounding_box: BoundingBox {
            x: fragment.x,
            y: fragment.y,
            width: fragment.width,
            height: fragment.height,
        },
    }
}

fn scan_fragment(fragment: &PositionedFragment, out: &mut Vec<CitationOccurrence>) {
    for caps in BRACKETED_RE.captures_iter(&fragment.text) {
        // A multi-number list like [1,2,3] normalizes to its first number.
        let key = caps[1].to_string();
        out.push(occurrence(fragment, &caps[0], key));
    }
    for caps in AUTHOR_YEAR_RE.captures_iter(&fragment.text) {
        let key = format!("{}{}", &caps[1], &caps[2]);
        out.push(occurrence(fragment, &caps[0], key));
    }
    for m in SUPERSCRIPT_RE.find_iter(&fragment.text) {
        let key = superscript_to_digits(m.as_str());
        out.push(occurrence(fragment, m.as_str(), key));
    }
}

/// Scan one page's fragments for inline citation occurrences.
///
/// Operates directly on fragment text, not segmented lines; every textual
/// occurrence is reported independently.
pub fn find_page_citations(page: &PageFragments) -> Vec<CitationOccurrence> {
    let mut occurrences = Vec::new();
    for fragment in &page.fragments {
        scan_fragment(fragment, &mut occurrences);
    }
    occurrences
}

/// Scan a whole document. The occurrence list is produced per invocation and
/// not retained anywhere.
pub fn find_citations(pages: &[PageFragments]) -> Vec<CitationOccurrence> {
    pages.iter().flat_map(find_page_citations).collect()
}

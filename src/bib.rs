use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lines::segment_lines;
use crate::types::{BibliographyEntry, PageFragments};

/// References are assumed to sit near the end: scanning starts this many
/// pages before the last one.
pub const BIB_SCAN_WINDOW: usize = 5;

/// Headers that open a references section (exact line match, any case).
const HEADER_LINES: &[&str] = &[
    "References",
    "Bibliography",
    "Works Cited",
    "Literature Cited",
    "Literature",
    "Cited Works",
];

/// New-entry marker: optional leading `[`, digits, optional `]`, optional
/// `.`, rest of line.
static NEW_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[?(\d+)\]?\.?\s*(.*)$").unwrap());

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d{4,}/\S+").unwrap());

static ARXIV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"arXiv[:\s]*(\d{4}\.\d{4,5})").unwrap());

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// One author name: initials-then-surname ("A. Smith", "J.-P. Serre") or
/// surname-then-initials ("Smith, A.", "Smith A.").
static AUTHOR_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[A-Z]\.[-\s]?)+\s*[A-Z][A-Za-z'’-]+|[A-Z][A-Za-z'’-]+,?\s+(?:[A-Z]\.[-\s]?)+")
        .unwrap()
});

const MAX_AUTHORS: usize = 10;
const MAX_AUTHOR_REGION: usize = 200;

fn is_references_header(line: &str) -> bool {
    let trimmed = line.trim();
    HEADER_LINES.iter().any(|h| trimmed.eq_ignore_ascii_case(h))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SearchingHeader,
    InReferences,
}

#[derive(Debug)]
struct EntryDraft {
    key: String,
    text: String,
}

/// Explicit accumulator for the references scan, threaded through the page
/// loop. Bibliography entries may span page boundaries, so one scan value
/// carries the in-progress entry across pages.
#[derive(Debug)]
pub struct BibliographyScan {
    state: ScanState,
    current: Option<EntryDraft>,
    entries: BTreeMap<String, BibliographyEntry>,
}

impl Default for BibliographyScan {
    fn default() -> Self {
        Self::new()
    }
}

impl BibliographyScan {
    pub fn new() -> Self {
        Self {
            state: ScanState::SearchingHeader,
            current: None,
            entries: BTreeMap::new(),
        }
    }

    /// Feed one segmented line, in page order.
    pub fn feed_line(&mut self, line: &str) {
        match self.state {
            ScanState::SearchingHeader => {
                if is_references_header(line) {
                    // The header line itself is discarded.
                    self.state = ScanState::InReferences;
                }
            }
            ScanState::InReferences => self.feed_reference_line(line),
        }
    }

    fn feed_reference_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        if let Some(caps) = NEW_ENTRY_RE.captures(trimmed) {
            self.finalize_current();
            self.current = Some(EntryDraft {
                key: caps[1].to_string(),
                text: caps[2].trim().to_string(),
            });
        } else if let Some(draft) = self.current.as_mut() {
            if !draft.text.is_empty() {
                draft.text.push(' ');
            }
            draft.text.push_str(trimmed);
        }
    }

    fn finalize_current(&mut self) {
        if let Some(draft) = self.current.take() {
            let entry = parse_entry(&draft.key, &draft.text);
            self.entries.insert(draft.key, entry);
        }
    }

    /// Finalize any still-open entry and hand back the bibliography map.
    pub fn finish(mut self) -> BTreeMap<String, BibliographyEntry> {
        self.finalize_current();
        self.entries
    }
}

/// Scan a document's trailing pages for its bibliography.
///
/// Starts at `max(1, total_pages - 5)` and proceeds strictly in increasing
/// page order through the final page.
pub fn scan_bibliography(pages: &[PageFragments]) -> BTreeMap<String, BibliographyEntry> {
    let total_pages = pages.len();
    let start = total_pages.saturating_sub(BIB_SCAN_WINDOW).max(1);
    let mut scan = BibliographyScan::new();
    for page in pages.iter().filter(|p| p.page_number >= start) {
        for line in segment_lines(&page.fragments) {
            scan.feed_line(&line.text);
        }
    }
    scan.finish()
}

/// Heuristically parse one reference's accumulated text into sub-fields.
///
/// Each sub-parse fails independently and silently; `raw_text` is kept
/// verbatim so the entry stays usable for display either way.
pub fn parse_entry(key: &str, raw: &str) -> BibliographyEntry {
    let doi = find_doi(raw);
    let arxiv_id = find_arxiv_id(raw);
    let year_match = find_year(raw);
    let authors = extract_authors(raw, year_match.map(|(start, _)| start));
    let segments = split_segments(raw);
    let title = extract_title(raw, &segments);
    let journal = extract_journal(&segments);

    BibliographyEntry {
        key: key.to_string(),
        authors,
        title,
        year: year_match.map(|(_, year)| year),
        journal,
        doi,
        arxiv_id,
        raw_text: raw.to_string(),
    }
}

fn find_doi(raw: &str) -> Option<String> {
    let m = DOI_RE.find(raw)?;
    let trimmed = m.as_str().trim_end_matches(|c: char| ".,;)]}>".contains(c));
    Some(trimmed.to_string())
}

fn find_arxiv_id(raw: &str) -> Option<String> {
    ARXIV_RE.captures(raw).map(|caps| caps[1].to_string())
}

/// First 4-digit run starting with 19 or 20. Digit runs are enumerated so a
/// year embedded in a longer number (volume "12019") is not split out.
fn find_year(raw: &str) -> Option<(usize, u16)> {
    for m in DIGIT_RUN_RE.find_iter(raw) {
        let run = m.as_str();
        if run.len() == 4 && (run.starts_with("19") || run.starts_with("20")) {
            if let Ok(year) = run.parse::<u16>() {
                return Some((m.start(), year));
            }
        }
    }
    None
}

/// Authors come from the text preceding the year (or the first period when
/// no year parsed), capped at ten names.
fn extract_authors(raw: &str, year_start: Option<usize>) -> Vec<String> {
    let end = match year_start {
        Some(pos) => pos,
        None => match raw.find('.') {
            Some(pos) => pos,
            None => return Vec::new(),
        },
    };
    let region = &raw[..end];
    if region.len() >= MAX_AUTHOR_REGION {
        return Vec::new();
    }
    let normalized = region.replace(" and ", ", ").replace(" & ", ", ");
    AUTHOR_TOKEN_RE
        .find_iter(&normalized)
        .take(MAX_AUTHORS)
        .map(|m| m.as_str().trim().trim_end_matches(',').to_string())
        .collect()
}

/// Split on periods, except a period terminating a single-letter uppercase
/// token (an author initial), so "A. Smith, B. Jones." stays one segment.
fn split_segments(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut segments = Vec::new();
    let mut seg_start = 0;
    let mut token_start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b' ' | b'\t' => token_start = i + 1,
            b'.' => {
                let token = &raw[token_start..i];
                let is_initial = token.len() == 1 && token.as_bytes()[0].is_ascii_uppercase();
                if !is_initial {
                    segments.push(&raw[seg_start..i]);
                    seg_start = i + 1;
                }
                token_start = i + 1;
            }
            _ => {}
        }
    }
    if seg_start < raw.len() {
        segments.push(&raw[seg_start..]);
    }
    segments
}

const TITLE_MIN: usize = 10;
const TITLE_MAX: usize = 300;

fn extract_title(raw: &str, segments: &[&str]) -> Option<String> {
    // PDFs use inconsistent quoting; prefer any quoted substring.
    let quoted = extract_between_quotes(raw, '\u{201c}', '\u{201d}')
        .or_else(|| extract_between_quotes(raw, '\u{201d}', '\u{201d}'))
        .or_else(|| extract_between_quotes(raw, '"', '"'));
    if let Some(t) = quoted {
        let t = t.trim().trim_end_matches(',').trim();
        if !t.is_empty() {
            return Some(t.to_string());
        }
    }
    let second = segments.get(1)?.trim();
    if (TITLE_MIN..=TITLE_MAX).contains(&second.len()) {
        Some(second.to_string())
    } else {
        None
    }
}

fn extract_between_quotes(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)? + open.len_utf8();
    let end = text[start..].find(close)? + start;
    Some(text[start..end].to_string())
}

const JOURNAL_MAX: usize = 100;

/// Venue name: the segment after the title, with trailing numeration
/// (year, volume, pages) stripped.
fn extract_journal(segments: &[&str]) -> Option<String> {
    let seg = segments.get(2)?.trim();
    let name = seg
        .trim_end_matches(|c: char| {
            c.is_ascii_digit() || c.is_whitespace() || ",:;()–-".contains(c)
        })
        .trim();
    if name.len() >= 2 && name.len() <= JOURNAL_MAX && name.chars().any(char::is_alphabetic) {
        Some(name.to_string())
    } else {
        None
    }
}

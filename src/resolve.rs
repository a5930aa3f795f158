use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{BibliographyEntry, CitationOccurrence, ResolvedReference};

/// Author+year composite keys: letters then a 4-digit year ("Smith2020").
static AUTHOR_YEAR_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)(\d{4})$").unwrap());

/// Map a reference key to a bibliography entry via layered fallbacks,
/// stopping at the first success:
/// 1. exact key lookup;
/// 2. for keys with non-digit characters, retry on the digits alone;
/// 3. for author+year shaped keys, scan entries for an author substring
///    match plus a matching year.
///
/// No match is a normal outcome, not an error.
pub fn resolve<'a>(
    bibliography: &'a BTreeMap<String, BibliographyEntry>,
    reference_key: &str,
) -> Option<&'a BibliographyEntry> {
    if let Some(entry) = bibliography.get(reference_key) {
        return Some(entry);
    }
    if reference_key.chars().any(|c| !c.is_ascii_digit()) {
        let digits: String = reference_key
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if !digits.is_empty()
            && let Some(entry) = bibliography.get(&digits)
        {
            return Some(entry);
        }
    }
    if let Some(caps) = AUTHOR_YEAR_KEY_RE.captures(reference_key) {
        return scan_author_year(bibliography, &caps[1], &caps[2]);
    }
    None
}

fn scan_author_year<'a>(
    bibliography: &'a BTreeMap<String, BibliographyEntry>,
    author: &str,
    year_digits: &str,
) -> Option<&'a BibliographyEntry> {
    let author_lower = author.to_lowercase();
    let year: u16 = year_digits.parse().ok()?;
    bibliography.values().find(|entry| {
        let author_hit = entry.raw_text.to_lowercase().contains(&author_lower)
            || entry
                .authors
                .iter()
                .any(|a| a.to_lowercase().contains(&author_lower));
        let year_hit = entry.year == Some(year) || entry.raw_text.contains(year_digits);
        author_hit && year_hit
    })
}

/// Pair an occurrence with its entry, if any.
pub fn resolve_occurrence<'a>(
    bibliography: &'a BTreeMap<String, BibliographyEntry>,
    occurrence: CitationOccurrence,
) -> ResolvedReference<'a> {
    let entry = resolve(bibliography, &occurrence.reference_key);
    ResolvedReference { occurrence, entry }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::parse_entry;

    fn bib_with(entries: &[(&str, &str)]) -> BTreeMap<String, BibliographyEntry> {
        entries
            .iter()
            .map(|(key, raw)| (key.to_string(), parse_entry(key, raw)))
            .collect()
    }

    #[test]
    fn exact_key_wins() {
        let bib = bib_with(&[("5", "E. Exact. Direct hit. J Hit, 2015.")]);
        assert!(resolve(&bib, "5").is_some());
    }

    #[test]
    fn zero_padded_key_does_not_match_bare_numeric() {
        // "5" is pure digits, so the non-digit strip fallback never fires and
        // exact-match-first leaves "05" unreachable.
        let bib = bib_with(&[("05", "P. Padded. Lead zero. J Pad, 2016.")]);
        assert!(resolve(&bib, "5").is_none());
    }

    #[test]
    fn matching_key_convention_resolves() {
        let bib = bib_with(&[("5", "P. Plain. No padding. J Plain, 2016.")]);
        assert!(resolve(&bib, "5").is_some());
    }

    #[test]
    fn non_digit_key_strips_to_numeric() {
        let bib = bib_with(&[("12", "S. Strip. Bracket residue. J Strip, 2012.")]);
        assert_eq!(resolve(&bib, "[12]").unwrap().key, "12");
    }

    #[test]
    fn author_year_key_scans_entries() {
        let bib = bib_with(&[
            ("1", "A. Early. Unrelated work. J One, 2001."),
            ("2", "B. Smith, C. Doe. The cited paper. J Two, 2020."),
        ]);
        let entry = resolve(&bib, "Smith2020").unwrap();
        assert_eq!(entry.key, "2");
    }

    #[test]
    fn author_year_requires_both_author_and_year() {
        let bib = bib_with(&[("1", "B. Smith. Right author, wrong year. J One, 2001.")]);
        assert!(resolve(&bib, "Smith2020").is_none());
    }

    #[test]
    fn author_match_is_case_insensitive() {
        let bib = bib_with(&[("1", "D. SMITH. Shouting in print. J Caps, 2020.")]);
        assert!(resolve(&bib, "Smith2020").is_some());
    }

    #[test]
    fn year_substring_in_raw_text_suffices() {
        // Year sub-parse picked 2019 from the title, but the raw text still
        // contains the cited year.
        let entry = parse_entry("1", "E. Smith. Looking back at 2019. J Retro, 2020.");
        assert_eq!(entry.year, Some(2019));
        let bib: BTreeMap<_, _> = [("1".to_string(), entry)].into();
        assert!(resolve(&bib, "Smith2020").is_some());
    }

    #[test]
    fn unresolvable_key_is_absent_not_error() {
        let bib = bib_with(&[("1", "F. Only. The lone entry. J Lone, 2011.")]);
        let occurrence = crate::types::CitationOccurrence {
            raw_text: "[99]".to_string(),
            reference_key: "99".to_string(),
            kind: crate::types::CitationKind::Numbered,
            page_number: 1,
            bounding_box: crate::types::BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
        };
        let resolved = resolve_occurrence(&bib, occurrence);
        assert!(resolved.entry.is_none());
    }
}

//! Semantic entity extraction from a rendered document's positioned text.
//!
//! Consumes per-page [`PositionedFragment`] streams (text plus page-space
//! coordinates, as produced by a PDF renderer) and extracts figure and
//! equation labels, inline citation occurrences, and a parsed bibliography,
//! with citations resolvable against the bibliography. A best-effort
//! heuristic extractor: misses are absences, not errors.
//!
//! The library is a pure in-memory transform; [`pdf`] is the bundled
//! pdfium-backed collaborator used by the CLI to produce fragments and
//! page rasters.

pub mod bib;
pub mod capture;
pub mod citations;
pub mod extract;
pub mod labels;
pub mod lines;
pub mod pdf;
pub mod resolve;
pub mod types;

pub use capture::{CaptureCache, CaptureConfig, CaptureRect, capture_rect, encode_region_png};
pub use citations::{classify_citation, find_citations, find_page_citations};
pub use extract::{DocumentIndex, Engine, extract_document};
pub use lines::{LineAccumulator, SegmentedLine, segment_lines};
pub use resolve::{resolve, resolve_occurrence};
pub use types::{
    BibliographyEntry, BoundingBox, CitationKind, CitationOccurrence, ExtractedLabel, LabelKind,
    PageFragments, PositionedFragment, ResolvedReference,
};

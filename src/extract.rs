use std::collections::BTreeMap;

use image::RgbaImage;
use serde::Serialize;

use crate::bib::scan_bibliography;
use crate::capture::{CaptureCache, CaptureConfig, capture_rect, encode_region_png};
use crate::labels::scan_page_labels;
use crate::resolve;
use crate::types::{
    BibliographyEntry, CitationOccurrence, ExtractedLabel, LabelKind, PageFragments,
    ResolvedReference,
};

/// The per-document registries produced by one extraction pass.
#[derive(Debug, Default, Serialize)]
pub struct DocumentIndex {
    pub figures: BTreeMap<String, ExtractedLabel>,
    pub equations: BTreeMap<String, ExtractedLabel>,
    pub bibliography: BTreeMap<String, BibliographyEntry>,
}

/// Run the extraction pass over a document's pages.
///
/// Pages must be supplied in increasing page order: label state is local to
/// a page, but bibliography entries accumulate across page boundaries, so
/// out-of-order processing would corrupt multi-page entries. The pass is
/// single-threaded and sequential.
pub fn extract_document(pages: &[PageFragments]) -> DocumentIndex {
    let mut index = DocumentIndex::default();
    for page in pages {
        scan_page_labels(page, &mut index.figures, &mut index.equations);
    }
    index.bibliography = scan_bibliography(pages);
    log::debug!(
        "extracted {} figures, {} equations, {} bibliography entries",
        index.figures.len(),
        index.equations.len(),
        index.bibliography.len()
    );
    index
}

/// Extraction engine: the registries for one document plus the lazy
/// region-capture cache.
///
/// `extract` takes `&mut self`, so overlapping passes on one engine are
/// rejected by the borrow checker rather than guarded at runtime.
#[derive(Debug, Default)]
pub struct Engine {
    index: DocumentIndex,
    captures: CaptureCache,
    capture_config: CaptureConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture_config(capture_config: CaptureConfig) -> Self {
        Self {
            capture_config,
            ..Self::default()
        }
    }

    /// Extract a new document. The registries and capture cache are cleared
    /// first so nothing leaks from a previously extracted document.
    pub fn extract(&mut self, pages: &[PageFragments]) {
        self.clear();
        self.index = extract_document(pages);
    }

    pub fn clear(&mut self) {
        self.index = DocumentIndex::default();
        self.captures.clear();
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn figures(&self) -> &BTreeMap<String, ExtractedLabel> {
        &self.index.figures
    }

    pub fn equations(&self) -> &BTreeMap<String, ExtractedLabel> {
        &self.index.equations
    }

    pub fn bibliography(&self) -> &BTreeMap<String, BibliographyEntry> {
        &self.index.bibliography
    }

    pub fn label(&self, kind: LabelKind, number: &str) -> Option<&ExtractedLabel> {
        match kind {
            LabelKind::Figure => self.index.figures.get(number),
            LabelKind::Equation => self.index.equations.get(number),
        }
    }

    /// Layered reference-key lookup against this document's bibliography.
    pub fn resolve(&self, reference_key: &str) -> Option<&BibliographyEntry> {
        resolve::resolve(&self.index.bibliography, reference_key)
    }

    pub fn resolve_occurrence(&self, occurrence: CitationOccurrence) -> ResolvedReference<'_> {
        resolve::resolve_occurrence(&self.index.bibliography, occurrence)
    }

    /// PNG bytes of the captured region for a label, computed on first
    /// request from the supplied page raster and memoized after that.
    ///
    /// `page_height` is the page's unscaled height; the raster may carry any
    /// render scale. Returns `None` for an unknown label or a failed encode.
    pub fn capture_label(
        &mut self,
        kind: LabelKind,
        number: &str,
        raster: &RgbaImage,
        page_height: f32,
    ) -> Option<&[u8]> {
        let label = match kind {
            LabelKind::Figure => self.index.figures.get(number)?,
            LabelKind::Equation => self.index.equations.get(number)?,
        };
        let config = &self.capture_config;
        self.captures.get_or_insert_with(kind, number, || {
            let rect = capture_rect(
                kind,
                label.anchor_y,
                page_height,
                raster.width(),
                raster.height(),
                config,
            );
            match encode_region_png(raster, &rect) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    log::warn!("region capture failed for {kind:?} {number}: {err:#}");
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositionedFragment;

    fn page(page_number: usize, lines: &[&str]) -> PageFragments {
        let fragments = lines
            .iter()
            .enumerate()
            .map(|(i, text)| PositionedFragment {
                text: text.to_string(),
                x: 72.0,
                y: 700.0 - 20.0 * i as f32,
                width: 400.0,
                height: 10.0,
                page_number,
            })
            .collect();
        PageFragments {
            page_number,
            width: 612.0,
            height: 792.0,
            fragments,
        }
    }

    #[test]
    fn full_pass_fills_all_registries() {
        let pages = vec![
            page(1, &["Figure 1: Model architecture", "(3)"]),
            page(2, &[
                "References",
                "[1] A. Smith. Attention revisited at length. NeurIPS, 2017.",
            ]),
        ];
        let index = extract_document(&pages);
        assert!(index.figures.contains_key("1"));
        assert!(index.equations.contains_key("3"));
        assert!(index.bibliography.contains_key("1"));
    }

    #[test]
    fn re_extraction_contains_only_second_document() {
        let mut engine = Engine::new();
        engine.extract(&[page(1, &["Figure 1: First document"])]);
        assert!(engine.figures().contains_key("1"));

        engine.extract(&[page(1, &["Figure 2: Second document"])]);
        assert!(!engine.figures().contains_key("1"));
        assert!(engine.figures().contains_key("2"));
    }

    #[test]
    fn clear_also_drops_captures() {
        let mut engine = Engine::new();
        engine.extract(&[page(1, &["Figure 1: To capture"])]);
        let raster = RgbaImage::from_pixel(61, 79, image::Rgba([255, 255, 255, 255]));
        assert!(
            engine
                .capture_label(LabelKind::Figure, "1", &raster, 792.0)
                .is_some()
        );
        engine.clear();
        assert!(engine.figures().is_empty());
        // The label is gone, so a capture request now misses.
        assert!(
            engine
                .capture_label(LabelKind::Figure, "1", &raster, 792.0)
                .is_none()
        );
    }

    #[test]
    fn engine_resolves_citations_against_its_bibliography() {
        let mut engine = Engine::new();
        engine.extract(&[page(1, &[
            "References",
            "[7] B. Jones. A resolvable entry with care. J Res, 2015.",
        ])]);
        assert!(engine.resolve("7").is_some());
        assert!(engine.resolve("99").is_none());
    }

    #[test]
    fn capture_returns_png_bytes_for_known_label() {
        let mut engine = Engine::new();
        engine.extract(&[page(1, &["Figure 1: Capture me"])]);
        let raster = RgbaImage::from_pixel(122, 158, image::Rgba([0, 0, 0, 255]));
        let bytes = engine
            .capture_label(LabelKind::Figure, "1", &raster, 792.0)
            .expect("capture should succeed");
        // PNG signature.
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn unknown_label_capture_is_absent() {
        let mut engine = Engine::new();
        engine.extract(&[page(1, &["no labels here"])]);
        let raster = RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 0, 255]));
        assert!(
            engine
                .capture_label(LabelKind::Equation, "1", &raster, 792.0)
                .is_none()
        );
    }
}

use std::collections::HashMap;
use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};

use crate::types::LabelKind;

/// Margins (raster pixels) for region capture rectangles.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Extra rows kept below a figure's caption anchor.
    pub figure_caption_margin: f32,
    /// Smallest acceptable figure capture height.
    pub figure_min_height: f32,
    /// Rows kept above an equation's anchor.
    pub equation_margin_above: f32,
    /// Rows kept below an equation's anchor.
    pub equation_window_below: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            figure_caption_margin: 24.0,
            figure_min_height: 120.0,
            equation_margin_above: 40.0,
            equation_window_below: 80.0,
        }
    }
}

/// A rectangle on a rendered page raster, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Convert a label's document-space anchor into a raster-space rectangle.
///
/// `anchor_y` is in unscaled page coordinates (origin bottom-left);
/// `raster_height / page_height` recovers the effective scale, so any device
/// pixel ratio applied during rendering cancels out. Figures are assumed to
/// sit above their caption: the rectangle runs from the page top down to the
/// anchor plus a margin. Equations are captured in a window centered on the
/// anchor. Out-of-range anchors and degenerate sizes clamp, never panic.
pub fn capture_rect(
    kind: LabelKind,
    anchor_y: f32,
    page_height: f32,
    raster_width: u32,
    raster_height: u32,
    config: &CaptureConfig,
) -> CaptureRect {
    if raster_width == 0 || raster_height == 0 || page_height <= 0.0 {
        return CaptureRect { x: 0, y: 0, width: raster_width, height: 0 };
    }
    let raster_h = raster_height as f32;
    let effective_scale = raster_h / page_height;
    let raster_y = ((page_height - anchor_y) * effective_scale).clamp(0.0, raster_h);

    let (top, height) = match kind {
        LabelKind::Figure => {
            let min_height = config.figure_min_height.min(raster_h);
            let height = (raster_y + config.figure_caption_margin).clamp(min_height, raster_h);
            (0.0, height)
        }
        LabelKind::Equation => {
            let top = (raster_y - config.equation_margin_above).clamp(0.0, raster_h);
            let bottom = (raster_y + config.equation_window_below).clamp(0.0, raster_h);
            (top, bottom - top)
        }
    };

    CaptureRect {
        x: 0,
        y: top as u32,
        width: raster_width,
        height: height as u32,
    }
}

/// Crop a capture rectangle out of a rendered page and encode it as PNG.
pub fn encode_region_png(raster: &RgbaImage, rect: &CaptureRect) -> Result<Vec<u8>> {
    let width = rect.width.min(raster.width().saturating_sub(rect.x));
    let height = rect.height.min(raster.height().saturating_sub(rect.y));
    let region = image::imageops::crop_imm(raster, rect.x, rect.y, width, height).to_image();
    let mut buf = Cursor::new(Vec::new());
    region
        .write_to(&mut buf, ImageFormat::Png)
        .context("Failed to encode captured region as PNG")?;
    Ok(buf.into_inner())
}

/// Memoized captured-region images, keyed by label.
///
/// Kept outside the label entities so the registries stay immutable after
/// extraction. Unbounded; cleared together with the registries.
#[derive(Debug, Default)]
pub struct CaptureCache {
    images: HashMap<(LabelKind, String), Vec<u8>>,
}

impl CaptureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached image for a label, computing it on first request.
    /// A `None` from `produce` (capture failed) is not cached, so a later
    /// retry can succeed.
    pub fn get_or_insert_with(
        &mut self,
        kind: LabelKind,
        number: &str,
        produce: impl FnOnce() -> Option<Vec<u8>>,
    ) -> Option<&[u8]> {
        let key = (kind, number.to_string());
        if !self.images.contains_key(&key) {
            let bytes = produce()?;
            self.images.insert(key.clone(), bytes);
        }
        self.images.get(&key).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CaptureConfig {
        CaptureConfig::default()
    }

    #[test]
    fn scale_is_recovered_from_raster_height() {
        // Same page rendered at 1x and 2x: with zero margins the rectangle
        // height tracks the raster scale exactly.
        let cfg = CaptureConfig {
            figure_caption_margin: 0.0,
            figure_min_height: 0.0,
            ..CaptureConfig::default()
        };
        let r1 = capture_rect(LabelKind::Figure, 500.0, 792.0, 612, 792, &cfg);
        let r2 = capture_rect(LabelKind::Figure, 500.0, 792.0, 1224, 1584, &cfg);
        assert_eq!(r2.height, r1.height * 2);
    }

    #[test]
    fn figure_height_stays_within_bounds() {
        let cfg = config();
        // Anchor far below the page bottom: clamps to full raster height.
        let low = capture_rect(LabelKind::Figure, -5000.0, 792.0, 612, 792, &cfg);
        assert_eq!(low.height, 792);
        // Anchor far above the page top: clamps to the minimum height.
        let high = capture_rect(LabelKind::Figure, 5000.0, 792.0, 612, 792, &cfg);
        assert_eq!(high.height, cfg.figure_min_height as u32);
    }

    #[test]
    fn figure_spans_from_page_top() {
        let rect = capture_rect(LabelKind::Figure, 400.0, 800.0, 600, 800, &config());
        assert_eq!(rect.y, 0);
        assert_eq!(rect.width, 600);
        // anchor 400 on an 800-unit page at 1x → raster_y 400, plus margin.
        assert_eq!(rect.height, 424);
    }

    #[test]
    fn equation_window_is_centered_and_clamped() {
        let cfg = config();
        let mid = capture_rect(LabelKind::Equation, 400.0, 800.0, 600, 800, &cfg);
        assert_eq!(mid.y, 360);
        assert_eq!(mid.height, 120);
        // Anchor at the very top of the page: window truncates above.
        let top = capture_rect(LabelKind::Equation, 800.0, 800.0, 600, 800, &cfg);
        assert_eq!(top.y, 0);
        assert_eq!(top.height, cfg.equation_window_below as u32);
    }

    #[test]
    fn degenerate_raster_clamps_to_empty() {
        let rect = capture_rect(LabelKind::Figure, 400.0, 0.0, 600, 800, &config());
        assert_eq!(rect.height, 0);
        let rect = capture_rect(LabelKind::Equation, 400.0, 800.0, 600, 0, &config());
        assert_eq!(rect.height, 0);
    }

    #[test]
    fn cache_computes_once_per_label() {
        let mut cache = CaptureCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let bytes = cache.get_or_insert_with(LabelKind::Figure, "1", || {
                calls += 1;
                Some(vec![1, 2, 3])
            });
            assert_eq!(bytes, Some(&[1u8, 2, 3][..]));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn failed_capture_is_not_cached() {
        let mut cache = CaptureCache::new();
        assert!(cache.get_or_insert_with(LabelKind::Figure, "1", || None).is_none());
        let bytes = cache.get_or_insert_with(LabelKind::Figure, "1", || Some(vec![7]));
        assert_eq!(bytes, Some(&[7u8][..]));
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = CaptureCache::new();
        cache.get_or_insert_with(LabelKind::Equation, "2", || Some(vec![9]));
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn encode_region_png_round_trips_dimensions() {
        let raster = RgbaImage::from_pixel(64, 64, image::Rgba([255, 0, 0, 255]));
        let rect = CaptureRect { x: 0, y: 16, width: 64, height: 32 };
        let bytes = encode_region_png(&raster, &rect).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 32);
    }
}

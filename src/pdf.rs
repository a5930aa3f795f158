use std::path::Path;

use anyhow::{Context, Result, bail};
use image::RgbaImage;
use pdfium_render::prelude::*;

use crate::types::{PageFragments, PositionedFragment};

/// Horizontal gap (in average char widths) that splits one text run into two
/// fragments. Large enough to keep word spacing inside a single run.
const GAP_FACTOR: f32 = 1.5;

/// Baseline wobble tolerated within one fragment.
const BASELINE_TOLERANCE: f32 = 2.0;

pub fn load_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>> {
    pdfium
        .load_pdf_from_file(path, None)
        .with_context(|| format!("Failed to load PDF: {}", path.display()))
}

/// Extract positioned text fragments from every page.
///
/// A page whose text cannot be read is kept as an empty page (so page
/// numbering and totals stay intact) and the pass continues.
pub fn extract_fragments(document: &PdfDocument) -> Vec<PageFragments> {
    document
        .pages()
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let page_number = idx + 1;
            let (width, height) = (page.width().value, page.height().value);
            let fragments = match page_fragments(&page, page_number) {
                Ok(fragments) => fragments,
                Err(err) => {
                    log::warn!("skipping page {page_number}: {err:#}");
                    Vec::new()
                }
            };
            PageFragments {
                page_number,
                width,
                height,
                fragments,
            }
        })
        .collect()
}

struct PageChar {
    ch: char,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

fn page_fragments(page: &PdfPage, page_number: usize) -> Result<Vec<PositionedFragment>> {
    let text_page = page
        .text()
        .with_context(|| format!("Failed to load text for page {page_number}"))?;

    let chars: Vec<PageChar> = text_page
        .chars()
        .iter()
        .filter_map(|ch| convert_text_char(&ch))
        .collect();

    Ok(group_chars(&chars, page_number))
}

fn convert_text_char(ch: &PdfPageTextChar) -> Option<PageChar> {
    let unicode = ch.unicode_char()?;
    if unicode.is_control() && unicode != ' ' {
        return None;
    }

    // Skip zero-size font characters (watermarks, hidden text).
    if ch.scaled_font_size().value < 0.5 {
        return None;
    }

    let rect = ch.loose_bounds().or_else(|_| ch.tight_bounds()).ok()?;
    Some(PageChar {
        ch: unicode,
        x: rect.left().value,
        y: rect.bottom().value,
        width: (rect.right().value - rect.left().value).abs(),
        height: (rect.top().value - rect.bottom().value).abs(),
    })
}

struct FragmentAccum {
    text: String,
    x: f32,
    y: f32,
    max_x: f32,
    max_y: f32,
    prev_right: f32,
}

impl FragmentAccum {
    fn new() -> Self {
        Self { text: String::new(), x: 0.0, y: 0.0, max_x: 0.0, max_y: 0.0, prev_right: 0.0 }
    }

    fn start(&mut self, ch: &PageChar) {
        self.x = ch.x;
        self.y = ch.y;
        self.max_x = ch.x + ch.width;
        self.max_y = ch.y + ch.height;
    }

    fn extend(&mut self, ch: &PageChar) {
        self.max_x = self.max_x.max(ch.x + ch.width);
        self.max_y = self.max_y.max(ch.y + ch.height);
    }

    fn flush(&mut self, fragments: &mut Vec<PositionedFragment>, page_number: usize) {
        let text = std::mem::take(&mut self.text);
        if text.trim().is_empty() {
            return;
        }
        fragments.push(PositionedFragment {
            text,
            x: self.x,
            y: self.y,
            width: self.max_x - self.x,
            height: self.max_y - self.y,
            page_number,
        });
    }
}

/// Group characters into text runs. Spaces stay inside a run; a run breaks
/// on a baseline change or an outsized horizontal gap (column boundary).
fn group_chars(chars: &[PageChar], page_number: usize) -> Vec<PositionedFragment> {
    let mut fragments = Vec::new();
    let gap_threshold = average_char_width(chars) * GAP_FACTOR;
    let mut acc = FragmentAccum::new();

    for ch in chars {
        let is_break = !acc.text.is_empty()
            && ((ch.y - acc.y).abs() > BASELINE_TOLERANCE
                || (ch.x - acc.prev_right) > gap_threshold);
        if is_break {
            acc.flush(&mut fragments, page_number);
        }
        if acc.text.is_empty() {
            acc.start(ch);
        } else {
            acc.extend(ch);
        }
        acc.text.push(ch.ch);
        acc.prev_right = ch.x + ch.width;
    }
    acc.flush(&mut fragments, page_number);
    fragments
}

fn average_char_width(chars: &[PageChar]) -> f32 {
    let widths: Vec<f32> = chars
        .iter()
        .filter(|c| c.width > 0.0)
        .map(|c| c.width)
        .collect();
    if widths.is_empty() {
        return 5.0;
    }
    widths.iter().sum::<f32>() / widths.len() as f32
}

/// Render one page to an RGBA raster for region capture.
///
/// `page_number` outside `[1, total_pages]` is a programmer error and fails
/// fast rather than being clamped.
pub fn render_page_raster(
    document: &PdfDocument,
    page_number: usize,
    scale: f32,
) -> Result<RgbaImage> {
    let pages = document.pages();
    let total = pages.len() as usize;
    if page_number < 1 || page_number > total {
        bail!("page {page_number} out of range (document has {total} pages)");
    }
    let page = pages
        .get((page_number - 1) as u16)
        .map_err(|e| anyhow::anyhow!("Failed to open page {page_number}: {e}"))?;
    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to render page {page_number}: {e}"))?;
    Ok(bitmap.as_image().to_rgba8())
}

use crate::types::PositionedFragment;

/// Vertical distance (page units) between fragments that forces a line break.
///
/// Tolerates PDFs that split one visual line into many small fragments, at
/// the cost of false breaks inside lines with uneven baselines.
pub const LINE_BREAK_THRESHOLD: f32 = 5.0;

/// A logical line assembled from vertically-clustered fragments.
#[derive(Debug, Clone)]
pub struct SegmentedLine {
    pub text: String,
    /// y of the fragment immediately preceding the break that closed this
    /// line — not the y of the fragment that opened the next one.
    pub anchor_y: f32,
}

/// Accumulator for one in-progress line: concatenated text plus the y of the
/// most recently appended fragment.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    text: String,
    last_y: Option<f32>,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment in. Returns the completed line when the fragment's
    /// y jumps past the threshold and the accumulator held text.
    pub fn push(&mut self, fragment: &PositionedFragment) -> Option<SegmentedLine> {
        let flushed = match self.last_y {
            Some(last_y) if (fragment.y - last_y).abs() > LINE_BREAK_THRESHOLD => self.take(),
            _ => None,
        };
        self.text.push_str(&fragment.text);
        self.last_y = Some(fragment.y);
        flushed
    }

    /// Flush whatever remains at end of page.
    pub fn finish(mut self) -> Option<SegmentedLine> {
        self.take()
    }

    fn take(&mut self) -> Option<SegmentedLine> {
        let anchor_y = self.last_y?;
        if self.text.is_empty() {
            self.last_y = None;
            return None;
        }
        Some(SegmentedLine {
            text: std::mem::take(&mut self.text),
            anchor_y,
        })
    }
}

/// Group one page's fragments (in stream order) into logical lines.
pub fn segment_lines(fragments: &[PositionedFragment]) -> Vec<SegmentedLine> {
    let mut lines = Vec::new();
    let mut acc = LineAccumulator::new();
    for fragment in fragments {
        if let Some(line) = acc.push(fragment) {
            lines.push(line);
        }
    }
    if let Some(line) = acc.finish() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, y: f32) -> PositionedFragment {
        PositionedFragment {
            text: text.to_string(),
            x: 72.0,
            y,
            width: 100.0,
            height: 10.0,
            page_number: 1,
        }
    }

    #[test]
    fn same_baseline_fragments_concatenate() {
        let lines = segment_lines(&[frag("Figure 1: Model", 500.0), frag("Overview", 500.0)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Figure 1: ModelOverview");
        assert_eq!(lines[0].anchor_y, 500.0);
    }

    #[test]
    fn anchor_is_fragment_before_break() {
        let lines = segment_lines(&[
            frag("first line", 500.0),
            frag("second line", 420.0),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].anchor_y, 500.0);
        assert_eq!(lines[1].anchor_y, 420.0);
    }

    #[test]
    fn small_baseline_wobble_stays_one_line() {
        let lines = segment_lines(&[frag("a", 500.0), frag("b", 496.0), frag("c", 493.0)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "abc");
        // Anchor tracks the last appended fragment.
        assert_eq!(lines[0].anchor_y, 493.0);
    }

    #[test]
    fn end_of_page_flushes_remainder() {
        let lines = segment_lines(&[frag("only", 300.0)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].anchor_y, 300.0);
    }

    #[test]
    fn empty_page_yields_no_lines() {
        assert!(segment_lines(&[]).is_empty());
    }
}

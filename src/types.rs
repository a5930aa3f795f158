use serde::Serialize;

/// A positioned run of text from a rendered PDF page.
///
/// Produced by the document-rendering collaborator; read-only input.
/// Coordinates are in unscaled page space, origin at the bottom-left.
#[derive(Debug, Clone)]
pub struct PositionedFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub page_number: usize,
}

/// All fragments on a single page, in stream order (not reading order).
#[derive(Debug)]
pub struct PageFragments {
    /// 1-based page number.
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub fragments: Vec<PositionedFragment>,
}

/// Which registry a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Figure,
    Equation,
}

/// A figure or equation label anchored to a position on a page.
///
/// `number` preserves alphanumeric suffixes ("2a"). Captured screenshots
/// live in a separate keyed cache, not on this entity.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedLabel {
    pub kind: LabelKind,
    pub number: String,
    pub page_number: usize,
    pub anchor_y: f32,
    pub label_text: String,
}

/// Shape of an inline citation occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CitationKind {
    Numbered,
    AuthorYear,
    Superscript,
}

/// Page-space rectangle of the fragment containing a citation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One textual occurrence of an inline citation.
///
/// Ephemeral: occurrences are reported independently, never deduplicated.
#[derive(Debug, Clone, Serialize)]
pub struct CitationOccurrence {
    pub raw_text: String,
    pub reference_key: String,
    pub kind: CitationKind,
    pub page_number: usize,
    pub bounding_box: BoundingBox,
}

/// A parsed bibliography entry.
///
/// `raw_text` is always populated, even when every sub-field parse fails.
#[derive(Debug, Clone, Serialize)]
pub struct BibliographyEntry {
    pub key: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    pub raw_text: String,
}

/// A citation occurrence paired with its bibliography entry, if resolved.
///
/// Computed on demand; an absent entry is a normal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedReference<'a> {
    pub occurrence: CitationOccurrence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<&'a BibliographyEntry>,
}

mod engine;
mod font;
mod paint;
mod render;

use serde::{Deserialize, Serialize};

pub use engine::{
    DEFAULT_MIN_CONFIDENCE, assemble_blocks, extract_blocks, filter_words, merge_hyphenated_words,
    scale_words,
};
pub use font::{FontMetrics, ResolvedOverlayFont, load_font_metrics, resolve_overlay_font};
pub use paint::{outline_rect, surrounding_average_color};
pub use render::{BackgroundMode, CancelFlag, OverlayStyle, PlacedLine, RenderOutcome, render_overlay};

/// Axis-aligned pixel box. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// One word as reported by the recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: Rect,
    #[serde(default)]
    pub is_first_in_paragraph: bool,
    #[serde(default)]
    pub is_first_in_line: Option<bool>,
    #[serde(default)]
    pub ends_line: bool,
    #[serde(default)]
    pub ends_paragraph: bool,
}

impl RecognizedWord {
    pub fn starts_line(&self) -> bool {
        self.is_first_in_line.unwrap_or(self.is_first_in_paragraph)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordInfo {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: Rect,
    /// Layout-only box used for character width after a hyphen merge.
    pub ghost_box: Option<Rect>,
    pub is_first_in_line: bool,
    pub is_last_in_line: bool,
    pub is_last_in_para: bool,
}

impl WordInfo {
    pub fn new(text: &str, confidence: f32, bounding_box: Rect) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            bounding_box,
            ghost_box: None,
            is_first_in_line: false,
            is_last_in_line: false,
            is_last_in_para: false,
        }
    }

    pub(crate) fn effective_box(&self) -> Rect {
        self.ghost_box.unwrap_or(self.bounding_box)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub bounding_box: Rect,
    pub word_rects: Vec<Rect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    /// Lines joined with spaces; this is the unit sent for translation.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Every line of every block, one per row.
pub fn extracted_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .flat_map(|block| block.lines.iter().map(|line| line.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

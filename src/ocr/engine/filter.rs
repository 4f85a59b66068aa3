use tracing::warn;

use crate::ocr::{RecognizedWord, WordInfo};

pub const DEFAULT_MIN_CONFIDENCE: u32 = 75;

/// Drops low-confidence words. Line and paragraph boundaries carried by a
/// dropped word move to its neighbours so every kept line still terminates.
pub fn filter_words(words: &[RecognizedWord], min_confidence: u32) -> Vec<WordInfo> {
    let mut kept: Vec<WordInfo> = Vec::with_capacity(words.len());
    let mut pending_first = false;

    for word in words {
        if keep_word(word, min_confidence) {
            kept.push(WordInfo {
                text: word.text.clone(),
                confidence: word.confidence,
                bounding_box: word.bounding_box,
                ghost_box: None,
                is_first_in_line: word.starts_line() || pending_first,
                is_last_in_line: word.ends_line,
                is_last_in_para: word.ends_paragraph,
            });
            pending_first = false;
            continue;
        }

        if word.starts_line() {
            pending_first = true;
        }
        if let Some(previous) = kept.last_mut() {
            previous.is_last_in_line |= word.ends_line;
            previous.is_last_in_para |= word.ends_paragraph;
        }
    }

    kept
}

fn keep_word(word: &RecognizedWord, min_confidence: u32) -> bool {
    let bbox = &word.bounding_box;
    if bbox.width() <= 0 || bbox.height() <= 0 {
        warn!(text = %word.text, ?bbox, "skipping word with degenerate box");
        return false;
    }
    let min_confidence = min_confidence as f32;
    // single glyphs are mostly noise
    let single_char_floor = (min_confidence + 5.0).min(100.0);
    word.confidence >= min_confidence
        && !(word.text.chars().count() == 1 && word.confidence < single_char_floor)
}

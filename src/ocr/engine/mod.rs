mod filter;
mod geom;
mod hyphen;
mod layout;

use tracing::info;

use crate::ocr::{RecognizedWord, TextBlock};

pub use filter::{DEFAULT_MIN_CONFIDENCE, filter_words};
pub use geom::scale_words;
pub use hyphen::merge_hyphenated_words;
pub use layout::assemble_blocks;

/// Runs filter, hyphen merge and line assembly over one recognition pass.
pub fn extract_blocks(words: &[RecognizedWord], min_confidence: u32) -> Vec<TextBlock> {
    let kept = filter_words(words, min_confidence);
    let kept_count = kept.len();
    let merged = merge_hyphenated_words(kept);
    let blocks = assemble_blocks(&merged);
    info!(
        words = words.len(),
        kept = kept_count,
        merged = merged.len(),
        blocks = blocks.len(),
        "reconstructed text blocks"
    );
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Rect;

    fn word(text: &str, confidence: f32, left: i32, top: i32) -> RecognizedWord {
        RecognizedWord {
            text: text.to_string(),
            confidence,
            bounding_box: Rect::new(left, top, left + 10 * text.len() as i32, top + 20),
            is_first_in_paragraph: false,
            is_first_in_line: None,
            ends_line: false,
            ends_paragraph: false,
        }
    }

    #[test]
    fn dropped_paragraph_end_still_closes_block() {
        let mut first = word("hello", 95.0, 0, 0);
        first.is_first_in_paragraph = true;
        let mut last = word("~", 20.0, 60, 0);
        last.ends_line = true;
        last.ends_paragraph = true;
        let words = vec![first, word("world", 95.0, 60, 0), last];

        let blocks = extract_blocks(&words, 75);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "hello world");
    }

    #[test]
    fn hyphenated_word_is_rejoined_inside_its_line() {
        let mut head = word("inter-", 95.0, 0, 0);
        head.is_first_in_paragraph = true;
        head.ends_line = true;
        let mut tail = word("national", 95.0, 0, 25);
        tail.is_first_in_line = Some(true);
        let mut rest = word("trade", 95.0, 90, 25);
        rest.ends_line = true;
        rest.ends_paragraph = true;

        let blocks = extract_blocks(&[head, tail, rest], 75);
        assert_eq!(blocks.len(), 1);
        let texts: Vec<&str> = blocks[0].lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["international", "trade"]);
        assert_eq!(blocks[0].lines[1].bounding_box, Rect::new(0, 25, 140, 45));
    }
}

use tracing::{debug, warn};

use crate::ocr::{TextBlock, TextLine, WordInfo};

/// Horizontal gap, in estimated characters, that splits a line into two blocks.
const BLOCK_GAP_CHARS: f32 = 3.0;

#[derive(Default)]
struct Assembler {
    blocks: Vec<TextBlock>,
    lines: Vec<TextLine>,
    line: TextLine,
    last_right: i32,
}

impl Assembler {
    fn push_word(&mut self, word: &WordInfo) {
        let bbox = word.bounding_box;
        let skipped_first_word = bbox.right < self.line.bounding_box.left;

        if word.is_first_in_line || skipped_first_word {
            self.line = line_from(word);
        } else if gap_in_chars(word, self.last_right) >= BLOCK_GAP_CHARS {
            debug!(word = %word.text, "forcing new block");
            self.close_line();
            self.close_block();
            self.line = line_from(word);
        } else {
            self.append(word);
        }

        if word.is_last_in_line {
            self.close_line();
        }
        if word.is_last_in_para {
            self.close_block();
        }
        self.last_right = bbox.right;
    }

    fn append(&mut self, word: &WordInfo) {
        let line = &mut self.line;
        if line.text.is_empty() {
            line.text = word.text.clone();
        } else {
            line.text.push(' ');
            line.text.push_str(&word.text);
        }
        line.word_rects.push(word.bounding_box);
        line.bounding_box.union(&word.bounding_box);
        if line.bounding_box.width() < 0 {
            warn!(bbox = ?line.bounding_box, "line with negative width");
        }
    }

    fn close_line(&mut self) {
        if self.line.text.trim().is_empty() {
            return;
        }
        self.lines.push(std::mem::take(&mut self.line));
    }

    fn close_block(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.lines);
        self.blocks.push(TextBlock { lines });
    }

    fn finish(mut self) -> Vec<TextBlock> {
        if !self.line.text.trim().is_empty() || !self.lines.is_empty() {
            debug!("closing unterminated paragraph at end of input");
        }
        self.close_line();
        self.close_block();
        self.blocks
    }
}

fn line_from(word: &WordInfo) -> TextLine {
    TextLine {
        text: word.text.clone(),
        bounding_box: word.bounding_box,
        word_rects: vec![word.bounding_box],
    }
}

fn gap_in_chars(word: &WordInfo, last_right: i32) -> f32 {
    let gap_px = (word.bounding_box.left - last_right) as f32;
    let chars = word.text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let char_width = word.effective_box().width() as f32 / chars as f32;
    if char_width > 0.0 {
        gap_px / char_width
    } else {
        0.0
    }
}

/// Groups words into lines and paragraph blocks in reading order.
pub fn assemble_blocks(words: &[WordInfo]) -> Vec<TextBlock> {
    let mut assembler = Assembler::default();
    for word in words.iter().filter(|word| !word.text.trim().is_empty()) {
        assembler.push_word(word);
    }
    assembler.finish()
}

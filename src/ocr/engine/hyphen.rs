use crate::ocr::{Rect, WordInfo};

/// Rejoins words split across lines by a trailing hyphen.
///
/// The merged word keeps the position of the hyphenated fragment; its ghost
/// box is widened by the tail's width so character width stays realistic. The
/// word after the tail absorbs the tail's box and starts the next line.
pub fn merge_hyphenated_words(words: Vec<WordInfo>) -> Vec<WordInfo> {
    let mut merged = Vec::with_capacity(words.len());
    let mut words = words.into_iter().peekable();

    while let Some(word) = words.next() {
        if !(word.is_last_in_line && word.text.ends_with('-')) {
            merged.push(word);
            continue;
        }
        let Some(tail) = words.next_if(|next| continues_on_next_line(&word, next)) else {
            merged.push(word);
            continue;
        };

        let tail_box = tail.bounding_box;
        merged.push(join_pair(word, tail));
        if let Some(mut follower) = words.next() {
            follower.bounding_box = tail_box.union_with(&follower.bounding_box);
            follower.is_first_in_line = true;
            merged.push(follower);
        }
    }

    merged
}

fn continues_on_next_line(head: &WordInfo, next: &WordInfo) -> bool {
    // line flags are unreliable; a word further left and lower also wraps
    next.is_first_in_line
        || (next.bounding_box.left < head.bounding_box.left
            && next.bounding_box.top > head.bounding_box.top)
}

fn join_pair(head: WordInfo, tail: WordInfo) -> WordInfo {
    let mut text = head.text;
    text.pop();
    text.push_str(&tail.text);

    let base = head.ghost_box.unwrap_or(head.bounding_box);
    let ghost = Rect {
        right: base.right + tail.bounding_box.width(),
        ..base
    };

    WordInfo {
        text,
        confidence: head.confidence.min(tail.confidence),
        bounding_box: head.bounding_box,
        ghost_box: Some(ghost),
        is_first_in_line: head.is_first_in_line,
        is_last_in_line: true,
        is_last_in_para: tail.is_last_in_para,
    }
}

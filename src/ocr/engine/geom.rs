use crate::ocr::{Rect, RecognizedWord};

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Grows this box to cover `other`. An empty box adopts `other`; an
    /// empty `other` leaves the box unchanged.
    pub fn union(&mut self, other: &Rect) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }

    pub fn union_with(mut self, other: &Rect) -> Rect {
        self.union(other);
        self
    }

    /// Intersection with `0..width` x `0..height`; `None` when nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Rect> {
        let clipped = Rect {
            left: self.left.clamp(0, width as i32),
            top: self.top.clamp(0, height as i32),
            right: self.right.clamp(0, width as i32),
            bottom: self.bottom.clamp(0, height as i32),
        };
        if clipped.is_empty() {
            None
        } else {
            Some(clipped)
        }
    }

    fn scaled(&self, scale: f32) -> Rect {
        Rect {
            left: (self.left as f32 * scale).round() as i32,
            top: (self.top as f32 * scale).round() as i32,
            right: (self.right as f32 * scale).round() as i32,
            bottom: (self.bottom as f32 * scale).round() as i32,
        }
    }
}

/// Maps word boxes into an image resized by `scale`.
pub fn scale_words(words: Vec<RecognizedWord>, scale: f32) -> Vec<RecognizedWord> {
    if (scale - 1.0).abs() < f32::EPSILON {
        return words;
    }
    words
        .into_iter()
        .map(|word| RecognizedWord {
            bounding_box: word.bounding_box.scaled(scale),
            ..word
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_adopts_other_when_empty() {
        let mut rect = Rect::default();
        rect.union(&Rect::new(10, 5, 30, 25));
        assert_eq!(rect, Rect::new(10, 5, 30, 25));
    }

    #[test]
    fn union_covers_both_boxes() {
        let mut rect = Rect::new(10, 10, 20, 20);
        rect.union(&Rect::new(0, 15, 15, 40));
        assert_eq!(rect, Rect::new(0, 10, 20, 40));
        rect.union(&Rect::default());
        assert_eq!(rect, Rect::new(0, 10, 20, 40));
    }

    #[test]
    fn clip_drops_boxes_outside_the_image() {
        assert_eq!(
            Rect::new(-5, -5, 10, 10).clip_to(100, 100),
            Some(Rect::new(0, 0, 10, 10))
        );
        assert_eq!(Rect::new(120, 0, 130, 10).clip_to(100, 100), None);
    }

    #[test]
    fn scale_words_rounds_each_edge() {
        let word = RecognizedWord {
            text: "hi".to_string(),
            confidence: 90.0,
            bounding_box: Rect::new(10, 20, 31, 41),
            is_first_in_paragraph: true,
            is_first_in_line: None,
            ends_line: true,
            ends_paragraph: true,
        };
        let scaled = scale_words(vec![word], 0.5);
        assert_eq!(scaled[0].bounding_box, Rect::new(5, 10, 16, 21));
    }
}

use anyhow::{Context, Result, anyhow, bail};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tiny_skia::Pixmap;
use tracing::{debug, info};
use usvg::{Options, Tree, fontdb};

use super::font::{ascent_px, break_text, measure_text_width_px};
use super::paint::{
    BLACK, WHITE, blend, erase_with_soft_blur, foreground_by_contrast, surrounding_average_color,
};
use super::{FontMetrics, TextBlock, TextLine};
use crate::translator::BlockTranslator;

/// How erase and text colors are chosen.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Sample the surroundings and pick the most contrasting source pixel.
    #[default]
    Auto,
    WhiteOnBlack,
    BlackOnWhite,
}

impl BackgroundMode {
    /// Fixed `(background, foreground)` pair for the forced modes.
    fn fixed_colors(self) -> Option<(Rgba<u8>, Rgba<u8>)> {
        match self {
            BackgroundMode::Auto => None,
            BackgroundMode::WhiteOnBlack => Some((BLACK, WHITE)),
            BackgroundMode::BlackOnWhite => Some((WHITE, BLACK)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub background: BackgroundMode,
    pub sample_margin: i32,
    pub blur_radius: f32,
    pub blur_alpha: f32,
    pub min_font_size: f32,
    /// Fraction of the summed line widths the translated text may fill.
    pub width_padding: f32,
    pub font_family: Option<String>,
    pub font_metrics: Option<FontMetrics>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            background: BackgroundMode::Auto,
            sample_margin: 16,
            blur_radius: 8.0,
            blur_alpha: 0.5,
            min_font_size: 8.0,
            width_padding: 0.95,
            font_family: None,
            font_metrics: None,
        }
    }
}

/// Shared flag checked between lines; a line is never left erased without its text.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLine {
    pub block: usize,
    pub line: usize,
    /// `None` when the translation ran out before this line.
    pub text: Option<String>,
    pub x: f32,
    pub baseline: f32,
    pub font_size: f32,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    pub translated_text: String,
    pub lines: Vec<PlacedLine>,
}

struct LineColors {
    background: Rgba<u8>,
    foreground: Rgba<u8>,
}

/// Translates every block in one batch, erases the source text and re-flows
/// the translation over the original line boxes.
pub async fn render_overlay<T: BlockTranslator>(
    image: &mut RgbaImage,
    blocks: &[TextBlock],
    translator: T,
    style: &OverlayStyle,
    cancel: &CancelFlag,
) -> Result<RenderOutcome> {
    if blocks.is_empty() {
        return Ok(RenderOutcome::default());
    }

    let texts: Vec<String> = blocks.iter().map(TextBlock::text).collect();
    let started = Instant::now();
    let translations = translator
        .translate_blocks(texts)
        .await
        .with_context(|| "failed to translate text blocks")?;
    info!(
        blocks = blocks.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "translation finished"
    );
    if translations.len() != blocks.len() {
        bail!(
            "translator returned {} entries for {} blocks",
            translations.len(),
            blocks.len()
        );
    }

    let painter = TextPainter::new(style);
    let font = style.font_metrics.as_ref();
    let mut placed = Vec::new();

    for (block_idx, (block, translated)) in blocks.iter().zip(&translations).enumerate() {
        let font_size = fit_font_size(
            translated,
            average_line_height(block),
            available_width(block, style.width_padding),
            style.min_font_size,
            font,
        );
        let colors: Vec<LineColors> = block
            .lines
            .iter()
            .map(|line| line_colors(image, &line.bounding_box, style))
            .collect();
        // the last line's foreground is used for the whole block
        let foreground = colors.last().map(|c| c.foreground).unwrap_or(BLACK);
        let segments = reflow(translated, &block.lines, font_size, font);
        let ascent = ascent_px(font_size, font);

        for (line_idx, ((line, line_color), segment)) in
            block.lines.iter().zip(&colors).zip(segments).enumerate()
        {
            if cancel.is_cancelled() {
                return Err(anyhow!("overlay rendering cancelled"));
            }
            let bbox = &line.bounding_box;
            erase_with_soft_blur(
                image,
                bbox,
                line_color.background,
                style.blur_radius,
                style.blur_alpha,
            );
            let x = bbox.left as f32;
            let baseline = bbox.top as f32 + ascent;
            if let Some(text) = &segment {
                painter.draw(image, text, x, baseline, font_size, foreground)?;
            }
            placed.push(PlacedLine {
                block: block_idx,
                line: line_idx,
                text: segment,
                x,
                baseline,
                font_size,
                color: [foreground[0], foreground[1], foreground[2]],
            });
        }
        debug!(block = block_idx, font_size, "block rendered");
    }

    Ok(RenderOutcome {
        translated_text: translations.join("\n").trim().to_string(),
        lines: placed,
    })
}

fn average_line_height(block: &TextBlock) -> f32 {
    if block.lines.is_empty() {
        return 0.0;
    }
    let total: i32 = block.lines.iter().map(|line| line.bounding_box.height()).sum();
    total as f32 / block.lines.len() as f32
}

fn available_width(block: &TextBlock, padding: f32) -> f32 {
    let total: i32 = block.lines.iter().map(|line| line.bounding_box.width()).sum();
    total as f32 * padding
}

/// Shrinks one unit at a time until the text fits or the floor is reached.
pub(crate) fn fit_font_size(
    text: &str,
    start: f32,
    width_budget: f32,
    min_size: f32,
    font: Option<&FontMetrics>,
) -> f32 {
    let mut font_size = if start.is_finite() { start } else { min_size };
    while font_size > min_size && measure_text_width_px(text, font_size, font) >= width_budget {
        font_size = (font_size - 1.0).max(min_size);
    }
    font_size
}

fn line_colors(image: &RgbaImage, bounds: &super::Rect, style: &OverlayStyle) -> LineColors {
    if let Some((background, foreground)) = style.background.fixed_colors() {
        return LineColors {
            background,
            foreground,
        };
    }
    let background = surrounding_average_color(image, bounds, style.sample_margin);
    LineColors {
        background,
        foreground: foreground_by_contrast(image, bounds, background),
    }
}

/// Splits `translated` across the lines, breaking only at spaces unless a
/// single word is wider than its line. Lines past the end of the text get `None`.
pub(crate) fn reflow(
    translated: &str,
    lines: &[TextLine],
    font_size: f32,
    font: Option<&FontMetrics>,
) -> Vec<Option<String>> {
    let chars: Vec<char> = translated.chars().collect();
    let (_, segments) = lines.iter().fold(
        (0usize, Vec::with_capacity(lines.len())),
        |(cursor, mut segments), line| {
            if cursor >= chars.len() {
                segments.push(None);
                return (cursor, segments);
            }
            let max_width = line.bounding_box.width() as f32;
            let limit = cursor + break_text(&chars[cursor..], max_width, font_size, font);
            let end = if limit == chars.len() {
                limit
            } else {
                chars[cursor..=limit]
                    .iter()
                    .rposition(|ch| *ch == ' ')
                    .map(|idx| cursor + idx + 1)
                    .unwrap_or(limit)
            };
            let text: String = chars[cursor..end].iter().collect();
            let text = text.trim().to_string();
            segments.push((!text.is_empty()).then_some(text));
            (end, segments)
        },
    );
    segments
}

struct TextPainter {
    options: Options<'static>,
    family: String,
}

impl TextPainter {
    fn new(style: &OverlayStyle) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Some(metrics) = &style.font_metrics {
            db.load_font_data(metrics.data().to_vec());
        }
        let family = style
            .font_family
            .clone()
            .or_else(|| {
                style
                    .font_metrics
                    .as_ref()
                    .and_then(|m| m.family().map(str::to_string))
            })
            .unwrap_or_else(|| "sans-serif".to_string());
        Self {
            options: Options {
                fontdb: Arc::new(db),
                ..Options::default()
            },
            family,
        }
    }

    /// Rasterizes `text` in a strip around its baseline and blends it in.
    fn draw(
        &self,
        image: &mut RgbaImage,
        text: &str,
        x: f32,
        baseline: f32,
        font_size: f32,
        color: Rgba<u8>,
    ) -> Result<()> {
        let left = x.floor().max(0.0) as u32;
        let top = (baseline - font_size * 1.2).floor().max(0.0) as u32;
        let bottom = ((baseline + font_size * 0.5).ceil().max(0.0) as u32).min(image.height());
        let right = image.width();
        if left >= right || top >= bottom {
            return Ok(());
        }
        let (width, height) = (right - left, bottom - top);

        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="#{r:02x}{g:02x}{b:02x}" xml:space="preserve">{text}</text></svg>"##,
            w = width,
            h = height,
            x = x - left as f32,
            y = baseline - top as f32,
            size = font_size,
            family = escape_xml(&self.family),
            r = color[0],
            g = color[1],
            b = color[2],
            text = escape_xml(text),
        );
        let tree = Tree::from_str(&svg, &self.options).with_context(|| "failed to parse SVG")?;
        let mut pixmap =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("empty text strip size"))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        for (idx, pixel) in pixmap.pixels().iter().enumerate() {
            let pixel = pixel.demultiply();
            if pixel.alpha() == 0 {
                continue;
            }
            let px = left + idx as u32 % width;
            let py = top + idx as u32 / width;
            let over = Rgba([pixel.red(), pixel.green(), pixel.blue(), 255]);
            let base = *image.get_pixel(px, py);
            image.put_pixel(px, py, blend(base, over, pixel.alpha() as f32 / 255.0));
        }
        Ok(())
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Rect;
    use crate::translator::TranslateFuture;

    #[derive(Clone)]
    struct FixedTranslator {
        output: Result<Vec<String>, String>,
    }

    impl BlockTranslator for FixedTranslator {
        fn translate_blocks(self, _texts: Vec<String>) -> TranslateFuture {
            let output = self.output.map_err(|err| anyhow!(err));
            Box::pin(async move { output })
        }
    }

    fn line(text: &str, rect: Rect) -> TextLine {
        TextLine {
            text: text.to_string(),
            bounding_box: rect,
            word_rects: vec![rect],
        }
    }

    fn three_line_block() -> TextBlock {
        TextBlock {
            lines: vec![
                line("first source line", Rect::new(10, 10, 190, 30)),
                line("second source line", Rect::new(10, 40, 190, 60)),
                line("third source line", Rect::new(10, 70, 190, 90)),
            ],
        }
    }

    fn forced_style() -> OverlayStyle {
        OverlayStyle {
            background: BackgroundMode::BlackOnWhite,
            blur_radius: 0.0,
            ..OverlayStyle::default()
        }
    }

    #[test]
    fn font_shrinks_until_text_fits() {
        // "abcd" is 2.2 units wide
        let size = fit_font_size("abcd", 20.0, 30.0, 8.0, None);
        assert_eq!(size, 13.0);
    }

    #[test]
    fn font_shrink_stops_at_floor() {
        let size = fit_font_size("a very long translated sentence", 40.0, 1.0, 8.0, None);
        assert_eq!(size, 8.0);
        assert_eq!(fit_font_size("abc", 6.0, 1.0, 8.0, None), 6.0);
        assert_eq!(fit_font_size("abc", 8.5, 1.0, 8.0, None), 8.0);
    }

    #[test]
    fn reflow_breaks_at_spaces() {
        let lines = vec![
            line("", Rect::new(0, 0, 60, 20)),
            line("", Rect::new(0, 25, 60, 45)),
        ];
        // 5.5px per letter and 2.5px per space at size 10
        let segments = reflow("hello big world", &lines, 10.0, None);
        assert_eq!(
            segments,
            vec![Some("hello big".to_string()), Some("world".to_string())]
        );
    }

    #[test]
    fn reflow_leaves_trailing_lines_empty() {
        let block = three_line_block();
        let segments = reflow("short", &block.lines, 10.0, None);
        assert_eq!(segments, vec![Some("short".to_string()), None, None]);
    }

    #[test]
    fn reflow_splits_words_wider_than_line() {
        let lines = vec![line("", Rect::new(0, 0, 12, 20)), line("", Rect::new(0, 25, 12, 45))];
        let segments = reflow("abcd", &lines, 10.0, None);
        assert_eq!(segments, vec![Some("ab".to_string()), Some("cd".to_string())]);
    }

    #[tokio::test]
    async fn short_translation_blanks_remaining_lines() {
        let mut image = RgbaImage::from_pixel(200, 100, Rgba([30, 30, 30, 255]));
        let translator = FixedTranslator {
            output: Ok(vec!["kort".to_string()]),
        };
        let outcome = render_overlay(
            &mut image,
            &[three_line_block()],
            translator,
            &forced_style(),
            &CancelFlag::default(),
        )
        .await
        .expect("render");

        assert_eq!(outcome.translated_text, "kort");
        let texts: Vec<Option<&str>> = outcome.lines.iter().map(|l| l.text.as_deref()).collect();
        assert_eq!(texts, vec![Some("kort"), None, None]);
        assert_eq!(outcome.lines[0].color, [0, 0, 0]);
        // erased lines keep only the background
        assert_eq!(*image.get_pixel(100, 50), WHITE);
        assert_eq!(*image.get_pixel(100, 80), WHITE);
        assert_eq!(*image.get_pixel(100, 95), Rgba([30, 30, 30, 255]));
    }

    #[tokio::test]
    async fn white_on_black_erases_to_black() {
        let mut image = RgbaImage::from_pixel(200, 100, Rgba([200, 200, 200, 255]));
        let translator = FixedTranslator {
            output: Ok(vec!["kort".to_string()]),
        };
        let style = OverlayStyle {
            background: BackgroundMode::WhiteOnBlack,
            blur_radius: 0.0,
            ..OverlayStyle::default()
        };
        let outcome = render_overlay(
            &mut image,
            &[three_line_block()],
            translator,
            &style,
            &CancelFlag::default(),
        )
        .await
        .expect("render");

        assert!(outcome.lines.iter().all(|l| l.color == [255, 255, 255]));
        assert_eq!(*image.get_pixel(100, 50), BLACK);
        assert_eq!(*image.get_pixel(100, 80), BLACK);
        assert_eq!(*image.get_pixel(100, 95), Rgba([200, 200, 200, 255]));
    }

    #[tokio::test]
    async fn short_batch_is_an_error_and_image_is_untouched() {
        let original = RgbaImage::from_pixel(200, 100, Rgba([30, 30, 30, 255]));
        let mut image = original.clone();
        let translator = FixedTranslator { output: Ok(vec![]) };
        let err = render_overlay(
            &mut image,
            &[three_line_block()],
            translator,
            &forced_style(),
            &CancelFlag::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("0 entries for 1 blocks"));
        assert_eq!(image, original);
    }

    #[tokio::test]
    async fn translator_failure_surfaces() {
        let mut image = RgbaImage::new(200, 100);
        let translator = FixedTranslator {
            output: Err("model offline".to_string()),
        };
        let err = render_overlay(
            &mut image,
            &[three_line_block()],
            translator,
            &forced_style(),
            &CancelFlag::default(),
        )
        .await
        .unwrap_err();
        assert!(format!("{:#}", err).contains("model offline"));
    }

    #[tokio::test]
    async fn empty_blocks_leave_image_untouched() {
        let original = RgbaImage::from_pixel(20, 20, Rgba([1, 2, 3, 255]));
        let mut image = original.clone();
        let translator = FixedTranslator {
            output: Err("must not be called".to_string()),
        };
        let outcome = render_overlay(
            &mut image,
            &[],
            translator,
            &OverlayStyle::default(),
            &CancelFlag::default(),
        )
        .await
        .expect("render");
        assert!(outcome.lines.is_empty());
        assert!(outcome.translated_text.is_empty());
        assert_eq!(image, original);
    }

    #[tokio::test]
    async fn cancelled_render_touches_no_line() {
        let original = RgbaImage::from_pixel(200, 100, Rgba([30, 30, 30, 255]));
        let mut image = original.clone();
        let cancel = CancelFlag::default();
        cancel.cancel();
        let translator = FixedTranslator {
            output: Ok(vec!["kort".to_string()]),
        };
        let result = render_overlay(
            &mut image,
            &[three_line_block()],
            translator,
            &forced_style(),
            &cancel,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(image, original);
    }

    #[tokio::test]
    async fn auto_mode_uses_last_line_foreground_for_block() {
        let mut image = RgbaImage::from_pixel(200, 100, WHITE);
        // first line carries red ink, last line blue ink
        image.put_pixel(50, 20, Rgba([200, 0, 0, 255]));
        image.put_pixel(50, 50, Rgba([0, 0, 120, 255]));
        let block = TextBlock {
            lines: vec![
                line("one", Rect::new(10, 10, 190, 30)),
                line("two", Rect::new(10, 40, 190, 60)),
            ],
        };
        let translator = FixedTranslator {
            output: Ok(vec!["een twee".to_string()]),
        };
        let style = OverlayStyle {
            blur_radius: 0.0,
            ..OverlayStyle::default()
        };
        let outcome = render_overlay(
            &mut image,
            &[block],
            translator,
            &style,
            &CancelFlag::default(),
        )
        .await
        .expect("render");
        assert!(outcome.lines.iter().all(|l| l.color == [0, 0, 120]));
    }
}

use anyhow::{Context, Result, anyhow};
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod image_prep;
pub mod logging;
pub mod ocr;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translator;

pub use image_prep::{PreparedImage, downscale, load_image};
pub use ocr::{
    BackgroundMode, CancelFlag, OverlayStyle, PlacedLine, RecognizedWord, Rect, TextBlock, TextLine,
    WordInfo,
};
pub use translator::{BlockTranslator, CommandTranslator, IdentityTranslator, TranslateFuture};

const FALLBACK_FONTS: &[&str] = &["DejaVu Sans", "Noto Sans", "Liberation Sans", "sans-serif"];

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image_path: PathBuf,
    pub words_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub min_confidence: Option<u32>,
    pub background: Option<BackgroundMode>,
    pub translate_command: Option<String>,
    pub settings_path: Option<String>,
    pub debug_boxes: bool,
}

#[derive(Debug, Clone)]
pub struct OverlayOutput {
    pub image: RgbaImage,
    pub blocks: Vec<TextBlock>,
    pub extracted_text: String,
    pub translated_text: String,
    /// Where each translated segment was drawn, in block/line order.
    pub lines: Vec<PlacedLine>,
}

/// Reconstructs blocks from `words` and paints their translation over `image`.
pub async fn translate_image<T: BlockTranslator>(
    mut image: RgbaImage,
    words: &[RecognizedWord],
    min_confidence: u32,
    translator: T,
    style: &OverlayStyle,
    cancel: &CancelFlag,
) -> Result<OverlayOutput> {
    let blocks = ocr::extract_blocks(words, min_confidence);
    let outcome = ocr::render_overlay(&mut image, &blocks, translator, style, cancel).await?;
    Ok(OverlayOutput {
        image,
        extracted_text: ocr::extracted_text(&blocks),
        translated_text: outcome.translated_text,
        lines: outcome.lines,
        blocks,
    })
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let prepared = load_image(&config.image_path, settings.max_image_size)?;
    let words = load_words(&config.words_path)?;
    let words = ocr::scale_words(words, prepared.scale);
    let min_confidence = config
        .min_confidence
        .unwrap_or(settings.min_confidence)
        .min(100);

    let style = build_style(&settings, config.background)?;
    let cancel = CancelFlag::default();
    let command = config
        .translate_command
        .clone()
        .or_else(|| settings.translate_command.clone());

    let output = match command {
        Some(command) => {
            let translator = CommandTranslator::new(command)?;
            translate_image(
                prepared.image,
                &words,
                min_confidence,
                translator,
                &style,
                &cancel,
            )
            .await?
        }
        None => {
            translate_image(
                prepared.image,
                &words,
                min_confidence,
                IdentityTranslator,
                &style,
                &cancel,
            )
            .await?
        }
    };
    info!(
        blocks = output.blocks.len(),
        source_chars = output.extracted_text.chars().count(),
        "overlay complete"
    );

    if let Some(path) = &config.output_path {
        output
            .image
            .save(path)
            .with_context(|| format!("failed to write image: {}", path.display()))?;
        if config.debug_boxes {
            let debug_path = debug_boxes_path(path);
            let boxed = draw_debug_boxes(output.image.clone(), &output.blocks);
            boxed
                .save(&debug_path)
                .with_context(|| format!("failed to write image: {}", debug_path.display()))?;
        }
    } else if config.debug_boxes {
        warn!("--debug-boxes needs --output; skipping");
    }

    Ok(output.translated_text)
}

pub fn load_words(path: &Path) -> Result<Vec<RecognizedWord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read words: {}", path.display()))?;
    parse_words(&content).with_context(|| format!("failed to parse words: {}", path.display()))
}

pub fn parse_words(content: &str) -> Result<Vec<RecognizedWord>> {
    let words: Vec<RecognizedWord> = serde_json::from_str(content)?;
    if let Some(word) = words
        .iter()
        .find(|word| !(0.0..=100.0).contains(&word.confidence))
    {
        return Err(anyhow!(
            "confidence out of range for '{}': {}",
            word.text,
            word.confidence
        ));
    }
    Ok(words)
}

fn build_style(
    settings: &settings::Settings,
    background: Option<BackgroundMode>,
) -> Result<OverlayStyle> {
    let font_path = settings.font_path.as_deref().map(Path::new);
    let font_family = settings.font_family.as_deref();
    let resolved = if font_path.is_some() || font_family.is_some() {
        Some(ocr::resolve_overlay_font(font_path, font_family, FALLBACK_FONTS)?)
    } else {
        match ocr::resolve_overlay_font(None, None, FALLBACK_FONTS) {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                warn!("no system font found, using estimated metrics: {}", err);
                None
            }
        }
    };

    Ok(OverlayStyle {
        background: background.unwrap_or(settings.background_mode),
        sample_margin: settings.sample_margin,
        blur_radius: settings.blur_radius,
        blur_alpha: settings.blur_alpha,
        min_font_size: settings.min_font_size,
        width_padding: settings.width_padding,
        font_family: resolved.as_ref().map(|font| font.family.clone()),
        font_metrics: resolved.map(|font| font.metrics),
    })
}

/// Outlines lines in green and blocks in red.
pub fn draw_debug_boxes(mut image: RgbaImage, blocks: &[TextBlock]) -> RgbaImage {
    for block in blocks {
        let mut block_box = Rect::default();
        for line in &block.lines {
            ocr::outline_rect(&mut image, &line.bounding_box, Rgba([0, 200, 83, 255]), 1);
            block_box.union(&line.bounding_box);
        }
        ocr::outline_rect(&mut image, &block_box, Rgba([220, 20, 20, 255]), 2);
    }
    image
}

fn debug_boxes_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let ext = output
        .extension()
        .map(|ext| ext.to_string_lossy().to_string())
        .unwrap_or_else(|| "png".to_string());
    output.with_file_name(format!("{}.boxes.{}", stem, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_words_fills_optional_flags() {
        let words = parse_words(
            r#"[{"text":"Hallo","confidence":91.5,"bounding_box":{"left":1,"top":2,"right":30,"bottom":20},"is_first_in_paragraph":true}]"#,
        )
        .expect("parse");
        assert_eq!(words.len(), 1);
        assert!(words[0].starts_line());
        assert!(!words[0].ends_line);
        assert_eq!(words[0].bounding_box, Rect::new(1, 2, 30, 20));
    }

    #[test]
    fn parse_words_rejects_out_of_range_confidence() {
        let err = parse_words(
            r#"[{"text":"x","confidence":140,"bounding_box":{"left":0,"top":0,"right":1,"bottom":1}}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence out of range"));
    }

    #[test]
    fn debug_path_sits_next_to_output() {
        assert_eq!(
            debug_boxes_path(Path::new("/tmp/out.jpg")),
            PathBuf::from("/tmp/out.boxes.jpg")
        );
    }

    #[test]
    fn debug_boxes_outline_lines() {
        let image = RgbaImage::from_pixel(40, 40, Rgba([255, 255, 255, 255]));
        let block = TextBlock {
            lines: vec![TextLine {
                text: "x".to_string(),
                bounding_box: Rect::new(5, 5, 30, 20),
                word_rects: vec![Rect::new(5, 5, 30, 20)],
            }],
        };
        let boxed = draw_debug_boxes(image, &[block]);
        assert_eq!(*boxed.get_pixel(5, 5), Rgba([220, 20, 20, 255]));
        assert_eq!(*boxed.get_pixel(15, 15), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn identity_pipeline_returns_source_text() {
        let image = RgbaImage::from_pixel(200, 60, Rgba([240, 240, 240, 255]));
        let words = parse_words(
            r#"[
                {"text":"hello","confidence":95,"bounding_box":{"left":10,"top":10,"right":60,"bottom":30},"is_first_in_paragraph":true},
                {"text":"world","confidence":95,"bounding_box":{"left":66,"top":10,"right":116,"bottom":30},"ends_line":true,"ends_paragraph":true}
            ]"#,
        )
        .expect("parse");
        let output = translate_image(
            image,
            &words,
            75,
            IdentityTranslator,
            &OverlayStyle::default(),
            &CancelFlag::default(),
        )
        .await
        .expect("pipeline");
        assert_eq!(output.extracted_text, "hello world");
        assert_eq!(output.translated_text, "hello world");
        assert_eq!(output.image.dimensions(), (200, 60));
        assert_eq!(output.lines.len(), 1);
        assert_eq!(output.lines[0].text.as_deref(), Some("hello world"));
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ocr_overlay_rust::BackgroundMode;

#[derive(Parser, Debug)]
#[command(
    name = "ocr-overlay-rust",
    version,
    about = "Rebuild text blocks from OCR words and paint their translation over the image"
)]
struct Cli {
    /// Source image (png/jpeg/...)
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// JSON array of recognized words for the image
    #[arg(short = 'w', long = "words")]
    words: PathBuf,

    /// Where to write the translated image
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Minimum word confidence, 0-100 (default from settings: 75)
    #[arg(short = 'c', long = "min-confidence")]
    min_confidence: Option<u32>,

    /// Erase/text color policy
    #[arg(short = 'b', long = "background", value_enum)]
    background: Option<BackgroundMode>,

    /// Shell command translating a JSON array of strings on stdin
    #[arg(short = 't', long = "translate-cmd")]
    translate_cmd: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Also write a copy with line and block boxes outlined
    #[arg(long = "debug-boxes")]
    debug_boxes: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_overlay_rust::logging::init(cli.verbose)?;

    let config = ocr_overlay_rust::Config {
        image_path: cli.image,
        words_path: cli.words,
        output_path: cli.output,
        min_confidence: cli.min_confidence,
        background: cli.background,
        translate_command: cli.translate_cmd,
        settings_path: cli.read_settings,
        debug_boxes: cli.debug_boxes,
    };
    let translated = ocr_overlay_rust::run(config).await?;
    if !translated.is_empty() {
        println!("{}", translated);
    }
    Ok(())
}

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::{BackgroundMode, DEFAULT_MIN_CONFIDENCE};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub min_confidence: u32,
    pub max_image_size: u32,
    pub background_mode: BackgroundMode,
    pub sample_margin: i32,
    pub blur_radius: f32,
    pub blur_alpha: f32,
    pub min_font_size: f32,
    pub width_padding: f32,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub translate_command: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_image_size: 1500,
            background_mode: BackgroundMode::Auto,
            sample_margin: 16,
            blur_radius: 8.0,
            blur_alpha: 0.5,
            min_font_size: 8.0,
            width_padding: 0.95,
            font_path: None,
            font_family: None,
            translate_command: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    overlay: Option<OverlaySettings>,
    translator: Option<TranslatorSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    min_confidence: Option<u32>,
    max_image_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    background_mode: Option<BackgroundMode>,
    sample_margin: Option<i32>,
    blur_radius: Option<f32>,
    blur_alpha: Option<f32>,
    min_font_size: Option<f32>,
    width_padding: Option<f32>,
    font_path: Option<String>,
    font_family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSettings {
    command: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(confidence) = ocr.min_confidence {
                self.min_confidence = confidence.min(100);
            }
            if let Some(size) = ocr.max_image_size {
                self.max_image_size = size;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(mode) = overlay.background_mode {
                self.background_mode = mode;
            }
            if let Some(margin) = overlay.sample_margin {
                if margin > 0 {
                    self.sample_margin = margin;
                }
            }
            if let Some(radius) = overlay.blur_radius {
                if radius >= 0.0 {
                    self.blur_radius = radius;
                }
            }
            if let Some(alpha) = overlay.blur_alpha {
                self.blur_alpha = alpha.clamp(0.0, 1.0);
            }
            if let Some(size) = overlay.min_font_size {
                if size > 0.0 {
                    self.min_font_size = size;
                }
            }
            if let Some(padding) = overlay.width_padding {
                if padding > 0.0 {
                    self.width_padding = padding;
                }
            }
            if let Some(path) = overlay.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(family) = overlay.font_family {
                if !family.trim().is_empty() {
                    self.font_family = Some(family);
                }
            }
        }
        if let Some(translator) = incoming.translator {
            if let Some(command) = translator.command {
                if !command.trim().is_empty() {
                    self.translate_command = Some(command);
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-overlay-rust"))
        }
    })
}

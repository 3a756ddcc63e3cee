//! Core types for room redesigns.

use crate::error::{MonospaceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy). Room photos are usually JPEG.
    #[default]
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parses a MIME type such as `image/png`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Interior design aesthetics a room can be redesigned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoomStyle {
    /// Playful, trend-driven Gen Z interiors.
    GenZ,
    /// Bold, saturated palettes.
    Colorful,
    /// Clean lines and empty space.
    #[default]
    Minimalist,
    /// Premium materials and statement pieces.
    Luxury,
    /// Moody, dark palettes.
    Dark,
    /// Blues, greys and cool whites.
    CoolTone,
    /// Earthy, warm palettes.
    WarmTone,
    /// Contemporary modern.
    Modern,
    /// Vintage, old-world character.
    OldAesthetic,
    /// Sci-fi inspired forms and lighting.
    Futuristic,
    /// RGB lighting and battlestation setups.
    GamerTech,
    /// Exposed brick, metal and concrete.
    Industrial,
    /// Layered textiles, plants and patterns.
    Bohemian,
    /// Light woods and Nordic simplicity.
    Scandinavian,
}

impl RoomStyle {
    /// Every style, in display order.
    pub const ALL: [RoomStyle; 14] = [
        Self::GenZ,
        Self::Colorful,
        Self::Minimalist,
        Self::Luxury,
        Self::Dark,
        Self::CoolTone,
        Self::WarmTone,
        Self::Modern,
        Self::OldAesthetic,
        Self::Futuristic,
        Self::GamerTech,
        Self::Industrial,
        Self::Bohemian,
        Self::Scandinavian,
    ];

    /// Human-readable name, also used verbatim in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GenZ => "Gen Z",
            Self::Colorful => "Colorful",
            Self::Minimalist => "Minimalist",
            Self::Luxury => "Luxury",
            Self::Dark => "Dark",
            Self::CoolTone => "Cool Tone",
            Self::WarmTone => "Warm Tone",
            Self::Modern => "Modern",
            Self::OldAesthetic => "Old Aesthetic",
            Self::Futuristic => "Futuristic",
            Self::GamerTech => "Gamer Tech",
            Self::Industrial => "Industrial",
            Self::Bohemian => "Bohemian",
            Self::Scandinavian => "Scandinavian",
        }
    }

    /// Kebab-case identifier for command lines and tool arguments.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::GenZ => "gen-z",
            Self::Colorful => "colorful",
            Self::Minimalist => "minimalist",
            Self::Luxury => "luxury",
            Self::Dark => "dark",
            Self::CoolTone => "cool-tone",
            Self::WarmTone => "warm-tone",
            Self::Modern => "modern",
            Self::OldAesthetic => "old-aesthetic",
            Self::Futuristic => "futuristic",
            Self::GamerTech => "gamer-tech",
            Self::Industrial => "industrial",
            Self::Bohemian => "bohemian",
            Self::Scandinavian => "scandinavian",
        }
    }
}

impl fmt::Display for RoomStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RoomStyle {
    type Err = String;

    /// Accepts either the label (`"Cool Tone"`) or the slug (`"cool-tone"`),
    /// ignoring case.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|style| {
                style.slug().eq_ignore_ascii_case(wanted) || style.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.slug()).collect();
                format!("unknown style '{}'. Valid styles: {}", s, known.join(", "))
            })
    }
}

/// A request to redesign a photographed room.
#[derive(Debug, Clone)]
pub struct RedesignRequest {
    /// Photo of the room (raw bytes).
    pub image: Vec<u8>,
    /// Target aesthetic.
    pub style: RoomStyle,
    /// Extra wishes from the user, appended to the prompt.
    pub additional_prompt: Option<String>,
}

impl RedesignRequest {
    /// Creates a request for `image` in `style`.
    pub fn new(image: Vec<u8>, style: RoomStyle) -> Self {
        Self {
            image,
            style,
            additional_prompt: None,
        }
    }

    /// Adds user requirements. Blank text is ignored.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.additional_prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
        self
    }

    /// MIME type of the photo, falling back to JPEG when unrecognised.
    pub fn image_mime_type(&self) -> &'static str {
        ImageFormat::from_magic_bytes(&self.image)
            .unwrap_or_default()
            .mime_type()
    }

    /// Rejects requests that cannot produce a redesign.
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(MonospaceError::InvalidRequest(
                "a photo of the room is required".into(),
            ));
        }
        Ok(())
    }

    /// The instruction sent alongside the photo.
    pub fn prompt(&self) -> String {
        let style = self.style.label();
        let mut prompt = format!(
            "Generate a photorealistic image of this room redesigned in a \"{style}\" interior design style.\n\
             \n\
             Instructions:\n\
             - You must generate an image. Do not output text.\n\
             - Keep the exact structural perspective and geometry of the original photo (walls, windows, doors, ceiling).\n\
             - Replace the furniture, decor, flooring and wall finishes so they strictly match the \"{style}\" aesthetic.\n"
        );
        if let Some(extra) = &self.additional_prompt {
            prompt.push_str(&format!("- User requirement: {}\n", extra.trim()));
        }
        prompt
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Style the room was redesigned in.
    pub style: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat, metadata: GenerationMetadata) -> Self {
        Self {
            data,
            format,
            metadata,
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            self.to_base64()
        )
    }
}

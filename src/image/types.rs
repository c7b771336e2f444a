//! Core types for image generation.

use crate::error::{GenPixError, Result};
use crate::image::locator::ImageLocator;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fewest images a batched request will produce work for.
pub const MIN_IMAGE_COUNT: u32 = 1;
/// Most images a batched request may ask for.
pub const MAX_IMAGE_COUNT: u32 = 5;

/// Clamps a requested image count into `[MIN_IMAGE_COUNT, MAX_IMAGE_COUNT]`.
pub fn clamp_image_count(count: u32) -> u32 {
    count.clamp(MIN_IMAGE_COUNT, MAX_IMAGE_COUNT)
}

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
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

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// DALL-E 3 proxy. One image per request, returned as a URL.
    Dalle3,
    /// Flux proxy. One image per call, returned as raw bytes.
    Flux,
}

impl ImageProviderKind {
    /// All provider kinds, primary first.
    pub const ALL: [ImageProviderKind; 2] = [Self::Dalle3, Self::Flux];

    /// Returns the wire token for this provider (`"dalle3"` / `"flux"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dalle3 => "dalle3",
            Self::Flux => "flux",
        }
    }

    /// Returns true if multi-image requests are served by issuing one call
    /// per image.
    pub fn is_batched(&self) -> bool {
        matches!(self, Self::Flux)
    }

    /// Aspect ratios offered for this provider.
    pub fn supported_aspect_ratios(&self) -> &'static [AspectRatio] {
        match self {
            Self::Dalle3 => &[
                AspectRatio::Square,
                AspectRatio::Landscape,
                AspectRatio::Portrait,
            ],
            Self::Flux => &AspectRatio::ALL,
        }
    }

    /// Returns true if `ratio` is offered for this provider.
    pub fn supports(&self, ratio: AspectRatio) -> bool {
        self.supported_aspect_ratios().contains(&ratio)
    }
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageProviderKind {
    type Err = GenPixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dalle3" | "dall-e-3" => Ok(Self::Dalle3),
            "flux" => Ok(Self::Flux),
            other => Err(GenPixError::InvalidRequest(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Whether an aspect ratio is square, wider than tall, or taller than wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Square,
    Landscape,
    Portrait,
}

/// Aspect ratios accepted by the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 standard landscape aspect ratio.
    #[serde(rename = "4:3")]
    Standard,
    /// 3:2 photo landscape aspect ratio.
    #[serde(rename = "3:2")]
    ThreeTwo,
    /// 5:4 near-square landscape aspect ratio.
    #[serde(rename = "5:4")]
    FiveFour,
    /// 2:3 photo portrait aspect ratio.
    #[serde(rename = "2:3")]
    TwoThree,
    /// 3:4 standard portrait aspect ratio.
    #[serde(rename = "3:4")]
    StandardPortrait,
    /// 4:5 near-square portrait aspect ratio.
    #[serde(rename = "4:5")]
    FourFive,
}

impl AspectRatio {
    /// Every supported ratio, in menu order.
    pub const ALL: [AspectRatio; 9] = [
        Self::Square,
        Self::Landscape,
        Self::Portrait,
        Self::Standard,
        Self::ThreeTwo,
        Self::FiveFour,
        Self::TwoThree,
        Self::StandardPortrait,
        Self::FourFive,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::ThreeTwo => "3:2",
            Self::FiveFour => "5:4",
            Self::TwoThree => "2:3",
            Self::StandardPortrait => "3:4",
            Self::FourFive => "4:5",
        }
    }

    /// Nominal pixel dimensions `(width, height)` used for display.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Square => (1024, 1024),
            Self::Landscape => (1792, 1024),
            Self::Portrait => (1024, 1792),
            Self::Standard => (1024, 768),
            Self::ThreeTwo => (1024, 683),
            Self::FiveFour => (1024, 819),
            Self::TwoThree => (683, 1024),
            Self::StandardPortrait => (768, 1024),
            Self::FourFive => (819, 1024),
        }
    }

    pub fn orientation(&self) -> Orientation {
        let (w, h) = self.dimensions();
        match w.cmp(&h) {
            std::cmp::Ordering::Equal => Orientation::Square,
            std::cmp::Ordering::Greater => Orientation::Landscape,
            std::cmp::Ordering::Less => Orientation::Portrait,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = GenPixError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| GenPixError::InvalidRequest(format!("unsupported aspect ratio: {s}")))
    }
}

/// A request to generate one or more images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Backend that should serve the request.
    pub provider: ImageProviderKind,
    /// Desired aspect ratio.
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Number of images wanted. Only batched providers honor it.
    #[serde(default = "default_image_count")]
    pub image_count: u32,
}

fn default_image_count() -> u32 {
    MIN_IMAGE_COUNT
}

impl GenerationRequest {
    /// Creates a new single-image, square request.
    pub fn new(prompt: impl Into<String>, provider: ImageProviderKind) -> Self {
        Self {
            prompt: prompt.into(),
            provider,
            aspect_ratio: AspectRatio::default(),
            image_count: MIN_IMAGE_COUNT,
        }
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the number of images, clamped to `[1, 5]`.
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = clamp_image_count(count);
        self
    }

    /// The image count actually used when dispatching.
    pub fn effective_image_count(&self) -> u32 {
        if self.provider.is_batched() {
            clamp_image_count(self.image_count)
        } else {
            MIN_IMAGE_COUNT
        }
    }

    /// Rejects requests that must never reach the network.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(GenPixError::InvalidRequest(
                "Please enter a prompt to generate an image.".into(),
            ));
        }
        Ok(())
    }
}

/// A generated image and where to find its bytes.
#[derive(Debug)]
#[must_use = "generated images hold a locator that should be displayed or released"]
pub struct GeneratedImage {
    /// Where the image bytes live.
    pub locator: ImageLocator,
    /// Provider that generated this image.
    pub provider: ImageProviderKind,
    /// Prompt the image was generated from.
    pub prompt: String,
    /// Aspect ratio that was requested.
    pub aspect_ratio: AspectRatio,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(
        locator: ImageLocator,
        provider: ImageProviderKind,
        prompt: impl Into<String>,
        aspect_ratio: AspectRatio,
    ) -> Self {
        Self {
            locator,
            provider,
            prompt: prompt.into(),
            aspect_ratio,
        }
    }

    /// Format detected from locally held bytes, if any.
    pub fn detected_format(&self) -> Option<ImageFormat> {
        self.locator
            .local_bytes()
            .and_then(|data| ImageFormat::from_magic_bytes(&data))
    }

    /// Returns a file stem like `flux-1718000000000`.
    pub fn suggested_stem(&self) -> String {
        format!("{}-{}", self.provider, chrono::Utc::now().timestamp_millis())
    }

    /// Returns a download file name like `flux-1718000000000.png`.
    pub fn suggested_filename(&self, format: ImageFormat) -> String {
        format!("{}.{}", self.suggested_stem(), format.extension())
    }

    /// Returns locally held bytes as a data URL. `None` for remote images.
    pub fn to_data_url(&self) -> Option<String> {
        use base64::Engine;

        let data = self.locator.local_bytes()?;
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or_default();
        Some(format!(
            "data:{};base64,{}",
            format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&data)
        ))
    }

    /// Releases any local storage held by this image.
    pub fn release(self) {
        self.locator.release();
    }
}

/// Uniform outcome of a generation request.
#[derive(Debug, Default)]
pub struct GenerationResult {
    /// Images in request order.
    pub images: Vec<GeneratedImage>,
    /// Describes failures when some or all images could not be produced.
    pub warning: Option<String>,
}

impl GenerationResult {
    /// A result with images and no warning.
    pub fn success(images: Vec<GeneratedImage>) -> Self {
        Self {
            images,
            warning: None,
        }
    }

    /// A result with no images, carrying the reason.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            images: Vec::new(),
            warning: Some(message.into()),
        }
    }

    /// Returns true if no images were produced.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Returns true if some images were produced and some failed.
    pub fn is_partial(&self) -> bool {
        !self.images.is_empty() && self.warning.is_some()
    }
}

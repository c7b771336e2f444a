//! Aspect-ratio encodings for each provider's wire format.

use crate::image::types::{AspectRatio, Orientation};
use serde::{Deserialize, Serialize};

/// Shape parameter understood by the DALL-E 3 proxy (`type=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeToken {
    #[default]
    Square,
    Wide,
    Tall,
}

impl ShapeToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Wide => "wide",
            Self::Tall => "tall",
        }
    }

    /// Parses a token, falling back to `square` for anything unknown.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "wide" => Self::Wide,
            "tall" => Self::Tall,
            _ => Self::Square,
        }
    }
}

impl std::fmt::Display for ShapeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a ratio to the DALL-E 3 shape token.
///
/// Only 1:1, 16:9 and 9:16 have exact equivalents. Portrait ratios fall
/// back to `tall`; the mild landscape ratios (4:3, 3:2, 5:4) render as
/// `square`, matching what the proxy produces best for them.
pub fn to_shape_token(ratio: AspectRatio) -> ShapeToken {
    match ratio {
        AspectRatio::Square => ShapeToken::Square,
        AspectRatio::Landscape => ShapeToken::Wide,
        AspectRatio::Portrait => ShapeToken::Tall,
        other => match other.orientation() {
            Orientation::Portrait => ShapeToken::Tall,
            Orientation::Square | Orientation::Landscape => ShapeToken::Square,
        },
    }
}

/// Maps a ratio to the Flux proxy's `ratio=` code, in `1..=9`.
pub fn to_shape_code(ratio: AspectRatio) -> u8 {
    match ratio {
        AspectRatio::Square => 1,
        AspectRatio::Landscape => 2,
        AspectRatio::Standard => 3,
        AspectRatio::ThreeTwo => 4,
        AspectRatio::FiveFour => 5,
        AspectRatio::Portrait => 6,
        AspectRatio::TwoThree => 7,
        AspectRatio::StandardPortrait => 8,
        AspectRatio::FourFive => 9,
    }
}

/// Shape code for a raw ratio string; unknown strings map to `1`.
pub fn shape_code_for_token(ratio: &str) -> u8 {
    ratio.parse::<AspectRatio>().map(to_shape_code).unwrap_or(1)
}

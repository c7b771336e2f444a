//! Image generation module.

pub mod aspect;
pub mod batch;
mod fetch;
mod locator;
mod provider;
pub mod providers;
mod types;

pub use aspect::{shape_code_for_token, to_shape_code, to_shape_token, ShapeToken};
pub use batch::{run_batched, BatchConfig, BatchReport, BATCH_DELAY, MAX_CONCURRENT};
pub use fetch::{fetch_with_timeout, FetchOutcome, DEFAULT_FETCH_TIMEOUT};
pub use locator::{BlobHandle, BlobStore, ImageLocator};
pub use provider::ImageProvider;
pub use types::{
    clamp_image_count, AspectRatio, GeneratedImage, GenerationRequest, GenerationResult,
    ImageFormat, ImageProviderKind, Orientation, MAX_IMAGE_COUNT, MIN_IMAGE_COUNT,
};

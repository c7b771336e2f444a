#![warn(missing_docs)]
//! GenPix - prompt-to-image generation across DALL-E 3 and Flux.
//!
//! Both backends sit behind one [`ImageProvider`] contract. DALL-E 3 returns
//! a single hosted image per request; Flux returns raw bytes one image per
//! call, so multi-image Flux requests are fanned out in bounded, paced
//! batches and partial failures are reported as a warning instead of an
//! error.
//!
//! # Quick Start
//!
//! ```no_run
//! use genpix::{AspectRatio, GenerationRequest, ImageProviderKind, ImageService};
//!
//! #[tokio::main]
//! async fn main() -> genpix::Result<()> {
//!     let service = ImageService::from_env()?;
//!     let request = GenerationRequest::new("A lighthouse in a storm", ImageProviderKind::Flux)
//!         .with_aspect_ratio(AspectRatio::Landscape)
//!         .with_image_count(3);
//!
//!     let result = service.generate(&request).await?;
//!     if let Some(warning) = &result.warning {
//!         eprintln!("warning: {warning}");
//!     }
//!     for image in &result.images {
//!         service.download(image, ".").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `dalle3-image`: DALL-E 3 proxy (`DALLE3_API_KEY`, `DALLE3_BASE_URL`)
//! - `flux-image`: Flux proxy (`FLUX_BASE_URL`)
//! - `image`: All image providers (default)
//! - `cli`: Command-line interface

mod error;
pub mod image;
mod service;

// Re-export error types at crate root
pub use error::{GenPixError, Result};

pub use image::{
    AspectRatio, BatchConfig, BlobHandle, BlobStore, FetchOutcome, GeneratedImage,
    GenerationRequest, GenerationResult, ImageFormat, ImageLocator, ImageProvider,
    ImageProviderKind,
};
pub use service::{ImageService, ImageServiceBuilder};

#[cfg(feature = "dalle3-image")]
pub use image::providers::{Dalle3Provider, Dalle3ProviderBuilder};

#[cfg(feature = "flux-image")]
pub use image::providers::{FluxProvider, FluxProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GenPixError, Result};
    pub use crate::image::{
        AspectRatio, GeneratedImage, GenerationRequest, GenerationResult, ImageProvider,
        ImageProviderKind,
    };
    pub use crate::service::ImageService;

    #[cfg(feature = "dalle3-image")]
    pub use crate::image::providers::Dalle3Provider;

    #[cfg(feature = "flux-image")]
    pub use crate::image::providers::FluxProvider;
}

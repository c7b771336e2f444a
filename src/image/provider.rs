//! Image provider trait.

use crate::image::types::{GenerationRequest, GenerationResult, ImageProviderKind};
use async_trait::async_trait;

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Serves a request.
    ///
    /// Never fails: transport and protocol problems are reported through
    /// [`GenerationResult::warning`]. A result with no images always carries
    /// a warning.
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;

    /// Returns the kind of this provider.
    fn kind(&self) -> ImageProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ImageProviderKind::Dalle3 => "DALL-E 3",
            ImageProviderKind::Flux => "Flux",
        }
    }
}

//! Flux proxy provider.
//!
//! `GET <base>?prompt=..&ratio=1..9` answers with raw image bytes, one image
//! per call. Multi-image requests go through the batch orchestrator and the
//! bytes are parked in a [`BlobStore`].

use crate::error::{GenPixError, Result};
use crate::image::aspect::to_shape_code;
use crate::image::batch::{run_batched, BatchConfig};
use crate::image::fetch::{fetch_with_timeout, FetchOutcome, DEFAULT_FETCH_TIMEOUT};
use crate::image::locator::{BlobStore, ImageLocator};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    clamp_image_count, AspectRatio, GeneratedImage, GenerationRequest, GenerationResult,
    ImageProviderKind,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, PRAGMA};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://fluxpro-v3-by-nzr.onrender.com/fluxpro";

/// Builder for FluxProvider.
#[derive(Debug, Clone)]
pub struct FluxProviderBuilder {
    base_url: Option<String>,
    timeout: Duration,
    batch: BatchConfig,
    blob_store: Option<BlobStore>,
}

impl Default for FluxProviderBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_FETCH_TIMEOUT,
            batch: BatchConfig::default(),
            blob_store: None,
        }
    }
}

impl FluxProviderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint. Falls back to `FLUX_BASE_URL`, then the public proxy.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the ceiling on each single-image call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.batch.max_concurrent = max_concurrent;
        self
    }

    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch.batch_delay = delay;
        self
    }

    /// Stores downloaded images in `store` instead of a private one.
    pub fn blob_store(mut self, store: BlobStore) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn build(self) -> Result<FluxProvider> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("FLUX_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        reqwest::Url::parse(&base_url)
            .map_err(|e| GenPixError::InvalidRequest(format!("invalid Flux URL: {e}")))?;

        Ok(FluxProvider {
            client: reqwest::Client::new(),
            base_url,
            timeout: self.timeout,
            batch: self.batch,
            blobs: self.blob_store.unwrap_or_default(),
        })
    }
}

/// Flux image generation provider.
pub struct FluxProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    batch: BatchConfig,
    blobs: BlobStore,
}

impl FluxProvider {
    pub fn builder() -> FluxProviderBuilder {
        FluxProviderBuilder::new()
    }

    /// Store holding the bytes of images this provider produced.
    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    /// Generates up to `image_count` images (clamped to `[1, 5]`), one call
    /// per image, in paced batches.
    pub async fn generate_images(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        image_count: u32,
    ) -> GenerationResult {
        let count = clamp_image_count(image_count);
        let code = to_shape_code(aspect_ratio);

        let report = run_batched(count, &self.batch, |i| {
            self.fetch_single(prompt, code, i + 1, count)
        })
        .await;

        let warning = report.warning();
        let images = report
            .images
            .into_iter()
            .map(|locator| {
                GeneratedImage::new(locator, ImageProviderKind::Flux, prompt, aspect_ratio)
            })
            .collect();

        GenerationResult { images, warning }
    }

    /// Performs exactly one provider call for image `index` of `total`.
    pub async fn fetch_single(&self, prompt: &str, code: u8, index: u32, total: u32) -> FetchOutcome {
        tracing::debug!(index, total, ratio = code, "fetching Flux image");

        match fetch_with_timeout(self.timeout, self.request_image(prompt, code)).await {
            FetchOutcome::Failure { message } => FetchOutcome::failure(format!("Flux: {message}")),
            success => success,
        }
    }

    async fn request_image(&self, prompt: &str, code: u8) -> Result<ImageLocator> {
        let ratio = code.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("prompt", prompt), ("ratio", ratio.as_str())])
            .header(ACCEPT, "image/*, application/json")
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenPixError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(GenPixError::UnexpectedResponse(
                "empty image body".into(),
            ));
        }

        Ok(ImageLocator::Local(self.blobs.insert(data)))
    }
}

#[async_trait]
impl ImageProvider for FluxProvider {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_images(
            &request.prompt,
            request.aspect_ratio,
            request.effective_image_count(),
        )
        .await
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Flux
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let provider = FluxProviderBuilder::new().build().unwrap();
        assert_eq!(provider.batch, BatchConfig::default());
        assert_eq!(provider.timeout, DEFAULT_FETCH_TIMEOUT);
        assert_eq!(provider.kind(), ImageProviderKind::Flux);
    }

    #[test]
    fn test_builder_overrides() {
        let store = BlobStore::new();
        let provider = FluxProvider::builder()
            .base_url("http://127.0.0.1:9/flux")
            .timeout(Duration::from_secs(5))
            .max_concurrent(3)
            .batch_delay(Duration::ZERO)
            .blob_store(store.clone())
            .build()
            .unwrap();

        assert_eq!(provider.base_url, "http://127.0.0.1:9/flux");
        assert_eq!(provider.batch.max_concurrent, 3);
        assert!(provider.batch.batch_delay.is_zero());
        assert_eq!(provider.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let provider = FluxProvider::builder().base_url("::nope").build();
        assert!(matches!(provider, Err(GenPixError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_reported_not_raised() {
        // Port 9 (discard) is closed on test hosts; the call must fail fast.
        let provider = FluxProvider::builder()
            .base_url("http://127.0.0.1:9/flux")
            .timeout(Duration::from_secs(5))
            .batch_delay(Duration::ZERO)
            .build()
            .unwrap();

        let result = provider.generate_images("a fox", AspectRatio::Square, 2).await;
        assert!(result.images.is_empty());
        assert!(result.warning.unwrap().starts_with("no images generated"));
        assert_eq!(provider.blob_store().live_count(), 0);
    }
}

//! DALL-E 3 proxy provider.
//!
//! `GET <base>?prompt=..&type=square|wide|tall&apikey=..` answers with JSON
//! holding a hosted `image_url`.

use crate::error::{sanitize_error_message, GenPixError, Result};
use crate::image::aspect::{to_shape_token, ShapeToken};
use crate::image::fetch::{fetch_with_timeout, FetchOutcome, DEFAULT_FETCH_TIMEOUT};
use crate::image::locator::ImageLocator;
use crate::image::provider::ImageProvider;
use crate::image::types::{
    AspectRatio, GeneratedImage, GenerationRequest, GenerationResult, ImageProviderKind,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://for-devs.ddns.net/api/dalle3";

/// Builder for Dalle3Provider.
#[derive(Debug, Clone)]
pub struct Dalle3ProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
}

impl Default for Dalle3ProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl Dalle3ProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `DALLE3_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the endpoint. Falls back to `DALLE3_BASE_URL`, then the public proxy.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the ceiling on a single request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key and endpoint.
    pub fn build(self) -> Result<Dalle3Provider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("DALLE3_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GenPixError::Auth("DALLE3_API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .or_else(|| std::env::var("DALLE3_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        reqwest::Url::parse(&base_url)
            .map_err(|e| GenPixError::InvalidRequest(format!("invalid DALL-E 3 URL: {e}")))?;

        Ok(Dalle3Provider {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            timeout: self.timeout,
        })
    }
}

/// DALL-E 3 image generation provider.
pub struct Dalle3Provider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl Dalle3Provider {
    /// Creates a new `Dalle3ProviderBuilder`.
    pub fn builder() -> Dalle3ProviderBuilder {
        Dalle3ProviderBuilder::new()
    }

    /// Generates at most one image for `prompt`.
    pub async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> GenerationResult {
        match self.fetch_single(prompt, aspect_ratio).await {
            FetchOutcome::Success { locator } => GenerationResult::success(vec![
                GeneratedImage::new(locator, ImageProviderKind::Dalle3, prompt, aspect_ratio),
            ]),
            FetchOutcome::Failure { message } => GenerationResult::failed(message),
        }
    }

    /// Performs exactly one provider call under the configured timeout.
    pub async fn fetch_single(&self, prompt: &str, aspect_ratio: AspectRatio) -> FetchOutcome {
        let shape = to_shape_token(aspect_ratio);
        tracing::debug!(%shape, ratio = %aspect_ratio, "fetching DALL-E 3 image");

        match fetch_with_timeout(self.timeout, self.request_image(prompt, shape)).await {
            FetchOutcome::Failure { message } => {
                tracing::warn!("DALL-E 3 generation failed: {message}");
                FetchOutcome::failure(format!("DALL-E 3: {message}"))
            }
            success => success,
        }
    }

    async fn request_image(&self, prompt: &str, shape: ShapeToken) -> Result<ImageLocator> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("prompt", prompt),
                ("type", shape.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenPixError::Api {
                status: status.as_u16(),
                message: sanitize_error_message(&text),
            });
        }

        let text = response.text().await?;
        let body: Dalle3Response = serde_json::from_str(&text)?;
        tracing::debug!(shape = ?body.shape, quality = ?body.quality, "DALL-E 3 responded");

        body.image_url
            .filter(|url| !url.trim().is_empty())
            .map(ImageLocator::Remote)
            .ok_or_else(|| {
                GenPixError::UnexpectedResponse("no image produced (missing image_url)".into())
            })
    }
}

#[async_trait]
impl ImageProvider for Dalle3Provider {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_image(&request.prompt, request.aspect_ratio)
            .await
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Dalle3
    }
}

#[derive(Debug, Deserialize)]
struct Dalle3Response {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, rename = "type")]
    shape: Option<String>,
    #[serde(default)]
    quality: Option<String>,
}

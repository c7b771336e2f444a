//! Provider dispatch and downloads.
//!
//! [`ImageService`] is the single entry point callers use: it validates a
//! [`GenerationRequest`], hands it to the registered provider, and turns a
//! result without images into [`GenPixError::GenerationFailed`].

use crate::error::{GenPixError, Result};
use crate::image::{
    GeneratedImage, GenerationRequest, GenerationResult, ImageFormat, ImageLocator, ImageProvider,
    ImageProviderKind, DEFAULT_FETCH_TIMEOUT,
};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const NO_IMAGES_MESSAGE: &str = "No images were generated.";

/// Builder for ImageService.
#[derive(Default)]
pub struct ImageServiceBuilder {
    providers: HashMap<ImageProviderKind, Arc<dyn ImageProvider>>,
    disabled: HashMap<ImageProviderKind, String>,
    download_timeout: Option<Duration>,
}

impl ImageServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its own kind, replacing any previous one.
    pub fn provider(self, provider: impl ImageProvider + 'static) -> Self {
        self.shared_provider(Arc::new(provider))
    }

    /// Registers an already shared provider.
    pub fn shared_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.disabled.remove(&provider.kind());
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Records why `kind` could not be configured. The reason is reported
    /// when a request targets that provider.
    #[cfg_attr(not(feature = "dalle3-image"), allow(dead_code))]
    pub(crate) fn disabled(mut self, kind: ImageProviderKind, reason: impl Into<String>) -> Self {
        if !self.providers.contains_key(&kind) {
            self.disabled.insert(kind, reason.into());
        }
        self
    }

    /// Sets the ceiling for fetching a remote image in [`ImageService::download`].
    /// Defaults to 60 seconds.
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ImageService {
        ImageService {
            providers: self.providers,
            disabled: self.disabled,
            client: reqwest::Client::new(),
            download_timeout: self.download_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

/// Dispatches generation requests to registered providers.
pub struct ImageService {
    providers: HashMap<ImageProviderKind, Arc<dyn ImageProvider>>,
    disabled: HashMap<ImageProviderKind, String>,
    client: reqwest::Client,
    download_timeout: Duration,
}

impl ImageService {
    pub fn builder() -> ImageServiceBuilder {
        ImageServiceBuilder::new()
    }

    /// Registers every provider whose configuration is available in the
    /// environment. DALL-E 3 is skipped when `DALLE3_API_KEY` is unset.
    pub fn from_env() -> Result<Self> {
        #[allow(unused_mut)]
        let mut builder = Self::builder();

        #[cfg(feature = "dalle3-image")]
        {
            match crate::image::providers::Dalle3Provider::builder().build() {
                Ok(provider) => builder = builder.provider(provider),
                Err(GenPixError::Auth(reason)) => {
                    tracing::debug!("DALL-E 3 provider disabled: {reason}");
                    builder = builder.disabled(ImageProviderKind::Dalle3, reason);
                }
                Err(e) => return Err(e),
            }
        }

        #[cfg(feature = "flux-image")]
        {
            builder = builder.provider(crate::image::providers::FluxProvider::builder().build()?);
        }

        Ok(builder.build())
    }

    /// Returns true if a provider of `kind` is registered.
    pub fn has_provider(&self, kind: ImageProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Generates images for `request`.
    ///
    /// Returns `Ok` with every produced image, plus a warning when some calls
    /// failed. Returns `Err` when the request is invalid, no provider serves
    /// it, or no image was produced at all.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;

        let provider = self.providers.get(&request.provider).ok_or_else(|| {
            let message = match self.disabled.get(&request.provider) {
                Some(reason) => format!("{} is not configured: {reason}", request.provider),
                None => format!("{} is not configured", request.provider),
            };
            GenPixError::ProviderNotAvailable(message)
        })?;

        let count = request.effective_image_count();
        tracing::info!(
            provider = %request.provider,
            ratio = %request.aspect_ratio,
            count,
            "generating images"
        );

        let mut result = provider.generate(request).await;

        if result.images.is_empty() {
            let message = result
                .warning
                .filter(|w| !w.trim().is_empty())
                .unwrap_or_else(|| NO_IMAGES_MESSAGE.to_string());
            tracing::warn!(provider = %request.provider, "generation failed: {message}");
            return Err(GenPixError::GenerationFailed(message));
        }

        if result.images.len() > count as usize {
            tracing::warn!(
                returned = result.images.len(),
                count,
                "provider returned more images than requested"
            );
            result.images.truncate(count as usize);
        }

        match &result.warning {
            Some(warning) => tracing::warn!(
                provider = %request.provider,
                produced = result.images.len(),
                "partial success: {warning}"
            ),
            None => tracing::info!(
                provider = %request.provider,
                produced = result.images.len(),
                "generation complete"
            ),
        }

        Ok(result)
    }

    /// Writes `image` into `dir` and returns the file path.
    ///
    /// Remote images are downloaded within the download timeout; local
    /// images are read from their blob. Existing files are never
    /// overwritten, including by concurrent downloads into the same `dir`.
    pub async fn download(&self, image: &GeneratedImage, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let data = match &image.locator {
            ImageLocator::Remote(url) => {
                tokio::time::timeout(self.download_timeout, self.fetch_remote(url))
                    .await
                    .map_err(|_| GenPixError::Timeout(self.download_timeout))??
            }
            ImageLocator::Local(handle) => handle
                .bytes()
                .ok_or_else(|| GenPixError::BlobReleased(handle.address()))?,
        };

        let format = ImageFormat::from_magic_bytes(&data).unwrap_or_default();
        let dir = dir.as_ref();
        let stem = image.suggested_stem();
        let mut path = dir.join(format!("{stem}.{}", format.extension()));
        let mut suffix = 1;
        let mut file = loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    path = dir.join(format!("{stem}-{suffix}.{}", format.extension()));
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(&data).await?;
        file.flush().await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "saved image");
        Ok(path)
    }

    async fn fetch_remote(&self, url: &str) -> Result<bytes::Bytes> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenPixError::Api {
                status: status.as_u16(),
                message: "failed to download image".into(),
            });
        }
        Ok(response.bytes().await?)
    }
}

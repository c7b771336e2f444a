//! Image generation providers.

#[cfg(feature = "dalle3-image")]
mod dalle3;
#[cfg(feature = "flux-image")]
mod flux;

#[cfg(feature = "dalle3-image")]
pub use dalle3::{Dalle3Provider, Dalle3ProviderBuilder};

#[cfg(feature = "flux-image")]
pub use flux::{FluxProvider, FluxProviderBuilder};

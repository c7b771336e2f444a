//! CLI for GenPix - prompt-to-image generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genpix::{AspectRatio, GeneratedImage, GenerationRequest, ImageProviderKind, ImageService};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genpix")]
#[command(about = "Generate images from text prompts via DALL-E 3 or Flux")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images from a text prompt
    Image(ImageArgs),

    /// List available providers
    Providers,
}

#[derive(Args)]
struct ImageArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "dalle3")]
    provider: ProviderArg,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Number of images (1-5, Flux only)
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Directory to save images into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Dalle3,
    Flux,
}

impl From<ProviderArg> for ImageProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Dalle3 => ImageProviderKind::Dalle3,
            ProviderArg::Flux => ImageProviderKind::Flux,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "3:2")]
    ThreeTwo,
    #[value(name = "5:4")]
    FiveFour,
    #[value(name = "2:3")]
    TwoThree,
    #[value(name = "3:4")]
    StandardPortrait,
    #[value(name = "4:5")]
    FourFive,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::ThreeTwo => AspectRatio::ThreeTwo,
            AspectRatioArg::FiveFour => AspectRatio::FiveFour,
            AspectRatioArg::TwoThree => AspectRatio::TwoThree,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
            AspectRatioArg::FourFive => AspectRatio::FourFive,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Image(args) => {
            generate_image(args, cli.json).await?;
        }
        Commands::Providers => {
            list_providers(cli.json)?;
        }
    }

    Ok(())
}

fn validate_image_args(args: &ImageArgs) -> anyhow::Result<()> {
    let provider = ImageProviderKind::from(args.provider);
    let ratio = AspectRatio::from(args.aspect_ratio);

    if !provider.supports(ratio) {
        let offered: Vec<&str> = provider
            .supported_aspect_ratios()
            .iter()
            .map(|r| r.as_str())
            .collect();
        anyhow::bail!(
            "{} does not support --aspect-ratio {} (supported: {})",
            provider,
            ratio,
            offered.join(", ")
        );
    }
    if !provider.is_batched() && args.count != 1 {
        anyhow::bail!("{} generates a single image; --count is Flux only", provider);
    }
    if args.prompt.trim().is_empty() {
        anyhow::bail!("Please enter a prompt to generate an image.");
    }
    Ok(())
}

async fn generate_image(args: ImageArgs, json_output: bool) -> anyhow::Result<()> {
    // Validate provider/flag compatibility before execution
    validate_image_args(&args)?;

    let request = GenerationRequest::new(&args.prompt, args.provider.into())
        .with_aspect_ratio(args.aspect_ratio.into())
        .with_image_count(args.count);

    tokio::fs::create_dir_all(&args.output_dir).await?;

    let service = ImageService::from_env()?;
    if !json_output {
        eprintln!(
            "Generating {} image{} with {}...",
            request.effective_image_count(),
            if request.effective_image_count() > 1 { "s" } else { "" },
            request.provider
        );
    }

    let result = service.generate(&request).await?;

    let (saved, save_errors) = save_all(&service, &result.images, &args.output_dir).await;
    if saved.is_empty() && !save_errors.is_empty() {
        anyhow::bail!("failed to save images: {}", save_errors.join("; "));
    }

    if json_output {
        let output = serde_json::json!({
            "type": "image",
            "success": true,
            "provider": request.provider.to_string(),
            "aspect_ratio": request.aspect_ratio.as_str(),
            "requested": request.effective_image_count(),
            "generated": result.images.len(),
            "warning": result.warning,
            "outputs": saved.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "save_errors": save_errors,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for path in &saved {
            println!("Generated image: {}", path.display());
        }
        for error in &save_errors {
            eprintln!("Failed to save image: {error}");
        }
        match &result.warning {
            Some(warning) => println!("Partial success: {warning}"),
            None => println!(
                "Generated {} image{} via {}",
                saved.len(),
                if saved.len() > 1 { "s" } else { "" },
                request.provider
            ),
        }
    }

    for image in result.images {
        image.release();
    }

    Ok(())
}

/// Saves every image, collecting per-image failures instead of stopping at
/// the first one.
async fn save_all(
    service: &ImageService,
    images: &[GeneratedImage],
    dir: &Path,
) -> (Vec<PathBuf>, Vec<String>) {
    let mut saved = Vec::with_capacity(images.len());
    let mut errors = Vec::new();
    for (i, image) in images.iter().enumerate() {
        match service.download(image, dir).await {
            Ok(path) => saved.push(path),
            Err(e) => {
                tracing::warn!(image = i + 1, "failed to save image: {e}");
                errors.push(format!("image {}: {e}", i + 1));
            }
        }
    }
    (saved, errors)
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: &'static str,
        env_vars: &'static [&'static str],
        max_images: u32,
        aspect_ratios: Vec<&'static str>,
        enabled: bool,
    }

    let providers = vec![
        ProviderInfo {
            name: "DALL-E 3",
            kind: "dalle3",
            env_vars: &["DALLE3_API_KEY", "DALLE3_BASE_URL"],
            max_images: 1,
            aspect_ratios: ratios(ImageProviderKind::Dalle3),
            enabled: cfg!(feature = "dalle3-image"),
        },
        ProviderInfo {
            name: "Flux",
            kind: "flux",
            env_vars: &["FLUX_BASE_URL"],
            max_images: genpix::image::MAX_IMAGE_COUNT,
            aspect_ratios: ratios(ImageProviderKind::Flux),
            enabled: cfg!(feature = "flux-image"),
        },
    ];

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.enabled { "✓" } else { "✗" };
            println!("  {} {} ({})", status, p.name, p.kind);
            println!("    Env: {}", p.env_vars.join(", "));
            println!("    Images per request: up to {}", p.max_images);
            println!("    Aspect ratios: {}", p.aspect_ratios.join(", "));
        }
    }

    Ok(())
}

fn ratios(kind: ImageProviderKind) -> Vec<&'static str> {
    kind.supported_aspect_ratios()
        .iter()
        .map(|r| r.as_str())
        .collect()
}

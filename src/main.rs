//! # Asset Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso dell'eseguibile, che fa da collaboratore
//! host per lo stage di compressione.
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (directory, algoritmo, template, filtri, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica la directory di input in un `ArtifactSet` in-memory
//! 4. Esegue lo stage di compressione una volta
//! 5. Scrive su disco le sole entry emesse dalla run
//!
//! Il core della pipeline non tocca mai il filesystem: caricamento e
//! scrittura degli asset vivono solo qui.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-compressor ./dist --algorithm gzip --asset "[path].gz[query]" --test "\.js$"
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use asset_compressor::{Artifact, ArtifactSet, CompressionStage, Config};
use asset_compressor::progress::{format_size, ProgressManager};

#[derive(Parser)]
#[command(name = "asset-compressor")]
#[command(about = "Compress build assets, keeping only results that save enough space")]
struct Args {
    /// Directory containing the build assets to compress
    asset_directory: PathBuf,

    /// Optional JSON configuration file; CLI flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compression algorithm: brotli, gzip, deflate or deflateRaw
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Output filename template, e.g. "[path].gz[query]"
    #[arg(long)]
    asset: Option<String>,

    /// Regex filter; only matching asset names are considered
    #[arg(short, long)]
    test: Option<String>,

    /// Minimum original size in bytes to consider an asset
    #[arg(long)]
    threshold: Option<u64>,

    /// Maximum acceptable compressed/original ratio
    #[arg(long)]
    min_ratio: Option<f64>,

    /// Number of parallel compression workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Brotli quality (0-11)
    #[arg(short, long)]
    quality: Option<u32>,

    /// Deflate-family compression level (0-9)
    #[arg(short, long)]
    level: Option<u32>,

    /// Directory for the emitted compressed files (default: next to the originals)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Validate arguments
    if !args.asset_directory.exists() {
        return Err(anyhow::anyhow!(
            "Asset directory does not exist: {}",
            args.asset_directory.display()
        ));
    }

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| args.asset_directory.clone());
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir)?;
        info!("Created output directory: {}", output_dir.display());
    }

    let config = resolve_config(&args).await?;

    // The stage fails here, synchronously, on a bad algorithm or filter
    let stage = CompressionStage::new(&config)?;

    info!(
        "Compressing assets in {} with {} ({} workers, min ratio {})",
        args.asset_directory.display(),
        config.algorithm,
        config.workers,
        config.min_ratio
    );

    let assets = load_assets(&args.asset_directory).await?;
    if assets.is_empty() {
        info!("No assets found to compress");
        return Ok(());
    }

    let before: std::collections::HashSet<String> = assets.names().into_iter().collect();

    let spinner = ProgressManager::spinner(&format!("Compressing {} assets...", assets.len()));
    let result = stage.run(&assets).await;
    spinner.finish_and_clear();

    // The run itself logs the aggregated summary
    let stats = result?;

    // Persist only the entries this run emitted
    let mut written = 0usize;
    for name in assets.names() {
        if before.contains(&name) {
            continue;
        }
        let artifact = match assets.get(&name) {
            Some(artifact) => artifact,
            None => continue,
        };
        let target = output_dir.join(&name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, artifact.bytes()).await?;
        debug!("Wrote {}", target.display());
        written += 1;
    }

    info!(
        "💾 Wrote {} compressed files to {} ({} saved)",
        written,
        output_dir.display(),
        format_size(stats.total_bytes_saved())
    );

    Ok(())
}

/// Load the base configuration and apply CLI overrides on top
async fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.clone();
    }
    if let Some(asset) = &args.asset {
        config.asset = asset.clone();
    }
    if let Some(test) = &args.test {
        config.test = Some(test.clone());
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(min_ratio) = args.min_ratio {
        config.min_ratio = min_ratio;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.quality.is_some() {
        config.quality = args.quality;
    }
    if args.level.is_some() {
        config.level = args.level;
    }

    Ok(config)
}

/// Read every file under `dir` into the in-memory artifact set, keyed by its
/// relative path
async fn load_assets(dir: &PathBuf) -> Result<Arc<ArtifactSet>> {
    let assets = ArtifactSet::new();

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let name = path
            .strip_prefix(dir)?
            .to_string_lossy()
            .replace('\\', "/");
        let payload = tokio::fs::read(path).await?;
        debug!("Loaded {} ({} bytes)", name, payload.len());
        assets.insert(name, Artifact::new(payload));
    }

    info!("Loaded {} assets from {}", assets.len(), dir.display());
    Ok(Arc::new(assets))
}

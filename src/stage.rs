//! # Compression Stage Orchestrator
//!
//! Orchestratore principale dello stage: enumera gli asset, applica la
//! sequenza filtro → soglia → compressione → gate → emissione e aggrega gli
//! esiti per-asset in un unico risultato.
//!
//! ## Flusso per asset:
//! `Pending → FilteredOut | ThresholdSkipped | Compressing → RatioRejected | Emitted | Failed`
//!
//! ## Concorrenza:
//! Un singolo thread di controllo distribuisce i task per-asset su worker
//! limitati da un `Semaphore`; la compressione vera e propria gira su
//! `spawn_blocking`. Gli asset sono indipendenti: nessun ordine garantito
//! tra i completamenti, gli insert nel set condiviso sono serializzati dal
//! mutex del set.
//!
//! ## Aggregazione dei fallimenti:
//! Fan-out/fan-in: tutti i task arrivano a uno stato terminale prima che il
//! primo errore di encoding venga riportato al chiamante. Un fallimento
//! interrompe solo il proprio asset, mai i fratelli. Nessuna cancellazione
//! né timeout a metà run.

use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::artifact::{Artifact, ArtifactSet};
use crate::config::Config;
use crate::encoder::{CompressBackend, Encoder};
use crate::error::CompressError;
use crate::gate::RatioGate;
use crate::progress::CompressionStats;
use crate::template::AssetNameTemplate;

/// Terminal state of one artifact within a run.
///
/// Every variant except `Failed` is a success: skips are silent outcomes,
/// not errors.
#[derive(Debug)]
pub enum Outcome {
    SkippedByFilter,
    SkippedByThreshold,
    SkippedByRatio {
        original_size: u64,
        compressed_size: u64,
    },
    Emitted {
        name: String,
        original_size: u64,
        compressed_size: u64,
    },
    Failed(CompressError),
}

/// One configured compression stage.
///
/// Generic over the backend so tests can script per-payload behavior; real
/// callers construct it with [`CompressionStage::new`] and get the resolved
/// [`Encoder`].
pub struct CompressionStage<B: CompressBackend = Encoder> {
    filter: Option<Regex>,
    gate: RatioGate,
    template: AssetNameTemplate,
    backend: Arc<B>,
    workers: usize,
}

impl CompressionStage<Encoder> {
    /// Build a stage from configuration.
    ///
    /// Fails synchronously — before any artifact work — on an unknown
    /// algorithm, an invalid filter regex or out-of-range knobs.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let encoder = Encoder::from_config(config)?;
        Self::with_backend(config, encoder)
    }
}

impl<B: CompressBackend> CompressionStage<B> {
    /// Build a stage around an explicit backend
    pub fn with_backend(config: &Config, backend: B) -> Result<Self> {
        let filter = config
            .test
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(CompressError::Filter)?;

        Ok(Self {
            filter,
            gate: RatioGate::new(config.threshold, config.min_ratio),
            template: AssetNameTemplate::new(&config.asset),
            backend: Arc::new(backend),
            workers: config.workers,
        })
    }

    /// Run the stage once over the shared artifact set.
    ///
    /// Existing entries are never altered; qualifying artifacts get a
    /// compressed sibling inserted under the templated name. Returns the
    /// aggregated statistics, or the first encoding failure after every
    /// spawned task has settled.
    pub async fn run(&self, assets: &Arc<ArtifactSet>) -> Result<CompressionStats> {
        // Snapshot before spawning anything: entries emitted by this run
        // must not be picked up again.
        let names = assets.names();
        let mut stats = CompressionStats::new();
        stats.assets_seen = names.len();

        info!("🗜️  Evaluating {} assets for compression", names.len());

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: Vec<tokio::task::JoinHandle<(String, Outcome)>> = Vec::new();

        for name in names {
            if let Some(filter) = &self.filter {
                if !filter.is_match(&name) {
                    record(&mut stats, &name, Outcome::SkippedByFilter);
                    continue;
                }
            }

            // Keys come from the snapshot of this very set, so the artifact
            // is always there; stay defensive about it anyway.
            let Some(artifact) = assets.get(&name) else {
                continue;
            };

            let original_size = artifact.size();
            if !self.gate.meets_threshold(original_size) {
                record(&mut stats, &name, Outcome::SkippedByThreshold);
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let backend = Arc::clone(&self.backend);
            let gate = self.gate;
            let template = self.template.clone();
            let assets = Arc::clone(assets);

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome =
                    compress_one(&name, artifact, backend, gate, &template, &assets).await;
                (name, outcome)
            }));
        }

        // Fan-in barrier: every sibling settles before the first failure
        // surfaces
        let mut first_failure: Option<(String, CompressError)> = None;
        for joined in futures::future::join_all(tasks).await {
            let (name, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => (
                    "<worker>".to_string(),
                    Outcome::Failed(CompressError::Encoding(format!(
                        "compression worker aborted: {e}"
                    ))),
                ),
            };

            if let Some(failure) = record(&mut stats, &name, outcome) {
                if first_failure.is_none() {
                    first_failure = Some((name, failure));
                }
            }
        }

        if let Some((name, failure)) = first_failure {
            return Err(anyhow::Error::new(failure)
                .context(format!("failed to compress asset '{name}'")));
        }

        info!("✅ {}", stats.format_summary());
        Ok(stats)
    }
}

/// Compress a single artifact and, if worthwhile, insert the result under
/// its templated name.
async fn compress_one<B: CompressBackend>(
    name: &str,
    artifact: Artifact,
    backend: Arc<B>,
    gate: RatioGate,
    template: &AssetNameTemplate,
    assets: &ArtifactSet,
) -> Outcome {
    let original_size = artifact.size();
    let payload = artifact.payload();

    // The sole suspension point of a per-asset task: CPU-bound encoding
    // moved off the async control thread.
    let compressed =
        match tokio::task::spawn_blocking(move || backend.compress(&payload)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Outcome::Failed(e),
            Err(e) => {
                return Outcome::Failed(CompressError::Encoding(format!(
                    "encoder panicked: {e}"
                )))
            }
        };

    let compressed_size = compressed.len() as u64;
    if !gate.worth_keeping(original_size, compressed_size) {
        return Outcome::SkippedByRatio {
            original_size,
            compressed_size,
        };
    }

    let new_name = template.render(name);
    assets.insert(new_name.clone(), Artifact::new(compressed));

    Outcome::Emitted {
        name: new_name,
        original_size,
        compressed_size,
    }
}

/// Fold one terminal outcome into the stats; returns the error for `Failed`
fn record(stats: &mut CompressionStats, name: &str, outcome: Outcome) -> Option<CompressError> {
    match outcome {
        Outcome::SkippedByFilter => {
            debug!("Skipped (name filter): {}", name);
            stats.add_skipped_filter();
            None
        }
        Outcome::SkippedByThreshold => {
            debug!("Skipped (below size threshold): {}", name);
            stats.add_skipped_threshold();
            None
        }
        Outcome::SkippedByRatio {
            original_size,
            compressed_size,
        } => {
            debug!(
                "Skipped (insufficient savings, {} -> {} B): {}",
                original_size, compressed_size, name
            );
            stats.add_skipped_ratio();
            None
        }
        Outcome::Emitted {
            name: emitted,
            original_size,
            compressed_size,
        } => {
            debug!(
                "Emitted {} -> {} ({} -> {} B)",
                name, emitted, original_size, compressed_size
            );
            stats.add_emitted(original_size, compressed_size);
            None
        }
        Outcome::Failed(e) => {
            error!("Failed to compress {}: {}", name, e);
            stats.add_error();
            Some(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic stub: output is `pct`% of the input size
    struct Shrinker {
        pct: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Shrinker {
        fn new(pct: usize) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    pct,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl CompressBackend for Shrinker {
        fn compress(&self, payload: &[u8]) -> Result<Vec<u8>, CompressError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0u8; payload.len() * self.pct / 100])
        }
    }

    /// Fails payloads starting with "boom", halves everything else
    struct Exploder;

    impl CompressBackend for Exploder {
        fn compress(&self, payload: &[u8]) -> Result<Vec<u8>, CompressError> {
            if payload.starts_with(b"boom") {
                return Err(CompressError::Encoding("synthetic encoder failure".into()));
            }
            Ok(vec![0u8; payload.len() / 2])
        }
    }

    fn set_with(entries: &[(&str, Vec<u8>)]) -> Arc<ArtifactSet> {
        let set = ArtifactSet::new();
        for (name, payload) in entries {
            set.insert(*name, Artifact::new(payload.clone()));
        }
        Arc::new(set)
    }

    #[tokio::test]
    async fn test_ratio_above_limit_emits_nothing() {
        // 5000 -> 4200 bytes is a 0.84 ratio, above the 0.8 default
        let assets = set_with(&[("app.js", vec![1u8; 5000])]);
        let (backend, _) = Shrinker::new(84);
        let stage = CompressionStage::with_backend(&Config::default(), backend).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        assert!(!assets.contains("app.js.br"));
        assert_eq!(assets.len(), 1);
        assert_eq!(stats.skipped_ratio, 1);
        assert_eq!(stats.assets_emitted, 0);
    }

    #[tokio::test]
    async fn test_qualifying_asset_is_emitted_and_original_untouched() {
        // 5000 -> 3000 bytes is a 0.6 ratio, worth keeping
        let original = vec![7u8; 5000];
        let assets = set_with(&[("app.js", original.clone())]);
        let (backend, _) = Shrinker::new(60);
        let stage = CompressionStage::with_backend(&Config::default(), backend).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        let emitted = assets.get("app.js.br").expect("compressed sibling present");
        assert_eq!(emitted.size(), 3000);
        assert_eq!(assets.get("app.js").unwrap().bytes(), &original[..]);
        assert_eq!(stats.assets_emitted, 1);
        assert_eq!(stats.total_bytes_saved(), 2000);
    }

    #[tokio::test]
    async fn test_threshold_skip_never_invokes_backend() {
        let assets = set_with(&[("tiny.txt", vec![0u8; 10])]);
        let (backend, calls) = Shrinker::new(10);
        let config = Config {
            threshold: 100,
            ..Default::default()
        };
        let stage = CompressionStage::with_backend(&config, backend).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(assets.len(), 1);
        assert_eq!(stats.skipped_threshold, 1);
    }

    #[tokio::test]
    async fn test_name_filter_skips_regardless_of_size() {
        let assets = set_with(&[
            ("styles.css", vec![1u8; 5000]),
            ("app.js", vec![1u8; 5000]),
        ]);
        let (backend, _) = Shrinker::new(50);
        let config = Config {
            test: Some(r"\.js$".to_string()),
            ..Default::default()
        };
        let stage = CompressionStage::with_backend(&config, backend).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        assert!(assets.contains("app.js.br"));
        assert!(!assets.contains("styles.css.br"));
        assert_eq!(stats.skipped_filter, 1);
        assert_eq!(stats.assets_emitted, 1);
    }

    #[tokio::test]
    async fn test_sibling_failure_does_not_stop_other_assets() {
        let mut failing = b"boom".to_vec();
        failing.resize(4000, 0);
        let assets = set_with(&[("a.js", failing), ("b.js", vec![3u8; 4000])]);
        let stage = CompressionStage::with_backend(&Config::default(), Exploder).unwrap();

        let err = stage.run(&assets).await.unwrap_err();

        // fan-out/fan-in: b.js still made it through, the run reports a.js
        assert!(assets.contains("b.js.br"));
        assert!(!assets.contains("a.js.br"));
        assert!(err.to_string().contains("a.js"));
        assert!(matches!(
            err.downcast_ref::<CompressError>(),
            Some(CompressError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn test_emitted_entries_are_not_reprocessed() {
        let assets = set_with(&[("app.js", vec![5u8; 2000])]);
        let (backend, calls) = Shrinker::new(10);
        let stage = CompressionStage::with_backend(&Config::default(), backend).unwrap();

        stage.run(&assets).await.unwrap();

        // only the snapshot entry was compressed, never its own output
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(assets.len(), 2);
        assert!(assets.contains("app.js.br"));
        assert!(!assets.contains("app.js.br.br"));
    }

    #[tokio::test]
    async fn test_zero_byte_artifact_never_divides() {
        let assets = set_with(&[("empty.txt", Vec::new())]);
        let (backend, _) = Shrinker::new(50);
        let stage = CompressionStage::with_backend(&Config::default(), backend).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        // 0 -> 0 bytes passes the gate by the documented zero-size rule
        assert!(assets.contains("empty.txt.br"));
        assert_eq!(stats.assets_emitted, 1);
    }

    #[tokio::test]
    async fn test_query_string_name_derivation() {
        let assets = set_with(&[("index.html?v=2", vec![9u8; 3000])]);
        let (backend, _) = Shrinker::new(50);
        let stage = CompressionStage::with_backend(&Config::default(), backend).unwrap();

        stage.run(&assets).await.unwrap();

        // [path].br[query] re-attaches the query after the suffix
        assert!(assets.contains("index.html.brv=2"));
    }

    #[test]
    fn test_unknown_algorithm_fails_at_construction() {
        let config = Config {
            algorithm: "zopfli".to_string(),
            ..Default::default()
        };

        let err = CompressionStage::new(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<CompressError>(),
            Some(CompressError::UnknownAlgorithm(name)) if name == "zopfli"
        ));
    }

    #[test]
    fn test_invalid_filter_fails_at_construction() {
        let config = Config {
            test: Some("([unclosed".to_string()),
            ..Default::default()
        };

        let err = CompressionStage::new(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<CompressError>(),
            Some(CompressError::Filter(_))
        ));
    }

    #[tokio::test]
    async fn test_real_brotli_end_to_end() {
        let payload: Vec<u8> = b"fn main() { println!(\"hello\"); } "
            .iter()
            .copied()
            .cycle()
            .take(10_000)
            .collect();
        let assets = set_with(&[("dist/app.js", payload.clone())]);
        let stage = CompressionStage::new(&Config::default()).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        let emitted = assets.get("dist/app.js.br").expect("brotli sibling present");
        assert!(emitted.size() < payload.len() as u64);
        assert_eq!(stats.assets_emitted, 1);
    }

    #[tokio::test]
    async fn test_many_assets_under_bounded_workers() {
        let assets = Arc::new(ArtifactSet::new());
        for i in 0..32 {
            assets.insert(format!("chunk-{i}.js"), Artifact::new(vec![1u8; 1000]));
        }
        let (backend, calls) = Shrinker::new(50);
        let config = Config {
            workers: 3,
            ..Default::default()
        };
        let stage = CompressionStage::with_backend(&config, backend).unwrap();

        let stats = stage.run(&assets).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 32);
        assert_eq!(stats.assets_emitted, 32);
        assert_eq!(assets.len(), 64);
    }
}

//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dello stage di compressione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri dello stage
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Risolve le opzioni per-backend distinguendo "non impostato" da
//!   "impostato a un valore falsy"
//!
//! ## Parametri dello stage:
//! - `algorithm`: backend di compressione (default: "brotli")
//! - `asset`: template del nome di output (default: "[path].br[query]")
//! - `test`: regex opzionale per filtrare gli asset per nome (default: tutti)
//! - `threshold`: dimensione minima in byte per considerare un asset (default: 0)
//! - `min_ratio`: rapporto compresso/originale massimo accettabile (default: 0.8)
//! - `workers`: numero di worker paralleli (default: 4)
//!
//! ## Opzioni per-backend:
//! Tutti i knob sono `Option<_>`: `None` lascia il default documentato del
//! backend, mentre un valore esplicito (anche `false` o `0`) vince sempre.
//! Brotli: `mode`, `quality`, `lgwin`, `lgblock` e quattro toggle booleani.
//! Deflate-family: `level`, `flush`, `window_bits`, `dictionary`.
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::Config;
//!
//! let config = Config {
//!     algorithm: "gzip".to_string(),
//!     asset: "[path].gz[query]".to_string(),
//!     threshold: 1024,
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::encoder::{BrotliOptions, DeflateOptions, FlushMode};

/// Configuration for one asset compression stage, resolved once per run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compression backend: "brotli", "gzip", "deflate" or "deflateRaw"
    pub algorithm: String,
    /// Output filename template, see the template module for placeholders
    pub asset: String,
    /// Optional regex; only matching artifact names are considered
    pub test: Option<String>,
    /// Minimum original size (bytes) eligible for compression
    pub threshold: u64,
    /// Keep the compressed artifact only if compressed/original <= min_ratio
    pub min_ratio: f64,
    /// Number of parallel compression workers
    pub workers: usize,

    // Brotli knobs
    /// Operating mode: 0 generic, 1 text, 2 font
    pub mode: Option<u32>,
    /// Quality 0-11
    pub quality: Option<u32>,
    /// Window size exponent 10-24
    pub lgwin: Option<u32>,
    /// Block size exponent, 16-24 or 0 for automatic
    pub lgblock: Option<u32>,
    pub enable_dictionary: Option<bool>,
    pub enable_transforms: Option<bool>,
    pub greedy_block_split: Option<bool>,
    pub enable_context_modeling: Option<bool>,

    // Deflate-family knobs
    /// Compression level 0-9
    pub level: Option<u32>,
    /// Intermediate flush behavior
    pub flush: Option<FlushMode>,
    /// Window size exponent 9-15
    pub window_bits: Option<u8>,
    /// Preset dictionary for zlib/raw streams
    pub dictionary: Option<Vec<u8>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: "brotli".to_string(),
            asset: "[path].br[query]".to_string(),
            test: None,
            threshold: 0,
            min_ratio: 0.8,
            workers: 4,
            mode: None,
            quality: None,
            lgwin: None,
            lgblock: None,
            enable_dictionary: None,
            enable_transforms: None,
            greedy_block_split: None,
            enable_context_modeling: None,
            level: None,
            flush: None,
            window_bits: None,
            dictionary: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.asset.is_empty() {
            return Err(anyhow::anyhow!("Output name template must not be empty"));
        }

        if self.min_ratio <= 0.0 || self.min_ratio > 1.0 {
            return Err(anyhow::anyhow!("min_ratio must be between 0.0 and 1.0"));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if let Some(mode) = self.mode {
            if mode > 2 {
                return Err(anyhow::anyhow!("Brotli mode must be 0 (generic), 1 (text) or 2 (font)"));
            }
        }

        if let Some(quality) = self.quality {
            if quality > 11 {
                return Err(anyhow::anyhow!("Brotli quality must be between 0 and 11"));
            }
        }

        if let Some(lgwin) = self.lgwin {
            if !(10..=24).contains(&lgwin) {
                return Err(anyhow::anyhow!("Brotli lgwin must be between 10 and 24"));
            }
        }

        if let Some(lgblock) = self.lgblock {
            if lgblock != 0 && !(16..=24).contains(&lgblock) {
                return Err(anyhow::anyhow!("Brotli lgblock must be 0 or between 16 and 24"));
            }
        }

        if let Some(level) = self.level {
            if level > 9 {
                return Err(anyhow::anyhow!("Deflate level must be between 0 and 9"));
            }
        }

        if let Some(window_bits) = self.window_bits {
            if !(9..=15).contains(&window_bits) {
                return Err(anyhow::anyhow!("window_bits must be between 9 and 15"));
            }
        }

        Ok(())
    }

    /// Resolve the brotli option record.
    ///
    /// `unwrap_or` against the documented defaults keeps "unset" and
    /// "explicitly false" distinct representable states.
    pub fn brotli_options(&self) -> BrotliOptions {
        let defaults = BrotliOptions::default();
        BrotliOptions {
            mode: self.mode.unwrap_or(defaults.mode),
            quality: self.quality.unwrap_or(defaults.quality),
            lgwin: self.lgwin.unwrap_or(defaults.lgwin),
            lgblock: self.lgblock.unwrap_or(defaults.lgblock),
            enable_dictionary: self.enable_dictionary.unwrap_or(defaults.enable_dictionary),
            enable_transforms: self.enable_transforms.unwrap_or(defaults.enable_transforms),
            greedy_block_split: self.greedy_block_split.unwrap_or(defaults.greedy_block_split),
            enable_context_modeling: self
                .enable_context_modeling
                .unwrap_or(defaults.enable_context_modeling),
        }
    }

    /// Resolve the deflate-family option record; pass-through knobs stay
    /// unset unless the caller set them
    pub fn deflate_options(&self) -> DeflateOptions {
        let defaults = DeflateOptions::default();
        DeflateOptions {
            level: self.level.unwrap_or(defaults.level),
            flush: self.flush.unwrap_or(defaults.flush),
            window_bits: self.window_bits,
            dictionary: self.dictionary.clone(),
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

//! # Ratio Gate Module
//!
//! Decide se un asset va compresso e se il risultato vale la pena di essere
//! tenuto. Due controlli puri sulle sole dimensioni, separati dall'orchestratore
//! per restare testabili in isolamento.

/// Size-based keep/skip decisions for the compression pipeline
#[derive(Debug, Clone, Copy)]
pub struct RatioGate {
    /// Minimum original size (bytes) eligible for compression
    pub threshold: u64,
    /// Maximum acceptable compressed/original ratio
    pub min_ratio: f64,
}

impl RatioGate {
    pub fn new(threshold: u64, min_ratio: f64) -> Self {
        Self {
            threshold,
            min_ratio,
        }
    }

    /// Pre-check: artifacts below the threshold are skipped before any
    /// compression is attempted. Never an error.
    pub fn meets_threshold(&self, original_size: u64) -> bool {
        original_size >= self.threshold
    }

    /// Post-check: keep the compressed form only if it saves enough space.
    ///
    /// A zero-byte original has no defined ratio; it passes only when the
    /// compressed form is also empty.
    pub fn worth_keeping(&self, original_size: u64, compressed_size: u64) -> bool {
        if original_size == 0 {
            return compressed_size == 0;
        }
        compressed_size as f64 / original_size as f64 <= self.min_ratio
    }
}

//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche dello stage.
//!
//! ## Componenti principali:
//! - `ProgressManager`: spinner con `indicatif` per il feedback della run
//! - `CompressionStats`: statistiche cumulative della run
//!
//! ## Statistiche tracciate:
//! - **assets_seen**: asset presenti nello snapshot iniziale
//! - **assets_emitted**: asset compressi e inseriti nel set
//! - **skipped_filter / skipped_threshold / skipped_ratio**: skip per causa
//! - **errors**: errori di encoding
//! - **bytes risparmiati**: solo sugli asset effettivamente emessi

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporting for the compression run
pub struct ProgressManager;

impl ProgressManager {
    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// Statistics tracker for one compression run
#[derive(Debug, Default, Clone)]
pub struct CompressionStats {
    pub assets_seen: usize,
    pub assets_emitted: usize,
    pub skipped_filter: usize,
    pub skipped_threshold: usize,
    pub skipped_ratio: usize,
    pub errors: usize,
    pub total_original_size: u64,
    pub total_compressed_size: u64,
}

impl CompressionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_emitted(&mut self, original_size: u64, compressed_size: u64) {
        self.assets_emitted += 1;
        self.total_original_size += original_size;
        self.total_compressed_size += compressed_size;
    }

    pub fn add_skipped_filter(&mut self) {
        self.skipped_filter += 1;
    }

    pub fn add_skipped_threshold(&mut self) {
        self.skipped_threshold += 1;
    }

    pub fn add_skipped_ratio(&mut self) {
        self.skipped_ratio += 1;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    pub fn total_bytes_saved(&self) -> u64 {
        self.total_original_size
            .saturating_sub(self.total_compressed_size)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved() as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Seen: {} assets | Emitted: {} | Skipped: {} (filter {}, threshold {}, ratio {}) | Errors: {} | Saved: {} ({:.2}%)",
            self.assets_seen,
            self.assets_emitted,
            self.skipped_filter + self.skipped_threshold + self.skipped_ratio,
            self.skipped_filter,
            self.skipped_threshold,
            self.skipped_ratio,
            self.errors,
            format_size(self.total_bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

/// Convert a byte count into a human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.2} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}

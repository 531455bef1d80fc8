//! # Encoder Adapter Module
//!
//! Questo modulo incapsula i backend di compressione dietro un unico
//! contratto `compress(payload) -> bytes`.
//!
//! ## Responsabilità:
//! - Selezione dell'algoritmo per nome (`brotli`, `gzip`, `deflate`, `deflateRaw`)
//! - Risoluzione delle opzioni per-backend con default documentati
//! - Delega della codifica ai crate `brotli` e `flate2`
//!
//! ## Contratto:
//! La compressione è deterministica: un errore del backend viene riportato
//! così com'è al chiamante, senza retry. Il lavoro è CPU-bound e sincrono;
//! l'orchestratore lo sposta su `spawn_blocking`.
//!
//! ## Set chiuso di varianti:
//! Aggiungere un backend significa aggiungere una variante a `Encoder`,
//! non propagare confronti su stringhe in giro per la pipeline.

use std::io::Cursor;
use std::str::FromStr;

use brotli::enc::backward_references::BrotliEncoderMode;
use brotli::enc::BrotliEncoderParams;
use flate2::{Compress, Compression, FlushCompress, Status};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::CompressError;

/// Supported compression algorithm names.
///
/// Anything else requested at construction is a fatal
/// [`CompressError::UnknownAlgorithm`], raised before any artifact work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Brotli,
    Gzip,
    /// zlib-wrapped deflate stream
    Deflate,
    /// headerless deflate stream
    DeflateRaw,
}

impl FromStr for Algorithm {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brotli" => Ok(Self::Brotli),
            "gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            "deflateRaw" | "deflate-raw" => Ok(Self::DeflateRaw),
            other => Err(CompressError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Fully-resolved brotli encoder options.
///
/// Built from the configuration's optional fields: an unset knob takes the
/// default below, while an explicit value (including `false`) always wins.
#[derive(Debug, Clone, PartialEq)]
pub struct BrotliOptions {
    /// Operating mode: 0 generic, 1 text, 2 font
    pub mode: u32,
    /// Quality 0-11 (default 11, the encoder's highest)
    pub quality: u32,
    /// Window size exponent, 10-24 (default 22)
    pub lgwin: u32,
    /// Block size exponent, 16-24 or 0 for automatic (default 0)
    pub lgblock: u32,
    /// Use the built-in static dictionary (default true)
    pub enable_dictionary: bool,
    /// Word transforms ride on the shared dictionary; the encoder exposes no
    /// separate switch, so this toggle is schema-only (default false)
    pub enable_transforms: bool,
    /// Greedy block splitting rides the encoder's cpu-efficiency path
    /// (default false)
    pub greedy_block_split: bool,
    /// Literal context modeling (default false)
    pub enable_context_modeling: bool,
}

impl Default for BrotliOptions {
    fn default() -> Self {
        Self {
            mode: 0,
            quality: 11,
            lgwin: 22,
            lgblock: 0,
            enable_dictionary: true,
            enable_transforms: false,
            greedy_block_split: false,
            enable_context_modeling: false,
        }
    }
}

impl BrotliOptions {
    fn encoder_params(&self) -> BrotliEncoderParams {
        let mut params = BrotliEncoderParams::default();
        params.mode = match self.mode {
            1 => BrotliEncoderMode::BROTLI_MODE_TEXT,
            2 => BrotliEncoderMode::BROTLI_MODE_FONT,
            _ => BrotliEncoderMode::BROTLI_MODE_GENERIC,
        };
        params.quality = self.quality as i32;
        params.lgwin = self.lgwin as i32;
        params.lgblock = self.lgblock as i32;
        params.use_dictionary = self.enable_dictionary;
        params.favor_cpu_efficiency = self.greedy_block_split;
        params.disable_literal_context_modeling = if self.enable_context_modeling { 0 } else { 1 };
        params
    }
}

/// Intermediate flush behavior for the deflate-family stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    #[default]
    None,
    Partial,
    Sync,
    Full,
    Finish,
}

impl From<FlushMode> for FlushCompress {
    fn from(mode: FlushMode) -> Self {
        match mode {
            FlushMode::None => FlushCompress::None,
            FlushMode::Partial => FlushCompress::Partial,
            FlushMode::Sync => FlushCompress::Sync,
            FlushMode::Full => FlushCompress::Full,
            FlushMode::Finish => FlushCompress::Finish,
        }
    }
}

/// Fully-resolved deflate-family options.
///
/// `window_bits` and `dictionary` stay `None` when the caller left them
/// unset, so the stream keeps the backend's own defaults instead of values
/// we made up for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeflateOptions {
    /// Compression level 0-9 (default 9)
    pub level: u32,
    /// Flush mode applied while the input is being consumed (default none)
    pub flush: FlushMode,
    /// Window size exponent, 9-15; backend default when unset
    pub window_bits: Option<u8>,
    /// Preset dictionary for zlib/raw streams; none by default
    pub dictionary: Option<Vec<u8>>,
}

impl Default for DeflateOptions {
    fn default() -> Self {
        Self {
            level: 9,
            flush: FlushMode::None,
            window_bits: None,
            dictionary: None,
        }
    }
}

/// Wire format produced by the deflate-family backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeflateFormat {
    Gzip,
    Zlib,
    Raw,
}

/// Uniform compression contract for the pipeline.
///
/// Implementations must be safe to call from `spawn_blocking` workers.
pub trait CompressBackend: Send + Sync + 'static {
    fn compress(&self, payload: &[u8]) -> Result<Vec<u8>, CompressError>;
}

/// The closed set of supported backends, selected once at stage construction
#[derive(Debug, Clone)]
pub enum Encoder {
    Brotli(BrotliOptions),
    Deflate {
        format: DeflateFormat,
        options: DeflateOptions,
    },
}

impl Encoder {
    /// Resolve the configured algorithm name and its backend options.
    ///
    /// Fails synchronously on an unknown algorithm, before any artifact is
    /// processed.
    pub fn from_config(config: &Config) -> Result<Self, CompressError> {
        match config.algorithm.parse::<Algorithm>()? {
            Algorithm::Brotli => Ok(Self::Brotli(config.brotli_options())),
            Algorithm::Gzip => Ok(Self::Deflate {
                format: DeflateFormat::Gzip,
                options: config.deflate_options(),
            }),
            Algorithm::Deflate => Ok(Self::Deflate {
                format: DeflateFormat::Zlib,
                options: config.deflate_options(),
            }),
            Algorithm::DeflateRaw => Ok(Self::Deflate {
                format: DeflateFormat::Raw,
                options: config.deflate_options(),
            }),
        }
    }
}

impl CompressBackend for Encoder {
    fn compress(&self, payload: &[u8]) -> Result<Vec<u8>, CompressError> {
        match self {
            Self::Brotli(options) => brotli_compress(options, payload),
            Self::Deflate { format, options } => deflate_compress(*format, options, payload),
        }
    }
}

fn brotli_compress(options: &BrotliOptions, payload: &[u8]) -> Result<Vec<u8>, CompressError> {
    let params = options.encoder_params();
    let mut input = Cursor::new(payload);
    let mut output = Vec::with_capacity(payload.len() / 2 + 64);

    brotli::BrotliCompress(&mut input, &mut output, &params)
        .map_err(|e| CompressError::Encoding(e.to_string()))?;

    Ok(output)
}

fn deflate_compress(
    format: DeflateFormat,
    options: &DeflateOptions,
    payload: &[u8],
) -> Result<Vec<u8>, CompressError> {
    // zlib's own default window size; new_gzip requires an explicit value
    const DEFAULT_WINDOW_BITS: u8 = 15;

    let level = Compression::new(options.level);
    let mut stream = match (format, options.window_bits) {
        (DeflateFormat::Gzip, bits) => Compress::new_gzip(level, bits.unwrap_or(DEFAULT_WINDOW_BITS)),
        (DeflateFormat::Zlib, Some(bits)) => Compress::new_with_window_bits(level, true, bits),
        (DeflateFormat::Zlib, None) => Compress::new(level, true),
        (DeflateFormat::Raw, Some(bits)) => Compress::new_with_window_bits(level, false, bits),
        (DeflateFormat::Raw, None) => Compress::new(level, false),
    };

    if let Some(dictionary) = &options.dictionary {
        stream
            .set_dictionary(dictionary)
            .map_err(|e| CompressError::Encoding(e.to_string()))?;
    }

    let mut output = Vec::with_capacity(payload.len() / 3 + 128);
    let mut consumed = 0usize;

    // Feed the whole payload with the configured flush behavior
    while consumed < payload.len() {
        if output.len() == output.capacity() {
            output.reserve(16 * 1024);
        }
        let before = stream.total_in();
        let status = stream
            .compress_vec(&payload[consumed..], &mut output, options.flush.into())
            .map_err(|e| CompressError::Encoding(e.to_string()))?;
        consumed += (stream.total_in() - before) as usize;
        if status == Status::StreamEnd {
            return Ok(output);
        }
    }

    // Drain until the stream is finalized
    loop {
        if output.len() == output.capacity() {
            output.reserve(16 * 1024);
        }
        let status = stream
            .compress_vec(&[], &mut output, FlushCompress::Finish)
            .map_err(|e| CompressError::Encoding(e.to_string()))?;
        if status == Status::StreamEnd {
            break;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn repetitive_payload(len: usize) -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog "
            .iter()
            .copied()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("brotli".parse::<Algorithm>().unwrap(), Algorithm::Brotli);
        assert_eq!("gzip".parse::<Algorithm>().unwrap(), Algorithm::Gzip);
        assert_eq!("deflate".parse::<Algorithm>().unwrap(), Algorithm::Deflate);
        assert_eq!("deflateRaw".parse::<Algorithm>().unwrap(), Algorithm::DeflateRaw);

        let err = "zopfli".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, CompressError::UnknownAlgorithm(name) if name == "zopfli"));
    }

    #[test]
    fn test_gzip_roundtrip() {
        let payload = repetitive_payload(10_000);
        let encoder = Encoder::Deflate {
            format: DeflateFormat::Gzip,
            options: DeflateOptions::default(),
        };

        let compressed = encoder.compress(&payload).unwrap();
        assert!(compressed.len() < payload.len());

        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(&compressed[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_zlib_and_raw_roundtrip() {
        let payload = repetitive_payload(4_000);

        let zlib = Encoder::Deflate {
            format: DeflateFormat::Zlib,
            options: DeflateOptions::default(),
        };
        let compressed = zlib.compress(&payload).unwrap();
        let mut decoded = Vec::new();
        flate2::read::ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);

        let raw = Encoder::Deflate {
            format: DeflateFormat::Raw,
            options: DeflateOptions::default(),
        };
        let compressed = raw.compress(&payload).unwrap();
        let mut decoded = Vec::new();
        flate2::read::DeflateDecoder::new(&compressed[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_brotli_roundtrip() {
        let payload = repetitive_payload(10_000);
        let encoder = Encoder::Brotli(BrotliOptions::default());

        let compressed = encoder.compress(&payload).unwrap();
        assert!(compressed.len() < payload.len());

        let mut decoded = Vec::new();
        brotli::Decompressor::new(&compressed[..], 4096)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_explicit_level_zero_is_not_the_default() {
        // level 0 means "store", which must not be silently upgraded to the
        // level-9 default just because zero reads as falsy elsewhere
        let payload = repetitive_payload(4_000);

        let stored = Encoder::Deflate {
            format: DeflateFormat::Gzip,
            options: DeflateOptions {
                level: 0,
                ..Default::default()
            },
        };
        let best = Encoder::Deflate {
            format: DeflateFormat::Gzip,
            options: DeflateOptions::default(),
        };

        let stored_len = stored.compress(&payload).unwrap().len();
        let best_len = best.compress(&payload).unwrap().len();
        assert!(stored_len > best_len);
        assert!(stored_len >= payload.len());
    }

    #[test]
    fn test_empty_payload_still_encodes() {
        let encoder = Encoder::Deflate {
            format: DeflateFormat::Gzip,
            options: DeflateOptions::default(),
        };
        let compressed = encoder.compress(&[]).unwrap();
        // a valid gzip member is produced even for empty input
        assert!(!compressed.is_empty());

        let brotli_encoder = Encoder::Brotli(BrotliOptions::default());
        assert!(!brotli_encoder.compress(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_preset_dictionary_changes_the_stream() {
        let payload = b"hello dictionary world, hello again".to_vec();
        let dictionary = b"hello dictionary world".to_vec();

        let plain = Encoder::Deflate {
            format: DeflateFormat::Zlib,
            options: DeflateOptions::default(),
        };
        let primed = Encoder::Deflate {
            format: DeflateFormat::Zlib,
            options: DeflateOptions {
                dictionary: Some(dictionary),
                ..Default::default()
            },
        };

        let plain_out = plain.compress(&payload).unwrap();
        let primed_out = primed.compress(&payload).unwrap();
        assert_ne!(plain_out, primed_out);
    }

    #[test]
    fn test_brotli_defaults() {
        let options = BrotliOptions::default();
        assert_eq!(options.quality, 11);
        assert_eq!(options.lgwin, 22);
        assert_eq!(options.lgblock, 0);
        assert!(options.enable_dictionary);
        assert!(!options.enable_transforms);
        assert!(!options.greedy_block_split);
        assert!(!options.enable_context_modeling);
    }
}

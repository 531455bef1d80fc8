//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dello stage di compressione.
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (lettura/scrittura asset lato host)
//! - `UnknownAlgorithm`: Algoritmo di compressione non supportato (fatale, a costruzione)
//! - `Filter`: Pattern regex del filtro nomi non valido (fatale, a costruzione)
//! - `Encoding`: Il backend ha fallito la compressione di un payload
//! - `Validation`: Errori di validazione della configurazione
//!
//! Gli errori fatali emergono in modo sincrono da `CompressionStage::new`,
//! prima che qualsiasi asset venga elaborato. Gli errori di encoding sono
//! per-asset e vengono aggregati dopo che tutti i task sono terminati.

/// Custom error types for the asset compression stage
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported compression algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Invalid name filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

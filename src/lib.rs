//! # Asset Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dello stage di compressione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per le diverse operazioni
//! - `artifact`: Asset in-memory e mapping condiviso nome → payload
//! - `encoder`: Adapter verso i backend brotli e deflate-family
//! - `template`: Derivazione del nome di output con placeholder
//! - `gate`: Controlli di soglia e di rapporto di compressione
//! - `stage`: Orchestratore selezione → compressione → valutazione → emissione
//! - `progress`: Progress tracking e statistiche
//!
//! ## Utilizzo:
//! ```rust
//! use std::sync::Arc;
//! use asset_compressor::{Artifact, ArtifactSet, CompressionStage, Config};
//!
//! # tokio_test::block_on(async {
//! let assets = Arc::new(ArtifactSet::new());
//! assets.insert("app.js", Artifact::new(vec![0u8; 5000]));
//!
//! let stage = CompressionStage::new(&Config::default()).unwrap();
//! let stats = stage.run(&assets).await.unwrap();
//! assert_eq!(stats.assets_seen, 1);
//! # });
//! ```

pub mod artifact;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gate;
pub mod progress;
pub mod stage;
pub mod template;

pub use artifact::{Artifact, ArtifactSet};
pub use config::Config;
pub use encoder::{Algorithm, BrotliOptions, CompressBackend, DeflateOptions, Encoder};
pub use error::CompressError;
pub use gate::RatioGate;
pub use progress::CompressionStats;
pub use stage::{CompressionStage, Outcome};
pub use template::AssetNameTemplate;

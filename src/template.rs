//! # Filename Templater Module
//!
//! Deriva il nome di output di un asset compresso a partire dal nome
//! originale e da un pattern con placeholder tra parentesi quadre.
//!
//! ## Placeholder riconosciuti:
//! - `[file]`: nome originale completo
//! - `[fileWithoutExt]`: nome senza l'ultimo segmento `.estensione`
//! - `[ext]`: l'ultimo segmento dopo il `.` finale
//! - `[path]`: componente path, senza query string
//! - `[query]`: query string senza il `?` iniziale (vuota se assente)
//!
//! I token tra quadre non riconosciuti restano invariati. La derivazione è
//! una funzione pura del nome + pattern: stesso input, stesso output.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Matches only the recognized placeholders; anything else in brackets is
/// left verbatim.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(fileWithoutExt|file|ext|path|query)]").expect("valid pattern"));

/// Output-name template for emitted compressed assets.
///
/// The default `[path].br[query]` follows the brotli suffix convention;
/// callers choosing another backend should supply their own pattern or accept
/// a misleading extension.
#[derive(Debug, Clone)]
pub struct AssetNameTemplate {
    pattern: String,
}

impl Default for AssetNameTemplate {
    fn default() -> Self {
        Self::new("[path].br[query]")
    }
}

impl AssetNameTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render the template against an original artifact name.
    pub fn render(&self, original: &str) -> String {
        let parts = NameParts::derive(original);

        PLACEHOLDER
            .replace_all(&self.pattern, |caps: &Captures| {
                match caps.get(1).map(|m| m.as_str()) {
                    Some("file") => parts.file,
                    Some("fileWithoutExt") => parts.file_without_ext,
                    Some("ext") => parts.ext,
                    Some("path") => parts.path,
                    Some("query") => parts.query,
                    _ => unreachable!("pattern only captures known placeholders"),
                }
                .to_string()
            })
            .into_owned()
    }
}

/// Per-name derived placeholder values.
///
/// Extension splitting is on literal `.` characters only, not on `?`: a query
/// string that follows the extension stays glued to it (`index.html?v=2`
/// derives ext `html?v=2`), while `path`/`query` split at the first `?`.
#[derive(Debug, PartialEq, Eq)]
struct NameParts<'a> {
    file: &'a str,
    file_without_ext: &'a str,
    ext: &'a str,
    path: &'a str,
    query: &'a str,
}

impl<'a> NameParts<'a> {
    fn derive(name: &'a str) -> Self {
        let (file_without_ext, ext) = match name.rfind('.') {
            Some(idx) => (&name[..idx], &name[idx + 1..]),
            None => ("", name),
        };
        let (path, query) = match name.find('?') {
            Some(idx) => (&name[..idx], &name[idx + 1..]),
            None => (name, ""),
        };

        Self {
            file: name,
            file_without_ext,
            ext,
            path,
            query,
        }
    }
}

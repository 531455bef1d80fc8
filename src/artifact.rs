//! # Artifact Set Module
//!
//! Questo modulo definisce gli asset in-memory su cui opera lo stage.
//!
//! ## Responsabilità:
//! - `Artifact`: payload immutabile di byte con dimensione interrogabile
//! - `ArtifactSet`: mapping nome → artifact condiviso tra i worker
//!
//! ## Concorrenza:
//! Il set è protetto da un mutex perché più task per-asset completano in
//! parallelo e ognuno esegue un insert indipendente. Nessun lock viene mai
//! tenuto attraverso un punto di await: ogni accesso copia fuori ciò che
//! serve (handle al payload, snapshot delle chiavi) e rilascia subito.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One named in-memory build output with an immutable byte payload.
///
/// The payload sits behind an `Arc` so handing it to a blocking compression
/// task never copies the bytes.
#[derive(Debug, Clone)]
pub struct Artifact {
    payload: Arc<Vec<u8>>,
}

impl Artifact {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload: Arc::new(payload),
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Cheap handle to the payload for moving into worker tasks
    pub fn payload(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.payload)
    }
}

/// Mutable name → artifact mapping shared with the host build system.
///
/// The stage reads existing entries and inserts new ones; it never removes or
/// rewrites an existing payload. Inserts are last-writer-wins: distinct
/// originals only collide under a degenerate output template, which is the
/// caller's responsibility.
#[derive(Debug, Default)]
pub struct ArtifactSet {
    inner: Mutex<HashMap<String, Artifact>>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact under `name`
    pub fn insert(&self, name: impl Into<String>, artifact: Artifact) {
        self.inner
            .lock()
            .expect("artifact set lock poisoned")
            .insert(name.into(), artifact);
    }

    /// Clone out the artifact stored under `name`, if any
    pub fn get(&self, name: &str) -> Option<Artifact> {
        self.inner
            .lock()
            .expect("artifact set lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .lock()
            .expect("artifact set lock poisoned")
            .contains_key(name)
    }

    /// Snapshot of the current key set.
    ///
    /// The orchestrator takes this once before spawning any task, so entries
    /// emitted during the run are never picked up again.
    pub fn names(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("artifact set lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("artifact set lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(String, Artifact)> for ArtifactSet {
    fn from_iter<T: IntoIterator<Item = (String, Artifact)>>(iter: T) -> Self {
        Self {
            inner: Mutex::new(iter.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_size() {
        let artifact = Artifact::new(vec![0u8; 5000]);
        assert_eq!(artifact.size(), 5000);
        assert_eq!(artifact.bytes().len(), 5000);
    }

    #[test]
    fn test_insert_and_get() {
        let set = ArtifactSet::new();
        assert!(set.is_empty());

        set.insert("app.js", Artifact::new(b"console.log(1)".to_vec()));
        assert_eq!(set.len(), 1);
        assert!(set.contains("app.js"));
        assert_eq!(set.get("app.js").unwrap().bytes(), b"console.log(1)");
        assert!(set.get("missing.js").is_none());
    }

    #[test]
    fn test_names_snapshot_is_detached() {
        let set = ArtifactSet::new();
        set.insert("a.js", Artifact::new(vec![1]));

        let snapshot = set.names();
        set.insert("b.js", Artifact::new(vec![2]));

        assert_eq!(snapshot, vec!["a.js".to_string()]);
        assert_eq!(set.len(), 2);
    }
}

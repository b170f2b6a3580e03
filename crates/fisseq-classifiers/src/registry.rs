//! Fitted model registries and their JSON persistence.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{OvwtError, Result};

/// Variant label -> fitted model.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry<M> {
    models: BTreeMap<String, M>,
}

impl<M> Default for ModelRegistry<M> {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }
}

impl<M> ModelRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, model: M) -> Option<M> {
        self.models.insert(label.into(), model)
    }

    pub fn get(&self, label: &str) -> Option<&M> {
        self.models.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.models.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &M)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Move every model of `other` into this registry, replacing duplicates.
    pub fn merge(&mut self, other: ModelRegistry<M>) {
        self.models.extend(other.models);
    }
}

/// Stratum value -> registry of that stratum.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StratifiedRegistry<M> {
    strata: BTreeMap<String, ModelRegistry<M>>,
}

impl<M> Default for StratifiedRegistry<M> {
    fn default() -> Self {
        Self {
            strata: BTreeMap::new(),
        }
    }
}

impl<M> StratifiedRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stratum: impl Into<String>, registry: ModelRegistry<M>) {
        self.strata.insert(stratum.into(), registry);
    }

    pub fn get(&self, stratum: &str) -> Option<&ModelRegistry<M>> {
        self.strata.get(stratum)
    }

    pub fn len(&self) -> usize {
        self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelRegistry<M>)> {
        self.strata.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of models across strata.
    pub fn n_models(&self) -> usize {
        self.strata.values().map(|r| r.len()).sum()
    }
}

/// Write any serializable registry as pretty JSON.
pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| OvwtError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| OvwtError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a registry previously written with `save_json`.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| OvwtError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| OvwtError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stump::StumpClassifier;
    use crate::models::FittedModel;

    fn stump(feature_index: usize) -> FittedModel {
        FittedModel::Stump(StumpClassifier {
            feature_index,
            threshold: 0.5,
            p_left: 0.1,
            p_right: 0.9,
            n_features: 3,
        })
    }

    #[test]
    fn registry_persists_as_tagged_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");

        let mut registry = ModelRegistry::new();
        registry.insert("V2", stump(2));
        registry.insert("V1", stump(1));
        save_json(&registry, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"kind\": \"stump\""));

        let loaded: ModelRegistry<FittedModel> = load_json(&path).unwrap();
        assert_eq!(loaded.labels().collect::<Vec<_>>(), vec!["V1", "V2"]);
        assert_eq!(loaded.get("V2").and_then(|m| m.as_stump()).map(|s| s.feature_index), Some(2));
    }

    #[test]
    fn stratified_registry_nests_by_stratum() {
        let mut a = ModelRegistry::new();
        a.insert("V1", stump(0));
        let mut b = ModelRegistry::new();
        b.insert("V1", stump(1));
        b.insert("V2", stump(1));

        let mut nested = StratifiedRegistry::new();
        nested.insert("plate_a", a);
        nested.insert("plate_b", b);
        assert_eq!(nested.n_models(), 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        save_json(&nested, &path).unwrap();
        let loaded: StratifiedRegistry<FittedModel> = load_json(&path).unwrap();
        assert_eq!(loaded.get("plate_b").map(|r| r.len()), Some(2));
    }

    #[test]
    fn loading_a_missing_file_is_an_io_error() {
        let err = load_json::<ModelRegistry<FittedModel>, _>("/nonexistent/models.json").unwrap_err();
        assert!(matches!(err, OvwtError::Io { .. }));
    }
}

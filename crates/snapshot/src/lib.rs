//! Candidate index and registry snapshot acquisition.
//!
//! Provides the `SnapshotSource` trait and its HTTP registry implementation,
//! plus the in-memory `EntityIndex` the resolver queries. A snapshot is
//! obtained once per lookup and never re-read mid-computation, so results
//! are internally consistent even while the registry is being mutated.

use scicoll_model::{CandidateEntity, Collection, ExplicitMapping, Institution};
use scicoll_normalize::{normalize_code, normalize_identifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Errors from snapshot acquisition.
///
/// These propagate to the caller unchanged; retry policy belongs to the
/// storage collaborator, not the lookup engine.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Snapshot fetch failed: {0}")]
    FetchFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry not available")]
    Unavailable,
}

/// Immutable lookup index over one entity class.
///
/// Each accessor performs an exact match after normalization and returns a
/// duplicate-free set; no ordering is guaranteed beyond entity key. Empty
/// results are a normal, non-error outcome.
#[derive(Debug, Clone)]
pub struct EntityIndex<T> {
    entities: Vec<T>,
    by_key: HashMap<Uuid, usize>,
    by_code: HashMap<String, Vec<usize>>,
    by_name: HashMap<String, Vec<usize>>,
    by_alternative_code: HashMap<String, Vec<usize>>,
    by_identifier: HashMap<String, Vec<usize>>,
}

impl<T: CandidateEntity> EntityIndex<T> {
    /// Build the index from an entity snapshot.
    pub fn build(entities: Vec<T>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_alternative_code: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_identifier: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, entity) in entities.iter().enumerate() {
            by_key.insert(entity.key(), i);

            let code = normalize_code(entity.code());
            if !code.is_empty() {
                by_code.entry(code).or_default().push(i);
            }

            let name = normalize_code(entity.name());
            if !name.is_empty() {
                by_name.entry(name).or_default().push(i);
            }

            for alt in entity.alternative_codes() {
                let alt = normalize_code(alt);
                if alt.is_empty() {
                    continue;
                }
                let slots = by_alternative_code.entry(alt).or_default();
                if slots.last() != Some(&i) {
                    slots.push(i);
                }
            }

            for identifier in entity.identifiers() {
                let value = normalize_identifier(&identifier.value);
                if value.is_empty() {
                    continue;
                }
                let slots = by_identifier.entry(value).or_default();
                if slots.last() != Some(&i) {
                    slots.push(i);
                }
            }
        }

        Self {
            entities,
            by_key,
            by_code,
            by_name,
            by_alternative_code,
            by_identifier,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn find_by_code(&self, code: &str) -> Vec<&T> {
        self.select(&self.by_code, normalize_code(code))
    }

    pub fn find_by_name(&self, name: &str) -> Vec<&T> {
        self.select(&self.by_name, normalize_code(name))
    }

    pub fn find_by_alternative_code(&self, code: &str) -> Vec<&T> {
        self.select(&self.by_alternative_code, normalize_code(code))
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Vec<&T> {
        self.select(&self.by_identifier, normalize_identifier(identifier))
    }

    pub fn find_by_key(&self, key: Uuid) -> Option<&T> {
        self.by_key.get(&key).map(|&i| &self.entities[i])
    }

    fn select(&self, map: &HashMap<String, Vec<usize>>, key: String) -> Vec<&T> {
        if key.is_empty() {
            return Vec::new();
        }
        map.get(&key)
            .map(|slots| slots.iter().map(|&i| &self.entities[i]).collect())
            .unwrap_or_default()
    }
}

/// Serde shape of a full registry snapshot.
///
/// Doubles as the registry export payload and the offline fixture format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    #[serde(default)]
    pub institutions: Vec<Institution>,

    #[serde(default)]
    pub collections: Vec<Collection>,

    #[serde(default)]
    pub institution_mappings: Vec<ExplicitMapping>,

    #[serde(default)]
    pub collection_mappings: Vec<ExplicitMapping>,
}

/// A consistent point-in-time view of the registry for one lookup.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    institutions: EntityIndex<Institution>,
    collections: EntityIndex<Collection>,
    institution_mappings: Vec<ExplicitMapping>,
    collection_mappings: Vec<ExplicitMapping>,
}

impl RegistrySnapshot {
    pub fn from_data(data: SnapshotData) -> Self {
        Self {
            institutions: EntityIndex::build(data.institutions),
            collections: EntityIndex::build(data.collections),
            institution_mappings: data.institution_mappings,
            collection_mappings: data.collection_mappings,
        }
    }

    pub fn institutions(&self) -> &EntityIndex<Institution> {
        &self.institutions
    }

    pub fn collections(&self) -> &EntityIndex<Collection> {
        &self.collections
    }

    pub fn institution_mappings(&self) -> &[ExplicitMapping] {
        &self.institution_mappings
    }

    pub fn collection_mappings(&self) -> &[ExplicitMapping] {
        &self.collection_mappings
    }
}

/// Load a snapshot from a JSON file.
pub fn load_snapshot_file(path: impl AsRef<Path>) -> Result<RegistrySnapshot, SnapshotError> {
    let raw = std::fs::read_to_string(path)?;
    let data: SnapshotData =
        serde_json::from_str(&raw).map_err(|e| SnapshotError::ParseError(e.to_string()))?;
    Ok(RegistrySnapshot::from_data(data))
}

/// Trait for snapshot sources (live registry, file fixture, ...).
///
/// This abstraction keeps the resolution logic independent of where the
/// entity snapshot comes from.
pub trait SnapshotSource {
    /// Fetch a consistent snapshot of institutions, collections and
    /// explicit mappings.
    fn fetch_snapshot(
        &self,
    ) -> impl Future<Output = Result<RegistrySnapshot, SnapshotError>> + Send;

    /// Check if the source is healthy.
    fn health_check(&self) -> impl Future<Output = Result<(), SnapshotError>> + Send;

    /// Get the source name for logging.
    fn name(&self) -> &'static str;
}

/// Registry HTTP client configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the registry web service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

/// HTTP client for the registry's lookup export endpoint.
pub struct RegistryClient {
    config: RegistryConfig,
    client: reqwest::Client,
}

impl RegistryClient {
    /// Create a new registry client.
    pub fn new(config: RegistryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn export_url(&self) -> String {
        format!("{}/lookup/snapshot", self.config.base_url)
    }
}

impl SnapshotSource for RegistryClient {
    async fn fetch_snapshot(&self) -> Result<RegistrySnapshot, SnapshotError> {
        let url = self.export_url();

        tracing::debug!(url = %url, "Fetching registry snapshot");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SnapshotError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SnapshotError::FetchFailed(format!("HTTP {}: {}", status, body)));
        }

        let data: SnapshotData = response
            .json()
            .await
            .map_err(|e| SnapshotError::ParseError(e.to_string()))?;

        tracing::debug!(
            institutions = data.institutions.len(),
            collections = data.collections.len(),
            "Snapshot received"
        );

        Ok(RegistrySnapshot::from_data(data))
    }

    async fn health_check(&self) -> Result<(), SnapshotError> {
        let response = self
            .client
            .get(format!("{}/health", self.config.base_url))
            .send()
            .await
            .map_err(|e| SnapshotError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SnapshotError::Unavailable)
        }
    }

    fn name(&self) -> &'static str {
        "registry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scicoll_model::{Identifier, IdentifierType};

    fn institution(key: u128, code: &str, name: &str) -> Institution {
        Institution::new(Uuid::from_u128(key), code, name)
    }

    #[test]
    fn test_find_by_code_case_insensitive() {
        let index = EntityIndex::build(vec![institution(1, "NHMUK", "Natural History Museum")]);
        assert_eq!(index.find_by_code("nhmuk").len(), 1);
        assert_eq!(index.find_by_code("  NHMUK ").len(), 1);
        assert!(index.find_by_code("OTHER").is_empty());
    }

    #[test]
    fn test_find_by_code_returns_all_homonyms() {
        let index = EntityIndex::build(vec![
            institution(1, "MSB", "Museum of Southwestern Biology"),
            institution(2, "MSB", "Muzeum Slaska B."),
        ]);
        assert_eq!(index.find_by_code("MSB").len(), 2);
    }

    #[test]
    fn test_find_by_name_and_alternative_code() {
        let mut i = institution(1, "NHMUK", "Natural History Museum");
        i.alternative_codes = vec!["BMNH".to_string(), "NHM".to_string()];
        let index = EntityIndex::build(vec![i]);

        assert_eq!(index.find_by_name("natural history museum").len(), 1);
        assert_eq!(index.find_by_alternative_code("bmnh").len(), 1);
        assert_eq!(index.find_by_alternative_code("NHM").len(), 1);
        assert!(index.find_by_alternative_code("NHMUK").is_empty());
    }

    #[test]
    fn test_find_by_identifier_strips_scheme() {
        let mut i = institution(1, "K", "Kew");
        i.identifiers = vec![Identifier::new(
            IdentifierType::Lsid,
            "urn:lsid:biocol.org:col:15670",
        )];
        let index = EntityIndex::build(vec![i]);

        assert_eq!(index.find_by_identifier("biocol.org:col:15670").len(), 1);
        assert_eq!(index.find_by_identifier("urn:lsid:biocol.org:col:15670").len(), 1);
        assert!(index.find_by_identifier("biocol.org:col:99999").is_empty());
    }

    #[test]
    fn test_find_by_key() {
        let index = EntityIndex::build(vec![institution(7, "K", "Kew")]);
        assert!(index.find_by_key(Uuid::from_u128(7)).is_some());
        assert!(index.find_by_key(Uuid::from_u128(8)).is_none());
    }

    #[test]
    fn test_blank_fields_are_not_indexed() {
        let mut i = institution(1, "  ", "");
        i.alternative_codes = vec![" ".to_string()];
        let index = EntityIndex::build(vec![i]);
        assert!(index.find_by_code("").is_empty());
        assert!(index.find_by_name("").is_empty());
        assert!(index.find_by_alternative_code("").is_empty());
    }

    #[test]
    fn test_snapshot_data_roundtrip() {
        let data = SnapshotData {
            institutions: vec![institution(1, "K", "Kew")],
            collections: vec![Collection::new(Uuid::from_u128(2), "Herb", "Herbarium")],
            institution_mappings: Vec::new(),
            collection_mappings: Vec::new(),
        };
        let json = serde_json::to_string(&data).unwrap();
        let parsed: SnapshotData = serde_json::from_str(&json).unwrap();
        let snapshot = RegistrySnapshot::from_data(parsed);
        assert_eq!(snapshot.institutions().len(), 1);
        assert_eq!(snapshot.collections().len(), 1);
    }

    #[test]
    fn test_registry_export_url() {
        let client = RegistryClient::new(RegistryConfig::default());
        assert_eq!(client.export_url(), "http://127.0.0.1:8080/lookup/snapshot");
    }
}

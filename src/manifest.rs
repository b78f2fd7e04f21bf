//! # Manifest Store
//!
//! Durable, network-scoped record of what has been deployed where. One JSON
//! file per network under the manifest directory, flat map of contract name
//! to `{address, classHash, abi, deployedAt}`; the same file the
//! initialization tooling reads to wire up permissions.
//!
//! Persistence is atomic (temporary file, then rename) and the directory is
//! guarded by an exclusive advisory lock so two runs cannot interleave
//! writes. A missing manifest file is first-run bootstrap, not an error.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use starknet::core::types::FieldElement;
use tracing::{debug, info};

use crate::types::{ContractName, DeployError, DeployResult, Network};

/// One successfully deployed contract, as persisted in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    #[serde(with = "felt_hex")]
    pub address: FieldElement,
    #[serde(with = "felt_hex")]
    pub class_hash: FieldElement,
    pub abi: serde_json::Value,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(address: FieldElement, class_hash: FieldElement, abi: serde_json::Value) -> Self {
        Self {
            address,
            class_hash,
            abi,
            deployed_at: Utc::now(),
        }
    }
}

/// Contract name → deployment record for one network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    contracts: BTreeMap<ContractName, DeploymentRecord>,
}

impl Manifest {
    pub fn get(&self, name: &ContractName) -> Option<&DeploymentRecord> {
        self.contracts.get(name)
    }

    /// Insert a record, replacing any prior record for the same name.
    pub fn insert(&mut self, name: ContractName, record: DeploymentRecord) {
        self.contracts.insert(name, record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContractName, &DeploymentRecord)> {
        self.contracts.iter()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Durable manifest storage for one network.
///
/// Holds an exclusive advisory lock on the manifest directory for its whole
/// lifetime; a second concurrent store fails fast instead of corrupting the
/// file.
#[derive(Debug)]
pub struct ManifestStore {
    dir: PathBuf,
    network: Network,
    manifest: Manifest,
    _lock: File,
}

impl ManifestStore {
    /// Open the store for `network`, creating the directory, taking the
    /// advisory lock, and loading the existing manifest (or an empty one).
    pub fn open(dir: impl Into<PathBuf>, network: Network) -> DeployResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            DeployError::Persistence(format!(
                "failed to create manifest directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(dir.join(".lock"))
            .map_err(|e| DeployError::Persistence(format!("failed to open lock file: {}", e)))?;
        lock.try_lock_exclusive().map_err(|_| {
            DeployError::Persistence(format!(
                "another deployment run holds the lock on {}",
                dir.display()
            ))
        })?;

        let manifest = load_manifest(&manifest_path(&dir, network))?;
        if manifest.is_empty() {
            debug!("No prior manifest for {}, starting empty", network);
        } else {
            info!(
                "Loaded manifest for {} with {} contracts",
                network,
                manifest.len()
            );
        }

        Ok(Self {
            dir,
            network,
            manifest,
            _lock: lock,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn lookup(&self, name: &ContractName) -> Option<&DeploymentRecord> {
        self.manifest.get(name)
    }

    /// Record a successful deployment, replacing any prior record for the
    /// same contract name. The manifest reflects the latest deployment, not
    /// history.
    pub fn record_success(&mut self, name: ContractName, record: DeploymentRecord) {
        info!(
            "Recording {} at {:#x} (class hash {:#x}) for {}",
            name, record.address, record.class_hash, self.network
        );
        self.manifest.insert(name, record);
    }

    /// Write the manifest to disk atomically.
    ///
    /// Serializes to a temporary file in the same directory and renames it
    /// into place; a crash mid-write leaves the previous manifest intact.
    pub fn persist(&self) -> DeployResult<()> {
        let path = manifest_path(&self.dir, self.network);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", self.network));

        let json = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| DeployError::Persistence(format!("failed to serialize manifest: {}", e)))?;
        fs::write(&tmp_path, json).map_err(|e| {
            DeployError::Persistence(format!(
                "failed to write {}: {}",
                tmp_path.display(),
                e
            ))
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            DeployError::Persistence(format!(
                "failed to move manifest into place at {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!("Persisted manifest to {}", path.display());
        Ok(())
    }
}

fn manifest_path(dir: &Path, network: Network) -> PathBuf {
    dir.join(format!("{}.json", network))
}

fn load_manifest(path: &Path) -> DeployResult<Manifest> {
    if !path.exists() {
        return Ok(Manifest::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| DeployError::Persistence(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| DeployError::Persistence(format!("corrupt manifest {}: {}", path.display(), e)))
}

/// Felts persist as `0x`-prefixed hex, matching how addresses and class
/// hashes appear everywhere else in the tooling.
mod felt_hex {
    use serde::{Deserialize, Deserializer, Serializer};
    use starknet::core::types::FieldElement;

    pub fn serialize<S: Serializer>(value: &FieldElement, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FieldElement, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldElement::from_hex_be(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_record(address: u64, class_hash: u64) -> DeploymentRecord {
        DeploymentRecord::new(
            FieldElement::from(address),
            FieldElement::from(class_hash),
            serde_json::json!([{"type": "constructor", "inputs": []}]),
        )
    }

    #[test]
    fn test_empty_manifest_bootstrap() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path(), Network::Mainnet).unwrap();
        assert!(store.manifest().is_empty());
        assert!(store.lookup(&ContractName::from("Loomi")).is_none());
    }

    #[test]
    fn test_record_overwrites_per_name() {
        let dir = TempDir::new().unwrap();
        let mut store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();

        store.record_success(ContractName::from("Gem"), create_test_record(1, 10));
        store.record_success(ContractName::from("Gem"), create_test_record(2, 20));

        assert_eq!(store.manifest().len(), 1);
        let record = store.lookup(&ContractName::from("Gem")).unwrap();
        assert_eq!(record.address, FieldElement::from(2u64));
        assert_eq!(record.class_hash, FieldElement::from(20u64));
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();
            store.record_success(ContractName::from("Loomi"), create_test_record(7, 70));
            store.persist().unwrap();
        }

        let store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();
        let record = store.lookup(&ContractName::from("Loomi")).unwrap();
        assert_eq!(record.address, FieldElement::from(7u64));
        assert!(record.abi.is_array());
    }

    #[test]
    fn test_networks_have_separate_manifests() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();
            store.record_success(ContractName::from("Gem"), create_test_record(1, 10));
            store.persist().unwrap();
        }

        let store = ManifestStore::open(dir.path(), Network::Devnet).unwrap();
        assert!(store.lookup(&ContractName::from("Gem")).is_none());
    }

    #[test]
    fn test_crashed_partial_write_leaves_manifest_intact() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();
            store.record_success(ContractName::from("Gem"), create_test_record(1, 10));
            store.persist().unwrap();
        }

        // Simulate a crash after the temporary write but before the rename
        fs::write(dir.path().join(".sepolia.json.tmp"), "{ truncated garb").unwrap();

        let store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();
        let record = store.lookup(&ContractName::from("Gem")).unwrap();
        assert_eq!(record.address, FieldElement::from(1u64));
    }

    #[test]
    fn test_concurrent_open_fails_fast() {
        let dir = TempDir::new().unwrap();
        let _first = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();

        let err = ManifestStore::open(dir.path(), Network::Sepolia).unwrap_err();
        assert!(matches!(err, DeployError::Persistence(_)));
    }

    #[test]
    fn test_on_disk_format_is_camel_case_hex() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ManifestStore::open(dir.path(), Network::Sepolia).unwrap();
            store.record_success(ContractName::from("SBT"), create_test_record(0xff, 0xaa));
            store.persist().unwrap();
        }

        let raw = fs::read_to_string(dir.path().join("sepolia.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["SBT"]["address"], "0xff");
        assert_eq!(json["SBT"]["classHash"], "0xaa");
        assert!(json["SBT"]["deployedAt"].is_string());
    }
}

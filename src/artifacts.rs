//! # Artifact Resolver
//!
//! Loads compiled contract classes from a Scarb build directory by logical
//! name. Scarb writes two files per contract:
//!
//! - `<package>_<Name>.contract_class.json` (Sierra class + ABI)
//! - `<package>_<Name>.compiled_contract_class.json` (CASM class)
//!
//! Both class hashes are computed locally from the artifact contents, never
//! via a network round trip. Parsed artifacts are cached for the run, so
//! resolving the same name twice returns the same `Arc`.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use starknet::core::types::contract::{CompiledClass, SierraClass};
use starknet::core::types::{FieldElement, FlattenedSierraClass};
use tracing::debug;

use crate::types::{ContractName, DeployError, DeployResult};

/// A compiled contract class, ready to declare and deploy.
///
/// Immutable once loaded; shared via `Arc` across the tracker, batcher and
/// manifest recording.
#[derive(Debug)]
pub struct ContractArtifact {
    pub name: ContractName,
    /// Sierra class hash, the on-chain identity of the class
    pub class_hash: FieldElement,
    /// CASM class hash, required alongside the Sierra class when declaring
    pub compiled_class_hash: FieldElement,
    /// Flattened Sierra class in the form declare transactions carry
    pub flattened: Arc<FlattenedSierraClass>,
    /// Raw ABI as emitted by the compiler, recorded into the manifest
    pub abi: serde_json::Value,
}

/// Resolves logical contract names to parsed build artifacts.
pub struct ArtifactResolver {
    dir: PathBuf,
    package: String,
    cache: HashMap<ContractName, Arc<ContractArtifact>>,
}

impl ArtifactResolver {
    pub fn new(dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package: package.into(),
            cache: HashMap::new(),
        }
    }

    /// Load and parse the artifact for `name`, or return the cached copy.
    pub fn resolve(&mut self, name: &ContractName) -> DeployResult<Arc<ContractArtifact>> {
        if let Some(artifact) = self.cache.get(name) {
            return Ok(artifact.clone());
        }

        let sierra_path = self
            .dir
            .join(format!("{}_{}.contract_class.json", self.package, name));
        let casm_path = self.dir.join(format!(
            "{}_{}.compiled_contract_class.json",
            self.package, name
        ));

        let sierra_raw = read_artifact_file(name, &sierra_path)?;
        let casm_raw = read_artifact_file(name, &casm_path)?;

        let sierra: SierraClass =
            serde_json::from_str(&sierra_raw).map_err(|e| corrupt(name, &sierra_path, e))?;
        let casm: CompiledClass =
            serde_json::from_str(&casm_raw).map_err(|e| corrupt(name, &casm_path, e))?;

        // The ABI is kept as raw JSON for the manifest; the typed view in
        // SierraClass is only needed for hashing.
        let abi = serde_json::from_str::<serde_json::Value>(&sierra_raw)
            .ok()
            .and_then(|v| v.get("abi").cloned())
            .unwrap_or(serde_json::Value::Null);

        let class_hash = sierra
            .class_hash()
            .map_err(|e| corrupt(name, &sierra_path, e))?;
        let compiled_class_hash = casm
            .class_hash()
            .map_err(|e| corrupt(name, &casm_path, e))?;
        let flattened = sierra
            .flatten()
            .map_err(|e| corrupt(name, &sierra_path, e))?;

        debug!(
            "Loaded artifact {} (class hash {:#x}, compiled class hash {:#x})",
            name, class_hash, compiled_class_hash
        );

        let artifact = Arc::new(ContractArtifact {
            name: name.clone(),
            class_hash,
            compiled_class_hash,
            flattened: Arc::new(flattened),
            abi,
        });
        self.cache.insert(name.clone(), artifact.clone());
        Ok(artifact)
    }

    /// Cached artifact for `name`, if it was resolved during this run.
    pub fn cached(&self, name: &ContractName) -> Option<Arc<ContractArtifact>> {
        self.cache.get(name).cloned()
    }
}

fn read_artifact_file(name: &ContractName, path: &Path) -> DeployResult<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(DeployError::ArtifactNotFound {
            name: name.clone(),
            path: path.to_path_buf(),
        }),
        Err(e) => Err(corrupt(name, path, e)),
    }
}

fn corrupt(name: &ContractName, path: &Path, err: impl std::fmt::Display) -> DeployError {
    DeployError::ArtifactCorrupt {
        name: name.clone(),
        reason: format!("{}: {}", path.display(), err),
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;
    use tempfile::TempDir;

    fn create_test_resolver() -> (ArtifactResolver, TempDir) {
        let dir = TempDir::new().unwrap();
        let resolver = ArtifactResolver::new(dir.path(), TEST_PACKAGE);
        (resolver, dir)
    }

    #[test]
    fn test_resolve_parses_and_hashes() {
        let (mut resolver, dir) = create_test_resolver();
        write_test_artifact(dir.path(), "Loomi", 1);

        let artifact = resolver.resolve(&ContractName::from("Loomi")).unwrap();
        assert_eq!(artifact.name.as_str(), "Loomi");
        assert_ne!(artifact.class_hash, FieldElement::ZERO);
        assert_ne!(artifact.compiled_class_hash, FieldElement::ZERO);
        assert!(artifact.abi.is_array());
    }

    #[test]
    fn test_resolve_is_cached() {
        let (mut resolver, dir) = create_test_resolver();
        write_test_artifact(dir.path(), "Gem", 2);

        let first = resolver.resolve(&ContractName::from("Gem")).unwrap();
        let second = resolver.resolve(&ContractName::from("Gem")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_contracts_get_distinct_hashes() {
        let (mut resolver, dir) = create_test_resolver();
        write_test_artifact(dir.path(), "Loomi", 1);
        write_test_artifact(dir.path(), "Gem", 2);

        let loomi = resolver.resolve(&ContractName::from("Loomi")).unwrap();
        let gem = resolver.resolve(&ContractName::from("Gem")).unwrap();
        assert_ne!(loomi.class_hash, gem.class_hash);
    }

    #[test]
    fn test_missing_artifact() {
        let (mut resolver, _dir) = create_test_resolver();
        let err = resolver.resolve(&ContractName::from("Missing")).unwrap_err();
        assert!(matches!(err, DeployError::ArtifactNotFound { name, .. } if name.as_str() == "Missing"));
    }

    #[test]
    fn test_corrupt_artifact() {
        let (mut resolver, dir) = create_test_resolver();
        fs::write(
            dir.path()
                .join(format!("{}_Broken.contract_class.json", TEST_PACKAGE)),
            "not json",
        )
        .unwrap();
        fs::write(
            dir.path()
                .join(format!("{}_Broken.compiled_contract_class.json", TEST_PACKAGE)),
            "not json",
        )
        .unwrap();

        let err = resolver.resolve(&ContractName::from("Broken")).unwrap_err();
        assert!(matches!(err, DeployError::ArtifactCorrupt { name, .. } if name.as_str() == "Broken"));
    }
}

//! # Deployment Configuration
//!
//! Environment-sourced configuration for a deployment run. Validation
//! happens here, at the boundary: the orchestration core only ever sees
//! parsed values.
//!
//! Each network has its own set of environment variables
//! (`RPC_URL_SEPOLIA`, `ACCOUNT_ADDRESS_SEPOLIA`, `PRIVATE_KEY_SEPOLIA`,
//! same pattern for `DEVNET` and `MAINNET`). Devnet falls back to the
//! standard local node defaults when unset; the public networks fail
//! validation instead.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use starknet::core::types::FieldElement;

use crate::types::{DeployError, DeployResult, Network};

/// Default RPC endpoint for a local devnet
pub const DEVNET_RPC_URL: &str = "http://127.0.0.1:5050";

/// Prefunded devnet account used when no credentials are configured
const DEVNET_ACCOUNT_ADDRESS: &str =
    "0x39ef101f5d04a6679575799c4973ce68173aa789b1db7fbf148053c4665775d";
const DEVNET_PRIVATE_KEY: &str = "0xf320712abb71d832640dda2144a55278";

const DEFAULT_FEE_MULTIPLIER_PERCENT: u64 = 200;
const DEFAULT_INCLUSION_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_ARTIFACTS_DIR: &str = "target/dev";
const DEFAULT_SCARB_PACKAGE: &str = "contracts";
const DEFAULT_MANIFEST_DIR: &str = "deployments";

/// Configuration for one deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// Target network; selects the signer profile and manifest file
    pub network: Network,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Safety multiplier applied to fee estimates, in percent (200 = double)
    pub fee_multiplier_percent: u64,
    /// Bound on waiting for transaction inclusion
    pub inclusion_timeout_secs: u64,
    /// Receipt polling interval while waiting for inclusion
    pub poll_interval_secs: u64,
    /// Scarb build output directory holding the compiled classes
    pub artifacts_dir: PathBuf,
    /// Scarb package name, used as the artifact file prefix
    pub scarb_package: String,
    /// Directory holding the per-network manifest files
    pub manifest_dir: PathBuf,
}

impl DeployerConfig {
    /// Build a config for `network` from the environment.
    ///
    /// `RPC_URL_<NET>` selects the endpoint (devnet defaults to the local
    /// node); `FEE_MULTIPLIER_PERCENT` overrides the fee safety margin.
    pub fn from_env(network: Network) -> DeployResult<Self> {
        let rpc_url = match env_var(&format!("RPC_URL_{}", network.env_suffix())) {
            Some(url) => url,
            None if network == Network::Devnet => DEVNET_RPC_URL.to_string(),
            None => {
                return Err(DeployError::Configuration(format!(
                    "RPC_URL_{} is not set",
                    network.env_suffix()
                )))
            }
        };

        let fee_multiplier_percent = match env_var("FEE_MULTIPLIER_PERCENT") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                DeployError::Configuration(format!(
                    "FEE_MULTIPLIER_PERCENT must be an integer, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_FEE_MULTIPLIER_PERCENT,
        };

        Ok(Self {
            network,
            rpc_url,
            fee_multiplier_percent,
            inclusion_timeout_secs: DEFAULT_INCLUSION_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            scarb_package: DEFAULT_SCARB_PACKAGE.to_string(),
            manifest_dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
        })
    }
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            network: Network::Devnet,
            rpc_url: DEVNET_RPC_URL.to_string(),
            fee_multiplier_percent: DEFAULT_FEE_MULTIPLIER_PERCENT,
            inclusion_timeout_secs: DEFAULT_INCLUSION_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            scarb_package: DEFAULT_SCARB_PACKAGE.to_string(),
            manifest_dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
        }
    }
}

/// Signing identity for the deployer account.
///
/// `Debug` is hand-written so the private key never ends up in logs.
#[derive(Clone)]
pub struct DeployerCredentials {
    pub account_address: FieldElement,
    pub private_key: FieldElement,
}

impl std::fmt::Debug for DeployerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerCredentials")
            .field("account_address", &format_args!("{:#x}", self.account_address))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl DeployerCredentials {
    /// Load credentials for `network` from `ACCOUNT_ADDRESS_<NET>` and
    /// `PRIVATE_KEY_<NET>`, falling back to the prefunded devnet account.
    pub fn from_env(network: Network) -> DeployResult<Self> {
        let suffix = network.env_suffix();

        let address_raw = match env_var(&format!("ACCOUNT_ADDRESS_{}", suffix)) {
            Some(raw) => raw,
            None if network == Network::Devnet => DEVNET_ACCOUNT_ADDRESS.to_string(),
            None => {
                return Err(DeployError::Configuration(format!(
                    "ACCOUNT_ADDRESS_{} is not set",
                    suffix
                )))
            }
        };
        let key_raw = match env_var(&format!("PRIVATE_KEY_{}", suffix)) {
            Some(raw) => raw,
            None if network == Network::Devnet => DEVNET_PRIVATE_KEY.to_string(),
            None => {
                return Err(DeployError::Configuration(format!(
                    "PRIVATE_KEY_{} is not set",
                    suffix
                )))
            }
        };

        let account_address = FieldElement::from_hex_be(&address_raw).map_err(|e| {
            DeployError::Configuration(format!("ACCOUNT_ADDRESS_{} is not valid hex: {}", suffix, e))
        })?;
        let private_key = FieldElement::from_hex_be(&key_raw).map_err(|e| {
            DeployError::Configuration(format!("PRIVATE_KEY_{} is not valid hex: {}", suffix, e))
        })?;

        Ok(Self {
            account_address,
            private_key,
        })
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devnet_defaults() {
        std::env::remove_var("RPC_URL_DEVNET");
        std::env::remove_var("ACCOUNT_ADDRESS_DEVNET");
        std::env::remove_var("PRIVATE_KEY_DEVNET");
        std::env::remove_var("FEE_MULTIPLIER_PERCENT");

        let config = DeployerConfig::from_env(Network::Devnet).unwrap();
        assert_eq!(config.rpc_url, DEVNET_RPC_URL);
        assert_eq!(config.fee_multiplier_percent, 200);

        let creds = DeployerCredentials::from_env(Network::Devnet).unwrap();
        assert_eq!(
            creds.account_address,
            FieldElement::from_hex_be(DEVNET_ACCOUNT_ADDRESS).unwrap()
        );
    }

    #[test]
    fn test_missing_public_network_vars_rejected() {
        std::env::remove_var("RPC_URL_MAINNET");
        let err = DeployerConfig::from_env(Network::Mainnet).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));

        std::env::remove_var("ACCOUNT_ADDRESS_MAINNET");
        std::env::remove_var("PRIVATE_KEY_MAINNET");
        assert!(DeployerCredentials::from_env(Network::Mainnet).is_err());
    }

    #[test]
    fn test_invalid_credentials_rejected() {
        std::env::set_var("ACCOUNT_ADDRESS_SEPOLIA", "not-hex");
        std::env::set_var("PRIVATE_KEY_SEPOLIA", "0x1");
        let err = DeployerCredentials::from_env(Network::Sepolia).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
        std::env::remove_var("ACCOUNT_ADDRESS_SEPOLIA");
        std::env::remove_var("PRIVATE_KEY_SEPOLIA");
    }

    #[test]
    fn test_default_config() {
        let config = DeployerConfig::default();
        assert_eq!(config.network, Network::Devnet);
        assert_eq!(config.scarb_package, "contracts");
        assert_eq!(config.manifest_dir, PathBuf::from("deployments"));
    }
}

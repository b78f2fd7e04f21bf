//! # Core Types
//!
//! Shared types for the deployment orchestration layer: contract naming,
//! network selection, the crate-wide error enum, and well-known chain
//! constants.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use starknet::core::types::FieldElement;

/// Logical name of a contract, matching the Scarb artifact name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractName(pub String);

impl ContractName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContractName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ContractName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Target network for a deployment run.
///
/// Selects the provider/signer profile and the manifest file the run
/// reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Devnet,
    Sepolia,
    Mainnet,
}

impl Network {
    /// Suffix used for this network's environment variables
    /// (`RPC_URL_SEPOLIA`, `ACCOUNT_ADDRESS_SEPOLIA`, ...).
    pub fn env_suffix(&self) -> &'static str {
        match self {
            Network::Devnet => "DEVNET",
            Network::Sepolia => "SEPOLIA",
            Network::Mainnet => "MAINNET",
        }
    }

    /// Chain ID the account signs transactions for.
    ///
    /// Local devnets fork Sepolia and present its chain ID; a mismatched
    /// node is caught by `RuntimeContext::verify_chain`.
    pub fn chain_id(&self) -> FieldElement {
        match self {
            Network::Devnet | Network::Sepolia => *CHAIN_ID_SEPOLIA,
            Network::Mainnet => *CHAIN_ID_MAINNET,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Devnet => "devnet",
            Network::Sepolia => "sepolia",
            Network::Mainnet => "mainnet",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Network {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Network::Devnet),
            "sepolia" => Ok(Network::Sepolia),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(DeployError::Configuration(format!(
                "unknown network '{}', expected devnet, sepolia or mainnet",
                other
            ))),
        }
    }
}

/// Errors surfaced by the deployment orchestration layer.
///
/// Every variant is fatal for the run: nothing is retried automatically,
/// and the first failure propagates to the top so no dependent step runs
/// against an incomplete deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("no compiled artifact for contract '{name}': {path} not found")]
    ArtifactNotFound { name: ContractName, path: PathBuf },

    #[error("artifact for contract '{name}' could not be parsed: {reason}")]
    ArtifactCorrupt { name: ContractName, reason: String },

    #[error("declaration of '{name}' failed: {reason}")]
    DeclarationFailed { name: ContractName, reason: String },

    #[error("reference to '{0}' cannot be resolved: not planned in this run and not in the manifest")]
    UnresolvedReference(ContractName),

    #[error("fee estimation failed: {0}")]
    EstimationFailed(String),

    #[error("transaction rejected on submission: {0}")]
    SubmissionRejected(String),

    #[error("transaction {tx_hash:#x} reverted: {reason}")]
    ExecutionReverted {
        tx_hash: FieldElement,
        reason: String,
    },

    #[error("transaction {tx_hash:#x} not included after {timeout_secs} seconds")]
    InclusionTimeout {
        tx_hash: FieldElement,
        timeout_secs: u64,
    },

    #[error("manifest persistence error: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for deployment operations
pub type DeployResult<T> = Result<T, DeployError>;

lazy_static::lazy_static! {
    /// Chain ID for Starknet Sepolia (`SN_SEPOLIA`)
    pub static ref CHAIN_ID_SEPOLIA: FieldElement =
        FieldElement::from_hex_be("0x534e5f5345504f4c4941")
            .expect("Invalid chain id constant: SN_SEPOLIA");

    /// Chain ID for Starknet mainnet (`SN_MAIN`)
    pub static ref CHAIN_ID_MAINNET: FieldElement =
        FieldElement::from_hex_be("0x534e5f4d41494e")
            .expect("Invalid chain id constant: SN_MAIN");

    /// Universal Deployer Contract, the standard deployment entry point
    /// present on all public Starknet networks and on devnet forks.
    pub static ref UDC_ADDRESS: FieldElement =
        FieldElement::from_hex_be("0x041a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf")
            .expect("Invalid UDC address constant");
}

/// Entry point selectors used by the orchestration layer.
///
/// These are computed once; `get_selector_from_name` only fails for
/// non-ASCII names, which none of these are.
pub mod selectors {
    use starknet::core::types::FieldElement;
    use starknet::core::utils::get_selector_from_name;

    lazy_static::lazy_static! {
        /// UDC entry point that deploys a contract instance
        pub static ref DEPLOY_CONTRACT: FieldElement = get_selector_from_name("deployContract")
            .expect("Invalid selector name: deployContract");

        /// Gem entry point granting mint/burn rights to a handler contract
        pub static ref ADD_TRUSTED_HANDLER: FieldElement = get_selector_from_name("add_trusted_handler")
            .expect("Invalid selector name: add_trusted_handler");

        /// Loomi entry point approving a minter contract
        pub static ref APPROVE_MINTER: FieldElement = get_selector_from_name("approve_minter")
            .expect("Invalid selector name: approve_minter");
    }
}

//! # bb-deployer
//!
//! Deployment orchestration for the ByteBeasts reward contracts on
//! Starknet. Turns a declarative list of declare/deploy/invoke steps into
//! batched on-chain transactions, resolving references between contracts,
//! and persists every successful deployment into a durable, network-scoped
//! manifest.
//!
//! The crate ships two built-in pipelines: `reward-deploy` (the contract
//! set itself) and `reward-init` (post-deployment permission wiring), plus
//! the `bb-deployer` CLI driving them.

pub mod artifacts;
pub mod config;
pub mod context;
pub mod manifest;
pub mod orchestrator;
pub mod pipeline;
pub mod types;

// Re-export the types a caller driving a deployment needs
pub use artifacts::{ArtifactResolver, ContractArtifact};
pub use config::{DeployerConfig, DeployerCredentials};
pub use context::RuntimeContext;
pub use manifest::{DeploymentRecord, Manifest, ManifestStore};
pub use orchestrator::{CallArg, CallOutcome, DeploymentEngine, DeploymentRequest, PlanOutcome};
pub use pipeline::{reward_deploy_pipeline, reward_init_pipeline, run_pipeline, Pipeline};
pub use types::{ContractName, DeployError, DeployResult, Network};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

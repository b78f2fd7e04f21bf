//! # Deployment Pipelines
//!
//! Named, data-driven step lists. Each former deployment script is one
//! independent pipeline definition; the runner drives a step list through
//! the engine, flushes, and records every success into the manifest.

use starknet::core::types::FieldElement;
use tracing::{info, warn};

use crate::context::RuntimeContext;
use crate::manifest::{DeploymentRecord, ManifestStore};
use crate::orchestrator::{CallArg, CallOutcome, DeploymentEngine, DeploymentRequest};
use crate::types::{selectors, ContractName, DeployResult};

/// Default backend serving token/NFT metadata.
pub const DEFAULT_BASE_URL: &str = "https://bb-backend-stg.onrender.com";

/// One step in a pipeline.
#[derive(Debug)]
pub enum PipelineStep {
    /// Declare a class without deploying an instance
    Declare { contract: ContractName },
    /// Deploy a contract instance
    Deploy(DeploymentRequest),
    /// Invoke an entry point on a deployed contract
    Invoke {
        description: String,
        contract: ContractName,
        selector: FieldElement,
        args: Vec<CallArg>,
    },
}

/// A named, ordered list of deployment steps.
///
/// Order matters: later steps may reference the addresses and class hashes
/// of earlier ones.
#[derive(Debug)]
pub struct Pipeline {
    pub name: String,
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn declare(mut self, contract: impl Into<ContractName>) -> Self {
        self.steps.push(PipelineStep::Declare {
            contract: contract.into(),
        });
        self
    }

    pub fn deploy(mut self, request: DeploymentRequest) -> Self {
        self.steps.push(PipelineStep::Deploy(request));
        self
    }

    pub fn invoke(
        mut self,
        description: impl Into<String>,
        contract: impl Into<ContractName>,
        selector: FieldElement,
        args: Vec<CallArg>,
    ) -> Self {
        self.steps.push(PipelineStep::Invoke {
            description: description.into(),
            contract: contract.into(),
            selector,
            args,
        });
        self
    }
}

/// The reward-contract deployment pipeline.
///
/// Deploys the five reward/NFT contracts, declares the `Quest` class, and
/// deploys the `QuestFactory` wired to the results.
pub fn reward_deploy_pipeline(owner: FieldElement, base_url: &str) -> Pipeline {
    let uri = |path: &str| CallArg::str(format!("{}{}", base_url, path));

    Pipeline::new("reward-deploy")
        .deploy(DeploymentRequest::new(
            "Loomi",
            vec![CallArg::Felt(owner), uri("/reward/loomi/")],
        ))
        .deploy(DeploymentRequest::new(
            "Gem",
            vec![
                CallArg::Felt(owner),
                CallArg::address_of("Loomi"),
                uri("/reward/gem/"),
            ],
        ))
        .deploy(DeploymentRequest::new(
            "SBT",
            vec![CallArg::Felt(owner), uri("/sbt/")],
        ))
        .deploy(DeploymentRequest::new(
            "BBAvatar",
            vec![CallArg::Felt(owner), uri("/avatar/")],
        ))
        .deploy(DeploymentRequest::new(
            "WardrobeKey",
            vec![CallArg::Felt(owner), uri("/key/")],
        ))
        .declare("Quest")
        .deploy(DeploymentRequest::new(
            "QuestFactory",
            vec![
                CallArg::Felt(owner),
                CallArg::address_of("Gem"),
                CallArg::address_of("SBT"),
                CallArg::class_hash_of("Quest"),
            ],
        ))
}

/// The permission-wiring pipeline, run after `reward-deploy` against the
/// persisted manifest.
pub fn reward_init_pipeline() -> Pipeline {
    Pipeline::new("reward-init")
        .invoke(
            "add QuestFactory as trusted handler on Gem",
            "Gem",
            *selectors::ADD_TRUSTED_HANDLER,
            vec![CallArg::address_of("QuestFactory")],
        )
        .invoke(
            "approve Gem as minter on Loomi",
            "Loomi",
            *selectors::APPROVE_MINTER,
            vec![CallArg::address_of("Gem")],
        )
}

/// Drive `pipeline` through a fresh engine and record the results.
///
/// The manifest is persisted after each recorded success, so a failing run
/// leaves behind everything that did land and a re-run resumes via the
/// planner's already-deployed skip path.
pub async fn run_pipeline(
    ctx: &RuntimeContext,
    store: &mut ManifestStore,
    pipeline: &Pipeline,
) -> DeployResult<Vec<CallOutcome>> {
    info!(
        "Running pipeline '{}' on {} as {:#x}",
        pipeline.name,
        ctx.network(),
        ctx.deployer_address()
    );

    let mut engine = DeploymentEngine::new(ctx);
    engine.seed_from_manifest(store.manifest());

    for step in &pipeline.steps {
        match step {
            PipelineStep::Declare { contract } => {
                engine.declare_class(contract)?;
            }
            PipelineStep::Deploy(request) => {
                engine.plan_deploy(request.clone())?;
            }
            PipelineStep::Invoke {
                description,
                contract,
                selector,
                args,
            } => {
                engine.enqueue_invoke(description.clone(), contract.clone(), *selector, args.clone());
            }
        }
    }

    if engine.pending_calls() == 0 {
        info!("Pipeline '{}' has nothing to submit", pipeline.name);
        return Ok(Vec::new());
    }

    let outcomes = engine.flush(ctx).await?;

    for outcome in &outcomes {
        match outcome {
            CallOutcome::Deployed {
                name,
                address,
                class_hash,
                ..
            } => {
                let abi = match engine.cached_abi(name) {
                    Some(abi) => abi,
                    None => {
                        // Deployed from an explicit class hash with no local
                        // artifact; record the deployment without its ABI
                        warn!("No local artifact for {}, recording empty ABI", name);
                        serde_json::Value::Null
                    }
                };
                store.record_success(
                    name.clone(),
                    DeploymentRecord::new(*address, *class_hash, abi),
                );
                store.persist()?;
                info!("{} deployed at {:#x}", name, address);
            }
            CallOutcome::Declared {
                name, class_hash, ..
            } => {
                info!("{} declared with class hash {:#x}", name, class_hash);
            }
            CallOutcome::Invoked {
                description,
                tx_hash,
            } => {
                info!("Invoked: {} (tx {:#x})", description, tx_hash);
            }
        }
    }

    info!("Pipeline '{}' completed: {} calls", pipeline.name, outcomes.len());
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployerConfig, DeployerCredentials};
    use crate::types::{DeployError, Network};
    use tempfile::TempDir;

    #[test]
    fn test_reward_deploy_pipeline_shape() {
        let pipeline = reward_deploy_pipeline(FieldElement::from(0xabcu64), DEFAULT_BASE_URL);
        assert_eq!(pipeline.name, "reward-deploy");
        assert_eq!(pipeline.steps.len(), 7);

        // Quest is declared, never deployed
        assert!(matches!(
            pipeline.steps[5],
            PipelineStep::Declare { ref contract } if contract.as_str() == "Quest"
        ));

        // QuestFactory depends on Gem, SBT and the Quest class
        match &pipeline.steps[6] {
            PipelineStep::Deploy(request) => {
                let deps: Vec<&str> = request.dependencies().iter().map(|d| d.as_str()).collect();
                assert_eq!(deps, vec!["Gem", "SBT", "Quest"]);
            }
            other => panic!("expected QuestFactory deploy, got {:?}", other),
        }
    }

    #[test]
    fn test_reward_init_pipeline_shape() {
        let pipeline = reward_init_pipeline();
        assert_eq!(pipeline.name, "reward-init");
        assert_eq!(pipeline.steps.len(), 2);
        assert!(pipeline
            .steps
            .iter()
            .all(|step| matches!(step, PipelineStep::Invoke { .. })));
    }

    #[tokio::test]
    async fn test_init_without_deployments_fails_before_submission() {
        let manifest_dir = TempDir::new().unwrap();
        let config = DeployerConfig {
            manifest_dir: manifest_dir.path().to_path_buf(),
            ..DeployerConfig::default()
        };
        let credentials = DeployerCredentials {
            account_address: FieldElement::from(0xabcu64),
            private_key: FieldElement::from(0x123u64),
        };
        let ctx = RuntimeContext::new(config, credentials).unwrap();
        let mut store = ManifestStore::open(manifest_dir.path(), Network::Devnet).unwrap();

        let err = run_pipeline(&ctx, &mut store, &reward_init_pipeline())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::UnresolvedReference(name) if name.as_str() == "Gem"));
        assert!(store.manifest().is_empty());
    }
}

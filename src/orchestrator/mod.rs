//! # Deployment Orchestration
//!
//! The core of the crate: turns a declarative list of declare/deploy/invoke
//! requests into batched on-chain transactions, resolving references to
//! earlier results along the way.
//!
//! [`DeploymentEngine`] owns the per-run state (artifact cache, declaration
//! tracker, address registry, call queue) and is driven sequentially:
//! plan/enqueue steps accumulate calls, [`DeploymentEngine::flush`] submits
//! them and returns per-call outcomes.

pub mod batch;
pub mod calldata;
pub mod declare;
pub mod plan;
pub mod registry;

use starknet::core::types::FieldElement;
use tracing::debug;

use crate::artifacts::ArtifactResolver;
use crate::context::RuntimeContext;
use crate::manifest::Manifest;
use crate::types::{ContractName, DeployResult};

pub use batch::{CallBatcher, CallOutcome, PendingCall};
pub use calldata::CallArg;
pub use declare::{ClassState, DeclarationTracker};
pub use plan::{DeploymentPlanner, DeploymentRequest, PlanOutcome};
pub use registry::RunRegistry;

/// Per-run deployment state and the operations driving it.
pub struct DeploymentEngine {
    resolver: ArtifactResolver,
    tracker: DeclarationTracker,
    registry: RunRegistry,
    batcher: CallBatcher,
    planner: DeploymentPlanner,
}

impl DeploymentEngine {
    pub fn new(ctx: &RuntimeContext) -> Self {
        let config = ctx.config();
        Self {
            resolver: ArtifactResolver::new(
                config.artifacts_dir.clone(),
                config.scarb_package.clone(),
            ),
            tracker: DeclarationTracker::new(),
            registry: RunRegistry::new(),
            batcher: CallBatcher::new(),
            planner: DeploymentPlanner::new(ctx.deployer_address()),
        }
    }

    /// Seed the registry and tracker from a previously persisted manifest,
    /// so references to past deployments resolve and their classes are not
    /// re-declared.
    pub fn seed_from_manifest(&mut self, manifest: &Manifest) {
        for (name, record) in manifest.iter() {
            debug!(
                "Seeding {} from manifest (address {:#x}, class hash {:#x})",
                name, record.address, record.class_hash
            );
            self.registry.record_address(name.clone(), record.address);
            self.registry
                .record_class_hash(name.clone(), record.class_hash);
            self.tracker.seed_declared(name.clone(), record.class_hash);
        }
    }

    /// Ensure `name`'s class is declared (class only, no instance),
    /// returning its locally computed hash.
    pub fn declare_class(&mut self, name: &ContractName) -> DeployResult<FieldElement> {
        let artifact = self.resolver.resolve(name)?;
        let class_hash = self.tracker.declare(&artifact, &mut self.batcher);
        self.registry.record_class_hash(name.clone(), class_hash);
        Ok(class_hash)
    }

    /// Plan a deployment, enqueueing its declare (if needed) and deploy.
    pub fn plan_deploy(&mut self, request: DeploymentRequest) -> DeployResult<PlanOutcome> {
        self.planner.plan(
            request,
            &mut self.resolver,
            &mut self.tracker,
            &mut self.registry,
            &mut self.batcher,
        )
    }

    /// Queue an invoke against a deployed contract, referenced by name.
    pub fn enqueue_invoke(
        &mut self,
        description: impl Into<String>,
        target: ContractName,
        selector: FieldElement,
        args: Vec<CallArg>,
    ) {
        self.batcher.enqueue(PendingCall::Invoke {
            description: description.into(),
            target,
            selector,
            args,
            max_fee: None,
        });
    }

    /// Flush everything queued, propagating declare confirmations into the
    /// tracker so repeated flushes in one run stay idempotent.
    pub async fn flush(&mut self, ctx: &RuntimeContext) -> DeployResult<Vec<CallOutcome>> {
        let outcomes = self.batcher.flush(ctx, &self.registry).await?;
        for outcome in &outcomes {
            if let CallOutcome::Declared { name, .. } = outcome {
                self.tracker.mark_declared(name);
            }
        }
        Ok(outcomes)
    }

    /// ABI of a contract whose artifact was resolved during this run.
    pub fn cached_abi(&self, name: &ContractName) -> Option<serde_json::Value> {
        self.resolver.cached(name).map(|artifact| artifact.abi.clone())
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn pending_calls(&self) -> usize {
        self.batcher.len()
    }
}

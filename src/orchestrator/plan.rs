//! Deployment planning.
//!
//! A plan step resolves the artifact, ensures the class is declared,
//! resolves reference arguments against the run registry, and computes the
//! deterministic deployed address before anything is submitted. Knowing
//! addresses up front is what lets later requests reference earlier ones in
//! the same batch, and what lets a re-run recognize an identical deployment
//! and skip it.

use starknet::core::types::FieldElement;
use starknet::core::utils::{get_udc_deployed_address, UdcUniqueness};
use tracing::{debug, info};

use crate::artifacts::ArtifactResolver;
use crate::orchestrator::batch::{CallBatcher, PendingCall};
use crate::orchestrator::calldata::{resolve_args, CallArg};
use crate::orchestrator::declare::DeclarationTracker;
use crate::orchestrator::registry::RunRegistry;
use crate::types::{ContractName, DeployResult};

/// One "deploy this contract with these arguments" request.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub name: ContractName,
    pub constructor_args: Vec<CallArg>,
    /// Address salt; defaults to the deployer account address, so each
    /// deployer gets its own address space for the same class and inputs
    pub salt: Option<FieldElement>,
    /// Fee ceiling for this deployment
    pub max_fee: Option<FieldElement>,
    /// Explicit class hash, bypassing artifact resolution and declaration
    pub class_hash: Option<FieldElement>,
}

impl DeploymentRequest {
    pub fn new(name: impl Into<ContractName>, constructor_args: Vec<CallArg>) -> Self {
        Self {
            name: name.into(),
            constructor_args,
            salt: None,
            max_fee: None,
            class_hash: None,
        }
    }

    /// Names of the contracts this request's arguments reference.
    pub fn dependencies(&self) -> Vec<&ContractName> {
        let mut deps: Vec<&ContractName> = self
            .constructor_args
            .iter()
            .filter_map(|arg| arg.referenced_contract())
            .collect();
        deps.dedup();
        deps
    }
}

/// Result of planning one deployment.
#[derive(Debug, Clone, Copy)]
pub enum PlanOutcome {
    /// Deploy call enqueued; the contract will live at `address`
    Planned {
        address: FieldElement,
        class_hash: FieldElement,
    },
    /// The manifest already records this exact deployment; nothing enqueued
    AlreadyDeployed {
        address: FieldElement,
        class_hash: FieldElement,
    },
}

impl PlanOutcome {
    pub fn address(&self) -> FieldElement {
        match self {
            PlanOutcome::Planned { address, .. } | PlanOutcome::AlreadyDeployed { address, .. } => {
                *address
            }
        }
    }
}

/// Turns deployment requests into pending deploy calls.
pub struct DeploymentPlanner {
    deployer_address: FieldElement,
}

impl DeploymentPlanner {
    pub fn new(deployer_address: FieldElement) -> Self {
        Self { deployer_address }
    }

    /// Plan `request`, enqueueing the declare (if needed) and deploy calls.
    ///
    /// The computed address and class hash are registered immediately, so
    /// subsequent requests resolve references to this contract from the
    /// registry without waiting for the flush.
    pub fn plan(
        &self,
        request: DeploymentRequest,
        resolver: &mut ArtifactResolver,
        tracker: &mut DeclarationTracker,
        registry: &mut RunRegistry,
        batcher: &mut CallBatcher,
    ) -> DeployResult<PlanOutcome> {
        let class_hash = match request.class_hash {
            Some(hash) => hash,
            None => {
                let artifact = resolver.resolve(&request.name)?;
                tracker.declare(&artifact, batcher)
            }
        };

        let calldata = resolve_args(&request.constructor_args, registry)?;
        let salt = request.salt.unwrap_or(self.deployer_address);
        let address =
            get_udc_deployed_address(salt, class_hash, &UdcUniqueness::NotUnique, &calldata);

        if registry.address_of(&request.name) == Some(address)
            && registry.class_hash_of(&request.name) == Some(class_hash)
        {
            info!(
                "{} already deployed at {:#x} with identical inputs, skipping",
                request.name, address
            );
            return Ok(PlanOutcome::AlreadyDeployed {
                address,
                class_hash,
            });
        }

        debug!(
            "Planned {} at {:#x} (class hash {:#x})",
            request.name, address, class_hash
        );
        registry.record_address(request.name.clone(), address);
        registry.record_class_hash(request.name.clone(), class_hash);

        batcher.enqueue(PendingCall::Deploy {
            name: request.name,
            class_hash,
            salt,
            address,
            constructor_args: calldata.into_iter().map(CallArg::Felt).collect(),
            max_fee: request.max_fee,
        });

        Ok(PlanOutcome::Planned {
            address,
            class_hash,
        })
    }
}

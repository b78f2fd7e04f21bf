//! # Call Batcher
//!
//! Accumulates declare/deploy/invoke calls and flushes them in one go.
//! Declares go out as individual transactions (the protocol has no declare
//! inside a multicall); every deploy and invoke is bundled into a single
//! atomic multicall through the UDC, so either the whole batch lands or
//! none of it does.
//!
//! All symbolic arguments are resolved before the first network round trip:
//! a bad reference fails the flush with nothing submitted. The queue is
//! drained at flush regardless of outcome; nothing is retried.

use starknet::accounts::Call;
use starknet::core::types::FieldElement;
use tracing::{debug, info};

use crate::artifacts::ContractArtifact;
use crate::context::RuntimeContext;
use crate::orchestrator::calldata::{resolve_args, CallArg};
use crate::orchestrator::registry::RunRegistry;
use crate::types::{selectors, ContractName, DeployError, DeployResult, UDC_ADDRESS};
use std::sync::Arc;

/// A declare, deploy or invoke call waiting for the next flush.
#[derive(Debug)]
pub enum PendingCall {
    Declare {
        name: ContractName,
        artifact: Arc<ContractArtifact>,
    },
    Deploy {
        name: ContractName,
        class_hash: FieldElement,
        salt: FieldElement,
        /// Deterministic address the contract will live at
        address: FieldElement,
        constructor_args: Vec<CallArg>,
        max_fee: Option<FieldElement>,
    },
    Invoke {
        /// Human-readable label for logs and outcomes
        description: String,
        /// Target contract, resolved against the registry at flush
        target: ContractName,
        selector: FieldElement,
        args: Vec<CallArg>,
        max_fee: Option<FieldElement>,
    },
}

/// Per-call flush result, in enqueue order.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// Class declared (or confirmed already declared, `tx_hash: None`)
    Declared {
        name: ContractName,
        class_hash: FieldElement,
        tx_hash: Option<FieldElement>,
    },
    Deployed {
        name: ContractName,
        address: FieldElement,
        class_hash: FieldElement,
        tx_hash: FieldElement,
    },
    Invoked {
        description: String,
        tx_hash: FieldElement,
    },
}

/// One fully-resolved call bound for the deploy/invoke multicall.
struct MulticallEntry {
    index: usize,
    call: Call,
    max_fee: Option<FieldElement>,
    outcome: CallOutcome,
}

/// Queue of pending calls for one deployment run.
#[derive(Debug, Default)]
pub struct CallBatcher {
    calls: Vec<PendingCall>,
}

impl CallBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, call: PendingCall) {
        self.calls.push(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Submit everything queued and wait for inclusion.
    ///
    /// Resolution happens first for every call; an unresolved reference
    /// aborts the flush before any network traffic. Declares are then
    /// submitted one transaction each, followed by a single multicall
    /// carrying all deploys and invokes. Outcomes come back in enqueue
    /// order. The queue is emptied regardless of outcome.
    pub async fn flush(
        &mut self,
        ctx: &RuntimeContext,
        registry: &RunRegistry,
    ) -> DeployResult<Vec<CallOutcome>> {
        let pending = std::mem::take(&mut self.calls);
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut declares: Vec<(usize, ContractName, Arc<ContractArtifact>)> = Vec::new();
        let mut multicall: Vec<MulticallEntry> = Vec::new();

        // Resolve everything up front; nothing hits the network until the
        // whole batch is known to be well-formed.
        for (index, call) in pending.into_iter().enumerate() {
            match call {
                PendingCall::Declare { name, artifact } => {
                    declares.push((index, name, artifact));
                }
                PendingCall::Deploy {
                    name,
                    class_hash,
                    salt,
                    address,
                    constructor_args,
                    max_fee,
                } => {
                    let calldata = resolve_args(&constructor_args, registry)?;
                    let mut udc_calldata = vec![
                        class_hash,
                        salt,
                        FieldElement::ZERO, // origin-independent deployment
                        FieldElement::from(calldata.len() as u64),
                    ];
                    udc_calldata.extend(calldata);
                    multicall.push(MulticallEntry {
                        index,
                        call: Call {
                            to: *UDC_ADDRESS,
                            selector: *selectors::DEPLOY_CONTRACT,
                            calldata: udc_calldata,
                        },
                        max_fee,
                        outcome: CallOutcome::Deployed {
                            name,
                            address,
                            class_hash,
                            tx_hash: FieldElement::ZERO,
                        },
                    });
                }
                PendingCall::Invoke {
                    description,
                    target,
                    selector,
                    args,
                    max_fee,
                } => {
                    let to = registry
                        .address_of(&target)
                        .ok_or_else(|| DeployError::UnresolvedReference(target.clone()))?;
                    let calldata = resolve_args(&args, registry)?;
                    multicall.push(MulticallEntry {
                        index,
                        call: Call {
                            to,
                            selector,
                            calldata,
                        },
                        max_fee,
                        outcome: CallOutcome::Invoked {
                            description,
                            tx_hash: FieldElement::ZERO,
                        },
                    });
                }
            }
        }

        let mut outcomes: Vec<Option<CallOutcome>> =
            (0..declares.len() + multicall.len()).map(|_| None).collect();
        let mut nonce = ctx.nonce().await?;

        for (index, name, artifact) in declares {
            let tx_hash = self.submit_declare(ctx, &name, &artifact, &mut nonce).await?;
            outcomes[index] = Some(CallOutcome::Declared {
                name,
                class_hash: artifact.class_hash,
                tx_hash,
            });
        }

        if !multicall.is_empty() {
            let calls: Vec<Call> = multicall.iter().map(|entry| entry.call.clone()).collect();
            let ceilings: Vec<Option<FieldElement>> =
                multicall.iter().map(|entry| entry.max_fee).collect();

            let estimate = ctx.estimate_invoke_fee(&calls).await?;
            let max_fee = transaction_max_fee(
                estimate,
                ctx.config().fee_multiplier_percent,
                &ceilings,
            )?;
            info!(
                "Submitting multicall of {} calls (estimated fee {:#x}, max fee {:#x})",
                calls.len(),
                estimate,
                max_fee
            );

            let tx_hash = ctx.submit_invoke(calls, nonce, max_fee).await?;
            ctx.wait_for_inclusion(tx_hash).await?;

            for entry in multicall {
                let outcome = match entry.outcome {
                    CallOutcome::Deployed {
                        name,
                        address,
                        class_hash,
                        ..
                    } => CallOutcome::Deployed {
                        name,
                        address,
                        class_hash,
                        tx_hash,
                    },
                    CallOutcome::Invoked { description, .. } => CallOutcome::Invoked {
                        description,
                        tx_hash,
                    },
                    declared @ CallOutcome::Declared { .. } => declared,
                };
                outcomes[entry.index] = Some(outcome);
            }
        }

        Ok(outcomes.into_iter().flatten().collect())
    }

    /// Declare one class as its own transaction, tolerating
    /// `ClassAlreadyDeclared` from the node.
    async fn submit_declare(
        &self,
        ctx: &RuntimeContext,
        name: &ContractName,
        artifact: &Arc<ContractArtifact>,
        nonce: &mut FieldElement,
    ) -> DeployResult<Option<FieldElement>> {
        let declaration_failed = |e: DeployError| DeployError::DeclarationFailed {
            name: name.clone(),
            reason: e.to_string(),
        };

        let estimate = match ctx
            .estimate_declare_fee(artifact)
            .await
            .map_err(declaration_failed)?
        {
            Some(estimate) => estimate,
            None => {
                debug!("Class {} already declared, skipping transaction", name);
                return Ok(None);
            }
        };

        let max_fee = transaction_max_fee(estimate, ctx.config().fee_multiplier_percent, &[])
            .map_err(declaration_failed)?;
        info!(
            "Declaring {} (class hash {:#x}, max fee {:#x})",
            name, artifact.class_hash, max_fee
        );

        match ctx
            .submit_declare(artifact, *nonce, max_fee)
            .await
            .map_err(declaration_failed)?
        {
            Some(tx_hash) => {
                *nonce = *nonce + FieldElement::ONE;
                ctx.wait_for_inclusion(tx_hash)
                    .await
                    .map_err(declaration_failed)?;
                Ok(Some(tx_hash))
            }
            None => Ok(None),
        }
    }
}

/// Fee ceiling for one transaction: estimate × multiplier / 100, capped by
/// the sum of per-call ceilings when every call in the transaction has one.
///
/// A lone ceiling cannot bound a transaction containing uncapped peers, so
/// partial ceilings are ignored.
fn transaction_max_fee(
    estimate: FieldElement,
    multiplier_percent: u64,
    ceilings: &[Option<FieldElement>],
) -> DeployResult<FieldElement> {
    let estimate = felt_to_u128(estimate)?;
    let mut max_fee = estimate.saturating_mul(multiplier_percent as u128) / 100;

    if !ceilings.is_empty() && ceilings.iter().all(Option::is_some) {
        let mut cap: u128 = 0;
        for ceiling in ceilings.iter().flatten() {
            cap = cap.saturating_add(felt_to_u128(*ceiling)?);
        }
        if cap < max_fee {
            max_fee = cap;
        }
    }

    // A u128 is always below the field modulus
    Ok(FieldElement::from_byte_slice_be(&max_fee.to_be_bytes()).expect("u128 fits a felt"))
}

/// Fee estimates are amounts, not field arithmetic: extract the integer
/// value from the felt's big-endian bytes.
fn felt_to_u128(value: FieldElement) -> DeployResult<u128> {
    let bytes = value.to_bytes_be();
    if bytes[..16].iter().any(|b| *b != 0) {
        return Err(DeployError::EstimationFailed(format!(
            "fee value {:#x} exceeds u128",
            value
        )));
    }
    Ok(bytes[16..]
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployerConfig, DeployerCredentials};

    fn create_offline_context() -> RuntimeContext {
        // Never connected; flush must fail before reaching the network
        let config = DeployerConfig::default();
        let credentials = DeployerCredentials {
            account_address: FieldElement::from(0xabcu64),
            private_key: FieldElement::from(0x123u64),
        };
        RuntimeContext::new(config, credentials).unwrap()
    }

    #[test]
    fn test_enqueue_and_len() {
        let mut batcher = CallBatcher::new();
        assert!(batcher.is_empty());
        batcher.enqueue(PendingCall::Invoke {
            description: "test".to_string(),
            target: ContractName::from("Gem"),
            selector: FieldElement::ONE,
            args: vec![],
            max_fee: None,
        });
        assert_eq!(batcher.len(), 1);
    }

    #[tokio::test]
    async fn test_flush_empty_queue() {
        let ctx = create_offline_context();
        let registry = RunRegistry::new();
        let mut batcher = CallBatcher::new();

        let outcomes = batcher.flush(&ctx, &registry).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_reference_fails_before_submission() {
        let ctx = create_offline_context();
        let mut registry = RunRegistry::new();
        registry.record_address(ContractName::from("Gem"), FieldElement::from(7u64));

        let mut batcher = CallBatcher::new();
        batcher.enqueue(PendingCall::Invoke {
            description: "wire Gem to QuestFactory".to_string(),
            target: ContractName::from("Gem"),
            selector: FieldElement::ONE,
            args: vec![CallArg::address_of("QuestFactory")],
            max_fee: None,
        });

        // The offline context has no reachable node; reaching it would hang
        // or error differently, so an UnresolvedReference here proves the
        // batch was rejected before any network traffic
        let err = batcher.flush(&ctx, &registry).await.unwrap_err();
        assert!(
            matches!(err, DeployError::UnresolvedReference(name) if name.as_str() == "QuestFactory")
        );
        // Queue is drained regardless of outcome
        assert!(batcher.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_invoke_target_fails_flush() {
        let ctx = create_offline_context();
        let registry = RunRegistry::new();

        let mut batcher = CallBatcher::new();
        batcher.enqueue(PendingCall::Invoke {
            description: "approve minter".to_string(),
            target: ContractName::from("Loomi"),
            selector: FieldElement::ONE,
            args: vec![],
            max_fee: None,
        });

        let err = batcher.flush(&ctx, &registry).await.unwrap_err();
        assert!(matches!(err, DeployError::UnresolvedReference(name) if name.as_str() == "Loomi"));
    }

    #[test]
    fn test_felt_to_u128() {
        assert_eq!(felt_to_u128(FieldElement::ZERO).unwrap(), 0);
        assert_eq!(felt_to_u128(FieldElement::from(1234u64)).unwrap(), 1234);
        let max = FieldElement::from_byte_slice_be(&u128::MAX.to_be_bytes()).unwrap();
        assert_eq!(felt_to_u128(max).unwrap(), u128::MAX);
        assert!(felt_to_u128(FieldElement::MAX).is_err());
    }

    #[test]
    fn test_fee_multiplier_doubles_by_default() {
        let max_fee = transaction_max_fee(FieldElement::from(1000u64), 200, &[]).unwrap();
        assert_eq!(max_fee, FieldElement::from(2000u64));
    }

    #[test]
    fn test_complete_ceilings_cap_the_fee() {
        let ceilings = vec![
            Some(FieldElement::from(300u64)),
            Some(FieldElement::from(400u64)),
        ];
        let max_fee = transaction_max_fee(FieldElement::from(1000u64), 200, &ceilings).unwrap();
        assert_eq!(max_fee, FieldElement::from(700u64));
    }

    #[test]
    fn test_partial_ceilings_are_ignored() {
        let ceilings = vec![Some(FieldElement::from(1u64)), None];
        let max_fee = transaction_max_fee(FieldElement::from(1000u64), 200, &ceilings).unwrap();
        assert_eq!(max_fee, FieldElement::from(2000u64));
    }

    #[test]
    fn test_ceiling_above_estimate_keeps_buffer() {
        let ceilings = vec![Some(FieldElement::from(1_000_000u64))];
        let max_fee = transaction_max_fee(FieldElement::from(1000u64), 200, &ceilings).unwrap();
        assert_eq!(max_fee, FieldElement::from(2000u64));
    }
}

//! # Runtime Context
//!
//! Explicitly constructed bundle of JSON-RPC provider, signing account and
//! run configuration, threaded through every component call. The
//! orchestration core talks to the chain only through the narrow interface
//! here: fee estimation, submission, inclusion waiting, nonce lookup.

use std::sync::Arc;

use starknet::{
    accounts::{Account, AccountError, Call, ExecutionEncoding, SingleOwnerAccount},
    core::types::{
        BlockId, BlockTag, ExecutionResult, FieldElement, MaybePendingTransactionReceipt,
        StarknetError, TransactionReceipt,
    },
    providers::{jsonrpc::HttpTransport, JsonRpcClient, Provider, ProviderError},
    signers::{LocalWallet, SigningKey},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::artifacts::ContractArtifact;
use crate::config::{DeployerConfig, DeployerCredentials};
use crate::types::{DeployError, DeployResult, Network};

type DeployerAccount = SingleOwnerAccount<Arc<JsonRpcClient<HttpTransport>>, LocalWallet>;

/// Provider, account and configuration for one deployment run.
pub struct RuntimeContext {
    config: DeployerConfig,
    provider: Arc<JsonRpcClient<HttpTransport>>,
    account: DeployerAccount,
}

/// Hand-written so the account's signing key stays out of logs.
impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("network", &self.config.network)
            .field("rpc_url", &self.config.rpc_url)
            .field("deployer", &format_args!("{:#x}", self.account.address()))
            .finish()
    }
}

impl RuntimeContext {
    /// Build the context from validated configuration and credentials.
    ///
    /// No network traffic happens here; call [`connect`](Self::connect) to
    /// verify the endpoint before submitting anything.
    pub fn new(config: DeployerConfig, credentials: DeployerCredentials) -> DeployResult<Self> {
        let url = Url::parse(&config.rpc_url).map_err(|e| {
            DeployError::Configuration(format!("invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;

        let provider = Arc::new(JsonRpcClient::new(HttpTransport::new(url)));
        let signer = LocalWallet::from(SigningKey::from_secret_scalar(credentials.private_key));

        let mut account = SingleOwnerAccount::new(
            provider.clone(),
            signer,
            credentials.account_address,
            config.network.chain_id(),
            ExecutionEncoding::New,
        );
        // Estimate against the pending block so nonces and state reflect
        // transactions this run already submitted
        account.set_block_id(BlockId::Tag(BlockTag::Pending));

        Ok(Self {
            config,
            provider,
            account,
        })
    }

    /// Verify the node is reachable and on the expected chain.
    pub async fn connect(&self) -> DeployResult<()> {
        info!("Connecting to {} at {}", self.config.network, self.config.rpc_url);

        let chain_id = self
            .provider
            .chain_id()
            .await
            .map_err(|e| DeployError::Configuration(format!("failed to reach node: {}", e)))?;

        let expected = self.config.network.chain_id();
        if chain_id != expected {
            return Err(DeployError::Configuration(format!(
                "chain ID mismatch: node reports {:#x}, expected {:#x} for {}",
                chain_id, expected, self.config.network
            )));
        }

        info!("Connected, chain ID {:#x}", chain_id);
        Ok(())
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    /// Address of the deploying account, also the default address salt.
    pub fn deployer_address(&self) -> FieldElement {
        self.account.address()
    }

    /// Account nonce at the pending block.
    pub async fn nonce(&self) -> DeployResult<FieldElement> {
        self.provider
            .get_nonce(BlockId::Tag(BlockTag::Pending), self.account.address())
            .await
            .map_err(|e| {
                DeployError::SubmissionRejected(format!("failed to fetch account nonce: {}", e))
            })
    }

    /// Estimate the overall fee for a multicall.
    pub async fn estimate_invoke_fee(&self, calls: &[Call]) -> DeployResult<FieldElement> {
        let estimate = self
            .account
            .execute(calls.to_vec())
            .estimate_fee()
            .await
            .map_err(|e| DeployError::EstimationFailed(e.to_string()))?;

        debug!("Estimated invoke fee: {:#x}", estimate.overall_fee);
        Ok(estimate.overall_fee)
    }

    /// Submit a multicall with an explicit nonce and fee ceiling.
    pub async fn submit_invoke(
        &self,
        calls: Vec<Call>,
        nonce: FieldElement,
        max_fee: FieldElement,
    ) -> DeployResult<FieldElement> {
        let result = self
            .account
            .execute(calls)
            .nonce(nonce)
            .max_fee(max_fee)
            .send()
            .await
            .map_err(|e| DeployError::SubmissionRejected(e.to_string()))?;

        info!("Transaction sent: {:#x}", result.transaction_hash);
        Ok(result.transaction_hash)
    }

    /// Estimate the fee for declaring `artifact`'s class.
    ///
    /// Returns `None` when the node reports the class as already declared;
    /// the caller treats that as success with the locally computed hash.
    pub async fn estimate_declare_fee(
        &self,
        artifact: &ContractArtifact,
    ) -> DeployResult<Option<FieldElement>> {
        let declaration = self
            .account
            .declare(artifact.flattened.clone(), artifact.compiled_class_hash);

        match declaration.estimate_fee().await {
            Ok(estimate) => {
                debug!("Estimated declare fee: {:#x}", estimate.overall_fee);
                Ok(Some(estimate.overall_fee))
            }
            Err(e) if class_already_declared(&e) => Ok(None),
            Err(e) => Err(DeployError::EstimationFailed(e.to_string())),
        }
    }

    /// Submit a declare transaction with an explicit nonce and fee ceiling.
    ///
    /// Returns `None` when the node reports `ClassAlreadyDeclared`.
    pub async fn submit_declare(
        &self,
        artifact: &ContractArtifact,
        nonce: FieldElement,
        max_fee: FieldElement,
    ) -> DeployResult<Option<FieldElement>> {
        let result = self
            .account
            .declare(artifact.flattened.clone(), artifact.compiled_class_hash)
            .nonce(nonce)
            .max_fee(max_fee)
            .send()
            .await;

        match result {
            Ok(result) => {
                info!(
                    "Declare transaction sent: {:#x} (class hash {:#x})",
                    result.transaction_hash, result.class_hash
                );
                Ok(Some(result.transaction_hash))
            }
            Err(e) if class_already_declared(&e) => {
                info!("Class {:#x} already declared on-chain", artifact.class_hash);
                Ok(None)
            }
            Err(e) => Err(DeployError::SubmissionRejected(e.to_string())),
        }
    }

    /// Block until `tx_hash` is included in a block, polling the receipt.
    ///
    /// Fails with `ExecutionReverted` if the included transaction reverted
    /// and `InclusionTimeout` past the configured bound. Timeouts are never
    /// retried here: blind resubmission of a state-changing transaction
    /// risks duplicate side effects.
    pub async fn wait_for_inclusion(&self, tx_hash: FieldElement) -> DeployResult<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_secs(self.config.inclusion_timeout_secs);
        let poll_interval = std::time::Duration::from_secs(self.config.poll_interval_secs);

        debug!("Waiting for transaction {:#x} to be included", tx_hash);

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(MaybePendingTransactionReceipt::Receipt(receipt)) => {
                    return match execution_result(&receipt) {
                        ExecutionResult::Succeeded => {
                            info!("Transaction {:#x} included", tx_hash);
                            Ok(())
                        }
                        ExecutionResult::Reverted { reason } => Err(DeployError::ExecutionReverted {
                            tx_hash,
                            reason: reason.clone(),
                        }),
                    };
                }
                Ok(MaybePendingTransactionReceipt::PendingReceipt(_)) => {
                    debug!("Transaction {:#x} still pending", tx_hash);
                }
                Err(ProviderError::StarknetError(StarknetError::TransactionHashNotFound)) => {
                    debug!("Transaction {:#x} not yet known to the node", tx_hash);
                }
                Err(e) => {
                    warn!("Failed to fetch receipt for {:#x}: {}", tx_hash, e);
                }
            }

            if start.elapsed() > timeout {
                return Err(DeployError::InclusionTimeout {
                    tx_hash,
                    timeout_secs: self.config.inclusion_timeout_secs,
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn class_already_declared<E>(err: &AccountError<E>) -> bool {
    matches!(
        err,
        AccountError::Provider(ProviderError::StarknetError(
            StarknetError::ClassAlreadyDeclared
        ))
    )
}

fn execution_result(receipt: &TransactionReceipt) -> &ExecutionResult {
    match receipt {
        TransactionReceipt::Invoke(r) => &r.execution_result,
        TransactionReceipt::Declare(r) => &r.execution_result,
        TransactionReceipt::Deploy(r) => &r.execution_result,
        TransactionReceipt::DeployAccount(r) => &r.execution_result,
        TransactionReceipt::L1Handler(r) => &r.execution_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Network;

    fn create_test_context() -> RuntimeContext {
        let config = DeployerConfig::default();
        let credentials = DeployerCredentials {
            account_address: FieldElement::from(0xabcu64),
            private_key: FieldElement::from(0x123u64),
        };
        RuntimeContext::new(config, credentials).unwrap()
    }

    #[test]
    fn test_context_construction_is_offline() {
        let ctx = create_test_context();
        assert_eq!(ctx.network(), Network::Devnet);
        assert_eq!(ctx.deployer_address(), FieldElement::from(0xabcu64));
    }

    #[test]
    fn test_invalid_rpc_url_rejected() {
        let config = DeployerConfig {
            rpc_url: "not a url".to_string(),
            ..DeployerConfig::default()
        };
        let credentials = DeployerCredentials {
            account_address: FieldElement::ONE,
            private_key: FieldElement::TWO,
        };
        let err = RuntimeContext::new(config, credentials).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }
}

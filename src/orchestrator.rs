//! Relay orchestration.
//!
//! A relay request walks through the stages
//!
//! ```text
//! Start -> ProxyCheck -> AccountInitCheck -> PlanBuilt -> Broadcasting -> Confirmed
//! ```
//!
//! and ends in `Failed` on the first error. Every stage but `Broadcasting` is read-only, so a
//! request failing before submission leaves no trace on chain and can be retried as is.

use crate::{
    broadcast::Broadcaster,
    chains::{ChainConnector, ChainRegistry},
    config::{ChainConfig, DelegationPolicy, RelayPolicy},
    constants::INITIALIZER_SLOT,
    error::{AuthError, RelayError},
    inspector::{StateInspector, delegation_target},
    metrics::RelayMetrics,
    proxy::ProxyDeployment,
    types::{AccountState, RelayPlan, RelayRequest, RelayResponse, multisend},
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, Bytes, ChainId, TxHash, U256},
    rpc::types::TransactionRequest,
};
use std::{fmt, time::Instant};
use tracing::{Span, debug, info, instrument, warn};

/// Progress of a relay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayStage {
    /// Request validation and chain lookup.
    Start,
    /// Derivation of the proxy address and deployment check.
    ProxyCheck,
    /// Account initialization check.
    AccountInitCheck,
    /// The transaction is built.
    PlanBuilt,
    /// The transaction is being signed and submitted.
    Broadcasting,
    /// The transaction was accepted by the node.
    Confirmed,
    /// The request failed.
    Failed,
}

impl RelayStage {
    /// The stage name used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ProxyCheck => "proxy_check",
            Self::AccountInitCheck => "account_init_check",
            Self::PlanBuilt => "plan_built",
            Self::Broadcasting => "broadcasting",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relay transaction ready to be broadcast.
#[derive(Debug, Clone)]
pub struct PreparedRelay {
    /// The target chain.
    pub chain_id: ChainId,
    /// The planned calls.
    pub plan: RelayPlan,
    /// The transaction to submit.
    ///
    /// `None` if the delegation policy dropped the authorization list and no call is planned.
    pub transaction: Option<TransactionRequest>,
}

/// The result of a relay.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    /// The target chain.
    pub chain_id: ChainId,
    /// Hash of the submitted transaction, `None` if nothing was submitted.
    pub tx_hash: Option<TxHash>,
    /// The executed plan.
    pub plan: RelayPlan,
}

impl From<RelayOutcome> for RelayResponse {
    fn from(outcome: RelayOutcome) -> Self {
        Self { tx_hash: outcome.tx_hash }
    }
}

/// Plans and submits relay requests.
#[derive(Debug)]
pub struct Orchestrator<C> {
    registry: ChainRegistry,
    connector: C,
    policy: RelayPolicy,
    metrics: RelayMetrics,
}

impl<C: ChainConnector> Orchestrator<C> {
    /// Creates an orchestrator for the chains in `registry`.
    pub fn new(registry: ChainRegistry, connector: C, policy: RelayPolicy) -> Self {
        Self { registry, connector, policy, metrics: RelayMetrics::default() }
    }

    /// The chain registry.
    pub const fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// The request policy.
    pub const fn policy(&self) -> &RelayPolicy {
        &self.policy
    }

    /// Plans `request` and submits the resulting transaction.
    ///
    /// Returns right after the node accepted the transaction.
    #[instrument(skip_all, fields(from = %request.from, chain_id))]
    pub async fn relay(&self, request: RelayRequest) -> Result<RelayOutcome, RelayError> {
        let started = Instant::now();
        let mut stage = RelayStage::Start;

        match self.try_relay(&request, &mut stage).await {
            Ok(outcome) => {
                match outcome.tx_hash {
                    Some(tx_hash) => {
                        info!(
                            %tx_hash,
                            plan = %outcome.plan.summary(),
                            stage = %RelayStage::Confirmed,
                            "Relayed delegation"
                        );
                        self.metrics.record_submitted(outcome.plan.len(), started.elapsed());
                    }
                    None => {
                        info!("Account already delegated, nothing to relay");
                        self.metrics.record_skipped();
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(%err, stage = %RelayStage::Failed, failed_at = %stage, "Relay failed");
                self.metrics.record_failed(stage, err.is_retryable());
                Err(err)
            }
        }
    }

    /// Plans `request` without submitting anything.
    #[instrument(skip_all, fields(from = %request.from, chain_id))]
    pub async fn prepare(&self, request: &RelayRequest) -> Result<PreparedRelay, RelayError> {
        self.try_prepare(request, &mut RelayStage::Start).await
    }

    async fn try_relay(
        &self,
        request: &RelayRequest,
        stage: &mut RelayStage,
    ) -> Result<RelayOutcome, RelayError> {
        let PreparedRelay { chain_id, plan, transaction } =
            self.try_prepare(request, stage).await?;

        let Some(transaction) = transaction else {
            return Ok(RelayOutcome { chain_id, tx_hash: None, plan });
        };

        *stage = RelayStage::Broadcasting;
        let chain = self.registry.get(chain_id)?;
        let broadcaster = self.connector.broadcaster(chain_id, chain)?;
        debug!(relayer = %broadcaster.address(), "Broadcasting relay transaction");
        let tx_hash = broadcaster.send_transaction(transaction).await?;

        Ok(RelayOutcome { chain_id, tx_hash: Some(tx_hash), plan })
    }

    async fn try_prepare(
        &self,
        request: &RelayRequest,
        stage: &mut RelayStage,
    ) -> Result<PreparedRelay, RelayError> {
        *stage = RelayStage::Start;
        let chain_id = request.chain_id()?;
        Span::current().record("chain_id", chain_id);

        let chain = self.registry.get(chain_id)?;
        check_authorization_chains(chain_id, request)?;
        if request.authorization_list.is_empty() {
            warn!("Relaying without authorizations");
        }

        let inspector = self.connector.inspector(chain_id, chain)?;
        let mut authorization_list = request.signed_authorizations();
        let skipped = self.apply_authorization_policy(&inspector, request).await?;
        if skipped {
            authorization_list.clear();
        }

        *stage = RelayStage::ProxyCheck;
        let deployment = match &request.init_data {
            Some(init_data) => {
                Some(self.proxy_deployment(&inspector, chain, init_data, request.salt_nonce).await?)
            }
            None => None,
        };

        let mut state = AccountState::COMPLETE;
        if let Some(deployment) = &deployment {
            let proxy = deployment.address();
            if self.policy.verify_delegate
                && let Some(delegate) = request.delegate()
                && delegate != proxy
            {
                return Err(AuthError::DelegateMismatch { expected: proxy, got: delegate }.into());
            }

            state.proxy_deployed = inspector.has_code(proxy).await?;
            debug!(%proxy, deployed = state.proxy_deployed, "Checked proxy");

            *stage = RelayStage::AccountInitCheck;
            state.account_initialized =
                !inspector.storage_at(request.from, INITIALIZER_SLOT).await?.is_zero();
            debug!(initialized = state.account_initialized, "Checked account");
        }

        *stage = RelayStage::PlanBuilt;
        let plan = RelayPlan::from_state(request.from, deployment.as_ref(), state);
        let transaction = if skipped && plan.is_empty() {
            None
        } else {
            Some(build_transaction(chain, &plan, authorization_list)?)
        };
        debug!(plan = %plan.summary(), "Built relay plan");

        Ok(PreparedRelay { chain_id, plan, transaction })
    }

    /// Applies the nonce and delegation policies to the first authorization.
    ///
    /// Returns whether the authorization list is to be dropped.
    async fn apply_authorization_policy<I: StateInspector>(
        &self,
        inspector: &I,
        request: &RelayRequest,
    ) -> Result<bool, RelayError> {
        let Some(auth) = request.authorization_list.first() else { return Ok(false) };

        if self.policy.verify_authorization_nonce {
            let expected = inspector.transaction_count(request.from).await?;
            if auth.nonce != expected {
                return Err(AuthError::InvalidNonce { expected, got: auth.nonce }.into());
            }
        }

        if self.policy.delegation == DelegationPolicy::Resubmit {
            return Ok(false);
        }

        let code = inspector.code_at(request.from).await?;
        if delegation_target(&code) != Some(auth.contract_address) {
            return Ok(false);
        }

        match self.policy.delegation {
            DelegationPolicy::Reject => Err(AuthError::AlreadyDelegated {
                account: request.from,
                delegate: auth.contract_address,
            }
            .into()),
            _ => {
                debug!(delegate = %auth.contract_address, "Dropping authorization of delegated account");
                Ok(true)
            }
        }
    }

    async fn proxy_deployment<I: StateInspector>(
        &self,
        inspector: &I,
        chain: &ChainConfig,
        init_data: &Bytes,
        salt_nonce: Option<U256>,
    ) -> Result<ProxyDeployment, RelayError> {
        let factory = chain.addresses.proxy_factory;
        let creation_code = match &chain.proxy_creation_code {
            Some(code) => code.clone(),
            None => inspector.proxy_creation_code(factory).await?,
        };

        Ok(ProxyDeployment {
            factory,
            singleton: chain.addresses.safe_singleton,
            initializer: init_data.clone(),
            salt_nonce: salt_nonce.unwrap_or(chain.proxy_salt),
            creation_code,
        })
    }
}

/// Every authorization has to be valid on the target chain, or on any chain.
fn check_authorization_chains(chain_id: ChainId, request: &RelayRequest) -> Result<(), AuthError> {
    for auth in &request.authorization_list {
        if !auth.chain_id.is_zero() && auth.chain_id != U256::from(chain_id) {
            return Err(AuthError::ChainMismatch { expected: chain_id, got: auth.chain_id });
        }
    }
    Ok(())
}

/// Builds the single relay transaction for `plan`.
///
/// A non-empty plan is executed through `MultiSendCallOnly`. An empty plan only carries the
/// authorization list and is sent to the chain's authorization sink.
fn build_transaction(
    chain: &ChainConfig,
    plan: &RelayPlan,
    authorization_list: Vec<SignedAuthorization>,
) -> Result<TransactionRequest, RelayError> {
    let (to, input): (Address, Bytes) = if plan.is_empty() {
        (chain.authorization_sink, Bytes::new())
    } else {
        (
            chain.addresses.multi_send_call_only,
            multisend::multi_send_call_only(&plan.meta_transactions())?,
        )
    };

    let mut tx = TransactionRequest::default().to(to).input(input.into()).value(U256::ZERO);
    if !authorization_list.is_empty() {
        tx.authorization_list = Some(authorization_list);
    }
    tx.gas = chain.gas_limit;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ValidationError,
        test_utils::*,
        types::{IMultiSend, MetaTransaction},
    };
    use alloy::{
        eips::eip7702::constants::EIP7702_DELEGATION_DESIGNATOR,
        primitives::{address, bytes},
        sol_types::SolCall,
    };

    fn sent_calls(tx: &TransactionRequest) -> Vec<MetaTransaction> {
        let input = tx.input.input().unwrap();
        let call = IMultiSend::multiSendCall::abi_decode(input).unwrap();
        multisend::decode(&call.transactions).unwrap()
    }

    #[tokio::test]
    async fn fresh_account_deploys_and_initializes() {
        let chain = MockChain::default();
        let outcome = orchestrator(&chain, RelayPolicy::default()).relay(request()).await.unwrap();

        assert_eq!(outcome.tx_hash, Some(TX_HASH));
        assert_eq!(outcome.plan.summary(), "deploy_proxy,initialize_account");
        assert_eq!(chain.calls(), vec!["code_at", "storage_at", "send_transaction"]);

        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        assert_eq!(tx.to, Some(addresses().multi_send_call_only.into()));
        assert_eq!(tx.value, Some(U256::ZERO));
        assert_eq!(tx.gas, Some(1_000_000));
        assert_eq!(tx.authorization_list.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            sent_calls(tx),
            vec![
                MetaTransaction::call(addresses().proxy_factory, deployment().create_call()),
                MetaTransaction::call(ACCOUNT, INIT_DATA),
            ]
        );
    }

    #[tokio::test]
    async fn deployed_proxy_only_initializes() {
        let chain = MockChain::default();
        chain.deploy(deployment().address());

        let outcome = orchestrator(&chain, RelayPolicy::default()).relay(request()).await.unwrap();
        assert_eq!(outcome.plan.summary(), "initialize_account");
        assert_eq!(sent_calls(&chain.sent()[0]), vec![MetaTransaction::call(ACCOUNT, INIT_DATA)]);
    }

    #[tokio::test]
    async fn completed_account_sends_authorization_only() {
        let chain = MockChain::default();
        chain.deploy(deployment().address());
        chain.initialize(ACCOUNT);

        let outcome = orchestrator(&chain, RelayPolicy::default()).relay(request()).await.unwrap();
        assert!(outcome.plan.is_empty());

        let tx = &chain.sent()[0];
        assert_eq!(tx.to, Some(Address::ZERO.into()));
        assert_eq!(tx.input.input(), Some(&Bytes::new()));
        assert_eq!(tx.authorization_list.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn planning_is_idempotent() {
        let chain = MockChain::default();
        let orchestrator = orchestrator(&chain, RelayPolicy::default());

        let first = orchestrator.prepare(&request()).await.unwrap();
        let second = orchestrator.prepare(&request()).await.unwrap();
        assert_eq!(first.plan, second.plan);
        assert_eq!(first.transaction, second.transaction);
        assert!(chain.sent().is_empty());

        chain.deploy(deployment().address());
        chain.initialize(ACCOUNT);
        assert!(orchestrator.prepare(&request()).await.unwrap().plan.is_empty());
    }

    #[tokio::test]
    async fn without_init_data_skips_checks() {
        let chain = MockChain::default();
        let request = RelayRequest::new(ACCOUNT, vec![authorization(CHAIN_ID, ACCOUNT, 0)]);

        let outcome = orchestrator(&chain, RelayPolicy::default()).relay(request).await.unwrap();
        assert!(outcome.plan.is_empty());
        assert_eq!(chain.calls(), vec!["send_transaction"]);
    }

    #[tokio::test]
    async fn unsupported_chain_touches_nothing() {
        let chain = MockChain::default();
        let request = RelayRequest::new(ACCOUNT, vec![authorization(1, ACCOUNT, 0)])
            .with_init_data(INIT_DATA);

        let err = orchestrator(&chain, RelayPolicy::default()).relay(request).await.unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedChain(1)));
        assert!(!err.is_retryable());
        assert!(chain.calls().is_empty());
        assert_eq!(chain.0.lock().unwrap().connections, 0);
    }

    #[tokio::test]
    async fn missing_chain_id() {
        let chain = MockChain::default();
        let err = orchestrator(&chain, RelayPolicy::default())
            .relay(RelayRequest::new(ACCOUNT, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(ValidationError::MissingChainId)));
    }

    #[tokio::test]
    async fn empty_authorization_list_with_explicit_chain() {
        let chain = MockChain::default();
        let request = RelayRequest::new(ACCOUNT, vec![]).with_chain_id(CHAIN_ID);

        let prepared =
            orchestrator(&chain, RelayPolicy::default()).prepare(&request).await.unwrap();
        let tx = prepared.transaction.unwrap();
        assert!(tx.authorization_list.is_none());
        assert_eq!(tx.to, Some(Address::ZERO.into()));
    }

    #[tokio::test]
    async fn authorization_for_other_chain() {
        let chain = MockChain::default();
        let request = RelayRequest::new(
            ACCOUNT,
            vec![authorization(CHAIN_ID, ACCOUNT, 0), authorization(10, ACCOUNT, 1)],
        );

        let err = orchestrator(&chain, RelayPolicy::default()).relay(request).await.unwrap_err();
        assert!(matches!(err, RelayError::Auth(AuthError::ChainMismatch { expected: CHAIN_ID, .. })));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn chain_agnostic_authorization_with_explicit_chain() {
        let chain = MockChain::default();
        let request = RelayRequest::new(ACCOUNT, vec![authorization(0, ACCOUNT, 0)])
            .with_chain_id(CHAIN_ID);

        let outcome = orchestrator(&chain, RelayPolicy::default()).relay(request).await.unwrap();
        assert_eq!(outcome.chain_id, CHAIN_ID);
    }

    #[tokio::test]
    async fn stale_authorization_nonce() {
        let chain = MockChain::with(|state| state.nonce = 3);
        let policy = RelayPolicy { verify_authorization_nonce: true, ..Default::default() };

        let err = orchestrator(&chain, policy).relay(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::Auth(AuthError::InvalidNonce { expected: 3, got: 0 })));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn delegate_must_match_proxy() {
        let chain = MockChain::default();
        let policy = RelayPolicy { verify_delegate: true, ..Default::default() };
        let request = RelayRequest::new(ACCOUNT, vec![authorization(CHAIN_ID, ACCOUNT, 0)])
            .with_init_data(INIT_DATA);

        let err = orchestrator(&chain, policy).relay(request).await.unwrap_err();
        assert!(matches!(err, RelayError::Auth(AuthError::DelegateMismatch { .. })));

        assert!(orchestrator(&chain, policy).relay(self::request()).await.is_ok());
    }

    #[tokio::test]
    async fn skip_policy_drops_authorization() {
        let proxy = deployment().address();
        let chain = MockChain::default();
        chain.0.lock().unwrap().code.insert(
            ACCOUNT,
            [&EIP7702_DELEGATION_DESIGNATOR[..], proxy.as_slice()].concat().into(),
        );
        let policy = RelayPolicy { delegation: DelegationPolicy::Skip, ..Default::default() };

        // initialization still pending
        let outcome = orchestrator(&chain, policy).relay(request()).await.unwrap();
        assert_eq!(outcome.tx_hash, Some(TX_HASH));
        assert!(chain.sent()[0].authorization_list.is_none());

        // nothing left to do
        chain.deploy(proxy);
        chain.initialize(ACCOUNT);
        let outcome = orchestrator(&chain, policy).relay(request()).await.unwrap();
        assert_eq!(outcome.tx_hash, None);
        assert_eq!(RelayResponse::from(outcome).tx_hash, None);
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn reject_policy() {
        let proxy = deployment().address();
        let chain = MockChain::default();
        chain.0.lock().unwrap().code.insert(
            ACCOUNT,
            [&EIP7702_DELEGATION_DESIGNATOR[..], proxy.as_slice()].concat().into(),
        );
        let policy = RelayPolicy { delegation: DelegationPolicy::Reject, ..Default::default() };

        let err = orchestrator(&chain, policy).relay(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::Auth(AuthError::AlreadyDelegated { .. })));

        // a different target is a fresh delegation
        let other = RelayRequest::new(ACCOUNT, vec![authorization(CHAIN_ID, ACCOUNT, 0)]);
        assert!(orchestrator(&chain, policy).relay(other).await.is_ok());
    }

    #[tokio::test]
    async fn inspector_failure_is_retryable() {
        let chain = MockChain::with(|state| state.fail = true);

        let err = orchestrator(&chain, RelayPolicy::default()).relay(request()).await.unwrap_err();
        assert!(matches!(err, RelayError::RpcError(_)));
        assert!(err.is_retryable());
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn fetches_creation_code_when_not_configured() {
        let chain = MockChain::with(|state| {
            state.creation_code = Some(bytes!("0x608060405234801561001057600080fd5b50"))
        });
        let mut config = chain_config();
        config.proxy_creation_code = None;
        let orchestrator = orchestrator_with(&chain, config, RelayPolicy::default());

        let prepared = orchestrator.prepare(&request()).await.unwrap();
        assert_eq!(chain.calls(), vec!["proxy_creation_code", "code_at", "storage_at"]);
        assert_eq!(
            prepared.plan.calls()[0],
            crate::types::PlannedCall::DeployProxy(deployment())
        );
    }

    #[tokio::test]
    async fn salt_nonce_override() {
        let chain = MockChain::default();
        let request = request().with_salt_nonce(U256::from(5));

        let prepared =
            orchestrator(&chain, RelayPolicy::default()).prepare(&request).await.unwrap();
        let expected = ProxyDeployment { salt_nonce: U256::from(5), ..deployment() };
        assert_eq!(prepared.plan.calls()[0], crate::types::PlannedCall::DeployProxy(expected));
    }

    #[tokio::test]
    async fn estimates_gas_when_unset() {
        let chain = MockChain::default();
        let orchestrator =
            orchestrator_with(&chain, chain_config().with_gas_limit(None), RelayPolicy::default());

        let prepared = orchestrator.prepare(&request()).await.unwrap();
        assert_eq!(prepared.transaction.unwrap().gas, None);
    }

    #[tokio::test]
    async fn completed_account_sends_to_configured_sink() {
        let sink = address!("0x000000000000000000000000000000000000dead");
        let chain = MockChain::default();
        chain.deploy(deployment().address());
        chain.initialize(ACCOUNT);

        let orchestrator = orchestrator_with(
            &chain,
            chain_config().with_authorization_sink(sink),
            RelayPolicy::default(),
        );
        let outcome = orchestrator.relay(request()).await.unwrap();
        assert!(outcome.plan.is_empty());

        let tx = &chain.sent()[0];
        assert_eq!(tx.to, Some(sink.into()));
        assert_eq!(tx.input.input(), Some(&Bytes::new()));
        assert_eq!(tx.authorization_list.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn chain_salt_derives_the_proxy() {
        let salted = ProxyDeployment { salt_nonce: U256::from(42), ..deployment() };
        assert_ne!(salted.address(), deployment().address());

        let chain = MockChain::default();
        let policy = RelayPolicy { verify_delegate: true, ..Default::default() };
        let orchestrator =
            orchestrator_with(&chain, chain_config().with_proxy_salt(U256::from(42)), policy);

        // delegating to the unsalted proxy no longer matches
        let err = orchestrator.relay(request()).await.unwrap_err();
        let RelayError::Auth(AuthError::DelegateMismatch { expected, .. }) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*expected, salted.address());

        let request =
            RelayRequest::new(ACCOUNT, vec![authorization(CHAIN_ID, salted.address(), 0)])
                .with_init_data(INIT_DATA);
        let outcome = orchestrator.relay(request.clone()).await.unwrap();
        assert_eq!(outcome.plan.calls()[0], crate::types::PlannedCall::DeployProxy(salted.clone()));
        assert_eq!(
            sent_calls(&chain.sent()[0]),
            vec![
                MetaTransaction::call(addresses().proxy_factory, salted.create_call()),
                MetaTransaction::call(ACCOUNT, INIT_DATA),
            ]
        );

        // a salt on the request takes precedence over the chain salt
        let prepared = orchestrator.prepare(&request.with_salt_nonce(U256::ZERO)).await;
        assert!(matches!(prepared, Err(RelayError::Auth(AuthError::DelegateMismatch { .. }))));
    }
}

//! Relay plans.
//!
//! A plan is the ordered list of calls still required to bring an account to its target state.
//! It is derived purely from the observed [`AccountState`], so planning twice against the same
//! state yields the same plan.

use super::MetaTransaction;
use crate::proxy::ProxyDeployment;
use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// On-chain facts the planner decides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    /// Whether the Safe proxy already has code.
    pub proxy_deployed: bool,
    /// Whether storage slot 0 of the account is non-zero.
    pub account_initialized: bool,
}

impl AccountState {
    /// The state of an account that needs nothing but the delegation.
    pub const COMPLETE: Self = Self { proxy_deployed: true, account_initialized: true };
}

/// A call the relay still has to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCall {
    /// Deploy the Safe proxy through the factory.
    DeployProxy(ProxyDeployment),
    /// Call the delegated account with the Safe setup data.
    InitializeAccount {
        /// The delegating account.
        account: Address,
        /// Safe setup calldata.
        init_data: Bytes,
    },
}

impl PlannedCall {
    /// Short name used in logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DeployProxy(_) => "deploy_proxy",
            Self::InitializeAccount { .. } => "initialize_account",
        }
    }

    /// The meta transaction executing this call.
    pub fn meta_transaction(&self) -> MetaTransaction {
        match self {
            Self::DeployProxy(deployment) => {
                MetaTransaction::call(deployment.factory, deployment.create_call())
            }
            Self::InitializeAccount { account, init_data } => {
                MetaTransaction::call(*account, init_data.clone())
            }
        }
    }
}

/// The ordered calls of a relay.
///
/// An empty plan means the transaction only carries the authorization list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayPlan {
    calls: Vec<PlannedCall>,
}

impl RelayPlan {
    /// Builds the plan for `account` given the observed `state`.
    ///
    /// Without a `deployment` there is no initializer, hence nothing to deploy or initialize and
    /// the plan is empty whatever the state.
    pub fn from_state(
        account: Address,
        deployment: Option<&ProxyDeployment>,
        state: AccountState,
    ) -> Self {
        let Some(deployment) = deployment else { return Self::default() };

        let mut calls = Vec::with_capacity(2);
        if !state.proxy_deployed {
            calls.push(PlannedCall::DeployProxy(deployment.clone()));
        }
        if !state.account_initialized {
            calls.push(PlannedCall::InitializeAccount {
                account,
                init_data: deployment.initializer.clone(),
            });
        }
        Self { calls }
    }

    /// The planned calls in execution order.
    pub fn calls(&self) -> &[PlannedCall] {
        &self.calls
    }

    /// Whether nothing but the authorization list has to be sent.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Number of planned calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// The planned calls as multisend meta transactions.
    pub fn meta_transactions(&self) -> Vec<MetaTransaction> {
        self.calls.iter().map(PlannedCall::meta_transaction).collect()
    }

    /// Call kinds joined for logging, e.g. `deploy_proxy,initialize_account`.
    pub fn summary(&self) -> String {
        itertools::join(self.calls.iter().map(PlannedCall::kind), ",")
    }
}

//! EVM approval workflow.
//!
//! Decides whether a taker must grant ERC-20 allowance before a swap, and to
//! whom. Permit2-capable chains are checked against the canonical Permit2
//! contract's `(amount, expiration, nonce)` allowance tuple; everywhere else
//! the plain ERC-20 allowance is read. Spender resolution for the
//! allowance-holder strategy is dynamic (probe quote → `allowanceTarget`)
//! with a 24-hour per-chain cache and a hardfork-family fallback table.

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::sol;
use alloy::sol_types::SolCall;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chains::ChainProviders;
use crate::error::GatewayError;
use crate::known::{self, HardforkFamily};
use crate::network::{ApprovalStrategy, PERMIT2_ADDRESS, supports_permit2};
use crate::registry::ProviderRegistry;
use crate::types::{SwapRequest, TokenAmount, UnixTimestamp, is_native_address};

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    #[sol(rpc)]
    interface IPermit2 {
        function allowance(address user, address token, address spender)
            external
            view
            returns (uint160 amount, uint48 expiration, uint48 nonce);
    }
}

/// Dynamically resolved spenders are trusted for this long.
const SPENDER_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Sell amount used for spender-resolution probe quotes.
const PROBE_SELL_AMOUNT: u64 = 1_000_000;

/// AllowanceHolder deployments, one per hardfork family.
const ALLOWANCE_HOLDER_CANCUN: Address =
    alloy::primitives::address!("0x0000000000001fF3684f28c67538d4D072C22734");
const ALLOWANCE_HOLDER_SHANGHAI: Address =
    alloy::primitives::address!("0x0000000000005E88410CcDFaDe4a5EfaE4b49562");
const ALLOWANCE_HOLDER_LONDON: Address =
    alloy::primitives::address!("0x000000000000175a8b9bC6d539B3708EEd92EA6c");

/// Outcome of an approval-status check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatusReport {
    pub required: bool,
    pub strategy: ApprovalStrategy,
    pub spender: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_allowance: Option<TokenAmount>,
}

struct CachedSpender {
    address: Address,
    resolved: Instant,
}

pub struct ApprovalWorkflow {
    chains: Arc<ChainProviders>,
    registry: Arc<ProviderRegistry>,
    spender_cache: DashMap<u64, CachedSpender>,
}

impl ApprovalWorkflow {
    pub fn new(chains: Arc<ChainProviders>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            chains,
            registry,
            spender_cache: DashMap::new(),
        }
    }

    /// Whether a swap of `amount` of `token` from `owner` through `spender`
    /// needs an approval first.
    #[tracing::instrument(skip(self), fields(chain_id, %token))]
    pub async fn is_approval_needed(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<bool, GatewayError> {
        if is_native_address(&token) {
            return Ok(false);
        }
        if supports_permit2(chain_id) && self.is_token_permit2_compatible(chain_id, token) {
            return Ok(self
                .is_permit2_approval_needed(chain_id, token, owner, spender, amount)
                .await);
        }
        let allowance = self.erc20_allowance(chain_id, token, owner, spender).await?;
        Ok(allowance < amount)
    }

    /// Permit2's scoped allowance check. An RPC failure conservatively
    /// reports "approval needed", with the contract address in the warning
    /// so a misconfigured deployment is visible.
    async fn is_permit2_approval_needed(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> bool {
        let read = async {
            let provider = self.chains.read(chain_id)?;
            let permit2 = IPermit2::new(PERMIT2_ADDRESS, provider);
            permit2
                .allowance(owner, token, spender)
                .call()
                .await
                .map_err(|e| GatewayError::Rpc {
                    chain_id,
                    message: format!("permit2 allowance read failed: {e}"),
                })
        };
        match read.await {
            Ok(ret) => {
                let now = UnixTimestamp::now_or_epoch().0;
                let expired = ret.expiration.to::<u64>() < now;
                let allowed = U256::from(ret.amount);
                expired || allowed < amount
            }
            Err(e) => {
                tracing::warn!(
                    chain_id,
                    permit2 = %PERMIT2_ADDRESS,
                    error = %e,
                    "permit2 allowance read failed, assuming approval needed"
                );
                true
            }
        }
    }

    /// Plain ERC-20 `allowance(owner, spender)`.
    pub async fn erc20_allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, GatewayError> {
        let provider = self.chains.read(chain_id)?;
        let erc20 = IERC20::new(token, provider);
        erc20
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| GatewayError::Rpc {
                chain_id,
                message: format!("allowance read failed: {e}"),
            })
    }

    /// Sell-token balance of `owner`.
    pub async fn token_balance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
    ) -> Result<U256, GatewayError> {
        let provider = self.chains.read(chain_id)?;
        if is_native_address(&token) {
            return provider
                .get_balance(owner)
                .await
                .map_err(|e| GatewayError::Rpc {
                    chain_id,
                    message: format!("balance read failed: {e}"),
                });
        }
        let erc20 = IERC20::new(token, provider);
        erc20
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| GatewayError::Rpc {
                chain_id,
                message: format!("balanceOf read failed: {e}"),
            })
    }

    /// Resolve the address the taker must approve for the given strategy.
    ///
    /// `probe` supplies the request context used for the dynamic
    /// allowance-holder probe quote; without it resolution goes straight to
    /// the fallback table.
    #[tracing::instrument(skip(self, probe), fields(chain_id, %strategy))]
    pub async fn resolve_spender(
        &self,
        chain_id: u64,
        strategy: ApprovalStrategy,
        probe: Option<&SwapRequest>,
    ) -> Result<Address, GatewayError> {
        match strategy {
            ApprovalStrategy::Permit2 => {
                if !supports_permit2(chain_id) {
                    return Err(GatewayError::unsupported(format!(
                        "permit2 is not deployed on chain {chain_id}"
                    )));
                }
                Ok(PERMIT2_ADDRESS)
            }
            ApprovalStrategy::AllowanceHolder => {
                self.resolve_allowance_holder(chain_id, probe).await
            }
        }
    }

    async fn resolve_allowance_holder(
        &self,
        chain_id: u64,
        probe: Option<&SwapRequest>,
    ) -> Result<Address, GatewayError> {
        if let Some(cached) = self.spender_cache.get(&chain_id) {
            if cached.resolved.elapsed() < SPENDER_CACHE_TTL {
                return Ok(cached.address);
            }
        }

        if let Some(address) = self.probe_spender(chain_id, probe).await {
            self.spender_cache.insert(
                chain_id,
                CachedSpender {
                    address,
                    resolved: Instant::now(),
                },
            );
            return Ok(address);
        }

        // Probe failed or impossible: fall back to the hardfork table.
        let family = known::by_chain_id(chain_id)
            .and_then(|info| info.hardfork)
            .ok_or_else(|| {
                GatewayError::unsupported(format!(
                    "no known allowance holder for chain {chain_id}"
                ))
            })?;
        Ok(match family {
            HardforkFamily::Cancun => ALLOWANCE_HOLDER_CANCUN,
            HardforkFamily::Shanghai => ALLOWANCE_HOLDER_SHANGHAI,
            HardforkFamily::London => ALLOWANCE_HOLDER_LONDON,
        })
    }

    /// Try each registered adapter for a dynamic spender: the narrow
    /// capability first, then a tiny probe quote read for `allowanceTarget`.
    async fn probe_spender(&self, chain_id: u64, probe: Option<&SwapRequest>) -> Option<Address> {
        for adapter in self.registry.evm_aggregators_for_chain(chain_id) {
            if let Some(spender_provider) = adapter.spender_provider() {
                match spender_provider
                    .spender_address(chain_id, ApprovalStrategy::AllowanceHolder)
                    .await
                {
                    Ok(address) => return Some(address),
                    Err(e) => {
                        tracing::debug!(provider = adapter.name(), error = %e,
                            "spender capability failed");
                    }
                }
            }
            if let Some(req) = probe {
                let mut small = req.clone();
                small.sell_amount = TokenAmount::from(PROBE_SELL_AMOUNT);
                match adapter.allowance_holder_quote(&small).await {
                    Ok(quote) => {
                        if let Some(target) = quote.allowance_target {
                            return Some(target);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(provider = adapter.name(), error = %e,
                            "spender probe quote failed");
                    }
                }
            }
        }
        None
    }

    /// Full approval status for one request.
    pub async fn approval_status(
        &self,
        req: &SwapRequest,
        strategy: ApprovalStrategy,
    ) -> Result<ApprovalStatusReport, GatewayError> {
        let spender = self
            .resolve_spender(req.chain_id, strategy, Some(req))
            .await?;
        if is_native_address(&req.sell_token) {
            return Ok(ApprovalStatusReport {
                required: false,
                strategy,
                spender,
                current_allowance: None,
            });
        }
        let required = self
            .is_approval_needed(
                req.chain_id,
                req.sell_token,
                req.taker,
                spender,
                req.sell_amount.0,
            )
            .await?;
        let current_allowance = self
            .erc20_allowance(req.chain_id, req.sell_token, req.taker, spender)
            .await
            .ok()
            .map(TokenAmount);
        Ok(ApprovalStatusReport {
            required,
            strategy,
            spender,
            current_allowance,
        })
    }

    /// Calldata for `approve(spender, amount)` on the sell token.
    pub fn approval_calldata(spender: Address, amount: U256) -> Bytes {
        Bytes::from(IERC20::approveCall { spender, amount }.abi_encode())
    }

    /// Heuristic Permit2 compatibility: any non-native ERC-20 is assumed to
    /// work; tokens with known non-standard allowance semantics would be
    /// excluded here.
    fn is_token_permit2_compatible(&self, chain_id: u64, token: Address) -> bool {
        let _ = chain_id;
        !is_native_address(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_calldata_has_selector_and_args() {
        let spender = Address::repeat_byte(0x11);
        let calldata = ApprovalWorkflow::approval_calldata(spender, U256::from(42u64));
        // approve(address,uint256) selector.
        assert_eq!(&calldata[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(calldata.len(), 4 + 32 + 32);
        let decoded = IERC20::approveCall::abi_decode(&calldata).expect("decodes");
        assert_eq!(decoded.spender, spender);
        assert_eq!(decoded.amount, U256::from(42u64));
    }

    #[test]
    fn fallback_table_covers_known_families() {
        // One representative per family.
        for (chain, expected) in [
            (1u64, ALLOWANCE_HOLDER_CANCUN),
            (56, ALLOWANCE_HOLDER_SHANGHAI),
            (43114, ALLOWANCE_HOLDER_LONDON),
        ] {
            let family = known::by_chain_id(chain)
                .and_then(|i| i.hardfork)
                .expect("family known");
            let address = match family {
                HardforkFamily::Cancun => ALLOWANCE_HOLDER_CANCUN,
                HardforkFamily::Shanghai => ALLOWANCE_HOLDER_SHANGHAI,
                HardforkFamily::London => ALLOWANCE_HOLDER_LONDON,
            };
            assert_eq!(address, expected);
        }
    }
}

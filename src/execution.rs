//! Execution coordinator.
//!
//! Drives one EVM swap end to end: validate → pre-flight → quote (with
//! retries) → approval (Permit2 signature or on-chain approve) → swap
//! submission (with retries) → confirmation → receipt parsing. Steps are
//! strictly ordered; an approval transaction is observed confirmed before
//! the swap transaction is built. The caller's signing secret lives only for
//! the duration of the call.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolEvent;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::approval::{ApprovalWorkflow, IERC20};
use crate::chains::ChainProviders;
use crate::error::GatewayError;
use crate::network::{ApprovalStrategy, ExecutionStatus};
use crate::orchestrator::QuoteOrchestrator;
use crate::permit2;
use crate::precheck::PreCheck;
use crate::types::{
    ExecutionResult, SignerSecret, SwapQuote, SwapRequest, TokenAmount, UniversalSwapRequest,
    is_native_address,
};

/// Quote acquisition and submission each retry up to this many times.
const MAX_ATTEMPTS: u32 = 3;

/// First backoff delay; doubles per attempt (1 s, 2 s, …).
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Ceiling on the confirmation wait.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct ExecutionCoordinator {
    orchestrator: Arc<QuoteOrchestrator>,
    approval: Arc<ApprovalWorkflow>,
    precheck: Arc<PreCheck>,
    chains: Arc<ChainProviders>,
    records: DashMap<String, ExecutionResult>,
}

impl ExecutionCoordinator {
    pub fn new(
        orchestrator: Arc<QuoteOrchestrator>,
        approval: Arc<ApprovalWorkflow>,
        precheck: Arc<PreCheck>,
        chains: Arc<ChainProviders>,
    ) -> Self {
        Self {
            orchestrator,
            approval,
            precheck,
            chains,
            records: DashMap::new(),
        }
    }

    /// Execute an EVM swap with the supplied per-request signing secret.
    #[tracing::instrument(skip_all)]
    pub async fn execute_swap(
        &self,
        req: &UniversalSwapRequest,
        secret: SignerSecret,
    ) -> Result<ExecutionResult, GatewayError> {
        let execution_id = new_execution_id();

        // 1. Validate.
        let legacy = req.to_legacy().ok_or_else(|| {
            GatewayError::unsupported(
                "direct execution is only available for same-chain EVM swaps",
            )
        })?;
        legacy.validate().map_err(GatewayError::validation)?;

        // 2. Pre-flight.
        let report = self.precheck.run(req).await;
        if !report.is_ready() {
            return Err(GatewayError::Execution {
                user_message: "pre-flight checks failed".to_string(),
                detail: report.warnings.join("; "),
            });
        }

        // 3. Quote, up to three attempts with exponential backoff.
        let quote = self
            .quote_with_retries(&legacy)
            .await
            .map_err(translate_gateway_error)?;

        let (provider, signer_address) = self.chains.signing(legacy.chain_id, &secret)?;

        self.records.insert(
            execution_id.clone(),
            pending_record(&execution_id, &quote.aggregator),
        );

        // 4. Approval, unless selling the native token. Permit2 binds the
        // signature to the swap call instead of an on-chain transaction.
        let mut approval_tx_hash = None;
        let quote = if is_native_address(&legacy.sell_token) {
            quote
        } else {
            match effective_strategy(&legacy, &quote) {
                ApprovalStrategy::Permit2 => permit2::create_signed_quote(&quote, &secret).await?,
                ApprovalStrategy::AllowanceHolder => {
                    approval_tx_hash = self
                        .ensure_allowance(&legacy, &quote, &provider, signer_address)
                        .await
                        .map_err(translate_gateway_error)?;
                    quote
                }
            }
        };

        // 5–6. Submit and wait for confirmation.
        let receipt = match self
            .submit_with_retries(&provider, &quote, signer_address)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                let failed = self.fail_record(&execution_id, &quote.aggregator, &e);
                self.records.insert(execution_id.clone(), failed);
                return Err(e);
            }
        };

        // 7. Parse the receipt for the actually received amount.
        let received_amount = received_from_receipt(
            &receipt,
            legacy.buy_token,
            legacy.effective_recipient(),
        )
        .unwrap_or(quote.buy_amount);

        let status = if receipt.status() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        let result = ExecutionResult {
            execution_id: execution_id.clone(),
            status,
            swap_tx_hash: Some(format!("{:#x}", receipt.transaction_hash)),
            approval_tx_hash,
            received_amount: Some(received_amount),
            aggregator: quote.aggregator.clone(),
            error: (!receipt.status()).then(|| "transaction reverted".to_string()),
        };
        self.records.insert(execution_id, result.clone());
        Ok(result)
    }

    /// Execution record for `/universal-swap/status` polling.
    pub fn status(&self, execution_id: &str) -> Option<ExecutionResult> {
        self.records.get(execution_id).map(|r| r.clone())
    }

    /// Executions still marked pending, for shutdown diagnostics.
    pub fn pending_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == ExecutionStatus::Pending)
            .count()
    }

    async fn quote_with_retries(&self, req: &SwapRequest) -> Result<SwapQuote, GatewayError> {
        let mut backoff = BACKOFF_BASE;
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .orchestrator
                .get_quote(req, req.aggregator.as_deref(), true)
                .await
            {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "quote attempt failed");
                    last_error = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| GatewayError::internal("quote retries exhausted")))
    }

    /// Read the allowance and, when short, submit an `approve` and wait for
    /// its confirmation before the swap is built.
    async fn ensure_allowance(
        &self,
        req: &SwapRequest,
        quote: &SwapQuote,
        provider: &alloy::providers::DynProvider,
        signer_address: Address,
    ) -> Result<Option<String>, GatewayError> {
        let spender = match quote.allowance_target {
            Some(target) => target,
            None => {
                self.approval
                    .resolve_spender(req.chain_id, ApprovalStrategy::AllowanceHolder, Some(req))
                    .await?
            }
        };
        let needed = self
            .approval
            .is_approval_needed(req.chain_id, req.sell_token, req.taker, spender, req.sell_amount.0)
            .await?;
        if !needed {
            return Ok(None);
        }

        tracing::info!(%spender, token = %req.sell_token, "submitting approval transaction");
        let calldata = ApprovalWorkflow::approval_calldata(spender, req.sell_amount.0);
        let tx = TransactionRequest::default()
            .with_from(signer_address)
            .with_to(req.sell_token)
            .with_input(calldata);
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| GatewayError::Rpc {
                chain_id: req.chain_id,
                message: format!("approval submission failed: {e}"),
            })?;
        let receipt = pending
            .with_timeout(Some(CONFIRMATION_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| GatewayError::Rpc {
                chain_id: req.chain_id,
                message: format!("approval confirmation failed: {e}"),
            })?;
        if !receipt.status() {
            return Err(GatewayError::Execution {
                user_message: "token approval transaction reverted".to_string(),
                detail: format!("approval tx {:#x} reverted", receipt.transaction_hash),
            });
        }
        Ok(Some(format!("{:#x}", receipt.transaction_hash)))
    }

    async fn submit_with_retries(
        &self,
        provider: &alloy::providers::DynProvider,
        quote: &SwapQuote,
        signer_address: Address,
    ) -> Result<TransactionReceipt, GatewayError> {
        let mut backoff = BACKOFF_BASE;
        let mut last_error: Option<String> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.submit_once(provider, quote, signer_address).await {
                Ok(receipt) => return Ok(receipt),
                Err(message) => {
                    tracing::warn!(attempt, error = %message, "swap submission failed");
                    last_error = Some(message);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }
        let raw = last_error.unwrap_or_else(|| "submission retries exhausted".to_string());
        Err(GatewayError::Execution {
            user_message: translate_execution_error(&raw).to_string(),
            detail: raw,
        })
    }

    async fn submit_once(
        &self,
        provider: &alloy::providers::DynProvider,
        quote: &SwapQuote,
        signer_address: Address,
    ) -> Result<TransactionReceipt, String> {
        let mut tx = TransactionRequest::default()
            .with_from(signer_address)
            .with_to(quote.to)
            .with_input(quote.data.clone())
            .with_value(quote.value.0);
        if let Some(gas) = quote.gas.or(quote.estimated_gas) {
            if let Ok(limit) = u64::try_from(gas.0) {
                tx = tx.with_gas_limit(limit);
            }
        }
        if let Some(max_fee) = quote.max_fee_per_gas {
            if let Ok(fee) = u128::try_from(max_fee.0) {
                tx = tx.with_max_fee_per_gas(fee);
            }
        }
        if let Some(priority) = quote.max_priority_fee_per_gas {
            if let Ok(fee) = u128::try_from(priority.0) {
                tx = tx.with_max_priority_fee_per_gas(fee);
            }
        } else if let Some(gas_price) = quote.gas_price {
            if quote.max_fee_per_gas.is_none() {
                if let Ok(price) = u128::try_from(gas_price.0) {
                    tx = tx.with_gas_price(price);
                }
            }
        }

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| e.to_string())?;
        pending
            .with_timeout(Some(CONFIRMATION_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| e.to_string())
    }

    fn fail_record(
        &self,
        execution_id: &str,
        aggregator: &str,
        error: &GatewayError,
    ) -> ExecutionResult {
        ExecutionResult {
            execution_id: execution_id.to_string(),
            status: ExecutionStatus::Failed,
            swap_tx_hash: None,
            approval_tx_hash: None,
            received_amount: None,
            aggregator: aggregator.to_string(),
            error: Some(error.to_string()),
        }
    }
}

fn pending_record(execution_id: &str, aggregator: &str) -> ExecutionResult {
    ExecutionResult {
        execution_id: execution_id.to_string(),
        status: ExecutionStatus::Pending,
        swap_tx_hash: None,
        approval_tx_hash: None,
        received_amount: None,
        aggregator: aggregator.to_string(),
        error: None,
    }
}

fn new_execution_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    format!("exec_{}", hex::encode(bytes))
}

/// The strategy the approval step follows: the quote's own declaration wins,
/// then the request's, then the presence of a permit block.
fn effective_strategy(req: &SwapRequest, quote: &SwapQuote) -> ApprovalStrategy {
    quote
        .approval_strategy
        .or(req.approval_strategy)
        .unwrap_or(if quote.permit2.is_some() {
            ApprovalStrategy::Permit2
        } else {
            ApprovalStrategy::AllowanceHolder
        })
}

/// Sum of ERC-20 `Transfer` amounts on the buy token credited to the
/// recipient, read from the receipt.
fn received_from_receipt(
    receipt: &TransactionReceipt,
    buy_token: Address,
    recipient: Address,
) -> Option<TokenAmount> {
    let mut total = U256::ZERO;
    let mut seen = false;
    for log in receipt.inner.logs() {
        if log.address() != buy_token {
            continue;
        }
        if let Ok(decoded) = IERC20::Transfer::decode_log(&log.inner) {
            if decoded.data.to == recipient {
                total += decoded.data.value;
                seen = true;
            }
        }
    }
    seen.then_some(TokenAmount(total))
}

/// Keep only the user-facing message for errors surfaced before translation.
fn translate_gateway_error(error: GatewayError) -> GatewayError {
    match error {
        GatewayError::AllProvidersFailed { last_error } => {
            let user_message = translate_execution_error(&last_error).to_string();
            GatewayError::Execution {
                user_message,
                detail: last_error,
            }
        }
        other => other,
    }
}

/// Map an upstream error message onto a user-facing one by substring.
pub fn translate_execution_error(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        "Insufficient funds to cover the swap amount and gas"
    } else if lower.contains("gas required exceeds")
        || lower.contains("gas estimation")
        || lower.contains("cannot estimate gas")
    {
        "Gas estimation failed; the swap would likely revert"
    } else if lower.contains("slippage") || lower.contains("received amount") {
        "Price moved beyond the slippage tolerance; retry with a higher tolerance"
    } else if lower.contains("deadline") || lower.contains("expired") {
        "The quote expired before execution; request a fresh quote"
    } else if lower.contains("replacement") {
        "A replacement transaction was underpriced; wait for the pending transaction"
    } else if lower.contains("nonce") {
        "Transaction nonce conflict; a previous transaction is still pending"
    } else if lower.contains("network")
        || lower.contains("connection")
        || lower.contains("timeout")
        || lower.contains("timed out")
    {
        "Network error while submitting the transaction; try again"
    } else {
        "Swap execution failed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenAmount;
    use alloy::primitives::Bytes;

    fn quote(permit2: bool, strategy: Option<ApprovalStrategy>) -> SwapQuote {
        SwapQuote {
            sell_token: Address::repeat_byte(1),
            buy_token: Address::repeat_byte(2),
            sell_amount: TokenAmount::from(1u64),
            buy_amount: TokenAmount::from(2u64),
            min_buy_amount: TokenAmount::from(2u64),
            to: Address::repeat_byte(3),
            data: Bytes::new(),
            value: TokenAmount::ZERO,
            gas: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            allowance_target: None,
            aggregator: "0x".to_string(),
            price_impact: None,
            estimated_gas: None,
            permit2: permit2.then(|| crate::types::Permit2Data {
                kind: "Permit2".to_string(),
                hash: crate::types::HexHash(format!("0x{}", "00".repeat(32))),
                eip712: serde_json::from_value(serde_json::json!({
                    "types": {"Message": [{"name": "x", "type": "uint256"}]},
                    "domain": {},
                    "primaryType": "Message",
                    "message": {"x": "1"}
                }))
                .expect("typed data"),
            }),
            approval_strategy: strategy,
        }
    }

    fn request() -> SwapRequest {
        SwapRequest {
            chain_id: 1,
            sell_token: Address::repeat_byte(1),
            buy_token: Address::repeat_byte(2),
            sell_amount: TokenAmount::from(1u64),
            taker: Address::repeat_byte(9),
            recipient: None,
            slippage: None,
            deadline: None,
            aggregator: None,
            approval_strategy: None,
        }
    }

    #[test]
    fn strategy_resolution_order() {
        // Quote declaration wins.
        assert_eq!(
            effective_strategy(&request(), &quote(true, Some(ApprovalStrategy::AllowanceHolder))),
            ApprovalStrategy::AllowanceHolder
        );
        // Request is next.
        let mut req = request();
        req.approval_strategy = Some(ApprovalStrategy::Permit2);
        assert_eq!(
            effective_strategy(&req, &quote(false, None)),
            ApprovalStrategy::Permit2
        );
        // A permit block implies permit2 when nothing is declared.
        assert_eq!(
            effective_strategy(&request(), &quote(true, None)),
            ApprovalStrategy::Permit2
        );
        assert_eq!(
            effective_strategy(&request(), &quote(false, None)),
            ApprovalStrategy::AllowanceHolder
        );
    }

    #[test]
    fn error_translation_covers_the_taxonomy() {
        let cases = [
            ("insufficient funds for gas * price + value", "Insufficient funds"),
            ("gas required exceeds allowance", "Gas estimation failed"),
            ("execution reverted: slippage check", "slippage tolerance"),
            ("quote deadline passed", "expired"),
            ("replacement transaction underpriced", "replacement"),
            ("nonce too low", "nonce conflict"),
            ("connection reset by peer", "Network error"),
            ("something inscrutable", "Swap execution failed"),
        ];
        for (raw, expected_fragment) in cases {
            let translated = translate_execution_error(raw);
            assert!(
                translated.to_lowercase().contains(&expected_fragment.to_lowercase()),
                "{raw:?} -> {translated:?} missing {expected_fragment:?}"
            );
        }
    }

    #[test]
    fn execution_ids_are_unique_and_prefixed() {
        let a = new_execution_id();
        let b = new_execution_id();
        assert!(a.starts_with("exec_"));
        assert_ne!(a, b);
    }
}

//! Permit2 signing workflow.
//!
//! Aggregators that support gas-less approvals attach an EIP-712 typed-data
//! bundle to their quotes. This module signs that bundle with the caller's
//! per-request secret and splices the signature into the transaction payload
//! using the aggregator's calldata convention:
//!
//! `originalData ∥ uint256_be(len(signature)) ∥ signature`
//!
//! The 32-byte big-endian length prefix is byte-exact; it is the only wire
//! detail this gateway prescribes. The typed data itself (`types`, `domain`,
//! `message`, `primaryType`) is treated as opaque and handed to alloy's
//! dynamic EIP-712 implementation unchanged, including a possible
//! `EIP712Domain` entry inside `types`, which the resolver tolerates.

use alloy::primitives::{Bytes, U256};
use alloy::signers::Signer;
use serde::Serialize;

use crate::chains::parse_signer;
use crate::error::GatewayError;
use crate::types::{Permit2Data, SignerSecret, SwapQuote};

/// Everything produced by processing one Permit2 quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2SignedPayload {
    pub original_tx_data: Bytes,
    /// 0x-prefixed signature hex (65 bytes for an EOA signer).
    pub signature: String,
    pub modified_tx_data: Bytes,
    pub permit2_data: Permit2Data,
}

/// Log-friendly summary of a permit block; never includes the secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2Info {
    #[serde(rename = "type")]
    pub kind: String,
    pub hash: String,
    pub primary_type: String,
    pub domain: serde_json::Value,
    pub message_keys: Vec<String>,
}

/// True iff the adapter attached a typed-data block to the quote.
pub fn has_permit2(quote: &SwapQuote) -> bool {
    quote.permit2.is_some()
}

/// Sign a permit's EIP-712 bundle with the given secret.
///
/// The account is resolved from the secret; the returned signature is an
/// opaque 0x-prefixed hex byte-string.
pub async fn sign_permit2(
    secret: &SignerSecret,
    permit2: &Permit2Data,
) -> Result<String, GatewayError> {
    let signer = parse_signer(secret)?;
    let signature = signer
        .sign_dynamic_typed_data(&permit2.eip712)
        .await
        .map_err(|e| GatewayError::Signing(format!("eip712 signing failed: {e}")))?;
    Ok(format!("0x{}", hex::encode(signature.as_bytes())))
}

/// Concatenate `data ∥ uint256_be(len(sig)) ∥ sig`.
pub fn splice_signature(data: &Bytes, signature_hex: &str) -> Result<Bytes, GatewayError> {
    let signature = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|e| GatewayError::validation(format!("signature is not hex: {e}")))?;
    if signature.is_empty() {
        return Err(GatewayError::validation("signature must not be empty"));
    }
    let length_prefix = U256::from(signature.len()).to_be_bytes::<32>();

    let mut spliced = Vec::with_capacity(data.len() + 32 + signature.len());
    spliced.extend_from_slice(data);
    spliced.extend_from_slice(&length_prefix);
    spliced.extend_from_slice(&signature);
    Ok(Bytes::from(spliced))
}

/// Sign the quote's permit block and splice the signature into its calldata.
///
/// Fails when the quote carries no permit block.
#[tracing::instrument(skip_all, fields(aggregator = %quote.aggregator))]
pub async fn process_permit2_quote(
    quote: &SwapQuote,
    secret: &SignerSecret,
) -> Result<Permit2SignedPayload, GatewayError> {
    let permit2 = quote.permit2.as_ref().ok_or_else(|| {
        GatewayError::validation("quote does not carry a permit2 typed-data block")
    })?;
    let signature = sign_permit2(secret, permit2).await?;
    let modified_tx_data = splice_signature(&quote.data, &signature)?;
    tracing::debug!(
        original_len = quote.data.len(),
        modified_len = modified_tx_data.len(),
        "spliced permit2 signature"
    );
    Ok(Permit2SignedPayload {
        original_tx_data: quote.data.clone(),
        signature,
        modified_tx_data,
        permit2_data: permit2.clone(),
    })
}

/// The quote with its calldata replaced by the signed-and-spliced payload.
pub async fn create_signed_quote(
    quote: &SwapQuote,
    secret: &SignerSecret,
) -> Result<SwapQuote, GatewayError> {
    let processed = process_permit2_quote(quote, secret).await?;
    let mut signed = quote.clone();
    signed.data = processed.modified_tx_data;
    Ok(signed)
}

/// Extract the log-friendly permit summary.
pub fn permit2_info(permit2: &Permit2Data) -> Permit2Info {
    let message_keys = permit2
        .eip712
        .message
        .as_object()
        .map(|object| object.keys().cloned().collect())
        .unwrap_or_default();
    let domain = serde_json::to_value(&permit2.eip712.domain)
        .unwrap_or(serde_json::Value::Null);
    Permit2Info {
        kind: permit2.kind.clone(),
        hash: permit2.hash.to_string(),
        primary_type: permit2.eip712.primary_type.clone(),
        domain,
        message_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::dyn_abi::TypedData;
    use serde_json::json;

    fn sample_permit() -> Permit2Data {
        // A PermitTransferFrom shaped the way the 0x API returns it,
        // EIP712Domain entry included.
        let eip712: TypedData = serde_json::from_value(json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "PermitTransferFrom": [
                    {"name": "permitted", "type": "TokenPermissions"},
                    {"name": "spender", "type": "address"},
                    {"name": "nonce", "type": "uint256"},
                    {"name": "deadline", "type": "uint256"}
                ],
                "TokenPermissions": [
                    {"name": "token", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ]
            },
            "domain": {
                "name": "Permit2",
                "chainId": 1,
                "verifyingContract": "0x000000000022d473030f116ddee9f6b43ac78ba3"
            },
            "primaryType": "PermitTransferFrom",
            "message": {
                "permitted": {
                    "token": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                    "amount": "1000000000000000000"
                },
                "spender": "0x0000000000001ff3684f28c67538d4d072c22734",
                "nonce": "2241959297937691820908574931991586",
                "deadline": "1718669600"
            }
        }))
        .expect("typed data parses");
        Permit2Data {
            kind: "Permit2".to_string(),
            hash: format!("0x{}", "11".repeat(32)).parse().expect("hash"),
            eip712,
        }
    }

    fn secret() -> SignerSecret {
        SignerSecret::new("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
    }

    fn quote_with_data(data: Vec<u8>) -> SwapQuote {
        use crate::types::TokenAmount;
        use alloy::primitives::Address;
        SwapQuote {
            sell_token: Address::repeat_byte(1),
            buy_token: Address::repeat_byte(2),
            sell_amount: TokenAmount::from(1_000u64),
            buy_amount: TokenAmount::from(2_000u64),
            min_buy_amount: TokenAmount::from(1_900u64),
            to: Address::repeat_byte(4),
            data: Bytes::from(data),
            value: TokenAmount::ZERO,
            gas: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            allowance_target: None,
            aggregator: "0x".to_string(),
            price_impact: None,
            estimated_gas: None,
            permit2: None,
            approval_strategy: None,
        }
    }

    #[test]
    fn splice_is_byte_exact() {
        let data = Bytes::from(vec![0xab, 0xcd]);
        let signature = format!("0x{}", "aa".repeat(65));
        let spliced = splice_signature(&data, &signature).expect("splices");

        let expected_hex = format!("abcd{}41{}", "00".repeat(31), "aa".repeat(65));
        assert_eq!(hex::encode(&spliced), expected_hex);
        assert_eq!(spliced.len(), 2 + 32 + 65);
    }

    #[test]
    fn splice_length_prefix_decodes_to_signature_length() {
        let data = Bytes::from(vec![1, 2, 3, 4, 5]);
        let signature = format!("0x{}", "cc".repeat(65));
        let spliced = splice_signature(&data, &signature).expect("splices");

        let prefix = &spliced[data.len()..data.len() + 32];
        let decoded = U256::from_be_slice(prefix);
        assert_eq!(decoded, U256::from(65u64));
    }

    #[test]
    fn splice_rejects_empty_signature() {
        assert!(splice_signature(&Bytes::new(), "0x").is_err());
    }

    #[tokio::test]
    async fn processed_payload_strips_back_to_original() {
        let mut quote = quote_with_data(vec![0xde, 0xad, 0xbe, 0xef]);
        quote.permit2 = Some(sample_permit());

        let processed = process_permit2_quote(&quote, &secret()).await.expect("signs");
        let signature_len = hex::decode(processed.signature.trim_start_matches("0x"))
            .expect("sig hex")
            .len();
        assert_eq!(
            processed.modified_tx_data.len(),
            processed.original_tx_data.len() + 32 + signature_len
        );
        // Stripping the signature and the 32-byte prefix restores the
        // original calldata.
        let stripped =
            &processed.modified_tx_data[..processed.modified_tx_data.len() - 32 - signature_len];
        assert_eq!(stripped, processed.original_tx_data.as_ref());
    }

    #[tokio::test]
    async fn signature_verifies_against_signer_account() {
        let permit = sample_permit();
        let signature_hex = sign_permit2(&secret(), &permit).await.expect("signs");
        let signature_bytes =
            hex::decode(signature_hex.trim_start_matches("0x")).expect("sig hex");
        assert_eq!(signature_bytes.len(), 65);

        let signature = alloy::primitives::Signature::from_raw(&signature_bytes)
            .expect("parses as signature");
        let digest = permit.eip712.eip712_signing_hash().expect("hashable");
        let recovered = signature
            .recover_address_from_prehash(&digest)
            .expect("recovers");
        let expected = parse_signer(&secret()).expect("signer").address();
        assert_eq!(recovered, expected);
    }

    #[tokio::test]
    async fn missing_permit_block_is_rejected() {
        let quote = quote_with_data(vec![0x01]);
        let err = process_permit2_quote(&quote, &secret())
            .await
            .expect_err("no permit block");
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn info_extracts_message_keys() {
        let info = permit2_info(&sample_permit());
        assert_eq!(info.primary_type, "PermitTransferFrom");
        assert!(info.message_keys.contains(&"spender".to_string()));
        assert!(info.message_keys.contains(&"deadline".to_string()));
    }
}

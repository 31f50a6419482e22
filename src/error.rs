//! Error taxonomy for the gateway.
//!
//! Two layers: [`ProviderError`] is what adapters raise when talking to an
//! upstream aggregator, [`GatewayError`] is what the orchestration engine and
//! HTTP surface report to callers. The handlers module maps `GatewayError`
//! onto status codes; adapters map upstream HTTP statuses onto
//! `ProviderError` variants with [`ProviderError::from_status`].

use thiserror::Error;

/// Failure raised by a provider adapter while obtaining quotes, routes, or
/// health from its upstream API.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    /// Upstream answered with a non-success HTTP status.
    #[error("{provider} responded {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Transport-level failure (DNS, TLS, connect, read).
    #[error("network error talking to {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    /// The upstream payload did not match the expected shape.
    #[error("{provider} returned an unexpected payload: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// An opaque quote handle (e.g. an Odos pathId) aged out before use.
    #[error("{provider} quote expired: {message}")]
    QuoteExpired {
        provider: &'static str,
        message: String,
    },

    /// The adapter does not serve this chain.
    #[error("{provider} does not support chain {chain_id}")]
    UnsupportedChain {
        provider: &'static str,
        chain_id: u64,
    },

    /// The adapter was registered without its API credential.
    #[error("{provider} is missing its API key ({env_var})")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    /// An optional capability this adapter does not implement.
    #[error("{provider} does not implement {operation}")]
    UnsupportedOperation {
        provider: &'static str,
        operation: &'static str,
    },
}

impl ProviderError {
    /// Map an upstream HTTP status onto the taxonomy. 4xx statuses describe
    /// our request, 5xx the upstream's condition; both keep the raw message
    /// for operator logs.
    pub fn from_status(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match status {
            400 | 422 => format!("rejected request: {message}"),
            401 | 403 => format!("authentication failed: {message}"),
            404 => format!("unknown resource: {message}"),
            429 => format!("rate limited: {message}"),
            500 | 503 => format!("upstream unavailable: {message}"),
            _ => message,
        };
        ProviderError::Upstream {
            provider,
            status,
            message,
        }
    }

    /// Whether the adapter layer may retry the call.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Upstream { status, .. } => matches!(status, 429 | 500 | 503),
            ProviderError::Network { .. } => true,
            _ => false,
        }
    }
}

/// User-facing failure of a gateway operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// No routing rule matched the request's pair of legs.
    #[error("unroutable swap: {0}")]
    Unroutable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no provider supports chain {chain_id}; supported chains: {supported:?}")]
    NoProviderForChain { chain_id: u64, supported: Vec<u64> },

    /// Every eligible provider was attempted and failed; carries the last
    /// upstream message for the caller.
    #[error("all providers failed, last error: {last_error}")]
    AllProvidersFailed { last_error: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("rpc error on chain {chain_id}: {message}")]
    Rpc { chain_id: u64, message: String },

    #[error("no RPC endpoint configured for chain {0}")]
    NoRpcForChain(u64),

    #[error("signing failed: {0}")]
    Signing(String),

    /// Execution-layer failure, already translated for end users.
    #[error("{user_message}")]
    Execution {
        user_message: String,
        detail: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        GatewayError::Unsupported(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal(message.into())
    }

    /// Short machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Unsupported(_) => "unsupported",
            GatewayError::Unroutable(_) => "unroutable",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::NoProviderForChain { .. } => "no_provider_for_chain",
            GatewayError::AllProvidersFailed { .. } => "all_providers_failed",
            GatewayError::Provider(ProviderError::QuoteExpired { .. }) => "quote_expired",
            GatewayError::Provider(_) => "upstream_api",
            GatewayError::Rpc { .. } => "rpc",
            GatewayError::NoRpcForChain(_) => "no_rpc_for_chain",
            GatewayError::Signing(_) => "signing",
            GatewayError::Execution { .. } => "execution",
            GatewayError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_mapping_marks_retryable() {
        let rate_limited = ProviderError::from_status("0x", 429, "slow down");
        assert!(rate_limited.is_retryable());
        let bad_request = ProviderError::from_status("0x", 400, "bad token");
        assert!(!bad_request.is_retryable());
        let unavailable = ProviderError::from_status("odos", 503, "maintenance");
        assert!(unavailable.is_retryable());
    }

    #[test]
    fn quote_expired_keeps_its_own_code() {
        let err = GatewayError::from(ProviderError::QuoteExpired {
            provider: "odos",
            message: "pathId aged out".to_string(),
        });
        assert_eq!(err.code(), "quote_expired");
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors surfaced by platform API clients.
///
/// `is_retryable` drives the publisher's backoff loop: transport failures,
/// 429 and 5xx responses retry; other 4xx responses are permanent.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{platform} API error ({status}): {message}")]
    Api {
        platform: &'static str,
        status: u16,
        message: String,
    },

    #[error("rate limited by {platform}")]
    RateLimited {
        platform: &'static str,
        retry_after_ms: Option<u64>,
    },

    #[error("access token expired or revoked for {platform}")]
    TokenExpired { platform: &'static str },

    #[error("{platform} does not support {operation}")]
    Unsupported {
        platform: &'static str,
        operation: &'static str,
    },

    #[error("unexpected {platform} response: {source}")]
    BadResponse {
        platform: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing connection metadata for {platform}: {field}")]
    MissingMetadata {
        platform: &'static str,
        field: &'static str,
    },
}

impl ConnectorError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ConnectorError::RateLimited { .. } => true,
            ConnectorError::Api { status, .. } => *status >= 500,
            ConnectorError::TokenExpired { .. }
            | ConnectorError::Unsupported { .. }
            | ConnectorError::BadResponse { .. }
            | ConnectorError::MissingMetadata { .. } => false,
        }
    }

    /// Delay requested by the platform via `Retry-After`, when present.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ConnectorError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Map a non-success response status + body to the right variant.
    pub fn from_status(
        platform: &'static str,
        status: reqwest::StatusCode,
        message: String,
        retry_after_ms: Option<u64>,
    ) -> Self {
        if status.as_u16() == 429 {
            ConnectorError::RateLimited {
                platform,
                retry_after_ms,
            }
        } else if status.as_u16() == 401 {
            ConnectorError::TokenExpired { platform }
        } else {
            ConnectorError::Api {
                platform,
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = ConnectorError::Api {
            platform: "twitter",
            status: 503,
            message: "over capacity".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = ConnectorError::Api {
            platform: "twitter",
            status: 400,
            message: "duplicate tweet".into(),
        };
        assert!(!err.is_retryable());
        assert!(err.retry_after_ms().is_none());
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let err = ConnectorError::from_status(
            "pinterest",
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "slow down".into(),
            Some(2_000),
        );
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), Some(2_000));
    }

    #[test]
    fn unauthorized_maps_to_token_expired() {
        let err = ConnectorError::from_status(
            "linkedin",
            reqwest::StatusCode::UNAUTHORIZED,
            "token revoked".into(),
            None,
        );
        assert!(matches!(err, ConnectorError::TokenExpired { .. }));
        assert!(!err.is_retryable());
    }
}

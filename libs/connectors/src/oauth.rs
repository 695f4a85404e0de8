//! Shared OAuth plumbing: PKCE pair generation and form-encoded token posts.

use base64::prelude::*;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{ConnectorError, Result};
use crate::types::TokenSet;

/// Verifier/challenge pair for the S256 PKCE method.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a PKCE pair: 64-char alphanumeric verifier,
/// challenge = BASE64URL(SHA256(verifier)) without padding.
pub fn generate_pkce() -> PkcePair {
    let verifier: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let challenge = challenge_for(&verifier);
    PkcePair {
        verifier,
        challenge,
    }
}

pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(digest)
}

/// Wire shape most token endpoints share.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl From<TokenResponse> for TokenSet {
    fn from(resp: TokenResponse) -> Self {
        TokenSet::from_expires_in(
            resp.access_token,
            resp.refresh_token,
            resp.expires_in,
            resp.scope,
        )
    }
}

/// POST a form-encoded token request and decode the common response shape.
pub async fn post_token_form(
    http: &Client,
    platform: &'static str,
    url: &str,
    form: &[(&str, &str)],
) -> Result<TokenSet> {
    let response = http.post(url).form(form).send().await?;
    let status = response.status();

    if !status.is_success() {
        let retry_after = retry_after_ms(&response);
        let body = response.text().await.unwrap_or_default();
        return Err(ConnectorError::from_status(platform, status, body, retry_after));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(ConnectorError::Http)?;
    Ok(token.into())
}

/// Parse a `Retry-After` header (seconds form) into milliseconds.
pub fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| secs * 1_000)
}

/// Decode a JSON success body, mapping failures onto the platform error.
pub async fn decode_json<T: serde::de::DeserializeOwned>(
    platform: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let retry_after = retry_after_ms(&response);
        let body = response.text().await.unwrap_or_default();
        return Err(ConnectorError::from_status(platform, status, body, retry_after));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| ConnectorError::BadResponse { platform, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_verifier_is_64_alphanumeric_chars() {
        let pair = generate_pkce();
        assert_eq!(pair.verifier.len(), 64);
        assert!(pair.verifier.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn pkce_challenge_is_s256_of_verifier() {
        // RFC 7636 appendix B test vector
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge_for(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pkce_pairs_are_unique() {
        let a = generate_pkce();
        let b = generate_pkce();
        assert_ne!(a.verifier, b.verifier);
    }

    #[test]
    fn token_response_maps_expiry() {
        let resp = TokenResponse {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_in: Some(3600),
            scope: None,
        };
        let set: TokenSet = resp.into();
        assert_eq!(set.access_token, "at");
        assert!(set.expires_at.is_some());
    }
}

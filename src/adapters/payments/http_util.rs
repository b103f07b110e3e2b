//! Response handling shared by the provider HTTP clients.

use serde::de::DeserializeOwned;

use crate::domain::checkout::{CheckoutError, ProviderKind};

/// Provider error bodies are logged and surfaced; keep them bounded.
const MAX_ERROR_BODY: usize = 512;

pub(super) fn transport_error(provider: ProviderKind) -> impl Fn(reqwest::Error) -> CheckoutError {
    move |err| {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        CheckoutError::provider_api(provider, message)
    }
}

/// Decodes a 2xx JSON body, or turns anything else into a status error.
pub(super) async fn read_json<T: DeserializeOwned>(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<T, CheckoutError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
        tracing::warn!(
            provider = provider.as_str(),
            status = status.as_u16(),
            body = %body,
            "provider API returned an error"
        );
        return Err(CheckoutError::provider_status(provider, status.as_u16(), body));
    }
    response.json::<T>().await.map_err(|e| {
        CheckoutError::provider_api(provider, format!("unexpected response body: {}", e))
    })
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0)
}

//! Status and transport error mapping shared by the HTTP adapters.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};

use crate::credential::Credential;
use crate::error::ProviderError;

const MAX_ERROR_BODY: usize = 512;

/// Map a non-success response onto the closed error set.
pub(crate) async fn error_from_response(response: Response, credential: &Credential) -> ProviderError {
  let status = response.status();
  let retry_after = retry_after(response.headers());
  let body = response.text().await.unwrap_or_default();
  classify_status(status, retry_after, &credential.scrub(&body))
}

pub(crate) fn classify_status(
  status: StatusCode,
  retry_after: Option<Duration>,
  body: &str,
) -> ProviderError {
  let message = format!("{}: {}", status.as_u16(), truncate(body));
  match status.as_u16() {
    401 | 403 => ProviderError::Auth(message),
    429 => ProviderError::RateLimitedUpstream {
      retry_after,
      message,
    },
    400 | 404 | 413 | 422 => ProviderError::InvalidRequest(message),
    // 529 is Anthropic's "overloaded".
    500..=599 => ProviderError::UpstreamUnavailable(message),
    _ => ProviderError::Unknown(message),
  }
}

pub(crate) fn classify_transport(err: reqwest::Error, credential: &Credential) -> ProviderError {
  let message = credential.scrub(&err.to_string());
  if err.is_connect() || err.is_timeout() || err.is_request() {
    ProviderError::UpstreamUnavailable(message)
  } else if err.is_decode() {
    ProviderError::Unknown(format!("malformed response: {}", message))
  } else {
    ProviderError::Unknown(message)
  }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
  headers
    .get(RETRY_AFTER)?
    .to_str()
    .ok()?
    .trim()
    .parse::<u64>()
    .ok()
    .map(Duration::from_secs)
}

fn truncate(body: &str) -> &str {
  if body.len() <= MAX_ERROR_BODY {
    return body;
  }
  let mut end = MAX_ERROR_BODY;
  while !body.is_char_boundary(end) {
    end -= 1;
  }
  &body[..end]
}

//! HTTP query executor (§4.3): issues one `query_range` request with retry
//! classification and returns a normalized result or a canonical sentinel.

use std::error::Error as _;

use reqwest::Client;
use tracing::warn;

use crate::query::types::{
    CleanedData, CleanedResponse, CleanedSeries, QuerySpec, RawResult, WireResponse,
};

const MAX_ATTEMPTS: usize = 3;
const EXCEEDED_MAX_ERROR_TYPE: &str = "bad_data";
const EXCEEDED_MAX_MESSAGE_FRAGMENT: &str = "exceeded maximum resolution";

pub struct Executor {
    client: Client,
}

impl Executor {
    /// Builds the shared HTTP client. The mTLS client certificate, if any,
    /// is baked in once here rather than per request — all chunks of a run
    /// share the same identity.
    pub fn new(cert_path: Option<&str>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(path) = cert_path {
            match std::fs::read(path).and_then(|bytes| {
                reqwest::Identity::from_pem(&bytes)
                    .map_err(|e| std::io::Error::other(e.to_string()))
            }) {
                Ok(identity) => builder = builder.identity(identity),
                Err(e) => warn!(cert = %path, error = %e, "failed to load client certificate"),
            }
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Builds an executor around a caller-supplied client, bypassing
    /// identity loading. Used by tests that need to point at a mock server.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Execute `spec`, applying the retry/classification table from §4.3.
    pub async fn execute(&self, spec: &QuerySpec) -> RawResult {
        let url = spec.url();
        let pairs = spec.as_query_pairs();

        for attempt in 1..=MAX_ATTEMPTS {
            let request = self.client.get(&url).query(&pairs).timeout(spec.timeout);

            match request.send().await {
                Ok(response) => return Self::classify_response(response).await,
                Err(err) if err.is_timeout() && !err.is_connect() => {
                    // Headers already arrived; the backend is mid-stream
                    // and truncating. Stop immediately, don't retry.
                    warn!(%url, "read timeout — treating as EXCEEDED_MAX");
                    return RawResult::ExceededMax;
                }
                Err(err) if err.is_connect() || is_ssl_error(&err) => {
                    warn!(%url, error = %err, attempt, "transient connection error, retrying");
                    if attempt < MAX_ATTEMPTS {
                        continue;
                    }
                    break;
                }
                Err(err) if is_truncation_error(&err) => {
                    warn!(%url, error = %err, "chunked-encoding truncation — treating as EXCEEDED_MAX");
                    return RawResult::ExceededMax;
                }
                Err(err) => {
                    warn!(%url, error = %err, attempt, "request error, retrying");
                    if attempt < MAX_ATTEMPTS {
                        continue;
                    }
                    break;
                }
            }
        }

        warn!(%url, "attempts exhausted — returning EMPTY");
        RawResult::Empty
    }

    async fn classify_response(response: reqwest::Response) -> RawResult {
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(_) => return RawResult::ExceededMax,
        };

        let wire: WireResponse = match serde_json::from_slice(&body) {
            Ok(w) => w,
            Err(_) => {
                warn!("JSON decode error — returning EMPTY");
                return RawResult::Empty;
            }
        };

        match wire.status.as_str() {
            "success" => RawResult::Success(strip_state(wire)),
            "error" => {
                let error_type = wire.error_type.as_deref().unwrap_or("");
                let message = wire.error.as_deref().unwrap_or("");
                if error_type == EXCEEDED_MAX_ERROR_TYPE
                    && message.contains(EXCEEDED_MAX_MESSAGE_FRAGMENT)
                {
                    RawResult::ExceededMax
                } else {
                    RawResult::Empty
                }
            }
            _ => RawResult::Empty,
        }
    }
}

fn is_ssl_error(err: &reqwest::Error) -> bool {
    err.source()
        .map(|s| s.to_string().to_lowercase().contains("ssl"))
        .unwrap_or(false)
}

fn is_truncation_error(err: &reqwest::Error) -> bool {
    err.is_body()
        || err
            .source()
            .map(|s| s.to_string().to_lowercase().contains("chunked"))
            .unwrap_or(false)
}

/// Strip the per-sample state component, keeping only timestamps
/// (§4.6 "Sample-state stripping").
fn strip_state(wire: WireResponse) -> CleanedResponse {
    let data = wire.data.map(|d| CleanedData {
        result_type: d.result_type,
        result: d
            .result
            .into_iter()
            .map(|series| CleanedSeries {
                metric: series.metric,
                values: series.values.into_iter().map(|(ts, _state)| ts).collect(),
            })
            .collect(),
    });

    CleanedResponse {
        status: wire.status,
        data,
    }
}

//! HTTP exchange transport adapter.
//!
//! Sends the exchange request as a JSON POST and pumps the streamed
//! response body through the [`ReplyFrameStream`] decoder into the
//! [`ReplyStream`] the application layer consumes. Exactly one stream
//! per call; the reader task stops after the terminal event or when the
//! consumer loses interest.

use crate::provider::decoder::ReplyFrameStream;
use async_trait::async_trait;
use futures::StreamExt;
use haven_application::ports::transport::{
    ExchangeRequest, ExchangeTransport, ReplyStream, TransportError,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sentinel error string the provider uses to signal server-side quota
/// exhaustion, distinguishing it from generic failure.
pub const QUOTA_EXHAUSTED_SENTINEL: &str = "quota_exhausted";

/// Failure body shape: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map a non-2xx response body to a transport error.
fn classify_failure(status: u16, body: &str) -> TransportError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string());
    if message == QUOTA_EXHAUSTED_SENTINEL {
        return TransportError::QuotaExhausted;
    }
    TransportError::Upstream { status, message }
}

/// Transport to the model provider over HTTP.
pub struct HttpExchangeTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExchangeTransport {
    /// Build a transport for `endpoint`. The client carries no overall
    /// request timeout — replies stream for as long as they stream; the
    /// coordinator's stall timeout covers silence.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ExchangeTransport for HttpExchangeTransport {
    async fn open(&self, request: ExchangeRequest) -> Result<ReplyStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_failure(status.as_u16(), &body);
            warn!(status = status.as_u16(), "exchange request rejected");
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(32);
        let mut frames = ReplyFrameStream::new(response.bytes_stream());
        tokio::spawn(async move {
            while let Some(item) = frames.next().await {
                match item {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        if tx.send(Ok(event)).await.is_err() {
                            // Consumer abandoned the stream.
                            debug!("reply consumer gone; dropping stream");
                            break;
                        }
                        if terminal {
                            break;
                        }
                    }
                    Err(error) => {
                        let _ = tx
                            .send(Err(TransportError::Network(error.to_string())))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(ReplyStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_sentinel_maps_to_quota_exhausted() {
        let error = classify_failure(429, r#"{"error":"quota_exhausted"}"#);
        assert_eq!(error, TransportError::QuotaExhausted);
    }

    #[test]
    fn other_error_bodies_map_to_upstream() {
        let error = classify_failure(500, r#"{"error":"model overloaded"}"#);
        assert_eq!(
            error,
            TransportError::Upstream {
                status: 500,
                message: "model overloaded".to_string()
            }
        );
    }

    #[test]
    fn unparseable_bodies_are_passed_through_verbatim() {
        let error = classify_failure(502, "Bad Gateway");
        assert_eq!(
            error,
            TransportError::Upstream {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }
}

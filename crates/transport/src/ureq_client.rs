//! Blocking HTTP transport backed by ureq
//!
//! Provides:
//! - ureq agent construction with a global timeout
//! - Basic credentials rendered as an `Authorization` header
//! - Status codes >= 400 returned as responses, not errors, so store error
//!   bodies reach the classifier

use crate::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use base64::Engine as _;
use parking_lot::Mutex;
use std::time::Duration;

/// Transport that issues real HTTP requests
pub struct UreqTransport {
    timeout: Duration,
    agent: Mutex<ureq::Agent>,
}

impl UreqTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            agent: Mutex::new(build_agent(timeout)),
        }
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

/// `Authorization` header value for basic credentials
pub fn basic_authorization(user: &str, password: &str) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    format!("Basic {}", token)
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
) -> ureq::RequestBuilder<B> {
    if let Some(creds) = &request.endpoint.credentials {
        builder = builder.header(
            "Authorization",
            basic_authorization(&creds.user, &creds.password).as_str(),
        );
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_error(e: ureq::Error) -> TransportError {
    match e {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => TransportError::Timeout,
        other => TransportError::Network(other.to_string()),
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url();
        let agent = self.agent.lock().clone();
        let body: &[u8] = request.body.as_deref().unwrap_or(&[]);

        let result = match request.method {
            Method::Get => with_headers(agent.get(url.as_str()), request).call(),
            Method::Head => with_headers(agent.head(url.as_str()), request).call(),
            Method::Delete => with_headers(agent.delete(url.as_str()), request).call(),
            Method::Put => with_headers(agent.put(url.as_str()), request).send(body),
            Method::Post => with_headers(agent.post(url.as_str()), request).send(body),
        };
        let mut response = result.map_err(map_error)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let bytes = if request.method == Method::Head {
            Vec::new()
        } else {
            response
                .body_mut()
                .read_to_vec()
                .map_err(|e| TransportError::Read(e.to_string()))?
        };

        tracing::trace!(
            target: "settee::transport",
            method = %request.method,
            url = %url,
            status = status.as_u16(),
            "response received"
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
        })
    }

    fn reset(&self) {
        *self.agent.lock() = build_agent(self.timeout);
    }
}

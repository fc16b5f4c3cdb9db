//! Connection management
//!
//! Establishes a session with the store using the configured strategy:
//! - `basic`: credentials ride on every request's endpoint; `GET /` must succeed
//! - `cookie`: `POST /_session` must answer `{"ok": true}`; the session cookie
//!   is replayed on every request
//! - `none`: nothing to negotiate
//!
//! Every failure while connecting is folded into
//! [`SourceError::MissingConnection`].

use crate::config::{AuthStrategy, SourceConfig};
use parking_lot::Mutex;
use serde_json::Value;
use settee_core::classify::decode_body;
use settee_core::{ErrorSet, Result, SourceError};
use settee_transport::{Credentials, Endpoint, HttpRequest, Method, Transport};
use std::sync::Arc;
use tracing::{info, warn};

/// Negotiated session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Endpoint, with basic credentials when that strategy is in use
    pub endpoint: Endpoint,
    /// `Cookie` header value for cookie sessions
    pub cookie: Option<String>,
}

impl Session {
    /// Start a request carrying this session's addressing and cookie
    pub fn request(&self, method: Method, path: impl Into<String>) -> HttpRequest {
        let request = HttpRequest::new(method, self.endpoint.clone(), path);
        match &self.cookie {
            Some(cookie) => request.with_header("Cookie", cookie.clone()),
            None => request,
        }
    }
}

#[derive(Debug, Default)]
struct ConnState {
    connected: bool,
    session: Option<Session>,
}

fn missing(reason: impl Into<String>) -> SourceError {
    SourceError::MissingConnection {
        reason: reason.into(),
    }
}

/// Owns the session with the store
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    state: Mutex<ConnState>,
}

impl ConnectionManager {
    /// Manager over `transport`; not connected yet
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(ConnState::default()),
        }
    }

    /// Underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// True once a session is established
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Current session, if connected
    pub fn session(&self) -> Option<Session> {
        let state = self.state.lock();
        if state.connected {
            state.session.clone()
        } else {
            None
        }
    }

    /// Establish a session. No-op when already connected.
    pub fn connect(&self, config: &SourceConfig) -> Result<bool> {
        let mut state = self.state.lock();
        if state.connected {
            return Ok(true);
        }

        let strategy = config.auth_strategy().map_err(|e| missing(e.to_string()))?;
        let session = match strategy {
            AuthStrategy::Basic => self.basic_auth(config),
            AuthStrategy::Cookie => self.cookie_auth(config),
            AuthStrategy::None => Ok(Session {
                endpoint: config.endpoint(),
                cookie: None,
            }),
        };

        match session {
            Ok(session) => {
                info!(
                    target: "settee::connection",
                    host = %session.endpoint.host,
                    port = session.endpoint.port,
                    strategy = ?strategy,
                    "connected"
                );
                state.session = Some(session);
                state.connected = true;
                Ok(true)
            }
            Err(e) => {
                warn!(target: "settee::connection", error = %e, "connect failed");
                Err(e)
            }
        }
    }

    /// Drop the session. Idempotent; always returns true.
    pub fn disconnect(&self) -> bool {
        let mut state = self.state.lock();
        if state.connected {
            self.transport.reset();
            info!(target: "settee::connection", "disconnected");
        }
        state.connected = false;
        state.session = None;
        true
    }

    fn send_probe(&self, request: &HttpRequest) -> Result<Value> {
        let response = self
            .transport
            .send(request)
            .map_err(|e| missing(e.to_string()))?;
        let decoded = decode_body(&response.body);
        let errors = ErrorSet::classify(response.status, &response.reason, &decoded);
        if errors.is_error() {
            return Err(missing(errors.describe()));
        }
        Ok(decoded.unwrap_or(Value::Null))
    }

    fn with_config_headers(config: &SourceConfig, mut request: HttpRequest) -> HttpRequest {
        for (name, value) in &config.request.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        request
    }

    fn basic_auth(&self, config: &SourceConfig) -> Result<Session> {
        let mut endpoint = config.endpoint();
        if let Some(user) = &config.login {
            endpoint.credentials = Some(Credentials {
                user: user.clone(),
                password: config.password.clone().unwrap_or_default(),
            });
        }

        let probe = Self::with_config_headers(
            config,
            HttpRequest::new(Method::Get, endpoint.clone(), "/"),
        );
        // Any decodable, non-error answer from the root counts as reachable.
        self.send_probe(&probe)?;

        Ok(Session {
            endpoint,
            cookie: None,
        })
    }

    fn cookie_auth(&self, config: &SourceConfig) -> Result<Session> {
        let endpoint = config.endpoint();
        let form = format!(
            "name={}&password={}",
            urlencoding::encode(config.login.as_deref().unwrap_or_default()),
            urlencoding::encode(config.password.as_deref().unwrap_or_default())
        );
        let request = Self::with_config_headers(
            config,
            HttpRequest::new(Method::Post, endpoint.clone(), "/_session"),
        )
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body(form.into_bytes());

        let response = self
            .transport
            .send(&request)
            .map_err(|e| missing(e.to_string()))?;
        let decoded = decode_body(&response.body);
        let errors = ErrorSet::classify(response.status, &response.reason, &decoded);
        if errors.is_error() {
            return Err(missing(errors.describe()));
        }
        let confirmed = decoded
            .ok()
            .and_then(|body| body.get("ok").and_then(Value::as_bool))
            .unwrap_or(false);
        if !confirmed {
            return Err(missing("session endpoint did not confirm the login"));
        }

        let cookie = response
            .header("Set-Cookie")
            .and_then(|raw| raw.split(';').next())
            .map(|pair| pair.trim().to_string())
            .filter(|pair| !pair.is_empty());

        Ok(Session { endpoint, cookie })
    }
}

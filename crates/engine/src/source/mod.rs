//! CouchSource: the document source over a CouchDB-style store
//!
//! Every store call goes through [`CouchSource::query`], which:
//! 1. connects lazily
//! 2. sends the request with session credentials and configured headers
//! 3. classifies the response
//! 4. records it in the query log
//! 5. aborts with [`SourceError::Fatal`] on a fatal classification
//!
//! Non-fatal classifications come back inside the [`StoreResponse`] for the
//! caller to turn into [`Outcome::Rejected`](settee_core::Outcome::Rejected).
//!
//! Operations are split by concern:
//! - `read`: translated queries and counts
//! - `mutate`: create, update, delete
//! - `revision`: HEAD-based revision lookup

mod mutate;
mod read;
mod revision;

use crate::config::{ConfigPatch, SourceConfig};
use crate::connection::ConnectionManager;
use crate::query_log::{QueryLog, QueryLogReport};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use settee_core::classify::decode_body;
use settee_core::{EntityModel, ErrorSet, Result, SourceError};
use settee_transport::{HttpRequest, Method, Transport};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Decoded and classified store response
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Decoded body; `Null` when empty or undecodable
    pub body: Value,
    /// Classification of this response
    pub errors: ErrorSet,
}

impl StoreResponse {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True when the body carries `"ok": true`
    pub fn is_ok(&self) -> bool {
        self.body.get("ok").and_then(Value::as_bool) == Some(true)
    }

    /// True when the request succeeded and the store confirmed it
    pub fn confirmed(&self) -> bool {
        !self.errors.is_error() && self.is_ok()
    }
}

/// Path of one document (`/{db}/{id}`), with the id escaped
pub(crate) fn document_path(database: &str, id: &str) -> String {
    format!("/{}/{}", database, urlencoding::encode(id))
}

/// Document source backed by a CouchDB-style REST store
///
/// Thread-safe: configuration, connection state, the query log and the
/// database listing cache are each behind their own lock.
pub struct CouchSource {
    config: RwLock<SourceConfig>,
    connection: ConnectionManager,
    log: QueryLog,
    databases: Mutex<Option<Vec<String>>>,
}

impl CouchSource {
    /// Open a source over `transport`.
    ///
    /// Connects immediately when `auto_connect` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the automatic
    /// connection fails.
    pub fn open(config: SourceConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let source = Self {
            log: QueryLog::new(config.query_log_max),
            connection: ConnectionManager::new(transport),
            config: RwLock::new(config),
            databases: Mutex::new(None),
        };
        if source.config.read().auto_connect {
            source.connect()?;
        }
        Ok(source)
    }

    /// Open a source over a blocking HTTP client with the configured timeout.
    ///
    /// The timeout is fixed for the life of the source.
    #[cfg(feature = "ureq-transport")]
    pub fn with_ureq(config: SourceConfig) -> Result<Self> {
        let timeout = std::time::Duration::from_millis(config.request.timeout_ms);
        let transport = settee_transport::UreqTransport::new(timeout);
        Self::open(config, Arc::new(transport))
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> SourceConfig {
        self.config.read().clone()
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// True once a session is established
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Establish the session if needed
    pub fn connect(&self) -> Result<bool> {
        let config = self.config.read();
        self.connection.connect(&config)
    }

    /// Drop the session; idempotent
    pub fn disconnect(&self) -> bool {
        self.connection.disconnect()
    }

    /// Alias of [`disconnect`](Self::disconnect)
    pub fn close(&self) -> bool {
        self.disconnect()
    }

    /// Disconnect, merge `patch` over the configuration, forget cached
    /// listings and connect again.
    ///
    /// The new query log bound applies at once. The request timeout belongs
    /// to the transport and is unaffected.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the merged configuration does not
    /// validate; the source then keeps its previous configuration and session.
    pub fn reconnect(&self, patch: ConfigPatch) -> Result<bool> {
        let mut next = self.config();
        next.apply(patch);
        next.validate()?;

        self.disconnect();
        self.log.set_max(next.query_log_max);
        *self.config.write() = next;
        *self.databases.lock() = None;
        self.connect()
    }

    // ========================================================================
    // Query log
    // ========================================================================

    /// The request log
    pub fn query_log(&self) -> &QueryLog {
        &self.log
    }

    /// Read the request log, see [`QueryLog::drain`]
    pub fn drain_log(&self, sorted: bool, clear: bool) -> QueryLogReport {
        self.log.drain(sorted, clear)
    }

    // ========================================================================
    // Databases
    // ========================================================================

    /// Escaped database name for `model`: its override, else the configured one
    pub fn database_for(&self, model: &EntityModel) -> Result<String> {
        self.config.read().database_path(model.database.as_deref())
    }

    /// Names of all databases on the server, cached until
    /// [`reconnect`](Self::reconnect).
    pub fn list_databases(&self) -> Result<Vec<String>> {
        if let Some(cached) = self.databases.lock().as_ref() {
            return Ok(cached.clone());
        }

        let response = self.query(Method::Get, "/_all_dbs", &[], None)?;
        if response.errors.is_error() {
            return Err(SourceError::Transport {
                reason: response.errors.describe(),
            });
        }
        let names: Vec<String> = response
            .body
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        *self.databases.lock() = Some(names.clone());
        Ok(names)
    }

    // ========================================================================
    // Request execution
    // ========================================================================

    /// Send one request to the store and classify the answer.
    ///
    /// # Errors
    ///
    /// - `MissingConnection` when the lazy connect fails
    /// - `Transport` when no response was received
    /// - `Fatal` when the response classifies as fatal
    pub fn query(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<StoreResponse> {
        self.connect()?;
        let session = self
            .connection
            .session()
            .ok_or_else(|| SourceError::MissingConnection {
                reason: "session dropped while sending".to_string(),
            })?;

        let request = self.build_request(session.request(method, path), params, body)?;
        let url = request.path_and_query();
        let logged_params = match body {
            Some(body) => body.to_string(),
            None => String::new(),
        };

        let started = Instant::now();
        let sent = self.connection.transport().send(&request);
        let took_ms = started.elapsed().as_millis() as u64;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let reason = e.to_string();
                self.record(method, &url, &logged_params, took_ms, &reason);
                warn!(target: "settee::source", %method, %url, error = %reason, "request failed");
                return Err(SourceError::Transport { reason });
            }
        };

        let decoded = decode_body(&response.body);
        let errors = ErrorSet::classify(response.status, &response.reason, &decoded);
        let description = errors.describe();
        self.record(method, &url, &logged_params, took_ms, &description);
        debug!(
            target: "settee::source",
            %method,
            %url,
            status = response.status,
            took_ms,
            "request"
        );

        if errors.is_fatal() {
            warn!(target: "settee::source", %method, %url, error = %description, "fatal store error");
            return Err(SourceError::Fatal { description });
        }

        Ok(StoreResponse {
            status: response.status,
            headers: response.headers,
            body: decoded.unwrap_or(Value::Null),
            errors,
        })
    }

    fn build_request(
        &self,
        mut request: HttpRequest,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpRequest> {
        for (name, value) in params {
            request = request.with_query(name.clone(), value.clone());
        }
        for (name, value) in &self.config.read().request.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if let Some(body) = body {
            request = request
                .with_header("Content-Type", "application/json")
                .with_body(serde_json::to_vec(body)?);
        }
        Ok(request)
    }

    fn record(&self, method: Method, url: &str, params: &str, took_ms: u64, error: &str) {
        if self.config.read().log_queries {
            self.log.record(method.as_str(), url, params, took_ms, error);
        }
    }

    /// Inject the entity-kind tag when tagging is on and the field is absent
    fn tag_kind(&self, model: &EntityModel, fields: &mut settee_core::FieldMap) {
        let config = self.config.read();
        if config.tag_kind && !fields.contains_key(&config.kind_field) {
            fields.insert(config.kind_field.clone(), Value::String(model.kind()));
        }
    }
}

//! Source configuration via `settee.toml`
//!
//! One explicit struct replaces open-ended nested option maps. Two legacy
//! top-level aliases are still accepted and translated into the `[request]`
//! table: `host` → `request.host`, `port` → `request.port`.
//! Reconnecting with new settings goes through [`ConfigPatch`], which merges
//! field by field over the current configuration.

use serde::{Deserialize, Serialize};
use settee_core::{Result, SourceError};
use settee_transport::Endpoint;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "settee.toml";

/// Authentication strategy used when connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Credentials attached to every request, reachability probe on `/`
    Basic,
    /// Session cookie obtained from `POST /_session`
    Cookie,
    /// Unauthenticated store
    None,
}

/// Addressing and transport settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestConfig {
    /// `http` or `https`
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Store host
    #[serde(default = "default_host")]
    pub host: String,
    /// Store port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Global request timeout in milliseconds (default: 30000).
    ///
    /// Read once when the HTTP transport is built; reconnecting keeps the
    /// transport and its timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra headers sent with every request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5984
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            headers: BTreeMap::new(),
        }
    }
}

/// Document source configuration loaded from `settee.toml`.
///
/// # Example
///
/// ```toml
/// database = "blog"
/// # "basic" (default), "cookie" or "none"
/// auth = "cookie"
/// login = "admin"
/// password = "secret"
///
/// [request]
/// host = "couch.internal"
/// port = 5984
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Default database for every entity without an override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Authentication strategy: `"basic"`, `"cookie"` or `"none"`
    #[serde(default = "default_auth")]
    pub auth: String,
    /// Login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Field holding the entity-kind tag
    #[serde(default = "default_kind_field")]
    pub kind_field: String,
    /// Tag new documents with their entity kind
    #[serde(default = "default_true")]
    pub tag_kind: bool,
    /// Record requests in the query log
    #[serde(default = "default_true")]
    pub log_queries: bool,
    /// Maximum number of entries kept in the query log
    #[serde(default = "default_query_log_max")]
    pub query_log_max: usize,
    /// Connect as soon as the source is opened
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    /// Addressing and transport settings
    #[serde(default)]
    pub request: RequestConfig,
}

fn default_auth() -> String {
    "basic".to_string()
}

fn default_kind_field() -> String {
    "type".to_string()
}

fn default_true() -> bool {
    true
}

fn default_query_log_max() -> usize {
    200
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("database", &self.database)
            .field("auth", &self.auth)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("kind_field", &self.kind_field)
            .field("tag_kind", &self.tag_kind)
            .field("log_queries", &self.log_queries)
            .field("query_log_max", &self.query_log_max)
            .field("auto_connect", &self.auto_connect)
            .field("request", &self.request)
            .finish()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: None,
            auth: default_auth(),
            login: None,
            password: None,
            kind_field: default_kind_field(),
            tag_kind: true,
            log_queries: true,
            query_log_max: default_query_log_max(),
            auto_connect: true,
            request: RequestConfig::default(),
        }
    }
}

impl SourceConfig {
    /// Configuration for `database` on the default local endpoint
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::default()
        }
    }

    /// Parse the auth string into an `AuthStrategy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"basic"`, `"cookie"` or `"none"`.
    pub fn auth_strategy(&self) -> Result<AuthStrategy> {
        match self.auth.as_str() {
            "basic" => Ok(AuthStrategy::Basic),
            "cookie" => Ok(AuthStrategy::Cookie),
            "none" => Ok(AuthStrategy::None),
            other => Err(SourceError::invalid_config(format!(
                "Invalid auth strategy '{}'. Expected \"basic\", \"cookie\" or \"none\".",
                other
            ))),
        }
    }

    /// Check values that serde cannot check.
    pub fn validate(&self) -> Result<()> {
        self.auth_strategy()?;
        if self.request.port == 0 {
            return Err(SourceError::invalid_config("port must be non-zero"));
        }
        if self.request.host.is_empty() {
            return Err(SourceError::invalid_config("host must not be empty"));
        }
        Ok(())
    }

    /// Endpoint of the store, without credentials
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.request.scheme.clone(),
            self.request.host.clone(),
            self.request.port,
        )
    }

    /// Path-escaped database name for an entity (`/` becomes `%2F`).
    ///
    /// # Errors
    ///
    /// Returns an error when neither the entity nor the configuration names a
    /// database.
    pub fn database_path(&self, entity_database: Option<&str>) -> Result<String> {
        let name = entity_database
            .or(self.database.as_deref())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SourceError::invalid_config("no database configured"))?;
        Ok(name.replace('/', "%2F"))
    }

    /// Merge `patch` over this configuration.
    ///
    /// Legacy `host`/`port` aliases are applied after the `[request]` table,
    /// so they win when both are given.
    pub fn apply(&mut self, patch: ConfigPatch) {
        let ConfigPatch {
            database,
            auth,
            login,
            password,
            kind_field,
            tag_kind,
            log_queries,
            query_log_max,
            auto_connect,
            host,
            port,
            request,
        } = patch;

        if database.is_some() {
            self.database = database;
        }
        if let Some(auth) = auth {
            self.auth = auth;
        }
        if login.is_some() {
            self.login = login;
        }
        if password.is_some() {
            self.password = password;
        }
        if let Some(field) = kind_field {
            self.kind_field = field;
        }
        if let Some(v) = tag_kind {
            self.tag_kind = v;
        }
        if let Some(v) = log_queries {
            self.log_queries = v;
        }
        if let Some(v) = query_log_max {
            self.query_log_max = v;
        }
        if let Some(v) = auto_connect {
            self.auto_connect = v;
        }

        if let Some(req) = request {
            if let Some(scheme) = req.scheme {
                self.request.scheme = scheme;
            }
            if let Some(h) = req.host {
                self.request.host = h;
            }
            if let Some(p) = req.port {
                self.request.port = p;
            }
            if let Some(t) = req.timeout_ms {
                self.request.timeout_ms = t;
            }
            if let Some(headers) = req.headers {
                self.request.headers.extend(headers);
            }
        }

        // legacy aliases
        if let Some(h) = host {
            self.request.host = h;
        }
        if let Some(p) = port {
            self.request.port = p;
        }
    }

    /// Parse TOML, accepting legacy aliases.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let patch: ConfigPatch = toml::from_str(content)
            .map_err(|e| SourceError::invalid_config(format!("Failed to parse config: {}", e)))?;
        let mut config = SourceConfig::default();
        config.apply(patch);
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SourceError::invalid_config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SourceError::InvalidConfig { reason } => SourceError::invalid_config(format!(
                "{} ({})",
                reason,
                path.display()
            )),
            other => other,
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            SourceError::invalid_config(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path, content).map_err(|e| {
            SourceError::invalid_config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Partial configuration merged by [`SourceConfig::apply`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigPatch {
    /// Default database
    pub database: Option<String>,
    /// Authentication strategy
    pub auth: Option<String>,
    /// Login name
    pub login: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Entity-kind field
    pub kind_field: Option<String>,
    /// Tag new documents with their entity kind
    pub tag_kind: Option<bool>,
    /// Record requests in the query log
    pub log_queries: Option<bool>,
    /// Query log bound
    pub query_log_max: Option<usize>,
    /// Connect on open
    pub auto_connect: Option<bool>,
    /// Legacy alias for `request.host`
    pub host: Option<String>,
    /// Legacy alias for `request.port`
    pub port: Option<u16>,
    /// `[request]` table
    pub request: Option<RequestPatch>,
}

/// Partial `[request]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestPatch {
    /// Scheme
    pub scheme: Option<String>,
    /// Host
    pub host: Option<String>,
    /// Port
    pub port: Option<u16>,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Headers, merged key by key
    pub headers: Option<BTreeMap<String, String>>,
}

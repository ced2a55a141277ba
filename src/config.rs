//! Environment-sourced server configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `MONITORING_METRICS_ENDPOINT` | `http://0.0.0.0:8080/metrics` |
//! | `MONITORING_API_TOKEN` | empty (authentication disabled) |
//! | `MONITORING_WS_PORT` | `9002` |
//! | `MONITORING_WS_MAX_CLIENTS` | `32`, at most `4096` |
//! | `ROOTFS_MOUNT_PATH` | `/rootfs` |
//! | `MONITORING_CONTAINER_CLI` | `docker` |
//!
//! Invalid values never abort startup; they are logged and replaced by the default.

use std::path::PathBuf;

pub const DEFAULT_METRICS_ENDPOINT: &str = "http://0.0.0.0:8080/metrics";
pub const DEFAULT_WS_PORT: u16 = 9002;
pub const DEFAULT_MAX_SESSIONS: usize = 32;
pub const MAX_SESSIONS_LIMIT: usize = 4096;
pub const DEFAULT_ROOTFS: &str = "/rootfs";
pub const DEFAULT_CONTAINER_CLI: &str = "docker";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid endpoint `{0}`: expected http://host:port/path")]
    InvalidEndpoint(String),
    #[error("invalid port `{0}`")]
    InvalidPort(String),
    #[error("invalid session limit `{0}`: expected a positive integer")]
    InvalidSessionLimit(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where the request/response endpoint listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `host:port`, suitable for binding.
    pub addr: String,
    /// Route path, always starting with `/`.
    pub path: String,
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidEndpoint(s.to_string());
        let rest = match s.split_once("://") {
            Some(("http", rest)) => rest,
            Some(_) => return Err(invalid()),
            None => s,
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };
        let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || !matches!(port.parse::<u16>(), Ok(p) if p > 0) {
            return Err(invalid());
        }

        Ok(Self {
            addr: authority.to_string(),
            path: path.to_string(),
        })
    }
}

/// Parses a listening port in `1..=65535`.
pub fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::InvalidPort(raw.to_string())),
    }
}

/// Parses the session limit. Zero and non-numbers are errors; large values
/// are clamped to [`MAX_SESSIONS_LIMIT`].
pub fn parse_session_limit(raw: &str) -> Result<usize> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::InvalidSessionLimit(raw.to_string())),
        Ok(n) => Ok(usize::try_from(n).map_or(MAX_SESSIONS_LIMIT, |n| n.min(MAX_SESSIONS_LIMIT))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub metrics_endpoint: Endpoint,
    /// Empty disables authentication.
    pub api_token: String,
    pub ws_port: u16,
    pub max_sessions: usize,
    pub rootfs: PathBuf,
    pub container_cli: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_endpoint: Endpoint {
                addr: "0.0.0.0:8080".to_string(),
                path: "/metrics".to_string(),
            },
            api_token: String::new(),
            ws_port: DEFAULT_WS_PORT,
            max_sessions: DEFAULT_MAX_SESSIONS,
            rootfs: PathBuf::from(DEFAULT_ROOTFS),
            container_cli: DEFAULT_CONTAINER_CLI.to_string(),
        }
    }
}

fn or_default<T>(variable: &str, parsed: Result<T>, default: T) -> T {
    parsed.unwrap_or_else(|err| {
        log::warn!("{variable}: {err}; using default");
        default
    })
}

impl ServerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Unset and empty variables take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let metrics_endpoint = match get("MONITORING_METRICS_ENDPOINT") {
            Some(raw) => or_default("MONITORING_METRICS_ENDPOINT", raw.parse(), defaults.metrics_endpoint),
            None => defaults.metrics_endpoint,
        };
        let ws_port = match get("MONITORING_WS_PORT") {
            Some(raw) => or_default("MONITORING_WS_PORT", parse_port(&raw), defaults.ws_port),
            None => defaults.ws_port,
        };
        let max_sessions = match get("MONITORING_WS_MAX_CLIENTS") {
            Some(raw) => or_default(
                "MONITORING_WS_MAX_CLIENTS",
                parse_session_limit(&raw),
                defaults.max_sessions,
            ),
            None => defaults.max_sessions,
        };

        Self {
            metrics_endpoint,
            api_token: lookup("MONITORING_API_TOKEN").unwrap_or_default(),
            ws_port,
            max_sessions,
            rootfs: get("ROOTFS_MOUNT_PATH").map_or(defaults.rootfs, PathBuf::from),
            container_cli: get("MONITORING_CONTAINER_CLI").unwrap_or(defaults.container_cli),
        }
    }

    /// `0.0.0.0:<ws_port>`.
    pub fn ws_addr(&self) -> String {
        format!("0.0.0.0:{}", self.ws_port)
    }
}

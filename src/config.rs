// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into
//! [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the JSON ledgers and audit log | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `RPC_URL` | Ledger JSON-RPC endpoint | `https://api.testnet.sonic.game` |
//! | `PROGRAM_ID` | Escrow program address (base58) | Required |
//! | `SERVER_SECRET_KEY` | Service keypair (base58 or JSON byte array) | Required |
//! | `OPENAI_API_KEY` | Dialogue service API key | Required |
//! | `OPENAI_BASE_URL` | Dialogue service base URL | `https://api.openai.com` |
//! | `OPENAI_MODEL` | Dialogue model | `gpt-3.5-turbo` |
//! | `DEFAULT_TEMPLATE_ID` | Template for auto-opened channels | `default` |
//! | `WATCH_POLL_INTERVAL_MS` | Ledger watcher slot poll interval | `2000` |
//! | `UPSTREAM_TIMEOUT_SECS` | Bound on every escrow/dialogue call | `20` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::Pubkey;
use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const PROGRAM_ID_ENV: &str = "PROGRAM_ID";
pub const SERVER_SECRET_KEY_ENV: &str = "SERVER_SECRET_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub const DEFAULT_TEMPLATE_ID_ENV: &str = "DEFAULT_TEMPLATE_ID";
pub const WATCH_POLL_INTERVAL_MS_ENV: &str = "WATCH_POLL_INTERVAL_MS";
pub const UPSTREAM_TIMEOUT_SECS_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_RPC_URL: &str = "https://api.testnet.sonic.game";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPLATE_ID: &str = "default";
pub const DEFAULT_WATCH_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 20;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub rpc_url: String,
    pub program_id: Pubkey,
    /// Raw keypair text; decoded by [`crate::blockchain::keys::load_keypair`].
    pub server_secret_key: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub default_template_id: String,
    pub watch_poll_interval: Duration,
    pub upstream_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("bind_addr", &self.bind_addr)
            .field("rpc_url", &self.rpc_url)
            .field("program_id", &self.program_id)
            .field("server_secret_key", &"[redacted]")
            .field("openai_api_key", &"[redacted]")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("default_template_id", &self.default_template_id)
            .field("watch_poll_interval", &self.watch_poll_interval)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let rpc_url = validate_url(
            RPC_URL_ENV,
            get(RPC_URL_ENV).unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
        )?;
        let openai_base_url = validate_url(
            OPENAI_BASE_URL_ENV,
            get(OPENAI_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        )?;

        let program_id = required(PROGRAM_ID_ENV)?
            .trim()
            .parse::<Pubkey>()
            .map_err(|e| ConfigError::Invalid {
                name: PROGRAM_ID_ENV,
                reason: e.to_string(),
            })?;

        let poll_ms = parse_or(
            get(WATCH_POLL_INTERVAL_MS_ENV),
            WATCH_POLL_INTERVAL_MS_ENV,
            DEFAULT_WATCH_POLL_INTERVAL_MS,
        )?;
        let timeout_secs = parse_or(
            get(UPSTREAM_TIMEOUT_SECS_ENV),
            UPSTREAM_TIMEOUT_SECS_ENV,
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: UPSTREAM_TIMEOUT_SECS_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DATA_ROOT)),
            bind_addr,
            rpc_url,
            program_id,
            server_secret_key: required(SERVER_SECRET_KEY_ENV)?,
            openai_api_key: required(OPENAI_API_KEY_ENV)?,
            openai_base_url,
            openai_model: get(OPENAI_MODEL_ENV).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            default_template_id: get(DEFAULT_TEMPLATE_ID_ENV)
                .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string()),
            watch_poll_interval: Duration::from_millis(poll_ms.max(1)),
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn validate_url(name: &'static str, raw: String) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim().trim_end_matches('/').to_string()),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host configuration.

use std::net::SocketAddr;

use tessera_admin::Config as AdminConfig;
use tessera_esign::EsignConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Which demo back office to serve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppKind {
    /// Generic admin with CMS panels.
    Web,
    /// Store with products, orders and a restock job.
    #[default]
    Commerce,
    /// E-signature agreements and job runs.
    Esign,
}

impl AppKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "web" => Some(Self::Web),
            "commerce" => Some(Self::Commerce),
            "esign" => Some(Self::Esign),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Commerce => "commerce",
            Self::Esign => "esign",
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address
    pub bind_addr: SocketAddr,
    /// Demo application
    pub app: AppKind,
    /// SQLite URL for the esign stores; in-memory stores when unset
    pub esign_database_url: Option<String>,
    /// Admin settings
    pub admin: AdminConfig,
    /// E-sign settings
    pub esign: EsignConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `TESSERA_BIND_ADDR`: listen address (default: `0.0.0.0:8080`)
    /// - `TESSERA_APP`: `web`, `commerce` or `esign` (default: `commerce`)
    /// - `TESSERA_ESIGN_DATABASE_URL`: SQLite URL for the esign stores
    ///
    /// Admin (`TESSERA_ADMIN_*`) and e-sign (`ESIGN_*`) variables are read by
    /// their own crates.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = std::env::var("TESSERA_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("TESSERA_BIND_ADDR", "must be host:port"))?;

        let app = match std::env::var("TESSERA_APP") {
            Ok(value) if !value.trim().is_empty() => AppKind::parse(&value).ok_or(
                ConfigError::Invalid("TESSERA_APP", "must be one of web, commerce, esign"),
            )?,
            _ => AppKind::default(),
        };

        let esign_database_url = std::env::var("TESSERA_ESIGN_DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            bind_addr,
            app,
            esign_database_url,
            admin: AdminConfig::from_env()?,
            esign: EsignConfig::from_env()?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    #[error(transparent)]
    Admin(#[from] tessera_admin::config::ConfigError),

    #[error(transparent)]
    Esign(#[from] tessera_esign::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serializes tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.remove("TESSERA_BIND_ADDR");
        guard.remove("TESSERA_APP");
        guard.remove("TESSERA_ESIGN_DATABASE_URL");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.app, AppKind::Commerce);
        assert!(config.esign_database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("TESSERA_BIND_ADDR", "127.0.0.1:9000");
        guard.set("TESSERA_APP", "ESign");
        guard.set("TESSERA_ESIGN_DATABASE_URL", "sqlite://esign.db");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.app, AppKind::Esign);
        assert_eq!(config.esign_database_url.as_deref(), Some("sqlite://esign.db"));
    }

    #[test]
    fn test_unknown_app_is_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.remove("TESSERA_BIND_ADDR");
        guard.set("TESSERA_APP", "crm");

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TESSERA_APP"));
    }
}

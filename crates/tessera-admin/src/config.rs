// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Admin configuration and feature flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recognized feature names.
pub mod features {
    /// Dashboard widgets and `GET api/dashboard`.
    pub const DASHBOARD: &str = "dashboard";
    /// Federated search and `GET api/search`.
    pub const SEARCH: &str = "search";
    /// CMS panels (pages, contents, blocks).
    pub const CMS: &str = "cms";
    /// Command bus and panel actions bound to commands.
    pub const COMMANDS: &str = "commands";
    /// Jobs registry and `GET api/jobs`.
    pub const JOBS: &str = "jobs";

    /// All recognized features, in declaration order.
    pub const ALL: [&str; 5] = [DASHBOARD, SEARCH, CMS, COMMANDS, JOBS];
}

/// Ordered mapping from feature name to enabled flag.
///
/// Names not present in the mapping are disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features(BTreeMap<String, bool>);

impl Default for Features {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl Features {
    /// Every recognized feature enabled.
    pub fn all_enabled() -> Self {
        Self(
            features::ALL
                .iter()
                .map(|name| (name.to_string(), true))
                .collect(),
        )
    }

    /// Every feature disabled.
    pub fn none() -> Self {
        Self(BTreeMap::new())
    }

    /// Set a feature flag, returning self for chaining.
    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    /// Set a feature flag.
    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }

    /// Whether `name` is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Iterate over `(name, enabled)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Parse a comma separated list. `name` enables, `-name` disables.
    ///
    /// Starts from all recognized features enabled.
    pub fn parse(list: &str) -> Self {
        let mut features = Self::all_enabled();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.strip_prefix('-') {
                Some(name) => features.set(name, false),
                None => features.set(item, true),
            }
        }
        features
    }
}

/// Admin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Title shown by the UI shell.
    pub title: String,
    /// Mount point of every admin route.
    pub base_path: String,
    /// Locale used when the request carries none.
    pub default_locale: String,
    /// Theme name.
    pub theme: String,
    /// Theme variant (light, dark...).
    pub theme_variant: String,
    /// Menu code rendered by `GET api/navigation`.
    pub nav_menu_code: String,
    /// Feature flags.
    pub features: Features,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Admin".to_string(),
            base_path: "/admin".to_string(),
            default_locale: "en".to_string(),
            theme: "admin".to_string(),
            theme_variant: "light".to_string(),
            nav_menu_code: "admin.main".to_string(),
            features: Features::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `TESSERA_ADMIN_TITLE` (default: `Admin`)
    /// - `TESSERA_ADMIN_BASE_PATH` (default: `/admin`)
    /// - `TESSERA_ADMIN_DEFAULT_LOCALE` (default: `en`)
    /// - `TESSERA_ADMIN_THEME` / `TESSERA_ADMIN_THEME_VARIANT`
    /// - `TESSERA_ADMIN_NAV_MENU_CODE` (default: `admin.main`)
    /// - `TESSERA_ADMIN_FEATURES`: comma list, `-name` disables a feature
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_path = std::env::var("TESSERA_ADMIN_BASE_PATH")
            .map(|v| normalize_base_path(&v))
            .unwrap_or(defaults.base_path);
        if base_path.contains(' ') {
            return Err(ConfigError::Invalid(
                "TESSERA_ADMIN_BASE_PATH",
                "must not contain spaces",
            ));
        }

        let default_locale =
            std::env::var("TESSERA_ADMIN_DEFAULT_LOCALE").unwrap_or(defaults.default_locale);
        if default_locale.is_empty() {
            return Err(ConfigError::Invalid(
                "TESSERA_ADMIN_DEFAULT_LOCALE",
                "must not be empty",
            ));
        }

        let features = std::env::var("TESSERA_ADMIN_FEATURES")
            .map(|v| Features::parse(&v))
            .unwrap_or(defaults.features);

        Ok(Self {
            title: std::env::var("TESSERA_ADMIN_TITLE").unwrap_or(defaults.title),
            base_path,
            default_locale,
            theme: std::env::var("TESSERA_ADMIN_THEME").unwrap_or(defaults.theme),
            theme_variant: std::env::var("TESSERA_ADMIN_THEME_VARIANT")
                .unwrap_or(defaults.theme_variant),
            nav_menu_code: std::env::var("TESSERA_ADMIN_NAV_MENU_CODE")
                .unwrap_or(defaults.nav_menu_code),
            features,
        })
    }

    /// Builder-style feature override.
    pub fn with_feature(mut self, name: &str, enabled: bool) -> Self {
        self.features.set(name, enabled);
        self
    }
}

/// Normalize a base path to `/segment` form without a trailing slash.
///
/// An empty or `/` input yields the empty string (routes mounted at root).
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

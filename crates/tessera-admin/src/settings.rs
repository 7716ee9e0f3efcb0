// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed settings with per-scope overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;

use crate::context::{AdminContext, Scope};
use crate::descriptor::json_type_matches;
use crate::error::{AdminError, Result};

/// A setting and its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDefinition {
    /// Dotted key, e.g. `store.currency`.
    pub key: String,
    /// Display label.
    pub label: String,
    /// JSON type name of the value.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Value when no override exists.
    pub default: JsonValue,
    /// Help text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl SettingDefinition {
    /// Create a definition. The type is inferred from the default.
    pub fn new(key: impl Into<String>, label: impl Into<String>, default: JsonValue) -> Self {
        let type_name = match &default {
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
            JsonValue::Number(_) => "number",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
            _ => "string",
        };
        Self {
            key: key.into(),
            label: label.into(),
            type_name: type_name.to_string(),
            default,
            description: String::new(),
        }
    }
}

/// Setting definitions plus scoped overrides.
#[derive(Default)]
pub struct Settings {
    definitions: BTreeMap<String, SettingDefinition>,
    overrides: RwLock<BTreeMap<Scope, Map<String, JsonValue>>>,
}

impl Settings {
    /// Create an empty settings store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a setting.
    pub fn register(&mut self, definition: SettingDefinition) -> Result<()> {
        if self.definitions.contains_key(&definition.key) {
            return Err(AdminError::DuplicateRegistration {
                registry: "settings",
                key: definition.key,
            });
        }
        self.definitions.insert(definition.key.clone(), definition);
        Ok(())
    }

    /// Declared settings.
    pub fn definitions(&self) -> impl Iterator<Item = &SettingDefinition> {
        self.definitions.values()
    }

    /// Effective value of every setting for the caller's scope.
    pub async fn values(&self, ctx: &AdminContext) -> Map<String, JsonValue> {
        let overrides = self.overrides.read().await;
        let scoped = overrides.get(&ctx.scope);
        self.definitions
            .values()
            .map(|d| {
                let value = scoped
                    .and_then(|o| o.get(&d.key))
                    .cloned()
                    .unwrap_or_else(|| d.default.clone());
                (d.key.clone(), value)
            })
            .collect()
    }

    /// Effective value of one setting.
    pub async fn get(&self, ctx: &AdminContext, key: &str) -> Result<JsonValue> {
        let definition = self
            .definitions
            .get(key)
            .ok_or_else(|| AdminError::not_found("setting", key))?;
        let overrides = self.overrides.read().await;
        Ok(overrides
            .get(&ctx.scope)
            .and_then(|o| o.get(key))
            .cloned()
            .unwrap_or_else(|| definition.default.clone()))
    }

    /// Apply overrides for the caller's scope.
    ///
    /// The patch is validated as a whole before any value is stored. A null
    /// value resets the setting to its default.
    pub async fn update(
        &self,
        ctx: &AdminContext,
        patch: Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>> {
        for (key, value) in &patch {
            let definition = self
                .definitions
                .get(key)
                .ok_or_else(|| AdminError::invalid(key, "unknown setting"))?;
            if !value.is_null() && !json_type_matches(&definition.type_name, value) {
                return Err(AdminError::invalid(
                    key,
                    format!("must be of type {}", definition.type_name),
                ));
            }
        }
        {
            let mut overrides = self.overrides.write().await;
            let scoped = overrides.entry(ctx.scope.clone()).or_default();
            for (key, value) in patch {
                if value.is_null() {
                    scoped.remove(&key);
                } else {
                    scoped.insert(key, value);
                }
            }
        }
        Ok(self.values(ctx).await)
    }
}

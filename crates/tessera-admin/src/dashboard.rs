// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dashboard engine.
//!
//! Widget providers are pure: they receive the request-scoped
//! [`AdminContext`] and the widget config and return a JSON object. Every
//! payload is checked against the widget contract before it leaves the
//! engine:
//!
//! - every key the definition requires is present and not null;
//! - no string anywhere in the payload contains raw markup
//!   (`<script`, `<html`, `<!doctype`, `<head`, `<body`, case-insensitive).
//!
//! A payload that breaks the contract is dropped and reported. A provider
//! that fails is rendered as unavailable. Neither fails the dashboard.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, warn};

use crate::context::AdminContext;
use crate::error::{AdminError, Result};

/// Markup fragments never allowed in widget payloads.
pub const FORBIDDEN_MARKUP: [&str; 5] = ["<script", "<html", "<!doctype", "<head", "<body"];

/// Area used when a definition names none.
pub const DEFAULT_AREA: &str = "main";

/// Payload produced by a widget provider.
pub type WidgetPayload = Map<String, JsonValue>;

/// Produces the payload of one widget.
#[async_trait]
pub trait WidgetProvider: Send + Sync {
    /// Render the widget for the current request.
    async fn render(&self, ctx: &AdminContext, config: &JsonValue) -> Result<WidgetPayload>;
}

/// Static description of a widget.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetDefinition {
    /// Unique widget code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Area the widget renders in.
    pub default_area: String,
    /// Config passed to the provider.
    pub default_config: JsonValue,
    /// Command that refreshes the widget's data, if any.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub command_name: String,
    /// Keys every payload must carry with a non-null value.
    pub required_keys: Vec<String>,
}

impl WidgetDefinition {
    /// Create a definition in the default area.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            default_area: DEFAULT_AREA.to_string(),
            default_config: JsonValue::Object(Map::new()),
            command_name: String::new(),
            required_keys: Vec::new(),
        }
    }

    /// Set the area.
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.default_area = area.into();
        self
    }

    /// Set the config.
    pub fn config(mut self, config: JsonValue) -> Self {
        self.default_config = config;
        self
    }

    /// Bind a refresh command.
    pub fn command(mut self, command_name: impl Into<String>) -> Self {
        self.command_name = command_name.into();
        self
    }

    /// Declare required payload keys.
    pub fn require(mut self, keys: &[&str]) -> Self {
        self.required_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// Outcome of rendering one widget.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WidgetStatus {
    /// Payload rendered.
    Ok,
    /// Provider failed.
    Unavailable,
}

/// A rendered widget.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedWidget {
    /// Widget code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Area.
    pub area: String,
    /// Render outcome.
    pub status: WidgetStatus,
    /// Payload when rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WidgetPayload>,
    /// Error message when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A payload dropped for breaking the widget contract.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetViolation {
    /// Widget code.
    pub code: String,
    /// Taxonomy code (`WIDGET_CONTRACT_VIOLATION`).
    pub error_code: String,
    /// What was wrong.
    pub message: String,
}

/// Rendered dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardRender {
    /// Widgets in area order, then registration order.
    pub widgets: Vec<RenderedWidget>,
    /// Dropped payloads.
    pub violations: Vec<WidgetViolation>,
}

impl DashboardRender {
    /// Widgets rendered in `area`.
    pub fn area<'a>(&'a self, area: &'a str) -> impl Iterator<Item = &'a RenderedWidget> + 'a {
        self.widgets.iter().filter(move |w| w.area == area)
    }
}

struct RegisteredWidget {
    definition: WidgetDefinition,
    provider: Arc<dyn WidgetProvider>,
}

/// Widget registry and renderer.
///
/// A disabled engine accepts registrations without keeping them and renders
/// an empty dashboard.
pub struct DashboardEngine {
    enabled: bool,
    widgets: Vec<RegisteredWidget>,
}

impl DashboardEngine {
    /// Create an engine.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            widgets: Vec::new(),
        }
    }

    /// Whether the dashboard feature is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a provider.
    pub fn register(
        &mut self,
        definition: WidgetDefinition,
        provider: Arc<dyn WidgetProvider>,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.widgets.iter().any(|w| w.definition.code == definition.code) {
            return Err(AdminError::DuplicateRegistration {
                registry: "dashboard",
                key: definition.code,
            });
        }
        debug!(widget = %definition.code, area = %definition.default_area, "Registered widget");
        self.widgets.push(RegisteredWidget {
            definition,
            provider,
        });
        Ok(())
    }

    /// Registered definitions.
    pub fn definitions(&self) -> impl Iterator<Item = &WidgetDefinition> {
        self.widgets.iter().map(|w| &w.definition)
    }

    /// Render every widget for `ctx`.
    pub async fn render(&self, ctx: &AdminContext) -> DashboardRender {
        let outcomes = join_all(self.widgets.iter().map(|w| async move {
            let result = w.provider.render(ctx, &w.definition.default_config).await;
            (w, result)
        }))
        .await;

        let mut areas: Vec<&str> = Vec::new();
        let mut seen = BTreeSet::new();
        for w in &self.widgets {
            if seen.insert(w.definition.default_area.as_str()) {
                areas.push(&w.definition.default_area);
            }
        }

        let mut render = DashboardRender::default();
        let mut rendered = Vec::new();
        for (widget, result) in outcomes {
            let definition = &widget.definition;
            let base = RenderedWidget {
                code: definition.code.clone(),
                name: definition.name.clone(),
                area: definition.default_area.clone(),
                status: WidgetStatus::Ok,
                data: None,
                error: None,
            };
            match result {
                Ok(payload) => match validate_payload(definition, &payload) {
                    Ok(()) => rendered.push(RenderedWidget {
                        data: Some(payload),
                        ..base
                    }),
                    Err(err) => {
                        warn!(widget = %definition.code, error = %err, "Dropping widget payload");
                        render.violations.push(WidgetViolation {
                            code: definition.code.clone(),
                            error_code: err.error_code().to_string(),
                            message: err.to_string(),
                        });
                    }
                },
                Err(err) => {
                    warn!(widget = %definition.code, error = %err, "Widget unavailable");
                    rendered.push(RenderedWidget {
                        status: WidgetStatus::Unavailable,
                        error: Some(err.to_string()),
                        ..base
                    });
                }
            }
        }

        for area in areas {
            render
                .widgets
                .extend(rendered.iter().filter(|w| w.area == area).cloned());
        }
        render
    }
}

/// Check a payload against the widget contract.
pub fn validate_payload(definition: &WidgetDefinition, payload: &WidgetPayload) -> Result<()> {
    let violation = |message: String| AdminError::WidgetContractViolation {
        widget: definition.code.clone(),
        message,
    };
    for key in &definition.required_keys {
        if payload.get(key).is_none_or(JsonValue::is_null) {
            return Err(violation(format!("required key '{}' is missing", key)));
        }
    }
    let mut path = Vec::new();
    for (key, value) in payload {
        path.push(key.clone());
        if let Some(marker) = find_markup(value, &mut path) {
            return Err(violation(format!(
                "raw markup '{}' at '{}'",
                marker,
                path.join(".")
            )));
        }
        path.pop();
    }
    Ok(())
}

fn find_markup(value: &JsonValue, path: &mut Vec<String>) -> Option<&'static str> {
    match value {
        JsonValue::String(s) => {
            let lowered = s.to_lowercase();
            FORBIDDEN_MARKUP.into_iter().find(|m| lowered.contains(m))
        }
        JsonValue::Array(items) => items.iter().enumerate().find_map(|(i, v)| {
            path.push(i.to_string());
            let found = find_markup(v, path);
            if found.is_none() {
                path.pop();
            }
            found
        }),
        JsonValue::Object(map) => map.iter().find_map(|(k, v)| {
            path.push(k.clone());
            let found = find_markup(v, path);
            if found.is_none() {
                path.pop();
            }
            found
        }),
        _ => None,
    }
}

/// Serialize a render as the `GET api/dashboard` body.
pub fn render_to_json(render: &DashboardRender) -> JsonValue {
    json!({
        "widgets": render.widgets,
        "violations": render.violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(JsonValue);

    #[async_trait]
    impl WidgetProvider for Fixed {
        async fn render(&self, _ctx: &AdminContext, _config: &JsonValue) -> Result<WidgetPayload> {
            Ok(self.0.as_object().cloned().unwrap_or_default())
        }
    }

    struct Failing;

    #[async_trait]
    impl WidgetProvider for Failing {
        async fn render(&self, _ctx: &AdminContext, _config: &JsonValue) -> Result<WidgetPayload> {
            Err(AdminError::Internal("metrics backend down".to_string()))
        }
    }

    fn engine() -> DashboardEngine {
        let mut engine = DashboardEngine::new(true);
        engine
            .register(
                WidgetDefinition::new("sales", "Sales").require(&["total"]),
                Arc::new(Fixed(json!({"total": 120, "currency": "EUR"}))),
            )
            .unwrap();
        engine
            .register(
                WidgetDefinition::new("notes", "Notes").area("sidebar"),
                Arc::new(Fixed(json!({"items": [{"text": "<SCRIPT>alert(1)</script>"}]}))),
            )
            .unwrap();
        engine
            .register(WidgetDefinition::new("traffic", "Traffic"), Arc::new(Failing))
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_render_drops_markup_and_keeps_the_rest() {
        let render = engine().render(&AdminContext::default()).await;

        let codes: Vec<&str> = render.widgets.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["sales", "traffic"]);
        assert_eq!(render.widgets[1].status, WidgetStatus::Unavailable);

        assert_eq!(render.violations.len(), 1);
        assert_eq!(render.violations[0].code, "notes");
        assert_eq!(render.violations[0].error_code, "WIDGET_CONTRACT_VIOLATION");
        assert!(render.violations[0].message.contains("items.0.text"));
    }

    #[test]
    fn test_required_keys_must_be_non_null() {
        let definition = WidgetDefinition::new("sales", "Sales").require(&["total"]);
        let payload = json!({"total": null}).as_object().cloned().unwrap();
        assert!(validate_payload(&definition, &payload).is_err());
    }

    #[test]
    fn test_doctype_is_case_insensitive() {
        let definition = WidgetDefinition::new("embed", "Embed");
        let payload = json!({"html": "<!DocType html>"}).as_object().cloned().unwrap();
        assert!(validate_payload(&definition, &payload).is_err());
    }

    #[tokio::test]
    async fn test_disabled_engine_is_inert() {
        let mut engine = DashboardEngine::new(false);
        engine
            .register(WidgetDefinition::new("sales", "Sales"), Arc::new(Failing))
            .unwrap();
        assert_eq!(engine.definitions().count(), 0);
        assert!(engine.render(&AdminContext::default()).await.widgets.is_empty());
    }

    #[test]
    fn test_duplicate_widget_code() {
        let mut engine = engine();
        let err = engine
            .register(WidgetDefinition::new("sales", "Sales"), Arc::new(Failing))
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_REGISTRATION");
    }
}

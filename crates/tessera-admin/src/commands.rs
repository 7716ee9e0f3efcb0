// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command bus.
//!
//! Handlers are addressed by command name. Panel actions, job triggers and
//! widget refreshes dispatch through the bus.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

use crate::context::AdminContext;
use crate::error::{AdminError, Result};

/// A command invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Command name.
    pub name: String,
    /// Arguments.
    #[serde(default)]
    pub payload: Map<String, JsonValue>,
    /// Target record ids, if any.
    #[serde(default)]
    pub ids: Vec<String>,
}

impl CommandMessage {
    /// Create a message without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Message type used for handler lookup.
    pub fn message_type(&self) -> &str {
        &self.name
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Map<String, JsonValue>) -> Self {
        self.payload = payload;
        self
    }

    /// Attach record ids.
    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = ids;
        self
    }
}

/// Handles one command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name this handler serves.
    fn command_name(&self) -> &str;

    /// Execute the command. The returned value is handed back to the caller.
    async fn execute(&self, ctx: &AdminContext, message: &CommandMessage) -> Result<JsonValue>;

    /// Cron expression when the command also runs on a schedule.
    fn cron(&self) -> Option<&str> {
        None
    }

    /// Description shown by job listings.
    fn description(&self) -> &str {
        ""
    }
}

/// Registry and dispatcher of command handlers.
///
/// A disabled bus ignores registrations and dispatches to nothing.
pub struct CommandBus {
    enabled: bool,
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandBus {
    /// Create a bus.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            handlers: BTreeMap::new(),
        }
    }

    /// Whether the commands feature is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a handler under its command name.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = handler.command_name().to_string();
        if name.is_empty() {
            return Err(AdminError::invalid("command_name", "must not be empty"));
        }
        if self.handlers.contains_key(&name) {
            return Err(AdminError::DuplicateRegistration {
                registry: "commands",
                key: name,
            });
        }
        debug!(command = %name, "Registered command handler");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Whether a handler serves `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered handlers in name order.
    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn CommandHandler>> {
        self.handlers.values()
    }

    /// Dispatch a message to its handler.
    #[instrument(skip(self, ctx, message), fields(command = %message.name))]
    pub async fn dispatch(&self, ctx: &AdminContext, message: &CommandMessage) -> Result<JsonValue> {
        if !self.enabled {
            return Ok(JsonValue::Null);
        }
        let handler = self
            .handlers
            .get(message.message_type())
            .ok_or_else(|| AdminError::not_found("command", message.message_type()))?;
        handler.execute(ctx, message).await
    }
}

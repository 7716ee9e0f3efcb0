// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Jobs registry.
//!
//! Lists configured background jobs with their last known status and lets
//! an operator trigger one through its command.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::commands::{CommandBus, CommandMessage};
use crate::context::AdminContext;
use crate::error::{AdminError, Result};

/// A configured job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique job name.
    pub name: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Cron expression, if scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Command dispatched by a manual trigger.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command_name: String,
}

impl JobDefinition {
    /// Create a definition.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schedule: None,
            command_name: String::new(),
        }
    }

    /// Set the schedule.
    pub fn schedule(mut self, cron: impl Into<String>) -> Self {
        self.schedule = Some(cron.into());
        self
    }

    /// Bind a command.
    pub fn command(mut self, command_name: impl Into<String>) -> Self {
        self.command_name = command_name.into();
        self
    }
}

/// Last known status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Status name (succeeded, failed, retrying...).
    pub status: String,
    /// When the job last ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// Last error, if the last run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Attempts of the last run.
    #[serde(default)]
    pub attempt_count: u32,
}

/// Source of persisted job status (for example a job-run table).
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Latest status of `job_name` within the caller's scope.
    async fn status(&self, ctx: &AdminContext, job_name: &str) -> Result<Option<JobStatus>>;
}

/// A job with its status, as listed by `GET api/jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct JobEntry {
    /// Definition.
    #[serde(flatten)]
    pub definition: JobDefinition,
    /// Status, if known.
    pub last_status: Option<JobStatus>,
}

/// Registered jobs.
///
/// A disabled registry ignores registrations and lists nothing.
pub struct JobRegistry {
    enabled: bool,
    jobs: Vec<JobDefinition>,
    status_source: Option<Arc<dyn JobStatusSource>>,
    triggered: RwLock<BTreeMap<String, JobStatus>>,
}

impl JobRegistry {
    /// Create a registry.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            jobs: Vec::new(),
            status_source: None,
            triggered: RwLock::new(BTreeMap::new()),
        }
    }

    /// Whether the jobs feature is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a job.
    pub fn register(&mut self, definition: JobDefinition) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.jobs.iter().any(|j| j.name == definition.name) {
            return Err(AdminError::DuplicateRegistration {
                registry: "jobs",
                key: definition.name,
            });
        }
        self.jobs.push(definition);
        Ok(())
    }

    /// Install the persisted status source.
    pub fn set_status_source(&mut self, source: Arc<dyn JobStatusSource>) {
        self.status_source = Some(source);
    }

    /// Registered definitions.
    pub fn definitions(&self) -> &[JobDefinition] {
        &self.jobs
    }

    /// List jobs with their last status.
    ///
    /// The status source wins over the outcome of a manual trigger. A
    /// failing source is logged and the job listed without status.
    pub async fn list(&self, ctx: &AdminContext) -> Vec<JobEntry> {
        let triggered = self.triggered.read().await;
        let mut entries = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let persisted = match &self.status_source {
                Some(source) => match source.status(ctx, &job.name).await {
                    Ok(status) => status,
                    Err(err) => {
                        warn!(job = %job.name, error = %err, "Job status source failed");
                        None
                    }
                },
                None => None,
            };
            entries.push(JobEntry {
                definition: job.clone(),
                last_status: persisted.or_else(|| triggered.get(&job.name).cloned()),
            });
        }
        entries
    }

    /// Trigger a job by dispatching its command.
    pub async fn trigger(
        &self,
        ctx: &AdminContext,
        name: &str,
        bus: &CommandBus,
    ) -> Result<JsonValue> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.name == name)
            .ok_or_else(|| AdminError::not_found("job", name))?;
        if job.command_name.is_empty() {
            return Err(AdminError::invalid(
                "job",
                format!("job '{}' has no command to trigger", name),
            ));
        }

        info!(job = %name, command = %job.command_name, "Triggering job");
        let outcome = bus
            .dispatch(ctx, &CommandMessage::new(job.command_name.clone()))
            .await;
        let status = JobStatus {
            status: if outcome.is_ok() { "succeeded" } else { "failed" }.to_string(),
            last_run_at: Some(Utc::now()),
            last_error: outcome.as_ref().err().map(|e| e.to_string()),
            attempt_count: 1,
        };
        self.triggered.write().await.insert(name.to_string(), status);
        outcome
    }
}

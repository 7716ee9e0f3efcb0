// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded in-process job queue.
//!
//! A fixed pool of workers drains a bounded channel. Each message is handled
//! with a fresh background [`JobContext`] for the enqueuer's scope, so the
//! enqueuer's cancellation never reaches the worker.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tessera_admin::Scope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::context::JobContext;
use crate::error::{EsignError, Result};
use crate::jobs::{EsignJobs, GoogleDriveImport, SendSigningRequest};

pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_CAPACITY: usize = 64;

/// Consumes queued messages of type `M`.
#[async_trait]
pub trait QueueHandler<M>: Send + Sync {
    async fn handle(&self, ctx: &JobContext, message: M) -> Result<()>;
}

#[async_trait]
impl QueueHandler<GoogleDriveImport> for EsignJobs {
    async fn handle(&self, ctx: &JobContext, message: GoogleDriveImport) -> Result<()> {
        self.import_google_drive(ctx, message).await.map(|_| ())
    }
}

#[async_trait]
impl QueueHandler<SendSigningRequest> for EsignJobs {
    async fn handle(&self, ctx: &JobContext, message: SendSigningRequest) -> Result<()> {
        self.send_signing_request(ctx, message).await.map(|_| ())
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

struct Queued<M> {
    scope: Scope,
    message: M,
}

type SharedReceiver<M> = Arc<tokio::sync::Mutex<mpsc::Receiver<Queued<M>>>>;

pub struct AsyncQueue<M> {
    name: &'static str,
    sender: Mutex<Option<mpsc::Sender<Queued<M>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<M: Send + 'static> AsyncQueue<M> {
    /// Start `config.workers` workers. Zero values fall back to the
    /// defaults.
    pub fn start(
        name: &'static str,
        config: QueueConfig,
        handler: Arc<dyn QueueHandler<M>>,
    ) -> Self {
        let workers = if config.workers == 0 {
            DEFAULT_WORKERS
        } else {
            config.workers
        };
        let capacity = if config.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            config.capacity
        };

        let (tx, rx) = mpsc::channel(capacity);
        let rx: SharedReceiver<M> = Arc::new(tokio::sync::Mutex::new(rx));
        let handles = (0..workers)
            .map(|worker| tokio::spawn(run_worker(name, worker, rx.clone(), handler.clone())))
            .collect();

        info!(queue = name, workers, capacity, "Queue started");

        Self {
            name,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Submit `message` for the caller's scope.
    ///
    /// Fails with `QUEUE_CLOSED` after [`close`](Self::close), or with
    /// `CANCELLED` when `ctx` is cancelled before a slot frees up.
    pub async fn enqueue(&self, ctx: &JobContext, message: M) -> Result<()> {
        let sender = self.sender_handle().ok_or(EsignError::QueueClosed)?;
        ctx.check()?;

        let queued = Queued {
            scope: ctx.scope.clone(),
            message,
        };
        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(EsignError::Cancelled),
            sent = sender.send(queued) => sent.map_err(|_| EsignError::QueueClosed),
        }
    }

    /// Stop accepting messages. Queued messages are still handled. Calling
    /// again is a no-op.
    pub fn close(&self) {
        let taken = match self.sender.lock() {
            Ok(mut sender) => sender.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            info!(queue = self.name, "Queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender_handle().is_none()
    }

    /// Close and wait for the workers to drain the queue.
    pub async fn shutdown(&self) {
        self.close();
        let handles: Vec<_> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                error!(queue = self.name, error = %e, "Queue worker panicked");
            }
        }
    }

    fn sender_handle(&self) -> Option<mpsc::Sender<Queued<M>>> {
        match self.sender.lock() {
            Ok(sender) => sender.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

async fn run_worker<M: Send + 'static>(
    name: &'static str,
    worker: usize,
    rx: SharedReceiver<M>,
    handler: Arc<dyn QueueHandler<M>>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(Queued { scope, message }) = next else {
            debug!(queue = name, worker, "Queue worker exiting");
            return;
        };

        let ctx = JobContext::background(scope);
        if let Err(e) = handler.handle(&ctx, message).await {
            error!(
                queue = name,
                worker,
                error_code = e.error_code(),
                error = %e,
                "Queued job failed"
            );
        }
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Queued jobs run through the same envelope as direct calls.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{Harness, sent_agreement};
use tessera_esign::jobs::{GoogleDriveImport, SendSigningRequest};
use tessera_esign::model::{EmailLogStatus, JobRunStatus};
use tessera_esign::{AsyncQueue, QueueConfig, QueueHandler};

#[tokio::test]
async fn test_queued_imports_are_deduplicated() {
    let h = Harness::new();
    let handler: Arc<dyn QueueHandler<GoogleDriveImport>> = Arc::new(h.jobs.clone());
    let queue = AsyncQueue::start(
        "google_drive_import",
        QueueConfig {
            workers: 2,
            capacity: 8,
        },
        handler,
    );

    for _ in 0..4 {
        queue
            .enqueue(&h.ctx, GoogleDriveImport::new("u1", "g1"))
            .await
            .unwrap();
    }
    queue.shutdown().await;

    let documents = h.stores.documents.list_documents(&h.ctx.scope).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(h.importer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_queued_email_survives_enqueuer_cancellation() {
    let h = Harness::new();
    h.seed(sent_agreement("a1")).await;
    let handler: Arc<dyn QueueHandler<SendSigningRequest>> = Arc::new(h.jobs.clone());
    let queue = AsyncQueue::start("email", QueueConfig::default(), handler);

    queue
        .enqueue(&h.ctx, SendSigningRequest::new("a1", "s1").correlation("corr-1"))
        .await
        .unwrap();
    h.ctx.cancellation().cancel();
    queue.shutdown().await;

    let logs = h
        .stores
        .email_logs
        .list_email_logs(&h.ctx.scope, "a1")
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, EmailLogStatus::Sent);

    let runs = h
        .stores
        .job_runs
        .list_job_runs(&h.ctx.scope, None)
        .await
        .unwrap();
    assert_eq!(runs[0].status, JobRunStatus::Succeeded);
}

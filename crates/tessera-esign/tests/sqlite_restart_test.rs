// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job runs persisted to a SQLite file deduplicate across process restarts.

mod common;

use common::{CountingPipeline, Harness, sent_agreement};
use tessera_esign::Stores;
use tessera_esign::jobs::{EMAIL_SEND_SIGNING_REQUEST, SendSigningRequest};
use tessera_esign::model::JobRunStatus;
use tessera_esign::store::sqlite::SqliteStore;

async fn file_stores(url: &str) -> Stores {
    Stores::sqlite(
        SqliteStore::connect(url)
            .await
            .expect("Failed to open SQLite file"),
    )
}

#[tokio::test]
async fn test_succeeded_run_survives_restart() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("esign.db").display());
    let msg = SendSigningRequest::new("a1", "s1").correlation("corr-1");

    let first = {
        let h = Harness::with_stores(file_stores(&url).await, |p| p, CountingPipeline::default());
        h.seed(sent_agreement("a1")).await;
        let out = h
            .jobs
            .send_signing_request(&h.ctx, msg.clone())
            .await
            .unwrap();
        assert_eq!(h.provider.sends(), 1);
        out
    };

    let h = Harness::with_stores(file_stores(&url).await, |p| p, CountingPipeline::default());
    h.seed(sent_agreement("a1")).await;
    let replay = h
        .jobs
        .send_signing_request(&h.ctx, msg)
        .await
        .unwrap();

    assert!(replay.deduplicated);
    assert_eq!(replay.run.id, first.run.id);
    assert_eq!(replay.run.status, JobRunStatus::Succeeded);
    assert_eq!(h.provider.sends(), 0);

    let runs = h
        .stores
        .job_runs
        .list_job_runs(&h.ctx.scope, Some(EMAIL_SEND_SIGNING_REQUEST))
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
}

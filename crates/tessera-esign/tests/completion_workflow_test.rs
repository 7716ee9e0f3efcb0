// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Completion workflow: artifacts, CC fan-out and rerun behaviour.

mod common;

use std::sync::atomic::Ordering;

use common::{CountingPipeline, Harness, completed_agreement};
use tessera_esign::email::Notification;
use tessera_esign::email::links::token_from_link;
use tessera_esign::metrics;
use tessera_esign::model::{EmailLogStatus, audit_types};
use tessera_esign::tokens::{TokenPurpose, TokenService};

#[tokio::test]
async fn test_completion_fan_out_to_ccs() {
    let h = Harness::new();
    h.seed(completed_agreement("a2", &["cc1", "cc2"])).await;

    let report = h
        .workflow()
        .complete(&h.ctx, "a2", Some("corr-1"))
        .await
        .unwrap();

    assert_eq!(report.correlation_id, "corr-1");
    assert!(report.rendered_pages.is_some());
    let executed_key = report.executed_object_key.clone().unwrap();
    let certificate_key = report.certificate_object_key.clone().unwrap();
    assert_eq!(report.deliveries.len(), 2);
    assert!(report.deliveries.iter().all(|d| !d.deduplicated));

    let logs = h
        .stores
        .email_logs
        .list_email_logs(&h.ctx.scope, "a2")
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    for log in &logs {
        assert_eq!(log.status, EmailLogStatus::Sent);
        assert_eq!(log.template_code, "esign.completed_delivery");
        assert_eq!(log.correlation_id, "corr-1");
    }

    for cc in ["cc1", "cc2"] {
        let link = h.observer.latest_for(cc).unwrap();
        assert_eq!(link.notification, Notification::CompletionPackage);
        assert!(link.sign_url.is_none());

        let url = link.completion_url.unwrap();
        assert!(url.starts_with("https://sign.example.com/sign/"));
        assert!(url.ends_with("/complete"));
        assert!(!url.contains(&executed_key));
        assert!(!url.contains(&certificate_key));

        let token = token_from_link(&url).unwrap();
        let claims = h.tokens.validate(&h.ctx, &token).await.unwrap().unwrap();
        assert_eq!(claims.agreement_id, "a2");
        assert_eq!(claims.recipient_id, cc);
        assert_eq!(claims.purpose, TokenPurpose::Completion);
    }

    // The signer is not part of the fan-out.
    assert!(h.observer.latest_for("s1").is_none());

    let completed = h
        .stores
        .audit
        .list_audit_events(&h.ctx.scope, Some("a2"))
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == audit_types::AGREEMENT_COMPLETED)
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_completion_rerun_sends_nothing_new() {
    let h = Harness::new();
    h.seed(completed_agreement("a2", &["cc1", "cc2"])).await;
    let workflow = h.workflow();

    let first = workflow.complete(&h.ctx, "a2", Some("corr-1")).await.unwrap();
    let sends = h.provider.sends();
    let second = workflow.complete(&h.ctx, "a2", Some("corr-1")).await.unwrap();

    assert_eq!(h.provider.sends(), sends);
    assert!(second.deliveries.iter().all(|d| d.deduplicated));
    assert_eq!(first.executed_object_key, second.executed_object_key);
    assert_eq!(first.certificate_object_key, second.certificate_object_key);
    assert_eq!(h.pipeline.renders.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.executed.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.certificates.load(Ordering::SeqCst), 1);

    let logs = h
        .stores
        .email_logs
        .list_email_logs(&h.ctx.scope, "a2")
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
}

#[tokio::test]
async fn test_cc_failure_does_not_block_other_ccs() {
    let h = Harness::with(|p| p.fail_for("cc2"), CountingPipeline::default());
    h.seed(completed_agreement("a2", &["cc1", "cc2"])).await;

    let err = h
        .workflow()
        .complete(&h.ctx, "a2", Some("corr-1"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TRANSIENT_FAILURE");

    let logs = h
        .stores
        .email_logs
        .list_email_logs(&h.ctx.scope, "a2")
        .await
        .unwrap();
    let cc1 = logs.iter().find(|l| l.recipient_id == "cc1").unwrap();
    let cc2 = logs.iter().find(|l| l.recipient_id == "cc2").unwrap();
    assert_eq!(cc1.status, EmailLogStatus::Sent);
    assert_eq!(cc2.status, EmailLogStatus::Retrying);

    // No completion audit until every CC is delivered.
    let completed = h
        .stores
        .audit
        .list_audit_events(&h.ctx.scope, Some("a2"))
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == audit_types::AGREEMENT_COMPLETED)
        .count();
    assert_eq!(completed, 0);
}

#[tokio::test]
async fn test_artifact_failure_stops_workflow() {
    let h = Harness::with(|p| p, CountingPipeline::failing_executed());
    h.seed(completed_agreement("a2", &["cc1"])).await;

    let err = h
        .workflow()
        .complete(&h.ctx, "a2", Some("corr-1"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    assert_eq!(
        h.metrics.snapshot().counter(metrics::FINALIZE_FAILURE_TOTAL),
        1
    );
    assert_eq!(h.pipeline.renders.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.executed.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.certificates.load(Ordering::SeqCst), 0);
    assert_eq!(h.provider.sends(), 0);
}

#[tokio::test]
async fn test_agreement_without_ccs() {
    let h = Harness::new();
    h.seed(completed_agreement("a3", &[])).await;

    let report = h.workflow().complete(&h.ctx, "a3", None).await.unwrap();

    assert!(report.deliveries.is_empty());
    assert!(report.correlation_id.starts_with("corr_"));
    assert!(report.certificate_object_key.is_some());
    assert_eq!(h.provider.sends(), 0);
}

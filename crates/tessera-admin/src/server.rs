// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Admin HTTP surface.
//!
//! Binds the frozen registries to routes relative to the admin base path.
//! Every request is authenticated first; handlers then resolve the entity,
//! authorize the action token and dispatch.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tracing::debug;

use crate::admin::AdminRuntime;
use crate::context::{AdminContext, Identity};
use crate::error::AdminError;
use crate::handlers;

/// User id given to requests when no authenticator is installed.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Build the admin router. Paths are relative to the base path.
pub fn router(runtime: Arc<AdminRuntime>) -> Router {
    Router::new()
        .route("/api/panels", get(handlers::list_panels))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/search", get(handlers::search))
        .route("/api/navigation", get(handlers::navigation))
        .route("/api/jobs", get(handlers::list_jobs))
        .route("/api/jobs/{name}/trigger", post(handlers::trigger_job))
        .route(
            "/api/settings",
            get(handlers::get_settings).patch(handlers::update_settings),
        )
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/api/{panel}",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/api/{panel}/{id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .route(
            "/api/{panel}/actions/{action}",
            post(handlers::invoke_action),
        )
        .route("/api/{panel}/bulk/{action}", post(handlers::invoke_bulk_action))
        .layer(middleware::from_fn_with_state(runtime.clone(), authenticate))
        .with_state(runtime)
}

/// Resolve the request identity into an [`AdminContext`] extension.
///
/// Anonymous requests are redirected to the login path, or answered with
/// `401` when no login path is configured.
async fn authenticate(
    State(runtime): State<Arc<AdminRuntime>>,
    mut request: Request,
    next: Next,
) -> Response {
    let default_locale = runtime.config.default_locale.as_str();
    let ctx = match &runtime.authenticator {
        None => AdminContext::from_identity(
            Identity {
                user_id: ANONYMOUS_USER.to_string(),
                ..Identity::default()
            },
            default_locale,
        ),
        Some(authenticator) => match authenticator.authenticate(request.headers()).await {
            Ok(Some(identity)) => AdminContext::from_identity(identity, default_locale),
            Ok(None) => {
                debug!(path = %request.uri().path(), "Unauthenticated admin request");
                return match runtime
                    .auth_config
                    .resolve_login_path(&runtime.config.base_path)
                {
                    Some(login_path) => Redirect::to(&login_path).into_response(),
                    None => AdminError::Unauthenticated.into_response(),
                };
            }
            Err(err) => return err.into_response(),
        },
    };
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

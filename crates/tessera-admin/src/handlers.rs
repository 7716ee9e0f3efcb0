// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Admin request handlers.
//!
//! Handlers run after authentication, so the [`AdminContext`] extension is
//! always present. Each one resolves its entity, authorizes the action token
//! and dispatches to the registry that owns the behaviour.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::{info, instrument};

use crate::admin::AdminRuntime;
use crate::commands::CommandMessage;
use crate::context::AdminContext;
use crate::dashboard::render_to_json;
use crate::descriptor::Action;
use crate::error::{AdminError, Result};
use crate::panel::{ActionInvocation, Panel, PanelOperation};
use crate::repository::{DEFAULT_PER_PAGE, ListOptions};

type ApiResult = Result<Json<JsonValue>>;

fn find_panel<'a>(runtime: &'a AdminRuntime, slug: &str) -> Result<&'a Arc<Panel>> {
    runtime
        .panels
        .get(slug)
        .ok_or_else(|| AdminError::not_found("panel", slug))
}

fn json_body(body: std::result::Result<Json<JsonValue>, JsonRejection>) -> Result<JsonValue> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AdminError::invalid("body", rejection.body_text()))
}

fn object_body(
    body: std::result::Result<Json<JsonValue>, JsonRejection>,
) -> Result<Map<String, JsonValue>> {
    match json_body(body)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(AdminError::invalid("body", "expected a JSON object")),
    }
}

/// `GET api/panels`
pub async fn list_panels(State(runtime): State<Arc<AdminRuntime>>) -> ApiResult {
    let panels: Vec<_> = runtime.panels.iter().map(|p| p.descriptor()).collect();
    Ok(Json(json!({ "panels": panels })))
}

/// `GET api/<panel>`
#[instrument(skip_all, fields(panel = %slug))]
pub async fn list_records(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path(slug): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    runtime
        .authorize(&ctx, &panel.permission_token(PanelOperation::View), &slug)
        .await?;

    let page = take_number(&mut params, "page")?.unwrap_or(1);
    let per_page = take_number(&mut params, "per_page")?.unwrap_or(DEFAULT_PER_PAGE);
    let options = ListOptions {
        page,
        per_page,
        filters: params,
    }
    .normalized();

    let result = panel.list(&ctx, options.clone()).await?;
    Ok(Json(json!({
        "items": result.records,
        "total": result.total,
        "page": options.page,
        "per_page": options.per_page,
    })))
}

fn take_number(params: &mut BTreeMap<String, String>, key: &str) -> Result<Option<usize>> {
    params
        .remove(key)
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| AdminError::invalid(key, "must be a positive integer"))
        })
        .transpose()
}

/// `POST api/<panel>`
#[instrument(skip_all, fields(panel = %slug))]
pub async fn create_record(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path(slug): Path<String>,
    body: std::result::Result<Json<JsonValue>, JsonRejection>,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    runtime
        .authorize(&ctx, &panel.permission_token(PanelOperation::Create), &slug)
        .await?;
    let record = panel.create(&ctx, &json_body(body)?).await?;
    info!(id = %record.id, "Record created");
    Ok(Json(record.to_json()))
}

/// `GET api/<panel>/<id>`
#[instrument(skip_all, fields(panel = %slug, id = %id))]
pub async fn get_record(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path((slug, id)): Path<(String, String)>,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    runtime
        .authorize(&ctx, &panel.permission_token(PanelOperation::View), &slug)
        .await?;
    Ok(Json(panel.get(&ctx, &id).await?.to_json()))
}

/// `PATCH api/<panel>/<id>`
#[instrument(skip_all, fields(panel = %slug, id = %id))]
pub async fn update_record(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path((slug, id)): Path<(String, String)>,
    body: std::result::Result<Json<JsonValue>, JsonRejection>,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    runtime
        .authorize(&ctx, &panel.permission_token(PanelOperation::Edit), &slug)
        .await?;
    let record = panel.update(&ctx, &id, &json_body(body)?).await?;
    Ok(Json(record.to_json()))
}

/// `DELETE api/<panel>/<id>`
#[instrument(skip_all, fields(panel = %slug, id = %id))]
pub async fn delete_record(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path((slug, id)): Path<(String, String)>,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    runtime
        .authorize_delete(&ctx, &panel.permission_token(PanelOperation::Delete), &slug)
        .await?;
    panel.delete(&ctx, &id).await?;
    info!("Record deleted");
    Ok(Json(json!({ "deleted": id })))
}

/// Body of action invocations.
#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    /// Target record ids.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Action arguments.
    #[serde(default)]
    pub payload: Map<String, JsonValue>,
}

fn action_request(body: &Bytes) -> Result<ActionRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ActionRequest::default());
    }
    Ok(serde_json::from_slice(body)?)
}

async fn run_action(
    runtime: &AdminRuntime,
    ctx: &AdminContext,
    panel: &Panel,
    action: &Action,
    request: ActionRequest,
) -> ApiResult {
    let token = if action.permission.is_empty() {
        panel.permission_token(PanelOperation::Edit)
    } else {
        action.permission.clone()
    };
    runtime.authorize(ctx, &token, panel.slug()).await?;
    action
        .validate_payload(&request.payload)
        .map_err(|message| AdminError::invalid("payload", message))?;

    let result = if action.is_command() {
        let message = CommandMessage::new(action.command_name.clone())
            .with_payload(request.payload)
            .with_ids(request.ids);
        runtime.commands.dispatch(ctx, &message).await?
    } else {
        panel
            .invoke_inline(
                ctx,
                ActionInvocation {
                    action: action.name.clone(),
                    ids: request.ids,
                    payload: request.payload,
                },
            )
            .await?
    };
    info!(action = %action.name, "Action executed");
    Ok(Json(json!({ "action": action.name, "result": result })))
}

/// `POST api/<panel>/actions/<action>`
#[instrument(skip_all, fields(panel = %slug, action = %name))]
pub async fn invoke_action(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path((slug, name)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    let action = panel
        .action(&name)
        .ok_or_else(|| AdminError::not_found("action", &name))?;
    run_action(&runtime, &ctx, panel, action, action_request(&body)?).await
}

/// `POST api/<panel>/bulk/<action>`
#[instrument(skip_all, fields(panel = %slug, action = %name))]
pub async fn invoke_bulk_action(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path((slug, name)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult {
    let panel = find_panel(&runtime, &slug)?;
    let action = panel
        .bulk_action(&name)
        .ok_or_else(|| AdminError::not_found("bulk action", &name))?;
    let request = action_request(&body)?;
    if request.ids.is_empty() {
        return Err(AdminError::invalid("ids", "bulk actions need at least one id"));
    }
    run_action(&runtime, &ctx, panel, action, request).await
}

/// `GET api/dashboard`
#[instrument(skip_all)]
pub async fn dashboard(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
) -> ApiResult {
    runtime.authorize(&ctx, "dashboard.view", "dashboard").await?;
    let render = runtime.dashboard.render(&ctx).await;
    Ok(Json(render_to_json(&render)))
}

/// Query of `GET api/search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search text.
    #[serde(default)]
    pub query: String,
    /// Hits per adapter.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET api/search?query=...`
#[instrument(skip_all, fields(query = %params.query))]
pub async fn search(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Query(params): Query<SearchQuery>,
) -> ApiResult {
    let results = runtime
        .search
        .search(
            &ctx,
            runtime.authorizer.as_ref(),
            &params.query,
            params.limit.unwrap_or_default(),
        )
        .await;
    Ok(Json(json!({ "query": params.query, "results": results })))
}

/// `GET api/navigation`
pub async fn navigation(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
) -> ApiResult {
    let menu = runtime.navigation(&ctx).await;
    Ok(Json(json!({
        "menu_code": runtime.config.nav_menu_code,
        "locale": ctx.locale,
        "items": menu.items,
    })))
}

/// `GET api/jobs`
pub async fn list_jobs(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
) -> ApiResult {
    runtime.authorize(&ctx, "jobs.view", "jobs").await?;
    let jobs = runtime.jobs.list(&ctx).await;
    Ok(Json(json!({ "jobs": jobs })))
}

/// `POST api/jobs/<name>/trigger`
#[instrument(skip_all, fields(job = %name))]
pub async fn trigger_job(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path(name): Path<String>,
) -> ApiResult {
    runtime.authorize(&ctx, "jobs.trigger", &name).await?;
    let result = runtime.jobs.trigger(&ctx, &name, &runtime.commands).await?;
    Ok(Json(json!({ "job": name, "result": result })))
}

/// `GET api/settings`
pub async fn get_settings(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
) -> ApiResult {
    runtime.authorize(&ctx, "settings.view", "settings").await?;
    let definitions: Vec<_> = runtime.settings.definitions().collect();
    Ok(Json(json!({
        "values": runtime.settings.values(&ctx).await,
        "definitions": definitions,
    })))
}

/// `PATCH api/settings`
#[instrument(skip_all)]
pub async fn update_settings(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    body: std::result::Result<Json<JsonValue>, JsonRejection>,
) -> ApiResult {
    runtime.authorize(&ctx, "settings.edit", "settings").await?;
    let values = runtime.settings.update(&ctx, object_body(body)?).await?;
    Ok(Json(json!({ "values": values })))
}

/// `GET api/notifications`
pub async fn list_notifications(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
) -> ApiResult {
    let notifications = runtime.notifications.list(&ctx).await;
    let unread = notifications.iter().filter(|n| !n.read).count();
    Ok(Json(json!({ "notifications": notifications, "unread": unread })))
}

/// `POST api/notifications/<id>/read`
pub async fn mark_notification_read(
    State(runtime): State<Arc<AdminRuntime>>,
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let notification = runtime.notifications.mark_read(&ctx, &id).await?;
    Ok(Json(json!({ "notification": notification })))
}

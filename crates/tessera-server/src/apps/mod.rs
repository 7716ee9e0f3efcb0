// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Demo back offices.

pub mod commerce;
pub mod esign;
pub mod web;

use std::sync::Arc;

use axum::Router;
use tessera_admin::auth::{AuthConfig, HeaderAuthenticator};
use tessera_admin::{Admin, Result};
use tracing::info;

use crate::config::{AppKind, ServerConfig};

/// An initialized admin and the router it is bound to.
pub struct App {
    pub kind: AppKind,
    pub admin: Admin,
    pub router: Router,
}

/// Build the configured application.
///
/// Requests are authenticated from the `x-user-*` headers set by the
/// fronting proxy; anonymous requests are sent to `<base_path>/login`.
pub async fn build(config: &ServerConfig) -> Result<App> {
    let mut admin = Admin::new(config.admin.clone());
    admin.with_auth(Arc::new(HeaderAuthenticator), AuthConfig::default())?;

    match config.app {
        AppKind::Web => web::register(&mut admin)?,
        AppKind::Commerce => {
            admin.register_module(&commerce::CommerceModule::new())?;
        }
        AppKind::Esign => {
            let stores = esign::open_stores(config.esign_database_url.as_deref()).await?;
            esign::register(&mut admin, esign::jobs(stores, &config.esign))?;
        }
    }

    let mut router = Router::new();
    admin.initialize(&mut router)?;
    info!(app = config.app.as_str(), "Application built");

    Ok(App {
        kind: config.app,
        admin,
        router,
    })
}

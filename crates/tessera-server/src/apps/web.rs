// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic web admin: CMS panels, users and site settings.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue, json};
use tessera_admin::cms::{BLOCKS_PANEL, CONTENTS_PANEL, MemoryCms, PAGES_PANEL};
use tessera_admin::config::features;
use tessera_admin::dashboard::{WidgetDefinition, WidgetPayload, WidgetProvider};
use tessera_admin::descriptor::{Field, FieldType, Filter, PanelPermissions};
use tessera_admin::menu::MenuItem;
use tessera_admin::search::RepositorySearchAdapter;
use tessera_admin::settings::SettingDefinition;
use tessera_admin::{Admin, AdminContext, ListOptions, MemoryRepository, PanelBuilder, Repository, Result};

pub const USERS_PANEL: &str = "users";

/// Greets the signed-in user and counts accounts.
struct Welcome {
    title: String,
    users: Arc<MemoryRepository>,
}

#[async_trait]
impl WidgetProvider for Welcome {
    async fn render(&self, ctx: &AdminContext, _config: &JsonValue) -> Result<WidgetPayload> {
        let users = self.users.list(ctx, ListOptions::default()).await?;
        let mut payload = Map::new();
        payload.insert("title".to_string(), json!(self.title));
        payload.insert("user".to_string(), json!(ctx.user_id));
        payload.insert("locale".to_string(), json!(ctx.locale));
        payload.insert("users".to_string(), json!(users.total));
        Ok(payload)
    }
}

/// Register the web admin onto `admin`.
pub fn register(admin: &mut Admin) -> Result<()> {
    let users = Arc::new(MemoryRepository::new("user"));
    let title = admin.config().title.clone();

    admin.register_panel(
        USERS_PANEL,
        PanelBuilder::new("Users")
            .with_repository(users.clone())
            .list_fields([
                Field::text("name", "Name").required(),
                Field::new("email", "Email", FieldType::Email).required(),
                Field::select("role", "Role")
                    .option("admin", "Administrator")
                    .option("editor", "Editor")
                    .option("viewer", "Viewer"),
            ])
            .filters([Filter::search(), Filter::new("role", "Role", FieldType::Select)])
            .permissions(PanelPermissions::prefixed(USERS_PANEL)),
    )?;

    let cms_panels = admin.with_cms(&MemoryCms::new())?;

    admin.register_widget(
        WidgetDefinition::new("web.welcome", "Welcome").require(&["title", "user"]),
        Arc::new(Welcome {
            title,
            users: users.clone(),
        }),
    )?;

    admin.register_search_adapter(
        USERS_PANEL,
        Arc::new(
            RepositorySearchAdapter::new("user", users, "name", "/users")
                .description_field("email")
                .require_permission("users.view")
                .icon("user"),
        ),
    )?;

    admin.register_setting(SettingDefinition::new(
        "site.name",
        "Site name",
        json!("Tessera"),
    ))?;
    admin.register_setting(SettingDefinition::new(
        "site.maintenance_mode",
        "Maintenance mode",
        json!(false),
    ))?;

    admin.add_menu_item(MenuItem::group("web.people", "People").position(20))?;
    admin.add_menu_item(
        MenuItem::panel("web.users", "Users", USERS_PANEL)
            .parent("web.people")
            .icon("users")
            .permission("users.view"),
    )?;

    if admin.feature_enabled(features::CMS) && !cms_panels.is_empty() {
        admin.add_menu_item(MenuItem::group("web.content", "Content").position(10))?;
        for (position, (slug, label)) in [
            (PAGES_PANEL, "Pages"),
            (CONTENTS_PANEL, "Contents"),
            (BLOCKS_PANEL, "Blocks"),
        ]
        .into_iter()
        .enumerate()
        {
            admin.add_menu_item(
                MenuItem::panel(format!("web.{}", slug), label, slug)
                    .parent("web.content")
                    .position(position as i32),
            )?;
        }
    }

    Ok(())
}

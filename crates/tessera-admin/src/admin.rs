// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The admin instance: composition root of every registry.
//!
//! An [`Admin`] starts in the configuring phase where panels, modules,
//! widgets, commands, search adapters, jobs, settings and menu items are
//! accepted. [`Admin::initialize`] freezes them into an [`AdminRuntime`],
//! binds the HTTP routes and closes registration for good.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Router;
use tracing::{debug, info, warn};

use crate::auth::{AuthConfig, Authenticator, Authorizer, DefaultAuthorizer};
use crate::cms::{self, CmsBackend};
use crate::commands::{CommandBus, CommandHandler};
use crate::config::{Config, features};
use crate::context::AdminContext;
use crate::dashboard::{DashboardEngine, WidgetDefinition, WidgetProvider};
use crate::error::{AdminError, Result};
use crate::jobs::{JobDefinition, JobRegistry, JobStatusSource};
use crate::menu::{ComposedMenu, Menu, MenuItem};
use crate::module::{Module, ModuleContext, ModuleManifest};
use crate::notifications::NotificationCenter;
use crate::panel::{Panel, PanelBuilder, PanelRegistry};
use crate::search::{SearchAdapter, SearchEngine};
use crate::server;
use crate::settings::{SettingDefinition, Settings};

/// Frozen registries served by the HTTP surface.
///
/// Nothing here is mutated after initialization apart from the interior
/// state of settings, notifications and job trigger outcomes.
pub struct AdminRuntime {
    /// Configuration.
    pub config: Config,
    /// Panels by slug.
    pub panels: PanelRegistry,
    /// Dashboard widgets.
    pub dashboard: DashboardEngine,
    /// Command handlers.
    pub commands: CommandBus,
    /// Search adapters.
    pub search: SearchEngine,
    /// Background jobs.
    pub jobs: JobRegistry,
    /// Settings.
    pub settings: Settings,
    /// Notification inbox.
    pub notifications: Arc<NotificationCenter>,
    /// Menu arena.
    pub menu: Menu,
    /// Authenticator; anonymous requests are let through when absent.
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Authentication settings.
    pub auth_config: AuthConfig,
    /// Authorization policy.
    pub authorizer: Arc<dyn Authorizer>,
    /// Manifests of the modules that loaded.
    pub modules: Vec<ModuleManifest>,
}

impl AdminRuntime {
    fn new(config: Config, notifications: Arc<NotificationCenter>) -> Self {
        let enabled = |name: &str| config.features.is_enabled(name);
        Self {
            dashboard: DashboardEngine::new(enabled(features::DASHBOARD)),
            commands: CommandBus::new(enabled(features::COMMANDS)),
            search: SearchEngine::new(enabled(features::SEARCH)),
            jobs: JobRegistry::new(enabled(features::JOBS)),
            panels: PanelRegistry::new(),
            settings: Settings::new(),
            notifications,
            menu: Menu::new(),
            authenticator: None,
            auth_config: AuthConfig::default(),
            authorizer: Arc::new(DefaultAuthorizer),
            modules: Vec::new(),
            config,
        }
    }

    /// Check `action` on `resource`, failing with `FORBIDDEN`.
    pub async fn authorize(&self, ctx: &AdminContext, action: &str, resource: &str) -> Result<()> {
        if self.authorizer.can(ctx, action, resource).await {
            Ok(())
        } else {
            debug!(user = %ctx.user_id, action, resource, "Authorization denied");
            Err(AdminError::Forbidden {
                action: action.to_string(),
                resource: resource.to_string(),
            })
        }
    }

    /// Check a record delete on `resource`, failing with `FORBIDDEN`.
    pub async fn authorize_delete(
        &self,
        ctx: &AdminContext,
        action: &str,
        resource: &str,
    ) -> Result<()> {
        if self.authorizer.can_delete(ctx, action, resource).await {
            Ok(())
        } else {
            debug!(user = %ctx.user_id, action, resource, "Delete denied");
            Err(AdminError::Forbidden {
                action: action.to_string(),
                resource: resource.to_string(),
            })
        }
    }

    /// Navigation menu for the caller's locale and permissions.
    pub async fn navigation(&self, ctx: &AdminContext) -> ComposedMenu {
        let code = &self.config.nav_menu_code;
        let mut allowed = BTreeSet::new();
        for token in self.menu.permission_tokens(code) {
            if self.authorizer.can(ctx, &token, "menu").await {
                allowed.insert(token);
            }
        }
        self.menu.compose_filtered(code, |item| {
            let locale_ok = item.locale.is_empty() || item.locale == ctx.locale;
            let permitted =
                item.permissions.is_empty() || item.permissions.iter().any(|p| allowed.contains(p));
            locale_ok && permitted
        })
    }
}

/// The admin instance.
pub struct Admin {
    config: Config,
    notifications: Arc<NotificationCenter>,
    registries: Option<Box<AdminRuntime>>,
    runtime: Option<Arc<AdminRuntime>>,
}

impl Admin {
    /// Create an admin in the configuring phase.
    pub fn new(config: Config) -> Self {
        let notifications = Arc::new(NotificationCenter::new());
        Self {
            registries: Some(Box::new(AdminRuntime::new(
                config.clone(),
                notifications.clone(),
            ))),
            runtime: None,
            notifications,
            config,
        }
    }

    /// Configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a feature is on.
    pub fn feature_enabled(&self, name: &str) -> bool {
        self.config.features.is_enabled(name)
    }

    /// Whether [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    /// Frozen runtime, once initialized.
    pub fn runtime(&self) -> Option<Arc<AdminRuntime>> {
        self.runtime.clone()
    }

    /// Notification inbox. Usable in both phases.
    pub fn notifications(&self) -> Arc<NotificationCenter> {
        self.notifications.clone()
    }

    fn registries(&mut self) -> Result<&mut AdminRuntime> {
        self.registries
            .as_deref_mut()
            .ok_or(AdminError::RegistrationClosed)
    }

    /// Panel registrar.
    pub fn panels(&mut self) -> Result<&mut PanelRegistry> {
        Ok(&mut self.registries()?.panels)
    }

    /// Dashboard registrar.
    pub fn dashboard(&mut self) -> Result<&mut DashboardEngine> {
        Ok(&mut self.registries()?.dashboard)
    }

    /// Command registrar.
    pub fn commands(&mut self) -> Result<&mut CommandBus> {
        Ok(&mut self.registries()?.commands)
    }

    /// Search registrar.
    pub fn search(&mut self) -> Result<&mut SearchEngine> {
        Ok(&mut self.registries()?.search)
    }

    /// Jobs registrar.
    pub fn jobs(&mut self) -> Result<&mut JobRegistry> {
        Ok(&mut self.registries()?.jobs)
    }

    /// Settings registrar.
    pub fn settings(&mut self) -> Result<&mut Settings> {
        Ok(&mut self.registries()?.settings)
    }

    /// Menu registrar.
    pub fn menu(&mut self) -> Result<&mut Menu> {
        Ok(&mut self.registries()?.menu)
    }

    /// Install an authenticator.
    pub fn with_auth(
        &mut self,
        authenticator: Arc<dyn Authenticator>,
        auth_config: AuthConfig,
    ) -> Result<()> {
        let registries = self.registries()?;
        registries.authenticator = Some(authenticator);
        registries.auth_config = auth_config;
        Ok(())
    }

    /// Install an authorization policy.
    pub fn with_authorizer(&mut self, authorizer: Arc<dyn Authorizer>) -> Result<()> {
        self.registries()?.authorizer = authorizer;
        Ok(())
    }

    /// Install the source of persisted job status.
    pub fn with_job_status_source(&mut self, source: Arc<dyn JobStatusSource>) -> Result<()> {
        self.registries()?.jobs.set_status_source(source);
        Ok(())
    }

    /// Register the CMS panels backed by `backend`.
    ///
    /// Registers nothing when the `cms` feature is off.
    pub fn with_cms(&mut self, backend: &dyn CmsBackend) -> Result<Vec<Arc<Panel>>> {
        if !self.feature_enabled(features::CMS) {
            return Ok(Vec::new());
        }
        let mut registered = Vec::new();
        for (slug, builder) in cms::panels(backend) {
            registered.push(self.register_panel(slug, builder)?);
        }
        info!(backend = backend.name(), "CMS panels registered");
        Ok(registered)
    }

    /// Build and register a panel.
    pub fn register_panel(&mut self, slug: &str, builder: PanelBuilder) -> Result<Arc<Panel>> {
        let panel = self.registries()?.panels.register(slug, builder)?;
        debug!(panel = %slug, "Registered panel");
        Ok(panel)
    }

    /// Register a dashboard widget.
    pub fn register_widget(
        &mut self,
        definition: WidgetDefinition,
        provider: Arc<dyn WidgetProvider>,
    ) -> Result<()> {
        self.registries()?.dashboard.register(definition, provider)
    }

    /// Register a command handler.
    ///
    /// Handlers with a cron schedule also appear in the jobs registry.
    pub fn register_command(&mut self, handler: Arc<dyn CommandHandler>) -> Result<()> {
        let registries = self.registries()?;
        let scheduled = handler.cron().map(|cron| {
            JobDefinition::new(handler.command_name(), handler.description())
                .schedule(cron)
                .command(handler.command_name())
        });
        registries.commands.register(handler)?;
        if let Some(job) = scheduled {
            if registries.commands.is_enabled() {
                registries.jobs.register(job)?;
            }
        }
        Ok(())
    }

    /// Register a search adapter.
    pub fn register_search_adapter(
        &mut self,
        key: impl Into<String>,
        adapter: Arc<dyn SearchAdapter>,
    ) -> Result<()> {
        self.registries()?.search.register(key, adapter)
    }

    /// Register a background job.
    pub fn register_job(&mut self, definition: JobDefinition) -> Result<()> {
        self.registries()?.jobs.register(definition)
    }

    /// Declare a setting.
    pub fn register_setting(&mut self, definition: SettingDefinition) -> Result<()> {
        self.registries()?.settings.register(definition)
    }

    /// Add a menu item to the navigation menu (or the item's own menu).
    pub fn add_menu_item(&mut self, item: MenuItem) -> Result<()> {
        let code = self.config.nav_menu_code.clone();
        self.registries()?.menu.add(item, &code)
    }

    /// Register a module.
    ///
    /// Returns `false` when the module was skipped because one of its
    /// features is disabled.
    pub fn register_module(&mut self, module: &dyn Module) -> Result<bool> {
        self.registries()?;
        let manifest = module.manifest();
        let disabled = manifest.disabled_features(&self.config.features);
        if !disabled.is_empty() {
            info!(module = %manifest.id, disabled = ?disabled, "Skipping module");
            return Ok(false);
        }
        if self.registries()?.modules.iter().any(|m| m.id == manifest.id) {
            return Err(AdminError::DuplicateRegistration {
                registry: "modules",
                key: manifest.id,
            });
        }

        module.register(&mut ModuleContext::new(self))?;
        let locale = self.config.default_locale.clone();
        for item in module.menu_items(&locale) {
            self.add_menu_item(item)?;
        }
        info!(module = %manifest.id, "Registered module");
        self.registries()?.modules.push(manifest);
        Ok(true)
    }

    /// Freeze the registries and bind the admin routes onto `router`.
    ///
    /// Routes are nested under the configured base path. A second call fails
    /// with `ADMIN_ALREADY_INITIALIZED` and leaves `router` untouched.
    pub fn initialize(&mut self, router: &mut Router) -> Result<()> {
        let registries = self.registries.take().ok_or(AdminError::AlreadyInitialized)?;
        let runtime: Arc<AdminRuntime> = Arc::new(*registries);

        for panel in runtime.panels.iter() {
            for action in panel.actions().iter().chain(panel.bulk_actions()) {
                if action.is_command()
                    && runtime.commands.is_enabled()
                    && !runtime.commands.contains(&action.command_name)
                {
                    warn!(
                        panel = %panel.slug(),
                        action = %action.name,
                        command = %action.command_name,
                        "Action is bound to an unregistered command"
                    );
                }
            }
        }

        let admin_routes = server::router(runtime.clone());
        let base = runtime.config.base_path.clone();
        let current = std::mem::take(router);
        *router = if base.is_empty() {
            current.merge(admin_routes)
        } else {
            current.nest(&base, admin_routes)
        };

        info!(
            base_path = %base,
            panels = runtime.panels.len(),
            modules = runtime.modules.len(),
            "Admin initialized"
        );
        self.runtime = Some(runtime);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Field;
    use crate::repository::MemoryRepository;

    struct Catalog;

    impl Module for Catalog {
        fn manifest(&self) -> ModuleManifest {
            ModuleManifest::new("catalog").requires(features::SEARCH)
        }

        fn register(&self, ctx: &mut ModuleContext<'_>) -> Result<()> {
            ctx.admin().register_panel(
                "products",
                PanelBuilder::new("Products")
                    .with_repository(Arc::new(MemoryRepository::new("product")))
                    .list_fields([Field::text("name", "Name")]),
            )?;
            Ok(())
        }

        fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
            vec![MenuItem::panel("products", "Products", "products")]
        }
    }

    #[test]
    fn test_module_registers_panels_and_menu() {
        let mut admin = Admin::new(Config::default());
        assert!(admin.register_module(&Catalog).unwrap());
        assert!(admin.panels().unwrap().get("products").is_some());
        assert!(admin.menu().unwrap().get("products").is_some());
        assert!(admin.register_module(&Catalog).is_err());
    }

    #[test]
    fn test_module_skipped_when_feature_disabled() {
        let config = Config::default().with_feature(features::SEARCH, false);
        let mut admin = Admin::new(config);
        assert!(!admin.register_module(&Catalog).unwrap());
        assert!(admin.panels().unwrap().is_empty());
    }

    #[test]
    fn test_initialize_twice_fails_and_closes_registration() {
        let mut admin = Admin::new(Config::default());
        let mut router = Router::new();
        admin.initialize(&mut router).unwrap();
        assert!(admin.is_initialized());

        let err = admin.initialize(&mut router).unwrap_err();
        assert_eq!(err.error_code(), "ADMIN_ALREADY_INITIALIZED");

        let err = admin.register_module(&Catalog).unwrap_err();
        assert_eq!(err.error_code(), "REGISTRATION_CLOSED");
        assert!(admin.dashboard().is_err());
    }

    #[test]
    fn test_cms_follows_feature_flag() {
        let backend = cms::MemoryCms::new();
        let mut on = Admin::new(Config::default());
        assert_eq!(on.with_cms(&backend).unwrap().len(), 3);

        let mut off = Admin::new(Config::default().with_feature(features::CMS, false));
        assert!(off.with_cms(&backend).unwrap().is_empty());
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Panel builder and registry.
//!
//! A [`PanelBuilder`] collects descriptors; [`PanelBuilder::build`] validates
//! them and freezes an immutable [`Panel`]. The [`PanelRegistry`] addresses
//! frozen panels by slug.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::context::AdminContext;
use crate::descriptor::{Action, Field, FieldType, Filter, PanelPermissions, Tab};
use crate::error::{AdminError, Result};
use crate::record::{Record, Schema, WriteMode};
use crate::repository::{ListOptions, ListResult, Repository};

/// Form field names contributed by the blocks capability.
pub const BLOCK_FIELDS: [&str; 1] = ["blocks"];

/// Form field names contributed by the SEO capability.
pub const SEO_FIELDS: [&str; 4] = ["seo", "meta_title", "meta_description", "meta_keywords"];

/// Slugs taken by non-panel routes.
pub const RESERVED_SLUGS: [&str; 7] = [
    "dashboard",
    "search",
    "jobs",
    "navigation",
    "settings",
    "notifications",
    "panels",
];

/// CRUD operation on a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOperation {
    /// List and detail.
    View,
    /// Create.
    Create,
    /// Partial update.
    Edit,
    /// Delete.
    Delete,
}

impl PanelOperation {
    fn suffix(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

/// Inline invocation of a panel action that has no command.
#[derive(Debug, Clone)]
pub struct ActionInvocation {
    /// Action name.
    pub action: String,
    /// Target record ids (empty for panel-level actions).
    pub ids: Vec<String>,
    /// Validated payload.
    pub payload: Map<String, JsonValue>,
}

/// Handler for actions without a `command_name`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action against the panel's repository.
    async fn handle(
        &self,
        ctx: &AdminContext,
        repository: &dyn Repository,
        invocation: ActionInvocation,
    ) -> Result<JsonValue>;
}

/// Fluent composer of a panel.
///
/// Later calls to a setter replace what earlier calls set.
#[derive(Default)]
pub struct PanelBuilder {
    name: String,
    repository: Option<Arc<dyn Repository>>,
    list_fields: Vec<Field>,
    form_fields: Vec<Field>,
    detail_fields: Vec<Field>,
    filters: Vec<Filter>,
    actions: Vec<Action>,
    bulk_actions: Vec<Action>,
    tabs: Vec<Tab>,
    permissions: PanelPermissions,
    uses_blocks: bool,
    uses_seo: bool,
    tree_view: bool,
    action_handler: Option<Arc<dyn ActionHandler>>,
}

impl PanelBuilder {
    /// Start a panel with a display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Bind the data source.
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Fields shown in the list view.
    pub fn list_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.list_fields = fields.into_iter().collect();
        self
    }

    /// Fields accepted by create and update.
    pub fn form_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.form_fields = fields.into_iter().collect();
        self
    }

    /// Fields shown in the detail view.
    pub fn detail_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.detail_fields = fields.into_iter().collect();
        self
    }

    /// List filters.
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters = filters.into_iter().collect();
        self
    }

    /// Row and panel actions.
    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    /// Actions applied to a selection of rows.
    pub fn bulk_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.bulk_actions = actions.into_iter().collect();
        self
    }

    /// Detail tabs.
    pub fn tabs(mut self, tabs: impl IntoIterator<Item = Tab>) -> Self {
        self.tabs = tabs.into_iter().collect();
        self
    }

    /// CRUD permission tokens.
    pub fn permissions(mut self, permissions: PanelPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Toggle the blocks capability.
    pub fn use_blocks(mut self, enabled: bool) -> Self {
        self.uses_blocks = enabled;
        self
    }

    /// Toggle the SEO capability.
    pub fn use_seo(mut self, enabled: bool) -> Self {
        self.uses_seo = enabled;
        self
    }

    /// Render the list as a tree.
    pub fn tree_view(mut self, enabled: bool) -> Self {
        self.tree_view = enabled;
        self
    }

    /// Handler for inline actions.
    pub fn with_action_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.action_handler = Some(handler);
        self
    }

    /// Validate and freeze the panel under `slug`.
    pub fn build(self, slug: &str) -> Result<Panel> {
        let invalid = |message: String| AdminError::PanelValidation {
            panel: slug.to_string(),
            message,
        };

        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(invalid(format!("slug '{}' must match [a-z0-9_-]+", slug)));
        }
        if RESERVED_SLUGS.contains(&slug) {
            return Err(invalid(format!("slug '{}' is reserved", slug)));
        }

        let repository = self
            .repository
            .ok_or_else(|| AdminError::PanelRepositoryMissing {
                panel: slug.to_string(),
            })?;

        let form_fields = if self.form_fields.is_empty() {
            self.list_fields.clone()
        } else {
            self.form_fields
        };
        let detail_fields = if self.detail_fields.is_empty() {
            form_fields.clone()
        } else {
            self.detail_fields
        };

        for field in self
            .list_fields
            .iter()
            .chain(&form_fields)
            .chain(&detail_fields)
        {
            if field.field_type == FieldType::Select && field.options.is_empty() {
                return Err(invalid(format!(
                    "select field '{}' declares no options",
                    field.name
                )));
            }
        }

        let list_names: BTreeSet<&str> = self.list_fields.iter().map(|f| f.name.as_str()).collect();
        for field in &form_fields {
            let derived = matches!(
                field.field_type,
                FieldType::Media | FieldType::BlockLibraryPicker
            ) || (self.uses_blocks && BLOCK_FIELDS.contains(&field.name.as_str()))
                || (self.uses_seo && SEO_FIELDS.contains(&field.name.as_str()));
            if !derived && !list_names.contains(field.name.as_str()) {
                return Err(invalid(format!(
                    "form field '{}' is not a list field",
                    field.name
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for action in self.actions.iter().chain(&self.bulk_actions) {
            validate_action(action).map_err(&invalid)?;
            seen.insert(action.name.as_str());
        }
        for action in &self.bulk_actions {
            if action.label.trim().is_empty() {
                return Err(invalid(format!("bulk action '{}' has no label", action.name)));
            }
        }
        let mut names = BTreeSet::new();
        for action in &self.actions {
            if !names.insert(action.name.as_str()) {
                return Err(invalid(format!("duplicate action '{}'", action.name)));
            }
        }

        let schema = Schema::from_fields(&form_fields);
        debug!(panel = %slug, actions = seen.len(), "Panel built");

        Ok(Panel {
            slug: slug.to_string(),
            name: self.name,
            repository,
            list_fields: self.list_fields,
            form_fields,
            detail_fields,
            filters: self.filters,
            actions: self.actions,
            bulk_actions: self.bulk_actions,
            tabs: self.tabs,
            permissions: self.permissions,
            uses_blocks: self.uses_blocks,
            uses_seo: self.uses_seo,
            tree_view: self.tree_view,
            action_handler: self.action_handler,
            schema,
        })
    }
}

fn validate_action(action: &Action) -> std::result::Result<(), String> {
    if action.name.trim().is_empty() {
        return Err("action without a name".to_string());
    }
    if action.is_command() && action.permission.trim().is_empty() {
        return Err(format!(
            "action '{}' dispatches '{}' without a permission",
            action.name, action.command_name
        ));
    }
    if !action.payload_required.is_empty() {
        let schema = action.payload_schema.as_ref().ok_or_else(|| {
            format!(
                "action '{}' requires payload keys but declares no payload schema",
                action.name
            )
        })?;
        if schema.additional_properties {
            return Err(format!(
                "action '{}' payload schema must set additionalProperties to false",
                action.name
            ));
        }
        if let Some(key) = action
            .payload_required
            .iter()
            .find(|k| !schema.properties.contains_key(k.as_str()))
        {
            return Err(format!(
                "action '{}' requires payload key '{}' missing from its schema",
                action.name, key
            ));
        }
    }
    Ok(())
}

/// An immutable, registered panel.
pub struct Panel {
    slug: String,
    name: String,
    repository: Arc<dyn Repository>,
    list_fields: Vec<Field>,
    form_fields: Vec<Field>,
    detail_fields: Vec<Field>,
    filters: Vec<Filter>,
    actions: Vec<Action>,
    bulk_actions: Vec<Action>,
    tabs: Vec<Tab>,
    permissions: PanelPermissions,
    uses_blocks: bool,
    uses_seo: bool,
    tree_view: bool,
    action_handler: Option<Arc<dyn ActionHandler>>,
    schema: Schema,
}

/// Serializable view of a panel's descriptors.
#[derive(Debug, Clone, Serialize)]
pub struct PanelDescriptor<'a> {
    /// Slug.
    pub slug: &'a str,
    /// Display name.
    pub name: &'a str,
    /// List columns.
    pub list_fields: &'a [Field],
    /// Form inputs.
    pub form_fields: &'a [Field],
    /// Detail rows.
    pub detail_fields: &'a [Field],
    /// List filters.
    pub filters: &'a [Filter],
    /// Row and panel actions.
    pub actions: &'a [Action],
    /// Bulk actions.
    pub bulk_actions: &'a [Action],
    /// Detail tabs.
    pub tabs: &'a [Tab],
    /// Permission tokens.
    pub permissions: &'a PanelPermissions,
    /// Blocks capability.
    pub uses_blocks: bool,
    /// SEO capability.
    pub uses_seo: bool,
    /// Tree rendering.
    pub tree_view: bool,
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("slug", &self.slug)
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

impl Panel {
    /// Slug the panel is addressed by.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound repository.
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// List columns.
    pub fn list_fields(&self) -> &[Field] {
        &self.list_fields
    }

    /// Form inputs.
    pub fn form_fields(&self) -> &[Field] {
        &self.form_fields
    }

    /// Detail rows.
    pub fn detail_fields(&self) -> &[Field] {
        &self.detail_fields
    }

    /// Row and panel actions.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Bulk actions.
    pub fn bulk_actions(&self) -> &[Action] {
        &self.bulk_actions
    }

    /// CRUD permission tokens.
    pub fn permissions(&self) -> &PanelPermissions {
        &self.permissions
    }

    /// Capability flags `(uses_blocks, uses_seo, tree_view)`.
    pub fn flags(&self) -> (bool, bool, bool) {
        (self.uses_blocks, self.uses_seo, self.tree_view)
    }

    /// Serializable descriptor view.
    pub fn descriptor(&self) -> PanelDescriptor<'_> {
        PanelDescriptor {
            slug: &self.slug,
            name: &self.name,
            list_fields: &self.list_fields,
            form_fields: &self.form_fields,
            detail_fields: &self.detail_fields,
            filters: &self.filters,
            actions: &self.actions,
            bulk_actions: &self.bulk_actions,
            tabs: &self.tabs,
            permissions: &self.permissions,
            uses_blocks: self.uses_blocks,
            uses_seo: self.uses_seo,
            tree_view: self.tree_view,
        }
    }

    /// Authorizer token for a CRUD operation.
    ///
    /// Falls back to `<slug>.<operation>` when the panel declares none.
    pub fn permission_token(&self, operation: PanelOperation) -> String {
        let declared = match operation {
            PanelOperation::View => &self.permissions.view,
            PanelOperation::Create => &self.permissions.create,
            PanelOperation::Edit => &self.permissions.edit,
            PanelOperation::Delete => &self.permissions.delete,
        };
        if declared.is_empty() {
            format!("{}.{}", self.slug, operation.suffix())
        } else {
            declared.clone()
        }
    }

    /// Look up a row/panel action.
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Look up a bulk action.
    pub fn bulk_action(&self, name: &str) -> Option<&Action> {
        self.bulk_actions.iter().find(|a| a.name == name)
    }

    /// List records.
    pub async fn list(&self, ctx: &AdminContext, options: ListOptions) -> Result<ListResult> {
        self.repository.list(ctx, options.normalized()).await
    }

    /// Fetch one record.
    pub async fn get(&self, ctx: &AdminContext, id: &str) -> Result<Record> {
        self.repository.get(ctx, id).await
    }

    /// Coerce `input` against the form schema and create a record.
    pub async fn create(&self, ctx: &AdminContext, input: &JsonValue) -> Result<Record> {
        let record = self.schema.coerce(input, WriteMode::Create)?;
        self.repository.create(ctx, record).await
    }

    /// Coerce `input` as a patch and update a record.
    pub async fn update(&self, ctx: &AdminContext, id: &str, input: &JsonValue) -> Result<Record> {
        let patch = self.schema.coerce(input, WriteMode::Patch)?;
        self.repository.update(ctx, id, patch).await
    }

    /// Delete a record.
    pub async fn delete(&self, ctx: &AdminContext, id: &str) -> Result<()> {
        self.repository.delete(ctx, id).await
    }

    /// Run an inline action through the panel's action handler.
    pub async fn invoke_inline(
        &self,
        ctx: &AdminContext,
        invocation: ActionInvocation,
    ) -> Result<JsonValue> {
        let handler = self
            .action_handler
            .as_ref()
            .ok_or_else(|| AdminError::DependenciesNotConfigured {
                dependency: format!("action handler for panel '{}'", self.slug),
            })?;
        handler
            .handle(ctx, self.repository.as_ref(), invocation)
            .await
    }
}

/// Panels addressable by slug, in registration order.
#[derive(Default)]
pub struct PanelRegistry {
    panels: Vec<Arc<Panel>>,
}

impl PanelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `builder` under `slug` and register it.
    pub fn register(&mut self, slug: &str, builder: PanelBuilder) -> Result<Arc<Panel>> {
        if self.get(slug).is_some() {
            return Err(AdminError::PanelDuplicate {
                slug: slug.to_string(),
            });
        }
        let panel = Arc::new(builder.build(slug)?);
        self.panels.push(panel.clone());
        Ok(panel)
    }

    /// Look up a panel.
    pub fn get(&self, slug: &str) -> Option<&Arc<Panel>> {
        self.panels.iter().find(|p| p.slug == slug)
    }

    /// Registered panels.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Panel>> {
        self.panels.iter()
    }

    /// Number of panels.
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// Whether no panel is registered.
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PayloadSchema;
    use crate::repository::MemoryRepository;

    fn repo() -> Arc<dyn Repository> {
        Arc::new(MemoryRepository::new("product"))
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::text("name", "Name").required(),
            Field::select("status", "Status").option("active", "Active"),
        ]
    }

    #[test]
    fn test_build_valid_panel() {
        let panel = PanelBuilder::new("Products")
            .with_repository(repo())
            .list_fields(fields())
            .actions([Action::new("archive", "Archive")])
            .build("products")
            .unwrap();
        assert_eq!(panel.slug(), "products");
        assert_eq!(panel.form_fields().len(), 2);
        assert_eq!(panel.permission_token(PanelOperation::Delete), "products.delete");
    }

    #[test]
    fn test_missing_repository() {
        let err = PanelBuilder::new("Products")
            .list_fields(fields())
            .build("products")
            .unwrap_err();
        assert_eq!(err.error_code(), "PANEL_REPOSITORY_MISSING");
    }

    #[test]
    fn test_select_without_options_is_rejected() {
        let err = PanelBuilder::new("Products")
            .with_repository(repo())
            .list_fields([Field::select("status", "Status")])
            .build("products")
            .unwrap_err();
        assert_eq!(err.error_code(), "PANEL_VALIDATION");
    }

    #[test]
    fn test_command_action_needs_permission() {
        let err = PanelBuilder::new("Products")
            .with_repository(repo())
            .list_fields(fields())
            .actions([Action::new("restock", "Restock").command("inventory.restock")])
            .build("products")
            .unwrap_err();
        assert!(err.to_string().contains("without a permission"));
    }

    #[test]
    fn test_bulk_action_needs_label() {
        let err = PanelBuilder::new("Products")
            .with_repository(repo())
            .list_fields(fields())
            .bulk_actions([Action::new("archive", "")])
            .build("products")
            .unwrap_err();
        assert!(err.to_string().contains("no label"));
    }

    #[test]
    fn test_payload_required_needs_closed_schema() {
        let open = Action::new("restock", "Restock")
            .command("inventory.restock")
            .permission("products.edit")
            .payload(&["quantity"], PayloadSchema::default().property("quantity", "integer"));
        let err = PanelBuilder::new("Products")
            .with_repository(repo())
            .list_fields(fields())
            .actions([open])
            .build("products")
            .unwrap_err();
        assert!(err.to_string().contains("additionalProperties"));

        let undeclared = Action::new("restock", "Restock")
            .command("inventory.restock")
            .permission("products.edit")
            .payload(&["quantity"], PayloadSchema::closed().property("note", "string"));
        assert!(
            PanelBuilder::new("Products")
                .with_repository(repo())
                .list_fields(fields())
                .actions([undeclared])
                .build("products")
                .is_err()
        );
    }

    #[test]
    fn test_form_fields_must_come_from_list() {
        let builder = || {
            PanelBuilder::new("Pages")
                .with_repository(repo())
                .list_fields([Field::text("title", "Title")])
        };
        assert!(
            builder()
                .form_fields([Field::text("title", "Title"), Field::text("body", "Body")])
                .build("pages")
                .is_err()
        );
        assert!(
            builder()
                .use_seo(true)
                .form_fields([
                    Field::text("title", "Title"),
                    Field::text("meta_title", "Meta title"),
                    Field::new("hero", "Hero", FieldType::Media),
                ])
                .build("pages")
                .is_ok()
        );
    }

    #[test]
    fn test_registry_rejects_duplicates_and_reserved() {
        let mut registry = PanelRegistry::new();
        let builder = || {
            PanelBuilder::new("Products")
                .with_repository(repo())
                .list_fields(fields())
        };
        registry.register("products", builder()).unwrap();
        let err = registry.register("products", builder()).unwrap_err();
        assert_eq!(err.error_code(), "PANEL_DUPLICATE");
        assert!(registry.register("dashboard", builder()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_create_coerces_against_form_schema() {
        let panel = PanelBuilder::new("Products")
            .with_repository(repo())
            .list_fields(fields())
            .build("products")
            .unwrap();
        let ctx = AdminContext::default();
        let err = panel
            .create(&ctx, &serde_json::json!({"status": "active"}))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        let created = panel
            .create(&ctx, &serde_json::json!({"name": "Hoodie", "status": "active"}))
            .await
            .unwrap();
        assert_eq!(panel.get(&ctx, &created.id).await.unwrap(), created);
    }
}

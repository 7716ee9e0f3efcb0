// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Commerce back office: products, orders and inventory restocking.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue, json};
use tessera_admin::commands::{CommandHandler, CommandMessage};
use tessera_admin::dashboard::{WidgetDefinition, WidgetPayload, WidgetProvider};
use tessera_admin::descriptor::{Action, Field, FieldType, Filter, PanelPermissions, PayloadSchema};
use tessera_admin::menu::MenuItem;
use tessera_admin::module::{Module, ModuleContext, ModuleManifest};
use tessera_admin::repository::{MAX_PER_PAGE, int_cell};
use tessera_admin::search::RepositorySearchAdapter;
use tessera_admin::settings::SettingDefinition;
use tessera_admin::{
    AdminContext, ListOptions, MemoryRepository, PanelBuilder, Record, Repository, Result,
};
use tracing::info;

pub const PRODUCTS_PANEL: &str = "products";
pub const ORDERS_PANEL: &str = "orders";
pub const RESTOCK_COMMAND: &str = "commerce.restock";

/// Products at or below this inventory count as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
/// Inventory level a restock brings a product up to.
pub const DEFAULT_RESTOCK_LEVEL: i64 = 25;

fn product_fields() -> Vec<Field> {
    vec![
        Field::text("name", "Name").required(),
        Field::text("sku", "SKU").required(),
        Field::number("price", "Price").required(),
        Field::number("inventory", "Inventory"),
        Field::select("status", "Status")
            .option("draft", "Draft")
            .option("active", "Active")
            .option("archived", "Archived"),
    ]
}

fn order_fields() -> Vec<Field> {
    vec![
        Field::text("number", "Number").required(),
        Field::text("customer", "Customer").required(),
        Field::new("email", "Email", FieldType::Email),
        Field::number("total", "Total"),
        Field::select("status", "Status")
            .option("pending", "Pending")
            .option("paid", "Paid")
            .option("shipped", "Shipped")
            .option("cancelled", "Cancelled"),
    ]
}

/// Every record of `repository`, page by page.
async fn all_records(repository: &dyn Repository, ctx: &AdminContext) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut page = 1;
    loop {
        let result = repository
            .list(
                ctx,
                ListOptions {
                    page,
                    per_page: MAX_PER_PAGE,
                    ..ListOptions::default()
                },
            )
            .await?;
        let fetched = result.records.len();
        records.extend(result.records);
        if fetched == 0 || records.len() >= result.total {
            return Ok(records);
        }
        page += 1;
    }
}

fn threshold(config: &JsonValue) -> i64 {
    config
        .get("threshold")
        .and_then(JsonValue::as_i64)
        .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)
}

// ============================================================================
// Restock command
// ============================================================================

/// Brings low-stock products back to the restock level.
///
/// With `ids`, only those products are restocked. Without, every product at
/// or below `payload.threshold` is. Runs hourly through the jobs registry.
pub struct RestockCommand {
    products: Arc<MemoryRepository>,
}

impl RestockCommand {
    pub fn new(products: Arc<MemoryRepository>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CommandHandler for RestockCommand {
    fn command_name(&self) -> &str {
        RESTOCK_COMMAND
    }

    fn cron(&self) -> Option<&str> {
        Some("0 * * * *")
    }

    fn description(&self) -> &str {
        "Restock products running low on inventory"
    }

    async fn execute(&self, ctx: &AdminContext, message: &CommandMessage) -> Result<JsonValue> {
        let limit = threshold(&JsonValue::Object(message.payload.clone()));
        let level = message
            .payload
            .get("level")
            .and_then(JsonValue::as_i64)
            .unwrap_or(DEFAULT_RESTOCK_LEVEL);

        let candidates = if message.ids.is_empty() {
            all_records(self.products.as_ref(), ctx)
                .await?
                .into_iter()
                .filter(|p| int_cell(p, "inventory") <= limit)
                .collect()
        } else {
            let mut selected = Vec::with_capacity(message.ids.len());
            for id in &message.ids {
                selected.push(self.products.get(ctx, id).await?);
            }
            selected
        };

        let mut restocked = Vec::new();
        for product in candidates {
            if int_cell(&product, "inventory") >= level {
                continue;
            }
            self.products
                .update(ctx, &product.id, Record::new().with("inventory", level))
                .await?;
            restocked.push(product.id);
        }

        info!(count = restocked.len(), level, "Products restocked");
        Ok(json!({ "restocked": restocked, "level": level }))
    }
}

// ============================================================================
// Widgets
// ============================================================================

/// Product counts and low-stock alerts.
pub struct CatalogOverview {
    products: Arc<MemoryRepository>,
}

#[async_trait]
impl WidgetProvider for CatalogOverview {
    async fn render(&self, ctx: &AdminContext, config: &JsonValue) -> Result<WidgetPayload> {
        let limit = threshold(config);
        let products = all_records(self.products.as_ref(), ctx).await?;
        let low_stock: Vec<JsonValue> = products
            .iter()
            .filter(|p| int_cell(p, "inventory") <= limit)
            .map(|p| json!({ "id": p.id, "name": p.get_str("name"), "inventory": int_cell(p, "inventory") }))
            .collect();
        let active = products
            .iter()
            .filter(|p| p.get_str("status") == Some("active"))
            .count();

        let mut payload = Map::new();
        payload.insert("products".to_string(), json!(products.len()));
        payload.insert("active".to_string(), json!(active));
        payload.insert("low_stock".to_string(), json!(low_stock.len()));
        payload.insert("low_stock_items".to_string(), JsonValue::Array(low_stock));
        payload.insert("threshold".to_string(), json!(limit));
        Ok(payload)
    }
}

/// Order volume and revenue.
pub struct SalesSummary {
    orders: Arc<MemoryRepository>,
}

#[async_trait]
impl WidgetProvider for SalesSummary {
    async fn render(&self, ctx: &AdminContext, _config: &JsonValue) -> Result<WidgetPayload> {
        let orders = all_records(self.orders.as_ref(), ctx).await?;
        let revenue: f64 = orders
            .iter()
            .filter(|o| o.get_str("status") != Some("cancelled"))
            .filter_map(|o| o.get("total").and_then(|v| v.as_f64()))
            .sum();
        let recent: Vec<JsonValue> = orders
            .iter()
            .rev()
            .take(5)
            .map(|o| json!({ "id": o.id, "number": o.get_str("number"), "customer": o.get_str("customer") }))
            .collect();

        let mut payload = Map::new();
        payload.insert("orders".to_string(), json!(orders.len()));
        payload.insert("revenue".to_string(), json!((revenue * 100.0).round() / 100.0));
        payload.insert("recent".to_string(), JsonValue::Array(recent));
        Ok(payload)
    }
}

// ============================================================================
// Module
// ============================================================================

/// Registers the commerce panels, widgets, search adapters and jobs.
pub struct CommerceModule {
    products: Arc<MemoryRepository>,
    orders: Arc<MemoryRepository>,
}

impl Default for CommerceModule {
    fn default() -> Self {
        Self::new()
    }
}

impl CommerceModule {
    pub fn new() -> Self {
        Self {
            products: Arc::new(MemoryRepository::new("product")),
            orders: Arc::new(MemoryRepository::new("order")),
        }
    }

    pub fn products(&self) -> Arc<MemoryRepository> {
        self.products.clone()
    }

    pub fn orders(&self) -> Arc<MemoryRepository> {
        self.orders.clone()
    }
}

impl Module for CommerceModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            name_key: "commerce.module.name".to_string(),
            description_key: "commerce.module.description".to_string(),
            ..ModuleManifest::new("commerce")
        }
    }

    fn register(&self, ctx: &mut ModuleContext<'_>) -> Result<()> {
        let admin = ctx.admin();

        admin.register_panel(
            PRODUCTS_PANEL,
            PanelBuilder::new("Products")
                .with_repository(self.products.clone())
                .list_fields(product_fields())
                .filters([
                    Filter::search(),
                    Filter::new("status", "Status", FieldType::Select),
                ])
                .bulk_actions([Action::new("restock", "Restock")
                    .command(RESTOCK_COMMAND)
                    .permission("products.restock")
                    .icon("package")
                    .payload(&[], PayloadSchema::closed().property("level", "integer"))])
                .permissions(PanelPermissions::prefixed(PRODUCTS_PANEL)),
        )?;

        admin.register_panel(
            ORDERS_PANEL,
            PanelBuilder::new("Orders")
                .with_repository(self.orders.clone())
                .list_fields(order_fields())
                .filters([
                    Filter::search(),
                    Filter::new("status", "Status", FieldType::Select),
                ])
                .permissions(PanelPermissions::prefixed(ORDERS_PANEL)),
        )?;

        admin.register_widget(
            WidgetDefinition::new("commerce.catalog_overview", "Catalog")
                .config(json!({ "threshold": DEFAULT_LOW_STOCK_THRESHOLD }))
                .command(RESTOCK_COMMAND)
                .require(&["products", "low_stock"]),
            Arc::new(CatalogOverview {
                products: self.products.clone(),
            }),
        )?;
        admin.register_widget(
            WidgetDefinition::new("commerce.sales_summary", "Sales")
                .area("sidebar")
                .require(&["orders", "revenue"]),
            Arc::new(SalesSummary {
                orders: self.orders.clone(),
            }),
        )?;

        admin.register_search_adapter(
            PRODUCTS_PANEL,
            Arc::new(
                RepositorySearchAdapter::new("product", self.products.clone(), "name", "/products")
                    .description_field("sku")
                    .icon("tag"),
            ),
        )?;
        admin.register_search_adapter(
            ORDERS_PANEL,
            Arc::new(
                RepositorySearchAdapter::new("order", self.orders.clone(), "number", "/orders")
                    .description_field("customer")
                    .require_permission("orders.view")
                    .icon("receipt"),
            ),
        )?;

        admin.register_command(Arc::new(RestockCommand::new(self.products.clone())))?;

        admin.register_setting(SettingDefinition::new(
            "store.currency",
            "Currency",
            json!("EUR"),
        ))?;
        admin.register_setting(SettingDefinition {
            description: "Inventory at or below which a product counts as low stock".to_string(),
            ..SettingDefinition::new(
                "store.low_stock_threshold",
                "Low stock threshold",
                json!(DEFAULT_LOW_STOCK_THRESHOLD),
            )
        })?;

        Ok(())
    }

    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        vec![
            MenuItem::group("commerce", "Store").icon("store").position(10),
            MenuItem::panel("commerce.products", "Products", PRODUCTS_PANEL)
                .parent("commerce")
                .icon("tag")
                .position(1)
                .permission("products.view"),
            MenuItem::panel("commerce.orders", "Orders", ORDERS_PANEL)
                .parent("commerce")
                .icon("receipt")
                .position(2)
                .permission("orders.view"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_admin::Scope;

    fn ctx() -> AdminContext {
        AdminContext::system(Scope::new("t1", "o1"))
    }

    async fn seeded() -> Arc<MemoryRepository> {
        let products = Arc::new(MemoryRepository::new("product"));
        products
            .seed(
                &ctx().scope,
                [
                    Record::new().with("name", "Hoodie").with("inventory", 2i64),
                    Record::new().with("name", "Cap").with("inventory", 40i64),
                    Record::new().with("name", "Socks").with("inventory", 5i64),
                ],
            )
            .await;
        products
    }

    #[tokio::test]
    async fn test_restock_low_inventory() {
        let products = seeded().await;
        let command = RestockCommand::new(products.clone());

        let result = command
            .execute(&ctx(), &CommandMessage::new(RESTOCK_COMMAND))
            .await
            .unwrap();
        assert_eq!(result["restocked"].as_array().unwrap().len(), 2);

        let all = all_records(products.as_ref(), &ctx()).await.unwrap();
        assert!(all.iter().all(|p| int_cell(p, "inventory") >= DEFAULT_RESTOCK_LEVEL));
    }

    #[tokio::test]
    async fn test_restock_selected_ids_with_level() {
        let products = seeded().await;
        let command = RestockCommand::new(products.clone());
        let mut payload = Map::new();
        payload.insert("level".to_string(), json!(100));

        let message = CommandMessage::new(RESTOCK_COMMAND)
            .with_payload(payload)
            .with_ids(vec!["2".to_string()]);
        let result = command.execute(&ctx(), &message).await.unwrap();

        assert_eq!(result["restocked"], json!(["2"]));
        let cap = products.get(&ctx(), "2").await.unwrap();
        assert_eq!(int_cell(&cap, "inventory"), 100);
        let hoodie = products.get(&ctx(), "1").await.unwrap();
        assert_eq!(int_cell(&hoodie, "inventory"), 2);
    }

    #[tokio::test]
    async fn test_catalog_overview_counts_low_stock() {
        let widget = CatalogOverview {
            products: seeded().await,
        };
        let payload = widget
            .render(&ctx(), &json!({ "threshold": 5 }))
            .await
            .unwrap();
        assert_eq!(payload["products"], 3);
        assert_eq!(payload["low_stock"], 2);
    }
}

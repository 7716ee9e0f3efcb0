// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! CMS strategy interface.
//!
//! A [`CmsBackend`] hands out the repositories for pages, contents and
//! blocks. The admin turns them into three panels when the `cms` feature is
//! on. Backends are chosen by the host; [`MemoryCms`] keeps everything in
//! process.

use std::sync::Arc;

use crate::descriptor::{Field, FieldType, Filter, PanelPermissions};
use crate::panel::PanelBuilder;
use crate::repository::{MemoryRepository, Repository};

/// Slug of the pages panel.
pub const PAGES_PANEL: &str = "pages";
/// Slug of the contents panel.
pub const CONTENTS_PANEL: &str = "contents";
/// Slug of the blocks panel.
pub const BLOCKS_PANEL: &str = "blocks";

/// Storage strategy for CMS entities.
pub trait CmsBackend: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Page repository.
    fn pages(&self) -> Arc<dyn Repository>;

    /// Content entry repository.
    fn contents(&self) -> Arc<dyn Repository>;

    /// Block definition repository.
    fn blocks(&self) -> Arc<dyn Repository>;
}

/// In-memory CMS backend.
pub struct MemoryCms {
    pages: Arc<MemoryRepository>,
    contents: Arc<MemoryRepository>,
    blocks: Arc<MemoryRepository>,
}

impl Default for MemoryCms {
    fn default() -> Self {
        Self {
            pages: Arc::new(MemoryRepository::new("page")),
            contents: Arc::new(MemoryRepository::new("content")),
            blocks: Arc::new(MemoryRepository::new("block")),
        }
    }
}

impl MemoryCms {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CmsBackend for MemoryCms {
    fn name(&self) -> &str {
        "memory"
    }

    fn pages(&self) -> Arc<dyn Repository> {
        self.pages.clone()
    }

    fn contents(&self) -> Arc<dyn Repository> {
        self.contents.clone()
    }

    fn blocks(&self) -> Arc<dyn Repository> {
        self.blocks.clone()
    }
}

fn status_field() -> Field {
    Field::select("status", "Status")
        .option("draft", "Draft")
        .option("published", "Published")
}

/// Builders for the pages, contents and blocks panels, keyed by slug.
pub fn panels(backend: &dyn CmsBackend) -> Vec<(&'static str, PanelBuilder)> {
    let pages = PanelBuilder::new("Pages")
        .with_repository(backend.pages())
        .list_fields([
            Field::text("title", "Title").required(),
            Field::text("path", "Path").required(),
            status_field(),
        ])
        .form_fields([
            Field::text("title", "Title").required(),
            Field::text("path", "Path").required(),
            status_field(),
            Field::new("blocks", "Blocks", FieldType::BlockLibraryPicker),
            Field::text("meta_title", "Meta title"),
            Field::new("meta_description", "Meta description", FieldType::Textarea),
        ])
        .filters([Filter::search(), Filter::new("status", "Status", FieldType::Select)])
        .permissions(PanelPermissions::prefixed("admin.pages"))
        .use_blocks(true)
        .use_seo(true)
        .tree_view(true);

    let contents = PanelBuilder::new("Contents")
        .with_repository(backend.contents())
        .list_fields([
            Field::text("title", "Title").required(),
            Field::text("content_type", "Type").required(),
            status_field(),
            Field::new("body", "Body", FieldType::Textarea).hidden(),
        ])
        .filters([Filter::search(), Filter::new("content_type", "Type", FieldType::Text)])
        .permissions(PanelPermissions::prefixed("admin.contents"));

    let blocks = PanelBuilder::new("Blocks")
        .with_repository(backend.blocks())
        .list_fields([
            Field::text("name", "Name").required(),
            Field::text("block_type", "Type").required(),
            Field::new("schema", "Schema", FieldType::Json).hidden(),
        ])
        .filters([Filter::search()])
        .permissions(PanelPermissions::prefixed("admin.blocks"));

    vec![
        (PAGES_PANEL, pages),
        (CONTENTS_PANEL, contents),
        (BLOCKS_PANEL, blocks),
    ]
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Modules: registrable bundles of panels, widgets, commands, search
//! adapters and menu items.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::admin::Admin;
use crate::config::Features;
use crate::error::Result;
use crate::menu::MenuItem;

/// Static description of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Unique module id.
    pub id: String,
    /// Translation key of the name.
    #[serde(default)]
    pub name_key: String,
    /// Translation key of the description.
    #[serde(default)]
    pub description_key: String,
    /// Features that must all be enabled for the module to load.
    #[serde(default)]
    pub feature_flags: BTreeSet<String>,
}

impl ModuleManifest {
    /// Create a manifest.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Require a feature.
    pub fn requires(mut self, feature: impl Into<String>) -> Self {
        self.feature_flags.insert(feature.into());
        self
    }

    /// Features of the manifest that `features` disables.
    pub fn disabled_features<'a>(&'a self, features: &'a Features) -> Vec<&'a str> {
        self.feature_flags
            .iter()
            .map(String::as_str)
            .filter(|f| !features.is_enabled(f))
            .collect()
    }
}

/// What a module sees while registering.
pub struct ModuleContext<'a> {
    admin: &'a mut Admin,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(admin: &'a mut Admin) -> Self {
        Self { admin }
    }

    /// The admin being configured.
    pub fn admin(&mut self) -> &mut Admin {
        self.admin
    }
}

/// A registrable bundle.
pub trait Module: Send + Sync {
    /// Static description.
    fn manifest(&self) -> ModuleManifest;

    /// Register panels, widgets, commands and adapters.
    fn register(&self, ctx: &mut ModuleContext<'_>) -> Result<()>;

    /// Menu entries contributed for `locale`.
    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        Vec::new()
    }
}

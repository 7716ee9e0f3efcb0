// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Navigation menus.
//!
//! Items live in an arena keyed by id and point at their parent by id.
//! Composition turns the arena into a forest per menu code. A node that
//! would be its own ancestor is re-parented under the canonical Main group
//! (`<menu_code>.main`) and a [`MenuRepair`] is recorded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AdminError, Result};

/// Kind of menu node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuItemType {
    /// Navigable entry.
    #[default]
    Item,
    /// Container of other nodes.
    Group,
    /// Visual divider.
    Separator,
}

/// Where a menu item leads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTarget {
    /// Target kind (panel, url, route...).
    #[serde(rename = "type", default)]
    pub target_type: String,
    /// Path under the admin base path.
    #[serde(default)]
    pub path: String,
    /// Entity key (panel slug, route name...).
    #[serde(default)]
    pub key: String,
}

/// A menu node descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Unique id within the arena.
    pub id: String,
    /// Node kind.
    #[serde(rename = "type", default)]
    pub item_type: MenuItemType,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Translation key for the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    /// Icon name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    /// Sort position among siblings.
    #[serde(default)]
    pub position: i32,
    /// Parent id; `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<MenuTarget>,
    /// Visible when the user holds any of these tokens; empty means public.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Only shown for this locale; empty matches every locale.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
    /// Menu the item belongs to.
    #[serde(default)]
    pub menu_code: String,
    /// Group can be collapsed.
    #[serde(default)]
    pub collapsible: bool,
    /// Group starts collapsed.
    #[serde(default)]
    pub collapsed: bool,
    /// Nested nodes. Flattened into the arena on insert, filled on compose.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    /// A navigable item pointing at `path`.
    pub fn link(id: impl Into<String>, label: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: id.into(),
            label: label.into(),
            target: Some(MenuTarget {
                target_type: "url".to_string(),
                path,
                key: String::new(),
            }),
            ..Self::default()
        }
    }

    /// An item pointing at a panel.
    pub fn panel(id: impl Into<String>, label: impl Into<String>, slug: &str) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            target: Some(MenuTarget {
                target_type: "panel".to_string(),
                path: format!("/{}", slug),
                key: slug.to_string(),
            }),
            ..Self::default()
        }
    }

    /// A group.
    pub fn group(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: MenuItemType::Group,
            label: label.into(),
            collapsible: true,
            ..Self::default()
        }
    }

    /// Set the parent.
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the position.
    pub fn position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Set the icon.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Require a permission token.
    pub fn permission(mut self, token: impl Into<String>) -> Self {
        self.permissions.push(token.into());
        self
    }

    /// Restrict to a locale.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Assign to a menu.
    pub fn menu_code(mut self, code: impl Into<String>) -> Self {
        self.menu_code = code.into();
        self
    }
}

/// A repair applied while composing a menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuRepair {
    /// Menu being composed.
    pub menu_code: String,
    /// Re-parented node.
    pub item_id: String,
    /// Parent the node pointed at before the repair.
    pub previous_parent: Option<String>,
    /// Parent after the repair.
    pub new_parent: String,
    /// What was wrong.
    pub reason: String,
}

/// Id of the canonical Main group of `menu_code`.
pub fn main_group_id(menu_code: &str) -> String {
    format!("{}.main", menu_code)
}

/// Arena of menu items across every menu code.
#[derive(Debug, Clone, Default)]
pub struct Menu {
    items: BTreeMap<String, MenuItem>,
}

/// A composed menu forest plus the repairs it needed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComposedMenu {
    /// Root nodes with children filled in.
    pub items: Vec<MenuItem>,
    /// Repairs applied during composition.
    pub repairs: Vec<MenuRepair>,
}

impl Menu {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item and its nested children.
    ///
    /// Items without a menu code inherit `default_code`. Nested children
    /// inherit the menu code and get their parent set.
    pub fn add(&mut self, mut item: MenuItem, default_code: &str) -> Result<()> {
        if item.id.is_empty() {
            return Err(AdminError::invalid("menu.id", "must not be empty"));
        }
        if item.menu_code.is_empty() {
            item.menu_code = default_code.to_string();
        }
        if self.items.contains_key(&item.id) {
            return Err(AdminError::DuplicateRegistration {
                registry: "menu",
                key: item.id,
            });
        }
        let children = std::mem::take(&mut item.children);
        let code = item.menu_code.clone();
        let parent = item.id.clone();
        self.items.insert(item.id.clone(), item);
        for mut child in children {
            child.parent_id = Some(parent.clone());
            if child.menu_code.is_empty() {
                child.menu_code = code.clone();
            }
            self.add(child, &code)?;
        }
        Ok(())
    }

    /// Number of items across every menu.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item.
    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        self.items.get(id)
    }

    /// Every distinct permission token used by items of `menu_code`.
    pub fn permission_tokens(&self, menu_code: &str) -> BTreeSet<String> {
        self.items
            .values()
            .filter(|i| i.menu_code == menu_code)
            .flat_map(|i| i.permissions.iter().cloned())
            .collect()
    }

    /// Compose the forest of `menu_code` with every node visible.
    pub fn compose(&self, menu_code: &str) -> ComposedMenu {
        self.compose_filtered(menu_code, |_| true)
    }

    /// Compose the forest of `menu_code` keeping nodes accepted by `visible`.
    ///
    /// Groups left without children are dropped. Siblings are sorted by
    /// position, then id.
    pub fn compose_filtered(
        &self,
        menu_code: &str,
        visible: impl Fn(&MenuItem) -> bool,
    ) -> ComposedMenu {
        let mut arena: BTreeMap<String, MenuItem> = self
            .items
            .iter()
            .filter(|(_, item)| item.menu_code == menu_code)
            .map(|(id, item)| (id.clone(), item.clone()))
            .collect();

        let mut repairs = Vec::new();
        let main_id = main_group_id(menu_code);

        // Parents outside this menu make the node a root.
        let ids: Vec<String> = arena.keys().cloned().collect();
        for id in &ids {
            let dangling = arena[id]
                .parent_id
                .as_ref()
                .is_some_and(|p| !arena.contains_key(p));
            if dangling {
                if let Some(item) = arena.get_mut(id) {
                    item.parent_id = None;
                }
            }
        }

        for id in &ids {
            if !in_cycle(&arena, id) {
                continue;
            }
            if !arena.contains_key(&main_id) {
                let mut main = MenuItem::group(main_id.clone(), "Main").position(i32::MIN);
                main.menu_code = menu_code.to_string();
                arena.insert(main_id.clone(), main);
            }
            let (previous_parent, new_parent) = if *id == main_id {
                (arena[id].parent_id.clone(), None)
            } else {
                (arena[id].parent_id.clone(), Some(main_id.clone()))
            };
            let reason = if previous_parent.as_deref() == Some(id.as_str()) {
                "item is its own parent"
            } else {
                "item is its own ancestor"
            };
            warn!(
                menu = %menu_code,
                item = %id,
                previous_parent = ?previous_parent,
                reason,
                "Repairing menu cycle"
            );
            repairs.push(MenuRepair {
                menu_code: menu_code.to_string(),
                item_id: id.clone(),
                previous_parent,
                new_parent: new_parent.clone().unwrap_or_default(),
                reason: reason.to_string(),
            });
            if let Some(item) = arena.get_mut(id) {
                item.parent_id = new_parent;
            }
        }

        let mut children_of: BTreeMap<Option<String>, Vec<MenuItem>> = BTreeMap::new();
        for item in arena.into_values() {
            if visible(&item) {
                children_of
                    .entry(item.parent_id.clone())
                    .or_default()
                    .push(item);
            }
        }
        let items = assemble(None, &mut children_of);
        ComposedMenu { items, repairs }
    }
}

fn in_cycle(arena: &BTreeMap<String, MenuItem>, start: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut current = arena.get(start).and_then(|i| i.parent_id.clone());
    while let Some(id) = current {
        if id == start {
            return true;
        }
        if !seen.insert(id.clone()) {
            // A cycle further up that does not include `start`.
            return false;
        }
        current = arena.get(&id).and_then(|i| i.parent_id.clone());
    }
    false
}

fn assemble(
    parent: Option<String>,
    children_of: &mut BTreeMap<Option<String>, Vec<MenuItem>>,
) -> Vec<MenuItem> {
    let mut nodes = children_of.remove(&parent).unwrap_or_default();
    nodes.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    nodes
        .into_iter()
        .filter_map(|mut node| {
            node.children = assemble(Some(node.id.clone()), children_of);
            let empty_group = node.item_type == MenuItemType::Group
                && node.children.is_empty()
                && node.target.is_none();
            (!empty_group).then_some(node)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "admin.main";

    fn ids(items: &[MenuItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_compose_sorts_by_position_then_id() {
        let mut menu = Menu::new();
        menu.add(MenuItem::link("b", "B", "/b").position(1), CODE).unwrap();
        menu.add(MenuItem::link("a", "A", "/a").position(1), CODE).unwrap();
        menu.add(MenuItem::link("z", "Z", "/z").position(0), CODE).unwrap();

        let composed = menu.compose(CODE);
        assert_eq!(ids(&composed.items), vec!["z", "a", "b"]);
        assert!(composed.repairs.is_empty());
    }

    #[test]
    fn test_nested_children_are_flattened() {
        let mut menu = Menu::new();
        let mut group = MenuItem::group("catalog", "Catalog");
        group.children = vec![MenuItem::panel("products", "Products", "products")];
        menu.add(group, CODE).unwrap();

        assert_eq!(
            menu.get("products").unwrap().parent_id.as_deref(),
            Some("catalog")
        );
        let composed = menu.compose(CODE);
        assert_eq!(ids(&composed.items[0].children), vec!["products"]);
    }

    #[test]
    fn test_self_parent_is_repaired_under_main() {
        let mut menu = Menu::new();
        menu.add(MenuItem::link("loop", "Loop", "/loop").parent("loop"), CODE)
            .unwrap();

        let composed = menu.compose(CODE);
        assert_eq!(composed.repairs.len(), 1);
        assert_eq!(composed.repairs[0].item_id, "loop");
        assert_eq!(composed.repairs[0].new_parent, "admin.main.main");
        assert_eq!(ids(&composed.items), vec!["admin.main.main"]);
        assert_eq!(ids(&composed.items[0].children), vec!["loop"]);
    }

    #[test]
    fn test_ancestor_cycle_is_broken_once() {
        let mut menu = Menu::new();
        menu.add(MenuItem::group("a", "A").parent("b"), CODE).unwrap();
        menu.add(MenuItem::group("b", "B").parent("a"), CODE).unwrap();
        menu.add(MenuItem::link("leaf", "Leaf", "/leaf").parent("b"), CODE)
            .unwrap();

        let composed = menu.compose(CODE);
        assert_eq!(composed.repairs.len(), 1);
        assert_eq!(composed.repairs[0].reason, "item is its own ancestor");
        let main = &composed.items[0];
        assert_eq!(ids(&main.children), vec!["a"]);
        assert_eq!(ids(&main.children[0].children), vec!["b"]);
        assert_eq!(ids(&main.children[0].children[0].children), vec!["leaf"]);
    }

    #[test]
    fn test_filter_drops_empty_groups() {
        let mut menu = Menu::new();
        menu.add(MenuItem::group("settings", "Settings"), CODE).unwrap();
        menu.add(
            MenuItem::link("users", "Users", "/users")
                .parent("settings")
                .permission("users.view"),
            CODE,
        )
        .unwrap();
        menu.add(MenuItem::link("home", "Home", "/").locale("es"), CODE)
            .unwrap();

        let composed = menu.compose_filtered(CODE, |item| item.permissions.is_empty());
        assert_eq!(ids(&composed.items), vec!["home"]);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut menu = Menu::new();
        menu.add(MenuItem::link("a", "A", "/a"), CODE).unwrap();
        let err = menu.add(MenuItem::link("a", "A", "/a"), CODE).unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_REGISTRATION");
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Declarative descriptors: fields, filters, actions, tabs and permissions.
//!
//! Descriptors are plain values. They are composed through
//! [`PanelBuilder`](crate::panel::PanelBuilder) and frozen with the panel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Filter name that denotes full-text search; every repository accepts it.
pub const SEARCH_FILTER: &str = "_search";

/// Kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    /// Single-line text.
    Text,
    /// Email address.
    Email,
    /// Integer or decimal number.
    Number,
    /// One value out of the field's options.
    Select,
    /// Multi-line text.
    Textarea,
    /// RFC3339 timestamp.
    Datetime,
    /// Reference to a media asset.
    Media,
    /// Ordered list of content blocks.
    BlockLibraryPicker,
    /// Boolean switch.
    Toggle,
    /// Free-form JSON.
    Json,
}

impl FieldType {
    /// Stable name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Number => "number",
            Self::Select => "select",
            Self::Textarea => "textarea",
            Self::Datetime => "datetime",
            Self::Media => "media",
            Self::BlockLibraryPicker => "block-library-picker",
            Self::Toggle => "toggle",
            Self::Json => "json",
        }
    }

    /// Whether values of this type are plain strings.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Email | Self::Select | Self::Textarea
        )
    }
}

/// One choice of a `select` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    /// Stored value.
    pub value: String,
    /// Display label.
    pub label: String,
    /// Translation key for the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
}

impl FieldOption {
    /// Create an option.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            label_key: String::new(),
        }
    }
}

/// A field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Record key.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Translation key for the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    /// Field kind.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Must be present on create.
    #[serde(default)]
    pub required: bool,
    /// Ignored on writes.
    #[serde(default)]
    pub read_only: bool,
    /// Not rendered.
    #[serde(default)]
    pub hidden: bool,
    /// Ordered choices (select fields).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

impl Field {
    /// Create a field.
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            label_key: String::new(),
            field_type,
            required: false,
            read_only: false,
            hidden: false,
            options: Vec::new(),
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldType::Text)
    }

    /// Shorthand for a number field.
    pub fn number(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldType::Number)
    }

    /// Shorthand for a select field.
    pub fn select(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldType::Select)
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark as hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Set the label translation key.
    pub fn label_key(mut self, key: impl Into<String>) -> Self {
        self.label_key = key.into();
        self
    }

    /// Append an option.
    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(FieldOption::new(value, label));
        self
    }

    /// Whether `value` is one of the declared options.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// A list filter descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Query parameter name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Translation key for the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    /// Input kind.
    #[serde(rename = "type")]
    pub filter_type: FieldType,
}

impl Filter {
    /// Create a filter.
    pub fn new(name: impl Into<String>, label: impl Into<String>, filter_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            label_key: String::new(),
            filter_type,
        }
    }

    /// The full-text search filter.
    pub fn search() -> Self {
        Self::new(SEARCH_FILTER, "Search", FieldType::Text)
    }
}

/// Property of an action payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadProperty {
    /// JSON type name (string, number, integer, boolean, object, array).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// JSON-schema-like description of an action payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSchema {
    /// Declared properties.
    pub properties: BTreeMap<String, PayloadProperty>,
    /// Keys that must be present.
    #[serde(default)]
    pub required: Vec<String>,
    /// Whether undeclared keys are accepted.
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

impl Default for PayloadSchema {
    fn default() -> Self {
        Self {
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }
}

impl PayloadSchema {
    /// A closed schema (`additional_properties = false`).
    pub fn closed() -> Self {
        Self {
            additional_properties: false,
            ..Self::default()
        }
    }

    /// Declare a property.
    pub fn property(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.properties.insert(
            name.into(),
            PayloadProperty {
                type_name: type_name.into(),
                description: String::new(),
            },
        );
        self
    }

    /// Declare a property and mark it required.
    pub fn required_property(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.property(name, type_name)
    }

    /// Check a payload against the schema.
    pub fn validate(&self, payload: &Map<String, JsonValue>) -> Result<(), String> {
        for key in &self.required {
            match payload.get(key) {
                None | Some(JsonValue::Null) => {
                    return Err(format!("missing required key '{}'", key));
                }
                Some(_) => {}
            }
        }
        for (key, value) in payload {
            match self.properties.get(key) {
                Some(property) => {
                    if !json_type_matches(&property.type_name, value) {
                        return Err(format!(
                            "key '{}' must be of type {}",
                            key, property.type_name
                        ));
                    }
                }
                None if !self.additional_properties => {
                    return Err(format!("unexpected key '{}'", key));
                }
                None => {}
            }
        }
        Ok(())
    }
}

pub(crate) fn json_type_matches(type_name: &str, value: &JsonValue) -> bool {
    match type_name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// A panel action descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action identifier, unique within a panel.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Translation key for the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    /// Icon name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    /// Command dispatched through the bus; empty for inline actions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command_name: String,
    /// Permission token checked before dispatch.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permission: String,
    /// Confirmation prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
    /// Visual variant (primary, danger...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    /// Rendered in the overflow menu.
    #[serde(default)]
    pub overflow: bool,
    /// Payload keys that must be supplied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload_required: Vec<String>,
    /// Payload schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_schema: Option<PayloadSchema>,
}

impl Action {
    /// Create an action with a label.
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            label_key: String::new(),
            icon: String::new(),
            command_name: String::new(),
            permission: String::new(),
            confirm: None,
            variant: String::new(),
            overflow: false,
            payload_required: Vec::new(),
            payload_schema: None,
        }
    }

    /// Bind to a command.
    pub fn command(mut self, command_name: impl Into<String>) -> Self {
        self.command_name = command_name.into();
        self
    }

    /// Require a permission token.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = permission.into();
        self
    }

    /// Ask for confirmation.
    pub fn confirm(mut self, prompt: impl Into<String>) -> Self {
        self.confirm = Some(prompt.into());
        self
    }

    /// Set the icon.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Set the variant.
    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    /// Render in the overflow menu.
    pub fn overflow(mut self) -> Self {
        self.overflow = true;
        self
    }

    /// Require payload keys described by `schema`.
    pub fn payload(mut self, required: &[&str], schema: PayloadSchema) -> Self {
        self.payload_required = required.iter().map(|k| k.to_string()).collect();
        self.payload_schema = Some(schema);
        self
    }

    /// Whether the action is dispatched through the command bus.
    pub fn is_command(&self) -> bool {
        !self.command_name.is_empty()
    }

    /// Validate an invocation payload.
    pub fn validate_payload(&self, payload: &Map<String, JsonValue>) -> Result<(), String> {
        for key in &self.payload_required {
            if payload.get(key).is_none_or(JsonValue::is_null) {
                return Err(format!("missing required key '{}'", key));
            }
        }
        match &self.payload_schema {
            Some(schema) => schema.validate(payload),
            None => Ok(()),
        }
    }
}

/// A detail-view tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Tab identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Fields rendered in the tab.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Tab {
    /// Create a tab.
    pub fn new(id: impl Into<String>, label: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Permission tokens consulted by the authorizer for CRUD operations.
///
/// An empty token means the operation is not guarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPermissions {
    /// Token for list and detail.
    #[serde(default)]
    pub view: String,
    /// Token for create.
    #[serde(default)]
    pub create: String,
    /// Token for update.
    #[serde(default)]
    pub edit: String,
    /// Token for delete.
    #[serde(default)]
    pub delete: String,
}

impl PanelPermissions {
    /// Conventional tokens `<prefix>.view|create|edit|delete`.
    pub fn prefixed(prefix: &str) -> Self {
        Self {
            view: format!("{}.view", prefix),
            create: format!("{}.create", prefix),
            edit: format!("{}.edit", prefix),
            delete: format!("{}.delete", prefix),
        }
    }
}

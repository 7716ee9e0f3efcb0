// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed records.
//!
//! Repositories exchange [`Record`]s whose cells are a tagged [`Value`].
//! A [`Schema`] derived from a panel's fields coerces JSON input into
//! typed cells at the repository boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};

use crate::descriptor::{Field, FieldType};
use crate::error::{AdminError, Result};

/// A single record cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Text.
    String(String),
    /// Whole number.
    Integer(i64),
    /// Decimal number.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Nested map.
    Map(BTreeMap<String, Value>),
    /// Ordered list.
    List(Vec<Value>),
}

impl Value {
    /// Untyped conversion from JSON.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Conversion to JSON. Timestamps render as RFC3339.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Integer(i) => JsonValue::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Timestamp(t) => {
                JsonValue::String(t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Self::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// String content, if this is a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content (floats with no fractional part included).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric content as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether the cell is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Loose textual rendering used by filters and search.
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Null => String::new(),
            other => match other.to_json() {
                JsonValue::String(s) => s,
                json => json.to_string(),
            },
        }
    }

    /// Whether any string in this cell contains `needle` (already lowercased).
    pub fn contains_text(&self, needle: &str) -> bool {
        match self {
            Self::String(s) => s.to_lowercase().contains(needle),
            Self::Map(map) => map.values().any(|v| v.contains_text(needle)),
            Self::List(items) => items.iter().any(|v| v.contains_text(needle)),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Value::from_json)
    }
}

/// A record: an identifier plus named cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Identifier assigned by the repository (empty before create).
    pub id: String,
    /// Cells by field name.
    pub values: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Read a cell.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Write a cell.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Read a string cell.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Apply a patch: every cell in `patch` replaces the current one.
    pub fn merge(&mut self, patch: Record) {
        for (k, v) in patch.values {
            self.values.insert(k, v);
        }
    }

    /// JSON object with `id` plus every cell.
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert("id".to_string(), JsonValue::String(self.id.clone()));
        for (k, v) in &self.values {
            map.insert(k.clone(), v.to_json());
        }
        JsonValue::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Declared shape of a record, derived from fields.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<String, Field>,
}

/// Coercion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Full record; required fields are enforced.
    Create,
    /// Partial record; only supplied cells are checked.
    Patch,
}

impl Schema {
    /// Derive a schema. Later fields with the same name win.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|f| (f.name.clone(), f.clone()))
                .collect(),
        }
    }

    /// Declared field, if any.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Coerce a JSON object into a record.
    ///
    /// Read-only fields and `id` are dropped. Undeclared keys are kept with
    /// an untyped conversion.
    pub fn coerce(&self, input: &JsonValue, mode: WriteMode) -> Result<Record> {
        let object = input
            .as_object()
            .ok_or_else(|| AdminError::invalid("body", "expected a JSON object"))?;

        let mut record = Record::new();
        for (key, raw) in object {
            if key == "id" {
                continue;
            }
            let value = match self.fields.get(key) {
                Some(field) if field.read_only => continue,
                Some(field) => coerce_cell(field, raw)?,
                None => Value::from_json(raw.clone()),
            };
            record.values.insert(key.clone(), value);
        }

        if mode == WriteMode::Create {
            for field in self.fields.values().filter(|f| f.required && !f.read_only) {
                if record.get(&field.name).is_none_or(Value::is_null) {
                    return Err(AdminError::invalid(&field.name, "is required"));
                }
            }
        }
        if mode == WriteMode::Patch {
            for (key, value) in &record.values {
                if value.is_null() && self.fields.get(key).is_some_and(|f| f.required) {
                    return Err(AdminError::invalid(key, "is required"));
                }
            }
        }
        Ok(record)
    }
}

fn coerce_cell(field: &Field, raw: &JsonValue) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let invalid = |message: &str| AdminError::invalid(&field.name, message);
    match field.field_type {
        FieldType::Text | FieldType::Textarea => match raw {
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            JsonValue::Number(n) => Ok(Value::String(n.to_string())),
            JsonValue::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid("must be a string")),
        },
        FieldType::Email => {
            let s = raw.as_str().ok_or_else(|| invalid("must be a string"))?;
            let valid = s
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(invalid("must be an email address"));
            }
            Ok(Value::String(s.to_string()))
        }
        FieldType::Select => {
            let s = match raw {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                _ => return Err(invalid("must be a string")),
            };
            if !field.has_option(&s) {
                return Err(invalid("is not one of the declared options"));
            }
            Ok(Value::String(s))
        }
        FieldType::Number => match raw {
            JsonValue::Number(n) => Ok(match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            }),
            JsonValue::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::Integer(i))
                } else {
                    s.parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| invalid("must be a number"))
                }
            }
            _ => Err(invalid("must be a number")),
        },
        FieldType::Toggle => match raw {
            JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
            JsonValue::String(s) if s == "true" || s == "1" => Ok(Value::Boolean(true)),
            JsonValue::String(s) if s == "false" || s == "0" => Ok(Value::Boolean(false)),
            _ => Err(invalid("must be a boolean")),
        },
        FieldType::Datetime => {
            let s = raw.as_str().ok_or_else(|| invalid("must be an RFC3339 string"))?;
            DateTime::parse_from_rfc3339(s)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|_| invalid("must be an RFC3339 string"))
        }
        FieldType::Media => match raw {
            JsonValue::String(_) | JsonValue::Object(_) => Ok(Value::from_json(raw.clone())),
            _ => Err(invalid("must be a media reference")),
        },
        FieldType::BlockLibraryPicker => match raw {
            JsonValue::Array(_) => Ok(Value::from_json(raw.clone())),
            _ => Err(invalid("must be a list of blocks")),
        },
        FieldType::Json => Ok(Value::from_json(raw.clone())),
    }
}

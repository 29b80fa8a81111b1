//! Collection model.
//!
//! A collection is a named schema grouping records. Its JSON shape mirrors the
//! snapshots used by the migrations, so a collection can be declared as a JSON
//! literal and round-tripped without losing type options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Kind of collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    #[default]
    Base,
    /// Carries the password/email fields used by signup.
    Auth,
}

/// Access rule for one API action.
///
/// Stored as `null` (locked, superusers only) or `""` (everyone). Filter
/// expressions are not evaluated; any non-empty rule is treated as locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ApiRule {
    #[default]
    Locked,
    Public,
}

impl From<Option<String>> for ApiRule {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("") => Self::Public,
            Some(rule) => {
                tracing::warn!(rule, "Filter rules are not supported, treating as locked");
                Self::Locked
            }
            None => Self::Locked,
        }
    }
}

impl From<ApiRule> for Option<String> {
    fn from(rule: ApiRule) -> Self {
        match rule {
            ApiRule::Locked => None,
            ApiRule::Public => Some(String::new()),
        }
    }
}

impl ApiRule {
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Field value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Editor,
    Number,
    Bool,
    Email,
    Url,
    Date,
    Autodate,
    Select,
    Json,
    Relation,
    Password,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Editor => "editor",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Email => "email",
            Self::Url => "url",
            Self::Date => "date",
            Self::Autodate => "autodate",
            Self::Select => "select",
            Self::Json => "json",
            Self::Relation => "relation",
            Self::Password => "password",
        };
        f.write_str(s)
    }
}

/// A single schema field.
///
/// Type specific options (`min`, `max`, `pattern`, `collectionId`,
/// `maxSelect`, ...) are kept verbatim in `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub presentable: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Field {
    /// Numeric option; `null` and missing both read as `None`.
    #[must_use]
    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.options.get(key).and_then(Value::as_f64)
    }

    /// Non-negative integer option, `0` treated as unset.
    #[must_use]
    pub fn option_usize(&self, key: &str) -> Option<usize> {
        self.options
            .get(key)
            .and_then(Value::as_u64)
            .filter(|v| *v > 0)
            .and_then(|v| usize::try_from(v).ok())
    }

    #[must_use]
    pub fn option_bool(&self, key: &str) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// String option, empty treated as unset.
    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Whether the field holds a list of values (multi relation/select).
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self.kind, FieldKind::Relation | FieldKind::Select)
            && self.option_usize("maxSelect").is_some_and(|m| m > 1)
    }

    /// Value stored when a record has nothing set for this field.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self.kind {
            FieldKind::Number => Value::from(0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Json => Value::Null,
            FieldKind::Relation | FieldKind::Select if self.is_multiple() => {
                Value::Array(Vec::new())
            }
            _ => Value::String(String::new()),
        }
    }
}

/// Ordered list of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldsList(Vec<Field>);

impl FieldsList {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&Field> {
        self.0.iter().find(|f| f.id == id)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Field> {
        self.0.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn position_by_id(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|f| f.id == id)
    }

    /// Remove a field by id. Missing ids are ignored.
    pub fn remove_by_id(&mut self, id: &str) {
        self.0.retain(|f| f.id != id);
    }

    pub fn remove_by_name(&mut self, name: &str) {
        self.0.retain(|f| f.name != name);
    }

    pub fn add(&mut self, field: Field) {
        self.add_at(usize::MAX, field);
    }

    /// Insert `field` at `pos`.
    ///
    /// A field with the same id is removed first, so re-adding an existing
    /// field both replaces and moves it. `pos` past the end appends.
    pub fn add_at(&mut self, pos: usize, field: Field) {
        self.remove_by_id(&field.id);
        if pos >= self.0.len() {
            self.0.push(field);
        } else {
            self.0.insert(pos, field);
        }
    }

    /// Parse a field JSON snapshot and [`add_at`](Self::add_at) it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid field.
    pub fn add_marshaled_json_at(&mut self, pos: usize, json: &str) -> Result<()> {
        let field: Field = serde_json::from_str(json)?;
        self.add_at(pos, field);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FieldsList {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A named record schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CollectionType,
    #[serde(default)]
    pub system: bool,
    pub fields: FieldsList,
    #[serde(default)]
    pub list_rule: ApiRule,
    #[serde(default)]
    pub view_rule: ApiRule,
    #[serde(default)]
    pub create_rule: ApiRule,
    #[serde(default)]
    pub update_rule: ApiRule,
    #[serde(default)]
    pub delete_rule: ApiRule,
    /// Field names whose values must be unique across the collection.
    #[serde(default)]
    pub unique: Vec<String>,
}

impl Collection {
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind == CollectionType::Auth
    }

    /// Ids of the collections referenced by relation fields.
    #[must_use]
    pub fn relation_targets(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Relation)
            .filter_map(|f| f.option_str("collectionId"))
            .collect()
    }
}

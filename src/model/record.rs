//! Record model.
//!
//! A record is a schema-less mapping from field name to JSON value, bound to
//! the collection that owns it.

use std::sync::Arc;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::model::collection::{Collection, FieldKind};

/// Keys the HTTP API adds to a record that are not collection fields.
pub const COLLECTION_ID_KEY: &str = "collectionId";
pub const COLLECTION_NAME_KEY: &str = "collectionName";

/// Autodate fields maintained by the app.
pub const CREATED_KEY: &str = "created";
pub const UPDATED_KEY: &str = "updated";

/// A single row of a collection.
#[derive(Debug, Clone)]
pub struct Record {
    collection: Arc<Collection>,
    id: String,
    data: Map<String, Value>,
    /// Plain password waiting to be validated and hashed on save.
    pending_password: Option<String>,
}

impl Record {
    /// Create an empty record for `collection`. The id is assigned on save.
    #[must_use]
    pub fn new(collection: Arc<Collection>) -> Self {
        Self {
            collection,
            id: String::new(),
            data: Map::new(),
            pending_password: None,
        }
    }

    /// Rebuild a record from stored data.
    #[must_use]
    pub fn from_stored(collection: Arc<Collection>, id: String, data: Map<String, Value>) -> Self {
        Self {
            collection,
            id,
            data,
            pending_password: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    #[must_use]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    #[must_use]
    pub fn collection_arc(&self) -> Arc<Collection> {
        Arc::clone(&self.collection)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// String value of a field, empty when unset or not a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> &str {
        self.data.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// Set a field value. `id` is routed to the record id.
    pub fn set(&mut self, key: &str, value: Value) {
        if key == "id" {
            if let Value::String(id) = value {
                self.id = id;
            }
            return;
        }
        self.data.insert(key.to_string(), value);
    }

    /// Load a batch of values. Keys that are not fields of the collection
    /// are ignored.
    pub fn load(&mut self, data: Map<String, Value>) {
        for (key, value) in data {
            if key == "id" || self.collection.fields.get_by_name(&key).is_some() {
                self.set(&key, value);
            }
        }
    }

    /// Stage a plain-text password; it is validated and hashed on save.
    pub fn set_password(&mut self, plain: impl Into<String>) {
        self.pending_password = Some(plain.into());
    }

    #[must_use]
    pub fn pending_password(&self) -> Option<&str> {
        self.pending_password.as_deref()
    }

    /// Hash the staged password into the `password` field.
    pub(crate) fn apply_pending_password(&mut self) {
        if let Some(plain) = self.pending_password.take() {
            self.data
                .insert("password".to_string(), Value::String(hash_password(&plain)));
            // a new password invalidates previously issued tokens
            self.data
                .insert("tokenKey".to_string(), Value::String(random_token(50)));
        }
    }

    /// Raw stored data, without the id.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// One entry per collection field, including `id` and hidden fields.
    /// Unset fields carry their zero value.
    #[must_use]
    pub fn fields_data(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for field in &self.collection.fields {
            let value = if field.name == "id" {
                Value::String(self.id.clone())
            } else {
                self.data
                    .get(&field.name)
                    .cloned()
                    .unwrap_or_else(|| field.zero_value())
            };
            out.insert(field.name.clone(), value);
        }
        out
    }

    /// API representation: visible fields plus collection identifiers.
    #[must_use]
    pub fn public_export(&self) -> Map<String, Value> {
        let mut out = self.fields_data();
        for field in &self.collection.fields {
            if field.hidden || field.kind == FieldKind::Password {
                out.remove(&field.name);
            }
        }
        let email_visible = self
            .get("emailVisibility")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if self.collection.is_auth() && !email_visible {
            out.remove("email");
        }
        out.insert(
            COLLECTION_ID_KEY.to_string(),
            Value::String(self.collection.id.clone()),
        );
        out.insert(
            COLLECTION_NAME_KEY.to_string(),
            Value::String(self.collection.name.clone()),
        );
        out
    }
}

/// Generate a new 15 character record id (`[a-z0-9]`).
#[must_use]
pub fn new_record_id() -> String {
    random_token(15)
}

fn random_token(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        out.push_str(&uuid::Uuid::new_v4().simple().to_string());
    }
    out.truncate(len);
    out
}

/// Random string for an `autogeneratePattern` of the form `[<class>]{<n>}`,
/// e.g. `[a-z0-9]{15}`. Other patterns give `None`.
#[must_use]
pub fn autogenerate(pattern: &str) -> Option<String> {
    let (class, rest) = pattern.strip_prefix('[')?.split_once(']')?;
    let len: usize = rest.strip_prefix('{')?.strip_suffix('}')?.parse().ok()?;
    let alphabet = expand_class(class);
    if alphabet.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(len);
    while out.len() < len {
        for byte in uuid::Uuid::new_v4().as_bytes() {
            if out.len() == len {
                break;
            }
            out.push(alphabet[usize::from(*byte) % alphabet.len()]);
        }
    }
    Some(out)
}

/// `a-z0-9_` → every listed character.
fn expand_class(class: &str) -> Vec<char> {
    let chars: Vec<char> = class.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if i + 2 < chars.len() && chars[i + 1] == '-' {
            out.extend(chars[i]..=chars[i + 2]);
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Current time in the stored timestamp format (`2006-01-02 15:04:05.000Z`).
#[must_use]
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3fZ")
        .to_string()
}

/// Salted SHA-256 password hash: `sha256$<salt>$<hex digest>`.
#[must_use]
pub fn hash_password(plain: &str) -> String {
    let salt = random_token(16);
    format!("sha256${salt}${}", digest(&salt, plain))
}

/// Check a plain password against a [`hash_password`] value.
#[must_use]
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    let mut parts = hashed.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(expected)) => digest(salt, plain) == expected,
        _ => false,
    }
}

fn digest(salt: &str, plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plain.as_bytes());
    format!("{:x}", hasher.finalize())
}

//! Data models for quizbase.
//!
//! - Collection (schema: fields, API rules)
//! - Record (field-name → value mapping owned by a collection)

pub mod collection;
pub mod record;

pub use collection::{ApiRule, Collection, CollectionType, Field, FieldKind, FieldsList};
pub use record::{Record, autogenerate, new_record_id, now_timestamp};

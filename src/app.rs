//! Application context.
//!
//! [`App`] owns the storage, the lifecycle hooks and the configuration. It is
//! a cheap handle (`Clone` shares the same state) and is passed explicitly to
//! everything that needs it: hook handlers receive it on the event, HTTP
//! handlers through router state, migrations as an argument.
//!
//! Record mutations trigger the matching hook. Validation and the storage
//! write happen in the hook's finalizer, so a handler that runs code after
//! `next` only sees committed data.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{Error, FieldError, Result};
use crate::hooks::{Hooks, RecordEvent};
use crate::model::{Collection, FieldKind, Record, autogenerate, new_record_id, now_timestamp};
use crate::storage::SqliteStorage;
use crate::validate::{validate_collection, validate_record};

/// Shared application handle.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

struct AppInner {
    config: AppConfig,
    storage: Mutex<SqliteStorage>,
    hooks: Hooks,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.inner.config)
            .field("hooks", &self.inner.hooks)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Open (or create) the database under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn new(config: AppConfig) -> Result<Self> {
        let db_path = config.db_path();
        let storage = SqliteStorage::open(&db_path)?;
        info!(db = %db_path.display(), "Opened database");
        Ok(Self::with_storage(config, storage))
    }

    /// App backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot be initialized.
    pub fn open_memory(config: AppConfig) -> Result<Self> {
        Ok(Self::with_storage(config, SqliteStorage::open_memory()?))
    }

    fn with_storage(config: AppConfig, storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(AppInner {
                config,
                storage: Mutex::new(storage),
                hooks: Hooks::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    /// Sync directory, re-resolved on every call.
    #[must_use]
    pub fn sync_dir(&self) -> PathBuf {
        self.inner.config.sync_dir()
    }

    /// Bind snapshot export to record mutations and snapshot import to serve.
    pub fn bind_sync_hooks(&self) {
        crate::sync::register(self);
    }

    /// Lock storage for one operation. Never held across a hook chain.
    pub(crate) fn storage(&self) -> MutexGuard<'_, SqliteStorage> {
        self.inner
            .storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ======================
    // Collections
    // ======================

    /// # Errors
    ///
    /// Returns [`Error::CollectionNotFound`] if neither id nor name match.
    pub fn find_collection_by_name_or_id(&self, id_or_name: &str) -> Result<Arc<Collection>> {
        self.storage()
            .get_collection(id_or_name)?
            .map(Arc::new)
            .ok_or_else(|| Error::CollectionNotFound {
                id: id_or_name.to_string(),
            })
    }

    /// # Errors
    ///
    /// Returns an error if the collections cannot be read.
    pub fn find_all_collections(&self) -> Result<Vec<Collection>> {
        self.storage().list_collections()
    }

    /// Validate and persist a collection definition.
    ///
    /// When an existing collection changes shape, stored records follow: keys
    /// of removed fields are dropped and renamed fields (same id, new name)
    /// keep their values.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid definition, or a storage
    /// error.
    pub fn save_collection(&self, collection: &Collection) -> Result<()> {
        let mut storage = self.storage();
        validate_collection(&storage, collection)?;

        if let Some(existing) = storage.get_collection(&collection.id)? {
            let mut drops = Vec::new();
            let mut renames = Vec::new();
            for old in existing.fields.iter().filter(|f| f.name != "id") {
                match collection.fields.get_by_id(&old.id) {
                    None => drops.push(old.name.clone()),
                    Some(new) if new.name != old.name => {
                        renames.push((old.name.clone(), new.name.clone()));
                    }
                    Some(_) => {}
                }
            }
            let rows = storage.rekey_records(&collection.id, &drops, &renames)?;
            if rows > 0 {
                debug!(collection = %collection.name, rows, ?drops, ?renames, "Rekeyed records");
            }
        }

        storage.upsert_collection(collection)?;
        info!(collection = %collection.name, id = %collection.id, "Saved collection");
        Ok(())
    }

    /// Delete a collection and its records.
    ///
    /// # Errors
    ///
    /// Refuses while another collection has a relation field pointing at it.
    pub fn delete_collection(&self, collection: &Collection) -> Result<()> {
        let mut storage = self.storage();
        let referencing: Vec<String> = storage
            .list_collections()?
            .into_iter()
            .filter(|c| c.id != collection.id)
            .filter(|c| c.relation_targets().contains(&collection.id.as_str()))
            .map(|c| c.name)
            .collect();
        if !referencing.is_empty() {
            return Err(Error::field(
                "id",
                FieldError::new(
                    "validation_collection_referenced",
                    format!("The collection is referenced by {}.", referencing.join(", ")),
                ),
            ));
        }

        if storage.delete_collection(&collection.id)? {
            info!(collection = %collection.name, "Deleted collection");
        }
        Ok(())
    }

    // ======================
    // Records
    // ======================

    /// Every record of a collection, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection does not exist or cannot be read.
    pub fn find_all_records(&self, collection: &str) -> Result<Vec<Record>> {
        let collection = self.find_collection_by_name_or_id(collection)?;
        let stored = self.storage().list_records(&collection.id)?;
        Ok(stored
            .into_iter()
            .map(|(id, data)| Record::from_stored(Arc::clone(&collection), id, data))
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if there is no such record.
    pub fn find_record_by_id(&self, collection: &str, id: &str) -> Result<Record> {
        let collection = self.find_collection_by_name_or_id(collection)?;
        let data = self.storage().get_record(&collection.id, id)?;
        data.map(|data| Record::from_stored(Arc::clone(&collection), id.to_string(), data))
            .ok_or_else(|| Error::RecordNotFound {
                collection: collection.name.clone(),
                id: id.to_string(),
            })
    }

    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn count_records(&self, collection: &Collection) -> Result<usize> {
        self.storage().count_records(&collection.id)
    }

    /// Insert a new record through the create hook.
    ///
    /// # Errors
    ///
    /// Returns a validation error, a storage error, or whatever a create
    /// handler returns.
    pub fn create_record(&self, record: Record) -> Result<Record> {
        let mut event = RecordEvent {
            app: self.clone(),
            record,
        };
        self.hooks()
            .on_record_create
            .trigger(&mut event, |e| e.app.persist(&mut e.record, true))?;
        Ok(event.record)
    }

    /// Replace an existing record through the update hook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] for an unknown id, a validation
    /// error, or whatever an update handler returns.
    pub fn update_record(&self, record: Record) -> Result<Record> {
        let mut event = RecordEvent {
            app: self.clone(),
            record,
        };
        self.hooks()
            .on_record_update
            .trigger(&mut event, |e| e.app.persist(&mut e.record, false))?;
        Ok(event.record)
    }

    /// Delete a record through the delete hook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if it was already gone.
    pub fn delete_record(&self, record: Record) -> Result<()> {
        let mut event = RecordEvent {
            app: self.clone(),
            record,
        };
        self.hooks().on_record_delete.trigger(&mut event, |e| {
            let collection = e.record.collection();
            if !e.app.storage().delete_record(&collection.id, e.record.id())? {
                return Err(Error::RecordNotFound {
                    collection: collection.name.clone(),
                    id: e.record.id().to_string(),
                });
            }
            debug!(collection = %collection.name, id = e.record.id(), "Deleted record");
            Ok(())
        })
    }

    /// Upsert: create when the id is new (or empty), otherwise update.
    ///
    /// On update the given values are laid over the stored record, so keys
    /// the caller did not set (`created`, the password hash) are kept.
    ///
    /// # Errors
    ///
    /// Same as [`create_record`](Self::create_record) and
    /// [`update_record`](Self::update_record).
    pub fn save(&self, record: Record) -> Result<Record> {
        let exists = !record.id().is_empty()
            && self
                .storage()
                .record_exists(&record.collection().id, record.id())?;
        if !exists {
            return self.create_record(record);
        }

        let mut existing = self.find_record_by_id(&record.collection().id, record.id())?;
        if let Some(plain) = record.pending_password() {
            existing.set_password(plain);
        }
        existing.load(record.data().clone());
        self.update_record(existing)
    }

    /// Validate and write one record. Runs inside a hook finalizer.
    fn persist(&self, record: &mut Record, is_new: bool) -> Result<()> {
        if is_new {
            fill_autogenerated(record);
        }

        let collection = record.collection_arc();
        let mut storage = self.storage();
        let exists = storage.record_exists(&collection.id, record.id())?;
        if is_new && exists {
            return Err(Error::field("id", FieldError::not_unique()));
        }
        if !is_new && !exists {
            return Err(Error::RecordNotFound {
                collection: collection.name.clone(),
                id: record.id().to_string(),
            });
        }

        validate_record(&storage, record, is_new)?;
        record.apply_pending_password();
        touch_autodates(record, is_new);

        storage.upsert_record(&collection.id, record.id(), record.data())?;
        debug!(
            collection = %collection.name,
            id = record.id(),
            op = if is_new { "create" } else { "update" },
            "Persisted record"
        );
        Ok(())
    }
}

/// Fill blank text fields that declare an `autogeneratePattern`, then make
/// sure the record has an id.
fn fill_autogenerated(record: &mut Record) {
    let collection = record.collection_arc();
    for field in collection.fields.iter().filter(|f| f.kind == FieldKind::Text) {
        let blank = if field.name == "id" {
            record.id().is_empty()
        } else {
            record.get_str(&field.name).is_empty()
        };
        if !blank {
            continue;
        }
        if let Some(value) = field.option_str("autogeneratePattern").and_then(autogenerate) {
            record.set(&field.name, Value::String(value));
        }
    }
    if record.id().is_empty() {
        record.set_id(new_record_id());
    }
}

/// Stamp `onCreate` autodate fields on insert and `onUpdate` ones on update.
fn touch_autodates(record: &mut Record, is_new: bool) {
    let now = now_timestamp();
    let collection = record.collection_arc();
    for field in collection.fields.iter().filter(|f| f.kind == FieldKind::Autodate) {
        let stamp = if is_new {
            field.option_bool("onCreate")
        } else {
            field.option_bool("onUpdate")
        };
        if stamp {
            record.set(&field.name, Value::String(now.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn app() -> App {
        let app = App::open_memory(AppConfig::default()).unwrap();
        crate::migrations::run_pending(&app).unwrap();
        app
    }

    fn lecture(app: &App, title: &str) -> Record {
        let mut record = Record::new(app.find_collection_by_name_or_id("lecture").unwrap());
        record.set("title", json!(title));
        record
    }

    #[test]
    fn test_create_assigns_id_and_timestamps() {
        let app = app();
        let saved = app.create_record(lecture(&app, "Intro")).unwrap();

        assert_eq!(saved.id().len(), 15);
        assert!(!saved.get_str("created").is_empty());
        assert_eq!(saved.get_str("created"), saved.get_str("updated"));

        let found = app.find_record_by_id("lecture", saved.id()).unwrap();
        assert_eq!(found.get_str("title"), "Intro");
    }

    #[test]
    fn test_update_keeps_created() {
        let app = app();
        let saved = app.create_record(lecture(&app, "Intro")).unwrap();
        let created = saved.get_str("created").to_string();

        let mut changed = saved.clone();
        changed.set("title", json!("Intro (v2)"));
        let updated = app.update_record(changed).unwrap();

        assert_eq!(updated.get_str("created"), created);
        assert_eq!(app.find_all_records("lecture").unwrap().len(), 1);
    }

    #[test]
    fn test_save_upserts_by_id() {
        let app = app();
        let mut record = lecture(&app, "One");
        record.set_id("lecture00000001");
        app.save(record).unwrap();

        let mut again = lecture(&app, "Uno");
        again.set_id("lecture00000001");
        let saved = app.save(again).unwrap();

        let all = app.find_all_records("lecture").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(saved.get_str("title"), "Uno");
        assert!(!saved.get_str("created").is_empty());
    }

    #[test]
    fn test_create_with_taken_id_fails() {
        let app = app();
        let saved = app.create_record(lecture(&app, "One")).unwrap();
        let mut dup = lecture(&app, "Two");
        dup.set_id(saved.id());

        let err = app.create_record(dup).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_update_unknown_record_fails() {
        let app = app();
        let mut record = lecture(&app, "One");
        record.set_id("missing");
        assert!(matches!(
            app.update_record(record).unwrap_err(),
            Error::RecordNotFound { .. }
        ));
    }

    #[test]
    fn test_after_handlers_skip_failed_writes() {
        let app = app();
        let after = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&after);
        app.hooks().on_record_create.bind(move |e, next| {
            next.run(e)?;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let mut chapter = Record::new(app.find_collection_by_name_or_id("chapters").unwrap());
        chapter.set("lessons", json!(["nope"]));
        assert!(app.create_record(chapter).is_err());
        assert_eq!(after.load(Ordering::SeqCst), 0);

        app.create_record(lecture(&app, "Intro")).unwrap();
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delete_record() {
        let app = app();
        let saved = app.create_record(lecture(&app, "Intro")).unwrap();
        app.delete_record(saved.clone()).unwrap();

        assert!(app.find_all_records("lecture").unwrap().is_empty());
        assert!(matches!(
            app.delete_record(saved).unwrap_err(),
            Error::RecordNotFound { .. }
        ));
    }

    #[test]
    fn test_password_is_hashed_on_create() {
        let app = app();
        let mut user = Record::new(app.find_collection_by_name_or_id("users").unwrap());
        user.set("email", json!("test@test.com"));
        user.set_password("1234567890");
        let saved = app.create_record(user).unwrap();

        let hashed = saved.get_str("password");
        assert!(crate::model::record::verify_password("1234567890", hashed));
        assert_eq!(saved.get_str("tokenKey").len(), 50);
        assert!(!saved.public_export().contains_key("password"));
    }

    #[test]
    fn test_delete_referenced_collection_refused() {
        let app = app();
        let lecture = app.find_collection_by_name_or_id("lecture").unwrap();
        assert!(matches!(
            app.delete_collection(&lecture).unwrap_err(),
            Error::Validation(_)
        ));
    }
}

//! Collection migrations.
//!
//! Each migration is a pair of functions over the [`App`]: `up` applies a
//! schema change, `down` reverts it. Versions are `<unix seconds>_<name>` and
//! sort in application order. Applied versions are recorded in the
//! `_migrations` table, so running the list again only applies what is new.
//!
//! A failing step aborts the run; earlier migrations in the same run stay
//! applied.

mod m1771000000_init_collections;
mod m1771422155_updated_mc_questions;
mod m1771426316_updated_chapters;
mod m1771440943_updated_chapters;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::app::App;
use crate::error::{Error, Result};
use crate::model::Collection;

/// A single migration with version identifier and both directions.
pub struct Migration {
    pub version: &'static str,
    pub up: fn(&App) -> Result<()>,
    pub down: fn(&App) -> Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("version", &self.version).finish()
    }
}

/// All migrations in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "1771000000_init_collections",
        up: m1771000000_init_collections::up,
        down: m1771000000_init_collections::down,
    },
    Migration {
        version: "1771422155_updated_mc_questions",
        up: m1771422155_updated_mc_questions::up,
        down: m1771422155_updated_mc_questions::down,
    },
    Migration {
        version: "1771426316_updated_chapters",
        up: m1771426316_updated_chapters::up,
        down: m1771426316_updated_chapters::down,
    },
    Migration {
        version: "1771440943_updated_chapters",
        up: m1771440943_updated_chapters::up,
        down: m1771440943_updated_chapters::down,
    },
];

/// A row of the migration ledger.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    pub version: String,
    /// Unix milliseconds.
    pub applied_at: i64,
}

/// Applied migrations, oldest first.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read.
pub fn history(app: &App) -> Result<Vec<AppliedMigration>> {
    Ok(app
        .storage()
        .applied_migrations()?
        .into_iter()
        .map(|(version, applied_at)| AppliedMigration {
            version,
            applied_at,
        })
        .collect())
}

/// Migrations not yet applied, in order.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read.
pub fn pending(app: &App) -> Result<Vec<&'static Migration>> {
    let applied: HashSet<String> = app
        .storage()
        .applied_migrations()?
        .into_iter()
        .map(|(version, _)| version)
        .collect();

    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(m.version))
        .collect())
}

/// Apply every pending migration. Returns the versions applied.
///
/// # Errors
///
/// Returns [`Error::Migration`] for the first step that fails.
pub fn run_pending(app: &App) -> Result<Vec<&'static str>> {
    let mut applied = Vec::new();

    for migration in pending(app)? {
        info!(version = migration.version, "Applying migration");

        (migration.up)(app).map_err(|e| Error::Migration {
            version: migration.version.to_string(),
            message: e.to_string(),
        })?;
        app.storage().mark_migration_applied(migration.version)?;

        info!(version = migration.version, "Migration complete");
        applied.push(migration.version);
    }

    Ok(applied)
}

/// Revert the last `count` applied migrations, newest first. Returns the
/// versions reverted.
///
/// # Errors
///
/// Returns [`Error::Migration`] if a step fails or an applied version is
/// unknown to this binary.
pub fn revert(app: &App, count: usize) -> Result<Vec<&'static str>> {
    let applied = app.storage().applied_migrations()?;
    let mut reverted = Vec::new();

    for (version, _) in applied.iter().rev().take(count) {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.version == version.as_str())
            .ok_or_else(|| Error::Migration {
                version: version.clone(),
                message: "applied migration is not known to this build".to_string(),
            })?;

        info!(version = migration.version, "Reverting migration");

        (migration.down)(app).map_err(|e| Error::Migration {
            version: migration.version.to_string(),
            message: e.to_string(),
        })?;
        app.storage().unmark_migration(migration.version)?;

        reverted.push(migration.version);
    }

    Ok(reverted)
}

/// Load a collection by id, let `change` edit it, then save it.
fn update_collection(
    app: &App,
    id: &str,
    change: impl FnOnce(&mut Collection) -> Result<()>,
) -> Result<()> {
    let mut collection = Arc::unwrap_or_clone(app.find_collection_by_name_or_id(id)?);
    change(&mut collection)?;
    app.save_collection(&collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::{FieldKind, Record};
    use serde_json::json;

    fn app() -> App {
        App::open_memory(AppConfig::default()).unwrap()
    }

    fn field_names(app: &App, collection: &str) -> Vec<String> {
        app.find_collection_by_name_or_id(collection)
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    #[test]
    fn test_versions_sorted_and_unique() {
        let versions: Vec<&str> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_run_pending_fresh_db() {
        let app = app();
        let applied = run_pending(&app).unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());
        assert!(pending(&app).unwrap().is_empty());

        assert_eq!(
            field_names(&app, "mc_questions"),
            [
                "id",
                "question",
                "chapter",
                "correctAnswer",
                "otherAnswers",
                "footer",
                "created",
                "updated"
            ]
        );
        assert_eq!(
            field_names(&app, "chapters"),
            ["id", "index", "title", "lessons", "created", "updated"]
        );
    }

    #[test]
    fn test_run_pending_idempotent() {
        let app = app();
        run_pending(&app).unwrap();
        assert!(run_pending(&app).unwrap().is_empty());
        assert_eq!(history(&app).unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn test_question_field_swap_keeps_text_values() {
        let app = app();
        run_pending(&app).unwrap();
        revert(&app, 3).unwrap();
        assert_eq!(history(&app).unwrap().len(), 1);

        let mut question = Record::new(app.find_collection_by_name_or_id("mc_questions").unwrap());
        question.set("question", json!("<p>rich</p>"));
        question.set("qu", json!("plain"));
        let saved = app.create_record(question).unwrap();

        run_pending(&app).unwrap();
        let migrated = app.find_record_by_id("mc_questions", saved.id()).unwrap();
        assert_eq!(migrated.get_str("question"), "plain");
        assert!(migrated.get("qu").is_none());

        let collection = app.find_collection_by_name_or_id("pbc_2001502728").unwrap();
        let field = collection.fields.get_by_name("question").unwrap();
        assert_eq!(field.id, "text1469243387");
        assert_eq!(field.kind, FieldKind::Text);
    }

    #[test]
    fn test_revert_restores_previous_shapes() {
        let app = app();
        run_pending(&app).unwrap();

        let reverted = revert(&app, 3).unwrap();
        assert_eq!(
            reverted,
            [
                "1771440943_updated_chapters",
                "1771426316_updated_chapters",
                "1771422155_updated_mc_questions"
            ]
        );

        assert_eq!(
            field_names(&app, "mc_questions"),
            [
                "id",
                "question",
                "chapter",
                "correctAnswer",
                "qu",
                "otherAnswers",
                "footer",
                "created",
                "updated"
            ]
        );
        let mc = app.find_collection_by_name_or_id("mc_questions").unwrap();
        assert_eq!(mc.fields.get_by_name("question").unwrap().kind, FieldKind::Editor);

        let chapters = app.find_collection_by_name_or_id("chapters").unwrap();
        assert!(chapters.fields.get_by_name("lessons").is_none());
        assert!(!chapters.fields.get_by_name("index").unwrap().presentable);
        assert!(!chapters.fields.get_by_name("title").unwrap().presentable);
    }

    #[test]
    fn test_presentable_flags() {
        let app = app();
        run_pending(&app).unwrap();
        let chapters = app.find_collection_by_name_or_id("pbc_2272205672").unwrap();
        assert!(chapters.fields.get_by_id("number2155046657").unwrap().presentable);
        assert!(chapters.fields.get_by_id("text724990059").unwrap().presentable);
    }

    #[test]
    fn test_revert_everything() {
        let app = app();
        run_pending(&app).unwrap();
        revert(&app, MIGRATIONS.len()).unwrap();

        assert!(app.find_all_collections().unwrap().is_empty());
        assert_eq!(pending(&app).unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn test_failed_step_is_not_recorded() {
        let app = app();
        // without the base collections the alteration steps cannot find their targets
        let err = (MIGRATIONS[1].up)(&app).unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound { .. }));
        assert!(history(&app).unwrap().is_empty());
    }
}

//! Migrate command implementations.

use colored::Colorize;

use crate::app::App;
use crate::cli::MigrateCommands;
use crate::error::Result;
use crate::migrations;

/// Execute migrate commands.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read or a migration fails.
pub fn execute(command: &MigrateCommands, app: &App, json: bool) -> Result<()> {
    match command {
        MigrateCommands::Up => up(app, json),
        MigrateCommands::Down { count } => down(app, *count, json),
        MigrateCommands::History => history(app, json),
    }
}

fn up(app: &App, json: bool) -> Result<()> {
    let applied = migrations::run_pending(app)?;

    if json {
        let output = serde_json::json!({ "applied": applied });
        println!("{}", serde_json::to_string(&output)?);
    } else if applied.is_empty() {
        println!("No pending migrations.");
    } else {
        for version in &applied {
            println!("{} {version}", "Applied".green());
        }
    }
    Ok(())
}

fn down(app: &App, count: usize, json: bool) -> Result<()> {
    let reverted = migrations::revert(app, count)?;

    if json {
        let output = serde_json::json!({ "reverted": reverted });
        println!("{}", serde_json::to_string(&output)?);
    } else if reverted.is_empty() {
        println!("No migrations to revert.");
    } else {
        for version in &reverted {
            println!("{} {version}", "Reverted".yellow());
        }
    }
    Ok(())
}

fn history(app: &App, json: bool) -> Result<()> {
    let applied = migrations::history(app)?;
    let pending = migrations::pending(app)?;

    if json {
        let output = serde_json::json!({
            "applied": applied,
            "pending": pending.iter().map(|m| m.version).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if applied.is_empty() && pending.is_empty() {
        println!("No migrations.");
        return Ok(());
    }
    for migration in &applied {
        let at = chrono::DateTime::from_timestamp_millis(migration.applied_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("  {} {:<36} {}", "✓".green(), migration.version, at.dimmed());
    }
    for migration in &pending {
        println!("  {} {:<36} {}", "·".yellow(), migration.version, "pending".dimmed());
    }
    Ok(())
}

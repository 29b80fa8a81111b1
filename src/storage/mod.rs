//! SQLite storage layer for quizbase.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - JSON documents for collections and records
//!
//! # Submodules
//!
//! - [`schema`] - System table definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, SqliteStorage, StoredRecord};

//! quizbase - quiz platform backend
//!
//! A small PocketBase-style server for quiz content: collections of
//! lectures, chapters and multiple-choice questions stored in SQLite, with a
//! git-friendly JSON copy kept next to the database.
//!
//! # Architecture
//!
//! - [`app`] - Application handle: collections, records, hooks
//! - [`hooks`] - Lifecycle hook registry (record create/update/delete, serve)
//! - [`migrations`] - Versioned collection schema changes
//! - [`sync`] - JSON snapshot export on write, import on start
//! - [`api`] - HTTP API (axum)
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Collections, fields and records
//! - [`storage`] - SQLite database layer
//! - [`validate`] - Record and collection validation
//! - [`config`] - Data/sync directory resolution and environment
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod hooks;
pub mod migrations;
pub mod model;
pub mod storage;
pub mod sync;
pub mod validate;

pub use app::App;
pub use error::{Error, Result};

//! Command implementations.

pub mod collection;
pub mod completions;
pub mod migrate;
pub mod record;
pub mod serve;
pub mod sync;
pub mod version;

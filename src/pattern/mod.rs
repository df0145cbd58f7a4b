//! Action pattern module.
//!
//! An **action pattern** is the unit of learning: what was done, where, with
//! what payload, and whether it worked.
//!
//! # Operations
//!
//! All pattern operations are available on [`AgentDB`](crate::AgentDB):
//!
//! - [`store_action(pattern)`](crate::AgentDB::store_action)
//! - [`store_actions(patterns)`](crate::AgentDB::store_actions)
//! - [`get_pattern(id)`](crate::AgentDB::get_pattern)
//! - [`find_similar(query, k, options)`](crate::AgentDB::find_similar)
//! - [`query_by_metadata(filter)`](crate::AgentDB::query_by_metadata)

pub mod types;
mod validation;

pub use types::{ActionPattern, StoredEntry};

pub(crate) use validation::validate_pattern;

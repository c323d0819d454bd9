//! Storage and indexing engine for a personal knowledge base of zettel.
//!
//! Zettel live in boxes ([`boxes::ManagedBox`]); the [`boxes::Manager`]
//! combines them into one store and maintains a reference and word index
//! that queries ([`query::Query`]) run against.

pub mod app;
pub mod ast;
pub mod boxes;
pub mod cli;
pub mod config;
pub mod content;
pub mod id;
pub mod logging;
pub mod meta;
pub mod parser;
pub mod query;
pub mod reference;
pub mod store;

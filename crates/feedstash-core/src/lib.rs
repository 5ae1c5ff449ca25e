//! Core types and trait definitions for feedstash.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the item model, the storage and search-index abstractions, and the logic
//! that keeps the search index caught up with the relational store.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod index;
pub mod ingest;
pub mod item;
pub mod query;
pub mod store;
pub mod sync;
pub mod timestamp;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;

//! Storage layer for cash

pub mod compression;
mod store;

pub use store::{CacheStore, Reply, SharedStore};

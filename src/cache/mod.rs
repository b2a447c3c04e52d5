//! Cache module for storing snapshots to disk
//!
//! This module provides a cache manager that persists named envelopes
//! (`{timestamp, data}`) to the filesystem. Each named cache has its own
//! validity duration: the main data cache is short-lived, the ticker cache
//! lasts about a year.

mod manager;

pub use manager::{CacheDurations, CacheKind, CacheManager};

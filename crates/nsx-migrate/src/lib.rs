//! nsx-migrate - legacy binding schema migration.
//!
//! One-shot, idempotent-by-construction batch migration from the legacy
//! binding schema to the segment-based schema, in two independent phases:
//!
//! 1. Segment backfill: every network without a transport segment gets a
//!    vxlan segment with a VNI from the free pool, then the pool entries
//!    referenced by vxlan segments are bulk-marked allocated.
//! 2. Binding migration: legacy binding rows not yet present in the new
//!    binding table are rewritten against the new schema; rows for vanished
//!    ports are dropped without replacement.
//!
//! A dry-run mode renders every would-be write instead of executing it,
//! with identical decision logic, so the output is a faithful preview.

pub mod db;
pub mod migrate;

pub use db::{RedisSchemaDb, SchemaDb};
pub use migrate::Migration;

//! Vessel tracker
//!
//! Pulls position reports from a telemetry source and keeps a bounded
//! per-vessel history plus one current-state row per vessel.

pub mod config;
pub mod database;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod scheduler;
pub mod seed;
pub mod source;

//! Reelmatch - metadata resolution engine for self-hosted media libraries.
//!
//! Identifies movies and shows against external catalogs, scores candidate
//! matches, and caches per-provider detail snapshots so the display source
//! can be switched without another network round-trip.

pub mod config;
pub mod metadata;
pub mod telemetry;

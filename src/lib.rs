//! Zonda — delivery coverage zone resolution & synchronization engine.
//!
//! Answers "which subsidiaries deliver to this address?" by geocoding the
//! address, testing the coordinate against each subsidiary's coverage
//! polygons, and refining coarse polygon hits with per-street house-number
//! ranges. Zone definitions live in an authoritative remote store; a local
//! file cache mirrors them so membership queries avoid a network round-trip.

pub mod config;
pub mod geocode;
pub mod geometry;
pub mod resolve;
pub mod server;
pub mod streets;
pub mod zones;

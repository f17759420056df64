//! syncbeats-core — shared library for synchronized group video playback.
//!
//! # Architecture (Clean Architecture)
//!
//! - **domain**: protocol events, identifiers, playback and room value types
//!   (no I/O).
//! - **application**: the sync engine, its session loop, use cases and port
//!   traits.
//! - **adapters**: WebSocket relay channel (tokio-tungstenite), room REST
//!   service (reqwest), in-memory and headless stand-ins.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;

pub use config::SyncConfig;
pub use error::{Result, SyncError};

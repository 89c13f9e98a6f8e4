//! # Engine Module
//!
//! Stateful machinery behind the [`Viewer`](crate::viewer::Viewer): configuration,
//! the error taxonomy, surface jobs and the renderable-object cache.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Surface and viewer settings with validating builders
//! - **Error Handling** ([`error`]) - The [`EngineError`](error::EngineError) taxonomy
//! - **Surface Jobs** ([`job`]) - Sync or background extraction with status, wait and subscribe
//! - **Render Cache** ([`cache`]) - Per-model geometry keyed by generation counters
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//!
//! ## Surface Lifecycle
//!
//! A surface job starts `Pending` and is published exactly once as `Ready`, or
//! ends `Cancelled` without ever exposing a mesh. Published meshes are shared as
//! `Arc<Mesh>` and never mutated. When the atoms behind a ready surface change,
//! the surface becomes `Invalidated` and keeps no mesh.

pub mod cache;
pub mod config;
pub mod error;
pub mod job;
pub mod progress;

//! keepsake-web — Web UI for a keepsake experiment repository
//! Provides:
//!   - Experiment list (newest first) with primary metric and best score
//!   - Experiment detail with params, checkpoints and best checkpoint
//!   - Delete / stop actions proxied to the project daemon
//!   - JSON API mirroring the pages
//!   - Liveness check

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod templates;
pub mod view;

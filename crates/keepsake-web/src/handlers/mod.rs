//! HTTP handlers for all web routes.

pub mod api;
pub mod experiments;
pub mod index;
pub mod system;

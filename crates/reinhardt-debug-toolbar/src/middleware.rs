//! Middleware components
//!
//! This module provides Tower/Axum middleware integration for the debug toolbar.

pub mod active;
pub mod config;
pub mod layer;
pub mod service;

pub use active::{ActiveToolbarGuard, ActiveToolbars, ExecutionUnit};
pub use config::{ShowToolbar, StoreBackend, ToolbarConfig, show_toolbar};
pub use layer::{DebugToolbarLayer, ToolbarState};
pub use service::DebugToolbarService;

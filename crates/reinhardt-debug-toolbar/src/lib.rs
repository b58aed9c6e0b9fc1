//! # Reinhardt Debug Toolbar
//!
//! A debug toolbar for Tower and Axum services, inspired by Django Debug Toolbar.
//!
//! For every request the activation predicate accepts, the toolbar:
//! - wraps the handler in a chain of panels that capture diagnostics
//! - keeps the request's toolbar in a per-task registry while it runs
//! - injects the rendered toolbar before the closing `</body>` of HTML responses
//! - persists snapshots to a bounded store for history and deferred rendering
//!
//! ## Features
//!
//! - `redis-store` - Redis [`CacheBackend`](store::CacheBackend) for multi-process servers
//! - `full` - All optional features enabled
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, response::Html, routing::get};
//! use reinhardt_debug_toolbar::{DebugToolbarLayer, PanelRegistry, ToolbarConfig};
//! use std::net::SocketAddr;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ToolbarConfig::default()
//!     .with_enabled(true)
//!     .with_internal_ips(vec!["127.0.0.1".parse()?]);
//! let layer = DebugToolbarLayer::new(config, PanelRegistry::with_defaults())?;
//!
//! let app = Router::new()
//!     .route("/", get(|| async { Html("<html><body>hi</body></html>") }))
//!     .layer(layer);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Middleware**: activation, per-task registration and response rewriting
//! 2. **Toolbar**: per-request panel instances, the wrapping chain and stats
//! 3. **Panels**: capture hooks and rendering of their own stats
//! 4. **Store**: bounded persistence of toolbar snapshots
//! 5. **UI and views**: toolbar markup and the routes under `/__debug__/`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

// Module declarations following Rust 2024 module system (no mod.rs)
pub mod context;
pub mod error;
pub mod middleware;
pub mod panels;
pub mod routes;
pub mod store;
pub mod toolbar;
pub mod ui;
pub mod utils;
pub mod views;

// Re-export main types
pub use context::{RemoteAddr, RequestInfo, ResponseInfo};
pub use error::{ToolbarError, ToolbarResult};
pub use middleware::{
	ActiveToolbars, DebugToolbarLayer, DebugToolbarService, StoreBackend, ToolbarConfig,
};
pub use panels::{Panel, PanelContext, PanelRegistry};
pub use routes::{Route, RouteTable, merge_routes};
pub use store::{CacheStore, MemoryStore, StoreId, ToolbarSnapshot, ToolbarStore};
pub use toolbar::{Next, Toolbar};

pub use panels::history::HistoryPanel;
pub use panels::request::RequestPanel;
pub use panels::settings::SettingsPanel;
pub use panels::timer::TimerPanel;

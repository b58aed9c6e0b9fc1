//! Utility helpers shared by panels, rendering and views

pub mod html;
pub mod signing;

pub use html::html_escape;
pub use signing::{sign_store_id, verify_store_id};

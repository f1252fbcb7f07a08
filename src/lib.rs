//! Terminal dashboard for backend price alerts.
//!
//! A single WebSocket pushes full snapshots of every alert. Snapshots are
//! merged into a keyed store, pending to completed transitions raise toasts,
//! and the store is shown as a pending list plus paginated completed alerts.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod ui;

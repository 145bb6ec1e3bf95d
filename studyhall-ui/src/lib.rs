//! # Studyhall UI service
//!
//! HTTP service exposing the curriculum browser, flashcard study tool,
//! practice data and the admin content-management API, backed by a
//! swappable remote store.

pub mod api;
pub mod auth;
pub mod nav;
pub mod state;

//! REST API for the learning portal
//!
//! Curriculum reads, gate-protected admin writes, auth/session control,
//! local profile access and the SSE event stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{AppContext, create_router, run};

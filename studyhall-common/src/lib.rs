//! # Studyhall Common Library
//!
//! Shared code for the Studyhall curriculum service including:
//! - Entity models (subjects, chapters, topics, subtopics, flashcards)
//! - Remote store abstraction with SQLite and in-memory backends
//! - Curriculum tree assembly and lookup
//! - Local profile persistence (identity, theme, progress)
//! - Configuration loading
//! - Seeding from the bundled dataset

pub mod config;
pub mod curriculum;
pub mod error;
pub mod models;
pub mod profile;
pub mod seed;
pub mod store;

pub use error::{Error, Result};

//! Core module - Shared building blocks
//!
//! This module provides:
//! - Time source abstraction
//! - Unified result model and renderer
//! - Storage layout helpers
//! - Hashing and size utilities

pub mod clock;
pub mod model;
pub mod paths;
pub mod render;
pub mod util;

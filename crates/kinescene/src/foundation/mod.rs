//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types (poses, vectors, dense matrices)
//! - Scene-scoped id generation
//! - Logging utilities

pub mod ids;
pub mod logging;
pub mod math;

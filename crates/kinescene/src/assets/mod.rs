//! Asset loading for collision geometry
//!
//! Convex hulls are loaded once per path and shared between every shape and
//! scene that uses them.

pub mod mesh_cache;
pub mod obj_hull;

pub use mesh_cache::{MeshCache, MeshLoader};
pub use obj_hull::ObjHullLoader;

use thiserror::Error;

/// Asset loading errors
#[derive(Debug, Error)]
pub enum AssetError {
    /// File does not exist
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// IO failure while reading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed content
    #[error("Parse error in {path} line {line}: {message}")]
    Parse {
        /// Source path
        path: String,
        /// One-based line number, 0 when not tied to a line
        line: usize,
        /// Description
        message: String,
    },

    /// File contains no geometry
    #[error("No convex geometry in {0}")]
    Empty(String),
}

//! Rendering collaborator interface
//!
//! The scene only creates, moves, tags and destroys render proxies; drawing is
//! left entirely to the backend implementation.

pub mod backend;
pub mod headless;

pub use backend::{
    CameraHandle, RenderBackend, RenderBodyHandle, RenderError, RenderMaterial, RenderMesh,
    RenderPrimitive, RenderResult,
};
pub use headless::{HeadlessRenderer, RenderSource};

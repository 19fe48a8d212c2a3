//! Backend abstraction traits for the rendering side of a scene
//!
//! The renderer is an opaque collaborator: the scene hands it primitive or
//! mesh descriptors and receives handles it can later move, hide, tag or
//! destroy. Nothing here knows about shading.

use crate::foundation::ids::RenderId;
use crate::foundation::math::{Pose, Vec3};
use std::path::Path;
use thiserror::Error;

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors reported by a render backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    /// The backend could not create a render body or camera
    #[error("Render resource creation failed: {0}")]
    CreationFailed(String),

    /// A mesh file could not be loaded
    #[error("Failed to load mesh {path}: {reason}")]
    MeshLoad {
        /// Mesh file path
        path: String,
        /// Loader message
        reason: String,
    },

    /// Handle does not name a live render object
    #[error("Invalid render handle {0}")]
    InvalidHandle(u64),
}

/// Opaque handle to one drawable instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderBodyHandle(pub u64);

/// Opaque handle to a render camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CameraHandle(pub u64);

/// Built-in render primitives, unit sized and scaled by the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderPrimitive {
    /// Unit cube, scaled by half extents
    Box,
    /// Unit sphere, scaled by radius
    Sphere,
    /// Capsule along x
    Capsule {
        /// Cap radius
        radius: f32,
        /// Half length of the cylindrical part
        half_length: f32,
    },
    /// Unit yz plane facing +x
    Plane,
}

/// Surface appearance handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMaterial {
    /// Base color (RGBA)
    pub base_color: [f32; 4],
    /// Specular intensity
    pub specular: f32,
    /// Roughness
    pub roughness: f32,
    /// Metallic factor
    pub metallic: f32,
}

impl RenderMaterial {
    /// Solid color with default surface parameters
    pub fn from_color(base_color: [f32; 4]) -> Self {
        Self {
            base_color,
            ..Self::default()
        }
    }
}

impl Default for RenderMaterial {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            specular: 0.0,
            roughness: 0.85,
            metallic: 0.0,
        }
    }
}

/// Raw triangle mesh buffers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMesh {
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Per-vertex normals, same length as `vertices`
    pub normals: Vec<Vec3>,
    /// Triangle list
    pub indices: Vec<u32>,
}

impl RenderMesh {
    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Main render backend trait
pub trait RenderBackend {
    /// Create a body from a built-in primitive
    fn add_primitive(
        &mut self,
        primitive: RenderPrimitive,
        scale: Vec3,
        material: &RenderMaterial,
    ) -> RenderResult<RenderBodyHandle>;

    /// Create a body from a mesh file, using the file's own materials when `material` is `None`
    fn add_mesh_file(
        &mut self,
        path: &Path,
        scale: Vec3,
        material: Option<&RenderMaterial>,
    ) -> RenderResult<RenderBodyHandle>;

    /// Create a body from raw buffers
    fn add_mesh(
        &mut self,
        mesh: &RenderMesh,
        scale: Vec3,
        material: &RenderMaterial,
    ) -> RenderResult<RenderBodyHandle>;

    /// Offset of the body relative to the pose set with `update_pose`
    fn set_initial_pose(&mut self, body: RenderBodyHandle, pose: Pose);

    /// World pose of the owning entity
    fn update_pose(&mut self, body: RenderBodyHandle, pose: Pose);

    /// Show or hide
    fn set_visible(&mut self, body: RenderBodyHandle, visible: bool);

    /// Display opacity in `[0, 1]`
    fn set_visibility(&mut self, body: RenderBodyHandle, visibility: f32);

    /// Backend-defined render mode (0 = normal, 1 = collision overlay)
    fn set_render_mode(&mut self, body: RenderBodyHandle, mode: u32);

    /// Unique id reported by per-body id passes
    fn set_unique_id(&mut self, body: RenderBodyHandle, id: RenderId);

    /// Segmentation id reported by per-entity id passes
    fn set_segmentation_id(&mut self, body: RenderBodyHandle, id: u32);

    /// Debug name
    fn set_name(&mut self, body: RenderBodyHandle, name: &str);

    /// Destroy a body
    fn destroy(&mut self, body: RenderBodyHandle);

    /// Create a camera
    fn add_camera(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        fovy: f32,
        near: f32,
        far: f32,
    ) -> RenderResult<CameraHandle>;

    /// Destroy a camera
    fn remove_camera(&mut self, camera: CameraHandle);

    /// World pose of a camera
    fn set_camera_pose(&mut self, camera: CameraHandle, pose: Pose);

    /// Downcast to concrete backend type for advanced operations
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to mutable concrete backend type for advanced operations
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

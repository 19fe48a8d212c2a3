//! Recording render backend
//!
//! Keeps a table entry per render body and camera so that scene behaviour
//! (proxy creation, pose sync, visibility, destruction) can be inspected
//! without a GPU.

use crate::foundation::ids::RenderId;
use crate::foundation::math::{Pose, Vec3};
use crate::render::backend::{
    CameraHandle, RenderBackend, RenderBodyHandle, RenderError, RenderMaterial, RenderMesh,
    RenderPrimitive, RenderResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What a render body was created from
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSource {
    /// Built-in primitive
    Primitive(RenderPrimitive),
    /// Mesh file
    MeshFile(PathBuf),
    /// Raw buffers
    Mesh(RenderMesh),
}

/// Recorded state of one render body
#[derive(Debug, Clone)]
pub struct RenderBodyRecord {
    /// Creation source
    pub source: RenderSource,
    /// Scale
    pub scale: Vec3,
    /// Material, if any was given
    pub material: Option<RenderMaterial>,
    /// Local offset
    pub initial_pose: Pose,
    /// Last pushed world pose
    pub pose: Pose,
    /// Shown or hidden
    pub visible: bool,
    /// Opacity
    pub visibility: f32,
    /// Render mode
    pub render_mode: u32,
    /// Unique id
    pub unique_id: Option<RenderId>,
    /// Segmentation id
    pub segmentation_id: u32,
    /// Debug name
    pub name: String,
    /// Set once `destroy` was called
    pub destroyed: bool,
}

/// Recorded state of one camera
#[derive(Debug, Clone)]
pub struct CameraRecord {
    /// Camera name
    pub name: String,
    /// Image size
    pub size: (u32, u32),
    /// Vertical field of view
    pub fovy: f32,
    /// Clip planes
    pub clip: (f32, f32),
    /// Last pushed world pose
    pub pose: Pose,
}

/// Render backend that only records calls
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_handle: u64,
    bodies: HashMap<RenderBodyHandle, RenderBodyRecord>,
    cameras: HashMap<CameraHandle, CameraRecord>,
    missing_files: Vec<PathBuf>,
}

impl HeadlessRenderer {
    /// Create an empty renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `add_mesh_file` fail for `path`
    pub fn mark_missing(&mut self, path: impl Into<PathBuf>) {
        self.missing_files.push(path.into());
    }

    /// Recorded state of a body
    pub fn body(&self, body: RenderBodyHandle) -> Option<&RenderBodyRecord> {
        self.bodies.get(&body)
    }

    /// Whether `destroy` was called on a body
    pub fn is_destroyed(&self, body: RenderBodyHandle) -> bool {
        self.bodies.get(&body).is_some_and(|b| b.destroyed)
    }

    /// Number of bodies not yet destroyed
    pub fn live_body_count(&self) -> usize {
        self.bodies.values().filter(|b| !b.destroyed).count()
    }

    /// Recorded state of a camera
    pub fn camera(&self, camera: CameraHandle) -> Option<&CameraRecord> {
        self.cameras.get(&camera)
    }

    /// Number of live cameras
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    fn insert(
        &mut self,
        source: RenderSource,
        scale: Vec3,
        material: Option<RenderMaterial>,
    ) -> RenderBodyHandle {
        self.next_handle += 1;
        let handle = RenderBodyHandle(self.next_handle);
        self.bodies.insert(
            handle,
            RenderBodyRecord {
                source,
                scale,
                material,
                initial_pose: Pose::identity(),
                pose: Pose::identity(),
                visible: true,
                visibility: 1.0,
                render_mode: 0,
                unique_id: None,
                segmentation_id: 0,
                name: String::new(),
                destroyed: false,
            },
        );
        handle
    }

    fn live_mut(&mut self, body: RenderBodyHandle) -> Option<&mut RenderBodyRecord> {
        match self.bodies.get_mut(&body) {
            Some(record) if !record.destroyed => Some(record),
            _ => {
                log::warn!("Render call on unknown or destroyed body {}", body.0);
                None
            }
        }
    }
}

impl RenderBackend for HeadlessRenderer {
    fn add_primitive(
        &mut self,
        primitive: RenderPrimitive,
        scale: Vec3,
        material: &RenderMaterial,
    ) -> RenderResult<RenderBodyHandle> {
        Ok(self.insert(
            RenderSource::Primitive(primitive),
            scale,
            Some(material.clone()),
        ))
    }

    fn add_mesh_file(
        &mut self,
        path: &Path,
        scale: Vec3,
        material: Option<&RenderMaterial>,
    ) -> RenderResult<RenderBodyHandle> {
        if self.missing_files.iter().any(|p| p == path) {
            return Err(RenderError::MeshLoad {
                path: path.display().to_string(),
                reason: "file not found".to_string(),
            });
        }
        Ok(self.insert(
            RenderSource::MeshFile(path.to_path_buf()),
            scale,
            material.cloned(),
        ))
    }

    fn add_mesh(
        &mut self,
        mesh: &RenderMesh,
        scale: Vec3,
        material: &RenderMaterial,
    ) -> RenderResult<RenderBodyHandle> {
        if mesh.vertices.len() != mesh.normals.len() {
            return Err(RenderError::CreationFailed(format!(
                "{} vertices but {} normals",
                mesh.vertices.len(),
                mesh.normals.len()
            )));
        }
        Ok(self.insert(
            RenderSource::Mesh(mesh.clone()),
            scale,
            Some(material.clone()),
        ))
    }

    fn set_initial_pose(&mut self, body: RenderBodyHandle, pose: Pose) {
        if let Some(record) = self.live_mut(body) {
            record.initial_pose = pose;
        }
    }

    fn update_pose(&mut self, body: RenderBodyHandle, pose: Pose) {
        if let Some(record) = self.live_mut(body) {
            record.pose = pose;
        }
    }

    fn set_visible(&mut self, body: RenderBodyHandle, visible: bool) {
        if let Some(record) = self.live_mut(body) {
            record.visible = visible;
        }
    }

    fn set_visibility(&mut self, body: RenderBodyHandle, visibility: f32) {
        if let Some(record) = self.live_mut(body) {
            record.visibility = visibility.clamp(0.0, 1.0);
        }
    }

    fn set_render_mode(&mut self, body: RenderBodyHandle, mode: u32) {
        if let Some(record) = self.live_mut(body) {
            record.render_mode = mode;
        }
    }

    fn set_unique_id(&mut self, body: RenderBodyHandle, id: RenderId) {
        if let Some(record) = self.live_mut(body) {
            record.unique_id = Some(id);
        }
    }

    fn set_segmentation_id(&mut self, body: RenderBodyHandle, id: u32) {
        if let Some(record) = self.live_mut(body) {
            record.segmentation_id = id;
        }
    }

    fn set_name(&mut self, body: RenderBodyHandle, name: &str) {
        if let Some(record) = self.live_mut(body) {
            record.name = name.to_string();
        }
    }

    fn destroy(&mut self, body: RenderBodyHandle) {
        if let Some(record) = self.live_mut(body) {
            record.destroyed = true;
        }
    }

    fn add_camera(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        fovy: f32,
        near: f32,
        far: f32,
    ) -> RenderResult<CameraHandle> {
        if width == 0 || height == 0 {
            return Err(RenderError::CreationFailed(format!(
                "camera '{name}' has an empty image"
            )));
        }
        self.next_handle += 1;
        let handle = CameraHandle(self.next_handle);
        self.cameras.insert(
            handle,
            CameraRecord {
                name: name.to_string(),
                size: (width, height),
                fovy,
                clip: (near, far),
                pose: Pose::identity(),
            },
        );
        Ok(handle)
    }

    fn remove_camera(&mut self, camera: CameraHandle) {
        if self.cameras.remove(&camera).is_none() {
            log::warn!("remove_camera on unknown camera {}", camera.0);
        }
    }

    fn set_camera_pose(&mut self, camera: CameraHandle, pose: Pose) {
        if let Some(record) = self.cameras.get_mut(&camera) {
            record.pose = pose;
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroyed_bodies_ignore_updates() {
        let mut renderer = HeadlessRenderer::new();
        let body = renderer
            .add_primitive(RenderPrimitive::Box, Vec3::new(1.0, 1.0, 1.0), &RenderMaterial::default())
            .unwrap();
        renderer.set_visible(body, false);
        renderer.destroy(body);
        renderer.set_visible(body, true);

        assert!(renderer.is_destroyed(body));
        assert!(!renderer.body(body).unwrap().visible);
        assert_eq!(renderer.live_body_count(), 0);
    }

    #[test]
    fn test_missing_mesh_file() {
        let mut renderer = HeadlessRenderer::new();
        renderer.mark_missing("missing.obj");
        let result = renderer.add_mesh_file(Path::new("missing.obj"), Vec3::new(1.0, 1.0, 1.0), None);
        assert!(matches!(result, Err(RenderError::MeshLoad { .. })));
    }

    #[test]
    fn test_camera_requires_image_size() {
        let mut renderer = HeadlessRenderer::new();
        assert!(renderer.add_camera("cam", 0, 480, 1.0, 0.1, 10.0).is_err());
        let camera = renderer.add_camera("cam", 640, 480, 1.0, 0.1, 10.0).unwrap();
        assert_eq!(renderer.camera(camera).unwrap().size, (640, 480));
    }
}

//! Unmaterialized shape and visual records
//!
//! Builders only append records; nothing touches a backend until `build`.
//! [`ShapeRecorder`] provides the recording API shared by actor and link
//! builders on top of a [`BodyRecords`] store.

use crate::foundation::math::{Pose, Vec3};
use crate::physics::{CollisionGroups, ConvexMesh, MaterialHandle};
use crate::render::{RenderMaterial, RenderMesh, RenderPrimitive};
use std::path::PathBuf;
use std::sync::Arc;

/// Per-shape physical parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeOptions {
    /// Physical material; the scene default when `None`
    pub material: Option<MaterialHandle>,
    /// Density used for derived mass properties
    pub density: f32,
    /// Torsional friction patch radius
    pub patch_radius: f32,
    /// Minimum torsional friction patch radius
    pub min_patch_radius: f32,
    /// Report overlaps instead of colliding
    pub is_trigger: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            material: None,
            density: 1000.0,
            patch_radius: 0.0,
            min_patch_radius: 0.0,
            is_trigger: false,
        }
    }
}

impl ShapeOptions {
    /// Default options with a specific material
    pub fn with_material(material: MaterialHandle) -> Self {
        Self {
            material: Some(material),
            ..Self::default()
        }
    }

    /// Default options with a specific density
    pub fn with_density(density: f32) -> Self {
        Self {
            density,
            ..Self::default()
        }
    }
}

/// Geometry source of a shape record
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeSource {
    /// Box
    Box {
        /// Half extents
        half_extents: Vec3,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Capsule along local x
    Capsule {
        /// Radius
        radius: f32,
        /// Half length of the cylindrical part
        half_length: f32,
    },
    /// In-memory convex hull
    Convex {
        /// Hull
        mesh: Arc<ConvexMesh>,
        /// Scale
        scale: Vec3,
    },
    /// First convex hull of a mesh file
    ConvexFile {
        /// Mesh file
        path: PathBuf,
        /// Scale
        scale: Vec3,
    },
    /// Every convex part of a mesh file, one shape each
    ConvexFileParts {
        /// Mesh file
        path: PathBuf,
        /// Scale
        scale: Vec3,
    },
}

/// One recorded collision shape
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    /// Geometry source
    pub source: ShapeSource,
    /// Pose on the body
    pub pose: Pose,
    /// Physical parameters
    pub options: ShapeOptions,
}

/// Geometry source of a visual record
#[derive(Debug, Clone, PartialEq)]
pub enum VisualSource {
    /// Built-in primitive with scale
    Primitive {
        /// Primitive
        primitive: RenderPrimitive,
        /// Scale
        scale: Vec3,
    },
    /// Mesh file
    File {
        /// Mesh file
        path: PathBuf,
        /// Scale
        scale: Vec3,
    },
    /// Raw buffers
    Mesh {
        /// Buffers
        mesh: RenderMesh,
        /// Scale
        scale: Vec3,
    },
}

/// One recorded visual
#[derive(Debug, Clone, PartialEq)]
pub struct VisualRecord {
    /// Geometry source
    pub source: VisualSource,
    /// Pose on the body
    pub pose: Pose,
    /// Material; files use their own when `None`
    pub material: Option<RenderMaterial>,
    /// Visual name
    pub name: String,
}

/// Explicit mass properties overriding density-derived ones
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplicitMass {
    /// Mass
    pub mass: f32,
    /// Center-of-mass frame on the body
    pub cmass_local_pose: Pose,
    /// Principal inertia
    pub inertia: Vec3,
}

/// Everything a builder records for one body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyRecords {
    /// Collision shapes
    pub shapes: Vec<ShapeRecord>,
    /// Visuals
    pub visuals: Vec<VisualRecord>,
    /// Filter words attached to every shape at build time
    pub collision_groups: CollisionGroups,
    /// Explicit mass, if set
    pub mass: Option<ExplicitMass>,
}

/// Recording API shared by actor and link builders
pub trait ShapeRecorder {
    /// Underlying records
    fn records(&self) -> &BodyRecords;

    /// Underlying records, mutable
    fn records_mut(&mut self) -> &mut BodyRecords;

    /// Record a box shape
    fn add_box_shape(&mut self, pose: Pose, half_extents: Vec3, options: ShapeOptions) -> &mut Self {
        self.push_shape(ShapeSource::Box { half_extents }, pose, options)
    }

    /// Record a sphere shape
    fn add_sphere_shape(&mut self, pose: Pose, radius: f32, options: ShapeOptions) -> &mut Self {
        self.push_shape(ShapeSource::Sphere { radius }, pose, options)
    }

    /// Record a capsule shape along local x
    fn add_capsule_shape(
        &mut self,
        pose: Pose,
        radius: f32,
        half_length: f32,
        options: ShapeOptions,
    ) -> &mut Self {
        self.push_shape(ShapeSource::Capsule { radius, half_length }, pose, options)
    }

    /// Record a shape from an in-memory convex hull
    fn add_convex_shape(
        &mut self,
        mesh: Arc<ConvexMesh>,
        pose: Pose,
        scale: Vec3,
        options: ShapeOptions,
    ) -> &mut Self {
        self.push_shape(ShapeSource::Convex { mesh, scale }, pose, options)
    }

    /// Record a convex shape loaded from a mesh file
    fn add_convex_shape_from_file(
        &mut self,
        path: impl Into<PathBuf>,
        pose: Pose,
        scale: Vec3,
        options: ShapeOptions,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let source = ShapeSource::ConvexFile { path: path.into(), scale };
        self.push_shape(source, pose, options)
    }

    /// Record one convex shape per part of a mesh file
    fn add_multiple_convex_shapes_from_file(
        &mut self,
        path: impl Into<PathBuf>,
        pose: Pose,
        scale: Vec3,
        options: ShapeOptions,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let source = ShapeSource::ConvexFileParts { path: path.into(), scale };
        self.push_shape(source, pose, options)
    }

    /// Record a box visual
    fn add_box_visual(
        &mut self,
        pose: Pose,
        half_extents: Vec3,
        material: RenderMaterial,
        name: &str,
    ) -> &mut Self {
        let source = VisualSource::Primitive {
            primitive: RenderPrimitive::Box,
            scale: half_extents,
        };
        self.push_visual(source, pose, Some(material), name)
    }

    /// Record a sphere visual
    fn add_sphere_visual(
        &mut self,
        pose: Pose,
        radius: f32,
        material: RenderMaterial,
        name: &str,
    ) -> &mut Self {
        let source = VisualSource::Primitive {
            primitive: RenderPrimitive::Sphere,
            scale: Vec3::new(radius, radius, radius),
        };
        self.push_visual(source, pose, Some(material), name)
    }

    /// Record a capsule visual along local x
    fn add_capsule_visual(
        &mut self,
        pose: Pose,
        radius: f32,
        half_length: f32,
        material: RenderMaterial,
        name: &str,
    ) -> &mut Self {
        let source = VisualSource::Primitive {
            primitive: RenderPrimitive::Capsule { radius, half_length },
            scale: Vec3::new(1.0, 1.0, 1.0),
        };
        self.push_visual(source, pose, Some(material), name)
    }

    /// Record a visual loaded from a mesh file with the file's own materials
    fn add_visual_from_file(
        &mut self,
        path: impl Into<PathBuf>,
        pose: Pose,
        scale: Vec3,
        name: &str,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let source = VisualSource::File { path: path.into(), scale };
        self.push_visual(source, pose, None, name)
    }

    /// Record a visual from raw buffers
    fn add_visual_from_mesh(
        &mut self,
        mesh: RenderMesh,
        pose: Pose,
        scale: Vec3,
        material: RenderMaterial,
        name: &str,
    ) -> &mut Self {
        self.push_visual(VisualSource::Mesh { mesh, scale }, pose, Some(material), name)
    }

    /// Replace the filter words with raw bitmasks
    fn set_collision_group(&mut self, w0: u32, w1: u32, w2: u32) -> &mut Self {
        self.records_mut().collision_groups.set(w0, w1, w2);
        self
    }

    /// OR one more group into each word (0 adds nothing)
    fn add_collision_group(&mut self, g0: u32, g1: u32, g2: u32) -> &mut Self {
        self.records_mut().collision_groups.add(g0, g1, g2);
        self
    }

    /// Restore the default filter words
    fn reset_collision_group(&mut self) -> &mut Self {
        self.records_mut().collision_groups.reset();
        self
    }

    /// Use explicit mass properties instead of shape densities
    fn set_mass_and_inertia(&mut self, mass: f32, cmass_local_pose: Pose, inertia: Vec3) -> &mut Self {
        self.records_mut().mass = Some(ExplicitMass {
            mass,
            cmass_local_pose,
            inertia,
        });
        self
    }

    /// Drop every shape record
    fn remove_all_shapes(&mut self) -> &mut Self {
        self.records_mut().shapes.clear();
        self
    }

    /// Drop every visual record
    fn remove_all_visuals(&mut self) -> &mut Self {
        self.records_mut().visuals.clear();
        self
    }

    /// Drop one shape record; out-of-range indices are ignored
    fn remove_shape_at(&mut self, index: usize) -> &mut Self {
        let shapes = &mut self.records_mut().shapes;
        if index < shapes.len() {
            shapes.remove(index);
        } else {
            log::warn!("remove_shape_at({index}) with {} shapes recorded", shapes.len());
        }
        self
    }

    /// Drop one visual record; out-of-range indices are ignored
    fn remove_visual_at(&mut self, index: usize) -> &mut Self {
        let visuals = &mut self.records_mut().visuals;
        if index < visuals.len() {
            visuals.remove(index);
        } else {
            log::warn!("remove_visual_at({index}) with {} visuals recorded", visuals.len());
        }
        self
    }

    /// Number of shape records
    fn shape_count(&self) -> usize {
        self.records().shapes.len()
    }

    /// Number of visual records
    fn visual_count(&self) -> usize {
        self.records().visuals.len()
    }

    #[doc(hidden)]
    fn push_shape(&mut self, source: ShapeSource, pose: Pose, options: ShapeOptions) -> &mut Self {
        self.records_mut().shapes.push(ShapeRecord {
            source,
            pose,
            options,
        });
        self
    }

    #[doc(hidden)]
    fn push_visual(
        &mut self,
        source: VisualSource,
        pose: Pose,
        material: Option<RenderMaterial>,
        name: &str,
    ) -> &mut Self {
        self.records_mut().visuals.push(VisualRecord {
            source,
            pose,
            material,
            name: name.to_string(),
        });
        self
    }
}

//! Collision geometry descriptions handed to the physics backend
//!
//! Geometry is stored in the shape's local frame; the shape's local pose
//! places it on the body.

use crate::foundation::math::Vec3;
use std::sync::Arc;

/// One planar face of a convex hull
#[derive(Debug, Clone, PartialEq)]
pub struct HullPolygon {
    /// Face plane `(nx, ny, nz, d)` with an outward unit normal
    pub plane: [f32; 4],
    /// Offset of the face's first vertex index in [`ConvexMesh::indices`]
    pub index_base: usize,
    /// Number of vertices on the face
    pub vertex_count: usize,
}

/// Immutable convex hull shared between shapes (and between scenes)
///
/// Only built through [`ConvexMesh::cuboid`] and [`ConvexMesh::from_faces`],
/// so every face index names an existing vertex and every polygon's run
/// lies inside `indices`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexMesh {
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
    polygons: Vec<HullPolygon>,
}

impl ConvexMesh {
    /// Axis-aligned box hull centred on the origin
    pub fn cuboid(half_extents: Vec3) -> Self {
        let (x, y, z) = (half_extents.x, half_extents.y, half_extents.z);
        let vertices = vec![
            Vec3::new(-x, -y, -z),
            Vec3::new(x, -y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, -z),
            Vec3::new(-x, -y, z),
            Vec3::new(x, -y, z),
            Vec3::new(x, y, z),
            Vec3::new(-x, y, z),
        ];
        // Counter-clockwise seen from outside
        let faces: [([u32; 4], [f32; 4]); 6] = [
            ([0, 3, 2, 1], [0.0, 0.0, -1.0, -z]),
            ([4, 5, 6, 7], [0.0, 0.0, 1.0, -z]),
            ([0, 1, 5, 4], [0.0, -1.0, 0.0, -y]),
            ([2, 3, 7, 6], [0.0, 1.0, 0.0, -y]),
            ([1, 2, 6, 5], [1.0, 0.0, 0.0, -x]),
            ([0, 4, 7, 3], [-1.0, 0.0, 0.0, -x]),
        ];
        let mut indices = Vec::with_capacity(24);
        let mut polygons = Vec::with_capacity(6);
        for (face, plane) in faces {
            polygons.push(HullPolygon {
                plane,
                index_base: indices.len(),
                vertex_count: face.len(),
            });
            indices.extend_from_slice(&face);
        }
        Self {
            vertices,
            indices,
            polygons,
        }
    }

    /// Hull vertices
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Per-face vertex index lists, concatenated
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Faces, each referencing a run of [`indices`](Self::indices)
    pub fn polygons(&self) -> &[HullPolygon] {
        &self.polygons
    }

    /// Vertex indices of one face, empty if `polygon` does not fit this hull
    pub fn face_indices(&self, polygon: &HullPolygon) -> &[u32] {
        polygon
            .index_base
            .checked_add(polygon.vertex_count)
            .and_then(|end| self.indices.get(polygon.index_base..end))
            .unwrap_or(&[])
    }

    /// Corner positions of one face, scaled; `None` if the face is degenerate
    pub(crate) fn face_corners(&self, polygon: &HullPolygon, scale: &Vec3) -> Option<Vec<Vec3>> {
        let face = self.face_indices(polygon);
        if face.len() < 3 {
            return None;
        }
        face.iter()
            .map(|&i| self.vertices.get(i as usize).map(|v| v.component_mul(scale)))
            .collect()
    }

    /// Build a hull from counter-clockwise faces, deriving each face plane.
    ///
    /// Returns `None` if a face has fewer than three vertices, references a
    /// missing vertex or is degenerate.
    pub fn from_faces(vertices: Vec<Vec3>, faces: &[Vec<u32>]) -> Option<Self> {
        let mut indices = Vec::new();
        let mut polygons = Vec::with_capacity(faces.len());
        for face in faces {
            if face.len() < 3 {
                return None;
            }
            let corner = |i: usize| vertices.get(face[i] as usize).copied();
            let (a, b, c) = (corner(0)?, corner(1)?, corner(2)?);
            if face.iter().any(|&i| i as usize >= vertices.len()) {
                return None;
            }
            let normal = (b - a).cross(&(c - a)).try_normalize(f32::EPSILON)?;
            polygons.push(HullPolygon {
                plane: [normal.x, normal.y, normal.z, -normal.dot(&a)],
                index_base: indices.len(),
                vertex_count: face.len(),
            });
            indices.extend_from_slice(face);
        }
        Some(Self {
            vertices,
            indices,
            polygons,
        })
    }
}

/// Convex hull instance with a per-shape scale
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexGeometry {
    /// Shared hull data
    pub mesh: Arc<ConvexMesh>,
    /// Non-uniform scale applied to the hull
    pub scale: Vec3,
}

/// Realized shape geometry
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Box given by its half extents
    Box {
        /// Half extents along x, y, z
        half_extents: Vec3,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Capsule along the local x axis
    Capsule {
        /// Radius of the hemispherical caps
        radius: f32,
        /// Half length of the cylindrical part
        half_length: f32,
    },
    /// Infinite plane with normal along local +x
    Plane,
    /// Convex hull
    ConvexMesh(ConvexGeometry),
}

impl Geometry {
    /// Short human-readable name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Sphere { .. } => "sphere",
            Self::Capsule { .. } => "capsule",
            Self::Plane => "plane",
            Self::ConvexMesh(_) => "convex_mesh",
        }
    }

    /// Volume of the geometry, `None` for unbounded geometry.
    ///
    /// Convex hull volume is computed by summing signed tetrahedra against the origin.
    pub fn volume(&self) -> Option<f32> {
        match self {
            Self::Box { half_extents } => {
                Some(8.0 * half_extents.x * half_extents.y * half_extents.z)
            }
            Self::Sphere { radius } => Some(4.0 / 3.0 * std::f32::consts::PI * radius.powi(3)),
            Self::Capsule {
                radius,
                half_length,
            } => {
                let cylinder = std::f32::consts::PI * radius * radius * 2.0 * half_length;
                let caps = 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3);
                Some(cylinder + caps)
            }
            Self::Plane => None,
            Self::ConvexMesh(convex) => {
                let mesh = &convex.mesh;
                let mut volume = 0.0;
                for polygon in mesh.polygons() {
                    let Some(corners) = mesh.face_corners(polygon, &convex.scale) else {
                        continue;
                    };
                    let a = corners[0];
                    for pair in corners[1..].windows(2) {
                        volume += a.dot(&pair[0].cross(&pair[1])) / 6.0;
                    }
                }
                Some(volume.abs())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_hull_volume_matches_box() {
        let half = Vec3::new(0.5, 1.0, 1.5);
        let hull = Geometry::ConvexMesh(ConvexGeometry {
            mesh: Arc::new(ConvexMesh::cuboid(half)),
            scale: Vec3::new(1.0, 1.0, 1.0),
        });
        let boxed = Geometry::Box { half_extents: half };
        assert_relative_eq!(hull.volume().unwrap(), boxed.volume().unwrap(), epsilon = 1e-5);
    }

    #[test]
    fn test_plane_has_no_volume() {
        assert!(Geometry::Plane.volume().is_none());
    }

    #[test]
    fn test_cuboid_faces_have_four_vertices() {
        let hull = ConvexMesh::cuboid(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(hull.polygons().len(), 6);
        for polygon in hull.polygons() {
            assert_eq!(hull.face_indices(polygon).len(), 4);
        }
    }

    #[test]
    fn test_from_faces_derives_outward_planes() {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        let hull = ConvexMesh::from_faces(vertices, &faces).unwrap();
        assert_eq!(hull.polygons()[0].plane, [0.0, 0.0, -1.0, 0.0]);
        assert_relative_eq!(hull.polygons()[3].plane[3], -(1.0f32 / 3.0).sqrt(), epsilon = 1e-5);

        let geometry = Geometry::ConvexMesh(ConvexGeometry {
            mesh: Arc::new(hull),
            scale: Vec3::new(1.0, 1.0, 1.0),
        });
        assert_relative_eq!(geometry.volume().unwrap(), 1.0 / 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_from_faces_rejects_bad_faces() {
        let vertices = vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)];
        assert!(ConvexMesh::from_faces(vertices.clone(), &[vec![0, 1]]).is_none());
        assert!(ConvexMesh::from_faces(vertices, &[vec![0, 1, 5]]).is_none());
    }

    #[test]
    fn test_polygon_from_another_hull_has_no_face() {
        let small = ConvexMesh::from_faces(
            vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            &[vec![0, 1, 2]],
        )
        .unwrap();
        let big = ConvexMesh::cuboid(Vec3::new(1.0, 1.0, 1.0));
        let far = &big.polygons()[5];
        assert!(small.face_indices(far).is_empty());
        assert!(small.face_corners(far, &Vec3::new(1.0, 1.0, 1.0)).is_none());

        let overflowing = HullPolygon {
            plane: [0.0, 0.0, 1.0, 0.0],
            index_base: usize::MAX,
            vertex_count: 3,
        };
        assert!(small.face_indices(&overflowing).is_empty());
    }
}

//! Render descriptors re-derived from realized collision geometry
//!
//! Collision proxies show what the solver actually simulates, so they are
//! built from the backend's geometry, not from the builder's records.

use crate::foundation::math::Vec3;
use crate::physics::{ConvexMesh, Geometry};
use crate::render::{RenderMesh, RenderPrimitive};

/// Render descriptor for one collision shape
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionVisual {
    /// Scaled primitive
    Primitive {
        /// Primitive
        primitive: RenderPrimitive,
        /// Scale
        scale: Vec3,
    },
    /// Triangulated hull
    Mesh {
        /// Flat-shaded buffers
        mesh: RenderMesh,
        /// Hull scale
        scale: Vec3,
    },
}

/// Describe a collision geometry for the renderer
pub fn describe(geometry: &Geometry) -> CollisionVisual {
    match geometry {
        Geometry::Box { half_extents } => CollisionVisual::Primitive {
            primitive: RenderPrimitive::Box,
            scale: *half_extents,
        },
        Geometry::Sphere { radius } => CollisionVisual::Primitive {
            primitive: RenderPrimitive::Sphere,
            scale: Vec3::new(*radius, *radius, *radius),
        },
        Geometry::Capsule {
            radius,
            half_length,
        } => CollisionVisual::Primitive {
            primitive: RenderPrimitive::Capsule {
                radius: *radius,
                half_length: *half_length,
            },
            scale: Vec3::new(1.0, 1.0, 1.0),
        },
        Geometry::Plane => CollisionVisual::Primitive {
            primitive: RenderPrimitive::Plane,
            scale: Vec3::new(1.0, 10.0, 10.0),
        },
        Geometry::ConvexMesh(convex) => CollisionVisual::Mesh {
            mesh: triangulate_hull(&convex.mesh),
            scale: convex.scale,
        },
    }
}

/// Fan-triangulate every hull face with one flat normal per face
///
/// Vertices are duplicated per face so that normals do not blend across edges.
pub fn triangulate_hull(hull: &ConvexMesh) -> RenderMesh {
    let mut mesh = RenderMesh::default();
    let unit = Vec3::new(1.0, 1.0, 1.0);
    for polygon in hull.polygons() {
        let Some(corners) = hull.face_corners(polygon, &unit) else {
            continue;
        };
        let normal = Vec3::new(polygon.plane[0], polygon.plane[1], polygon.plane[2]);
        let base = mesh.vertices.len() as u32;
        for corner in &corners {
            mesh.vertices.push(*corner);
            mesh.normals.push(normal);
        }
        for j in 1..corners.len() as u32 - 1 {
            mesh.indices.extend_from_slice(&[base, base + j, base + j + 1]);
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::ConvexGeometry;
    use std::sync::Arc;

    #[test]
    fn test_cuboid_triangulation() {
        let hull = ConvexMesh::cuboid(Vec3::new(1.0, 2.0, 3.0));
        let mesh = triangulate_hull(&hull);

        // 6 quads, 4 vertices and 2 triangles each
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.normals.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(&mesh.indices[..6], &[0, 1, 2, 0, 2, 3]);
        assert!(mesh.normals[..4].iter().all(|n| *n == Vec3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn test_triangles_wind_with_face_normal() {
        let hull = ConvexMesh::cuboid(Vec3::new(1.0, 1.0, 1.0));
        let mesh = triangulate_hull(&hull);
        for triangle in mesh.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.vertices[triangle[k] as usize]);
            let winding = (b - a).cross(&(c - a));
            assert!(winding.dot(&mesh.normals[triangle[0] as usize]) > 0.0);
        }
    }

    #[test]
    fn test_primitive_descriptors() {
        let sphere = describe(&Geometry::Sphere { radius: 0.5 });
        assert_eq!(
            sphere,
            CollisionVisual::Primitive {
                primitive: RenderPrimitive::Sphere,
                scale: Vec3::new(0.5, 0.5, 0.5),
            }
        );

        let hull = Geometry::ConvexMesh(ConvexGeometry {
            mesh: Arc::new(ConvexMesh::cuboid(Vec3::new(1.0, 1.0, 1.0))),
            scale: Vec3::new(2.0, 2.0, 2.0),
        });
        match describe(&hull) {
            CollisionVisual::Mesh { mesh, scale } => {
                assert_eq!(scale, Vec3::new(2.0, 2.0, 2.0));
                assert_eq!(mesh.triangle_count(), 12);
            }
            other => panic!("expected a mesh, got {other:?}"),
        }
    }
}

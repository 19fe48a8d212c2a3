//! Wavefront OBJ loader for convex hulls
//!
//! Every `o`/`g` block is one convex part; its polygons become hull faces as
//! written (they are expected to be convex and counter-clockwise). Normals,
//! texture coordinates and materials are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::mesh_cache::MeshLoader;
use super::AssetError;
use crate::foundation::math::Vec3;
use crate::physics::geometry::ConvexMesh;

/// Loader for OBJ hull files
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjHullLoader;

#[derive(Default)]
struct Part {
    faces: Vec<Vec<u32>>,
}

impl ObjHullLoader {
    /// Parse OBJ text into convex parts
    pub fn parse(reader: impl BufRead, source: &str) -> Result<Vec<ConvexMesh>, AssetError> {
        let parse_error = |line: usize, message: &str| AssetError::Parse {
            path: source.to_string(),
            line,
            message: message.to_string(),
        };

        let mut positions: Vec<Vec3> = Vec::new();
        let mut parts: Vec<Part> = vec![Part::default()];

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            let number = number + 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let coords: Vec<f32> = tokens
                        .take(3)
                        .map(str::parse)
                        .collect::<Result<_, _>>()
                        .map_err(|_| parse_error(number, "invalid vertex"))?;
                    if coords.len() != 3 {
                        return Err(parse_error(number, "vertex needs three coordinates"));
                    }
                    positions.push(Vec3::new(coords[0], coords[1], coords[2]));
                }
                Some("o" | "g") => {
                    if parts.last().is_some_and(|p| !p.faces.is_empty()) {
                        parts.push(Part::default());
                    }
                }
                Some("f") => {
                    let mut face = Vec::new();
                    for token in tokens {
                        // v, v/vt, v//vn, v/vt/vn
                        let index: i64 = token
                            .split('/')
                            .next()
                            .and_then(|v| v.parse().ok())
                            .ok_or_else(|| parse_error(number, "invalid face index"))?;
                        let resolved = if index < 0 {
                            positions.len() as i64 + index
                        } else {
                            index - 1
                        };
                        let resolved = u32::try_from(resolved)
                            .map_err(|_| parse_error(number, "face index out of range"))?;
                        face.push(resolved);
                    }
                    if let Some(part) = parts.last_mut() {
                        part.faces.push(face);
                    }
                }
                _ => {}
            }
        }

        let mut hulls = Vec::new();
        for part in parts.into_iter().filter(|p| !p.faces.is_empty()) {
            let mut used: Vec<u32> = part.faces.iter().flatten().copied().collect();
            used.sort_unstable();
            used.dedup();

            // Compact each part to the vertices it references
            let mut vertices = Vec::with_capacity(used.len());
            for &index in &used {
                let vertex = positions
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| parse_error(0, "face references a missing vertex"))?;
                vertices.push(vertex);
            }
            let faces: Vec<Vec<u32>> = part
                .faces
                .iter()
                .map(|face| {
                    face.iter()
                        .filter_map(|i| used.binary_search(i).ok())
                        .filter_map(|i| u32::try_from(i).ok())
                        .collect()
                })
                .collect();
            let hull = ConvexMesh::from_faces(vertices, &faces)
                .ok_or_else(|| parse_error(0, "degenerate hull face"))?;
            hulls.push(hull);
        }
        Ok(hulls)
    }
}

impl MeshLoader for ObjHullLoader {
    fn load_parts(&self, path: &Path) -> Result<Vec<ConvexMesh>, AssetError> {
        let file = File::open(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
            _ => AssetError::Io(error),
        })?;
        Self::parse(BufReader::new(file), &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA: &str = "\
# tetrahedron
o tetra
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
f 1 3 2
f 1 2 4
f 1 4 3
f 2 3 4
";

    #[test]
    fn test_parse_single_part() {
        let hulls = ObjHullLoader::parse(TETRA.as_bytes(), "tetra.obj").unwrap();
        assert_eq!(hulls.len(), 1);
        assert_eq!(hulls[0].vertices().len(), 4);
        assert_eq!(hulls[0].polygons().len(), 4);
        assert_eq!(hulls[0].polygons()[0].plane[2], -1.0);
    }

    #[test]
    fn test_parse_multiple_parts() {
        let text = format!("{TETRA}o second\nv 5 0 0\nv 6 0 0\nv 5 1 0\nv 5 0 1\nf 5/1 7/1 6/1\nf 5//1 6//1 8//1\nf -4 -1 -2\nf 6 7 8\n");
        let hulls = ObjHullLoader::parse(text.as_bytes(), "two.obj").unwrap();
        assert_eq!(hulls.len(), 2);
        assert_eq!(hulls[1].vertices()[0], Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(hulls[1].indices().len(), 12);
    }

    #[test]
    fn test_parse_rejects_bad_vertex() {
        let result = ObjHullLoader::parse("v 1 two 3\n".as_bytes(), "bad.obj");
        assert!(matches!(result, Err(AssetError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = ObjHullLoader.load_parts(Path::new("/nonexistent/hull.obj"));
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}

//! Binary STL writer

use std::io::Write;

use glam::DVec3;

use super::{ExportError, SolidMesh};

/// Write all meshes as one binary STL triangle list
pub fn write_stl(meshes: &[SolidMesh], out: &mut impl Write) -> Result<(), ExportError> {
    let triangles: Vec<stl_io::Triangle> = meshes
        .iter()
        .flat_map(|m| m.mesh.triangles())
        .map(|[v0, v1, v2]| stl_io::Triangle {
            normal: stl_io::Normal::new(face_normal(v0, v1, v2)),
            vertices: [
                stl_io::Vertex::new(v0.as_vec3().to_array()),
                stl_io::Vertex::new(v1.as_vec3().to_array()),
                stl_io::Vertex::new(v2.as_vec3().to_array()),
            ],
        })
        .collect();
    if triangles.is_empty() {
        return Err(ExportError::Empty("no triangles to write".into()));
    }
    stl_io::write_stl(out, triangles.iter()).map_err(|e| ExportError::Stl(e.to_string()))
}

/// Unit normal from the winding, +Z for degenerate triangles
fn face_normal(v0: DVec3, v1: DVec3, v2: DVec3) -> [f32; 3] {
    let n = (v1 - v0).cross(v2 - v0);
    if n.length_squared() > 0.0 {
        n.normalize().as_vec3().to_array()
    } else {
        [0.0, 0.0, 1.0]
    }
}

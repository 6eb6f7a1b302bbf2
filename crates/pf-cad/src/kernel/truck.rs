//! Truck CAD Kernel Backend
//!
//! Pure Rust B-Rep kernel using the Truck library.
//!
//! Note: Truck has no fillet operator. Models that round edges need the
//! OpenCASCADE backend.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::panic::{self, AssertUnwindSafe};

use glam::DVec3;
use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use truck_meshalgo::prelude::*;
use truck_modeling::{
    BoundedCurve, Curve, ParametricCurve, Point3, Rad, Solid as TruckSolid, Vector3, Vertex,
    Wire, builder,
};
use truck_topology::shell::ShellCondition;

use super::{
    Axis3D, BooleanType, CadError, CadKernel, CadResult, CurveKind, EdgeId, EdgeInfo,
    Profile, ProfileSegment, Solid, SolidProperties, TessellatedMesh, validate_cone,
};

/// Tolerance passed to truck-shapeops boolean operations
const BOOLEAN_TOLERANCE: f64 = 0.05;

/// Coarsest tessellation tolerance used for volume and bounding box queries
const PROPERTY_TOLERANCE: f64 = 0.05;

/// Property tolerance relative to the bounding box diagonal
const PROPERTY_RELATIVE_TOLERANCE: f64 = 1e-3;

/// Samples per edge when measuring curves
const EDGE_SAMPLES: usize = 16;

fn point(p: DVec3) -> Point3 {
    Point3::new(p.x, p.y, p.z)
}

fn vector(v: DVec3) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

fn dvec(p: Point3) -> DVec3 {
    DVec3::new(p.x, p.y, p.z)
}

/// Run a truck operation, turning a panic inside truck into an error message
fn guarded<T>(operation: &str, f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(operation, %reason, "truck panicked");
        format!("truck panicked during {}: {}", operation, reason)
    })
}

/// Truck-based CAD kernel
pub struct TruckKernel {
    /// Storage for solid data (keyed by UUID)
    solids: Mutex<HashMap<Uuid, TruckSolid>>,
}

impl TruckKernel {
    /// Create a new Truck kernel
    pub fn new() -> Self {
        Self {
            solids: Mutex::new(HashMap::new()),
        }
    }

    /// Store a solid and return a Solid reference
    fn store_solid(&self, solid: TruckSolid) -> Solid {
        let id = Uuid::new_v4();
        self.solids.lock().insert(id, solid);
        Solid::new(id)
    }

    /// Get a copy of a stored solid by ID
    fn get_solid(&self, id: Uuid) -> CadResult<TruckSolid> {
        self.solids
            .lock()
            .get(&id)
            .cloned()
            .ok_or(CadError::SolidNotFound(id))
    }

    /// Build a closed wire from a profile, oriented so its plane normal
    /// points along `direction`
    fn create_wire(&self, profile: &Profile, direction: DVec3) -> Wire {
        let mut edges: Vec<(DVec3, Option<DVec3>, DVec3)> = profile
            .closed_segments()
            .into_iter()
            .map(|(from, segment)| match segment {
                ProfileSegment::Line { to } => (from, None, to),
                ProfileSegment::Arc { through, to } => (from, Some(through), to),
            })
            .collect();
        if profile.normal().dot(direction) < 0.0 {
            edges = edges
                .into_iter()
                .rev()
                .map(|(from, through, to)| (to, through, from))
                .collect();
        }

        let vertices: Vec<Vertex> = edges
            .iter()
            .map(|(from, _, _)| builder::vertex(point(*from)))
            .collect();
        let n = vertices.len();
        edges
            .iter()
            .enumerate()
            .map(|(i, (_, through, _))| {
                let (v0, v1) = (&vertices[i], &vertices[(i + 1) % n]);
                match through {
                    Some(through) => builder::circle_arc(v0, v1, point(*through)),
                    None => builder::line(v0, v1),
                }
            })
            .collect()
    }

    fn mesh(&self, solid: &TruckSolid, tolerance: f64) -> CadResult<TessellatedMesh> {
        let meshed = guarded("triangulation", || solid.triangulation(tolerance))
            .map_err(CadError::TessellationFailed)?;
        let mut result = TessellatedMesh::new();

        for shell in meshed.boundaries().iter() {
            for face in shell.face_iter() {
                let Some(face_mesh) = face.surface() else {
                    continue;
                };
                // Inverted faces carry the surface mesh of the opposite side
                let face_mesh = if !face.orientation() {
                    let mut m = face_mesh;
                    m.invert();
                    m
                } else {
                    face_mesh
                };

                let base = result.vertices.len() as u32;
                result.vertices.extend(
                    face_mesh
                        .positions()
                        .iter()
                        .map(|p| [p.x as f32, p.y as f32, p.z as f32]),
                );
                for tri in face_mesh.faces().triangle_iter() {
                    result
                        .indices
                        .extend(tri.iter().map(|v| v.pos as u32 + base));
                }
            }
        }

        result.compute_normals();
        Ok(result)
    }

    /// Mesh fine enough that volume and extents are within a small fraction
    /// of the solid's size
    fn measured_mesh(&self, solid: &TruckSolid) -> CadResult<TessellatedMesh> {
        let coarse = self.mesh(solid, PROPERTY_TOLERANCE)?;
        let Some(bbox) = coarse.bounds() else {
            return Ok(coarse);
        };
        let tolerance = bbox.size().length() * PROPERTY_RELATIVE_TOLERANCE;
        if tolerance >= PROPERTY_TOLERANCE {
            return Ok(coarse);
        }
        self.mesh(solid, tolerance)
    }
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl CadKernel for TruckKernel {
    fn name(&self) -> &str {
        "truck"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create_box(&self, min: DVec3, size: DVec3) -> CadResult<Solid> {
        if !size.cmpgt(DVec3::ZERO).all() {
            return Err(CadError::InvalidPrimitive(format!(
                "box size must be positive, got {:?}",
                size
            )));
        }

        let vertex = builder::vertex(point(min));
        let edge = builder::tsweep(&vertex, Vector3::new(size.x, 0.0, 0.0));
        let face = builder::tsweep(&edge, Vector3::new(0.0, size.y, 0.0));
        let solid = builder::tsweep(&face, Vector3::new(0.0, 0.0, size.z));

        Ok(self.store_solid(solid))
    }

    fn create_cylinder(&self, axis: &Axis3D, radius: f64, height: f64) -> CadResult<Solid> {
        if radius <= 0.0 || height <= 0.0 {
            return Err(CadError::InvalidPrimitive(format!(
                "cylinder needs positive radius and height, got r={} h={}",
                radius, height
            )));
        }

        let vertex = builder::vertex(point(axis.origin + axis.perpendicular() * radius));
        let circle = builder::rsweep(
            &vertex,
            point(axis.origin),
            vector(axis.direction),
            Rad(TAU),
        );
        let face = builder::try_attach_plane(&[circle])
            .map_err(|e| CadError::OperationFailed(format!("Failed to create face: {:?}", e)))?;
        let solid = builder::tsweep(&face, vector(axis.direction * height));

        Ok(self.store_solid(solid))
    }

    fn create_torus(
        &self,
        axis: &Axis3D,
        major_radius: f64,
        minor_radius: f64,
    ) -> CadResult<Solid> {
        if major_radius <= 0.0 || minor_radius <= 0.0 {
            return Err(CadError::InvalidPrimitive(format!(
                "torus needs positive radii, got R={} r={}",
                major_radius, minor_radius
            )));
        }

        // Tube cross-section lies in the plane spanned by the axis and `u`
        let u = axis.perpendicular();
        let tube_center = axis.origin + u * major_radius;
        let vertex = builder::vertex(point(tube_center + u * minor_radius));
        let section = builder::rsweep(
            &vertex,
            point(tube_center),
            vector(axis.direction.cross(u)),
            Rad(TAU),
        );
        let face = builder::try_attach_plane(&[section])
            .map_err(|e| CadError::OperationFailed(format!("Failed to create face: {:?}", e)))?;
        let solid = builder::rsweep(
            &face,
            point(axis.origin),
            vector(axis.direction),
            Rad(TAU),
        );

        Ok(self.store_solid(solid))
    }

    fn create_cone(
        &self,
        axis: &Axis3D,
        base_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> CadResult<Solid> {
        validate_cone(base_radius, top_radius, height)?;

        // Section runs from the top of the axis out to the rim and back down
        let u = axis.perpendicular();
        let base = axis.origin;
        let top = base + axis.direction * height;
        let mut points = vec![top];
        if top_radius > 0.0 {
            points.push(top + u * top_radius);
        }
        if base_radius > 0.0 {
            points.push(base + u * base_radius);
        }
        points.push(base);
        let vertices: Vec<Vertex> = points.into_iter().map(|p| builder::vertex(point(p))).collect();
        let wire: Wire = vertices
            .windows(2)
            .map(|pair| builder::line(&pair[0], &pair[1]))
            .collect::<Vec<_>>()
            .into();
        let shell = guarded("cone", || builder::cone(&wire, vector(axis.direction), Rad(TAU)))
            .map_err(CadError::OperationFailed)?;

        Ok(self.store_solid(TruckSolid::new(vec![shell])))
    }

    fn extrude(&self, profile: &Profile, direction: DVec3) -> CadResult<Solid> {
        profile.validate()?;
        if direction.dot(profile.normal()).abs() <= 1e-9 {
            return Err(CadError::InvalidProfile(
                "extrusion direction lies in the profile plane".into(),
            ));
        }

        let wire = self.create_wire(profile, direction);
        let face = builder::try_attach_plane(&[wire])
            .map_err(|e| CadError::InvalidProfile(format!("Failed to create face: {:?}", e)))?;
        let solid = builder::tsweep(&face, vector(direction));

        Ok(self.store_solid(solid))
    }

    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> CadResult<Solid> {
        let solid_a = self.get_solid(a.id)?;
        let mut solid_b = self.get_solid(b.id)?;

        if op == BooleanType::Subtract {
            // A - B = A ∩ ¬B
            solid_b.not();
        }
        let result = guarded(&format!("{:?}", op), || match op {
            BooleanType::Union => truck_shapeops::or(&solid_a, &solid_b, BOOLEAN_TOLERANCE),
            BooleanType::Subtract | BooleanType::Intersect => {
                truck_shapeops::and(&solid_a, &solid_b, BOOLEAN_TOLERANCE)
            }
        })
        .map_err(CadError::BooleanFailed)?
        .ok_or_else(|| {
            CadError::BooleanFailed(format!("truck-shapeops returned no result for {:?}", op))
        })?;

        Ok(self.store_solid(result))
    }

    fn fillet(&self, _solid: &Solid, _edges: &[EdgeId], _radius: f64) -> CadResult<Solid> {
        Err(CadError::NotSupported {
            kernel: "truck",
            operation: "fillet",
        })
    }

    fn get_edges(&self, solid: &Solid) -> CadResult<Vec<EdgeInfo>> {
        let truck_solid = self.get_solid(solid.id)?;

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for shell in truck_solid.boundaries().iter() {
            for edge in shell.edge_iter() {
                if !seen.insert(edge.id()) {
                    continue;
                }
                let curve = edge.oriented_curve();
                let (t0, t1) = curve.range_tuple();
                let samples: Vec<DVec3> = (0..=EDGE_SAMPLES)
                    .map(|i| {
                        let t = t0 + (t1 - t0) * i as f64 / EDGE_SAMPLES as f64;
                        dvec(curve.subs(t))
                    })
                    .collect();
                let kind = match curve {
                    Curve::Line(_) => CurveKind::Line,
                    _ => CurveKind::classify(
                        samples[0],
                        samples[EDGE_SAMPLES / 2],
                        samples[EDGE_SAMPLES],
                    ),
                };
                let id = EdgeId::new(solid.id, edges.len() as u32);
                if let Some(info) = EdgeInfo::from_samples(id, kind, &samples) {
                    edges.push(info);
                }
            }
        }

        Ok(edges)
    }

    fn tessellate(&self, solid: &Solid, tolerance: f64) -> CadResult<TessellatedMesh> {
        let truck_solid = self.get_solid(solid.id)?;
        let mesh = self.mesh(&truck_solid, tolerance)?;
        if mesh.is_empty() {
            return Err(CadError::TessellationFailed(
                "triangulation produced no triangles".into(),
            ));
        }
        Ok(mesh)
    }

    fn properties(&self, solid: &Solid) -> CadResult<SolidProperties> {
        let truck_solid = self.get_solid(solid.id)?;
        let mesh = self.measured_mesh(&truck_solid)?;
        let bbox = mesh
            .bounds()
            .ok_or_else(|| CadError::TessellationFailed("solid has no surface".into()))?;

        let mut vertices = HashSet::new();
        let mut edges = HashSet::new();
        let mut face_count = 0;
        for shell in truck_solid.boundaries().iter() {
            vertices.extend(shell.vertex_iter().map(|v| v.id()));
            edges.extend(shell.edge_iter().map(|e| e.id()));
            face_count += shell.face_iter().count();
        }

        Ok(SolidProperties {
            bbox,
            volume: mesh.signed_volume(),
            vertex_count: vertices.len(),
            edge_count: edges.len(),
            face_count,
            shell_count: truck_solid.boundaries().len(),
        })
    }

    fn check(&self, solid: &Solid) -> CadResult<()> {
        let truck_solid = self.get_solid(solid.id)?;
        for (i, shell) in truck_solid.boundaries().iter().enumerate() {
            if shell.shell_condition() != ShellCondition::Closed {
                return Err(CadError::InvalidTopology(format!(
                    "shell {} is not closed ({:?})",
                    i,
                    shell.shell_condition()
                )));
            }
        }
        let volume = self.mesh(&truck_solid, PROPERTY_TOLERANCE)?.signed_volume();
        if !(volume.is_finite() && volume > 0.0) {
            return Err(CadError::InvalidTopology(format!(
                "solid encloses no volume ({})",
                volume
            )));
        }
        Ok(())
    }
}

//! OpenCASCADE CAD Kernel Backend
//!
//! Provides bindings to the OpenCASCADE geometry kernel via opencascade-sys.
//! Profile arcs and torus cross-sections are approximated by polylines.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;

use glam::DVec3;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    Aabb, Axis3D, BooleanType, CadError, CadKernel, CadResult, CurveKind, EdgeId, EdgeInfo,
    GEOMETRY_EPSILON, Profile, Solid, SolidProperties, TessellatedMesh, validate_cone,
};

// Re-export OpenCASCADE types
use opencascade_sys::ffi;

/// Chords per profile arc
const ARC_STEPS: usize = 16;

/// Polygon sides of a torus cross-section
const TORUS_SECTION_SIDES: usize = 48;

/// Tessellation tolerance used for volume and bounding box queries
const PROPERTY_TOLERANCE: f64 = 0.05;

/// OpenCASCADE-based CAD kernel
pub struct OpenCascadeKernel {
    /// Storage for solid data (keyed by UUID)
    solids: Mutex<HashMap<Uuid, OccSolid>>,
}

/// Wrapper for OpenCASCADE solid
struct OccSolid {
    shape: cxx::UniquePtr<ffi::TopoDS_Shape>,
}

impl Clone for OccSolid {
    fn clone(&self) -> Self {
        Self {
            shape: ffi::BRepBuilderAPI_Copy_ctor(&self.shape).Shape(),
        }
    }
}

fn gp_point(p: DVec3) -> cxx::UniquePtr<ffi::gp_Pnt> {
    ffi::new_gp_Pnt(p.x, p.y, p.z)
}

fn gp_dir(d: DVec3) -> cxx::UniquePtr<ffi::gp_Dir> {
    ffi::new_gp_Dir(d.x, d.y, d.z)
}

fn from_gp(p: &ffi::gp_Pnt) -> DVec3 {
    DVec3::new(ffi::gp_Pnt_X(p), ffi::gp_Pnt_Y(p), ffi::gp_Pnt_Z(p))
}

impl OpenCascadeKernel {
    /// Create a new OpenCASCADE kernel
    pub fn new() -> Self {
        Self {
            solids: Mutex::new(HashMap::new()),
        }
    }

    /// Store a solid and return a Solid reference
    fn store_solid(&self, shape: cxx::UniquePtr<ffi::TopoDS_Shape>) -> CadResult<Solid> {
        if shape.is_null() {
            return Err(CadError::OperationFailed(
                "OpenCASCADE returned a null shape".into(),
            ));
        }
        let id = Uuid::new_v4();
        self.solids.lock().insert(id, OccSolid { shape });
        Ok(Solid::new(id))
    }

    /// Get a copy of a stored solid by ID
    fn get_solid(&self, id: Uuid) -> CadResult<OccSolid> {
        self.solids
            .lock()
            .get(&id)
            .cloned()
            .ok_or(CadError::SolidNotFound(id))
    }

    /// Build a closed polygonal wire through the given points
    fn polygon_wire(&self, points: &[DVec3]) -> cxx::UniquePtr<ffi::TopoDS_Wire> {
        let mut wire_builder = ffi::BRepBuilderAPI_MakeWire_ctor();
        let points: Vec<_> = points.iter().map(|p| gp_point(*p)).collect();

        for i in 0..points.len() {
            let p1 = &points[i];
            let p2 = &points[(i + 1) % points.len()];

            let edge = ffi::BRepBuilderAPI_MakeEdge_gp_Pnt_gp_Pnt(p1, p2);
            ffi::BRepBuilderAPI_MakeWire_Add_edge(&mut wire_builder, &edge.Edge());
        }

        wire_builder.Wire()
    }

    fn mesh(&self, occ_solid: &OccSolid, tolerance: f64) -> TessellatedMesh {
        let _mesh_builder =
            ffi::BRepMesh_IncrementalMesh_ctor(&occ_solid.shape, tolerance, false, 0.5, true);

        let mut result = TessellatedMesh::new();

        // Extract triangulation from each face
        let mut explorer =
            ffi::TopExp_Explorer_ctor(&occ_solid.shape, ffi::TopAbs_ShapeEnum::TopAbs_FACE);

        while ffi::TopExp_Explorer_More(&explorer) {
            let face_shape = ffi::TopExp_Explorer_Current(&explorer);
            let face = ffi::TopoDS_cast_to_face(&face_shape);

            let location = ffi::TopLoc_Location_ctor();
            let triangulation = ffi::BRep_Tool_Triangulation(&face, &location);

            if !triangulation.is_null() {
                let nb_nodes = ffi::Poly_Triangulation_NbNodes(&triangulation);
                let nb_triangles = ffi::Poly_Triangulation_NbTriangles(&triangulation);
                let reversed = ffi::TopoDS_Shape_Orientation(&face_shape)
                    == ffi::TopAbs_Orientation::TopAbs_REVERSED;

                let vertex_offset = result.vertices.len() as u32;

                for i in 1..=nb_nodes {
                    let node = ffi::Poly_Triangulation_Node(&triangulation, i);
                    let transformed = ffi::gp_Pnt_Transformed(
                        &node,
                        &ffi::TopLoc_Location_Transformation(&location),
                    );
                    let p = from_gp(&transformed);
                    result.vertices.push([p.x as f32, p.y as f32, p.z as f32]);
                }

                for i in 1..=nb_triangles {
                    let triangle = ffi::Poly_Triangulation_Triangle(&triangulation, i);
                    let (n1, n2, n3) = (
                        ffi::Poly_Triangle_Value(&triangle, 1) as u32 - 1 + vertex_offset,
                        ffi::Poly_Triangle_Value(&triangle, 2) as u32 - 1 + vertex_offset,
                        ffi::Poly_Triangle_Value(&triangle, 3) as u32 - 1 + vertex_offset,
                    );
                    if reversed {
                        result.indices.extend([n1, n3, n2]);
                    } else {
                        result.indices.extend([n1, n2, n3]);
                    }
                }
            }

            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        result.compute_normals();
        result
    }

    /// Every edge visit of the topology explorer, indexed in visit order
    fn explore_edges(&self, solid: &Solid, occ_solid: &OccSolid) -> Vec<EdgeInfo> {
        let mut edges = Vec::new();
        let mut index = 0u32;

        let mut explorer =
            ffi::TopExp_Explorer_ctor(&occ_solid.shape, ffi::TopAbs_ShapeEnum::TopAbs_EDGE);

        while ffi::TopExp_Explorer_More(&explorer) {
            let edge_shape = ffi::TopExp_Explorer_Current(&explorer);
            let edge = ffi::TopoDS_cast_to_edge(&edge_shape);

            let mut first = 0.0f64;
            let mut last = 0.0f64;
            let curve = ffi::BRep_Tool_Curve(&edge, &mut first, &mut last);

            if !curve.is_null() {
                let samples: Vec<DVec3> = (0..=ARC_STEPS)
                    .map(|i| {
                        let t = first + (last - first) * i as f64 / ARC_STEPS as f64;
                        from_gp(&ffi::Geom_Curve_Value(&curve, t))
                    })
                    .collect();
                let kind = CurveKind::classify(
                    samples[0],
                    samples[ARC_STEPS / 2],
                    samples[ARC_STEPS],
                );
                if let Some(info) =
                    EdgeInfo::from_samples(EdgeId::new(solid.id, index), kind, &samples)
                {
                    edges.push(info);
                }
            }

            index += 1;
            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        edges
    }
}

impl Default for OpenCascadeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl CadKernel for OpenCascadeKernel {
    fn name(&self) -> &str {
        "opencascade"
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

        let p1 = gp_point(min);
        let p2 = gp_point(min + size);

        let box_maker = ffi::BRepPrimAPI_MakeBox_ctor(&p1, &p2);
        self.store_solid(box_maker.Shape())
    }

    fn create_cylinder(&self, axis: &Axis3D, radius: f64, height: f64) -> CadResult<Solid> {
        if radius <= 0.0 || height <= 0.0 {
            return Err(CadError::InvalidPrimitive(format!(
                "cylinder needs positive radius and height, got r={} h={}",
                radius, height
            )));
        }

        let ax2 = ffi::new_gp_Ax2(&gp_point(axis.origin), &gp_dir(axis.direction));
        let cylinder = ffi::BRepPrimAPI_MakeCylinder_ctor(&ax2, radius, height);
        self.store_solid(cylinder.Shape())
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

        let u = axis.perpendicular();
        let tube_center = axis.origin + u * major_radius;
        let section: Vec<DVec3> = (0..TORUS_SECTION_SIDES)
            .map(|i| {
                let a = TAU * i as f64 / TORUS_SECTION_SIDES as f64;
                tube_center + (u * a.cos() + axis.direction * a.sin()) * minor_radius
            })
            .collect();
        let wire = self.polygon_wire(&section);
        let face = ffi::BRepBuilderAPI_MakeFace_wire(&wire, true);

        let gp_axis = ffi::new_gp_Ax1(&gp_point(axis.origin), &gp_dir(axis.direction));
        let revol = ffi::BRepPrimAPI_MakeRevol_ctor(&face.Face().as_shape(), &gp_axis, TAU, true);
        self.store_solid(revol.Shape())
    }

    fn create_cone(
        &self,
        axis: &Axis3D,
        base_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> CadResult<Solid> {
        validate_cone(base_radius, top_radius, height)?;

        let u = axis.perpendicular();
        let top = axis.origin + axis.direction * height;
        let mut section = vec![axis.origin, top];
        if top_radius > 0.0 {
            section.push(top + u * top_radius);
        }
        if base_radius > 0.0 {
            section.push(axis.origin + u * base_radius);
        }
        let wire = self.polygon_wire(&section);
        let face = ffi::BRepBuilderAPI_MakeFace_wire(&wire, true);

        let gp_axis = ffi::new_gp_Ax1(&gp_point(axis.origin), &gp_dir(axis.direction));
        let revol = ffi::BRepPrimAPI_MakeRevol_ctor(&face.Face().as_shape(), &gp_axis, TAU, true);
        self.store_solid(revol.Shape())
    }

    fn extrude(&self, profile: &Profile, direction: DVec3) -> CadResult<Solid> {
        profile.validate()?;
        if direction.dot(profile.normal()).abs() <= 1e-9 {
            return Err(CadError::InvalidProfile(
                "extrusion direction lies in the profile plane".into(),
            ));
        }

        let wire = self.polygon_wire(&profile.flattened(ARC_STEPS));
        let face = ffi::BRepBuilderAPI_MakeFace_wire(&wire, true);
        let dir = ffi::new_gp_Vec(direction.x, direction.y, direction.z);

        let prism = ffi::BRepPrimAPI_MakePrism_ctor(&face.Face().as_shape(), &dir, false, true);
        self.store_solid(prism.Shape())
    }

    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> CadResult<Solid> {
        let solid_a = self.get_solid(a.id)?;
        let solid_b = self.get_solid(b.id)?;

        let result = match op {
            BooleanType::Union => ffi::BRepAlgoAPI_Fuse_ctor(&solid_a.shape, &solid_b.shape).Shape(),
            BooleanType::Subtract => {
                ffi::BRepAlgoAPI_Cut_ctor(&solid_a.shape, &solid_b.shape).Shape()
            }
            BooleanType::Intersect => {
                ffi::BRepAlgoAPI_Common_ctor(&solid_a.shape, &solid_b.shape).Shape()
            }
        };

        self.store_solid(result)
            .map_err(|_| CadError::BooleanFailed(format!("{:?} produced no shape", op)))
    }

    fn fillet(&self, solid: &Solid, edges: &[EdgeId], radius: f64) -> CadResult<Solid> {
        let occ_solid = self.get_solid(solid.id)?;

        if radius <= 0.0 {
            return Err(CadError::FilletFailed(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        if edges.is_empty() {
            return Err(CadError::FilletFailed("No edges specified".into()));
        }
        if let Some(stale) = edges.iter().find(|e| e.solid_id != solid.id) {
            return Err(CadError::StaleEdge {
                solid_id: solid.id,
                index: stale.index,
            });
        }

        let mut fillet = ffi::BRepFilletAPI_MakeFillet_ctor(&occ_solid.shape);

        // Find and add edges by explorer index
        let mut edge_index = 0u32;
        let mut added = 0usize;
        let mut explorer =
            ffi::TopExp_Explorer_ctor(&occ_solid.shape, ffi::TopAbs_ShapeEnum::TopAbs_EDGE);

        while ffi::TopExp_Explorer_More(&explorer) {
            if edges.iter().any(|e| e.index == edge_index) {
                let edge_shape = ffi::TopExp_Explorer_Current(&explorer);
                let edge = ffi::TopoDS_cast_to_edge(&edge_shape);
                ffi::BRepFilletAPI_MakeFillet_Add(&mut fillet, radius, &edge);
                added += 1;
            }

            edge_index += 1;
            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        if added == 0 {
            let index = edges.first().map(|e| e.index).unwrap_or_default();
            return Err(CadError::StaleEdge {
                solid_id: solid.id,
                index,
            });
        }

        ffi::BRepFilletAPI_MakeFillet_Build(&mut fillet);

        let result = ffi::BRepFilletAPI_MakeFillet_Shape(&fillet);
        self.store_solid(result)
            .map_err(|_| CadError::FilletFailed(format!("rounding {} edges failed", added)))
    }

    fn get_edges(&self, solid: &Solid) -> CadResult<Vec<EdgeInfo>> {
        let occ_solid = self.get_solid(solid.id)?;
        let edges = self.explore_edges(solid, &occ_solid);
        // The explorer visits shared edges once per adjacent face
        let (keep, _) = distinct_edges(&edges);
        Ok(keep.into_iter().map(|i| edges[i].clone()).collect())
    }

    fn tessellate(&self, solid: &Solid, tolerance: f64) -> CadResult<TessellatedMesh> {
        let occ_solid = self.get_solid(solid.id)?;
        let mesh = self.mesh(&occ_solid, tolerance);
        if mesh.is_empty() {
            return Err(CadError::TessellationFailed(
                "no face carries a triangulation".into(),
            ));
        }
        Ok(mesh)
    }

    fn properties(&self, solid: &Solid) -> CadResult<SolidProperties> {
        let occ_solid = self.get_solid(solid.id)?;
        let mesh = self.mesh(&occ_solid, PROPERTY_TOLERANCE);
        let bbox: Aabb = mesh
            .bounds()
            .ok_or_else(|| CadError::TessellationFailed("solid has no surface".into()))?;

        let edges = self.explore_edges(solid, &occ_solid);
        let (keep, vertex_count) = distinct_edges(&edges);

        let mut face_count = 0;
        let mut explorer =
            ffi::TopExp_Explorer_ctor(&occ_solid.shape, ffi::TopAbs_ShapeEnum::TopAbs_FACE);
        while ffi::TopExp_Explorer_More(&explorer) {
            face_count += 1;
            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        let mut shell_count = 0;
        let mut explorer =
            ffi::TopExp_Explorer_ctor(&occ_solid.shape, ffi::TopAbs_ShapeEnum::TopAbs_SHELL);
        while ffi::TopExp_Explorer_More(&explorer) {
            shell_count += 1;
            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        Ok(SolidProperties {
            bbox,
            volume: mesh.signed_volume(),
            vertex_count,
            edge_count: keep.len(),
            face_count,
            shell_count,
        })
    }

    fn check(&self, solid: &Solid) -> CadResult<()> {
        let occ_solid = self.get_solid(solid.id)?;
        let mesh = self.mesh(&occ_solid, PROPERTY_TOLERANCE);
        if !mesh.is_closed() {
            return Err(CadError::InvalidTopology(
                "surface mesh has open or non-manifold edges".into(),
            ));
        }
        let volume = mesh.signed_volume();
        if !(volume.is_finite() && volume > GEOMETRY_EPSILON) {
            return Err(CadError::InvalidTopology(format!(
                "solid encloses no volume ({})",
                volume
            )));
        }
        Ok(())
    }
}

/// Count distinct edges and their endpoints, merging coincident geometry
///
/// The topology explorer visits shared edges once per adjacent face.
fn distinct_edges(edges: &[EdgeInfo]) -> (Vec<usize>, usize) {
    let key = |p: DVec3| {
        let q = (p * 1e4).round();
        (q.x as i64, q.y as i64, q.z as i64)
    };
    let mut seen_edges = HashSet::new();
    let mut seen_vertices = HashSet::new();
    let mut keep = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        let (a, b) = (key(edge.start), key(edge.end));
        let ends = if a <= b { (a, b) } else { (b, a) };
        if seen_edges.insert((ends, key(edge.midpoint))) {
            keep.push(i);
            seen_vertices.insert(a);
            seen_vertices.insert(b);
        }
    }
    (keep, seen_vertices.len())
}

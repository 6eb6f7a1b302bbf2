//! Mock CAD Kernel
//!
//! Deterministic test double that approximates every solid by a set of
//! axis-aligned lumps. Volumes are exact for boxes and primitives and
//! bounding-box approximations after booleans, estimated from the
//! primitive boxes each solid was built from. Edges are tracked explicitly
//! so edge selection and the fillet rules can be exercised without a B-Rep
//! library:
//!
//! - fusing operands that only share a boundary fails
//! - only straight, not yet rounded edges can be filleted
//! - edge ids are only valid for the solid they were queried from

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use glam::DVec3;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    Aabb, Axis3D, BooleanType, CadError, CadKernel, CadResult, CurveKind, EdgeId, EdgeInfo,
    GEOMETRY_EPSILON, Profile, ProfileSegment, Solid, SolidProperties, TessellatedMesh, arc_points,
    validate_cone,
};

#[derive(Debug, Clone)]
struct MockEdge {
    kind: CurveKind,
    start: DVec3,
    end: DVec3,
    midpoint: DVec3,
    length: f64,
    rounded: bool,
}

impl MockEdge {
    fn line(start: DVec3, end: DVec3) -> Self {
        Self {
            kind: CurveKind::Line,
            start,
            end,
            midpoint: (start + end) * 0.5,
            length: (end - start).length(),
            rounded: false,
        }
    }

    fn curve(kind: CurveKind, start: DVec3, midpoint: DVec3, end: DVec3, length: f64) -> Self {
        Self {
            kind,
            start,
            end,
            midpoint,
            length,
            rounded: false,
        }
    }

    fn translated(&self, offset: DVec3) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            midpoint: self.midpoint + offset,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
struct MockSolid {
    lumps: Vec<Aabb>,
    /// Unmerged primitive boxes, for overlap volume estimates
    pieces: Vec<Aabb>,
    volume: f64,
    edges: Vec<MockEdge>,
    face_count: usize,
    vertex_count: usize,
}

impl MockSolid {
    fn bbox(&self) -> Aabb {
        self.lumps
            .iter()
            .skip(1)
            .fold(self.lumps[0], |acc, lump| acc.union(lump))
    }

    fn overlap_with(&self, other: &MockSolid) -> f64 {
        self.lumps
            .iter()
            .flat_map(|a| other.lumps.iter().map(move |b| a.overlap_volume(b)))
            .sum()
    }

    /// Overlap volume estimated from the primitive boxes
    fn shared_volume(&self, other: &MockSolid) -> f64 {
        self.pieces
            .iter()
            .flat_map(|a| other.pieces.iter().map(move |b| a.overlap_volume(b)))
            .sum()
    }

    fn touches(&self, other: &MockSolid) -> bool {
        self.lumps
            .iter()
            .any(|a| other.lumps.iter().any(|b| a.touches(b)))
    }

    fn contains(&self, p: DVec3) -> bool {
        self.lumps.iter().any(|lump| lump.contains(p))
    }
}

/// Merge lumps that overlap or touch until all remaining lumps are apart
fn merge_lumps(mut lumps: Vec<Aabb>) -> Vec<Aabb> {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..lumps.len() {
            for j in (i + 1)..lumps.len() {
                if lumps[i].touches(&lumps[j]) {
                    let other = lumps.swap_remove(j);
                    lumps[i] = lumps[i].union(&other);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
    lumps
}

/// Deterministic bounding-box kernel for tests
pub struct MockKernel {
    solids: Mutex<HashMap<Uuid, MockSolid>>,
}

impl MockKernel {
    /// Create a new mock kernel
    pub fn new() -> Self {
        Self {
            solids: Mutex::new(HashMap::new()),
        }
    }

    /// Number of solids created so far (inputs are never replaced)
    pub fn solid_count(&self) -> usize {
        self.solids.lock().len()
    }

    fn store_solid(&self, solid: MockSolid) -> Solid {
        let id = Uuid::new_v4();
        self.solids.lock().insert(id, solid);
        Solid::new(id)
    }

    fn get_solid(&self, id: Uuid) -> CadResult<MockSolid> {
        self.solids
            .lock()
            .get(&id)
            .cloned()
            .ok_or(CadError::SolidNotFound(id))
    }

    fn union(&self, a: MockSolid, b: MockSolid) -> CadResult<MockSolid> {
        let overlap = a.overlap_with(&b);
        if overlap <= 0.0 && a.touches(&b) {
            return Err(CadError::BooleanFailed(
                "operands share only a boundary, the fused result would be non-manifold".into(),
            ));
        }
        let volume = a.volume + b.volume - a.shared_volume(&b).min(a.volume.min(b.volume));
        let mut lumps = a.lumps;
        lumps.extend(b.lumps);
        let mut pieces = a.pieces;
        pieces.extend(b.pieces);
        let mut edges = a.edges;
        edges.extend(b.edges);
        Ok(MockSolid {
            lumps: merge_lumps(lumps),
            pieces,
            volume,
            edges,
            face_count: a.face_count + b.face_count,
            vertex_count: a.vertex_count + b.vertex_count,
        })
    }

    fn subtract(&self, a: MockSolid, b: MockSolid) -> CadResult<MockSolid> {
        if a.overlap_with(&b) <= 0.0 {
            return Ok(a);
        }
        let volume = a.volume - a.shared_volume(&b).min(b.volume);
        if volume <= 1e-9 {
            return Err(CadError::BooleanFailed(
                "subtraction removes the entire solid".into(),
            ));
        }
        // A box tool reaching out of the body leaves the edges of its clipped part
        let tool_edges = match b.lumps.as_slice() {
            [lump] if b.face_count == 6 && (lump.volume() - b.volume).abs() <= GEOMETRY_EPSILON => {
                let bbox = a.bbox();
                box_edges(&Aabb::new(lump.min.max(bbox.min), lump.max.min(bbox.max)))
            }
            _ => b.edges,
        };
        let imprint: Vec<MockEdge> = tool_edges
            .into_iter()
            .filter(|e| a.contains(e.midpoint))
            .collect();
        let imprint_vertices = imprint.len();
        let mut edges = a.edges;
        edges.extend(imprint);
        Ok(MockSolid {
            lumps: a.lumps,
            pieces: a.pieces,
            volume,
            edges,
            face_count: a.face_count + b.face_count,
            vertex_count: a.vertex_count + imprint_vertices,
        })
    }

    fn intersect(&self, a: MockSolid, b: MockSolid) -> CadResult<MockSolid> {
        let lumps: Vec<Aabb> = a
            .lumps
            .iter()
            .flat_map(|la| b.lumps.iter().map(move |lb| (*la, *lb)))
            .filter(|(la, lb)| la.overlap_volume(lb) > 0.0)
            .map(|(la, lb)| Aabb::new(la.min.max(lb.min), la.max.min(lb.max)))
            .collect();
        if lumps.is_empty() {
            return Err(CadError::BooleanFailed("intersection is empty".into()));
        }
        let inside = |e: &MockEdge| lumps.iter().any(|l| l.contains(e.midpoint));
        let edges: Vec<MockEdge> = a
            .edges
            .iter()
            .chain(b.edges.iter())
            .filter(|e| inside(e))
            .cloned()
            .collect();
        let volume = a.overlap_with(&b).min(a.volume).min(b.volume);
        Ok(MockSolid {
            vertex_count: edges.len(),
            face_count: a.face_count.min(b.face_count),
            pieces: lumps.clone(),
            lumps: merge_lumps(lumps),
            volume,
            edges,
        })
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn box_edges(b: &Aabb) -> Vec<MockEdge> {
    let corner = |i: usize| {
        DVec3::new(
            if i & 1 == 0 { b.min.x } else { b.max.x },
            if i & 2 == 0 { b.min.y } else { b.max.y },
            if i & 4 == 0 { b.min.z } else { b.max.z },
        )
    };
    // Pairs of corner indices differing in exactly one bit
    [
        (0, 1), (2, 3), (4, 5), (6, 7),
        (0, 2), (1, 3), (4, 6), (5, 7),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ]
    .into_iter()
    .map(|(i, j)| MockEdge::line(corner(i), corner(j)))
    .collect()
}

fn box_mesh(b: &Aabb, mesh: &mut TessellatedMesh) {
    let offset = mesh.vertices.len() as u32;
    for i in 0..8 {
        let p = DVec3::new(
            if i & 1 == 0 { b.min.x } else { b.max.x },
            if i & 2 == 0 { b.min.y } else { b.max.y },
            if i & 4 == 0 { b.min.z } else { b.max.z },
        );
        mesh.vertices.push([p.x as f32, p.y as f32, p.z as f32]);
    }
    // Outward winding, two triangles per face
    const QUADS: [[u32; 4]; 6] = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    for [a, b, c, d] in QUADS {
        mesh.indices
            .extend([a, b, c, a, c, d].into_iter().map(|i| i + offset));
    }
}

/// Half-extent of a circle of `radius` around `axis`, per world axis
fn disc_extent(axis: DVec3, radius: f64) -> DVec3 {
    let d = axis.normalize();
    DVec3::new(
        (1.0 - d.x * d.x).max(0.0).sqrt(),
        (1.0 - d.y * d.y).max(0.0).sqrt(),
        (1.0 - d.z * d.z).max(0.0).sqrt(),
    ) * radius
}

impl CadKernel for MockKernel {
    fn name(&self) -> &str {
        "mock"
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
        let bbox = Aabb::from_min_size(min, size);
        Ok(self.store_solid(MockSolid {
            lumps: vec![bbox],
            pieces: vec![bbox],
            volume: bbox.volume(),
            edges: box_edges(&bbox),
            face_count: 6,
            vertex_count: 8,
        }))
    }

    fn create_cylinder(&self, axis: &Axis3D, radius: f64, height: f64) -> CadResult<Solid> {
        if radius <= 0.0 || height <= 0.0 {
            return Err(CadError::InvalidPrimitive(format!(
                "cylinder needs positive radius and height, got r={} h={}",
                radius, height
            )));
        }
        let base = axis.origin;
        let top = base + axis.direction * height;
        let extent = disc_extent(axis.direction, radius);
        let bbox = Aabb::new(base - extent, base + extent).union(&Aabb::new(top - extent, top + extent));
        let seam = axis.perpendicular() * radius;
        let circumference = TAU * radius;
        Ok(self.store_solid(MockSolid {
            lumps: vec![bbox],
            pieces: vec![bbox],
            volume: PI * radius * radius * height,
            edges: vec![
                MockEdge::curve(CurveKind::Circle, base + seam, base - seam, base + seam, circumference),
                MockEdge::curve(CurveKind::Circle, top + seam, top - seam, top + seam, circumference),
                MockEdge::line(base + seam, top + seam),
            ],
            face_count: 3,
            vertex_count: 2,
        }))
    }

    fn create_cone(
        &self,
        axis: &Axis3D,
        base_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> CadResult<Solid> {
        validate_cone(base_radius, top_radius, height)?;
        let base = axis.origin;
        let top = base + axis.direction.normalize() * height;
        let base_extent = disc_extent(axis.direction, base_radius);
        let top_extent = disc_extent(axis.direction, top_radius);
        let bbox = Aabb::new(base - base_extent, base + base_extent)
            .union(&Aabb::new(top - top_extent, top + top_extent));
        let side = axis.perpendicular();
        let mut edges = Vec::new();
        for (center, radius) in [(base, base_radius), (top, top_radius)] {
            if radius > 0.0 {
                let seam = center + side * radius;
                edges.push(MockEdge::curve(
                    CurveKind::Circle,
                    seam,
                    center - side * radius,
                    seam,
                    TAU * radius,
                ));
            }
        }
        edges.push(MockEdge::line(base + side * base_radius, top + side * top_radius));
        Ok(self.store_solid(MockSolid {
            lumps: vec![bbox],
            pieces: vec![bbox],
            volume: PI * height / 3.0
                * (base_radius * base_radius + base_radius * top_radius + top_radius * top_radius),
            face_count: edges.len(),
            edges,
            vertex_count: 2,
        }))
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
        let center = axis.origin;
        let extent = disc_extent(axis.direction, major_radius + minor_radius)
            + axis.direction.abs() * minor_radius;
        let seam = axis.perpendicular() * (major_radius + minor_radius);
        Ok(self.store_solid(MockSolid {
            lumps: vec![Aabb::new(center - extent, center + extent)],
            pieces: vec![Aabb::new(center - extent, center + extent)],
            volume: 2.0 * PI * PI * major_radius * minor_radius * minor_radius,
            edges: vec![MockEdge::curve(
                CurveKind::Circle,
                center + seam,
                center - seam,
                center + seam,
                TAU * (major_radius + minor_radius),
            )],
            face_count: 1,
            vertex_count: 1,
        }))
    }

    fn extrude(&self, profile: &Profile, direction: DVec3) -> CadResult<Solid> {
        profile.validate()?;
        let height = direction.dot(profile.normal()).abs();
        if height <= 1e-9 {
            return Err(CadError::InvalidProfile(
                "extrusion direction lies in the profile plane".into(),
            ));
        }

        let mut edges = Vec::new();
        let segments = profile.closed_segments();
        for (from, segment) in &segments {
            let bottom = match *segment {
                ProfileSegment::Line { to } => MockEdge::line(*from, to),
                ProfileSegment::Arc { through, to } => {
                    let mut samples = vec![*from];
                    samples.extend(arc_points(*from, through, to, 16));
                    let length = samples.windows(2).map(|w| (w[1] - w[0]).length()).sum();
                    MockEdge::curve(CurveKind::Arc, *from, samples[samples.len() / 2], to, length)
                }
            };
            edges.push(bottom.translated(direction));
            edges.push(bottom);
            edges.push(MockEdge::line(*from, *from + direction));
        }

        let points = profile.flattened(16);
        let bbox = Aabb::from_points(points.iter().flat_map(|p| [*p, *p + direction]))
            .ok_or_else(|| CadError::InvalidProfile("empty profile".into()))?;

        Ok(self.store_solid(MockSolid {
            lumps: vec![bbox],
            pieces: vec![bbox],
            volume: profile.area() * height,
            edges,
            face_count: segments.len() + 2,
            vertex_count: segments.len() * 2,
        }))
    }

    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> CadResult<Solid> {
        let solid_a = self.get_solid(a.id)?;
        let solid_b = self.get_solid(b.id)?;

        let result = match op {
            BooleanType::Union => self.union(solid_a, solid_b)?,
            BooleanType::Subtract => self.subtract(solid_a, solid_b)?,
            BooleanType::Intersect => self.intersect(solid_a, solid_b)?,
        };
        Ok(self.store_solid(result))
    }

    fn fillet(&self, solid: &Solid, edges: &[EdgeId], radius: f64) -> CadResult<Solid> {
        let source = self.get_solid(solid.id)?;

        if radius <= 0.0 {
            return Err(CadError::FilletFailed(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        if edges.is_empty() {
            return Err(CadError::FilletFailed("No edges specified".into()));
        }

        let mut selected = Vec::with_capacity(edges.len());
        for id in edges {
            if id.solid_id != solid.id || id.index as usize >= source.edges.len() {
                return Err(CadError::StaleEdge {
                    solid_id: solid.id,
                    index: id.index,
                });
            }
            let edge = &source.edges[id.index as usize];
            if edge.rounded {
                return Err(CadError::FilletFailed(format!(
                    "edge {} is already rounded",
                    id.index
                )));
            }
            if edge.kind != CurveKind::Line {
                return Err(CadError::FilletFailed(format!(
                    "edge {} is a {}, only straight edges can be rounded",
                    id.index, edge.kind
                )));
            }
            if edge.length <= GEOMETRY_EPSILON {
                return Err(CadError::FilletFailed(format!(
                    "edge {} is degenerate",
                    id.index
                )));
            }
            if !selected.contains(&(id.index as usize)) {
                selected.push(id.index as usize);
            }
        }

        let mut result = source.clone();
        let mut removed = 0.0;
        result.edges = Vec::with_capacity(source.edges.len() + selected.len());
        for (i, edge) in source.edges.iter().enumerate() {
            if !selected.contains(&i) {
                result.edges.push(edge.clone());
                continue;
            }
            // The sharp edge becomes a rounded face bounded by two tangent arcs
            for _ in 0..2 {
                result.edges.push(MockEdge {
                    kind: CurveKind::Arc,
                    rounded: true,
                    ..edge.clone()
                });
            }
            removed += (1.0 - PI / 4.0) * radius * radius * edge.length;
        }
        result.volume = (source.volume - removed).max(0.0);
        result.face_count += selected.len();
        result.vertex_count += 2 * selected.len();

        Ok(self.store_solid(result))
    }

    fn get_edges(&self, solid: &Solid) -> CadResult<Vec<EdgeInfo>> {
        let source = self.get_solid(solid.id)?;
        Ok(source
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| EdgeInfo {
                id: EdgeId::new(solid.id, i as u32),
                kind: e.kind,
                start: e.start,
                end: e.end,
                midpoint: e.midpoint,
                length: e.length,
            })
            .collect())
    }

    fn tessellate(&self, solid: &Solid, _tolerance: f64) -> CadResult<TessellatedMesh> {
        let source = self.get_solid(solid.id)?;
        let mut mesh = TessellatedMesh::new();
        for lump in &source.lumps {
            box_mesh(lump, &mut mesh);
        }
        mesh.compute_normals();
        Ok(mesh)
    }

    fn properties(&self, solid: &Solid) -> CadResult<SolidProperties> {
        let source = self.get_solid(solid.id)?;
        Ok(SolidProperties {
            bbox: source.bbox(),
            volume: source.volume,
            vertex_count: source.vertex_count,
            edge_count: source.edges.len(),
            face_count: source.face_count,
            shell_count: source.lumps.len(),
        })
    }

    fn check(&self, solid: &Solid) -> CadResult<()> {
        let source = self.get_solid(solid.id)?;
        if !(source.volume.is_finite() && source.volume > 0.0) {
            return Err(CadError::InvalidTopology(format!(
                "solid encloses no volume ({})",
                source.volume
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(kernel: &MockKernel, min: DVec3) -> Solid {
        kernel.create_box(min, DVec3::splat(10.0)).unwrap()
    }

    #[test]
    fn test_box_topology() {
        let kernel = MockKernel::new();
        let solid = unit_box(&kernel, DVec3::ZERO);
        let props = kernel.properties(&solid).unwrap();
        assert_eq!(props.edge_count, 12);
        assert_eq!(props.face_count, 6);
        assert_eq!(props.vertex_count, 8);
        assert_relative_eq!(props.volume, 1000.0);
        assert_eq!(props.bbox.size(), DVec3::splat(10.0));
        assert!(kernel.check(&solid).is_ok());
    }

    #[test]
    fn test_invalid_primitives() {
        let kernel = MockKernel::new();
        assert!(kernel.create_box(DVec3::ZERO, DVec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(kernel.create_cylinder(&Axis3D::z(DVec3::ZERO), 0.0, 1.0).is_err());
        assert!(kernel.create_torus(&Axis3D::z(DVec3::ZERO), 1.0, -1.0).is_err());
        assert!(kernel.create_cone(&Axis3D::z(DVec3::ZERO), 0.0, 0.0, 1.0).is_err());
        assert!(kernel.create_cone(&Axis3D::z(DVec3::ZERO), 2.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_cone_frustum_pointing_down() {
        let kernel = MockKernel::new();
        let axis = Axis3D::new(DVec3::new(0.0, 0.0, -10.0), DVec3::NEG_Z);
        let cone = kernel.create_cone(&axis, 5.0, 2.5, 3.0).unwrap();
        let props = kernel.properties(&cone).unwrap();
        assert_relative_eq!(props.volume, PI * (25.0 + 12.5 + 6.25), epsilon = 1e-9);
        assert_relative_eq!(props.bbox.min.z, -13.0);
        assert_relative_eq!(props.bbox.max.z, -10.0);
        assert_relative_eq!(props.bbox.max.x, 5.0);
        let edges = kernel.get_edges(&cone).unwrap();
        assert_eq!(edges.iter().filter(|e| e.kind == CurveKind::Circle).count(), 2);

        let pointed = kernel.create_cone(&Axis3D::z(DVec3::ZERO), 1.0, 0.0, 3.0).unwrap();
        assert_eq!(kernel.get_edges(&pointed).unwrap().len(), 2);
    }

    #[test]
    fn test_union_rejects_boundary_only_contact() {
        let kernel = MockKernel::new();
        let a = unit_box(&kernel, DVec3::ZERO);
        let b = unit_box(&kernel, DVec3::new(10.0, 0.0, 0.0));
        let result = kernel.boolean(&a, &b, BooleanType::Union);
        assert!(matches!(result, Err(CadError::BooleanFailed(_))));
    }

    #[test]
    fn test_union_with_overlap_is_connected() {
        let kernel = MockKernel::new();
        let a = unit_box(&kernel, DVec3::ZERO);
        let b = unit_box(&kernel, DVec3::new(9.9, 0.0, 0.0));
        let fused = kernel.boolean(&a, &b, BooleanType::Union).unwrap();
        let props = kernel.properties(&fused).unwrap();
        assert_eq!(props.shell_count, 1);
        assert_relative_eq!(props.volume, 2000.0 - 10.0, epsilon = 1e-9);
        assert_relative_eq!(props.bbox.size().x, 19.9, epsilon = 1e-9);
    }

    #[test]
    fn test_union_volume_from_parts_not_bounds() {
        let kernel = MockKernel::new();
        let a = unit_box(&kernel, DVec3::ZERO);
        let b = kernel
            .create_box(DVec3::new(9.5, 0.0, 0.0), DVec3::new(10.0, 2.0, 10.0))
            .unwrap();
        // inside the combined bounds of a and b, clear of both
        let c = kernel
            .create_box(DVec3::new(15.0, 5.0, 0.0), DVec3::new(2.0, 2.0, 10.0))
            .unwrap();
        let ab = kernel.boolean(&a, &b, BooleanType::Union).unwrap();
        let abc = kernel.boolean(&ab, &c, BooleanType::Union).unwrap();
        let props = kernel.properties(&abc).unwrap();
        assert_relative_eq!(props.volume, 1000.0 + 200.0 - 10.0 + 40.0, epsilon = 1e-9);
        assert_eq!(props.shell_count, 1);
    }

    #[test]
    fn test_disjoint_union_keeps_lumps() {
        let kernel = MockKernel::new();
        let a = unit_box(&kernel, DVec3::ZERO);
        let b = unit_box(&kernel, DVec3::new(20.0, 0.0, 0.0));
        let fused = kernel.boolean(&a, &b, BooleanType::Union).unwrap();
        assert_eq!(kernel.properties(&fused).unwrap().shell_count, 2);
    }

    #[test]
    fn test_subtract_volume_and_imprint() {
        let kernel = MockKernel::new();
        let a = unit_box(&kernel, DVec3::ZERO);
        let tool = kernel
            .create_box(DVec3::new(2.0, 2.0, 5.0), DVec3::new(6.0, 6.0, 5.0))
            .unwrap();
        let cut = kernel.boolean(&a, &tool, BooleanType::Subtract).unwrap();
        let props = kernel.properties(&cut).unwrap();
        assert_relative_eq!(props.volume, 1000.0 - 180.0, epsilon = 1e-9);
        assert!(props.edge_count > 12);

        let whole = kernel
            .create_box(DVec3::splat(-1.0), DVec3::splat(12.0))
            .unwrap();
        assert!(kernel.boolean(&a, &whole, BooleanType::Subtract).is_err());
    }

    #[test]
    fn test_subtract_through_top_leaves_rim_edges() {
        let kernel = MockKernel::new();
        let a = unit_box(&kernel, DVec3::ZERO);
        let tool = kernel
            .create_box(DVec3::new(2.0, 2.0, 5.0), DVec3::new(6.0, 6.0, 6.0))
            .unwrap();
        let cut = kernel.boolean(&a, &tool, BooleanType::Subtract).unwrap();
        assert_relative_eq!(kernel.properties(&cut).unwrap().volume, 820.0, epsilon = 1e-9);

        let edges = kernel.get_edges(&cut).unwrap();
        let rim: Vec<_> = edges
            .iter()
            .filter(|e| (e.midpoint.z - 10.0).abs() < 1e-9 && (e.length - 6.0).abs() < 1e-9)
            .collect();
        assert_eq!(rim.len(), 4);
        assert!(edges.iter().all(|e| e.midpoint.z <= 10.0));
    }

    #[test]
    fn test_fillet_rules() {
        let kernel = MockKernel::new();
        let solid = unit_box(&kernel, DVec3::ZERO);
        let edges = kernel.get_edges(&solid).unwrap();
        let first = edges[0].id;

        assert!(kernel.fillet(&solid, &[], 1.0).is_err());
        assert!(kernel.fillet(&solid, &[first], 0.0).is_err());

        let rounded = kernel.fillet(&solid, &[first], 1.0).unwrap();
        // Ids from the input solid are stale on the result
        assert!(matches!(
            kernel.fillet(&rounded, &[first], 1.0),
            Err(CadError::StaleEdge { .. })
        ));

        let new_edges = kernel.get_edges(&rounded).unwrap();
        let arcs: Vec<EdgeId> = new_edges
            .iter()
            .filter(|e| e.kind == CurveKind::Arc)
            .map(|e| e.id)
            .collect();
        assert_eq!(arcs.len(), 2);
        let again = kernel.fillet(&rounded, &arcs, 1.0);
        assert!(matches!(again, Err(CadError::FilletFailed(msg)) if msg.contains("already rounded")));

        let volume = kernel.properties(&rounded).unwrap().volume;
        assert_relative_eq!(volume, 1000.0 - (1.0 - PI / 4.0) * 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fillet_rejects_curved_edges() {
        let kernel = MockKernel::new();
        let cylinder = kernel
            .create_cylinder(&Axis3D::z(DVec3::ZERO), 5.0, 10.0)
            .unwrap();
        let circle = kernel
            .get_edges(&cylinder)
            .unwrap()
            .into_iter()
            .find(|e| e.kind == CurveKind::Circle)
            .unwrap();
        assert!(matches!(
            kernel.fillet(&cylinder, &[circle.id], 1.0),
            Err(CadError::FilletFailed(_))
        ));
    }

    #[test]
    fn test_extrude_profile_with_arc() {
        let kernel = MockKernel::new();
        let profile = Profile::new(DVec3::new(0.0, 0.0, 0.0))
            .line_to(DVec3::new(10.0, 0.0, 0.0))
            .arc_to(DVec3::new(15.0, 5.0, 0.0), DVec3::new(10.0, 10.0, 0.0))
            .line_to(DVec3::new(0.0, 10.0, 0.0));
        let solid = kernel.extrude(&profile, DVec3::new(0.0, 0.0, 2.0)).unwrap();
        let props = kernel.properties(&solid).unwrap();
        let expected = (100.0 + PI * 25.0 / 2.0) * 2.0;
        assert_relative_eq!(props.volume, expected, epsilon = 0.5);
        assert_relative_eq!(props.bbox.max.x, 15.0, epsilon = 1e-6);

        let arcs = kernel
            .get_edges(&solid)
            .unwrap()
            .iter()
            .filter(|e| e.kind == CurveKind::Arc)
            .count();
        assert_eq!(arcs, 2);

        assert!(kernel.extrude(&profile, DVec3::X).is_err());
    }

    #[test]
    fn test_tessellation_matches_box() {
        let kernel = MockKernel::new();
        let solid = unit_box(&kernel, DVec3::ZERO);
        let mesh = kernel.tessellate(&solid, 0.1).unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_closed());
        assert_relative_eq!(mesh.signed_volume(), 1000.0, epsilon = 1e-3);
    }
}

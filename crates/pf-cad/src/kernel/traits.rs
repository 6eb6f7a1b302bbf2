//! CAD Kernel trait definitions
//!
//! These traits define the interface that all CAD kernels must implement.
//! All coordinates are millimetres in a right-handed frame
//! (X = length, Y = width, Z = height).

use std::collections::HashMap;
use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an edge within a solid
///
/// Edge ids are only meaningful for the solid they were queried from. Every
/// combinator produces a new solid, so ids must be re-derived afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    /// ID of the solid this edge belongs to
    pub solid_id: Uuid,
    /// Index of the edge within the solid
    pub index: u32,
}

impl EdgeId {
    /// Create a new edge ID
    pub fn new(solid_id: Uuid, index: u32) -> Self {
        Self { solid_id, index }
    }
}

/// Geometric kind of an edge's underlying curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CurveKind {
    /// Straight segment
    Line,
    /// Full circle (start and end coincide)
    Circle,
    /// Circular or elliptical arc
    Arc,
    /// Any other curve (splines, intersection curves)
    Other,
}

impl CurveKind {
    /// Classify a curve from three samples when the backend has no curve type
    pub fn classify(start: DVec3, midpoint: DVec3, end: DVec3) -> Self {
        let chord = end - start;
        if chord.length() < GEOMETRY_EPSILON {
            return if (midpoint - start).length() < GEOMETRY_EPSILON {
                CurveKind::Other
            } else {
                CurveKind::Circle
            };
        }
        let along = (midpoint - start).dot(chord) / chord.length_squared();
        let deviation = (start + chord * along - midpoint).length();
        if deviation < GEOMETRY_EPSILON {
            CurveKind::Line
        } else {
            CurveKind::Arc
        }
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CurveKind::Line => "line",
            CurveKind::Circle => "circle",
            CurveKind::Arc => "arc",
            CurveKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Distance below which two points are considered coincident
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// Information about an edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Kind of the underlying curve
    pub kind: CurveKind,
    /// Start point of the edge
    pub start: DVec3,
    /// End point of the edge
    pub end: DVec3,
    /// Point at the middle of the edge's parameter range
    pub midpoint: DVec3,
    /// Length of the edge along the curve
    pub length: f64,
}

impl EdgeInfo {
    /// Create info for a straight edge
    pub fn line(id: EdgeId, start: DVec3, end: DVec3) -> Self {
        Self {
            id,
            kind: CurveKind::Line,
            start,
            end,
            midpoint: (start + end) * 0.5,
            length: (end - start).length(),
        }
    }

    /// Create info from a sampled polyline along the curve
    ///
    /// Returns `None` for fewer than two samples.
    pub fn from_samples(id: EdgeId, kind: CurveKind, samples: &[DVec3]) -> Option<Self> {
        let (start, end) = (*samples.first()?, *samples.last()?);
        if samples.len() < 2 {
            return None;
        }
        let length = samples.windows(2).map(|w| (w[1] - w[0]).length()).sum();
        Some(Self {
            id,
            kind,
            start,
            end,
            midpoint: samples[samples.len() / 2],
            length,
        })
    }

    /// Unit direction from start to end, zero for closed curves
    pub fn direction(&self) -> DVec3 {
        (self.end - self.start).normalize_or_zero()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two corners (in any order)
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create a box from its minimum corner and size
    pub fn from_min_size(min: DVec3, size: DVec3) -> Self {
        Self::new(min, min + size)
    }

    /// Smallest box containing all points, `None` when empty
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |b, p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        }))
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Extent of the intersection along each axis (negative when separated)
    pub fn overlap_extent(&self, other: &Aabb) -> DVec3 {
        self.max.min(other.max) - self.min.max(other.min)
    }

    /// Volume of the intersection, zero when the boxes only touch or are apart
    pub fn overlap_volume(&self, other: &Aabb) -> f64 {
        let e = self.overlap_extent(other);
        if e.x <= 0.0 || e.y <= 0.0 || e.z <= 0.0 {
            0.0
        } else {
            e.x * e.y * e.z
        }
    }

    /// Whether the boxes share boundary points (including volumetric overlap)
    pub fn touches(&self, other: &Aabb) -> bool {
        let e = self.overlap_extent(other);
        e.x >= -GEOMETRY_EPSILON && e.y >= -GEOMETRY_EPSILON && e.z >= -GEOMETRY_EPSILON
    }

    pub fn contains(&self, p: DVec3) -> bool {
        let eps = DVec3::splat(GEOMETRY_EPSILON);
        p.cmpge(self.min - eps).all() && p.cmple(self.max + eps).all()
    }
}

/// Summary properties of a solid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolidProperties {
    /// Bounding box
    pub bbox: Aabb,
    /// Enclosed volume in mm³
    pub volume: f64,
    /// Number of distinct vertices
    pub vertex_count: usize,
    /// Number of distinct edges
    pub edge_count: usize,
    /// Number of faces
    pub face_count: usize,
    /// Number of boundary shells
    pub shell_count: usize,
}

/// Error type for CAD kernel operations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid primitive: {0}")]
    InvalidPrimitive(String),

    #[error("Boolean operation failed: {0}")]
    BooleanFailed(String),

    #[error("Fillet failed: {0}")]
    FilletFailed(String),

    #[error("Tessellation failed: {0}")]
    TessellationFailed(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),

    #[error("Operation not supported by {kernel} kernel: {operation}")]
    NotSupported {
        kernel: &'static str,
        operation: &'static str,
    },

    #[error("Solid {0} not found")]
    SolidNotFound(Uuid),

    #[error("Edge {index} does not belong to solid {solid_id}")]
    StaleEdge { solid_id: Uuid, index: u32 },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for CAD operations
pub type CadResult<T> = Result<T, CadError>;

/// A tessellated mesh output from the CAD kernel
#[derive(Debug, Clone, Default)]
pub struct TessellatedMesh {
    /// Vertex positions (3 floats per vertex)
    pub vertices: Vec<[f32; 3]>,
    /// Vertex normals (3 floats per vertex)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (3 indices per triangle)
    pub indices: Vec<u32>,
}

impl TessellatedMesh {
    /// Create an empty tessellated mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate triangles as vertex position triples
    pub fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let get = |i: u32| self.vertices.get(i as usize).map(|v| DVec3::from(v.map(f64::from)));
            Some([get(tri[0])?, get(tri[1])?, get(tri[2])?])
        })
    }

    /// Bounding box of all referenced vertices
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.triangles().flatten())
    }

    /// Enclosed volume by the divergence theorem (positive for outward winding)
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| a.dot(b.cross(c)) / 6.0)
            .sum()
    }

    /// Whether every edge is shared by exactly two triangles
    ///
    /// Vertices are merged on a 1e-4 mm grid first, since backends emit
    /// per-face vertex copies.
    pub fn is_closed(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let key = |p: DVec3| {
            let q = (p * 1e4).round();
            (q.x as i64, q.y as i64, q.z as i64)
        };
        let mut edges: HashMap<_, u32> = HashMap::new();
        for tri in self.triangles() {
            let k = tri.map(key);
            for (a, b) in [(k[0], k[1]), (k[1], k[2]), (k[2], k[0])] {
                if a == b {
                    continue;
                }
                let e = if a < b { (a, b) } else { (b, a) };
                *edges.entry(e).or_default() += 1;
            }
        }
        edges.values().all(|&n| n == 2)
    }

    /// Recompute smooth vertex normals from triangle winding
    pub fn compute_normals(&mut self) {
        let mut acc = vec![DVec3::ZERO; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let p = |i: u32| DVec3::from(self.vertices[i as usize].map(f64::from));
            let n = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            for &i in tri {
                acc[i as usize] += n;
            }
        }
        self.normals = acc
            .into_iter()
            .map(|n| {
                let n = n.normalize_or(DVec3::Z);
                [n.x as f32, n.y as f32, n.z as f32]
            })
            .collect();
    }

    /// Append another mesh, offsetting its indices
    pub fn append(&mut self, other: &TessellatedMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
    }
}

/// One segment of a closed planar profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProfileSegment {
    /// Straight segment to `to`
    Line { to: DVec3 },
    /// Circular arc through `through` ending at `to`
    Arc { through: DVec3, to: DVec3 },
}

impl ProfileSegment {
    pub fn end(&self) -> DVec3 {
        match self {
            ProfileSegment::Line { to } | ProfileSegment::Arc { to, .. } => *to,
        }
    }
}

/// A closed planar loop in 3D used for extrusion
///
/// The loop is closed implicitly: if the last segment does not end at the
/// start point, a straight closing segment is assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub start: DVec3,
    pub segments: Vec<ProfileSegment>,
}

impl Profile {
    /// Start a profile at a point
    pub fn new(start: DVec3) -> Self {
        Self {
            start,
            segments: Vec::new(),
        }
    }

    /// Closed polygon through the given points
    pub fn polygon(points: &[DVec3]) -> Self {
        let mut profile = Self::new(points.first().copied().unwrap_or(DVec3::ZERO));
        for p in points.iter().skip(1) {
            profile = profile.line_to(*p);
        }
        profile
    }

    pub fn line_to(mut self, to: DVec3) -> Self {
        self.segments.push(ProfileSegment::Line { to });
        self
    }

    pub fn arc_to(mut self, through: DVec3, to: DVec3) -> Self {
        self.segments.push(ProfileSegment::Arc { through, to });
        self
    }

    /// Segments including the implicit closing line
    pub fn closed_segments(&self) -> Vec<(DVec3, ProfileSegment)> {
        let mut out = Vec::with_capacity(self.segments.len() + 1);
        let mut from = self.start;
        for seg in &self.segments {
            out.push((from, *seg));
            from = seg.end();
        }
        if (from - self.start).length() > GEOMETRY_EPSILON {
            out.push((from, ProfileSegment::Line { to: self.start }));
        }
        out
    }

    /// Polyline approximation, arcs split into `arc_steps` chords
    ///
    /// The start point is not repeated at the end.
    pub fn flattened(&self, arc_steps: usize) -> Vec<DVec3> {
        let mut points = vec![self.start];
        for (from, seg) in self.closed_segments() {
            match seg {
                ProfileSegment::Line { to } => points.push(to),
                ProfileSegment::Arc { through, to } => {
                    points.extend(arc_points(from, through, to, arc_steps.max(2)));
                }
            }
        }
        if points.len() > 1
            && let Some(last) = points.last()
            && (*last - self.start).length() < GEOMETRY_EPSILON
        {
            points.pop();
        }
        points
    }

    /// Unit normal by Newell's method (right-hand rule on the loop order)
    pub fn normal(&self) -> DVec3 {
        newell(&self.flattened(16)).normalize_or_zero()
    }

    /// Enclosed area of the flattened loop
    pub fn area(&self) -> f64 {
        newell(&self.flattened(32)).length() * 0.5
    }

    /// Check that the profile is a closed, planar, non-degenerate loop
    pub fn validate(&self) -> CadResult<()> {
        let points = self.flattened(8);
        if points.len() < 3 {
            return Err(CadError::InvalidProfile(
                "Profile must have at least 3 points".into(),
            ));
        }
        let normal = self.normal();
        if normal == DVec3::ZERO {
            return Err(CadError::InvalidProfile("Profile encloses no area".into()));
        }
        if points
            .iter()
            .any(|p| (*p - self.start).dot(normal).abs() > 1e-4)
        {
            return Err(CadError::InvalidProfile("Profile is not planar".into()));
        }
        Ok(())
    }
}

fn newell(points: &[DVec3]) -> DVec3 {
    let n = points.len();
    (0..n).fold(DVec3::ZERO, |acc, i| {
        let (a, b) = (points[i], points[(i + 1) % n]);
        acc + DVec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        )
    })
}

/// Circle through three points as (center, radius, normal)
pub fn circle_through(a: DVec3, b: DVec3, c: DVec3) -> Option<(DVec3, f64, DVec3)> {
    let (ab, ac) = (b - a, c - a);
    let n = ab.cross(ac);
    let n2 = n.length_squared();
    if n2 < GEOMETRY_EPSILON * GEOMETRY_EPSILON {
        return None;
    }
    let offset = (n.cross(ab) * ac.length_squared() + ac.cross(n) * ab.length_squared()) / (2.0 * n2);
    Some((a + offset, offset.length(), n / n2.sqrt()))
}

/// Points along the arc from `from` through `through` to `to`, excluding `from`
pub fn arc_points(from: DVec3, through: DVec3, to: DVec3, steps: usize) -> Vec<DVec3> {
    let Some((center, radius, normal)) = circle_through(from, through, to) else {
        return vec![to];
    };
    let u = (from - center).normalize();
    let v = normal.cross(u);
    let angle_of = |p: DVec3| {
        let d = p - center;
        let a = d.dot(v).atan2(d.dot(u));
        if a < 0.0 { a + std::f64::consts::TAU } else { a }
    };
    let sweep = angle_of(to);
    (1..=steps)
        .map(|i| {
            if i == steps {
                return to;
            }
            let t = sweep * i as f64 / steps as f64;
            center + (u * t.cos() + v * t.sin()) * radius
        })
        .collect()
}

/// A 3D solid body handle
///
/// The geometry itself lives inside the kernel that created the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solid {
    /// Unique identifier
    pub id: Uuid,
}

impl Solid {
    /// Create a new solid with the given ID
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

/// Axis definition for cylinders and tori
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis3D {
    /// Origin point of the axis
    pub origin: DVec3,
    /// Direction of the axis (normalized)
    pub direction: DVec3,
}

impl Axis3D {
    /// Create an axis from origin and direction
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or(DVec3::Z),
        }
    }

    /// X axis through a point
    pub fn x(origin: DVec3) -> Self {
        Self::new(origin, DVec3::X)
    }

    /// Y axis through a point
    pub fn y(origin: DVec3) -> Self {
        Self::new(origin, DVec3::Y)
    }

    /// Z axis through a point
    pub fn z(origin: DVec3) -> Self {
        Self::new(origin, DVec3::Z)
    }

    /// A unit vector perpendicular to the axis
    pub fn perpendicular(&self) -> DVec3 {
        self.direction.any_orthonormal_vector()
    }
}

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (fuse)
    Union,
    /// Subtraction (cut)
    Subtract,
    /// Intersection (common)
    Intersect,
}

/// The main CAD kernel trait
///
/// Implementations of this trait provide the actual geometry operations
/// using different backends (OpenCASCADE, Truck, etc.). Solids are immutable:
/// every operation returns a new handle and leaves its inputs untouched.
pub trait CadKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    /// Create an axis-aligned box from its minimum corner and size
    fn create_box(&self, min: DVec3, size: DVec3) -> CadResult<Solid>;

    /// Create a cylinder whose base circle is centered on `axis.origin`
    fn create_cylinder(&self, axis: &Axis3D, radius: f64, height: f64) -> CadResult<Solid>;

    /// Create a torus centered on `axis.origin`, ring perpendicular to the axis
    fn create_torus(&self, axis: &Axis3D, major_radius: f64, minor_radius: f64)
    -> CadResult<Solid>;

    /// Create a cone frustum from `base_radius` at `axis.origin` to
    /// `top_radius` at `height` along the axis
    ///
    /// One of the radii may be zero for a pointed cone.
    fn create_cone(
        &self,
        axis: &Axis3D,
        base_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> CadResult<Solid>;

    /// Extrude a closed planar profile along a direction vector
    ///
    /// # Arguments
    /// * `profile` - The closed loop to extrude
    /// * `direction` - Extrusion vector (its length is the extrusion distance)
    fn extrude(&self, profile: &Profile, direction: DVec3) -> CadResult<Solid>;

    /// Perform a boolean operation on two solids
    ///
    /// # Arguments
    /// * `a` - The first solid
    /// * `b` - The second solid
    /// * `op` - The boolean operation type
    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> CadResult<Solid>;

    /// Apply fillet (rounded edge) to selected edges
    ///
    /// # Arguments
    /// * `solid` - The solid to modify
    /// * `edges` - Edge IDs to fillet, queried from this very solid
    /// * `radius` - Fillet radius
    fn fillet(&self, solid: &Solid, edges: &[EdgeId], radius: f64) -> CadResult<Solid>;

    /// Get all edges of a solid with their geometric information
    fn get_edges(&self, solid: &Solid) -> CadResult<Vec<EdgeInfo>>;

    /// Tessellate a solid into triangles
    ///
    /// # Arguments
    /// * `solid` - The solid to tessellate
    /// * `tolerance` - The tessellation tolerance (lower = more triangles)
    fn tessellate(&self, solid: &Solid, tolerance: f64) -> CadResult<TessellatedMesh>;

    /// Bounding box, volume and topology counts
    fn properties(&self, solid: &Solid) -> CadResult<SolidProperties>;

    /// Verify that the solid is closed and encloses a positive volume
    fn check(&self, solid: &Solid) -> CadResult<()>;
}

/// Reject cone dimensions no backend can build
pub(crate) fn validate_cone(base_radius: f64, top_radius: f64, height: f64) -> CadResult<()> {
    if height <= 0.0
        || base_radius < 0.0
        || top_radius < 0.0
        || base_radius.max(top_radius) <= 0.0
    {
        return Err(CadError::InvalidPrimitive(format!(
            "cone needs a positive height and a positive radius, got r1={} r2={} h={}",
            base_radius, top_radius, height
        )));
    }
    Ok(())
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

impl NullKernel {
    fn unavailable<T>() -> CadResult<T> {
        Err(CadError::KernelNotAvailable(
            "No CAD kernel available".into(),
        ))
    }
}

impl CadKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn create_box(&self, _min: DVec3, _size: DVec3) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn create_cylinder(&self, _axis: &Axis3D, _radius: f64, _height: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn create_torus(
        &self,
        _axis: &Axis3D,
        _major_radius: f64,
        _minor_radius: f64,
    ) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn create_cone(
        &self,
        _axis: &Axis3D,
        _base_radius: f64,
        _top_radius: f64,
        _height: f64,
    ) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn extrude(&self, _profile: &Profile, _direction: DVec3) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn boolean(&self, _a: &Solid, _b: &Solid, _op: BooleanType) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn fillet(&self, _solid: &Solid, _edges: &[EdgeId], _radius: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn get_edges(&self, _solid: &Solid) -> CadResult<Vec<EdgeInfo>> {
        Self::unavailable()
    }

    fn tessellate(&self, _solid: &Solid, _tolerance: f64) -> CadResult<TessellatedMesh> {
        Self::unavailable()
    }

    fn properties(&self, _solid: &Solid) -> CadResult<SolidProperties> {
        Self::unavailable()
    }

    fn check(&self, _solid: &Solid) -> CadResult<()> {
        Self::unavailable()
    }
}

/// Get the default CAD kernel based on available features
pub fn default_kernel() -> Box<dyn CadKernel> {
    #[cfg(feature = "opencascade")]
    {
        Box::new(super::OpenCascadeKernel::new())
    }

    #[cfg(all(feature = "truck", not(feature = "opencascade")))]
    {
        Box::new(super::TruckKernel::new())
    }

    #[cfg(not(any(feature = "opencascade", feature = "truck")))]
    {
        Box::new(NullKernel)
    }
}

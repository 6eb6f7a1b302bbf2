//! Construction Pipeline
//!
//! [`Body`] threads a solid handle through boolean and rounding combinators
//! while its type parameter tracks the construction stage. The stages only
//! move forward:
//!
//! ```text
//! Shaping --fuse--> Joining --round--> Rounding --add_detail--> Detailing
//!    |                 |                   |
//!   cut           fuse / round       round / reinforce
//! ```
//!
//! Cuts are only available before the first fuse, fuses only before the
//! first rounding batch (except reinforcing parts), and nothing but further
//! details can follow a detail.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::kernel::{Aabb, BooleanType, CadError, CadKernel, CurveKind, EdgeId, Solid};
use crate::selector::EdgeSelector;

/// Errors raised while constructing a body
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("{body}: {operation} failed while {stage}: {source}")]
    Kernel {
        body: String,
        stage: &'static str,
        operation: String,
        #[source]
        source: CadError,
    },

    #[error("{body}: rounding batch '{batch}' mixes curve kinds {kinds:?}")]
    HeterogeneousBatch {
        body: String,
        batch: String,
        kinds: Vec<CurveKind>,
    },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

mod sealed {
    pub trait Sealed {}
}

/// Construction stage of a [`Body`]
pub trait Stage: sealed::Sealed {
    const NAME: &'static str;
}

/// Primitive placed, only cuts applied so far
#[derive(Debug)]
pub struct Shaping;
/// Secondary parts fused
#[derive(Debug)]
pub struct Joining;
/// At least one rounding batch applied
#[derive(Debug)]
pub struct Rounding;
/// Complex sub-assemblies attached
#[derive(Debug)]
pub struct Detailing;

impl sealed::Sealed for Shaping {}
impl sealed::Sealed for Joining {}
impl sealed::Sealed for Rounding {}
impl sealed::Sealed for Detailing {}

impl Stage for Shaping {
    const NAME: &'static str = "shaping";
}
impl Stage for Joining {
    const NAME: &'static str = "joining";
}
impl Stage for Rounding {
    const NAME: &'static str = "rounding";
}
impl Stage for Detailing {
    const NAME: &'static str = "detailing";
}

/// Stages that still accept fused secondary parts
pub trait AcceptsFuse: Stage {}
impl AcceptsFuse for Shaping {}
impl AcceptsFuse for Joining {}

/// Stages that still accept rounding batches
pub trait AcceptsRound: Stage {}
impl AcceptsRound for Shaping {}
impl AcceptsRound for Joining {}
impl AcceptsRound for Rounding {}

/// A homogeneous set of edges rounded with one radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundBatch {
    pub label: String,
    pub radius: f64,
    pub selector: EdgeSelector,
}

impl RoundBatch {
    pub fn new(label: impl Into<String>, radius: f64, selector: EdgeSelector) -> Self {
        Self {
            label: label.into(),
            radius,
            selector,
        }
    }
}

/// A finished solid with its display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSolid {
    pub name: String,
    pub solid: Solid,
}

/// A solid under construction
pub struct Body<'k, S: Stage> {
    kernel: &'k dyn CadKernel,
    name: String,
    solid: Solid,
    steps: usize,
    _stage: PhantomData<S>,
}

impl<S: Stage> std::fmt::Debug for Body<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("name", &self.name)
            .field("stage", &S::NAME)
            .field("solid", &self.solid.id)
            .field("steps", &self.steps)
            .finish()
    }
}

impl<'k> Body<'k, Shaping> {
    /// Start a body from a base primitive
    pub fn new(kernel: &'k dyn CadKernel, name: impl Into<String>, base: Solid) -> Self {
        let name = name.into();
        debug!(body = %name, kernel = kernel.name(), "starting body");
        Self {
            kernel,
            name,
            solid: base,
            steps: 0,
            _stage: PhantomData,
        }
    }

    /// Subtract a cutout
    pub fn cut(self, tool: Solid, label: &str) -> PipelineResult<Self> {
        let solid = self.boolean(tool, BooleanType::Subtract, "cut", label)?;
        Ok(self.advance(solid))
    }

    /// Subtract several cutouts in order
    pub fn cut_all(
        self,
        tools: impl IntoIterator<Item = Solid>,
        label: &str,
    ) -> PipelineResult<Self> {
        tools
            .into_iter()
            .enumerate()
            .try_fold(self, |body, (i, tool)| {
                body.cut(tool, &format!("{} #{}", label, i + 1))
            })
    }
}

impl<'k, S: Stage> Body<'k, S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current solid handle
    pub fn solid(&self) -> Solid {
        self.solid
    }

    pub fn kernel(&self) -> &'k dyn CadKernel {
        self.kernel
    }

    /// Number of combinators applied so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Attach a complex sub-assembly; no cut, fuse or round can follow
    pub fn add_detail(self, part: Solid, label: &str) -> PipelineResult<Body<'k, Detailing>> {
        let solid = self.boolean(part, BooleanType::Union, "add detail", label)?;
        Ok(self.advance(solid))
    }

    /// Attach several sub-assemblies in order
    pub fn add_details(
        self,
        parts: impl IntoIterator<Item = Solid>,
        label: &str,
    ) -> PipelineResult<Body<'k, Detailing>> {
        let mut body: Body<'k, Detailing> = self.restage();
        for (i, part) in parts.into_iter().enumerate() {
            body = body.add_detail(part, &format!("{} #{}", label, i + 1))?;
        }
        Ok(body)
    }

    /// Finish construction
    pub fn finish(self) -> NamedSolid {
        info!(body = %self.name, steps = self.steps, stage = S::NAME, "body complete");
        NamedSolid {
            name: self.name,
            solid: self.solid,
        }
    }

    fn kernel_error(&self, operation: String, source: CadError) -> PipelineError {
        PipelineError::Kernel {
            body: self.name.clone(),
            stage: S::NAME,
            operation,
            source,
        }
    }

    fn boolean(
        &self,
        other: Solid,
        op: BooleanType,
        verb: &str,
        label: &str,
    ) -> PipelineResult<Solid> {
        debug!(body = %self.name, stage = S::NAME, "{} '{}'", verb, label);
        self.kernel
            .boolean(&self.solid, &other, op)
            .map_err(|e| self.kernel_error(format!("{} '{}'", verb, label), e))
    }

    fn restage<T: Stage>(self) -> Body<'k, T> {
        Body {
            kernel: self.kernel,
            name: self.name,
            solid: self.solid,
            steps: self.steps,
            _stage: PhantomData,
        }
    }

    fn advance<T: Stage>(self, solid: Solid) -> Body<'k, T> {
        let mut body = self.restage::<T>();
        body.solid = solid;
        body.steps += 1;
        body
    }
}

impl<'k, S: AcceptsFuse> Body<'k, S> {
    /// Fuse a secondary part
    pub fn fuse(self, part: Solid, label: &str) -> PipelineResult<Body<'k, Joining>> {
        let solid = self.boolean(part, BooleanType::Union, "fuse", label)?;
        Ok(self.advance(solid))
    }

    /// Fuse several secondary parts in order
    pub fn fuse_all(
        self,
        parts: impl IntoIterator<Item = Solid>,
        label: &str,
    ) -> PipelineResult<Body<'k, Joining>> {
        let mut body: Body<'k, Joining> = self.restage();
        for (i, part) in parts.into_iter().enumerate() {
            body = body.fuse(part, &format!("{} #{}", label, i + 1))?;
        }
        Ok(body)
    }
}

impl<'k, S: AcceptsRound> Body<'k, S> {
    /// Round the edges picked by the batch's selector on the current solid
    ///
    /// Batches with a non-positive radius or without matching edges leave
    /// the solid unchanged.
    pub fn round(self, batch: &RoundBatch) -> PipelineResult<Body<'k, Rounding>> {
        if batch.radius <= 0.0 {
            info!(body = %self.name, batch = %batch.label, radius = batch.radius, "skipping rounding batch with non-positive radius");
            return Ok(self.hold());
        }

        let edges = self
            .kernel
            .get_edges(&self.solid)
            .map_err(|e| self.kernel_error(format!("query edges for '{}'", batch.label), e))?;
        let selected = batch.selector.select(&edges);
        if selected.is_empty() {
            info!(body = %self.name, batch = %batch.label, "rounding batch selects no edges, skipping");
            return Ok(self.hold());
        }

        let kinds: BTreeSet<CurveKind> = selected.iter().map(|e| e.kind).collect();
        if kinds.len() > 1 {
            return Err(PipelineError::HeterogeneousBatch {
                body: self.name.clone(),
                batch: batch.label.clone(),
                kinds: kinds.into_iter().collect(),
            });
        }

        let ids: Vec<EdgeId> = selected.iter().map(|e| e.id).collect();
        debug!(
            body = %self.name,
            batch = %batch.label,
            edges = ids.len(),
            radius = batch.radius,
            "rounding"
        );
        let solid = self
            .kernel
            .fillet(&self.solid, &ids, batch.radius)
            .map_err(|e| {
                self.kernel_error(
                    format!("round '{}' ({} edges, r={})", batch.label, ids.len(), batch.radius),
                    e,
                )
            })?;
        Ok(self.advance(solid))
    }

    /// Move to the rounding stage without touching the solid
    fn hold(self) -> Body<'k, Rounding> {
        self.restage()
    }
}

impl<'k> Body<'k, Rounding> {
    /// Fuse a simple reinforcing part after rounding
    ///
    /// Edges created by the fuse are not rounded until a later batch
    /// re-selects them.
    pub fn reinforce(self, part: Solid, label: &str) -> PipelineResult<Self> {
        let solid = self.boolean(part, BooleanType::Union, "reinforce", label)?;
        Ok(self.advance(solid))
    }
}

/// Face of an axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxFace {
    MinX,
    MaxX,
    MinY,
    MaxY,
    MinZ,
    MaxZ,
}

impl BoxFace {
    /// Outward unit normal
    pub fn normal(self) -> DVec3 {
        match self {
            BoxFace::MinX => DVec3::NEG_X,
            BoxFace::MaxX => DVec3::X,
            BoxFace::MinY => DVec3::NEG_Y,
            BoxFace::MaxY => DVec3::Y,
            BoxFace::MinZ => DVec3::NEG_Z,
            BoxFace::MaxZ => DVec3::Z,
        }
    }
}

/// Overlap added where two parts would otherwise only share a boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clearance(pub f64);

impl Default for Clearance {
    fn default() -> Self {
        Clearance(Self::DEFAULT_MM)
    }
}

impl Clearance {
    pub const DEFAULT_MM: f64 = 0.1;

    pub fn mm(self) -> f64 {
        self.0
    }

    /// Extend a box through one face by the clearance
    pub fn grow_box(self, bbox: Aabb, face: BoxFace) -> Aabb {
        let offset = face.normal() * self.0;
        if offset.cmplt(DVec3::ZERO).any() {
            Aabb::new(bbox.min + offset, bbox.max)
        } else {
            Aabb::new(bbox.min, bbox.max + offset)
        }
    }

    /// Extend a box through each of `faces` by the clearance
    pub fn grow_faces(self, bbox: Aabb, faces: &[BoxFace]) -> Aabb {
        faces
            .iter()
            .fold(bbox, |bbox, face| self.grow_box(bbox, *face))
    }

    /// Move a boundary point into the neighbouring part along `into`
    pub fn sink(self, point: DVec3, into: DVec3) -> DVec3 {
        point + into.normalize_or_zero() * self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MockKernel;
    use crate::selector::{Axis, Interval, Region};
    use approx::assert_relative_eq;

    fn cube(kernel: &MockKernel, min: DVec3, size: f64) -> Solid {
        kernel.create_box(min, DVec3::splat(size)).unwrap()
    }

    #[test]
    fn test_stage_order_and_steps() {
        let kernel = MockKernel::new();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let hole = kernel
            .create_box(DVec3::new(4.0, 4.0, 5.0), DVec3::new(2.0, 2.0, 5.0))
            .unwrap();
        let boss = cube(&kernel, DVec3::new(9.0, 0.0, 0.0), 3.0);

        let body = Body::new(&kernel, "part", base)
            .cut(hole, "hole")
            .unwrap()
            .fuse(boss, "boss")
            .unwrap()
            .round(&RoundBatch::new(
                "verticals",
                0.5,
                EdgeSelector::lines()
                    .and(EdgeSelector::parallel(Axis::Z))
                    .and(EdgeSelector::length(10.0, 0.01)),
            ))
            .unwrap();
        assert_eq!(body.steps(), 3);

        let named = body.finish();
        assert_eq!(named.name, "part");
        let props = kernel.properties(&named.solid).unwrap();
        // 4 outer verticals; the hole and boss verticals are shorter
        let rounded = 4.0 * (1.0 - std::f64::consts::FRAC_PI_4) * 0.25 * 10.0;
        assert_relative_eq!(props.volume, 1000.0 - 20.0 + 27.0 - 9.0 - rounded, epsilon = 1e-9);
    }

    #[test]
    fn test_round_skips_empty_and_zero_batches() {
        let kernel = MockKernel::new();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let before = kernel.solid_count();

        let body = Body::new(&kernel, "part", base)
            .round(&RoundBatch::new("none", 1.0, EdgeSelector::length(99.0, 0.1)))
            .unwrap()
            .round(&RoundBatch::new("zero", 0.0, EdgeSelector::lines()))
            .unwrap();

        assert_eq!(body.solid(), base);
        assert_eq!(body.steps(), 0);
        assert_eq!(kernel.solid_count(), before);
    }

    #[test]
    fn test_heterogeneous_batch_rejected() {
        let kernel = MockKernel::new();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let peg = kernel
            .create_cylinder(&crate::kernel::Axis3D::z(DVec3::new(5.0, 5.0, 9.0)), 1.0, 3.0)
            .unwrap();

        let result = Body::new(&kernel, "part", base)
            .fuse(peg, "peg")
            .unwrap()
            .round(&RoundBatch::new(
                "top",
                0.2,
                EdgeSelector::midpoint(Region::any().z(Interval::above(9.5))),
            ));
        match result {
            Err(PipelineError::HeterogeneousBatch { batch, kinds, .. }) => {
                assert_eq!(batch, "top");
                assert!(kinds.contains(&CurveKind::Circle));
            }
            other => panic!("expected heterogeneous batch error, got {:?}", other),
        }
    }

    #[test]
    fn test_rounding_a_rounded_edge_fails() {
        let kernel = MockKernel::new();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let first = RoundBatch::new(
            "front",
            1.0,
            EdgeSelector::parallel(Axis::X).and(EdgeSelector::midpoint(
                Region::any().y(Interval::below(0.5)).z(Interval::below(0.5)),
            )),
        );
        let again = RoundBatch::new(
            "front again",
            1.0,
            EdgeSelector::midpoint(Region::any().y(Interval::below(0.5)).z(Interval::below(0.5)))
                .and(EdgeSelector::Curve(CurveKind::Arc)),
        );

        let result = Body::new(&kernel, "part", base)
            .round(&first)
            .unwrap()
            .round(&again);
        match result {
            Err(PipelineError::Kernel {
                stage,
                operation,
                source: CadError::FilletFailed(_),
                ..
            }) => {
                assert_eq!(stage, "rounding");
                assert!(operation.contains("front again"));
            }
            other => panic!("expected fillet failure, got {:?}", other),
        }
    }

    #[test]
    fn test_kernel_errors_name_the_operation() {
        let kernel = MockKernel::new();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let neighbour = cube(&kernel, DVec3::new(10.0, 0.0, 0.0), 10.0);

        let err = Body::new(&kernel, "slab", base)
            .fuse(neighbour, "neighbour")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("slab"));
        assert!(message.contains("fuse 'neighbour'"));
        assert!(message.contains("shaping"));
    }

    #[test]
    fn test_clearance_makes_boundary_fuse_connected() {
        let kernel = MockKernel::new();
        let clearance = Clearance::default();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let rim = Aabb::from_min_size(DVec3::new(0.0, 0.0, 10.0), DVec3::new(10.0, 1.0, 2.0));
        let rim = clearance.grow_box(rim, BoxFace::MinZ);
        assert_relative_eq!(rim.min.z, 9.9, epsilon = 1e-12);
        assert_relative_eq!(rim.max.z, 12.0, epsilon = 1e-12);

        let part = kernel.create_box(rim.min, rim.size()).unwrap();
        let fused = Body::new(&kernel, "slab", base).fuse(part, "rim").unwrap().finish();
        let props = kernel.properties(&fused.solid).unwrap();
        assert_eq!(props.shell_count, 1);
        assert_relative_eq!(props.bbox.max.z, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_details_and_reinforce() {
        let kernel = MockKernel::new();
        let base = cube(&kernel, DVec3::ZERO, 10.0);
        let rib = kernel
            .create_box(DVec3::new(2.0, 2.0, 9.9), DVec3::new(1.0, 6.0, 1.1))
            .unwrap();
        let pins = [
            cube(&kernel, DVec3::new(-1.0, 4.0, 4.0), 2.0),
            cube(&kernel, DVec3::new(9.0, 4.0, 4.0), 2.0),
        ];

        let body = Body::new(&kernel, "part", base)
            .round(&RoundBatch::new("none", 1.0, EdgeSelector::Any(vec![])))
            .unwrap()
            .reinforce(rib, "rib")
            .unwrap()
            .add_details(pins, "pin")
            .unwrap();
        assert_eq!(body.steps(), 3);
        let props = kernel.properties(&body.finish().solid).unwrap();
        assert_relative_eq!(props.bbox.min.x, -1.0);
        assert_relative_eq!(props.bbox.max.x, 11.0);
    }

    #[test]
    fn test_sink_moves_along_direction() {
        let c = Clearance(0.25);
        let p = c.sink(DVec3::new(1.0, 2.0, 3.0), DVec3::new(0.0, 0.0, -4.0));
        assert_relative_eq!(p.z, 2.75);
        assert_eq!(c.sink(DVec3::ONE, DVec3::ZERO), DVec3::ONE);
    }

    #[test]
    fn test_grow_faces_opens_both_ends() {
        let c = Clearance(0.5);
        let slot = Aabb::from_min_size(DVec3::ZERO, DVec3::new(2.0, 1.0, 3.0));
        let grown = c.grow_faces(slot, &[BoxFace::MinY, BoxFace::MaxY, BoxFace::MaxZ]);
        assert_eq!(grown.min, DVec3::new(0.0, -0.5, 0.0));
        assert_eq!(grown.max, DVec3::new(2.0, 1.5, 3.5));
        assert_eq!(Clearance(0.0).grow_faces(slot, &[BoxFace::MaxZ]), slot);
    }
}

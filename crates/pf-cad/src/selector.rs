//! Edge Selectors
//!
//! Declarative predicates over the boundary edges of a solid. Selectors hold
//! no edge identity: they are evaluated against freshly queried [`EdgeInfo`]
//! every time a rounding batch runs.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::kernel::{CurveKind, EdgeInfo};

/// Tolerance on `|cos|` for [`EdgeSelector::Parallel`]
const PARALLEL_TOLERANCE: f64 = 1e-6;

/// World coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }
}

/// Open interval `(min, max)`, unbounded by default
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Default for Interval {
    fn default() -> Self {
        Self::ANY
    }
}

impl Interval {
    pub const ANY: Interval = Interval {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    pub fn between(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Values strictly within `tolerance` of `value`
    pub fn near(value: f64, tolerance: f64) -> Self {
        Self::between(value - tolerance, value + tolerance)
    }

    pub fn below(max: f64) -> Self {
        Self::between(f64::NEG_INFINITY, max)
    }

    pub fn above(min: f64) -> Self {
        Self::between(min, f64::INFINITY)
    }

    pub fn contains(&self, value: f64) -> bool {
        value > self.min && value < self.max
    }
}

/// Axis-aligned region given by one interval per coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub x: Interval,
    #[serde(default)]
    pub y: Interval,
    #[serde(default)]
    pub z: Interval,
}

impl Region {
    /// The whole space
    pub fn any() -> Self {
        Self::default()
    }

    pub fn x(mut self, interval: Interval) -> Self {
        self.x = interval;
        self
    }

    pub fn y(mut self, interval: Interval) -> Self {
        self.y = interval;
        self
    }

    pub fn z(mut self, interval: Interval) -> Self {
        self.z = interval;
        self
    }

    pub fn contains(&self, p: DVec3) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
    }
}

/// Predicate over boundary edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EdgeSelector {
    /// Edges whose underlying curve has this kind
    Curve(CurveKind),
    /// Edges with `|length - target| < tolerance`
    Length { target: f64, tolerance: f64 },
    /// Edges whose midpoint lies in the region
    Midpoint(Region),
    /// Edges with an endpoint within `tolerance` of `point`
    Endpoint { point: DVec3, tolerance: f64 },
    /// Open edges running parallel to an axis (either orientation)
    Parallel(Axis),
    /// Conjunction, true for an empty list
    All(Vec<EdgeSelector>),
    /// Disjunction, false for an empty list
    Any(Vec<EdgeSelector>),
}

impl EdgeSelector {
    /// Straight edges only
    pub fn lines() -> Self {
        EdgeSelector::Curve(CurveKind::Line)
    }

    pub fn length(target: f64, tolerance: f64) -> Self {
        EdgeSelector::Length { target, tolerance }
    }

    pub fn midpoint(region: Region) -> Self {
        EdgeSelector::Midpoint(region)
    }

    pub fn endpoint(point: DVec3, tolerance: f64) -> Self {
        EdgeSelector::Endpoint { point, tolerance }
    }

    pub fn parallel(axis: Axis) -> Self {
        EdgeSelector::Parallel(axis)
    }

    /// Combine with another selector, flattening nested conjunctions
    pub fn and(self, other: EdgeSelector) -> Self {
        match self {
            EdgeSelector::All(mut all) => {
                all.push(other);
                EdgeSelector::All(all)
            }
            first => EdgeSelector::All(vec![first, other]),
        }
    }

    /// Alternative selector, flattening nested disjunctions
    pub fn or(self, other: EdgeSelector) -> Self {
        match self {
            EdgeSelector::Any(mut any) => {
                any.push(other);
                EdgeSelector::Any(any)
            }
            first => EdgeSelector::Any(vec![first, other]),
        }
    }

    pub fn matches(&self, edge: &EdgeInfo) -> bool {
        match self {
            EdgeSelector::Curve(kind) => edge.kind == *kind,
            EdgeSelector::Length { target, tolerance } => {
                (edge.length - target).abs() < *tolerance
            }
            EdgeSelector::Midpoint(region) => region.contains(edge.midpoint),
            EdgeSelector::Endpoint { point, tolerance } => {
                edge.start.distance(*point) < *tolerance || edge.end.distance(*point) < *tolerance
            }
            EdgeSelector::Parallel(axis) => {
                let dir = edge.direction();
                dir != DVec3::ZERO && dir.dot(axis.unit()).abs() > 1.0 - PARALLEL_TOLERANCE
            }
            EdgeSelector::All(selectors) => selectors.iter().all(|s| s.matches(edge)),
            EdgeSelector::Any(selectors) => selectors.iter().any(|s| s.matches(edge)),
        }
    }

    /// Edges matching this selector, in input order
    pub fn select(&self, edges: &[EdgeInfo]) -> Vec<EdgeInfo> {
        edges.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::EdgeId;
    use uuid::Uuid;

    fn edge(start: DVec3, end: DVec3) -> EdgeInfo {
        EdgeInfo::line(EdgeId::new(Uuid::nil(), 0), start, end)
    }

    #[test]
    fn test_interval_is_open() {
        let near = Interval::near(5.0, 0.1);
        assert!(near.contains(5.05));
        assert!(!near.contains(5.1 + 1e-9));
        assert!(Interval::ANY.contains(1e300));
        assert!(!Interval::below(0.0).contains(0.0));
    }

    #[test]
    fn test_length_and_midpoint() {
        let e = edge(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0));
        assert!(EdgeSelector::length(10.0, 0.01).matches(&e));
        assert!(!EdgeSelector::length(9.0, 0.5).matches(&e));

        let region = Region::any().x(Interval::near(5.0, 0.1)).z(Interval::below(1.0));
        assert!(EdgeSelector::midpoint(region).matches(&e));
        assert!(!EdgeSelector::midpoint(region.y(Interval::above(0.0))).matches(&e));
    }

    #[test]
    fn test_parallel_ignores_orientation() {
        let e = edge(DVec3::new(0.0, 5.0, 0.0), DVec3::ZERO);
        assert!(EdgeSelector::parallel(Axis::Y).matches(&e));
        assert!(!EdgeSelector::parallel(Axis::X).matches(&e));

        let diagonal = edge(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0));
        assert!(!EdgeSelector::parallel(Axis::X).matches(&diagonal));
    }

    #[test]
    fn test_combinators() {
        let e = edge(DVec3::ZERO, DVec3::new(0.0, 0.0, 3.0));
        let vertical = EdgeSelector::lines().and(EdgeSelector::parallel(Axis::Z));
        assert!(vertical.matches(&e));
        assert!(matches!(&vertical, EdgeSelector::All(v) if v.len() == 2));

        let nested = vertical.clone().and(EdgeSelector::length(3.0, 0.01));
        assert!(matches!(&nested, EdgeSelector::All(v) if v.len() == 3));

        let either = EdgeSelector::length(1.0, 0.1).or(EdgeSelector::endpoint(DVec3::ZERO, 0.01));
        assert!(either.matches(&e));

        assert!(EdgeSelector::All(vec![]).matches(&e));
        assert!(!EdgeSelector::Any(vec![]).matches(&e));
    }

    #[test]
    fn test_select_keeps_order() {
        let edges = vec![
            edge(DVec3::ZERO, DVec3::X),
            edge(DVec3::ZERO, DVec3::Y),
            edge(DVec3::Y, DVec3::new(2.0, 1.0, 0.0)),
        ];
        let selected = EdgeSelector::parallel(Axis::X).select(&edges);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].end, DVec3::new(2.0, 1.0, 0.0));
    }
}

//! Tailgate for a toy tipper trailer
//!
//! X is the tailgate's width, Y its height and Z its thickness; the bottom
//! edge lies at `Y = -height/2`. Two holders with 45° gussets extend the side
//! walls upwards and carry the hinge pins. The outer face has a pocket
//! stiffened by three ribs.

use std::f64::consts::SQRT_2;

use glam::DVec3;
use pf_cad::{
    Aabb, Axis, Axis3D, Body, BoxFace, EdgeSelector, Interval, NamedSolid, Profile, Region, RoundBatch,
    Solid,
};

use super::{BuildContext, BuildError, Model, Parts};
use crate::params::ParamDecl;

const PARAMETERS: &[ParamDecl] = &[
    ParamDecl::float("KLAPPE_WIDTH_MM", 132.0, "Width of the tailgate (X)"),
    ParamDecl::float("KLAPPE_HEIGHT_MM", 66.0, "Height of the tailgate (Y)"),
    ParamDecl::float("KLAPPE_THICKNESS_MM", 8.0, "Thickness of the tailgate (Z)"),
    ParamDecl::float("KLAPPE_EDGE_RADIUS_MM", 1.0, "Radius of the outer edges"),
    ParamDecl::float("KLAPPE_CORNER_RADIUS_MM", 4.0, "Radius of the two bottom corners"),
    ParamDecl::float("KLAPPE_HOLDER_HEIGHT_MM", 8.0, "Height of the pin holders above the plate"),
    ParamDecl::float("KLAPPE_HOLDER_THICKNESS_MM", 1.5, "Thickness of the pin holders (X)"),
    ParamDecl::float("KLAPPE_HOLDER_RADIUS_MM", 3.0, "Radius of the holder tops"),
    ParamDecl::float("KLAPPE_PIN_DIAMETER_MM", 5.0, "Diameter of the hinge pins"),
    ParamDecl::float("KLAPPE_PIN_LENGTH_MM", 6.0, "Length of the hinge pins"),
    ParamDecl::float("KLAPPE_PIN_TIP_DIAMETER_MM", 4.0, "Diameter of the pin tips"),
    ParamDecl::float(
        "KLAPPE_PIN_EDGE_RADIUS_MM",
        1.0,
        "Radius of the rounded pin end, also the tip length",
    ),
    ParamDecl::float(
        "KLAPPE_CUTOUT_DEPTH_MM",
        6.5,
        "Nominal pocket depth; the pocket always leaves 1.5 mm of material",
    ),
    ParamDecl::float("KLAPPE_CUTOUT_TOP_MM", 15.0, "Pocket distance from the top edge"),
    ParamDecl::float("KLAPPE_CUTOUT_BOTTOM_MM", 4.0, "Pocket distance from the bottom edge"),
    ParamDecl::float("KLAPPE_CUTOUT_SIDES_MM", 10.0, "Pocket distance from the side edges"),
];

/// Material left under the pocket
const POCKET_FLOOR_MM: f64 = 1.5;
/// Overlap of holders and gussets into the plate
const HOLDER_OVERLAP_MM: f64 = 0.1;
const RIB_WIDTH_MM: f64 = 10.0;
const RIB_COUNT: usize = 3;

/// Resolved dimensions
#[derive(Debug, Clone, Copy)]
struct Dims {
    width: f64,
    height: f64,
    thickness: f64,
    edge_radius: f64,
    corner_radius: f64,
    holder_height: f64,
    holder_thickness: f64,
    holder_radius: f64,
    pin_radius: f64,
    pin_length: f64,
    pin_tip_radius: f64,
    pin_edge_radius: f64,
    pocket_depth: f64,
    pocket_width: f64,
    pocket_height: f64,
    pocket_bottom: f64,
}

impl Dims {
    fn read(ctx: &BuildContext) -> Result<Self, BuildError> {
        let [width, height, thickness, holder_height, holder_thickness] = ctx.positive([
            "KLAPPE_WIDTH_MM",
            "KLAPPE_HEIGHT_MM",
            "KLAPPE_THICKNESS_MM",
            "KLAPPE_HOLDER_HEIGHT_MM",
            "KLAPPE_HOLDER_THICKNESS_MM",
        ])?;
        let [pin_diameter, pin_length, pin_tip_diameter] = ctx.positive([
            "KLAPPE_PIN_DIAMETER_MM",
            "KLAPPE_PIN_LENGTH_MM",
            "KLAPPE_PIN_TIP_DIAMETER_MM",
        ])?;
        let p = ctx.params;
        let top = p.float("KLAPPE_CUTOUT_TOP_MM")?;
        let bottom = p.float("KLAPPE_CUTOUT_BOTTOM_MM")?;
        let sides = p.float("KLAPPE_CUTOUT_SIDES_MM")?;

        let dims = Self {
            width,
            height,
            thickness,
            edge_radius: p.float("KLAPPE_EDGE_RADIUS_MM")?,
            corner_radius: p.float("KLAPPE_CORNER_RADIUS_MM")?,
            holder_height,
            holder_thickness,
            holder_radius: p.float("KLAPPE_HOLDER_RADIUS_MM")?,
            pin_radius: pin_diameter / 2.0,
            pin_length,
            pin_tip_radius: pin_tip_diameter / 2.0,
            pin_edge_radius: p.float("KLAPPE_PIN_EDGE_RADIUS_MM")?,
            pocket_depth: thickness - POCKET_FLOOR_MM,
            pocket_width: width - 2.0 * sides,
            pocket_height: height - top - bottom,
            pocket_bottom: bottom,
        };
        dims.validate()?;
        Ok(dims)
    }

    fn validate(&self) -> Result<(), BuildError> {
        let invalid = |msg: String| Err(BuildError::Invalid(msg));
        if self.pocket_depth <= 0.0 {
            return invalid(format!(
                "thickness {} leaves no room for a pocket above the {} mm floor",
                self.thickness, POCKET_FLOOR_MM
            ));
        }
        if self.pocket_width <= RIB_COUNT as f64 * RIB_WIDTH_MM || self.pocket_height <= 0.0 {
            return invalid(format!(
                "pocket of {} x {} cannot hold {} ribs",
                self.pocket_width, self.pocket_height, RIB_COUNT
            ));
        }
        if self.pocket_bottom < 0.0 {
            return invalid("KLAPPE_CUTOUT_BOTTOM_MM must not be negative".into());
        }
        if self.edge_radius < 0.0 || self.edge_radius >= self.pocket_depth {
            return invalid(format!(
                "edge radius {} must be below the pocket depth {}",
                self.edge_radius, self.pocket_depth
            ));
        }
        if self.pin_edge_radius <= 0.0
            || self.pin_edge_radius >= self.pin_radius
            || self.pin_edge_radius >= self.pin_length
        {
            return invalid(format!(
                "pin edge radius {} must be positive and below the pin radius {} and length {}",
                self.pin_edge_radius, self.pin_radius, self.pin_length
            ));
        }
        if self.pin_radius > self.holder_height / 2.0 || self.pin_radius > self.thickness / 2.0 {
            return invalid(format!(
                "pin radius {} does not fit the {} x {} holder",
                self.pin_radius, self.holder_height, self.thickness
            ));
        }
        Ok(())
    }

    fn pocket_floor_z(&self) -> f64 {
        self.thickness - self.pocket_depth
    }

    fn rib_height(&self) -> f64 {
        self.pocket_depth - self.edge_radius
    }

    /// Left edges of the ribs, evenly spaced across the pocket
    fn rib_positions(&self) -> Vec<f64> {
        let gap = (self.pocket_width - RIB_COUNT as f64 * RIB_WIDTH_MM) / (RIB_COUNT + 1) as f64;
        (0..RIB_COUNT)
            .map(|i| -self.pocket_width / 2.0 + gap + i as f64 * (RIB_WIDTH_MM + gap))
            .collect()
    }
}

pub struct Muldenklappe;

impl Model for Muldenklappe {
    fn name(&self) -> &'static str {
        "muldenklappe"
    }

    fn description(&self) -> &'static str {
        "Tailgate with pin holders, gussets, ribbed pocket and hinge pins"
    }

    fn parameters(&self) -> &'static [ParamDecl] {
        PARAMETERS
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError> {
        let d = Dims::read(ctx)?;
        let parts = ctx.parts("Muldenklappe");
        let (hw, hh) = (d.width / 2.0, d.height / 2.0);

        let plate = parts.cuboid(
            "plate",
            DVec3::new(-hw, -hh, 0.0),
            DVec3::new(d.width, d.height, d.thickness),
        )?;
        let pocket = parts.cutter(
            "pocket",
            Aabb::from_min_size(
                DVec3::new(-d.pocket_width / 2.0, -hh + d.pocket_bottom, d.pocket_floor_z()),
                DVec3::new(d.pocket_width, d.pocket_height, d.pocket_depth),
            ),
            &[BoxFace::MaxZ],
        )?;

        let mut supports = Vec::new();
        for x in [-hw, hw - d.holder_thickness] {
            supports.push(parts.cuboid(
                "holder",
                DVec3::new(x, hh - HOLDER_OVERLAP_MM, 0.0),
                DVec3::new(
                    d.holder_thickness,
                    d.holder_height + HOLDER_OVERLAP_MM,
                    d.thickness,
                ),
            )?);
        }
        for side in [-1.0, 1.0] {
            let x = side * (hw - d.holder_thickness);
            let gusset = Profile::polygon(&[
                DVec3::new(x, hh - HOLDER_OVERLAP_MM, 0.0),
                DVec3::new(x, hh + d.holder_height, 0.0),
                DVec3::new(x - side * d.holder_height, hh - HOLDER_OVERLAP_MM, 0.0),
            ]);
            supports.push(parts.extrude("gusset", &gusset, DVec3::Z * d.thickness)?);
        }

        let mut body = Body::new(ctx.kernel, "Muldenklappe", plate)
            .cut(pocket, "pocket")?
            .fuse_all(supports, "holder or gusset")?
            .round(&corner_batch(&d))?;
        for batch in edge_batches(&d) {
            body = body.round(&batch)?;
        }

        let ribs = d
            .rib_positions()
            .into_iter()
            .map(|x| {
                parts.sunk_box(
                    "rib",
                    DVec3::new(x, -hh + d.pocket_bottom, d.pocket_floor_z()),
                    DVec3::new(RIB_WIDTH_MM, d.pocket_height, d.rib_height()),
                    BoxFace::MinZ,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (i, rib) in ribs.into_iter().enumerate() {
            body = body.reinforce(rib, &format!("rib #{}", i + 1))?;
        }
        body = body.round(&rib_batch(&d))?;

        let pins = [
            pin(&parts, &d, DVec3::new(-hw, hh + d.holder_height / 2.0, d.thickness / 2.0), DVec3::NEG_X)?,
            pin(&parts, &d, DVec3::new(hw, hh + d.holder_height / 2.0, d.thickness / 2.0), DVec3::X)?,
        ];

        Ok(vec![body.add_details(pins, "pin")?.finish()])
    }
}

fn corner_batch(d: &Dims) -> RoundBatch {
    RoundBatch::new(
        "bottom corners",
        d.corner_radius,
        EdgeSelector::lines()
            .and(EdgeSelector::length(d.thickness, 0.01))
            .and(EdgeSelector::midpoint(
                Region::any().y(Interval::below(-d.height / 2.0 + 1.0)),
            )),
    )
}

/// Holder tops first, then the edge-radius groups one at a time
fn edge_batches(d: &Dims) -> Vec<RoundBatch> {
    let (hw, hh) = (d.width / 2.0, d.height / 2.0);
    let line = EdgeSelector::lines;
    let mid = EdgeSelector::midpoint;
    let at_plate_top = Interval::near(hh, 0.1);
    let above_plate = Interval::above(hh - 0.1);
    let inner = |limit: f64| Interval::between(-limit, limit);

    vec![
        RoundBatch::new(
            "holder tops",
            d.holder_radius,
            line()
                .and(EdgeSelector::length(d.holder_thickness, 0.01))
                .and(mid(Region::any().y(Interval::near(hh + d.holder_height, 0.1)))),
        ),
        RoundBatch::new(
            "bottom edge",
            d.edge_radius,
            line()
                .and(EdgeSelector::length(d.width, 0.01))
                .and(mid(Region::any().y(Interval::near(-hh, 0.1)))),
        ),
        RoundBatch::new(
            "holder outer edges",
            d.edge_radius,
            line()
                .and(EdgeSelector::parallel(Axis::Y))
                .and(mid(Region::any().y(above_plate)))
                .and(
                    mid(Region::any().x(Interval::near(-hw, 0.1)))
                        .or(mid(Region::any().x(Interval::near(hw, 0.1)))),
                ),
        ),
        RoundBatch::new(
            "plate top corners",
            d.edge_radius,
            line()
                .and(EdgeSelector::length(d.thickness, 0.01))
                .and(mid(Region::any()
                    .y(at_plate_top)
                    .x(inner(hw - d.holder_thickness - 0.1)))),
        ),
        RoundBatch::new(
            "plate top edge",
            d.edge_radius,
            line()
                .and(EdgeSelector::parallel(Axis::X))
                .and(mid(Region::any()
                    .y(at_plate_top)
                    .x(inner(hw - d.holder_thickness - d.holder_height - 0.1)))),
        ),
        RoundBatch::new(
            "gusset diagonals",
            d.edge_radius,
            line()
                .and(EdgeSelector::length(SQRT_2 * d.holder_height, 0.2))
                .and(mid(Region::any().y(above_plate))),
        ),
        RoundBatch::new(
            "pocket rim",
            d.edge_radius,
            line()
                .and(mid(Region::any().z(Interval::near(d.thickness, 0.1))))
                .and(
                    EdgeSelector::length(d.pocket_width, 0.1)
                        .or(EdgeSelector::length(d.pocket_height, 0.1)),
                ),
        ),
    ]
}

/// Long top edges of the ribs
fn rib_batch(d: &Dims) -> RoundBatch {
    let rib_top = d.pocket_floor_z() + d.rib_height();
    let sides = d
        .rib_positions()
        .into_iter()
        .flat_map(|x| [x, x + RIB_WIDTH_MM])
        .map(|x| EdgeSelector::midpoint(Region::any().x(Interval::near(x, 0.1))))
        .collect();
    RoundBatch::new(
        "rib tops",
        d.edge_radius,
        EdgeSelector::lines()
            .and(EdgeSelector::length(d.pocket_height, 0.1))
            .and(EdgeSelector::midpoint(Region::any().z(Interval::near(rib_top, 0.1))))
            .and(EdgeSelector::Any(sides)),
    )
}

/// Hinge pin: shaft, rounded rim and a narrower tip, pointing along `outward`
/// from the holder face at `start`
fn pin(parts: &Parts, d: &Dims, start: DVec3, outward: DVec3) -> Result<Solid, BuildError> {
    let clearance = parts.clearance();
    let shaft_length = d.pin_length - d.pin_edge_radius;
    let base = clearance.sink(start, -outward);
    let shaft = parts.cylinder(
        "pin shaft",
        Axis3D::new(base, outward),
        d.pin_radius,
        shaft_length + clearance.mm(),
    )?;

    let end = start + outward * shaft_length;
    let rim = parts.torus(
        "pin rim",
        Axis3D::new(end, outward),
        d.pin_radius - d.pin_edge_radius,
        d.pin_edge_radius,
    )?;
    let tip = parts.cylinder(
        "pin tip",
        Axis3D::new(end, outward),
        d.pin_tip_radius,
        d.pin_edge_radius,
    )?;

    let shaft = parts.combine("pin rim", shaft, rim)?;
    Ok(parts.combine("pin tip", shaft, tip)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MapSource, resolve};
    use crate::settings::BuildSettings;
    use approx::assert_relative_eq;
    use pf_cad::{CadKernel, MockKernel};

    fn build(kernel: &MockKernel, overrides: MapSource) -> Result<Vec<NamedSolid>, BuildError> {
        let params = resolve(PARAMETERS, &overrides)?;
        let settings = BuildSettings::default();
        Muldenklappe.build(&BuildContext {
            kernel,
            params: &params,
            settings: &settings,
        })
    }

    fn defaults() -> Dims {
        let params = resolve(PARAMETERS, &MapSource::default()).unwrap();
        let settings = BuildSettings::default();
        let kernel = MockKernel::new();
        Dims::read(&BuildContext {
            kernel: &kernel,
            params: &params,
            settings: &settings,
        })
        .unwrap()
    }

    #[test]
    fn test_default_dimensions() {
        let d = defaults();
        assert_relative_eq!(d.pocket_depth, 6.5);
        assert_relative_eq!(d.pocket_width, 112.0);
        assert_relative_eq!(d.pocket_height, 47.0);
        assert_relative_eq!(d.rib_height(), 5.5);

        let ribs = d.rib_positions();
        assert_eq!(ribs.len(), 3);
        // gaps of 20.5 between ribs and the pocket walls
        assert_relative_eq!(ribs[0], -56.0 + 20.5);
        assert_relative_eq!(ribs[1] - ribs[0], 30.5);
    }

    #[test]
    fn test_default_build() {
        let kernel = MockKernel::new();
        let solids = build(&kernel, MapSource::default()).unwrap();
        assert_eq!(solids.len(), 1);
        assert_eq!(solids[0].name, "Muldenklappe");

        let bbox = kernel.properties(&solids[0].solid).unwrap().bbox;
        // pins reach pin length beyond the side walls
        assert_relative_eq!(bbox.min.x, -72.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.x, 72.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.min.y, -33.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.y, 41.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.z, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_batches_are_line_only() {
        let d = defaults();
        let mut batches = vec![corner_batch(&d), rib_batch(&d)];
        batches.extend(edge_batches(&d));
        for batch in batches {
            match &batch.selector {
                EdgeSelector::All(all) => {
                    assert_eq!(all[0], EdgeSelector::lines(), "{}", batch.label)
                }
                other => panic!("{}: unexpected selector {:?}", batch.label, other),
            }
        }
    }

    #[test]
    fn test_corner_batch_picks_bottom_corners() {
        let kernel = MockKernel::new();
        let d = defaults();
        let plate = kernel
            .create_box(DVec3::new(-66.0, -33.0, 0.0), DVec3::new(132.0, 66.0, 8.0))
            .unwrap();
        let edges = kernel.get_edges(&plate).unwrap();
        let picked = corner_batch(&d).selector.select(&edges);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|e| e.midpoint.y < -32.0));
    }

    #[test]
    fn test_pocket_rim_is_rounded() {
        let kernel = MockKernel::new();
        let d = defaults();
        let solids = build(&kernel, MapSource::default()).unwrap();
        let edges = kernel.get_edges(&solids[0].solid).unwrap();
        let at_face = |e: &&pf_cad::EdgeInfo| (e.midpoint.z - d.thickness).abs() < 1e-9;

        // the pocket opens through the outer face and leaves its rim there
        let rounded_rim = edges
            .iter()
            .filter(at_face)
            .filter(|e| e.kind == pf_cad::CurveKind::Arc)
            .filter(|e| (e.length - d.pocket_width).abs() < 1e-9)
            .count();
        assert_eq!(rounded_rim, 4);
        assert!(edges.iter().all(|e| e.midpoint.z <= d.thickness + 1e-9));
    }

    #[test]
    fn test_thin_plate_rejected() {
        let kernel = MockKernel::new();
        assert!(matches!(
            build(&kernel, MapSource::new("env").with("KLAPPE_THICKNESS_MM", "1.5")),
            Err(BuildError::Invalid(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let volumes: Vec<f64> = (0..2)
            .map(|_| {
                let kernel = MockKernel::new();
                let solids = build(&kernel, MapSource::default()).unwrap();
                kernel.properties(&solids[0].solid).unwrap().volume
            })
            .collect();
        assert_eq!(volumes[0], volumes[1]);
    }
}

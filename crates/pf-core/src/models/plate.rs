//! Flat rectangular plate with optional rounded vertical corners

use glam::DVec3;
use pf_cad::{Axis, Body, EdgeSelector, NamedSolid, RoundBatch};

use super::{BuildContext, BuildError, Model};
use crate::params::ParamDecl;

const PARAMETERS: &[ParamDecl] = &[
    ParamDecl::float("PLATE_WIDTH_MM", 100.0, "Plate size along X"),
    ParamDecl::float("PLATE_HEIGHT_MM", 50.0, "Plate size along Y"),
    ParamDecl::float("PLATE_THICKNESS_MM", 3.0, "Plate thickness along Z"),
    ParamDecl::float(
        "PLATE_CORNER_RADIUS_MM",
        0.0,
        "Radius of the four vertical corner edges, 0 keeps them sharp",
    ),
];

/// Box from the origin with width × height × thickness
pub struct Plate;

impl Model for Plate {
    fn name(&self) -> &'static str {
        "plate"
    }

    fn description(&self) -> &'static str {
        "Rectangular plate"
    }

    fn parameters(&self) -> &'static [ParamDecl] {
        PARAMETERS
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError> {
        let [width, height, thickness] =
            ctx.positive(["PLATE_WIDTH_MM", "PLATE_HEIGHT_MM", "PLATE_THICKNESS_MM"])?;
        let [corner_radius] = ctx.non_negative(["PLATE_CORNER_RADIUS_MM"])?;
        if corner_radius * 2.0 >= width.min(height) {
            return Err(BuildError::Invalid(format!(
                "corner radius {} does not fit a {} x {} plate",
                corner_radius, width, height
            )));
        }

        let parts = ctx.parts("Plate");
        let slab = parts.cuboid("slab", DVec3::ZERO, DVec3::new(width, height, thickness))?;

        let corners = RoundBatch::new(
            "corners",
            corner_radius,
            EdgeSelector::lines()
                .and(EdgeSelector::parallel(Axis::Z))
                .and(EdgeSelector::length(thickness, 0.01)),
        );
        let plate = Body::new(ctx.kernel, "Plate", slab).round(&corners)?.finish();

        Ok(vec![plate])
    }
}

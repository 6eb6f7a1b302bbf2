//! Insert panel for small-parts boxes
//!
//! A thin plate with rounded bottom corners, centred on the origin in X and
//! Y and on its mid-plane in Z. Reinforcing rims and grip ridges sit on the
//! upper face.

use std::f64::consts::FRAC_1_SQRT_2;

use glam::DVec3;
use pf_cad::{Body, BoxFace, NamedSolid, Profile, Solid};

use super::{BuildContext, BuildError, Model, Parts};
use crate::params::ParamDecl;

const PARAMETERS: &[ParamDecl] = &[
    ParamDecl::float("EINSCHUB_WIDTH_MM", 52.0, "Panel width (X)"),
    ParamDecl::float("EINSCHUB_HEIGHT_MM", 46.0, "Panel height (Y)"),
    ParamDecl::float("EINSCHUB_THICKNESS_MM", 1.0, "Panel thickness (Z)"),
    ParamDecl::float("EINSCHUB_CORNER_RADIUS_MM", 6.0, "Radius of the two bottom corners"),
    ParamDecl::float("EINSCHUB_RIM_THICKNESS_MM", 2.5, "Total thickness at the rims"),
    ParamDecl::float("EINSCHUB_RIM_WIDTH_MM", 0.6, "Width of the rims"),
    ParamDecl::int("EINSCHUB_RIM_TOP", 1, "Top rim on (1) or off (0)"),
    ParamDecl::float(
        "EINSCHUB_RIM_SIDES_PERCENT",
        50.0,
        "Length of the side rims from the top edge, in percent of the height",
    ),
];

const GRIP_WIDTHS: [f64; 3] = [20.0, 17.5, 15.0];
const GRIP_HEIGHT: f64 = 0.5;
const GRIP_THICKNESS: f64 = 1.0;
const GRIP_SPACING: f64 = 2.5;

pub struct KleinteileEinschub;

impl Model for KleinteileEinschub {
    fn name(&self) -> &'static str {
        "kleinteile_einschub"
    }

    fn description(&self) -> &'static str {
        "Insert panel for small-parts boxes with rims and grip ridges"
    }

    fn parameters(&self) -> &'static [ParamDecl] {
        PARAMETERS
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError> {
        let [width, height, thickness] = ctx.positive([
            "EINSCHUB_WIDTH_MM",
            "EINSCHUB_HEIGHT_MM",
            "EINSCHUB_THICKNESS_MM",
        ])?;
        let corner_radius = ctx.params.float("EINSCHUB_CORNER_RADIUS_MM")?;
        let rim_thickness = ctx.params.float("EINSCHUB_RIM_THICKNESS_MM")?;
        let rim_width = ctx.params.float("EINSCHUB_RIM_WIDTH_MM")?;
        let rim_top = ctx.params.flag("EINSCHUB_RIM_TOP")?;
        let rim_sides_percent = ctx.params.float("EINSCHUB_RIM_SIDES_PERCENT")?;

        if corner_radius < 0.0 || corner_radius * 2.0 >= width || corner_radius >= height {
            return Err(BuildError::Invalid(format!(
                "corner radius {} does not fit a {} x {} panel",
                corner_radius, width, height
            )));
        }
        if !(0.0..=100.0).contains(&rim_sides_percent) {
            return Err(BuildError::Invalid(format!(
                "EINSCHUB_RIM_SIDES_PERCENT must be within 0..=100, got {}",
                rim_sides_percent
            )));
        }

        let parts = ctx.parts("Einschub");
        let z_top = thickness / 2.0;
        let panel = parts.extrude(
            "panel",
            &panel_profile(width, height, corner_radius, -z_top),
            DVec3::Z * thickness,
        )?;

        let mut rims = Vec::new();
        let rim_extra = rim_thickness - thickness;
        if rim_extra > 0.0 && rim_width > 0.0 {
            if rim_top {
                rims.push(parts.sunk_box(
                    "top rim",
                    DVec3::new(-width / 2.0, height / 2.0 - rim_width, z_top),
                    DVec3::new(width, rim_width, rim_extra),
                    BoxFace::MinZ,
                )?);
            }
            if rim_sides_percent > 0.0 {
                let side_length = height * rim_sides_percent / 100.0;
                for x in [-width / 2.0, width / 2.0 - rim_width] {
                    rims.push(side_rim(
                        &parts,
                        DVec3::new(x, height / 2.0 - side_length, z_top),
                        side_length,
                        rim_extra,
                        rim_width,
                    )?);
                }
            }
        }

        let mut grips = Vec::new();
        let mut y = height / 2.0 - GRIP_SPACING - GRIP_THICKNESS;
        for grip_width in GRIP_WIDTHS {
            grips.push(parts.sunk_box(
                "grip",
                DVec3::new(-grip_width / 2.0, y, z_top),
                DVec3::new(grip_width, GRIP_THICKNESS, GRIP_HEIGHT),
                BoxFace::MinZ,
            )?);
            y -= GRIP_THICKNESS + GRIP_SPACING;
        }

        let einschub = Body::new(ctx.kernel, "Einschub", panel)
            .fuse_all(rims, "rim")?
            .fuse_all(grips, "grip")?
            .finish();
        Ok(vec![einschub])
    }
}

/// Outline with rounded bottom corners in the plane `z`
fn panel_profile(width: f64, height: f64, r: f64, z: f64) -> Profile {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let p = |x: f64, y: f64| DVec3::new(x, y, z);
    if r <= 0.0 {
        return Profile::polygon(&[p(-hw, -hh), p(hw, -hh), p(hw, hh), p(-hw, hh)]);
    }
    let bulge = r * (1.0 - FRAC_1_SQRT_2);
    Profile::new(p(-hw + r, -hh))
        .line_to(p(hw - r, -hh))
        .arc_to(p(hw - bulge, -hh + bulge), p(hw, -hh + r))
        .line_to(p(hw, hh))
        .line_to(p(-hw, hh))
        .line_to(p(-hw, -hh + r))
        .arc_to(p(-hw + bulge, -hh + bulge), p(-hw + r, -hh))
}

/// Side rim with a 45° ramp at its lower end, standing on the panel at
/// `origin` (lower end, outer edge, panel top)
fn side_rim(
    parts: &Parts,
    origin: DVec3,
    length: f64,
    rise: f64,
    width: f64,
) -> Result<Solid, BuildError> {
    let clearance = parts.clearance();
    let taper = rise.min(length);
    let at = |y: f64, z: f64| origin + DVec3::new(0.0, y, z);

    let mut points = vec![clearance.sink(at(0.0, 0.0), DVec3::NEG_Z), at(taper, rise)];
    if taper < length {
        points.push(at(length, rise));
    }
    points.push(clearance.sink(at(length, 0.0), DVec3::NEG_Z));

    Ok(parts.extrude("side rim", &Profile::polygon(&points), DVec3::X * width)?)
}

//! Three-armed clip that snaps onto a hexagonal GraviTrax tile
//!
//! The arms lie on the tile's top face (z = 0 up to the plate thickness)
//! and bend down over three alternate flats of the hexagon, where a wedge
//! hook grips the tile's lower edge. A centring cone points down through
//! the tile's middle.

use glam::DVec3;
use pf_cad::{Axis3D, Body, NamedSolid, Profile, Solid};

use super::{BuildContext, BuildError, Model, Parts};
use crate::params::ParamDecl;

const PARAMETERS: &[ParamDecl] = &[
    ParamDecl::float("HEX_FLAT_TO_FLAT_MM", 59.6, "Distance between opposite flats of the tile"),
    ParamDecl::float("THICKNESS_MM", 2.0, "Plate and leg thickness"),
    ParamDecl::float("ARM_WIDTH_MM", 10.0, "Arm width"),
    ParamDecl::float("OVERHANG_MM", 2.0, "Arm length beyond the flat"),
    ParamDecl::float("LEG_HEIGHT_MM", 10.0, "Leg length below the arm"),
    ParamDecl::float("HOOK_HEIGHT_MM", 2.0, "Height of the snap hook at the leg's foot"),
    ParamDecl::float("HOOK_DEPTH_MM", 2.0, "How far the hook reaches under the tile"),
    ParamDecl::float("CONSOLE_HEIGHT_MM", 2.0, "Height of the upper console"),
    ParamDecl::float("CONSOLE_DEPTH_MM", 4.0, "Depth of the upper console"),
    ParamDecl::float("HOOK_CONSOLE_GAP_MM", 9.0, "Gap between hook top and console"),
    ParamDecl::float("CONE_BASE_DIA_MM", 10.0, "Diameter of the centring cone at its base"),
    ParamDecl::float("CONE_TOP_DIA_MM", 5.0, "Diameter of the centring cone at its tip"),
    ParamDecl::float("CONE_HEIGHT_MM", 3.0, "Height of the centring cone"),
    ParamDecl::float(
        "CONE_EXTENSION_MM",
        10.0,
        "Cylinder between plate and cone, 0 puts the cone directly under the plate",
    ),
    ParamDecl::int("ENABLE_CONSOLE", 0, "Console above the hook on (1) or off (0)"),
    ParamDecl::float(
        "CORNER_CHAMFER_MM",
        2.5,
        "Chamfer outside and brace inside the arm-to-leg bend, 0 keeps it square",
    ),
];

const ARM_ANGLES_DEG: [f64; 3] = [0.0, 120.0, 240.0];

pub struct GravitraxLiftClip;

/// Dimensions of one arm, in the arm's own frame: x runs outward along
/// the arm, y across it, z up
struct ArmShape {
    flat: f64,
    thickness: f64,
    width: f64,
    overhang: f64,
    leg_height: f64,
    hook: Option<(f64, f64)>,
    /// Height, depth and bottom z of the console
    console: Option<(f64, f64, f64)>,
    chamfer: f64,
}

/// Rotation about Z mapping arm coordinates to world coordinates
#[derive(Debug, Clone, Copy)]
struct ArmFrame {
    cos: f64,
    sin: f64,
}

impl ArmFrame {
    fn new(angle_deg: f64) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        Self { cos, sin }
    }

    fn dir(&self, v: DVec3) -> DVec3 {
        DVec3::new(
            v.x * self.cos - v.y * self.sin,
            v.x * self.sin + v.y * self.cos,
            v.z,
        )
    }

    /// Point at `x` along the arm and height `z`, on the arm's -y side
    fn side(&self, x: f64, z: f64, width: f64) -> DVec3 {
        self.dir(DVec3::new(x, -width / 2.0, z))
    }

    /// Rectangle `x0..x1` across the full arm width at height `z`
    fn strip(&self, x0: f64, x1: f64, z: f64, width: f64) -> Profile {
        let hw = width / 2.0;
        Profile::polygon(&[
            self.dir(DVec3::new(x0, -hw, z)),
            self.dir(DVec3::new(x1, -hw, z)),
            self.dir(DVec3::new(x1, hw, z)),
            self.dir(DVec3::new(x0, hw, z)),
        ])
    }
}

impl Model for GravitraxLiftClip {
    fn name(&self) -> &'static str {
        "gravitrax_lift_clip"
    }

    fn description(&self) -> &'static str {
        "Three-armed snap clip with centring cone for hexagonal GraviTrax tiles"
    }

    fn parameters(&self) -> &'static [ParamDecl] {
        PARAMETERS
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError> {
        let [hex, thickness, width, leg_height, cone_base_dia, cone_height] = ctx.positive([
            "HEX_FLAT_TO_FLAT_MM",
            "THICKNESS_MM",
            "ARM_WIDTH_MM",
            "LEG_HEIGHT_MM",
            "CONE_BASE_DIA_MM",
            "CONE_HEIGHT_MM",
        ])?;
        let [
            overhang,
            hook_height,
            hook_depth,
            console_height,
            console_depth,
            gap,
            cone_top_dia,
            extension,
            chamfer,
        ] = ctx.non_negative([
            "OVERHANG_MM",
            "HOOK_HEIGHT_MM",
            "HOOK_DEPTH_MM",
            "CONSOLE_HEIGHT_MM",
            "CONSOLE_DEPTH_MM",
            "HOOK_CONSOLE_GAP_MM",
            "CONE_TOP_DIA_MM",
            "CONE_EXTENSION_MM",
            "CORNER_CHAMFER_MM",
        ])?;
        let console_on = ctx.params.flag("ENABLE_CONSOLE")?;

        let flat = hex / 2.0;
        if width >= flat {
            return Err(BuildError::Invalid(format!(
                "arm width {} leaves no room on a {} mm tile",
                width, hex
            )));
        }
        if chamfer >= leg_height.min(flat) {
            return Err(BuildError::Invalid(format!(
                "CORNER_CHAMFER_MM {} must stay below the leg height {}",
                chamfer, leg_height
            )));
        }
        if hook_height > leg_height {
            return Err(BuildError::Invalid(format!(
                "hook height {} exceeds the leg height {}",
                hook_height, leg_height
            )));
        }

        let shape = ArmShape {
            flat,
            thickness,
            width,
            overhang,
            leg_height,
            hook: (hook_height > 0.0 && hook_depth > 0.0).then_some((hook_height, hook_depth)),
            console: (console_on && console_height > 0.0 && console_depth > 0.0).then_some((
                console_height,
                console_depth,
                hook_height - leg_height + gap,
            )),
            chamfer,
        };

        let parts = ctx.parts("GravitraxLiftClip");
        let clearance = parts.clearance().mm();

        // Hub disc joining the arms
        let hub = parts.cylinder("hub", Axis3D::z(DVec3::ZERO), width, thickness)?;
        let arms = ARM_ANGLES_DEG
            .iter()
            .map(|&angle| arm(&parts, &shape, ArmFrame::new(angle)))
            .collect::<Result<Vec<_>, _>>()?;

        let cone_base_r = cone_base_dia / 2.0;
        let mut spigot = Vec::new();
        if extension > 0.0 {
            spigot.push(parts.cylinder(
                "extension",
                Axis3D::z(DVec3::new(0.0, 0.0, -extension)),
                cone_base_r,
                extension + clearance,
            )?);
        }
        // Sunk into the extension (or the hub) by the clearance, tip in place
        spigot.push(parts.cone(
            "cone",
            Axis3D::new(DVec3::new(0.0, 0.0, clearance - extension), DVec3::NEG_Z),
            cone_base_r,
            cone_top_dia / 2.0,
            cone_height + clearance,
        )?);

        let clip = Body::new(ctx.kernel, "GravitraxLiftClip", hub)
            .fuse_all(arms, "arm")?
            .fuse_all(spigot, "centring cone")?
            .finish();
        Ok(vec![clip])
    }
}

/// One L-shaped arm with hook, optional console and bend chamfer
fn arm(parts: &Parts, shape: &ArmShape, frame: ArmFrame) -> Result<Solid, BuildError> {
    let ArmShape {
        flat: d,
        thickness: t,
        width: w,
        ..
    } = *shape;
    let clearance = parts.clearance().mm();
    let across = frame.dir(DVec3::Y) * w;
    let inward = frame.dir(DVec3::X);

    let plate = parts.extrude(
        "arm",
        &frame.strip(0.0, d + shape.overhang, 0.0, w),
        DVec3::Z * t,
    )?;
    let leg = parts.extrude(
        "leg",
        &frame.strip(d, d + t, -shape.leg_height, w),
        DVec3::Z * (shape.leg_height + clearance),
    )?;
    let mut arm = parts.combine("arm", plate, leg)?;

    let foot = -shape.leg_height;
    if let Some((height, depth)) = shape.hook {
        let hook = parts.ledge(
            "hook",
            [
                frame.side(d, foot, w),
                frame.side(d - depth, foot + height / 2.0, w),
                frame.side(d, foot + height, w),
            ],
            inward,
            across,
        )?;
        arm = parts.combine("arm", arm, hook)?;
    }
    if let Some((height, depth, bottom)) = shape.console {
        let console = parts.ledge(
            "console",
            [
                frame.side(d, bottom, w),
                frame.side(d - depth, bottom, w),
                frame.side(d, bottom + height, w),
            ],
            inward,
            across,
        )?;
        arm = parts.combine("arm", arm, console)?;
    }

    if shape.chamfer > 0.0 {
        let c = shape.chamfer;
        // Outer bevel, grown along its own face past the arm top, leg face and sides
        let (x, z) = (d + t, t);
        let bevel = Profile::polygon(&[
            frame.dir(DVec3::new(x + clearance, -w / 2.0 - clearance, z + clearance)),
            frame.dir(DVec3::new(x - c - clearance, -w / 2.0 - clearance, z + clearance)),
            frame.dir(DVec3::new(x + clearance, -w / 2.0 - clearance, z - c - clearance)),
        ]);
        let bevel = parts.extrude(
            "bend chamfer",
            &bevel,
            frame.dir(DVec3::Y) * (w + 2.0 * clearance),
        )?;
        arm = parts.carve("arm", arm, bevel)?;

        let brace = parts.gusset(
            "bend brace",
            frame.side(d, 0.0, w),
            [-inward, DVec3::NEG_Z],
            c,
            across,
        )?;
        arm = parts.combine("arm", arm, brace)?;
    }
    Ok(arm)
}

//! Wall-mounted tablet holder
//!
//! Two mirrored corner holders grip the lower corners of a tablet: each
//! has a screw flange at the side and at the bottom, a side wall as high
//! as the tablet is thick, and a perforated back plate with two snap clips
//! pressing the tablet against the wall. A separate support beam per side
//! is printed lying down and glued behind the holder.
//!
//! Holder coordinates: x across the tablet, y up along its edge, z away
//! from the wall. The tablet's corner sits at the origin.

use glam::DVec3;
use pf_cad::{Aabb, Body, BoxFace, NamedSolid, Profile, ProfileSegment, Solid};

use super::{BuildContext, BuildError, Model, Parts};
use crate::params::ParamDecl;

const PARAMETERS: &[ParamDecl] = &[
    ParamDecl::float("TABLET_THICKNESS", 8.0, "Tablet thickness, also the side wall height"),
    ParamDecl::float("WALL_THICKNESS", 2.4, "Wall and plate thickness"),
    ParamDecl::float("HOLDER_WIDTH", 23.0, "Back plate width across the tablet"),
    ParamDecl::float("HOLDER_HEIGHT", 130.0, "Holder height along the tablet edge"),
    ParamDecl::float("SIDE_FLANGE_WIDTH", 9.0, "Screw flange beside the side wall"),
    ParamDecl::float("BOTTOM_FLANGE_WIDTH", 20.0, "Screw flange below the bottom"),
    ParamDecl::float("CLIP_WIDTH", 12.0, "Snap clip width"),
    ParamDecl::float("CLIP_LENGTH", 20.0, "Snap clip length"),
    ParamDecl::int("CLIP_NUB_RADIUS", 2, "Radius of the half-round nub at the clip tip"),
    ParamDecl::float("GUSSET_SIZE", 2.0, "Leg length of the corner braces, 0 leaves them out"),
    ParamDecl::float(
        "BOTTOM_EXTENSION",
        60.0,
        "Bottom shelf continued past the back plate, 0 ends it at the holder width",
    ),
    ParamDecl::float("BEAM_WIDTH", 10.0, "Support beam width"),
    ParamDecl::float("BEAM_HEIGHT_FRONT", 13.0, "Support beam height at the wall"),
    ParamDecl::float("BEAM_LENGTH", 80.0, "Support beam length away from the wall"),
    ParamDecl::float("BEAM_TILT_ANGLE", 15.0, "Upward tilt of the beam in degrees"),
    ParamDecl::float("CUTOUT_LEFT_Y", 0.0, "Left side wall cutout: start above the bottom"),
    ParamDecl::float("CUTOUT_LEFT_HEIGHT", 0.0, "Left side wall cutout: height, 0 for none"),
    ParamDecl::int(
        "CUTOUT_LEFT_THROUGH_FLANGE",
        0,
        "Left side wall cutout continues through the flange (1) or stops on it (0)",
    ),
    ParamDecl::float("CUTOUT_RIGHT_Y", 55.0, "Right side wall cutout: start above the bottom"),
    ParamDecl::float("CUTOUT_RIGHT_HEIGHT", 15.0, "Right side wall cutout: height, 0 for none"),
    ParamDecl::int(
        "CUTOUT_RIGHT_THROUGH_FLANGE",
        1,
        "Right side wall cutout continues through the flange (1) or stops on it (0)",
    ),
];

const HOLE_SIZE: f64 = 8.0;
const HOLE_PITCH: f64 = HOLE_SIZE + 4.0;
const HOLE_MARGIN: f64 = 5.0;
const CLIP_KEEP_OUT: f64 = 5.0;
const CLIP_GAP: f64 = 1.0;
const DIAGONAL_RISE: f64 = 15.0;
/// Offset of the right-hand copies
const RIGHT_OFFSET_X: f64 = 100.0;
/// Offset of the beams from their holders
const BEAM_OFFSET_Y: f64 = -50.0;

pub struct TabletHolder;

#[derive(Debug, Clone, Copy)]
struct Dims {
    tablet: f64,
    wall: f64,
    width: f64,
    height: f64,
    side_flange: f64,
    bottom_flange: f64,
    clip_width: f64,
    clip_length: f64,
    nub_radius: f64,
    gusset: f64,
    extension: f64,
    beam_width: f64,
    beam_front: f64,
    beam_length: f64,
    beam_tilt: f64,
}

impl Dims {
    fn bottom_width(&self) -> f64 {
        self.width + self.extension
    }

    fn clip_x(&self) -> f64 {
        (self.width - self.clip_width) / 2.0
    }

    /// Anchor heights of the upper and lower clip
    fn clip_anchors(&self) -> (f64, f64) {
        (self.height * 0.7, self.height * 0.3)
    }

    /// Beam top at distance `z` from the wall
    fn beam_top(&self, z: f64) -> f64 {
        let front = self.beam_front - self.bottom_flange;
        let back = self.wall + self.beam_tilt - self.bottom_flange;
        front + z / self.beam_length * (back - front)
    }
}

/// Side wall cutout, in holder coordinates
#[derive(Debug, Clone, Copy)]
struct Cutout {
    y: f64,
    height: f64,
    through_flange: bool,
}

/// Where a copy of a part ends up: optionally mirrored across the middle
/// of the bottom, then shifted
#[derive(Debug, Clone, Copy)]
struct Placement {
    mirror_at: Option<f64>,
    offset: DVec3,
}

impl Placement {
    fn point(&self, p: DVec3) -> DVec3 {
        let x = self.mirror_at.map_or(p.x, |m| 2.0 * m - p.x);
        DVec3::new(x, p.y, p.z) + self.offset
    }

    fn dir(&self, v: DVec3) -> DVec3 {
        if self.mirror_at.is_some() {
            DVec3::new(-v.x, v.y, v.z)
        } else {
            v
        }
    }

    fn face(&self, face: BoxFace) -> BoxFace {
        match (self.mirror_at, face) {
            (Some(_), BoxFace::MinX) => BoxFace::MaxX,
            (Some(_), BoxFace::MaxX) => BoxFace::MinX,
            _ => face,
        }
    }

    fn aabb(&self, min: DVec3, max: DVec3) -> Aabb {
        Aabb::new(self.point(min), self.point(max))
    }
}

/// Primitive factory working in holder coordinates
struct Placed<'p, 'k> {
    parts: &'p Parts<'k>,
    at: Placement,
}

impl Placed<'_, '_> {
    fn cuboid(&self, label: &str, min: DVec3, max: DVec3) -> Result<Solid, BuildError> {
        Ok(self.parts.aabb(label, self.at.aabb(min, max))?)
    }

    fn sunk(
        &self,
        label: &str,
        min: DVec3,
        max: DVec3,
        face: BoxFace,
    ) -> Result<Solid, BuildError> {
        let bbox = self
            .parts
            .clearance()
            .grow_box(self.at.aabb(min, max), self.at.face(face));
        Ok(self.parts.aabb(label, bbox)?)
    }

    fn cutter(
        &self,
        label: &str,
        min: DVec3,
        max: DVec3,
        faces: &[BoxFace],
    ) -> Result<Solid, BuildError> {
        let faces: Vec<BoxFace> = faces.iter().map(|f| self.at.face(*f)).collect();
        Ok(self.parts.cutter(label, self.at.aabb(min, max), &faces)?)
    }

    fn prism(&self, label: &str, profile: &Profile, length: DVec3) -> Result<Solid, BuildError> {
        let mapped = Profile {
            start: self.at.point(profile.start),
            segments: profile
                .segments
                .iter()
                .map(|seg| match *seg {
                    ProfileSegment::Line { to } => ProfileSegment::Line {
                        to: self.at.point(to),
                    },
                    ProfileSegment::Arc { through, to } => ProfileSegment::Arc {
                        through: self.at.point(through),
                        to: self.at.point(to),
                    },
                })
                .collect(),
        };
        Ok(self.parts.extrude(label, &mapped, self.at.dir(length))?)
    }

    fn gusset(
        &self,
        label: &str,
        corner: DVec3,
        [a, b]: [DVec3; 2],
        size: f64,
        length: DVec3,
    ) -> Result<Solid, BuildError> {
        Ok(self.parts.gusset(
            label,
            self.at.point(corner),
            [self.at.dir(a), self.at.dir(b)],
            size,
            self.at.dir(length),
        )?)
    }

    fn ledge(
        &self,
        label: &str,
        [from, apex, to]: [DVec3; 3],
        into: DVec3,
        length: DVec3,
    ) -> Result<Solid, BuildError> {
        Ok(self.parts.ledge(
            label,
            [self.at.point(from), self.at.point(apex), self.at.point(to)],
            self.at.dir(into),
            self.at.dir(length),
        )?)
    }
}

impl Model for TabletHolder {
    fn name(&self) -> &'static str {
        "tablet_holder"
    }

    fn description(&self) -> &'static str {
        "Mirrored pair of wall-mounted tablet corner holders with support beams"
    }

    fn parameters(&self) -> &'static [ParamDecl] {
        PARAMETERS
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError> {
        let dims = read_dims(ctx)?;
        let [left_y, left_height, right_y, right_height] = ctx.non_negative([
            "CUTOUT_LEFT_Y",
            "CUTOUT_LEFT_HEIGHT",
            "CUTOUT_RIGHT_Y",
            "CUTOUT_RIGHT_HEIGHT",
        ])?;
        let left = Cutout {
            y: left_y,
            height: left_height,
            through_flange: ctx.params.flag("CUTOUT_LEFT_THROUGH_FLANGE")?,
        };
        let right = Cutout {
            y: right_y,
            height: right_height,
            through_flange: ctx.params.flag("CUTOUT_RIGHT_THROUGH_FLANGE")?,
        };

        let plain = Placement {
            mirror_at: None,
            offset: DVec3::ZERO,
        };
        let mirrored = Placement {
            mirror_at: Some(dims.bottom_width() / 2.0),
            offset: DVec3::X * RIGHT_OFFSET_X,
        };
        let beam_shift = DVec3::Y * BEAM_OFFSET_Y;

        // Seen from the front the mirrored holder sits on the left
        Ok(vec![
            holder(ctx, "TabletHolder_Left", &dims, plain, right)?,
            holder(ctx, "TabletHolder_Right", &dims, mirrored, left)?,
            beam(
                ctx,
                "Beam_Left",
                &dims,
                Placement {
                    offset: plain.offset + beam_shift,
                    ..plain
                },
            )?,
            beam(
                ctx,
                "Beam_Right",
                &dims,
                Placement {
                    offset: mirrored.offset + beam_shift,
                    ..mirrored
                },
            )?,
        ])
    }
}

fn read_dims(ctx: &BuildContext) -> Result<Dims, BuildError> {
    let [
        tablet,
        wall,
        width,
        height,
        side_flange,
        bottom_flange,
        clip_width,
        clip_length,
        beam_width,
        beam_front,
        beam_length,
    ] = ctx.positive([
        "TABLET_THICKNESS",
        "WALL_THICKNESS",
        "HOLDER_WIDTH",
        "HOLDER_HEIGHT",
        "SIDE_FLANGE_WIDTH",
        "BOTTOM_FLANGE_WIDTH",
        "CLIP_WIDTH",
        "CLIP_LENGTH",
        "BEAM_WIDTH",
        "BEAM_HEIGHT_FRONT",
        "BEAM_LENGTH",
    ])?;
    let [gusset, extension, tilt_deg] =
        ctx.non_negative(["GUSSET_SIZE", "BOTTOM_EXTENSION", "BEAM_TILT_ANGLE"])?;
    let nub_radius = ctx.params.int("CLIP_NUB_RADIUS")?;

    if tilt_deg >= 90.0 {
        return Err(BuildError::Invalid(format!(
            "BEAM_TILT_ANGLE must stay below 90°, got {}",
            tilt_deg
        )));
    }
    if nub_radius < 0 || nub_radius as f64 * 2.0 > clip_length {
        return Err(BuildError::Invalid(format!(
            "CLIP_NUB_RADIUS {} does not fit a {} mm clip",
            nub_radius, clip_length
        )));
    }
    if beam_width > width {
        return Err(BuildError::Invalid(format!(
            "beam width {} exceeds the holder width {}",
            beam_width, width
        )));
    }
    if beam_length <= tablet + wall {
        return Err(BuildError::Invalid(format!(
            "BEAM_LENGTH {} must reach past the back plate at {}",
            beam_length,
            tablet + wall
        )));
    }
    if clip_width + 2.0 * CLIP_GAP >= width {
        return Err(BuildError::Invalid(format!(
            "clip width {} does not fit a {} mm back plate",
            clip_width, width
        )));
    }
    if height * 0.3 - clip_length - CLIP_GAP < wall
        || height * 0.7 + clip_length + 2.0 * CLIP_GAP > height
    {
        return Err(BuildError::Invalid(format!(
            "{} mm clips do not fit a {} mm holder",
            clip_length, height
        )));
    }

    Ok(Dims {
        tablet,
        wall,
        width,
        height,
        side_flange,
        bottom_flange,
        clip_width,
        clip_length,
        nub_radius: nub_radius as f64,
        gusset,
        extension,
        beam_width,
        beam_front,
        beam_length,
        beam_tilt: beam_length * tilt_deg.to_radians().tan(),
    })
}

/// Lower-left corners of the holes along one side of a plate
fn hole_starts(extent: f64) -> impl Iterator<Item = f64> {
    (0..)
        .map(|i| HOLE_MARGIN + i as f64 * HOLE_PITCH)
        .take_while(move |v| v + HOLE_SIZE <= extent - HOLE_MARGIN)
}

/// Lightening holes in the back plate, clear of the clips
fn back_plate_holes(dims: &Dims) -> Vec<(f64, f64)> {
    let clip_x = dims.clip_x();
    let (top, bottom) = dims.clip_anchors();
    let near_clips_x = |x: f64| {
        x < clip_x + dims.clip_width + CLIP_KEEP_OUT && x + HOLE_SIZE > clip_x - CLIP_KEEP_OUT
    };
    let near_top = |y: f64| {
        y < top + dims.clip_length + CLIP_KEEP_OUT && y + HOLE_SIZE > top - CLIP_KEEP_OUT
    };
    let near_bottom = |y: f64| {
        y < bottom + CLIP_KEEP_OUT && y + HOLE_SIZE > bottom - dims.clip_length - CLIP_KEEP_OUT
    };

    hole_starts(dims.height)
        .flat_map(|y| hole_starts(dims.width).map(move |x| (x, y)))
        .filter(|&(x, y)| !(near_clips_x(x) && (near_top(y) || near_bottom(y))))
        .collect()
}

/// One corner holder
fn holder(
    ctx: &BuildContext,
    name: &str,
    dims: &Dims,
    at: Placement,
    cutout: Cutout,
) -> Result<NamedSolid, BuildError> {
    let parts = ctx.parts(name);
    let placed = Placed { parts: &parts, at };
    let Dims {
        tablet: s,
        wall: t,
        width: w,
        height: h,
        ..
    } = *dims;
    let v = DVec3::new;
    let outer = -dims.side_flange - t;
    let bottom_width = dims.bottom_width();

    let mut pieces = vec![
        placed.cuboid("flange", v(outer, 0.0, 0.0), v(-t, h, t))?,
        placed.cuboid("side wall", v(-t, 0.0, 0.0), v(0.0, h, s + t))?,
        placed.cuboid("back plate", v(0.0, 0.0, s), v(w, h, s + t))?,
        placed.sunk(
            "bottom flange",
            v(0.0, -dims.bottom_flange, 0.0),
            v(bottom_width, 0.0, t),
            BoxFace::MaxY,
        )?,
    ];
    if dims.extension > 0.0 {
        pieces.push(placed.cuboid(
            "shelf back plate",
            v(w, 0.0, s),
            v(bottom_width, w, s + t),
        )?);
    }
    if dims.gusset > 0.0 {
        let g = dims.gusset;
        pieces.extend([
            placed.gusset(
                "flange brace",
                v(-t, 0.0, t),
                [DVec3::NEG_X, DVec3::Z],
                g,
                DVec3::Y * h,
            )?,
            placed.gusset(
                "back plate brace",
                v(0.0, 0.0, s),
                [DVec3::X, DVec3::NEG_Z],
                g,
                DVec3::Y * h,
            )?,
            placed.gusset(
                "bottom flange brace",
                v(0.0, 0.0, t),
                [DVec3::NEG_Y, DVec3::Z],
                g,
                DVec3::X * bottom_width,
            )?,
            placed.gusset(
                "shelf brace",
                v(0.0, t, s),
                [DVec3::Y, DVec3::NEG_Z],
                g,
                DVec3::X * bottom_width,
            )?,
        ]);
    }
    // The bottom spans flange to shelf end so every other piece overlaps it
    let bottom = placed.cuboid("bottom", v(outer, 0.0, 0.0), v(bottom_width, t, s + t))?;
    let frame = pieces
        .into_iter()
        .try_fold(bottom, |frame, piece| parts.combine("frame", frame, piece))?;

    let hole_z = (s - t, s + 2.0 * t);
    let mut holes = Vec::new();
    for (x, y) in back_plate_holes(dims) {
        holes.push(placed.cuboid(
            "hole",
            v(x, y, hole_z.0),
            v(x + HOLE_SIZE, y + HOLE_SIZE, hole_z.1),
        )?);
    }
    if dims.extension > 0.0 {
        for y in hole_starts(w) {
            for x in hole_starts(dims.extension) {
                holes.push(placed.cuboid(
                    "hole",
                    v(w + x, y, hole_z.0),
                    v(w + x + HOLE_SIZE, y + HOLE_SIZE, hole_z.1),
                )?);
            }
        }
    }

    let clip_x = dims.clip_x();
    let (top, bottom) = dims.clip_anchors();
    let (cw, cl) = (dims.clip_width, dims.clip_length);
    let slots = [
        placed.cuboid(
            "upper clip slot",
            v(clip_x - CLIP_GAP, top + CLIP_GAP, hole_z.0),
            v(clip_x + cw + CLIP_GAP, top + cl + 2.0 * CLIP_GAP, hole_z.1),
        )?,
        placed.cuboid(
            "lower clip slot",
            v(clip_x - CLIP_GAP, bottom - cl - CLIP_GAP, hole_z.0),
            v(clip_x + cw + CLIP_GAP, bottom, hole_z.1),
        )?,
    ];

    let mut side_cut = Vec::new();
    if cutout.height > 0.0 {
        let extra = if cutout.through_flange { dims.side_flange } else { 0.0 };
        let floor = if cutout.through_flange { 0.0 } else { t };
        let faces: &[BoxFace] = if cutout.through_flange {
            &[BoxFace::MinX, BoxFace::MinZ]
        } else {
            &[BoxFace::MinX]
        };
        side_cut.push(placed.cutter(
            "side cutout",
            v(-t - dims.gusset - extra, t + cutout.y, floor),
            v(dims.gusset, t + cutout.y + cutout.height, s + 2.0 * t),
            faces,
        )?);
    }

    let r = dims.nub_radius;
    let clips = [
        clip(&placed, dims, v(clip_x, top, s), top + cl - r, BoxFace::MinY)?,
        clip(&placed, dims, v(clip_x, bottom - cl, s), bottom - cl + r, BoxFace::MaxY)?,
    ];

    Ok(Body::new(ctx.kernel, name, frame)
        .cut_all(holes, "lightening hole")?
        .cut_all(slots, "clip slot")?
        .cut_all(side_cut, "side cutout")?
        .fuse_all(clips, "clip")?
        .finish())
}

/// Flat spring clip in the back plate, anchored through `anchor`, with a
/// half-round nub centred at `nub_y` pressing towards the tablet
fn clip(
    placed: &Placed,
    dims: &Dims,
    min: DVec3,
    nub_y: f64,
    anchor: BoxFace,
) -> Result<Solid, BuildError> {
    let size = DVec3::new(dims.clip_width, dims.clip_length, dims.wall);
    let tongue = placed.sunk("clip", min, min + size, anchor)?;
    let r = dims.nub_radius;
    if r <= 0.0 {
        return Ok(tongue);
    }

    let z = min.z;
    let sink = placed.parts.clearance().mm();
    let at = |y: f64, z: f64| DVec3::new(min.x, y, z);
    let mut nub = Profile::new(at(nub_y - r, z)).arc_to(at(nub_y, z - r), at(nub_y + r, z));
    if sink > 0.0 {
        nub = nub.line_to(at(nub_y + r, z + sink)).line_to(at(nub_y - r, z + sink));
    }
    let nub = placed.prism("clip nub", &nub, DVec3::X * dims.clip_width)?;
    Ok(placed.parts.combine("clip", tongue, nub)?)
}

/// Support beam with its diagonal strut and glue block, trimmed to the
/// holder's outline so it fits flush behind it
fn beam(
    ctx: &BuildContext,
    name: &str,
    dims: &Dims,
    at: Placement,
) -> Result<NamedSolid, BuildError> {
    let parts = ctx.parts(name);
    let placed = Placed { parts: &parts, at };
    let Dims {
        tablet: s,
        wall: t,
        width: w,
        height: h,
        beam_width: bw,
        beam_length: l,
        ..
    } = *dims;
    let v = DVec3::new;
    let x0 = w - bw;
    let y0 = -dims.bottom_flange;
    let clearance = parts.clearance().mm();

    let side = Profile::polygon(&[
        v(x0, y0, 0.0),
        v(x0, y0 + dims.beam_front, 0.0),
        v(x0, y0 + t + dims.beam_tilt, l),
        v(x0, y0 + dims.beam_tilt, l),
    ]);
    let wedge = placed.prism("beam", &side, DVec3::X * bw)?;

    let front = s + t;
    let strut = placed.ledge(
        "diagonal strut",
        [
            v(w - t, dims.beam_top(front), front),
            v(w - t, dims.beam_top(front) + DIAGONAL_RISE, front),
            v(w - t, dims.beam_top(l), l),
        ],
        DVec3::NEG_Y,
        DVec3::X * t,
    )?;
    let glue = placed.cuboid(
        "glue block",
        v(x0, dims.beam_top(front) - dims.beam_front / 2.0, 0.0),
        v(w, dims.beam_top(front) + DIAGONAL_RISE, front + t),
    )?;
    let brace = parts.combine("strut", strut, glue)?;
    let blank = parts.combine("beam", wedge, brace)?;

    // Everything the holder occupies behind and below its back plate
    let mut trims = vec![
        placed.cutter(
            "holder column",
            v(x0, 0.0, 0.0),
            v(w, h, s + t),
            &[BoxFace::MinX, BoxFace::MaxX, BoxFace::MinZ],
        )?,
        placed.cutter(
            "bottom flange",
            v(x0, y0, 0.0),
            v(w, 0.0, t),
            &[BoxFace::MinX, BoxFace::MaxX, BoxFace::MinY, BoxFace::MinZ],
        )?,
    ];
    if dims.gusset > 0.0 {
        // Bottom flange brace, grown along its slope into the trimmed space
        let (g, c) = (dims.gusset, clearance);
        let brace = Profile::polygon(&[
            v(x0 - c, c, t - c),
            v(x0 - c, -g - c, t - c),
            v(x0 - c, c, t + g + c),
        ]);
        trims.push(placed.prism("bottom flange brace", &brace, DVec3::X * (bw + 2.0 * c))?);
    }

    Ok(Body::new(ctx.kernel, name, blank)
        .cut_all(trims, "holder trim")?
        .finish())
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
        TabletHolder.build(&BuildContext {
            kernel,
            params: &params,
            settings: &settings,
        })
    }

    fn defaults() -> Dims {
        let kernel = MockKernel::new();
        let params = resolve(PARAMETERS, &MapSource::default()).unwrap();
        let settings = BuildSettings::default();
        read_dims(&BuildContext {
            kernel: &kernel,
            params: &params,
            settings: &settings,
        })
        .unwrap()
    }

    #[test]
    fn test_builds_four_named_parts() {
        let kernel = MockKernel::new();
        let solids = build(&kernel, MapSource::default()).unwrap();
        let names: Vec<_> = solids.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["TabletHolder_Left", "TabletHolder_Right", "Beam_Left", "Beam_Right"]
        );
        for named in &solids {
            kernel.check(&named.solid).unwrap();
        }
    }

    #[test]
    fn test_right_parts_are_mirrored_and_shifted() {
        let kernel = MockKernel::new();
        let solids = build(&kernel, MapSource::default()).unwrap();
        let bbox = |i: usize| kernel.properties(&solids[i].solid).unwrap().bbox;

        let left = bbox(0);
        assert_relative_eq!(left.min.x, -11.4, epsilon = 1e-9);
        assert_relative_eq!(left.max.x, 83.0, epsilon = 1e-9);
        let right = bbox(1);
        assert_relative_eq!(right.min.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(right.max.x, 194.4, epsilon = 1e-9);
        assert_relative_eq!(right.size().y, left.size().y, epsilon = 1e-9);

        let beam_left = bbox(2);
        assert_relative_eq!(beam_left.min.x, 13.0, epsilon = 1e-9);
        assert_relative_eq!(beam_left.max.x, 23.0, epsilon = 1e-9);
        assert_relative_eq!(beam_left.min.y, -70.0, epsilon = 1e-9);
        assert_relative_eq!(beam_left.max.z, 80.0, epsilon = 1e-9);
        let beam_right = bbox(3);
        assert_relative_eq!(beam_right.min.x, 160.0, epsilon = 1e-9);
        assert_relative_eq!(beam_right.max.x, 170.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hole_grid_keeps_clear_of_clips() {
        let dims = defaults();
        assert_eq!(hole_starts(23.0).collect::<Vec<_>>(), [5.0]);
        assert_eq!(hole_starts(130.0).count(), 10);
        let rows: Vec<f64> = back_plate_holes(&dims).iter().map(|&(_, y)| y).collect();
        assert_eq!(rows, [5.0, 53.0, 65.0, 77.0]);
    }

    #[test]
    fn test_side_cutout_follows_its_side() {
        let kernel = MockKernel::new();
        let volumes = |overrides: MapSource| {
            let solids = build(&kernel, overrides).unwrap();
            let volume = |i: usize| kernel.properties(&solids[i].solid).unwrap().volume;
            (volume(0), volume(1))
        };

        // only the right-hand cutout is set by default, it lands in the left holder
        let (left, right) = volumes(MapSource::default());
        assert!(left < right);

        let (left, right) = volumes(
            MapSource::new("env")
                .with("CUTOUT_RIGHT_HEIGHT", "0")
                .with("CUTOUT_LEFT_HEIGHT", "15"),
        );
        assert!(right < left);

        let (left, right) = volumes(MapSource::new("env").with("CUTOUT_RIGHT_HEIGHT", "0"));
        assert_relative_eq!(left, right, epsilon = 1e-6);
    }

    #[test]
    fn test_beam_top_rises_with_tilt() {
        let dims = defaults();
        assert_relative_eq!(dims.beam_top(0.0), -7.0, epsilon = 1e-12);
        let back = -20.0 + 2.4 + 80.0 * 15f64.to_radians().tan();
        assert_relative_eq!(dims.beam_top(80.0), back, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_vertical_beam() {
        let kernel = MockKernel::new();
        assert!(matches!(
            build(&kernel, MapSource::new("env").with("BEAM_TILT_ANGLE", "90")),
            Err(BuildError::Invalid(_))
        ));
    }

    #[test]
    fn test_without_extension_or_gussets() {
        let kernel = MockKernel::new();
        let solids = build(
            &kernel,
            MapSource::new("env")
                .with("BOTTOM_EXTENSION", "0")
                .with("GUSSET_SIZE", "0")
                .with("CLIP_NUB_RADIUS", "0"),
        )
        .unwrap();
        let left = kernel.properties(&solids[0].solid).unwrap().bbox;
        assert_relative_eq!(left.max.x, 23.0, epsilon = 1e-9);
    }
}

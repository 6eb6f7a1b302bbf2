//! LED matrix diffuser
//!
//! Three separately printed solids: a thin diffuser sheet, a grid of light
//! compartments standing on it, and an outer wall that clips the LED PCB
//! in place. Several LED modules can be tiled in X and Y.

use glam::DVec3;
use pf_cad::{Aabb, Axis3D, Body, BoxFace, NamedSolid, Profile, Solid};

use super::{BuildContext, BuildError, Model, Parts};
use crate::params::ParamDecl;

const PARAMETERS: &[ParamDecl] = &[
    ParamDecl::float("DIFFUSER_PANEL_SIZE_X_MM", 66.0, "LED panel size along X"),
    ParamDecl::float("DIFFUSER_PANEL_SIZE_Y_MM", 67.0, "LED panel size along Y"),
    ParamDecl::float("DIFFUSER_LAYER_HEIGHT_MM", 0.16, "Print layer height"),
    ParamDecl::int("DIFFUSER_BASE_LAYERS", 2, "Layers in the diffuser sheet"),
    ParamDecl::float("DIFFUSER_GRID_WALL_THICKNESS_MM", 1.0, "Grid wall thickness"),
    ParamDecl::float("DIFFUSER_GRID_HEIGHT_MM", 6.0, "Grid wall height"),
    ParamDecl::float("DIFFUSER_OUTER_WALL_THICKNESS_MM", 1.0, "Outer wall thickness"),
    ParamDecl::float("DIFFUSER_PCB_THICKNESS_MM", 1.6, "LED PCB thickness"),
    ParamDecl::float("DIFFUSER_PCB_CLIP_HEIGHT_MM", 1.0, "Clip height above the PCB"),
    ParamDecl::float("DIFFUSER_PCB_CLIP_WIDTH_MM", 5.0, "Width of a clip tongue"),
    ParamDecl::float("DIFFUSER_PCB_CLIP_DEPTH_MM", 0.5, "How far the clip wedge reaches inwards"),
    ParamDecl::int("DIFFUSER_PCB_CLIP_COUNT_X", 4, "Clips on each X-parallel side"),
    ParamDecl::int("DIFFUSER_PCB_CLIP_COUNT_Y", 0, "Clips on each Y-parallel side"),
    ParamDecl::int("DIFFUSER_LED_MATRIX_X", 8, "LEDs per module along X"),
    ParamDecl::int("DIFFUSER_LED_MATRIX_Y", 8, "LEDs per module along Y"),
    ParamDecl::int("DIFFUSER_MODULES_X", 4, "Modules tiled along X"),
    ParamDecl::int("DIFFUSER_MODULES_Y", 1, "Modules tiled along Y"),
    ParamDecl::float("DIFFUSER_RESISTOR_HEIGHT_MM", 1.0, "Height of the resistor slots"),
    ParamDecl::float("DIFFUSER_RESISTOR_WIDTH_MM", 3.0, "Width of the resistor slots"),
    ParamDecl::text(
        "DIFFUSER_RESISTOR_ORIENTATION",
        "horizontal",
        "Walls carrying resistor slots: horizontal, vertical or none",
    ),
    ParamDecl::float("DIFFUSER_EYELET_RADIUS_MM", 4.0, "Outer radius of the mounting eyelets"),
    ParamDecl::float("DIFFUSER_EYELET_HOLE_RADIUS_MM", 1.6, "Screw hole radius"),
    ParamDecl::float("DIFFUSER_EYELET_HEIGHT_MM", 3.0, "Eyelet height, flush with the wall top"),
    ParamDecl::float(
        "DIFFUSER_EYELET_FLAT_OFFSET_MM",
        2.0,
        "Distance from the wall to the start of the eyelet's round end",
    ),
    ParamDecl::int("DIFFUSER_EYELET_COUNT_X", 2, "Eyelets on each X-parallel side"),
    ParamDecl::int("DIFFUSER_EYELET_COUNT_Y", 0, "Eyelets on each Y-parallel side"),
];

/// Which grid walls carry resistor slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResistorOrientation {
    /// Slots in the walls running along X
    Horizontal,
    /// Slots in the walls running along Y
    Vertical,
    None,
}

impl ResistorOrientation {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Self::Horizontal,
            "vertical" => Self::Vertical,
            _ => Self::None,
        }
    }
}

/// One in-plane direction of the panel
#[derive(Debug, Clone, Copy)]
struct Span {
    /// Cells across all modules
    cells: usize,
    /// Cells per module
    per_module: usize,
    /// Inner panel length across all modules
    panel: f64,
    cell: f64,
}

/// Resolved dimensions
#[derive(Debug, Clone)]
struct Layout {
    base: f64,
    grid_wall: f64,
    grid_height: f64,
    outer_wall: f64,
    outer_height: f64,
    pcb: f64,
    clip_width: f64,
    clip_depth: f64,
    clips: [usize; 2],
    x: Span,
    y: Span,
    resistor_height: f64,
    resistor_width: f64,
    resistors: ResistorOrientation,
    eyelet: Option<Eyelet>,
    eyelets: [usize; 2],
}

#[derive(Debug, Clone, Copy)]
struct Eyelet {
    radius: f64,
    hole_radius: f64,
    height: f64,
    flat_offset: f64,
}

impl Layout {
    fn read(ctx: &BuildContext) -> Result<Self, BuildError> {
        let p = ctx.params;
        let [panel_x, panel_y, grid_wall, grid_height, outer_wall] = ctx.positive([
            "DIFFUSER_PANEL_SIZE_X_MM",
            "DIFFUSER_PANEL_SIZE_Y_MM",
            "DIFFUSER_GRID_WALL_THICKNESS_MM",
            "DIFFUSER_GRID_HEIGHT_MM",
            "DIFFUSER_OUTER_WALL_THICKNESS_MM",
        ])?;
        let base = (p.float("DIFFUSER_LAYER_HEIGHT_MM")? * p.int("DIFFUSER_BASE_LAYERS")? as f64)
            .max(0.01);
        let pcb = p.float("DIFFUSER_PCB_THICKNESS_MM")?;
        let clip_height = p.float("DIFFUSER_PCB_CLIP_HEIGHT_MM")?;
        if pcb < 0.0 || clip_height < 0.0 || pcb + clip_height <= 0.0 {
            return Err(BuildError::Invalid(format!(
                "PCB thickness {} and clip height {} leave no wall above the grid",
                pcb, clip_height
            )));
        }

        let span = |size: f64, leds: &str, modules: &str| -> Result<Span, BuildError> {
            let per_module = p.count(leds)?;
            let modules = p.count(modules)?;
            if per_module == 0 || modules == 0 {
                return Err(BuildError::Invalid(format!(
                    "{} LEDs x {} modules leave no cells",
                    per_module, modules
                )));
            }
            let cells = per_module * modules;
            let panel = size * modules as f64;
            let cell = (panel - (cells + 1) as f64 * grid_wall) / cells as f64;
            if cell <= 0.0 {
                return Err(BuildError::Invalid(format!(
                    "{} cells with {} mm walls do not fit {} mm",
                    cells, grid_wall, panel
                )));
            }
            Ok(Span {
                cells,
                per_module,
                panel,
                cell,
            })
        };
        let x = span(panel_x, "DIFFUSER_LED_MATRIX_X", "DIFFUSER_MODULES_X")?;
        let y = span(panel_y, "DIFFUSER_LED_MATRIX_Y", "DIFFUSER_MODULES_Y")?;

        let radius = p.float("DIFFUSER_EYELET_RADIUS_MM")?;
        let hole_radius = p.float("DIFFUSER_EYELET_HOLE_RADIUS_MM")?;
        let height = p.float("DIFFUSER_EYELET_HEIGHT_MM")?;
        let flat_offset = p.float("DIFFUSER_EYELET_FLAT_OFFSET_MM")?;
        let eyelet = (radius > 0.0 && hole_radius > 0.0 && hole_radius < radius && height > 0.0)
            .then_some(Eyelet {
                radius,
                hole_radius,
                height,
                flat_offset: flat_offset.max(0.0),
            });

        Ok(Self {
            base,
            grid_wall,
            grid_height,
            outer_wall,
            outer_height: grid_height + pcb + clip_height,
            pcb,
            clip_width: p.float("DIFFUSER_PCB_CLIP_WIDTH_MM")?,
            clip_depth: p.float("DIFFUSER_PCB_CLIP_DEPTH_MM")?,
            clips: [
                p.count("DIFFUSER_PCB_CLIP_COUNT_X")?,
                p.count("DIFFUSER_PCB_CLIP_COUNT_Y")?,
            ],
            x,
            y,
            resistor_height: p.float("DIFFUSER_RESISTOR_HEIGHT_MM")?,
            resistor_width: p.float("DIFFUSER_RESISTOR_WIDTH_MM")?,
            resistors: ResistorOrientation::parse(p.text("DIFFUSER_RESISTOR_ORIENTATION")?),
            eyelet,
            eyelets: [
                p.count("DIFFUSER_EYELET_COUNT_X")?,
                p.count("DIFFUSER_EYELET_COUNT_Y")?,
            ],
        })
    }

    fn total(&self) -> DVec3 {
        DVec3::new(
            self.x.panel + 2.0 * self.outer_wall,
            self.y.panel + 2.0 * self.outer_wall,
            0.0,
        )
    }

    /// Offset of grid line `i` along a span
    fn wall_at(&self, span: &Span, i: usize) -> f64 {
        self.outer_wall + i as f64 * (span.cell + self.grid_wall)
    }

    /// Centres of `count` items spread evenly along a span
    fn spread(&self, span: &Span, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| self.outer_wall + (i as f64 + 0.5) * span.panel / count as f64)
            .collect()
    }

    fn diffuser(&self, parts: &Parts) -> Result<Solid, BuildError> {
        let total = self.total();
        Ok(parts.cuboid("sheet", DVec3::ZERO, DVec3::new(total.x, total.y, self.base))?)
    }

    /// Crossing walls of the compartment grid
    fn lattice(&self, parts: &Parts) -> Result<Solid, BuildError> {
        let mut walls = Vec::new();
        for i in 0..=self.x.cells {
            walls.push(parts.cuboid(
                "grid wall",
                DVec3::new(self.wall_at(&self.x, i), self.outer_wall, self.base),
                DVec3::new(self.grid_wall, self.y.panel, self.grid_height),
            )?);
        }
        for j in 0..=self.y.cells {
            walls.push(parts.cuboid(
                "grid wall",
                DVec3::new(self.outer_wall, self.wall_at(&self.y, j), self.base),
                DVec3::new(self.x.panel, self.grid_wall, self.grid_height),
            )?);
        }
        let mut walls = walls.into_iter();
        let first = walls
            .next()
            .ok_or_else(|| BuildError::Invalid("grid has no walls".into()))?;
        Ok(walls.try_fold(first, |lattice, wall| parts.combine("grid lattice", lattice, wall))?)
    }

    /// Slots for the resistors between neighbouring LEDs
    ///
    /// Walls on the panel border and between modules stay closed.
    fn resistor_slots(&self, parts: &Parts) -> Result<Vec<Solid>, BuildError> {
        if self.resistor_width <= 0.0 || self.resistor_height <= 0.0 {
            return Ok(Vec::new());
        }
        let (along, across, flip) = match self.resistors {
            ResistorOrientation::Horizontal => (&self.x, &self.y, false),
            ResistorOrientation::Vertical => (&self.y, &self.x, true),
            ResistorOrientation::None => return Ok(Vec::new()),
        };
        let z = self.base + self.grid_height - self.resistor_height;
        let mut slots = Vec::new();
        for j in (1..across.cells).filter(|j| j % across.per_module != 0) {
            let wall = self.wall_at(across, j);
            for i in 0..along.cells {
                let centre = self.outer_wall
                    + (i as f64 + 0.5) * (along.cell + self.grid_wall)
                    + self.grid_wall / 2.0;
                let (min, size, through) = if flip {
                    (
                        DVec3::new(wall, centre - self.resistor_width / 2.0, z),
                        DVec3::new(self.grid_wall, self.resistor_width, self.resistor_height),
                        [BoxFace::MinX, BoxFace::MaxX, BoxFace::MaxZ],
                    )
                } else {
                    (
                        DVec3::new(centre - self.resistor_width / 2.0, wall, z),
                        DVec3::new(self.resistor_width, self.grid_wall, self.resistor_height),
                        [BoxFace::MinY, BoxFace::MaxY, BoxFace::MaxZ],
                    )
                };
                slots.push(parts.cutter(
                    "resistor slot",
                    Aabb::from_min_size(min, size),
                    &through,
                )?);
            }
        }
        Ok(slots)
    }

    /// Sides of the outer wall: (outward normal, wall-parallel span, clip and eyelet counts)
    fn sides(&self) -> [(DVec3, &Span, usize, usize); 4] {
        [
            (DVec3::NEG_Y, &self.x, self.clips[0], self.eyelets[0]),
            (DVec3::Y, &self.x, self.clips[0], self.eyelets[0]),
            (DVec3::NEG_X, &self.y, self.clips[1], self.eyelets[1]),
            (DVec3::X, &self.y, self.clips[1], self.eyelets[1]),
        ]
    }

    /// Map (along the side, across the wall from its outer face, z) to world space
    fn side_frame(&self, outward: DVec3) -> impl Fn(f64, f64, f64) -> DVec3 {
        let total = self.total();
        move |along: f64, inward: f64, z: f64| {
            if outward.x == 0.0 {
                let y = if outward.y < 0.0 { inward } else { total.y - inward };
                DVec3::new(along, y, z)
            } else {
                let x = if outward.x < 0.0 { inward } else { total.x - inward };
                DVec3::new(x, along, z)
            }
        }
    }

    /// Two slots per clip freeing a tongue of clip width
    fn clip_slots(&self, parts: &Parts) -> Result<Vec<Solid>, BuildError> {
        let depth = self.outer_height - self.grid_height;
        let z = self.base + self.grid_height;
        let offset = self.clip_width / 2.0 + self.grid_wall / 2.0;
        let mut slots = Vec::new();
        for (outward, span, clips, _) in self.sides() {
            let frame = self.side_frame(outward);
            let through = if outward.x == 0.0 {
                [BoxFace::MinY, BoxFace::MaxY, BoxFace::MaxZ]
            } else {
                [BoxFace::MinX, BoxFace::MaxX, BoxFace::MaxZ]
            };
            for centre in self.spread(span, clips) {
                for slot_centre in [centre - offset, centre + offset] {
                    let a = frame(slot_centre - self.grid_wall / 2.0, 0.0, z);
                    let b = frame(slot_centre + self.grid_wall / 2.0, self.outer_wall, z + depth);
                    slots.push(parts.cutter("clip slot", Aabb::new(a, b), &through)?);
                }
            }
        }
        Ok(slots)
    }

    /// Triangular catches on the inside of each clip tongue
    ///
    /// The upper slope reaches full depth at the PCB's top face plus half
    /// the wedge, so the PCB snaps under it.
    fn clip_wedges(&self, parts: &Parts) -> Result<Vec<Solid>, BuildError> {
        if self.clip_depth <= 0.0 || self.clip_width <= 0.0 {
            return Ok(Vec::new());
        }
        let clearance = parts.clearance();
        let z_base = self.base + self.grid_height + self.pcb - self.clip_depth;
        let z_top = self.base + self.outer_height;
        let z_mid = (z_base + z_top) / 2.0;
        let mut wedges = Vec::new();
        for (outward, span, clips, _) in self.sides() {
            let frame = self.side_frame(outward);
            let along = if outward.x == 0.0 { DVec3::X } else { DVec3::Y };
            for centre in self.spread(span, clips) {
                let start = centre - self.clip_width / 2.0;
                let profile = Profile::polygon(&[
                    clearance.sink(frame(start, self.outer_wall, z_base), outward),
                    frame(start, self.outer_wall + self.clip_depth, z_mid),
                    clearance.sink(frame(start, self.outer_wall, z_top), outward),
                ]);
                wedges.push(parts.extrude("clip wedge", &profile, along * self.clip_width)?);
            }
        }
        Ok(wedges)
    }

    /// D-shaped mounting lugs on the outside of the wall, flush with its top
    fn eyelets(&self, parts: &Parts) -> Result<Vec<Solid>, BuildError> {
        let Some(e) = self.eyelet else {
            return Ok(Vec::new());
        };
        let clearance = parts.clearance();
        let z_top = self.base + self.outer_height;
        let z = z_top - e.height;
        let reach = e.radius + e.flat_offset;
        let mut lugs = Vec::new();
        for (outward, span, _, count) in self.sides() {
            let frame = self.side_frame(outward);
            for centre in self.spread(span, count) {
                let flat = Aabb::new(
                    frame(centre - e.radius, clearance.mm(), z),
                    frame(centre + e.radius, -reach, z_top),
                );
                let axis = Axis3D::z(frame(centre, -reach, z));
                let lug = parts.combine(
                    "eyelet",
                    parts.aabb("eyelet flat", flat)?,
                    parts.cylinder("eyelet round", axis, e.radius, e.height)?,
                )?;
                let hole_axis = Axis3D::z(frame(centre, -reach, z - clearance.mm()));
                let hole = parts.cylinder(
                    "eyelet hole",
                    hole_axis,
                    e.hole_radius,
                    e.height + 2.0 * clearance.mm(),
                )?;
                lugs.push(parts.carve("eyelet hole", lug, hole)?);
            }
        }
        Ok(lugs)
    }
}

pub struct LedDiffuser;

impl Model for LedDiffuser {
    fn name(&self) -> &'static str {
        "led_diffuser"
    }

    fn description(&self) -> &'static str {
        "Diffuser sheet, compartment grid and clip-on outer wall for LED matrices"
    }

    fn parameters(&self) -> &'static [ParamDecl] {
        PARAMETERS
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError> {
        let layout = Layout::read(ctx)?;

        let diffuser = Body::new(ctx.kernel, "Diffuser", layout.diffuser(&ctx.parts("Diffuser"))?)
            .finish();

        let parts = ctx.parts("Grid");
        let grid = Body::new(ctx.kernel, "Grid", layout.lattice(&parts)?)
            .cut_all(layout.resistor_slots(&parts)?, "resistor slot")?
            .finish();

        let parts = ctx.parts("OuterWall");
        let total = layout.total();
        let shell = parts.cuboid(
            "shell",
            DVec3::new(0.0, 0.0, layout.base),
            DVec3::new(total.x, total.y, layout.outer_height),
        )?;
        let opening = parts.cutter(
            "opening",
            Aabb::from_min_size(
                DVec3::new(layout.outer_wall, layout.outer_wall, layout.base),
                DVec3::new(layout.x.panel, layout.y.panel, layout.outer_height),
            ),
            &[BoxFace::MinZ, BoxFace::MaxZ],
        )?;
        let outer_wall = Body::new(ctx.kernel, "OuterWall", shell)
            .cut(opening, "opening")?
            .cut_all(layout.clip_slots(&parts)?, "clip slot")?
            .fuse_all(layout.clip_wedges(&parts)?, "clip wedge")?
            .add_details(layout.eyelets(&parts)?, "eyelet")?
            .finish();

        Ok(vec![diffuser, grid, outer_wall])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MapSource, ParameterSet, resolve};
    use crate::settings::BuildSettings;
    use approx::assert_relative_eq;
    use pf_cad::{CadKernel, MockKernel};

    fn with_layout<T>(overrides: MapSource, f: impl FnOnce(&BuildContext, Layout) -> T) -> T {
        let params: ParameterSet = resolve(PARAMETERS, &overrides).unwrap();
        let settings = BuildSettings::default();
        let kernel = MockKernel::new();
        let ctx = BuildContext {
            kernel: &kernel,
            params: &params,
            settings: &settings,
        };
        let layout = Layout::read(&ctx).unwrap();
        f(&ctx, layout)
    }

    #[test]
    fn test_default_layout() {
        with_layout(MapSource::default(), |_, l| {
            assert_relative_eq!(l.base, 0.32, epsilon = 1e-12);
            assert_relative_eq!(l.outer_height, 8.6, epsilon = 1e-12);
            assert_eq!(l.x.cells, 32);
            assert_eq!(l.y.cells, 8);
            assert_relative_eq!(l.x.panel, 264.0);
            assert_relative_eq!(l.x.cell, (264.0 - 33.0) / 32.0, epsilon = 1e-12);
            assert_relative_eq!(l.total().x, 266.0);
            assert_relative_eq!(l.total().y, 69.0);
        });
    }

    #[test]
    fn test_base_thickness_has_floor() {
        with_layout(MapSource::new("env").with("DIFFUSER_BASE_LAYERS", "0"), |_, l| {
            assert_relative_eq!(l.base, 0.01);
        });
    }

    #[test]
    fn test_resistor_slots_skip_borders() {
        with_layout(MapSource::default(), |ctx, l| {
            let slots = l.resistor_slots(&ctx.parts("Grid")).unwrap();
            // 7 inner horizontal walls, one slot per cell along X
            assert_eq!(slots.len(), 7 * 32);
        });
        with_layout(
            MapSource::new("env").with("DIFFUSER_RESISTOR_ORIENTATION", "Vertical"),
            |ctx, l| {
                let slots = l.resistor_slots(&ctx.parts("Grid")).unwrap();
                // 31 inner vertical walls minus 3 module borders, 8 cells along Y
                assert_eq!(slots.len(), 28 * 8);
            },
        );
        with_layout(
            MapSource::new("env").with("DIFFUSER_RESISTOR_ORIENTATION", "none"),
            |ctx, l| assert!(l.resistor_slots(&ctx.parts("Grid")).unwrap().is_empty()),
        );
    }

    #[test]
    fn test_clip_slots_and_wedges_per_side() {
        with_layout(MapSource::default(), |ctx, l| {
            let parts = ctx.parts("OuterWall");
            let slots = l.clip_slots(&parts).unwrap();
            assert_eq!(slots.len(), 2 * 4 * 2);
            // front wall slots open through both faces and the top
            let slot = ctx.kernel.properties(&slots[0]).unwrap().bbox;
            assert_relative_eq!(slot.min.y, -0.1, epsilon = 1e-9);
            assert_relative_eq!(slot.max.y, 1.1, epsilon = 1e-9);
            assert_relative_eq!(slot.max.z, 0.32 + 8.6 + 0.1, epsilon = 1e-9);
            let wedges = l.clip_wedges(&parts).unwrap();
            assert_eq!(wedges.len(), 2 * 4);

            let bbox = ctx.kernel.properties(&wedges[0]).unwrap().bbox;
            // front wall wedge reaches clip depth into the panel
            assert_relative_eq!(bbox.max.y, 1.0 + 0.5, epsilon = 1e-9);
            assert_relative_eq!(bbox.min.y, 0.9, epsilon = 1e-9);
            assert_relative_eq!(bbox.max.z, 0.32 + 8.6, epsilon = 1e-9);
            assert_relative_eq!(bbox.size().x, 5.0, epsilon = 1e-9);
        });
    }

    #[test]
    fn test_eyelets_point_outwards() {
        with_layout(MapSource::default(), |ctx, l| {
            let lugs = l.eyelets(&ctx.parts("OuterWall")).unwrap();
            assert_eq!(lugs.len(), 4);
            let front = ctx.kernel.properties(&lugs[0]).unwrap().bbox;
            assert_relative_eq!(front.min.y, -(4.0 + 2.0 + 4.0), epsilon = 1e-9);
            assert_relative_eq!(front.max.y, 0.1, epsilon = 1e-9);
            let back = ctx.kernel.properties(&lugs[2]).unwrap().bbox;
            assert_relative_eq!(back.max.y, 69.0 + 10.0, epsilon = 1e-9);
        });
    }

    #[test]
    fn test_invalid_eyelets_are_skipped() {
        with_layout(
            MapSource::new("env").with("DIFFUSER_EYELET_HOLE_RADIUS_MM", "4.0"),
            |ctx, l| assert!(l.eyelets(&ctx.parts("OuterWall")).unwrap().is_empty()),
        );
    }

    #[test]
    fn test_build_produces_three_solids() {
        let kernel = MockKernel::new();
        let params = resolve(PARAMETERS, &MapSource::default()).unwrap();
        let settings = BuildSettings::default();
        let solids = LedDiffuser
            .build(&BuildContext {
                kernel: &kernel,
                params: &params,
                settings: &settings,
            })
            .unwrap();
        let names: Vec<_> = solids.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Diffuser", "Grid", "OuterWall"]);

        let grid = kernel.properties(&solids[1].solid).unwrap().bbox;
        assert_relative_eq!(grid.min.z, 0.32, epsilon = 1e-9);
        assert_relative_eq!(grid.max.z, 6.32, epsilon = 1e-9);
    }

    #[test]
    fn test_too_many_cells_rejected() {
        let params = resolve(
            PARAMETERS,
            &MapSource::new("env").with("DIFFUSER_LED_MATRIX_X", "200"),
        )
        .unwrap();
        let settings = BuildSettings::default();
        let kernel = MockKernel::new();
        let result = Layout::read(&BuildContext {
            kernel: &kernel,
            params: &params,
            settings: &settings,
        });
        assert!(matches!(result, Err(BuildError::Invalid(_))));
    }
}

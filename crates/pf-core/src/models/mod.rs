//! Parametric model builders
//!
//! Each model declares its parameters and builds named solids through the
//! staged [`pf_cad::Body`] pipeline.

mod gravitrax_lift_clip;
mod kleinteile_einschub;
mod led_diffuser;
mod muldenklappe;
mod plate;
mod tablet_holder;

use glam::DVec3;
use pf_cad::{
    Aabb, Axis3D, BoxFace, CadError, CadKernel, CadResult, Clearance, NamedSolid, PipelineError,
    Profile, Solid,
};
use thiserror::Error;

use crate::params::{ParamDecl, ParamError, ParameterSet};
use crate::settings::BuildSettings;

pub use gravitrax_lift_clip::GravitraxLiftClip;
pub use kleinteile_einschub::KleinteileEinschub;
pub use led_diffuser::LedDiffuser;
pub use muldenklappe::Muldenklappe;
pub use plate::Plate;
pub use tablet_holder::TabletHolder;

/// Errors raised by a model builder
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Cad(#[from] CadError),
    #[error("invalid parameters: {0}")]
    Invalid(String),
}

/// Everything a builder may read
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub kernel: &'a dyn CadKernel,
    pub params: &'a ParameterSet,
    pub settings: &'a BuildSettings,
}

impl<'a> BuildContext<'a> {
    pub fn clearance(&self) -> Clearance {
        self.settings.clearance()
    }

    /// Primitive factory for the named body
    pub fn parts(&self, body: &str) -> Parts<'a> {
        Parts {
            kernel: self.kernel,
            body: body.to_string(),
            clearance: self.clearance(),
        }
    }

    /// Read float parameters that must be strictly positive
    pub fn positive<const N: usize>(&self, keys: [&str; N]) -> Result<[f64; N], BuildError> {
        self.bounded(keys, "positive", |v| v > 0.0)
    }

    /// Read float parameters where 0 disables a feature
    pub fn non_negative<const N: usize>(&self, keys: [&str; N]) -> Result<[f64; N], BuildError> {
        self.bounded(keys, "zero or positive", |v| v >= 0.0)
    }

    fn bounded<const N: usize>(
        &self,
        keys: [&str; N],
        expected: &str,
        accept: impl Fn(f64) -> bool,
    ) -> Result<[f64; N], BuildError> {
        let mut values = [0.0; N];
        for (value, key) in values.iter_mut().zip(keys) {
            *value = self.params.float(key)?;
            if !accept(*value) {
                return Err(BuildError::Invalid(format!(
                    "{} must be {}, got {}",
                    key, expected, value
                )));
            }
        }
        Ok(values)
    }
}

/// A parametric model
pub trait Model: Send + Sync {
    /// Registry name, as used in model files
    fn name(&self) -> &'static str;

    /// One-line description
    fn description(&self) -> &'static str;

    /// Declared parameters with their defaults
    fn parameters(&self) -> &'static [ParamDecl];

    /// Build the model's solids from resolved parameters
    fn build(&self, ctx: &BuildContext) -> Result<Vec<NamedSolid>, BuildError>;
}

static MODELS: &[&dyn Model] = &[
    &Plate,
    &KleinteileEinschub,
    &LedDiffuser,
    &Muldenklappe,
    &GravitraxLiftClip,
    &TabletHolder,
];

/// All registered models
pub fn registry() -> &'static [&'static dyn Model] {
    MODELS
}

/// Look up a registered model by name
pub fn find(name: &str) -> Option<&'static dyn Model> {
    MODELS.iter().copied().find(|m| m.name() == name)
}

/// Primitive constructors that attribute kernel failures to a body
pub struct Parts<'k> {
    kernel: &'k dyn CadKernel,
    body: String,
    clearance: Clearance,
}

impl<'k> Parts<'k> {
    fn wrap<T>(&self, label: &str, result: CadResult<T>) -> Result<T, PipelineError> {
        result.map_err(|source| PipelineError::Kernel {
            body: self.body.clone(),
            stage: "primitives",
            operation: format!("create '{}'", label),
            source,
        })
    }

    pub fn clearance(&self) -> Clearance {
        self.clearance
    }

    pub fn cuboid(&self, label: &str, min: DVec3, size: DVec3) -> Result<Solid, PipelineError> {
        self.wrap(label, self.kernel.create_box(min, size))
    }

    pub fn aabb(&self, label: &str, bbox: Aabb) -> Result<Solid, PipelineError> {
        self.cuboid(label, bbox.min, bbox.size())
    }

    /// Box that reaches through `face` into a neighbouring part
    pub fn sunk_box(
        &self,
        label: &str,
        min: DVec3,
        size: DVec3,
        face: BoxFace,
    ) -> Result<Solid, PipelineError> {
        let bbox = self
            .clearance
            .grow_box(Aabb::from_min_size(min, size), face);
        self.aabb(label, bbox)
    }

    /// Cutting box that opens through `faces` instead of ending flush with them
    pub fn cutter(
        &self,
        label: &str,
        bbox: Aabb,
        faces: &[BoxFace],
    ) -> Result<Solid, PipelineError> {
        self.aabb(label, self.clearance.grow_faces(bbox, faces))
    }

    pub fn cylinder(
        &self,
        label: &str,
        axis: Axis3D,
        radius: f64,
        height: f64,
    ) -> Result<Solid, PipelineError> {
        self.wrap(label, self.kernel.create_cylinder(&axis, radius, height))
    }

    pub fn torus(
        &self,
        label: &str,
        axis: Axis3D,
        major_radius: f64,
        minor_radius: f64,
    ) -> Result<Solid, PipelineError> {
        self.wrap(
            label,
            self.kernel.create_torus(&axis, major_radius, minor_radius),
        )
    }

    pub fn cone(
        &self,
        label: &str,
        axis: Axis3D,
        base_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<Solid, PipelineError> {
        self.wrap(
            label,
            self.kernel.create_cone(&axis, base_radius, top_radius, height),
        )
    }

    pub fn extrude(
        &self,
        label: &str,
        profile: &Profile,
        direction: DVec3,
    ) -> Result<Solid, PipelineError> {
        self.wrap(label, self.kernel.extrude(profile, direction))
    }

    /// Triangular prism standing on a wall, base edge `from`-`to`
    ///
    /// The base widens by the clearance into the wall along `into`.
    pub fn ledge(
        &self,
        label: &str,
        [from, apex, to]: [DVec3; 3],
        into: DVec3,
        length: DVec3,
    ) -> Result<Solid, PipelineError> {
        let sink = into.normalize_or_zero() * self.clearance.mm();
        let points = if sink == DVec3::ZERO {
            vec![from, apex, to]
        } else {
            vec![from + sink, from, apex, to, to + sink]
        };
        self.extrude(label, &Profile::polygon(&points), length)
    }

    /// Triangular brace of `size` in the corner between two walls
    ///
    /// `a` and `b` run from `corner` along the wall surfaces into the open
    /// side; the brace sinks into both walls.
    pub fn gusset(
        &self,
        label: &str,
        corner: DVec3,
        [a, b]: [DVec3; 2],
        size: f64,
        length: DVec3,
    ) -> Result<Solid, PipelineError> {
        let (a, b) = (a.normalize_or_zero(), b.normalize_or_zero());
        let c = self.clearance.mm();
        let points = if c > 0.0 {
            vec![
                corner - (a + b) * c,
                corner + a * size - b * c,
                corner + a * size,
                corner + b * size,
                corner + b * size - a * c,
            ]
        } else {
            vec![corner, corner + a * size, corner + b * size]
        };
        self.extrude(label, &Profile::polygon(&points), length)
    }

    /// Union of two freshly made parts, before either joins a body
    pub fn combine(&self, label: &str, a: Solid, b: Solid) -> Result<Solid, PipelineError> {
        self.wrap(
            label,
            self.kernel.boolean(&a, &b, pf_cad::BooleanType::Union),
        )
    }

    /// Difference of two freshly made parts
    pub fn carve(&self, label: &str, a: Solid, b: Solid) -> Result<Solid, PipelineError> {
        self.wrap(
            label,
            self.kernel.boolean(&a, &b, pf_cad::BooleanType::Subtract),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MapSource, resolve};
    use pf_cad::MockKernel;

    #[test]
    fn test_registry_names_unique() {
        let mut names: Vec<_> = registry().iter().map(|m| m.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), registry().len());
        assert!(find("plate").is_some());
        assert!(find("teapot").is_none());
    }

    #[test]
    fn test_parameter_keys_unique_per_model() {
        for model in registry() {
            let mut keys: Vec<_> = model.parameters().iter().map(|p| p.key).collect();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), model.parameters().len(), "{}", model.name());
        }
    }

    #[test]
    fn test_every_model_builds_with_defaults() {
        for model in registry() {
            let kernel = MockKernel::new();
            let params = resolve(model.parameters(), &MapSource::default()).unwrap();
            let settings = BuildSettings::default();
            let ctx = BuildContext {
                kernel: &kernel,
                params: &params,
                settings: &settings,
            };
            let solids = model.build(&ctx).unwrap_or_else(|e| panic!("{}: {}", model.name(), e));
            assert!(!solids.is_empty(), "{}", model.name());
            for named in &solids {
                kernel
                    .check(&named.solid)
                    .unwrap_or_else(|e| panic!("{}/{}: {}", model.name(), named.name, e));
            }
        }
    }

    #[test]
    fn test_positive_rejects_zero() {
        let decls = &[ParamDecl::float("A", 0.0, ""), ParamDecl::float("B", 1.0, "")];
        let params = resolve(decls, &MapSource::default()).unwrap();
        let settings = BuildSettings::default();
        let kernel = MockKernel::new();
        let ctx = BuildContext {
            kernel: &kernel,
            params: &params,
            settings: &settings,
        };
        assert!(matches!(ctx.positive(["B"]), Ok([b]) if b == 1.0));
        assert!(matches!(ctx.positive(["B", "A"]), Err(BuildError::Invalid(_))));
        assert!(matches!(ctx.non_negative(["A", "B"]), Ok([a, b]) if a == 0.0 && b == 1.0));
    }

    #[test]
    fn test_cutter_reaches_past_open_faces() {
        let kernel = MockKernel::new();
        let parts = Parts {
            kernel: &kernel,
            body: "Plate".into(),
            clearance: Clearance::default(),
        };
        let pocket = Aabb::from_min_size(DVec3::new(1.0, 1.0, 2.0), DVec3::new(4.0, 4.0, 1.0));
        let cutter = parts.cutter("pocket", pocket, &[BoxFace::MaxZ]).unwrap();
        let bbox = kernel.properties(&cutter).unwrap().bbox;
        assert_eq!(bbox.min, pocket.min);
        assert!((bbox.max.z - 3.1).abs() < 1e-12);
    }

    #[test]
    fn test_gusset_sinks_into_both_walls() {
        let kernel = MockKernel::new();
        let parts = Parts {
            kernel: &kernel,
            body: "Frame".into(),
            clearance: Clearance(0.5),
        };
        let brace = parts
            .gusset("brace", DVec3::ZERO, [DVec3::X, DVec3::Z], 2.0, DVec3::Y * 10.0)
            .unwrap();
        let props = kernel.properties(&brace).unwrap();
        assert_eq!(props.bbox.min, DVec3::new(-0.5, 0.0, -0.5));
        assert_eq!(props.bbox.max, DVec3::new(2.0, 10.0, 2.0));
        // triangle plus the two sunk strips and their shared corner square
        assert!((props.volume - (2.0 + 1.0 + 1.0 + 0.25) * 10.0).abs() < 1e-9);

        let flush = Parts {
            clearance: Clearance(0.0),
            ..parts
        };
        let brace = flush
            .gusset("brace", DVec3::ZERO, [DVec3::X, DVec3::Z], 2.0, DVec3::Y)
            .unwrap();
        assert_eq!(kernel.properties(&brace).unwrap().face_count, 5);
    }

    #[test]
    fn test_ledge_widens_into_wall() {
        let kernel = MockKernel::new();
        let parts = Parts {
            kernel: &kernel,
            body: "Clip".into(),
            clearance: Clearance::default(),
        };
        let hook = parts
            .ledge(
                "hook",
                [DVec3::ZERO, DVec3::new(-2.0, 0.0, 1.0), DVec3::new(0.0, 0.0, 2.0)],
                DVec3::X,
                DVec3::Y * 10.0,
            )
            .unwrap();
        let props = kernel.properties(&hook).unwrap();
        assert!((props.bbox.max.x - 0.1).abs() < 1e-12);
        assert!((props.volume - (2.0 + 0.2) * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_part_errors_name_the_part() {
        let kernel = MockKernel::new();
        let parts = Parts {
            kernel: &kernel,
            body: "Plate".into(),
            clearance: Clearance::default(),
        };
        let err = parts
            .cuboid("slab", DVec3::ZERO, DVec3::new(1.0, 0.0, 1.0))
            .unwrap_err();
        assert!(err.to_string().contains("create 'slab'"));
        assert!(err.to_string().contains("Plate"));
    }
}

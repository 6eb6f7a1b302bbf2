//! Build settings shared by all models

use pf_cad::Clearance;
use serde::{Deserialize, Serialize};

use crate::params::{OverrideSource, ParamError, parse_float};

/// Environment key for [`BuildSettings::fuse_clearance_mm`]
pub const FUSE_CLEARANCE_KEY: &str = "PF_FUSE_CLEARANCE_MM";
/// Environment key for [`BuildSettings::tessellation_tolerance_mm`]
pub const MESH_TOLERANCE_KEY: &str = "PF_MESH_TOLERANCE_MM";

/// Kernel-independent knobs for building and meshing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Overlap added where fused parts would only share a boundary
    pub fuse_clearance_mm: f64,
    /// Chordal tolerance used when tessellating for export
    pub tessellation_tolerance_mm: f64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            fuse_clearance_mm: Clearance::DEFAULT_MM,
            tessellation_tolerance_mm: 0.05,
        }
    }
}

impl BuildSettings {
    pub fn clearance(&self) -> Clearance {
        Clearance(self.fuse_clearance_mm)
    }

    /// Apply overrides on top of these settings
    pub fn with_overrides(self, source: &dyn OverrideSource) -> Result<Self, ParamError> {
        let read = |key: &str, current: f64| match source.lookup(key) {
            Some(raw) => parse_float(key, &raw),
            None => Ok(current),
        };
        let settings = Self {
            fuse_clearance_mm: read(FUSE_CLEARANCE_KEY, self.fuse_clearance_mm)?,
            tessellation_tolerance_mm: read(MESH_TOLERANCE_KEY, self.tessellation_tolerance_mm)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.fuse_clearance_mm.is_finite() && self.fuse_clearance_mm >= 0.0) {
            return Err(ParamError::Invalid {
                key: FUSE_CLEARANCE_KEY.to_string(),
                reason: format!("must be >= 0, got {}", self.fuse_clearance_mm),
            });
        }
        if !(self.tessellation_tolerance_mm.is_finite() && self.tessellation_tolerance_mm > 0.0) {
            return Err(ParamError::Invalid {
                key: MESH_TOLERANCE_KEY.to_string(),
                reason: format!("must be > 0, got {}", self.tessellation_tolerance_mm),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MapSource;

    #[test]
    fn test_defaults() {
        let settings = BuildSettings::default();
        assert_eq!(settings.clearance(), Clearance(0.1));
        assert_eq!(settings.tessellation_tolerance_mm, 0.05);
    }

    #[test]
    fn test_overrides() {
        let source = MapSource::new("env").with(FUSE_CLEARANCE_KEY, "0.25");
        let settings = BuildSettings::default().with_overrides(&source).unwrap();
        assert_eq!(settings.fuse_clearance_mm, 0.25);
        assert_eq!(settings.tessellation_tolerance_mm, 0.05);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let source = MapSource::new("env").with(MESH_TOLERANCE_KEY, "0");
        assert!(matches!(
            BuildSettings::default().with_overrides(&source),
            Err(ParamError::Invalid { .. })
        ));

        let source = MapSource::new("env").with(FUSE_CLEARANCE_KEY, "thin");
        assert!(matches!(
            BuildSettings::default().with_overrides(&source),
            Err(ParamError::Coercion { .. })
        ));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let settings: BuildSettings = ron::from_str("(fuse_clearance_mm: 0.2)").unwrap();
        assert_eq!(settings.fuse_clearance_mm, 0.2);
        assert_eq!(settings.tessellation_tolerance_mm, 0.05);
    }
}

//! Model documents and validation reports

use std::fmt;

use pf_cad::{CadError, CadKernel, NamedSolid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::ParameterSet;
use crate::settings::BuildSettings;

/// All solids produced by one builder invocation
///
/// The document owns the kernel its solids live in; dropping it releases
/// them.
pub struct ModelDocument {
    model: String,
    params: ParameterSet,
    settings: BuildSettings,
    kernel: Box<dyn CadKernel>,
    solids: Vec<NamedSolid>,
}

impl fmt::Debug for ModelDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDocument")
            .field("model", &self.model)
            .field("kernel", &self.kernel.name())
            .field("solids", &self.solids)
            .finish_non_exhaustive()
    }
}

impl ModelDocument {
    pub fn new(
        model: impl Into<String>,
        params: ParameterSet,
        kernel: Box<dyn CadKernel>,
        solids: Vec<NamedSolid>,
    ) -> Self {
        Self {
            model: model.into(),
            params,
            settings: BuildSettings::default(),
            kernel,
            solids,
        }
    }

    /// Record the settings the solids were built with
    pub fn with_settings(mut self, settings: BuildSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn kernel(&self) -> &dyn CadKernel {
        self.kernel.as_ref()
    }

    pub fn solids(&self) -> &[NamedSolid] {
        &self.solids
    }

    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }

    /// Check every solid and collect its measurements
    pub fn validate(&self) -> Result<DocumentReport, ValidationError> {
        if self.solids.is_empty() {
            return Err(ValidationError::Empty {
                model: self.model.clone(),
            });
        }
        let solids = self
            .solids
            .iter()
            .map(|named| {
                let fail = |source| ValidationError::Solid {
                    solid: named.name.clone(),
                    source,
                };
                self.kernel.check(&named.solid).map_err(fail)?;
                let props = self.kernel.properties(&named.solid).map_err(fail)?;
                Ok(SolidReport {
                    name: named.name.clone(),
                    min: props.bbox.min.to_array(),
                    max: props.bbox.max.to_array(),
                    extents: props.bbox.size().to_array(),
                    volume: props.volume,
                    vertices: props.vertex_count,
                    edges: props.edge_count,
                    faces: props.face_count,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentReport {
            model: self.model.clone(),
            kernel: self.kernel.name().to_string(),
            parameters: self.params.clone(),
            solids,
        })
    }
}

/// Measurements of one validated solid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidReport {
    pub name: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
    /// Bounding box size along X, Y and Z
    pub extents: [f64; 3],
    /// Volume in mm³
    pub volume: f64,
    pub vertices: usize,
    pub edges: usize,
    pub faces: usize,
}

/// Validation outcome for a whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub model: String,
    pub kernel: String,
    pub parameters: ParameterSet,
    pub solids: Vec<SolidReport>,
}

impl fmt::Display for DocumentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} solid(s) OK ({} kernel)",
            self.model,
            self.solids.len(),
            self.kernel
        )?;
        for s in &self.solids {
            writeln!(
                f,
                "  {:<16} {:>9.3} x {:>9.3} x {:>9.3} mm  {:>12.3} mm³  V {} E {} F {}",
                s.name,
                s.extents[0],
                s.extents[1],
                s.extents[2],
                s.volume,
                s.vertices,
                s.edges,
                s.faces
            )?;
        }
        Ok(())
    }
}

/// Reasons a document fails validation
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("model {model} produced no solids")]
    Empty { model: String },
    #[error("solid {solid} is invalid: {source}")]
    Solid {
        solid: String,
        #[source]
        source: CadError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use pf_cad::MockKernel;

    fn document(sizes: &[DVec3]) -> ModelDocument {
        let kernel = MockKernel::new();
        let solids = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| NamedSolid {
                name: format!("Part{}", i),
                solid: kernel.create_box(DVec3::ZERO, *size).unwrap(),
            })
            .collect();
        ModelDocument::new("test", ParameterSet::default(), Box::new(kernel), solids)
    }

    #[test]
    fn test_report_measures_each_solid() {
        let doc = document(&[DVec3::new(100.0, 50.0, 3.0), DVec3::splat(2.0)]);
        let report = doc.validate().unwrap();
        assert_eq!(report.kernel, "mock");
        assert_eq!(report.solids.len(), 2);
        assert_eq!(report.solids[0].extents, [100.0, 50.0, 3.0]);
        assert_eq!(report.solids[0].volume, 15000.0);
        assert_eq!(report.solids[0].edges, 12);
        assert_eq!(report.solids[1].name, "Part1");

        let text = report.to_string();
        assert!(text.starts_with("test: 2 solid(s) OK"));
        assert!(text.contains("Part0"));
    }

    #[test]
    fn test_empty_document_fails() {
        let doc = document(&[]);
        assert!(doc.is_empty());
        assert!(matches!(doc.validate(), Err(ValidationError::Empty { .. })));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = document(&[DVec3::ONE]).validate().unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: DocumentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}

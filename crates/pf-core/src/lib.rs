//! Partforge core
//!
//! This crate contains everything between a model file and a mesh on disk:
//! - Parameters: declared defaults with environment and model-file overrides
//! - Models: registered parametric builders on top of the `pf-cad` pipeline
//! - Document: built solids with validation reports
//! - Export: binary STL and 3MF
//! - Driver and reloader for headless and live use

pub mod document;
pub mod driver;
pub mod export;
pub mod model_file;
pub mod models;
pub mod params;
pub mod reload;
pub mod settings;

pub use document::{DocumentReport, ModelDocument, SolidReport, ValidationError};
pub use driver::{Command, DriverError, Outcome};
pub use export::{ExportError, ExportFormat};
pub use model_file::{ModelFile, ModelFileError, PinnedValue};
pub use models::{BuildContext, BuildError, Model};
pub use params::{
    EnvSource, Layered, MapSource, OverrideSource, ParamDecl, ParamDefault, ParamError, ParamKind,
    ParamValue, ParameterSet,
};
pub use reload::{ReloadEvent, Reloader};
pub use settings::BuildSettings;

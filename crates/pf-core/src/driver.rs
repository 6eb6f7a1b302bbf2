//! Headless driver
//!
//! Loads a model file, resolves its builder and parameters, builds the
//! document on a fresh kernel, validates it and optionally exports it.

use std::path::{Path, PathBuf};

use pf_cad::{CadError, CadKernel, default_kernel, kernel_by_name};
use tracing::{debug, info};

use crate::document::{DocumentReport, ModelDocument, ValidationError};
use crate::export::{ExportError, ExportFormat, export};
use crate::model_file::{ModelFile, ModelFileError};
use crate::models::{BuildContext, BuildError, find, registry};
use crate::params::{EnvSource, Layered, OverrideSource, ParamError, resolve};

/// Driver commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build and validate
    Test,
    ExportStl,
    Export3mf,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Test => "test",
            Command::ExportStl => "export-stl",
            Command::Export3mf => "export-3mf",
        }
    }

    pub fn export_format(&self) -> Option<ExportFormat> {
        match self {
            Command::Test => None,
            Command::ExportStl => Some(ExportFormat::Stl),
            Command::Export3mf => Some(ExportFormat::ThreeMf),
        }
    }
}

/// Driver errors
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    ModelFile(#[from] ModelFileError),
    #[error("unknown builder '{name}' (available: {available})")]
    UnknownBuilder { name: String, available: String },
    #[error(transparent)]
    Kernel(#[from] CadError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("building {model} failed: {source}")]
    Build {
        model: String,
        #[source]
        source: BuildError,
    },
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("{0} needs an output path")]
    MissingOutput(&'static str),
}

impl DriverError {
    /// Process exit code: 2 for export failures, 1 for everything else
    pub fn exit_code(&self) -> u8 {
        match self {
            DriverError::Export(_) => 2,
            _ => 1,
        }
    }
}

/// Result of one driver invocation
#[derive(Debug, Clone)]
pub struct Outcome {
    pub report: DocumentReport,
    /// File written by an export command
    pub output: Option<PathBuf>,
}

/// Instantiate the named kernel, or the default one
pub fn kernel(name: Option<&str>) -> Result<Box<dyn CadKernel>, DriverError> {
    let kernel = match name {
        Some(name) => kernel_by_name(name)?,
        None => default_kernel(),
    };
    if !kernel.is_available() {
        return Err(CadError::KernelNotAvailable(kernel.name().to_string()).into());
    }
    Ok(kernel)
}

/// Rebuild a model file from scratch
///
/// Safe to call repeatedly: every call loads the file again and builds on
/// a fresh kernel. Environment overrides take precedence over parameters
/// pinned in the file.
pub fn build_document(path: &Path, kernel_name: Option<&str>) -> Result<ModelDocument, DriverError> {
    let file = ModelFile::load(path)?;
    build_with(&file, kernel(kernel_name)?, &EnvSource)
}

/// Build a parsed model file with an explicit kernel and override source
pub fn build_with(
    file: &ModelFile,
    kernel: Box<dyn CadKernel>,
    env: &dyn OverrideSource,
) -> Result<ModelDocument, DriverError> {
    let model = find(&file.builder).ok_or_else(|| DriverError::UnknownBuilder {
        name: file.builder.clone(),
        available: registry()
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(", "),
    })?;

    for key in file.parameters.keys() {
        if !model.parameters().iter().any(|p| p.key == key.as_str()) {
            return Err(ParamError::UnknownKey(key.clone()).into());
        }
    }

    let overrides = Layered::new().with(env).with(file.overrides());
    let params = resolve(model.parameters(), &overrides)?;
    let settings = file
        .settings
        .unwrap_or_default()
        .with_overrides(env)?;
    debug!(model = model.name(), ?settings, "resolved build settings");

    info!(model = model.name(), kernel = kernel.name(), "building");
    let solids = model
        .build(&BuildContext {
            kernel: kernel.as_ref(),
            params: &params,
            settings: &settings,
        })
        .map_err(|source| DriverError::Build {
            model: model.name().to_string(),
            source,
        })?;
    info!(model = model.name(), solids = solids.len(), "built");

    Ok(ModelDocument::new(model.name(), params, kernel, solids).with_settings(settings))
}

/// Validate a built document
pub fn validate(doc: &ModelDocument) -> Result<DocumentReport, DriverError> {
    let report = doc.validate()?;
    for solid in &report.solids {
        debug!(
            solid = %solid.name,
            volume = solid.volume,
            faces = solid.faces,
            "solid valid"
        );
    }
    Ok(report)
}

/// Run one driver command on a model file
pub fn run(
    command: Command,
    model_path: &Path,
    output: Option<&Path>,
    kernel_name: Option<&str>,
) -> Result<Outcome, DriverError> {
    let format = command.export_format();
    // Usage errors come before any geometry work
    if format.is_some() && output.is_none() {
        return Err(DriverError::MissingOutput(command.name()));
    }

    let doc = build_document(model_path, kernel_name)?;
    let report = validate(&doc)?;

    let written = match (format, output) {
        (Some(format), Some(path)) => Some(export(&doc, format, path)?),
        _ => None,
    };
    Ok(Outcome {
        report,
        output: written,
    })
}

//! Mesh export of model documents
//!
//! Every format tessellates all solids of a document and writes exactly
//! one file. Output goes to a temporary file next to the target, which is
//! persisted only after the writer succeeded.

mod stl;
mod threemf;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use pf_cad::TessellatedMesh;
use tracing::info;

use crate::document::ModelDocument;

pub use stl::write_stl;
pub use threemf::{unique_names, write_3mf};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Binary STL, all solids in one triangle list
    Stl,
    /// 3MF package with one object per solid
    ThreeMf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Stl => "stl",
            ExportFormat::ThreeMf => "3mf",
        }
    }

    /// Final output path for a requested path
    ///
    /// 3MF output always carries its extension; STL paths are used as given.
    pub fn output_path(&self, requested: &Path) -> PathBuf {
        match self {
            ExportFormat::Stl => requested.to_path_buf(),
            ExportFormat::ThreeMf => {
                let has_ext = requested
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("3mf"));
                if has_ext {
                    requested.to_path_buf()
                } else {
                    let mut name = requested.as_os_str().to_owned();
                    name.push(".3mf");
                    PathBuf::from(name)
                }
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Stl => write!(f, "STL"),
            ExportFormat::ThreeMf => write!(f, "3MF"),
        }
    }
}

/// Export errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExportError {
    #[error("cannot write {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("cannot tessellate {solid}: {message}")]
    Tessellation { solid: String, message: String },
    #[error("STL write error: {0}")]
    Stl(String),
    #[error("3MF write error: {0}")]
    ThreeMf(String),
    #[error("nothing to export: {0}")]
    Empty(String),
}

/// A tessellated solid ready for writing
#[derive(Debug, Clone)]
pub struct SolidMesh {
    pub name: String,
    pub mesh: TessellatedMesh,
}

/// Tessellate every solid of a document
pub fn tessellate(doc: &ModelDocument, tolerance: f64) -> Result<Vec<SolidMesh>, ExportError> {
    if doc.is_empty() {
        return Err(ExportError::Empty(format!("model {} has no solids", doc.model())));
    }
    doc.solids()
        .iter()
        .map(|named| {
            let mesh = doc
                .kernel()
                .tessellate(&named.solid, tolerance)
                .map_err(|e| ExportError::Tessellation {
                    solid: named.name.clone(),
                    message: e.to_string(),
                })?;
            if mesh.is_empty() {
                return Err(ExportError::Tessellation {
                    solid: named.name.clone(),
                    message: "kernel returned no triangles".into(),
                });
            }
            Ok(SolidMesh {
                name: named.name.clone(),
                mesh,
            })
        })
        .collect()
}

/// Tessellate a document and write it in `format`
///
/// Uses the document's tessellation tolerance. Returns the path actually
/// written.
pub fn export(
    doc: &ModelDocument,
    format: ExportFormat,
    requested: &Path,
) -> Result<PathBuf, ExportError> {
    let meshes = tessellate(doc, doc.settings().tessellation_tolerance_mm)?;
    let path = format.output_path(requested);
    write_atomic(&path, |out| match format {
        ExportFormat::Stl => write_stl(&meshes, out),
        ExportFormat::ThreeMf => write_3mf(doc.model(), &meshes, out),
    })?;
    let triangles: usize = meshes.iter().map(|m| m.mesh.triangle_count()).sum();
    info!(
        path = %path.display(),
        format = %format,
        solids = meshes.len(),
        triangles,
        "exported"
    );
    Ok(path)
}

/// Write through a temporary file in the target directory, then persist it
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut std::fs::File) -> Result<(), ExportError>,
) -> Result<(), ExportError> {
    let io_err = |e: &dyn fmt::Display| ExportError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(".pf-export");
    // created like any other output file, subject to the umask
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(|e| io_err(&e))?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().flush().map_err(|e| io_err(&e))?;
    tmp.persist(path).map_err(|e| io_err(&e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;
    use glam::DVec3;
    use pf_cad::{CadKernel, MockKernel, NamedSolid};

    pub(super) fn two_boxes() -> ModelDocument {
        let kernel = MockKernel::new();
        let solids = vec![
            NamedSolid {
                name: "Base".into(),
                solid: kernel.create_box(DVec3::ZERO, DVec3::new(10.0, 5.0, 2.0)).unwrap(),
            },
            NamedSolid {
                name: "Base".into(),
                solid: kernel
                    .create_box(DVec3::new(20.0, 0.0, 0.0), DVec3::ONE)
                    .unwrap(),
            },
        ];
        ModelDocument::new("boxes", ParameterSet::default(), Box::new(kernel), solids)
    }

    #[test]
    fn test_output_path_appends_3mf() {
        let f = ExportFormat::ThreeMf;
        assert_eq!(f.output_path(Path::new("out/part")), PathBuf::from("out/part.3mf"));
        assert_eq!(f.output_path(Path::new("part.3MF")), PathBuf::from("part.3MF"));
        assert_eq!(f.output_path(Path::new("part.stl")), PathBuf::from("part.stl.3mf"));
        assert_eq!(
            ExportFormat::Stl.output_path(Path::new("part")),
            PathBuf::from("part")
        );
    }

    #[test]
    fn test_tessellate_all_solids() {
        let meshes = tessellate(&two_boxes(), 0.05).unwrap();
        assert_eq!(meshes.len(), 2);
        assert!(meshes.iter().all(|m| m.mesh.triangle_count() == 12));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let doc = ModelDocument::new(
            "nothing",
            ParameterSet::default(),
            Box::new(MockKernel::new()),
            Vec::new(),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.stl");
        assert!(matches!(
            export(&doc, ExportFormat::Stl, &path),
            Err(ExportError::Empty(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.stl");
        let result = write_atomic(&path, |_| Err(ExportError::Stl("boom".into())));
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_exported_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = export(&two_boxes(), ExportFormat::Stl, &dir.path().join("out.stl")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o644, 0o644, "mode {:o}", mode);
    }

    #[test]
    fn test_unwritable_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.stl");
        assert!(matches!(
            export(&two_boxes(), ExportFormat::Stl, &path),
            Err(ExportError::Io { .. })
        ));
    }
}

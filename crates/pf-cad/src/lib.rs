//! CAD Kernel Abstraction and Construction Pipeline
//!
//! This crate provides:
//! - Abstract CAD kernel traits for geometry operations
//! - Truck, OpenCASCADE and deterministic mock backends
//! - Declarative edge selectors for rounding
//! - A staged construction pipeline enforcing cut / fuse / round / detail order

pub mod kernel;
pub mod pipeline;
pub mod selector;

// Re-exports for convenience
pub use kernel::{
    Aabb, Axis3D, BooleanType, CadError, CadKernel, CadResult, CurveKind, EdgeId, EdgeInfo,
    MockKernel, NullKernel, Profile, ProfileSegment, Solid, SolidProperties, TessellatedMesh,
    available_kernels, default_kernel, kernel_by_name,
};
pub use pipeline::{
    Body, BoxFace, Clearance, Detailing, Joining, NamedSolid, PipelineError, PipelineResult,
    RoundBatch, Rounding, Shaping, Stage,
};
pub use selector::{Axis, EdgeSelector, Interval, Region};

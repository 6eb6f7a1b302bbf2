//! CAD kernel abstraction and backends

mod mock;
#[cfg(feature = "opencascade")]
mod opencascade;
mod traits;
#[cfg(feature = "truck")]
mod truck;

pub use mock::MockKernel;
#[cfg(feature = "opencascade")]
pub use opencascade::OpenCascadeKernel;
pub use traits::*;
#[cfg(feature = "truck")]
pub use truck::TruckKernel;

/// Names accepted by [`kernel_by_name`], in preference order
pub fn available_kernels() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "opencascade")]
    names.push("opencascade");
    #[cfg(feature = "truck")]
    names.push("truck");
    names.push("mock");
    names.push("null");
    names
}

/// Instantiate a kernel backend by name
pub fn kernel_by_name(name: &str) -> CadResult<Box<dyn CadKernel>> {
    match name {
        #[cfg(feature = "opencascade")]
        "opencascade" | "occ" => Ok(Box::new(OpenCascadeKernel::new())),
        #[cfg(feature = "truck")]
        "truck" => Ok(Box::new(TruckKernel::new())),
        "mock" => Ok(Box::new(MockKernel::new())),
        "null" => Ok(Box::new(NullKernel)),
        other => Err(CadError::KernelNotAvailable(format!(
            "unknown kernel '{}' (available: {})",
            other,
            available_kernels().join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_by_name() {
        assert_eq!(kernel_by_name("mock").map(|k| k.name().to_string()).ok(), Some("mock".into()));
        assert!(!kernel_by_name("null").map(|k| k.is_available()).unwrap_or(true));
        assert!(matches!(
            kernel_by_name("parasolid"),
            Err(CadError::KernelNotAvailable(_))
        ));
    }

    #[test]
    fn test_default_kernel_is_listed() {
        let kernel = default_kernel();
        assert!(available_kernels().contains(&kernel.name()));
    }
}

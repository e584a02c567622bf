//!
//! The AMDGPU function attributes.
//!

///
/// The string function attributes stamped onto entry functions.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// The eponymous AMDGPU attribute.
    FlatWorkGroupSize {
        /// The minimal workgroup size.
        min: u32,
        /// The maximal workgroup size.
        max: u32,
    },
    /// The eponymous LLVM attribute.
    TargetCpu(String),
    /// The eponymous LLVM attribute.
    TargetFeatures(String),
    /// The eponymous AMDGPU attribute.
    UniformWorkGroupSize,
}

impl Attribute {
    ///
    /// Returns the attribute key.
    ///
    pub fn key(&self) -> &'static str {
        match self {
            Self::FlatWorkGroupSize { .. } => "amdgpu-flat-work-group-size",
            Self::TargetCpu(_) => "target-cpu",
            Self::TargetFeatures(_) => "target-features",
            Self::UniformWorkGroupSize => "uniform-work-group-size",
        }
    }

    ///
    /// Returns the attribute value.
    ///
    pub fn value(&self) -> String {
        match self {
            Self::FlatWorkGroupSize { min, max } => format!("{},{}", min, max),
            Self::TargetCpu(cpu) => cpu.to_owned(),
            Self::TargetFeatures(features) => features.to_owned(),
            Self::UniformWorkGroupSize => "true".to_owned(),
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"=\"{}\"", self.key(), self.value())
    }
}

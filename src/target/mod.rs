//!
//! The AMDGPU target description.
//!

pub mod address_space;
pub mod attribute;

use std::str::FromStr;

use crate::error::Error;
use crate::module::IrModule;

use self::attribute::Attribute;

/// The AMDGPU target triple.
pub const TRIPLE: &str = "amdgcn-amd-amdhsa";

/// The AMDGPU data layout, identical for every supported architecture.
pub const DATA_LAYOUT: &str = "e-p:64:64-p1:64:64-p2:32:32-p3:32:32-p4:64:64-p5:32:32-p6:32:32-p7:160:256:256:32-p8:128:128-i64:64-v16:16-v24:32-v32:32-v48:64-v96:128-v192:256-v256:256-v512:512-v1024:1024-v2048:2048-n32:64-S32-A5-G1-ni:7:8";

/// The maximal flat workgroup size supported by every architecture.
pub const MAX_FLAT_WORKGROUP_SIZE: u32 = 1024;

///
/// The AMD GPU architecture, e.g. `gfx90a` or `gfx90a:sramecc+:xnack-`.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Architecture(String);

impl Architecture {
    /// The offload bundle target identifier prefix.
    pub const TARGET_ID_PREFIX: &'static str = "hip-amdgcn-amd-amdhsa--";

    /// The offload bundle target identifier prefix used by the code object v4 toolchains.
    pub const TARGET_ID_PREFIX_V4: &'static str = "hipv4-amdgcn-amd-amdhsa--";

    ///
    /// A shortcut constructor.
    ///
    pub fn new(name: &str) -> anyhow::Result<Self> {
        let name = name.trim();
        let processor = name.split(':').next().unwrap_or_default();
        let is_valid = processor.len() > 3
            && processor.starts_with("gfx")
            && processor.chars().all(|c| c.is_ascii_alphanumeric());
        if !is_valid {
            return Err(Error::Configuration(format!(
                "invalid AMD GPU architecture `{}`, expected e.g. `gfx90a`",
                name
            ))
            .into());
        }
        Ok(Self(name.to_owned()))
    }

    ///
    /// Returns the full architecture string, including the target features.
    ///
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    ///
    /// Returns the processor name without the target features.
    ///
    pub fn processor(&self) -> &str {
        self.0.split(':').next().unwrap_or(self.0.as_str())
    }

    ///
    /// Returns the canonical offload bundle target identifier.
    ///
    pub fn target_id(&self) -> String {
        format!("{}{}", Self::TARGET_ID_PREFIX, self.0)
    }

    ///
    /// Returns every offload bundle target identifier naming the architecture.
    ///
    pub fn target_ids(&self) -> [String; 2] {
        [
            self.target_id(),
            format!("{}{}", Self::TARGET_ID_PREFIX_V4, self.0),
        ]
    }

    ///
    /// Returns the default wavefront size.
    ///
    /// RDNA processors (`gfx10xx` and newer) default to wave32.
    ///
    pub fn wavefront_size(&self) -> u32 {
        if self.processor().len() >= "gfx1000".len() {
            32
        } else {
            64
        }
    }
}

impl FromStr for Architecture {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// The role of the entry function of a code library.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionRole {
    /// A kernel launched from the host.
    Kernel,
    /// A function callable from other device code only.
    DeviceFunction,
}

///
/// The function linkage.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// The default linkage, which has no keyword on definitions.
    External,
    /// The eponymous LLVM linkage.
    LinkOnceOdr,
    /// The eponymous LLVM linkage.
    Internal,
}

impl Linkage {
    /// Every linkage keyword of the LLVM assembly.
    pub const KEYWORDS: [&'static str; 11] = [
        "private",
        "internal",
        "available_externally",
        "linkonce",
        "weak",
        "common",
        "appending",
        "extern_weak",
        "linkonce_odr",
        "weak_odr",
        "external",
    ];

    ///
    /// Returns the definition keyword, if any.
    ///
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::External => None,
            Self::LinkOnceOdr => Some("linkonce_odr"),
            Self::Internal => Some("internal"),
        }
    }
}

///
/// The symbol visibility.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// The eponymous LLVM visibility.
    Default,
    /// The eponymous LLVM visibility.
    Hidden,
    /// The eponymous LLVM visibility.
    Protected,
}

impl Visibility {
    /// Every visibility keyword of the LLVM assembly.
    pub const KEYWORDS: [&'static str; 3] = ["default", "hidden", "protected"];

    ///
    /// Returns the definition keyword, if any.
    ///
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Hidden => Some("hidden"),
            Self::Protected => Some("protected"),
        }
    }
}

///
/// The calling convention.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// The AMDGPU kernel calling convention.
    AmdgpuKernel,
}

impl CallingConvention {
    /// Every named calling convention keyword which may precede a definition.
    pub const KEYWORDS: [&'static str; 8] = [
        "ccc",
        "fastcc",
        "coldcc",
        "amdgpu_kernel",
        "amdgpu_gfx",
        "amdgpu_cs",
        "spir_kernel",
        "spir_func",
    ];

    ///
    /// Returns the calling convention keyword.
    ///
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::AmdgpuKernel => "amdgpu_kernel",
        }
    }
}

///
/// The binary contract of an entry function.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAbi {
    /// The linkage.
    pub linkage: Linkage,
    /// The visibility.
    pub visibility: Visibility,
    /// The calling convention, if not the default one.
    pub calling_convention: Option<CallingConvention>,
    /// The function attributes.
    pub attributes: Vec<Attribute>,
}

impl FunctionAbi {
    ///
    /// Returns the contract of the function with `role` on `architecture`.
    ///
    pub fn new(role: FunctionRole, architecture: &Architecture) -> Self {
        let target_cpu = Attribute::TargetCpu(architecture.processor().to_owned());
        let target_features = Attribute::TargetFeatures(format!(
            "+wavefrontsize{}",
            architecture.wavefront_size()
        ));

        match role {
            FunctionRole::Kernel => Self {
                linkage: Linkage::External,
                visibility: Visibility::Protected,
                calling_convention: Some(CallingConvention::AmdgpuKernel),
                attributes: vec![
                    Attribute::FlatWorkGroupSize {
                        min: 1,
                        max: MAX_FLAT_WORKGROUP_SIZE,
                    },
                    target_cpu,
                    target_features,
                    Attribute::UniformWorkGroupSize,
                ],
            },
            FunctionRole::DeviceFunction => Self {
                linkage: Linkage::LinkOnceOdr,
                visibility: Visibility::Hidden,
                calling_convention: None,
                attributes: vec![target_cpu, target_features],
            },
        }
    }
}

///
/// Prepares `module` for `architecture` in place.
///
/// Sets the data layout and target triple, and applies the role-specific contract to the
/// definition named `entry_name`. A module without such a definition is left otherwise intact.
///
pub fn apply_target_modifications(
    module: &mut dyn IrModule,
    architecture: &Architecture,
    entry_name: Option<&str>,
    role: FunctionRole,
) -> anyhow::Result<()> {
    module.set_data_layout(DATA_LAYOUT);
    module.set_triple(TRIPLE);

    if let Some(entry_name) = entry_name {
        let abi = FunctionAbi::new(role, architecture);
        if !module.set_function_abi(entry_name, &abi)? {
            tracing::debug!(
                module = module.name(),
                entry = entry_name,
                "entry function is not defined in the module"
            );
        }
    }

    Ok(())
}

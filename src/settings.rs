//!
//! The code generator settings.
//!

use crate::dump_flag::DumpFlag;
use crate::error::Error;

///
/// The mid-end optimization level.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizationLevel {
    /// `-O0`.
    None,
    /// `-O1`.
    Less,
    /// `-O2`.
    Default,
    /// `-O3`.
    Aggressive,
}

impl OptimizationLevel {
    ///
    /// Returns the new pass manager pipeline for the level.
    ///
    pub fn pass_pipeline(&self) -> &'static str {
        match self {
            Self::None => "default<O0>",
            Self::Less => "default<O1>",
            Self::Default => "default<O2>",
            Self::Aggressive => "default<O3>",
        }
    }
}

impl TryFrom<&str> for OptimizationLevel {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "0" => Ok(Self::None),
            "1" => Ok(Self::Less),
            "2" => Ok(Self::Default),
            "3" => Ok(Self::Aggressive),
            other => Err(Error::Configuration(format!(
                "invalid optimization level `{}`, expected one of 0, 1, 2, 3",
                other
            ))
            .into()),
        }
    }
}

#[cfg(feature = "llvm")]
impl From<OptimizationLevel> for inkwell::OptimizationLevel {
    fn from(value: OptimizationLevel) -> Self {
        match value {
            OptimizationLevel::None => Self::None,
            OptimizationLevel::Less => Self::Less,
            OptimizationLevel::Default => Self::Default,
            OptimizationLevel::Aggressive => Self::Aggressive,
        }
    }
}

///
/// The code generator settings.
///
#[derive(Debug, Clone)]
pub struct Settings {
    /// Whether to share compiled link-time dependencies through the linker cache.
    pub use_linker_cache: bool,
    /// Whether the mid-end optimizer may run on linked modules.
    pub enable_midend_optimizations: bool,
    /// The mid-end optimization level.
    pub optimization_level: OptimizationLevel,
    /// The IR dump flags.
    pub dump_flags: Vec<DumpFlag>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(true, true, OptimizationLevel::Aggressive, vec![])
    }
}

impl Settings {
    /// The linker cache toggle environment variable.
    pub const ENV_USE_LINKER_CACHE: &'static str = "AMDGPU_CODEGEN_USE_LINKER_CACHE";

    /// The mid-end optimizer toggle environment variable.
    pub const ENV_ENABLE_MIDEND_OPT: &'static str = "AMDGPU_CODEGEN_ENABLE_MIDEND_OPT";

    /// The mid-end optimization level environment variable.
    pub const ENV_OPT_LEVEL: &'static str = "AMDGPU_CODEGEN_OPT_LEVEL";

    /// The comma-separated dump flags environment variable.
    pub const ENV_DUMP: &'static str = "AMDGPU_CODEGEN_DUMP";

    ///
    /// A shortcut constructor.
    ///
    pub fn new(
        use_linker_cache: bool,
        enable_midend_optimizations: bool,
        optimization_level: OptimizationLevel,
        dump_flags: Vec<DumpFlag>,
    ) -> Self {
        Self {
            use_linker_cache,
            enable_midend_optimizations,
            optimization_level,
            dump_flags,
        }
    }

    ///
    /// Reads the settings from the process environment.
    ///
    /// Unset variables keep their default values.
    ///
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    ///
    /// Reads the settings from an arbitrary variable source.
    ///
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup(Self::ENV_USE_LINKER_CACHE) {
            settings.use_linker_cache = parse_bool(Self::ENV_USE_LINKER_CACHE, value.as_str())?;
        }
        if let Some(value) = lookup(Self::ENV_ENABLE_MIDEND_OPT) {
            settings.enable_midend_optimizations =
                parse_bool(Self::ENV_ENABLE_MIDEND_OPT, value.as_str())?;
        }
        if let Some(value) = lookup(Self::ENV_OPT_LEVEL) {
            settings.optimization_level = OptimizationLevel::try_from(value.as_str())?;
        }
        if let Some(value) = lookup(Self::ENV_DUMP) {
            settings.dump_flags = value
                .split(',')
                .filter(|flag| !flag.trim().is_empty())
                .map(str::parse)
                .collect::<anyhow::Result<Vec<DumpFlag>>>()?;
        }

        Ok(settings)
    }

    ///
    /// Checks whether the specified dump flag is set.
    ///
    pub fn has_dump_flag(&self, dump_flag: DumpFlag) -> bool {
        self.dump_flags.contains(&dump_flag)
    }
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Configuration(format!(
            "`{}` must be a boolean, found `{}`",
            name, other
        ))
        .into()),
    }
}

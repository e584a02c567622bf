//!
//! The LLVM optimizing tools.
//!

use crate::settings::OptimizationLevel;
use crate::target::Architecture;
use crate::target::TRIPLE;

///
/// The LLVM optimizing tools.
///
#[derive(Debug)]
pub struct Optimizer {
    /// The LLVM target machine.
    target_machine: inkwell::targets::TargetMachine,
    /// The middle-end optimization level.
    level: OptimizationLevel,
}

impl Optimizer {
    /// The LLVM target name.
    pub const TARGET_NAME: &'static str = "amdgcn";

    ///
    /// A shortcut constructor.
    ///
    pub fn new(architecture: &Architecture, level: OptimizationLevel) -> anyhow::Result<Self> {
        inkwell::targets::Target::initialize_amd_gpu(
            &inkwell::targets::InitializationConfig::default(),
        );

        let triple = inkwell::targets::TargetTriple::create(TRIPLE);
        let target_machine = inkwell::targets::Target::from_triple(&triple)
            .map_err(|error| {
                anyhow::anyhow!("LLVM target `{}` not found: {}", Self::TARGET_NAME, error)
            })?
            .create_target_machine(
                &triple,
                architecture.processor(),
                Self::target_features(architecture).as_str(),
                level.into(),
                inkwell::targets::RelocMode::PIC,
                inkwell::targets::CodeModel::Default,
            )
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "LLVM target machine `{}` initialization error for `{}`",
                    Self::TARGET_NAME,
                    architecture
                )
            })?;

        Ok(Self {
            target_machine,
            level,
        })
    }

    ///
    /// Sets the target triple and data layout of `module`.
    ///
    pub fn set_module(&self, module: &inkwell::module::Module) {
        module.set_triple(&self.target_machine.get_triple());
        module.set_data_layout(&self.target_machine.get_target_data().get_data_layout());
    }

    ///
    /// Runs the optimization pipeline on `module`.
    ///
    pub fn run(&self, module: &inkwell::module::Module) -> anyhow::Result<()> {
        self.set_module(module);
        module
            .run_passes(
                self.level.pass_pipeline(),
                &self.target_machine,
                inkwell::passes::PassBuilderOptions::create(),
            )
            .map_err(|error| anyhow::anyhow!("LLVM optimizer error: {}", error))
    }

    ///
    /// Converts the `gfx90a:sramecc+:xnack-` feature suffix into `+sramecc,-xnack`.
    ///
    fn target_features(architecture: &Architecture) -> String {
        architecture
            .as_str()
            .split(':')
            .skip(1)
            .filter_map(|feature| {
                let sign = feature.chars().last().filter(|sign| *sign == '+' || *sign == '-')?;
                Some(format!("{}{}", sign, &feature[..feature.len() - 1]))
            })
            .collect::<Vec<String>>()
            .join(",")
    }
}

//!
//! The inkwell implementation of the LLVM module tools.
//!

pub mod optimizer;

use std::rc::Rc;

use crate::buffer::BufferFormat;
use crate::buffer::LlvmBuffer;
use crate::settings::OptimizationLevel;
use crate::target::Architecture;
use crate::toolchain::IrTools;

use self::optimizer::Optimizer;

///
/// The LLVM module tools backed by the in-process LLVM.
///
/// Every call parses its inputs into a fresh LLVM context, so no LLVM object outlives the call.
///
#[derive(Debug, Default)]
pub struct InkwellTools;

impl InkwellTools {
    ///
    /// Parses an LLVM module in either format.
    ///
    fn parse<'ctx>(
        context: &'ctx inkwell::context::Context,
        name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<inkwell::module::Module<'ctx>> {
        let buffer = inkwell::memory_buffer::MemoryBuffer::create_from_memory_range_copy(bytes, name);
        context
            .create_module_from_ir(buffer)
            .map_err(|error| anyhow::anyhow!("LLVM module `{}` parsing error: {}", name, error))
    }

    ///
    /// Serializes `module` as bitcode or LLVM assembly.
    ///
    fn serialize(module: &inkwell::module::Module, to_bitcode: bool) -> Vec<u8> {
        if to_bitcode {
            module.write_bitcode_to_memory().as_slice().to_vec()
        } else {
            module.print_to_string().to_string().into_bytes()
        }
    }
}

impl IrTools for InkwellTools {
    fn to_assembly(&self, bitcode: &[u8]) -> anyhow::Result<String> {
        let context = inkwell::context::Context::create();
        let module = Self::parse(&context, "bitcode", bitcode)?;
        Ok(module.print_to_string().to_string())
    }

    fn link_modules(
        &self,
        inputs: &[Rc<LlvmBuffer>],
        to_bitcode: bool,
    ) -> anyhow::Result<Vec<u8>> {
        let context = inkwell::context::Context::create();
        let mut inputs = inputs.iter();
        let first = inputs
            .next()
            .ok_or_else(|| anyhow::anyhow!("no LLVM modules to link"))?;
        let module = Self::parse(&context, first.name(), first.bytes())?;
        for input in inputs {
            let other = Self::parse(&context, input.name(), input.bytes())?;
            module.link_in_module(other).map_err(|error| {
                anyhow::anyhow!("LLVM module `{}` linking error: {}", input.name(), error)
            })?;
        }
        Ok(Self::serialize(&module, to_bitcode))
    }

    fn optimize(
        &self,
        module: &[u8],
        architecture: &Architecture,
        level: OptimizationLevel,
    ) -> anyhow::Result<Vec<u8>> {
        let context = inkwell::context::Context::create();
        let parsed = Self::parse(&context, "linked", module)?;
        Optimizer::new(architecture, level)?.run(&parsed)?;
        let to_bitcode = BufferFormat::detect(module) == BufferFormat::Bitcode;
        Ok(Self::serialize(&parsed, to_bitcode))
    }
}

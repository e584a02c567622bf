//!
//! The IR module seam.
//!

pub mod text;

use crate::target::FunctionAbi;

///
/// Implemented by the IR modules handed over by the IR module builder.
///
/// A code library owns exactly one module and never mutates it after finalization:
/// the target modifications are applied to a per-architecture copy.
///
pub trait IrModule: std::fmt::Debug {
    ///
    /// Returns the module name.
    ///
    fn name(&self) -> &str;

    ///
    /// Sets the module target triple.
    ///
    fn set_triple(&mut self, triple: &str);

    ///
    /// Sets the module data layout.
    ///
    fn set_data_layout(&mut self, data_layout: &str);

    ///
    /// Applies `abi` to the function definition called `name`.
    ///
    /// Returns `false` if the module does not define such a function.
    ///
    fn set_function_abi(&mut self, name: &str, abi: &FunctionAbi) -> anyhow::Result<bool>;

    ///
    /// Returns the header of the function definition called `name`, if any.
    ///
    fn function_definition(&self, name: &str) -> Option<String>;

    ///
    /// Prints the module as LLVM assembly.
    ///
    fn print_to_string(&self) -> String;

    ///
    /// Returns an independent copy of the module.
    ///
    fn clone_module(&self) -> Box<dyn IrModule>;
}

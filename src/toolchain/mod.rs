//!
//! The external toolchain seams.
//!
//! The code library never compiles, links or loads anything itself. It delegates to the
//! collaborators below, which are bundled into a `Toolchain` and shared by the libraries
//! of one `Codegen`.
//!

#[cfg(feature = "llvm")]
pub mod llvm;

use std::rc::Rc;

use crate::buffer::LlvmBuffer;
use crate::settings::OptimizationLevel;
use crate::target::Architecture;

///
/// The ahead-of-link compiler output.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOutput {
    /// The LLVM bitcode, possibly wrapped into an offload bundle.
    pub bitcode: Vec<u8>,
    /// The compiler diagnostics.
    pub log: String,
}

///
/// The ahead-of-link compiler of the device source, e.g. HIPRTC.
///
pub trait SourceCompiler {
    ///
    /// Compiles `source` for `architecture` with the extra `options`.
    ///
    fn compile(
        &self,
        source: &[u8],
        name: &str,
        architecture: &Architecture,
        options: &[String],
    ) -> anyhow::Result<CompilerOutput>;
}

///
/// The LLVM module tools.
///
pub trait IrTools {
    ///
    /// Prints LLVM bitcode as LLVM assembly.
    ///
    fn to_assembly(&self, bitcode: &[u8]) -> anyhow::Result<String>;

    ///
    /// Links `inputs` into one module, in the given order.
    ///
    /// Returns bitcode if `to_bitcode` is set, and LLVM assembly otherwise.
    ///
    fn link_modules(&self, inputs: &[Rc<LlvmBuffer>], to_bitcode: bool)
        -> anyhow::Result<Vec<u8>>;

    ///
    /// Runs the mid-end optimizer on `module` for `architecture`.
    ///
    /// Returns the module in the input format.
    ///
    fn optimize(
        &self,
        module: &[u8],
        architecture: &Architecture,
        level: OptimizationLevel,
    ) -> anyhow::Result<Vec<u8>>;
}

///
/// The device linker session, e.g. a HIPRTC link state.
///
pub trait Linker {
    ///
    /// Adds an LLVM module in either format.
    ///
    fn add_ir(&mut self, module: &[u8]) -> anyhow::Result<()>;

    ///
    /// Links the added modules into a code object.
    ///
    fn complete(&mut self) -> anyhow::Result<Vec<u8>>;

    ///
    /// Returns the linker diagnostics.
    ///
    fn info_log(&self) -> String;
}

///
/// The device description.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    /// The device ordinal.
    pub id: u32,
    /// The device architecture.
    pub architecture: Architecture,
}

///
/// The loaded device function handle.
///
pub trait DeviceFunction: std::fmt::Debug {
    ///
    /// Returns the function symbol name.
    ///
    fn name(&self) -> &str;
}

///
/// The code object loaded into a device context.
///
pub trait ModuleImage {
    ///
    /// Looks up the function called `name`.
    ///
    fn get_function(&self, name: &str) -> anyhow::Result<Rc<dyn DeviceFunction>>;
}

///
/// The device context.
///
pub trait DeviceContext {
    ///
    /// Returns the context device.
    ///
    fn device(&self) -> Device;

    ///
    /// Loads `code_object` into the context.
    ///
    fn create_module_image(&self, code_object: &[u8]) -> anyhow::Result<Box<dyn ModuleImage>>;
}

///
/// The device runtime driver.
///
pub trait Driver {
    ///
    /// Returns the runtime version.
    ///
    fn version(&self) -> semver::Version;

    ///
    /// Returns the current device context.
    ///
    fn current_context(&self) -> anyhow::Result<Rc<dyn DeviceContext>>;

    ///
    /// Starts a linker session for `architecture`.
    ///
    fn new_linker(
        &self,
        architecture: &Architecture,
        max_registers: Option<u32>,
    ) -> anyhow::Result<Box<dyn Linker>>;

    ///
    /// Returns the architecture of the current device.
    ///
    fn current_architecture(&self) -> anyhow::Result<Architecture> {
        Ok(self.current_context()?.device().architecture)
    }
}

///
/// The device support library, e.g. the ROCm device libraries.
///
pub trait DeviceLibrary {
    ///
    /// Returns the library as a linkable LLVM module.
    ///
    fn llvm_module(&self, architecture: &Architecture) -> anyhow::Result<Rc<LlvmBuffer>>;

    ///
    /// Returns the library bitcode, as fed to the device linker.
    ///
    fn llvm_bitcode(&self, architecture: &Architecture) -> anyhow::Result<Rc<[u8]>>;
}

///
/// The collaborators of the code libraries.
///
pub struct Toolchain {
    /// The ahead-of-link compiler.
    pub compiler: Box<dyn SourceCompiler>,
    /// The LLVM module tools.
    pub ir_tools: Box<dyn IrTools>,
    /// The device runtime driver.
    pub driver: Box<dyn Driver>,
    /// The device support library.
    pub device_library: Box<dyn DeviceLibrary>,
}

impl Toolchain {
    ///
    /// A shortcut constructor.
    ///
    pub fn new(
        compiler: Box<dyn SourceCompiler>,
        ir_tools: Box<dyn IrTools>,
        driver: Box<dyn Driver>,
        device_library: Box<dyn DeviceLibrary>,
    ) -> Self {
        Self {
            compiler,
            ir_tools,
            driver,
            device_library,
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}

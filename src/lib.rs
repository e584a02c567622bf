//!
//! The AMDGPU LLVM code library.
//!

pub(crate) mod buffer;
pub(crate) mod cache;
pub(crate) mod codegen;
pub(crate) mod dependency;
pub(crate) mod dump_flag;
pub(crate) mod error;
pub(crate) mod hashes;
pub(crate) mod library;
pub(crate) mod module;
pub(crate) mod settings;
pub(crate) mod target;
pub(crate) mod toolchain;

#[cfg(test)]
pub(crate) mod testing;

pub use self::buffer::offload_bundle;
pub use self::buffer::BufferFormat;
pub use self::buffer::LlvmBuffer;
pub use self::cache::CacheKey;
pub use self::cache::LinkerCache;
pub use self::codegen::Codegen;
pub use self::dependency::BufferDependency;
pub use self::dependency::Dependency;
pub use self::dependency::DependencyKey;
pub use self::dependency::FileDependency;
pub use self::dependency::SourceKind;
pub use self::dump_flag::DumpFlag;
pub use self::error::Error;
pub use self::library::bundle;
pub use self::library::postprocess;
pub use self::library::reduced::ReducedLibrary;
pub use self::library::walk::Node;
pub use self::library::CodeLibrary;
pub use self::library::LibraryId;
pub use self::library::LibraryOptions;
pub use self::library::State as LibraryState;
pub use self::module::text::TextModule;
pub use self::module::IrModule;
pub use self::settings::OptimizationLevel;
pub use self::settings::Settings;
pub use self::target::address_space::AddressSpace;
pub use self::target::attribute::Attribute;
pub use self::target::Architecture;
pub use self::target::CallingConvention;
pub use self::target::FunctionAbi;
pub use self::target::FunctionRole;
pub use self::target::Linkage;
pub use self::target::Visibility;
pub use self::target::DATA_LAYOUT;
pub use self::target::TRIPLE;
#[cfg(feature = "llvm")]
pub use self::toolchain::llvm::optimizer::Optimizer;
#[cfg(feature = "llvm")]
pub use self::toolchain::llvm::InkwellTools;
pub use self::toolchain::CompilerOutput;
pub use self::toolchain::Device;
pub use self::toolchain::DeviceContext;
pub use self::toolchain::DeviceFunction;
pub use self::toolchain::DeviceLibrary;
pub use self::toolchain::Driver;
pub use self::toolchain::IrTools;
pub use self::toolchain::Linker;
pub use self::toolchain::ModuleImage;
pub use self::toolchain::SourceCompiler;
pub use self::toolchain::Toolchain;

//!
//! The in-memory toolchain for the unit tests.
//!
//! The fakes model LLVM modules as plain text: bitcode is the text behind the bitcode magic,
//! linking concatenates, and every toolchain call is counted.
//!

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use crate::buffer::BufferFormat;
use crate::buffer::LlvmBuffer;
use crate::codegen::Codegen;
use crate::dependency::Dependency;
use crate::error::Error;
use crate::library::CodeLibrary;
use crate::library::LibraryOptions;
use crate::module::text::TextModule;
use crate::module::IrModule;
use crate::settings::OptimizationLevel;
use crate::settings::Settings;
use crate::target::Architecture;
use crate::toolchain::CompilerOutput;
use crate::toolchain::Device;
use crate::toolchain::DeviceContext;
use crate::toolchain::DeviceFunction;
use crate::toolchain::DeviceLibrary;
use crate::toolchain::Driver;
use crate::toolchain::IrTools;
use crate::toolchain::Linker;
use crate::toolchain::ModuleImage;
use crate::toolchain::SourceCompiler;
use crate::toolchain::Toolchain;

///
/// The toolchain call counters, and the current device.
///
#[derive(Debug, Default)]
pub struct Counters {
    pub compilations: Cell<usize>,
    pub module_links: Cell<usize>,
    pub device_links: Cell<usize>,
    pub optimizations: Cell<usize>,
    pub disassemblies: Cell<usize>,
    pub loads: Cell<usize>,
    /// The current device; `None` is the gfx90a device 0.
    pub device: RefCell<Option<Device>>,
}

impl Counters {
    ///
    /// Makes the device `id` of `architecture` current.
    ///
    pub fn select_device(&self, id: u32, architecture: Architecture) {
        *self.device.borrow_mut() = Some(Device { id, architecture });
    }
}

fn increment(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

fn strip_magic(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_prefix(BufferFormat::BITCODE_MAGIC.as_slice())
        .unwrap_or(bytes)
}

///
/// The LLVM module tools over text modules.
///
#[derive(Debug, Default)]
pub struct FakeIrTools {
    pub counters: Rc<Counters>,
}

impl FakeIrTools {
    ///
    /// Wraps `text` as fake bitcode.
    ///
    pub fn bitcode(text: &str) -> Vec<u8> {
        let mut bytes = BufferFormat::BITCODE_MAGIC.to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }
}

impl IrTools for FakeIrTools {
    fn to_assembly(&self, bitcode: &[u8]) -> anyhow::Result<String> {
        increment(&self.counters.disassemblies);
        Ok(String::from_utf8_lossy(strip_magic(bitcode)).into_owned())
    }

    fn link_modules(
        &self,
        inputs: &[Rc<LlvmBuffer>],
        to_bitcode: bool,
    ) -> anyhow::Result<Vec<u8>> {
        increment(&self.counters.module_links);
        let text = inputs
            .iter()
            .map(|input| String::from_utf8_lossy(strip_magic(input.bytes())).into_owned())
            .collect::<Vec<String>>()
            .join("\n");
        Ok(if to_bitcode {
            Self::bitcode(text.as_str())
        } else {
            text.into_bytes()
        })
    }

    fn optimize(
        &self,
        module: &[u8],
        architecture: &Architecture,
        level: OptimizationLevel,
    ) -> anyhow::Result<Vec<u8>> {
        increment(&self.counters.optimizations);
        let mut optimized = module.to_vec();
        optimized.extend_from_slice(
            format!(
                "\n; optimized for {} with {}",
                architecture,
                level.pass_pipeline()
            )
            .as_bytes(),
        );
        Ok(optimized)
    }
}

///
/// The compiler failing on sources with an `#error` directive.
///
#[derive(Debug)]
pub struct FakeCompiler {
    counters: Rc<Counters>,
}

impl SourceCompiler for FakeCompiler {
    fn compile(
        &self,
        source: &[u8],
        name: &str,
        architecture: &Architecture,
        _options: &[String],
    ) -> anyhow::Result<CompilerOutput> {
        increment(&self.counters.compilations);
        let source = String::from_utf8_lossy(source);
        if source.contains("#error") {
            anyhow::bail!("compilation of `{}` failed: {}", name, source);
        }
        Ok(CompilerOutput {
            bitcode: FakeIrTools::bitcode(
                format!("; compiled {} for {}\n{}", name, architecture, source).as_str(),
            ),
            log: String::new(),
        })
    }
}

#[derive(Debug)]
pub struct FakeFunction {
    name: String,
}

impl DeviceFunction for FakeFunction {
    fn name(&self) -> &str {
        self.name.as_str()
    }
}

///
/// The loaded code object, exporting every name it mentions.
///
pub struct FakeImage {
    code_object: String,
}

impl ModuleImage for FakeImage {
    fn get_function(&self, name: &str) -> anyhow::Result<Rc<dyn DeviceFunction>> {
        if !self.code_object.contains(name) {
            return Err(Error::Lookup(format!("function `{}` not found", name)).into());
        }
        Ok(Rc::new(FakeFunction {
            name: name.to_owned(),
        }))
    }
}

pub struct FakeContext {
    counters: Rc<Counters>,
}

impl DeviceContext for FakeContext {
    fn device(&self) -> Device {
        self.counters.device.borrow().clone().unwrap_or_else(|| Device {
            id: 0,
            architecture: gfx90a(),
        })
    }

    fn create_module_image(&self, code_object: &[u8]) -> anyhow::Result<Box<dyn ModuleImage>> {
        increment(&self.counters.loads);
        Ok(Box::new(FakeImage {
            code_object: String::from_utf8_lossy(code_object).into_owned(),
        }))
    }
}

///
/// The device linker concatenating its inputs behind a code object header.
///
pub struct FakeLinker {
    counters: Rc<Counters>,
    architecture: Architecture,
    inputs: Vec<Vec<u8>>,
}

impl Linker for FakeLinker {
    fn add_ir(&mut self, module: &[u8]) -> anyhow::Result<()> {
        self.inputs.push(module.to_vec());
        Ok(())
    }

    fn complete(&mut self) -> anyhow::Result<Vec<u8>> {
        increment(&self.counters.device_links);
        let mut code_object = format!("CODEOBJ {}", self.architecture).into_bytes();
        for input in self.inputs.iter() {
            code_object.push(b'\n');
            code_object.extend_from_slice(input.as_slice());
        }
        Ok(code_object)
    }

    fn info_log(&self) -> String {
        format!("linked {} modules for {}", self.inputs.len(), self.architecture)
    }
}

#[derive(Debug)]
pub struct FakeDriver {
    counters: Rc<Counters>,
}

impl Driver for FakeDriver {
    fn version(&self) -> semver::Version {
        semver::Version::new(6, 2, 0)
    }

    fn current_context(&self) -> anyhow::Result<Rc<dyn DeviceContext>> {
        Ok(Rc::new(FakeContext {
            counters: self.counters.clone(),
        }))
    }

    fn new_linker(
        &self,
        architecture: &Architecture,
        _max_registers: Option<u32>,
    ) -> anyhow::Result<Box<dyn Linker>> {
        Ok(Box::new(FakeLinker {
            counters: self.counters.clone(),
            architecture: architecture.clone(),
            inputs: Vec::new(),
        }))
    }
}

#[derive(Debug)]
pub struct FakeDeviceLibrary;

impl DeviceLibrary for FakeDeviceLibrary {
    fn llvm_module(&self, architecture: &Architecture) -> anyhow::Result<Rc<LlvmBuffer>> {
        Ok(Rc::new(LlvmBuffer::new(
            "devicelib",
            bitcode(format!("; device library for {}", architecture).as_str()),
        )))
    }

    fn llvm_bitcode(&self, architecture: &Architecture) -> anyhow::Result<Rc<[u8]>> {
        Ok(Rc::from(self.llvm_module(architecture)?.bytes()))
    }
}

///
/// A code generator with the default settings over the fake toolchain.
///
pub fn codegen() -> (Rc<Codegen>, Rc<Counters>) {
    codegen_with(Settings::default())
}

pub fn codegen_with(settings: Settings) -> (Rc<Codegen>, Rc<Counters>) {
    let counters = Rc::new(Counters::default());
    let toolchain = Toolchain::new(
        Box::new(FakeCompiler {
            counters: counters.clone(),
        }),
        Box::new(FakeIrTools {
            counters: counters.clone(),
        }),
        Box::new(FakeDriver {
            counters: counters.clone(),
        }),
        Box::new(FakeDeviceLibrary),
    );
    (Codegen::new(settings, toolchain), counters)
}

///
/// A kernel module with a typed pointer argument and a stack allocation.
///
pub fn kernel_module(name: &str) -> Box<dyn IrModule> {
    let mut module = TextModule::empty(name);
    module.append(
        format!(
            "define void @{}(i8* %out, i32 %n) {{\nentry:\n  %.1 = alloca i32, align 4\n  store i32 %n, i32* %.1, align 4\n  ret void\n}}",
            name
        )
        .as_str(),
    );
    Box::new(module)
}

pub fn device_function_module(name: &str) -> Box<dyn IrModule> {
    let mut module = TextModule::empty(name);
    module.append(
        format!(
            "define i32 @{}(i32 %x) {{\nentry:\n  ret i32 %x\n}}",
            name
        )
        .as_str(),
    );
    Box::new(module)
}

///
/// A finalized library holding a module that defines the entry `name`.
///
pub fn library(
    codegen: &Rc<Codegen>,
    name: &str,
    options: LibraryOptions,
    dependencies: Vec<Dependency>,
) -> Rc<CodeLibrary> {
    let module = if options.is_device_function {
        device_function_module(name)
    } else {
        kernel_module(name)
    };
    let mut library = codegen
        .create_library(name, options)
        .expect("Always valid");
    library.add_module(module).expect("Always valid");
    for dependency in dependencies {
        library.add_dependency(dependency).expect("Always valid");
    }
    library.finalize().expect("Always valid");
    Rc::new(library)
}

pub fn kernel_library(
    codegen: &Rc<Codegen>,
    name: &str,
    dependencies: Vec<Dependency>,
) -> Rc<CodeLibrary> {
    library(codegen, name, LibraryOptions::kernel(name), dependencies)
}

pub fn device_library(
    codegen: &Rc<Codegen>,
    name: &str,
    dependencies: Vec<Dependency>,
) -> Rc<CodeLibrary> {
    library(codegen, name, LibraryOptions::device_function(name), dependencies)
}

pub fn architecture(name: &str) -> Architecture {
    Architecture::new(name).expect("Always valid")
}

pub fn gfx90a() -> Architecture {
    architecture("gfx90a")
}

pub fn gfx1100() -> Architecture {
    architecture("gfx1100")
}

pub fn bitcode(text: &str) -> Vec<u8> {
    FakeIrTools::bitcode(text)
}

///
/// Checks whether `bytes` contain `text`.
///
pub fn contains(bytes: &[u8], text: &str) -> bool {
    bytes
        .windows(text.len())
        .any(|window| window == text.as_bytes())
}

//!
//! The AMDGPU code library.
//!

pub mod bundle;
pub mod collector;
pub mod postprocess;
pub mod reduced;
pub mod walk;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::buffer::BufferFormat;
use crate::buffer::LlvmBuffer;
use crate::codegen::Codegen;
use crate::dependency::Dependency;
use crate::dump_flag::DumpFlag;
use crate::error::Error;
use crate::module::IrModule;
use crate::target::Architecture;
use crate::target::FunctionRole;
use crate::toolchain::DeviceFunction;
use crate::toolchain::ModuleImage;

use self::collector::Collector;
use self::walk::Node;

/// The next library identity, shared by every `Codegen` in the process.
static NEXT_LIBRARY_ID: AtomicU64 = AtomicU64::new(0);

///
/// The code library identity, unique within the process.
///
/// Libraries created by different code generators never share an identity, so they are never
/// mistaken for one another when the duplicate linker inputs are removed.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(u64);

impl LibraryId {
    ///
    /// Allocates a new identity.
    ///
    pub(crate) fn next() -> Self {
        Self(NEXT_LIBRARY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for LibraryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

///
/// The code library options.
///
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LibraryOptions {
    /// The entry function name.
    pub entry_name: Option<String>,
    /// The register usage limit. Not supported by the device linker yet.
    pub max_registers: Option<u32>,
    /// Whether to run the mid-end optimizer on the linked module.
    pub optimize: bool,
    /// Whether the entry is a device function rather than a kernel.
    pub is_device_function: bool,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            entry_name: None,
            max_registers: None,
            optimize: false,
            is_device_function: true,
        }
    }
}

impl LibraryOptions {
    ///
    /// The options of a kernel library.
    ///
    pub fn kernel(entry_name: &str) -> Self {
        Self {
            entry_name: Some(entry_name.to_owned()),
            is_device_function: false,
            ..Self::default()
        }
    }

    ///
    /// The options of a device function library.
    ///
    pub fn device_function(entry_name: &str) -> Self {
        Self {
            entry_name: Some(entry_name.to_owned()),
            ..Self::default()
        }
    }
}

///
/// The code library state.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The module and dependencies may be added.
    Open,
    /// The module and dependencies are frozen, and the artifacts may be requested.
    Finalized,
}

///
/// The loaded code object and its entry function.
///
struct Executable {
    /// Keeps the code object loaded.
    _image: Box<dyn ModuleImage>,
    /// The entry function handle.
    function: Rc<dyn DeviceFunction>,
}

///
/// The linked module of one architecture in the formats requested so far.
///
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkedIr {
    /// The LLVM assembly.
    text: Option<Rc<LlvmBuffer>>,
    /// The LLVM bitcode.
    bitcode: Option<Rc<LlvmBuffer>>,
}

impl LinkedIr {
    ///
    /// A shortcut constructor.
    ///
    pub(crate) fn new(buffer: Rc<LlvmBuffer>) -> Self {
        let mut linked = Self::default();
        linked.insert(buffer);
        linked
    }

    ///
    /// Returns the module in the requested format, if it has been produced.
    ///
    pub(crate) fn get(&self, to_bitcode: bool) -> Option<Rc<LlvmBuffer>> {
        if to_bitcode {
            self.bitcode.clone()
        } else {
            self.text.clone()
        }
    }

    ///
    /// Returns the module in any format, bitcode preferred.
    ///
    pub(crate) fn any(&self) -> Option<Rc<LlvmBuffer>> {
        self.bitcode.clone().or_else(|| self.text.clone())
    }

    fn insert(&mut self, buffer: Rc<LlvmBuffer>) {
        match buffer.format() {
            BufferFormat::Bitcode => self.bitcode = Some(buffer),
            BufferFormat::Text => self.text = Some(buffer),
        }
    }
}

///
/// The per-architecture artifacts.
///
#[derive(Default)]
struct Caches {
    /// The raw sources.
    raw_source_strings: BTreeMap<Architecture, Vec<String>>,
    /// The post-processed linker inputs as LLVM assembly.
    unlinked_ir_strings: BTreeMap<Architecture, Vec<String>>,
    /// The linked module without the device library.
    linked_ir: BTreeMap<Architecture, LinkedIr>,
    /// The linked module with the device library.
    linked_ir_with_device_library: BTreeMap<Architecture, LinkedIr>,
    /// The code objects.
    code_objects: BTreeMap<Architecture, Rc<[u8]>>,
    /// The device linker diagnostics.
    linker_info: BTreeMap<Architecture, String>,
    /// The loaded entry functions by device ordinal.
    executables: HashMap<u32, Executable>,
}

impl Caches {
    fn linked_ir(&self, link_in_device_library: bool) -> &BTreeMap<Architecture, LinkedIr> {
        if link_in_device_library {
            &self.linked_ir_with_device_library
        } else {
            &self.linked_ir
        }
    }

    fn linked_ir_mut(
        &mut self,
        link_in_device_library: bool,
    ) -> &mut BTreeMap<Architecture, LinkedIr> {
        if link_in_device_library {
            &mut self.linked_ir_with_device_library
        } else {
            &mut self.linked_ir
        }
    }

    fn insert_linked_ir(
        &mut self,
        architecture: Architecture,
        link_in_device_library: bool,
        buffer: Rc<LlvmBuffer>,
    ) {
        self.linked_ir_mut(link_in_device_library)
            .entry(architecture)
            .or_default()
            .insert(buffer);
    }
}

///
/// The code library: one generated IR module, its link-time dependencies, and everything
/// built from them.
///
pub struct CodeLibrary {
    /// The code generator.
    codegen: Rc<Codegen>,
    /// The library identity.
    id: LibraryId,
    /// The library name.
    name: String,
    /// The library options.
    options: LibraryOptions,
    /// The entry function name.
    entry_name: Option<String>,
    /// The entry function name in the owned module.
    original_entry_name: Option<String>,
    /// The owned module.
    module: Option<Box<dyn IrModule>>,
    /// The link-time dependencies in insertion order.
    dependencies: Vec<Dependency>,
    /// The library state.
    state: State,
    /// The artifacts.
    caches: RefCell<Caches>,
}

impl CodeLibrary {
    ///
    /// A shortcut constructor.
    ///
    pub(crate) fn new(codegen: Rc<Codegen>, name: &str, options: LibraryOptions) -> Self {
        let entry_name = options.entry_name.clone();
        Self {
            codegen,
            id: LibraryId::next(),
            name: name.to_owned(),
            options,
            entry_name: entry_name.clone(),
            original_entry_name: entry_name,
            module: None,
            dependencies: Vec::new(),
            state: State::Open,
            caches: RefCell::new(Caches::default()),
        }
    }

    ///
    /// Sets the owned module.
    ///
    pub fn add_module(&mut self, module: Box<dyn IrModule>) -> anyhow::Result<()> {
        self.ensure_open()?;
        if self.module.is_some() {
            return Err(Error::Configuration(format!(
                "library `{}` only supports one module",
                self.name
            ))
            .into());
        }
        self.module = Some(module);
        Ok(())
    }

    ///
    /// Appends a link-time dependency.
    ///
    /// A nested library must be finalized already.
    ///
    pub fn add_dependency(&mut self, dependency: Dependency) -> anyhow::Result<()> {
        if let Dependency::Library(library) = &dependency {
            if !library.is_finalized() {
                return Err(Error::Configuration(format!(
                    "library `{}` must be finalized before it is added to library `{}`",
                    library.name, self.name
                ))
                .into());
            }
        }
        self.ensure_open()?;
        self.dependencies.push(dependency);
        Ok(())
    }

    ///
    /// Appends a nested library.
    ///
    pub fn add_linking_library(&mut self, library: Rc<CodeLibrary>) -> anyhow::Result<()> {
        self.add_dependency(Dependency::Library(library))
    }

    ///
    /// Freezes the module and dependencies.
    ///
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.state = State::Finalized;
        tracing::debug!(
            library = self.name.as_str(),
            dependencies = self.dependencies.len(),
            "library finalized"
        );
        Ok(())
    }

    ///
    /// Resets both the entry name and the original entry name.
    ///
    pub fn init_entry_name(&mut self, entry_name: Option<String>) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.original_entry_name = entry_name.clone();
        self.entry_name = entry_name;
        Ok(())
    }

    ///
    /// Renames the entry function, remembering the previous name as the original one.
    ///
    /// The owned module keeps the original name; references are renamed in the printed IR.
    ///
    pub fn change_entry_name(&mut self, entry_name: &str) -> anyhow::Result<()> {
        self.ensure_open()?;
        let previous = self.entry_name.take().ok_or_else(|| {
            Error::Configuration(format!("library `{}` has no entry name to change", self.name))
        })?;
        self.original_entry_name = Some(previous);
        self.entry_name = Some(entry_name.to_owned());
        Ok(())
    }

    ///
    /// Returns the post-processed LLVM assembly of the owned module for `architecture`.
    ///
    pub fn get_unlinked_ir(&self, architecture: Option<&Architecture>) -> anyhow::Result<String> {
        self.ensure_finalized()?;
        let architecture = self.codegen.resolve_architecture(architecture)?;
        self.render_unlinked_ir(&architecture)
    }

    ///
    /// Returns the post-processed LLVM assembly of every linker input, duplicates removed.
    ///
    pub fn get_unlinked_ir_strings(
        &self,
        architecture: Option<&Architecture>,
    ) -> anyhow::Result<Vec<String>> {
        self.ensure_finalized()?;
        let architecture = self.codegen.resolve_architecture(architecture)?;
        if let Some(strings) = self.caches.borrow().unlinked_ir_strings.get(&architecture) {
            return Ok(strings.clone());
        }

        let inputs = self.collector(&architecture).linker_inputs()?;
        let strings = self.assembly_strings(inputs.as_slice())?;
        self.caches
            .borrow_mut()
            .unlinked_ir_strings
            .insert(architecture, strings.clone());
        Ok(strings)
    }

    ///
    /// Returns the owned module and every dependency in its raw form, duplicates removed.
    ///
    /// The HIP C++ sources are returned as they are, the LLVM modules as LLVM assembly.
    ///
    pub fn get_raw_source_strings(
        &self,
        architecture: Option<&Architecture>,
    ) -> anyhow::Result<Vec<String>> {
        self.ensure_finalized()?;
        let architecture = self.codegen.resolve_architecture(architecture)?;
        if let Some(strings) = self.caches.borrow().raw_source_strings.get(&architecture) {
            return Ok(strings.clone());
        }

        let strings = Collector::new(self, &architecture, false).raw_source_strings()?;
        self.caches
            .borrow_mut()
            .raw_source_strings
            .insert(architecture, strings.clone());
        Ok(strings)
    }

    ///
    /// Returns the raw sources as a single bundle.
    ///
    pub fn get_raw_source_str(&self, architecture: Option<&Architecture>) -> anyhow::Result<String> {
        Ok(bundle::bundle(
            self.get_raw_source_strings(architecture)?.as_slice(),
        ))
    }

    ///
    /// Returns the linked LLVM assembly with the device library, or the bundle of the
    /// unlinked inputs.
    ///
    pub fn get_llvm_str(
        &self,
        architecture: Option<&Architecture>,
        linked: bool,
    ) -> anyhow::Result<String> {
        if linked {
            let linked = self.get_linked_ir(architecture, false, true)?;
            Ok(linked
                .to_assembly(self.codegen.toolchain().ir_tools.as_ref())?
                .to_string())
        } else {
            Ok(bundle::bundle(
                self.get_unlinked_ir_strings(architecture)?.as_slice(),
            ))
        }
    }

    ///
    /// Returns the code object disassembly.
    ///
    pub fn get_asm_str(&self, architecture: Option<&Architecture>) -> anyhow::Result<String> {
        let architecture = self.codegen.resolve_architecture(architecture)?;
        Err(Error::NotImplemented(format!(
            "code object disassembly for `{}` is not supported by the toolchain",
            architecture
        ))
        .into())
    }

    ///
    /// Returns the module linked from every input, optionally with the device library.
    ///
    /// The result is cached per architecture and format. If the variant without the device
    /// library is cached, the device library is linked into it without collecting the inputs
    /// again. A module cached in the other format is converted once and the conversion is kept.
    ///
    pub fn get_linked_ir(
        &self,
        architecture: Option<&Architecture>,
        to_bitcode: bool,
        link_in_device_library: bool,
    ) -> anyhow::Result<Rc<LlvmBuffer>> {
        self.ensure_finalized()?;
        let architecture = self.codegen.resolve_architecture(architecture)?;
        if let Some(linked) = self.lookup_linked_ir(&architecture, link_in_device_library)? {
            if let Some(buffer) = linked.get(to_bitcode) {
                return Ok(buffer);
            }
            if let Some(buffer) = linked.any() {
                let converted = self.convert(buffer, to_bitcode)?;
                self.caches.borrow_mut().insert_linked_ir(
                    architecture,
                    link_in_device_library,
                    converted.clone(),
                );
                return Ok(converted);
            }
        }

        let toolchain = self.codegen.toolchain();
        let settings = self.codegen.settings();

        let mut inputs = self.collector(&architecture).linker_inputs()?;
        if settings.has_dump_flag(DumpFlag::Unlinked) {
            let strings = self.assembly_strings(inputs.as_slice())?;
            self.dump(
                "unlinked inputs, postprocessed",
                bundle::bundle(strings.as_slice()).as_str(),
            );
            self.caches
                .borrow_mut()
                .unlinked_ir_strings
                .insert(architecture.clone(), strings);
        }
        if link_in_device_library {
            inputs.push(toolchain.device_library.llvm_module(&architecture)?);
        }

        tracing::debug!(
            library = self.name.as_str(),
            architecture = %architecture,
            inputs = inputs.len(),
            "linking LLVM modules"
        );
        let mut linked = toolchain.ir_tools.link_modules(inputs.as_slice(), to_bitcode)?;

        if settings.enable_midend_optimizations && self.options.optimize {
            linked = toolchain.ir_tools.optimize(
                linked.as_slice(),
                &architecture,
                settings.optimization_level,
            )?;
            if settings.has_dump_flag(DumpFlag::LLVM) {
                self.dump_buffer("mid-end optimizations", linked.as_slice())?;
            }
        }
        if settings.has_dump_flag(DumpFlag::LLVM) {
            self.dump_buffer("final LLVM IR", linked.as_slice())?;
        }

        let linked = Rc::new(LlvmBuffer::new(self.name.as_str(), linked));
        self.caches
            .borrow_mut()
            .insert_linked_ir(architecture, link_in_device_library, linked.clone());
        Ok(linked)
    }

    ///
    /// Returns the code object for `architecture`, linking it on the first request.
    ///
    pub fn get_code_object(&self, architecture: Option<&Architecture>) -> anyhow::Result<Rc<[u8]>> {
        self.ensure_finalized()?;
        if self.options.is_device_function {
            return Err(Error::NotApplicable(format!(
                "library `{}` holds a device function, which can only be compiled to LLVM IR; \
                 link it into a kernel library instead",
                self.name
            ))
            .into());
        }
        let architecture = self.codegen.resolve_architecture(architecture)?;
        if let Some(code_object) = self.caches.borrow().code_objects.get(&architecture) {
            return Ok(code_object.clone());
        }

        let toolchain = self.codegen.toolchain();
        let mut linker = toolchain
            .driver
            .new_linker(&architecture, self.options.max_registers)?;

        let (with_device_library, without_device_library) = {
            let caches = self.caches.borrow();
            (
                caches
                    .linked_ir(true)
                    .get(&architecture)
                    .and_then(LinkedIr::any),
                caches.linked_ir(false).get(&architecture).and_then(LinkedIr::any),
            )
        };
        match (with_device_library, without_device_library) {
            (Some(linked), _) => linker.add_ir(linked.bytes())?,
            (None, linked) => {
                let linked = match linked {
                    Some(linked) => linked,
                    None => self.get_linked_ir(Some(&architecture), true, false)?,
                };
                linker.add_ir(linked.bytes())?;
                linker.add_ir(&toolchain.device_library.llvm_bitcode(&architecture)?)?;
            }
        }

        let code_object: Rc<[u8]> = Rc::from(linker.complete()?);
        tracing::debug!(
            library = self.name.as_str(),
            architecture = %architecture,
            size = code_object.len(),
            "code object linked"
        );

        let mut caches = self.caches.borrow_mut();
        caches
            .code_objects
            .insert(architecture.clone(), code_object.clone());
        caches.linker_info.insert(architecture, linker.info_log());
        Ok(code_object)
    }

    ///
    /// Returns the entry function loaded on the current device.
    ///
    pub fn get_executable(&self) -> anyhow::Result<Rc<dyn DeviceFunction>> {
        self.ensure_finalized()?;
        if self.options.is_device_function {
            return Err(Error::NotApplicable(format!(
                "library `{}` holds a device function, which cannot be loaded",
                self.name
            ))
            .into());
        }
        let entry_name = self.entry_name.as_deref().ok_or_else(|| {
            Error::Configuration(format!("library `{}` has no entry name", self.name))
        })?;

        let context = self.codegen.toolchain().driver.current_context()?;
        let device = context.device();
        if let Some(executable) = self.caches.borrow().executables.get(&device.id) {
            return Ok(executable.function.clone());
        }

        let code_object = self.get_code_object(Some(&device.architecture))?;
        let image = context.create_module_image(&code_object)?;
        let function = image.get_function(entry_name)?;
        tracing::debug!(
            library = self.name.as_str(),
            device = device.id,
            function = function.name(),
            "entry function loaded"
        );

        self.caches.borrow_mut().executables.insert(
            device.id,
            Executable {
                _image: image,
                function: function.clone(),
            },
        );
        Ok(function)
    }

    ///
    /// Returns the device linker diagnostics of the code object for `architecture`.
    ///
    pub fn linker_info(&self, architecture: Option<&Architecture>) -> anyhow::Result<String> {
        let architecture = self.codegen.resolve_architecture(architecture)?;
        self.caches
            .borrow()
            .linker_info
            .get(&architecture)
            .cloned()
            .ok_or_else(|| {
                Error::Lookup(format!(
                    "library `{}` has no code object for `{}` yet",
                    self.name, architecture
                ))
                .into()
            })
    }

    ///
    /// Returns the header of the function definition called `name` in the owned module.
    ///
    pub fn get_function(&self, name: &str) -> anyhow::Result<String> {
        self.module
            .as_ref()
            .and_then(|module| module.function_definition(name))
            .ok_or_else(|| {
                Error::Lookup(format!(
                    "function `{}` not found in library `{}`",
                    name, self.name
                ))
                .into()
            })
    }

    ///
    /// Returns this library and every nested library in pre-order.
    ///
    pub fn linking_libraries(&self) -> Vec<&CodeLibrary> {
        walk::walk(self, false)
            .into_iter()
            .filter_map(|node| match node {
                Node::Library(library) => Some(library),
                Node::File(_) | Node::Buffer(_) => None,
            })
            .collect()
    }

    ///
    /// Returns the owned modules of `linking_libraries` as LLVM assembly.
    ///
    pub fn modules(&self) -> Vec<String> {
        self.linking_libraries()
            .into_iter()
            .filter_map(|library| library.module.as_ref())
            .map(|module| module.print_to_string())
            .collect()
    }

    ///
    /// Returns the library identity.
    ///
    pub fn id(&self) -> LibraryId {
        self.id
    }

    ///
    /// Returns the library name.
    ///
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    ///
    /// Returns the library state.
    ///
    pub fn state(&self) -> State {
        self.state
    }

    ///
    /// Checks whether the library is finalized.
    ///
    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    ///
    /// Checks whether the entry is a device function.
    ///
    pub fn is_device_function(&self) -> bool {
        self.options.is_device_function
    }

    ///
    /// Returns the entry function name.
    ///
    pub fn entry_name(&self) -> Option<&str> {
        self.entry_name.as_deref()
    }

    ///
    /// Returns the entry function name in the owned module.
    ///
    pub fn original_entry_name(&self) -> Option<&str> {
        self.original_entry_name.as_deref()
    }

    ///
    /// Returns the link-time dependencies.
    ///
    pub fn dependencies(&self) -> &[Dependency] {
        self.dependencies.as_slice()
    }

    ///
    /// Returns the library options.
    ///
    pub fn options(&self) -> &LibraryOptions {
        &self.options
    }

    ///
    /// Returns the code generator.
    ///
    pub fn codegen(&self) -> &Rc<Codegen> {
        &self.codegen
    }

    ///
    /// Prints the owned module for `architecture`, target modifications and post-processing
    /// applied. The owned module itself is left intact.
    ///
    pub(crate) fn render_unlinked_ir(&self, architecture: &Architecture) -> anyhow::Result<String> {
        let module = self.module.as_ref().ok_or_else(|| {
            Error::Configuration(format!("library `{}` has no IR module", self.name))
        })?;

        let mut module = module.clone_module();
        crate::target::apply_target_modifications(
            module.as_mut(),
            architecture,
            self.original_entry_name.as_deref(),
            self.role(),
        )?;

        let rename = match (self.original_entry_name.as_deref(), self.entry_name.as_deref()) {
            (Some(original), Some(new)) if original != new => Some((original, new)),
            _ => None,
        };
        Ok(postprocess::postprocess(
            module.print_to_string().as_str(),
            rename,
        ))
    }

    fn role(&self) -> FunctionRole {
        if self.options.is_device_function {
            FunctionRole::DeviceFunction
        } else {
            FunctionRole::Kernel
        }
    }

    fn collector<'a>(&'a self, architecture: &'a Architecture) -> Collector<'a> {
        Collector::new(
            self,
            architecture,
            self.codegen.settings().use_linker_cache,
        )
    }

    fn lookup_linked_ir(
        &self,
        architecture: &Architecture,
        link_in_device_library: bool,
    ) -> anyhow::Result<Option<LinkedIr>> {
        let (with_device_library, without_device_library) = {
            let caches = self.caches.borrow();
            (
                caches.linked_ir(true).get(architecture).cloned(),
                caches.linked_ir(false).get(architecture).cloned(),
            )
        };
        if !link_in_device_library {
            return Ok(without_device_library);
        }
        if with_device_library.is_some() {
            return Ok(with_device_library);
        }
        let Some(linked) = without_device_library.as_ref().and_then(LinkedIr::any) else {
            return Ok(None);
        };

        let toolchain = self.codegen.toolchain();
        let device_library = toolchain.device_library.llvm_module(architecture)?;
        let to_bitcode = linked.format() == BufferFormat::Bitcode;
        let promoted = toolchain
            .ir_tools
            .link_modules(&[linked, device_library], to_bitcode)?;
        let promoted = Rc::new(LlvmBuffer::new(self.name.as_str(), promoted));
        self.caches
            .borrow_mut()
            .insert_linked_ir(architecture.clone(), true, promoted.clone());
        Ok(Some(LinkedIr::new(promoted)))
    }

    fn convert(&self, buffer: Rc<LlvmBuffer>, to_bitcode: bool) -> anyhow::Result<Rc<LlvmBuffer>> {
        let ir_tools = self.codegen.toolchain().ir_tools.as_ref();
        match (buffer.format(), to_bitcode) {
            (BufferFormat::Bitcode, true) | (BufferFormat::Text, false) => Ok(buffer),
            (BufferFormat::Text, true) => {
                let bitcode = ir_tools.link_modules(&[buffer.clone()], true)?;
                Ok(Rc::new(LlvmBuffer::new(buffer.name(), bitcode)))
            }
            (BufferFormat::Bitcode, false) => {
                let assembly = buffer.to_assembly(ir_tools)?;
                Ok(Rc::new(LlvmBuffer::from_assembly(
                    buffer.name(),
                    assembly.to_string(),
                )))
            }
        }
    }

    fn assembly_strings(&self, inputs: &[Rc<LlvmBuffer>]) -> anyhow::Result<Vec<String>> {
        let ir_tools = self.codegen.toolchain().ir_tools.as_ref();
        inputs
            .iter()
            .map(|input| Ok(input.to_assembly(ir_tools)?.to_string()))
            .collect()
    }

    fn dump(&self, stage: &str, body: &str) {
        tracing::info!(
            target: "compiler_llvm_amdgpu::dump",
            library = self.name.as_str(),
            "AMD GPU LLVM for `{}` ({})\n{}",
            self.entry_name.as_deref().unwrap_or(self.name.as_str()),
            stage,
            body
        );
    }

    fn dump_buffer(&self, stage: &str, module: &[u8]) -> anyhow::Result<()> {
        let assembly = match BufferFormat::detect(module) {
            BufferFormat::Bitcode => self.codegen.toolchain().ir_tools.to_assembly(module)?,
            BufferFormat::Text => String::from_utf8_lossy(module).into_owned(),
        };
        self.dump(stage, assembly.as_str());
        Ok(())
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Finalized => Err(Error::Configuration(format!(
                "library `{}` is already finalized",
                self.name
            ))
            .into()),
        }
    }

    fn ensure_finalized(&self) -> anyhow::Result<()> {
        match self.state {
            State::Finalized => Ok(()),
            State::Open => Err(Error::Configuration(format!(
                "library `{}` must be finalized first",
                self.name
            ))
            .into()),
        }
    }
}

impl std::fmt::Debug for CodeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeLibrary")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entry_name", &self.entry_name)
            .field("state", &self.state)
            .field("dependencies", &self.dependencies.len())
            .finish_non_exhaustive()
    }
}

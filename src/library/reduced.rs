//!
//! The code library serialization.
//!

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::buffer::LlvmBuffer;
use crate::codegen::Codegen;
use crate::dependency::SourceKind;
use crate::error::Error;
use crate::library::walk;
use crate::library::Caches;
use crate::library::CodeLibrary;
use crate::library::LibraryOptions;
use crate::library::LinkedIr;
use crate::library::State;
use crate::target::Architecture;

///
/// The persistable state of a finalized code library.
///
/// Keeps the sources and the per-architecture artifacts. The IR module, the dependencies and
/// the loaded executables are not kept: a rebuilt library serves the cached artifacts and
/// loads the executables again on demand.
///
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReducedLibrary {
    /// The library name.
    pub name: String,
    /// The entry function name.
    pub entry_name: Option<String>,
    /// The entry function name in the owned module.
    pub original_entry_name: Option<String>,
    /// The register usage limit.
    pub max_registers: Option<u32>,
    /// Whether the mid-end optimizer was enabled.
    pub optimize: bool,
    /// Whether the entry is a device function.
    pub is_device_function: bool,
    /// The raw sources.
    pub raw_source_strings: BTreeMap<Architecture, Vec<String>>,
    /// The post-processed linker inputs.
    pub unlinked_ir_strings: BTreeMap<Architecture, Vec<String>>,
    /// The linked modules without the device library.
    pub linked_ir: BTreeMap<Architecture, Vec<u8>>,
    /// The linked modules with the device library.
    pub linked_ir_with_device_library: BTreeMap<Architecture, Vec<u8>>,
    /// The code objects.
    pub code_objects: BTreeMap<Architecture, Vec<u8>>,
    /// The device linker diagnostics.
    pub linker_info: BTreeMap<Architecture, String>,
}

impl ReducedLibrary {
    ///
    /// Serializes the record to JSON.
    ///
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self)
            .map_err(|error| anyhow::anyhow!("library `{}` serialization error: {}", self.name, error))
    }

    ///
    /// Deserializes the record from JSON.
    ///
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json)
            .map_err(|error| anyhow::anyhow!("library deserialization error: {}", error))
    }
}

impl CodeLibrary {
    ///
    /// Reduces the library to its persistable state.
    ///
    /// Fails if the library is open, or if it depends on HIP C++ sources, whose compiled form
    /// is not kept by value.
    ///
    pub fn reduce(&self) -> anyhow::Result<ReducedLibrary> {
        if !self.is_finalized() {
            return Err(Error::Configuration(format!(
                "cannot reduce unfinalized library `{}`",
                self.name
            ))
            .into());
        }
        let has_sources = walk::walk(self, false)
            .into_iter()
            .any(|node| node.kind() == Some(SourceKind::Hip));
        if has_sources {
            return Err(Error::NotImplemented(format!(
                "cannot reduce library `{}` with HIP C++ file or buffer dependencies",
                self.name
            ))
            .into());
        }

        let caches = self.caches.borrow();
        Ok(ReducedLibrary {
            name: self.name.clone(),
            entry_name: self.entry_name.clone(),
            original_entry_name: self.original_entry_name.clone(),
            max_registers: self.options.max_registers,
            optimize: self.options.optimize,
            is_device_function: self.options.is_device_function,
            raw_source_strings: caches.raw_source_strings.clone(),
            unlinked_ir_strings: caches.unlinked_ir_strings.clone(),
            linked_ir: module_bytes(&caches.linked_ir),
            linked_ir_with_device_library: module_bytes(&caches.linked_ir_with_device_library),
            code_objects: caches
                .code_objects
                .iter()
                .map(|(architecture, code_object)| (architecture.clone(), code_object.to_vec()))
                .collect(),
            linker_info: caches.linker_info.clone(),
        })
    }

    ///
    /// Rebuilds a finalized library from its persistable state.
    ///
    pub fn rebuild(codegen: &Rc<Codegen>, reduced: ReducedLibrary) -> Self {
        let caches = Caches {
            raw_source_strings: reduced.raw_source_strings,
            unlinked_ir_strings: reduced.unlinked_ir_strings,
            linked_ir: module_buffers(reduced.name.as_str(), reduced.linked_ir),
            linked_ir_with_device_library: module_buffers(
                reduced.name.as_str(),
                reduced.linked_ir_with_device_library,
            ),
            code_objects: reduced
                .code_objects
                .into_iter()
                .map(|(architecture, code_object)| (architecture, Rc::<[u8]>::from(code_object)))
                .collect(),
            linker_info: reduced.linker_info,
            executables: Default::default(),
        };

        let options = LibraryOptions {
            entry_name: reduced.entry_name.clone(),
            max_registers: reduced.max_registers,
            optimize: reduced.optimize,
            is_device_function: reduced.is_device_function,
        };
        let mut library = Self::new(codegen.clone(), reduced.name.as_str(), options);
        library.original_entry_name = reduced.original_entry_name;
        library.state = State::Finalized;
        library.caches = RefCell::new(caches);
        library
    }
}

fn module_bytes(modules: &BTreeMap<Architecture, LinkedIr>) -> BTreeMap<Architecture, Vec<u8>> {
    modules
        .iter()
        .filter_map(|(architecture, module)| {
            module
                .any()
                .map(|module| (architecture.clone(), module.bytes().to_vec()))
        })
        .collect()
}

fn module_buffers(
    name: &str,
    modules: BTreeMap<Architecture, Vec<u8>>,
) -> BTreeMap<Architecture, LinkedIr> {
    modules
        .into_iter()
        .map(|(architecture, bytes)| {
            (
                architecture,
                LinkedIr::new(Rc::new(LlvmBuffer::new(name, bytes))),
            )
        })
        .collect()
}

//!
//! The AMDGPU code generator.
//!

use std::rc::Rc;

use crate::cache::LinkerCache;
use crate::error::Error;
use crate::library::CodeLibrary;
use crate::library::LibraryOptions;
use crate::module::text::TextModule;
use crate::module::IrModule;
use crate::settings::Settings;
use crate::target::Architecture;
use crate::target::DATA_LAYOUT;
use crate::target::TRIPLE;
use crate::toolchain::Toolchain;

///
/// The code generator: creates the code libraries and owns what they share.
///
#[derive(Debug)]
pub struct Codegen {
    /// The settings.
    settings: Settings,
    /// The external toolchain.
    toolchain: Toolchain,
    /// The compiled link-time dependencies.
    linker_cache: LinkerCache,
}

impl Codegen {
    ///
    /// A shortcut constructor.
    ///
    pub fn new(settings: Settings, toolchain: Toolchain) -> Rc<Self> {
        Rc::new(Self {
            settings,
            toolchain,
            linker_cache: LinkerCache::default(),
        })
    }

    ///
    /// Creates an open code library.
    ///
    pub fn create_library(
        self: &Rc<Self>,
        name: &str,
        options: LibraryOptions,
    ) -> anyhow::Result<CodeLibrary> {
        if options.max_registers.is_some() {
            return Err(Error::NotImplemented(format!(
                "the register usage limit of library `{}` is not supported by the device linker",
                name
            ))
            .into());
        }
        Ok(CodeLibrary::new(self.clone(), name, options))
    }

    ///
    /// Creates an empty module for the AMDGPU target.
    ///
    pub fn create_empty_module(&self, name: &str) -> TextModule {
        let mut module = TextModule::empty(name);
        module.set_triple(TRIPLE);
        module.set_data_layout(DATA_LAYOUT);
        module
    }

    ///
    /// Returns the tuple describing the generated code: the runtime version and the current
    /// device architecture. Used to index the on-disk caches.
    ///
    pub fn magic_tuple(&self) -> anyhow::Result<(semver::Version, Architecture)> {
        let driver = self.toolchain.driver.as_ref();
        Ok((driver.version(), driver.current_architecture()?))
    }

    ///
    /// Returns `architecture`, or the current device architecture if not specified.
    ///
    pub fn resolve_architecture(
        &self,
        architecture: Option<&Architecture>,
    ) -> anyhow::Result<Architecture> {
        match architecture {
            Some(architecture) => Ok(architecture.clone()),
            None => self.toolchain.driver.current_architecture(),
        }
    }

    ///
    /// Returns the settings.
    ///
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    ///
    /// Returns the external toolchain.
    ///
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    ///
    /// Returns the linker cache.
    ///
    pub fn linker_cache(&self) -> &LinkerCache {
        &self.linker_cache
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::library::LibraryOptions;
    use crate::module::IrModule;
    use crate::target::DATA_LAYOUT;
    use crate::target::TRIPLE;
    use crate::testing;

    #[test]
    fn empty_module_targets_amdgpu() {
        let (codegen, _) = testing::codegen();
        let module = codegen.create_empty_module("kernels");
        assert_eq!(module.name(), "kernels");
        assert_eq!(module.header("triple"), Some(TRIPLE));
        assert_eq!(module.header("datalayout"), Some(DATA_LAYOUT));
    }

    #[test]
    fn magic_tuple_names_runtime_and_device() {
        let (codegen, _) = testing::codegen();
        let (version, architecture) = codegen.magic_tuple().expect("Always valid");
        assert_eq!(version, semver::Version::new(6, 2, 0));
        assert_eq!(architecture, testing::gfx90a());
    }

    #[test]
    fn libraries_get_distinct_identities() {
        let (codegen, _) = testing::codegen();
        let first = codegen
            .create_library("a", LibraryOptions::default())
            .expect("Always valid");
        let second = codegen
            .create_library("a", LibraryOptions::default())
            .expect("Always valid");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn register_limit_is_not_supported() {
        let (codegen, _) = testing::codegen();
        let options = LibraryOptions {
            max_registers: Some(64),
            ..LibraryOptions::kernel("saxpy")
        };
        let error = codegen
            .create_library("saxpy", options)
            .expect_err("Must be rejected");
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::NotImplemented(_))
        ));
    }
}

//!
//! The linker input collector.
//!

use std::hash::Hash;
use std::rc::Rc;

use itertools::Itertools;

use crate::buffer::LlvmBuffer;
use crate::cache::CacheKey;
use crate::dependency::SourceKind;
use crate::library::walk;
use crate::library::walk::Node;
use crate::library::CodeLibrary;
use crate::target::Architecture;

///
/// Collects the linker inputs of a library for one architecture.
///
/// Walks the dependency graph in pre-order, resolves every node, and removes the duplicates
/// so that every input is linked once, at its last position in the walk.
///
pub struct Collector<'a> {
    /// The walk root.
    library: &'a CodeLibrary,
    /// The target architecture.
    architecture: &'a Architecture,
    /// Whether to consult the linker cache.
    use_cache: bool,
}

impl<'a> Collector<'a> {
    ///
    /// A shortcut constructor.
    ///
    pub fn new(library: &'a CodeLibrary, architecture: &'a Architecture, use_cache: bool) -> Self {
        Self {
            library,
            architecture,
            use_cache,
        }
    }

    ///
    /// Returns the raw sources: the HIP C++ as it is, everything else as LLVM assembly.
    ///
    /// Nothing is compiled and the linker cache is not consulted.
    ///
    pub fn raw_source_strings(&self) -> anyhow::Result<Vec<String>> {
        let entries = walk::walk(self.library, false)
            .into_iter()
            .map(|node| Ok((node.key(), self.raw_source(node)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(remove_duplicates(entries))
    }

    ///
    /// Returns the compiled modules to link, the walk root first.
    ///
    pub fn linker_inputs(&self) -> anyhow::Result<Vec<Rc<LlvmBuffer>>> {
        let entries = walk::walk(self.library, false)
            .into_iter()
            .map(|node| Ok((node.key(), self.linker_input(node)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(remove_duplicates(entries))
    }

    fn raw_source(&self, node: Node) -> anyhow::Result<String> {
        let (name, bytes, kind) = match node {
            Node::Library(library) => return library.render_unlinked_ir(self.architecture),
            Node::File(file) => (file.name(), file.read()?, file.kind),
            Node::Buffer(buffer) => (buffer.name.clone(), buffer.buffer.to_vec(), buffer.kind),
        };

        match kind {
            SourceKind::Hip => Ok(String::from_utf8_lossy(bytes.as_slice()).into_owned()),
            SourceKind::Llvm => {
                let buffer = LlvmBuffer::normalize(name.as_str(), bytes.as_slice(), self.architecture)?;
                let tools = self.library.codegen().toolchain().ir_tools.as_ref();
                Ok(buffer.to_assembly(tools)?.to_string())
            }
        }
    }

    fn linker_input(&self, node: Node) -> anyhow::Result<Rc<LlvmBuffer>> {
        match node {
            Node::Library(library) => self.library_input(library),
            Node::File(file) => {
                let bytes = file.read()?;
                match file.kind {
                    SourceKind::Llvm => self.process_buffer(file.name().as_str(), bytes.as_slice()),
                    SourceKind::Hip => self.compile_source(
                        file.name().as_str(),
                        bytes.as_slice(),
                        file.options.as_slice(),
                    ),
                }
            }
            Node::Buffer(buffer) => match buffer.kind {
                SourceKind::Llvm => self.process_buffer(buffer.name.as_str(), &buffer.buffer),
                SourceKind::Hip => self.compile_source(
                    buffer.name.as_str(),
                    &buffer.buffer,
                    buffer.options.as_slice(),
                ),
            },
        }
    }

    fn library_input(&self, library: &CodeLibrary) -> anyhow::Result<Rc<LlvmBuffer>> {
        Ok(Rc::new(LlvmBuffer::from_assembly(
            library.name(),
            library.render_unlinked_ir(self.architecture)?,
        )))
    }

    ///
    /// Wraps an LLVM assembly or bitcode buffer, extracting the offload bundle section.
    ///
    fn process_buffer(&self, name: &str, bytes: &[u8]) -> anyhow::Result<Rc<LlvmBuffer>> {
        if !self.use_cache {
            return Ok(Rc::new(LlvmBuffer::normalize(name, bytes, self.architecture)?));
        }

        let key = CacheKey::new(
            crate::hashes::sha256(bytes),
            SourceKind::Llvm,
            self.architecture.clone(),
            vec![],
        );
        self.library
            .codegen()
            .linker_cache()
            .get_or_insert(key, || LlvmBuffer::normalize(name, bytes, self.architecture))
    }

    ///
    /// Compiles HIP C++ source with the ahead-of-link compiler.
    ///
    /// The cache key is computed from the source, not the compiled module.
    ///
    fn compile_source(
        &self,
        name: &str,
        source: &[u8],
        options: &[String],
    ) -> anyhow::Result<Rc<LlvmBuffer>> {
        let compile = || {
            tracing::debug!(
                source = name,
                architecture = %self.architecture,
                options = ?options,
                "compiling HIP C++ source"
            );
            let output = self.library.codegen().toolchain().compiler.compile(
                source,
                name,
                self.architecture,
                options,
            )?;
            if !output.log.is_empty() {
                tracing::debug!(source = name, log = output.log.as_str(), "compiler log");
            }
            LlvmBuffer::normalize(name, output.bitcode.as_slice(), self.architecture)
        };

        if !self.use_cache {
            return compile().map(Rc::new);
        }

        let key = CacheKey::new(
            crate::hashes::sha256(source),
            SourceKind::Hip,
            self.architecture.clone(),
            options.to_vec(),
        );
        self.library.codegen().linker_cache().get_or_insert(key, compile)
    }
}

///
/// Keeps the last occurrence of every key, preserving the relative order of the kept entries.
///
/// `[A, B, C, B]` becomes `[A, C, B]`, so a dependency shared by several libraries is linked
/// after all of them.
///
pub fn remove_duplicates<K, T>(entries: Vec<(K, T)>) -> Vec<T>
where
    K: Clone + Eq + Hash,
{
    let mut unique: Vec<T> = entries
        .into_iter()
        .rev()
        .unique_by(|(key, _)| key.clone())
        .map(|(_, entry)| entry)
        .collect();
    unique.reverse();
    unique
}

#[cfg(test)]
mod tests {
    use crate::dependency::Dependency;
    use crate::testing;

    #[test]
    fn removes_all_but_last_occurrence() {
        let entries = vec![("a", 1), ("b", 2), ("c", 3), ("b", 4), ("a", 5)];
        assert_eq!(super::remove_duplicates(entries), vec![3, 4, 5]);
    }

    #[test]
    fn shared_library_is_linked_once() {
        let (codegen, _) = testing::codegen();
        let b = testing::device_library(&codegen, "b", vec![]);
        let c = testing::device_library(&codegen, "c", vec![Dependency::Library(b.clone())]);
        let a = testing::kernel_library(
            &codegen,
            "a",
            vec![Dependency::Library(b), Dependency::Library(c)],
        );

        let inputs = super::Collector::new(&a, &testing::gfx90a(), true)
            .linker_inputs()
            .expect("Always valid");
        let names: Vec<&str> = inputs.iter().map(|input| input.name()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn libraries_of_different_codegens_are_distinct() {
        let (first, _) = testing::codegen();
        let (second, _) = testing::codegen();
        let x = testing::device_library(&first, "x", vec![]);
        let y = testing::device_library(&second, "y", vec![]);
        assert_ne!(x.id(), y.id());

        let a = testing::kernel_library(
            &first,
            "a",
            vec![Dependency::Library(x), Dependency::Library(y)],
        );
        let inputs = super::Collector::new(&a, &testing::gfx90a(), true)
            .linker_inputs()
            .expect("Always valid");
        let names: Vec<&str> = inputs.iter().map(|input| input.name()).collect();
        assert_eq!(names, vec!["a", "x", "y"]);
    }

    #[test]
    fn duplicates_differ_by_options() {
        let (codegen, counters) = testing::codegen();
        let source: &[u8] = b"__device__ int one() { return 1; }";
        let a = testing::kernel_library(
            &codegen,
            "a",
            vec![
                Dependency::hip_buffer("plain", source, None, vec![]).expect("Always valid"),
                Dependency::hip_buffer("tuned", source, None, vec!["-O1".to_owned()])
                    .expect("Always valid"),
                Dependency::hip_buffer("again", source, None, vec![]).expect("Always valid"),
            ],
        );

        let inputs = super::Collector::new(&a, &testing::gfx90a(), true)
            .linker_inputs()
            .expect("Always valid");
        // `again` is served from the cache entry compiled for `plain`.
        let names: Vec<&str> = inputs.iter().map(|input| input.name()).collect();
        assert_eq!(names, vec!["a", "tuned", "plain"]);
        assert_eq!(counters.compilations.get(), 2);
    }

    #[test]
    fn offload_bundle_section_is_selected() {
        let (codegen, _) = testing::codegen();
        let bundle = "\
; __CLANG_OFFLOAD_BUNDLE____START__ hip-amdgcn-amd-amdhsa--gfx90a
define void @cdna() {}
; __CLANG_OFFLOAD_BUNDLE____END__ hip-amdgcn-amd-amdhsa--gfx90a
; __CLANG_OFFLOAD_BUNDLE____START__ hip-amdgcn-amd-amdhsa--gfx1100
define void @rdna() {}
; __CLANG_OFFLOAD_BUNDLE____END__ hip-amdgcn-amd-amdhsa--gfx1100
";
        let a = testing::kernel_library(
            &codegen,
            "a",
            vec![Dependency::buffer("bundle", bundle.as_bytes(), None).expect("Always valid")],
        );

        let sources = super::Collector::new(&a, &testing::gfx1100(), false)
            .raw_source_strings()
            .expect("Always valid");
        assert_eq!(sources[1], "define void @rdna() {}\n");

        let error = super::Collector::new(&a, &testing::architecture("gfx942"), true)
            .linker_inputs()
            .expect_err("Must be missing");
        assert!(error.to_string().contains("gfx942"));
        assert!(codegen.linker_cache().is_empty());
    }
}

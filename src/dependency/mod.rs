//!
//! The link-time dependencies.
//!

pub mod options;
pub mod tuple;

use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::Error;
use crate::library::CodeLibrary;
use crate::library::LibraryId;

/// The file extensions of the LLVM IR and bitcode files. `ptx` is read as LLVM IR.
pub const LLVM_IR_EXTENSIONS: [&str; 3] = ["ll", "bc", "ptx"];

///
/// The raw dependency kind.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// LLVM assembly or bitcode, possibly in an offload bundle.
    Llvm,
    /// HIP C++ device source.
    Hip,
}

impl SourceKind {
    ///
    /// Selects the kind by the file extension.
    ///
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if LLVM_IR_EXTENSIONS.contains(&extension) => Self::Llvm,
            _ => Self::Hip,
        }
    }

    ///
    /// Returns the tuple specification keyword.
    ///
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Llvm => "ll",
            Self::Hip => "hip",
        }
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ll" => Ok(Self::Llvm),
            "hip" => Ok(Self::Hip),
            other => Err(Error::Configuration(format!(
                "unknown dependency kind `{}`, expected `ll` or `hip`",
                other
            ))
            .into()),
        }
    }
}

///
/// The file dependency.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDependency {
    /// The file path.
    pub path: PathBuf,
    /// The file kind.
    pub kind: SourceKind,
    /// The ahead-of-link compiler options.
    pub options: Vec<String>,
}

impl FileDependency {
    ///
    /// Reads the file contents.
    ///
    pub fn read(&self) -> anyhow::Result<Vec<u8>> {
        std::fs::read(self.path.as_path()).map_err(|error| {
            anyhow::anyhow!("file `{}` reading error: {}", self.path.display(), error)
        })
    }

    ///
    /// Returns the file name used in diagnostics.
    ///
    pub fn name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    ///
    /// Returns the identity used to remove duplicates.
    ///
    pub fn key(&self) -> DependencyKey {
        DependencyKey::File {
            path: self.path.clone(),
            kind: self.kind,
            options: self.options.clone(),
        }
    }
}

///
/// The in-memory buffer dependency.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDependency {
    /// The buffer name used in diagnostics.
    pub name: String,
    /// The buffer contents.
    pub buffer: Rc<[u8]>,
    /// The SHA-256 digest of the contents.
    pub digest: String,
    /// The buffer kind.
    pub kind: SourceKind,
    /// The ahead-of-link compiler options.
    pub options: Vec<String>,
}

impl BufferDependency {
    ///
    /// Returns the identity used to remove duplicates.
    ///
    pub fn key(&self) -> DependencyKey {
        DependencyKey::Buffer {
            digest: self.digest.clone(),
            kind: self.kind,
            options: self.options.clone(),
        }
    }
}

///
/// The link-time dependency of a code library.
///
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Another finalized code library.
    Library(Rc<CodeLibrary>),
    /// A file read when the library is linked.
    File(FileDependency),
    /// An in-memory buffer.
    Buffer(BufferDependency),
}

///
/// The dependency identity used to remove duplicates from the linker inputs.
///
/// Two leaves are only equal if they are equal in contents, kind and compiler options.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyKey {
    /// The library identity.
    Library(LibraryId),
    /// The file identity.
    File {
        /// The file path.
        path: PathBuf,
        /// The file kind.
        kind: SourceKind,
        /// The compiler options.
        options: Vec<String>,
    },
    /// The buffer identity.
    Buffer {
        /// The contents digest.
        digest: String,
        /// The buffer kind.
        kind: SourceKind,
        /// The compiler options.
        options: Vec<String>,
    },
}

impl Dependency {
    ///
    /// A file whose kind is selected by its extension.
    ///
    pub fn path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_owned();
        let kind = SourceKind::from_path(path.as_path());
        Self::File(FileDependency {
            path,
            kind,
            options: vec![],
        })
    }

    ///
    /// A file of the explicit `kind`.
    ///
    pub fn file<P: AsRef<Path>>(
        path: P,
        kind: SourceKind,
        options: Vec<String>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref().to_owned();
        if kind == SourceKind::Llvm && !options.is_empty() {
            return Err(Error::Configuration(format!(
                "LLVM IR file `{}` does not accept compiler options",
                path.display()
            ))
            .into());
        }
        Ok(Self::File(FileDependency {
            path,
            kind,
            options,
        }))
    }

    ///
    /// An LLVM assembly or bitcode buffer.
    ///
    /// The buffer is truncated to `length` if specified.
    ///
    pub fn buffer(name: &str, buffer: &[u8], length: Option<usize>) -> anyhow::Result<Self> {
        Self::new_buffer(name, buffer, length, SourceKind::Llvm, vec![])
    }

    ///
    /// A HIP C++ source buffer.
    ///
    /// The buffer is truncated to `length` if specified.
    ///
    pub fn hip_buffer(
        name: &str,
        buffer: &[u8],
        length: Option<usize>,
        options: Vec<String>,
    ) -> anyhow::Result<Self> {
        Self::new_buffer(name, buffer, length, SourceKind::Hip, options)
    }

    ///
    /// Parses a tuple specification, e.g. `["kernels.hip", "hip", "-DN=4"]`.
    ///
    /// See `tuple::parse`.
    ///
    pub fn from_tuple(entries: &[serde_json::Value]) -> anyhow::Result<Self> {
        tuple::parse(entries)
    }

    ///
    /// Returns the identity used to remove duplicates.
    ///
    pub fn key(&self) -> DependencyKey {
        match self {
            Self::Library(library) => DependencyKey::Library(library.id()),
            Self::File(file) => file.key(),
            Self::Buffer(buffer) => buffer.key(),
        }
    }

    fn new_buffer(
        name: &str,
        buffer: &[u8],
        length: Option<usize>,
        kind: SourceKind,
        options: Vec<String>,
    ) -> anyhow::Result<Self> {
        let buffer = match length {
            None => buffer,
            Some(0) => {
                return Err(Error::Configuration(format!(
                    "buffer `{}` length must be positive",
                    name
                ))
                .into())
            }
            Some(length) => buffer.get(..length).ok_or_else(|| {
                Error::Configuration(format!(
                    "buffer `{}` length {} exceeds the buffer size {}",
                    name,
                    length,
                    buffer.len()
                ))
            })?,
        };

        Ok(Self::Buffer(BufferDependency {
            name: name.to_owned(),
            buffer: Rc::from(buffer),
            digest: crate::hashes::sha256(buffer),
            kind,
            options,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::Dependency;
    use super::SourceKind;
    use crate::error::Error;

    #[test]
    fn kind_by_extension() {
        assert_eq!(SourceKind::from_path("a/b.ll".as_ref()), SourceKind::Llvm);
        assert_eq!(SourceKind::from_path("b.bc".as_ref()), SourceKind::Llvm);
        assert_eq!(SourceKind::from_path("b.ptx".as_ref()), SourceKind::Llvm);
        assert_eq!(SourceKind::from_path("b.hip".as_ref()), SourceKind::Hip);
        assert_eq!(SourceKind::from_path("b.cpp".as_ref()), SourceKind::Hip);
        assert_eq!(SourceKind::from_path("Makefile".as_ref()), SourceKind::Hip);
    }

    #[test]
    fn buffer_is_truncated() {
        let Dependency::Buffer(buffer) =
            Dependency::buffer("b", b"define void @f() {}\0\0", Some(19)).expect("Always valid")
        else {
            panic!("Expected a buffer");
        };
        assert_eq!(&*buffer.buffer, b"define void @f() {}");
    }

    #[test]
    fn buffer_length_is_validated() {
        for length in [0, 100] {
            let error = Dependency::buffer("b", b"abc", Some(length)).expect_err("Must be rejected");
            assert!(matches!(
                error.downcast_ref::<Error>(),
                Some(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn keys_include_options() {
        let plain = Dependency::hip_buffer("a", b"src", None, vec![]).expect("Always valid");
        let tuned =
            Dependency::hip_buffer("b", b"src", None, vec!["-O1".to_owned()]).expect("Always valid");
        let renamed = Dependency::hip_buffer("c", b"src", None, vec![]).expect("Always valid");

        assert_ne!(plain.key(), tuned.key());
        assert_eq!(plain.key(), renamed.key());
    }

    #[test]
    fn llvm_file_rejects_options() {
        assert!(Dependency::file("a.ll", SourceKind::Llvm, vec!["-O1".to_owned()]).is_err());
        assert!(Dependency::file("a.cu", SourceKind::Hip, vec!["-O1".to_owned()]).is_ok());
    }
}

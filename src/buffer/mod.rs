//!
//! The LLVM buffers.
//!

pub mod offload_bundle;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Error;
use crate::target::Architecture;
use crate::toolchain::IrTools;

///
/// The serialized LLVM module format.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    /// The human-readable LLVM assembly.
    Text,
    /// The LLVM bitcode, raw or wrapped.
    Bitcode,
}

impl BufferFormat {
    /// The raw bitcode magic.
    pub const BITCODE_MAGIC: [u8; 4] = [0x42, 0x43, 0xC0, 0xDE];

    /// The bitcode wrapper magic.
    pub const BITCODE_WRAPPER_MAGIC: [u8; 4] = [0xDE, 0xC0, 0x17, 0x0B];

    ///
    /// Detects the format by the leading magic.
    ///
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&Self::BITCODE_MAGIC) || bytes.starts_with(&Self::BITCODE_WRAPPER_MAGIC)
        {
            Self::Bitcode
        } else {
            Self::Text
        }
    }
}

///
/// The compiled module handle, as consumed by the linkers.
///
/// Keeps the serialized module and its lazily printed LLVM assembly.
///
#[derive(Debug)]
pub struct LlvmBuffer {
    /// The buffer name, used in diagnostics.
    name: String,
    /// The serialized module.
    bytes: Vec<u8>,
    /// The serialized module format.
    format: BufferFormat,
    /// The LLVM assembly, once printed.
    assembly: RefCell<Option<Rc<str>>>,
}

impl LlvmBuffer {
    ///
    /// A shortcut constructor.
    ///
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        let format = BufferFormat::detect(bytes.as_slice());
        Self {
            name: name.to_owned(),
            bytes,
            format,
            assembly: RefCell::new(None),
        }
    }

    ///
    /// Wraps LLVM assembly.
    ///
    pub fn from_assembly(name: &str, assembly: String) -> Self {
        let printed: Rc<str> = Rc::from(assembly.as_str());
        Self {
            name: name.to_owned(),
            bytes: assembly.into_bytes(),
            format: BufferFormat::Text,
            assembly: RefCell::new(Some(printed)),
        }
    }

    ///
    /// Extracts the `architecture` section if `bytes` is an offload bundle, and wraps the result.
    ///
    pub fn normalize(name: &str, bytes: &[u8], architecture: &Architecture) -> anyhow::Result<Self> {
        let bytes = offload_bundle::extract(bytes, architecture)?;
        Ok(Self::new(name, bytes.into_owned()))
    }

    ///
    /// Returns the buffer name.
    ///
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    ///
    /// Returns the serialized module.
    ///
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    ///
    /// Returns the serialized module format.
    ///
    pub fn format(&self) -> BufferFormat {
        self.format
    }

    ///
    /// Returns the LLVM assembly, printing the bitcode with `tools` on the first call.
    ///
    pub fn to_assembly(&self, tools: &dyn IrTools) -> anyhow::Result<Rc<str>> {
        if let Some(assembly) = self.assembly.borrow().as_ref() {
            return Ok(assembly.clone());
        }

        let assembly: Rc<str> = match self.format {
            BufferFormat::Text => Rc::from(
                std::str::from_utf8(self.bytes.as_slice()).map_err(|error| {
                    Error::Configuration(format!(
                        "LLVM assembly `{}` is not valid UTF-8: {}",
                        self.name, error
                    ))
                })?,
            ),
            BufferFormat::Bitcode => Rc::from(tools.to_assembly(self.bytes.as_slice())?),
        };
        self.assembly.replace(Some(assembly.clone()));
        Ok(assembly)
    }
}

#[cfg(test)]
mod tests {
    use super::BufferFormat;
    use super::LlvmBuffer;
    use crate::target::Architecture;
    use crate::testing::FakeIrTools;

    #[test]
    fn detects_bitcode_by_magic() {
        assert_eq!(BufferFormat::detect(b"BC\xC0\xDE\x35\x14"), BufferFormat::Bitcode);
        assert_eq!(BufferFormat::detect(b"\xDE\xC0\x17\x0B\x00"), BufferFormat::Bitcode);
        assert_eq!(BufferFormat::detect(b"; ModuleID = 'x'"), BufferFormat::Text);
        assert_eq!(BufferFormat::detect(b""), BufferFormat::Text);
    }

    #[test]
    fn prints_bitcode_once() {
        let tools = FakeIrTools::default();
        let buffer = LlvmBuffer::new("lib.bc", FakeIrTools::bitcode("define void @f() {}"));

        assert_eq!(
            &*buffer.to_assembly(&tools).expect("Always valid"),
            "define void @f() {}"
        );
        buffer.to_assembly(&tools).expect("Always valid");
        assert_eq!(tools.counters.disassemblies.get(), 1);
    }

    #[test]
    fn normalizes_plain_buffers_unchanged() {
        let architecture = Architecture::new("gfx90a").expect("Always valid");
        let buffer =
            LlvmBuffer::normalize("lib.ll", b"define void @f() {}", &architecture).expect("Always valid");
        assert_eq!(buffer.bytes(), b"define void @f() {}");
        assert_eq!(buffer.format(), BufferFormat::Text);
    }
}

//!
//! The IR dump flag.
//!

use std::str::FromStr;

use crate::error::Error;

///
/// The intermediate representation dump flags.
///
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpFlag {
    /// Whether to dump the unlinked post-processed linker inputs.
    Unlinked,
    /// Whether to dump the linked LLVM IR, before and after the mid-end optimizer.
    LLVM,
}

impl FromStr for DumpFlag {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unlinked" => Ok(Self::Unlinked),
            "llvm" => Ok(Self::LLVM),
            other => Err(Error::Configuration(format!(
                "unknown dump flag `{}`, expected `unlinked` or `llvm`",
                other
            ))
            .into()),
        }
    }
}

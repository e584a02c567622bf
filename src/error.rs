//!
//! The code library errors.
//!

///
/// The errors raised by the code library itself.
///
/// The toolchain failures are not wrapped, so the caller sees the original diagnostics.
/// Use `anyhow::Error::downcast_ref::<Error>()` to classify a failure.
///
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed request, always rejected before any toolchain invocation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A missing entry, e.g. an architecture absent from an offload bundle.
    #[error("lookup error: {0}")]
    Lookup(String),
    /// An operation which does not apply to the library by its role.
    #[error("not applicable: {0}")]
    NotApplicable(String),
    /// An operation which is not supported yet.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

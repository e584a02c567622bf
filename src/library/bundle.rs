//!
//! The diagnostic multi-file bundles.
//!
//! Used for printing only, never parsed by the toolchain.
//!

/// The line separating two files.
pub const FILE_SEPARATOR: &str = "----------(start of next file)----------";

///
/// Joins `files` with the file separator.
///
pub fn bundle<S: AsRef<str>>(files: &[S]) -> String {
    files
        .iter()
        .map(|file| file.as_ref())
        .collect::<Vec<&str>>()
        .join(separator().as_str())
}

///
/// Splits a bundle back into its files.
///
pub fn unbundle(bundled: &str) -> Vec<&str> {
    bundled.split(separator().as_str()).collect()
}

fn separator() -> String {
    format!("\n\n{}\n\n", FILE_SEPARATOR)
}

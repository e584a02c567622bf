//!
//! The Clang offload bundles.
//!
//! A bundle carries one section per offload target. Both the human-readable form, produced
//! when emitting LLVM assembly, and the binary form, produced when emitting bitcode, are supported.
//!

use std::borrow::Cow;

use crate::error::Error;
use crate::target::Architecture;

/// The human-readable section start marker.
pub const TEXT_START_MARKER: &str = "__CLANG_OFFLOAD_BUNDLE____START__";

/// The human-readable section end marker.
pub const TEXT_END_MARKER: &str = "__CLANG_OFFLOAD_BUNDLE____END__";

/// The binary bundle magic.
pub const BINARY_MAGIC: &[u8] = b"__CLANG_OFFLOAD_BUNDLE__";

///
/// The bundle section: the target identifier and the payload.
///
pub type Section = (String, Vec<u8>);

///
/// Checks whether `bytes` is an offload bundle of either form.
///
pub fn is_bundle(bytes: &[u8]) -> bool {
    bytes.starts_with(BINARY_MAGIC) || is_text_bundle(bytes)
}

///
/// Splits the bundle into its sections, preserving their order.
///
pub fn split(bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
    if bytes.starts_with(BINARY_MAGIC) {
        split_binary(bytes)
    } else {
        let text = std::str::from_utf8(bytes)
            .map_err(|error| malformed(format!("the text is not valid UTF-8: {}", error)))?;
        split_text(text)
    }
}

///
/// Returns the `architecture` section if `bytes` is a bundle, or `bytes` unchanged otherwise.
///
pub fn extract<'a>(bytes: &'a [u8], architecture: &Architecture) -> anyhow::Result<Cow<'a, [u8]>> {
    if !is_bundle(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }

    let sections = split(bytes)?;
    let target_ids = architecture.target_ids();
    let available: Vec<String> = sections.iter().map(|(id, _)| id.to_owned()).collect();
    sections
        .into_iter()
        .find(|(id, _)| target_ids.contains(id))
        .map(|(_, payload)| Cow::Owned(payload))
        .ok_or_else(|| {
            Error::Lookup(format!(
                "the offload bundle has no section for `{}`, available: [{}]",
                architecture.target_id(),
                available.join(", ")
            ))
            .into()
        })
}

fn is_text_bundle(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.contains(TEXT_START_MARKER) => text
            .lines()
            .any(|line| text_marker(line, TEXT_START_MARKER).is_some()),
        _ => false,
    }
}

fn text_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.trim_start()
        .strip_prefix(';')?
        .trim_start()
        .strip_prefix(marker)
        .map(str::trim)
}

fn split_text(text: &str) -> anyhow::Result<Vec<Section>> {
    let mut sections = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(id) = text_marker(line, TEXT_START_MARKER) {
            if let Some((open, _)) = current {
                return Err(malformed(format!(
                    "section `{}` starts before section `{}` ends",
                    id, open
                )));
            }
            current = Some((id, Vec::new()));
        } else if let Some(id) = text_marker(line, TEXT_END_MARKER) {
            match current.take() {
                Some((open, lines)) if open == id => {
                    let mut payload = lines.join("\n");
                    payload.push('\n');
                    sections.push((open.to_owned(), payload.into_bytes()));
                }
                _ => return Err(malformed(format!("unexpected end of section `{}`", id))),
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    match current {
        Some((open, _)) => Err(malformed(format!("section `{}` is not terminated", open))),
        None => Ok(sections),
    }
}

fn split_binary(bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
    let mut reader = Reader {
        bytes,
        position: BINARY_MAGIC.len(),
    };

    let count = reader.read_u64()?;
    let mut sections = Vec::new();
    for _ in 0..count {
        let offset = reader.read_u64()? as usize;
        let size = reader.read_u64()? as usize;
        let id_length = reader.read_u64()? as usize;
        let id = String::from_utf8(reader.read_bytes(id_length)?.to_vec())
            .map_err(|error| malformed(format!("the target identifier is not UTF-8: {}", error)))?;
        let payload = offset
            .checked_add(size)
            .and_then(|end| bytes.get(offset..end))
            .ok_or_else(|| malformed(format!("section `{}` lies outside of the bundle", id)))?;
        sections.push((id, payload.to_vec()));
    }
    Ok(sections)
}

///
/// The little-endian bundle header reader.
///
struct Reader<'a> {
    /// The whole bundle.
    bytes: &'a [u8],
    /// The current offset.
    position: usize,
}

impl<'a> Reader<'a> {
    fn read_bytes(&mut self, length: usize) -> anyhow::Result<&'a [u8]> {
        let bytes = self
            .position
            .checked_add(length)
            .and_then(|end| self.bytes.get(self.position..end))
            .ok_or_else(|| malformed("the header is truncated".to_owned()))?;
        self.position += length;
        Ok(bytes)
    }

    fn read_u64(&mut self) -> anyhow::Result<u64> {
        let mut word = [0u8; 8];
        let length = word.len();
        word.copy_from_slice(self.read_bytes(length)?);
        Ok(u64::from_le_bytes(word))
    }
}

fn malformed(message: String) -> anyhow::Error {
    Error::Configuration(format!("malformed offload bundle: {}", message)).into()
}

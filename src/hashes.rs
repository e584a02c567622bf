//!
//! The hashing tools.
//!

///
/// Computes the `sha256` digest for `preimage` as a lowercase hexadecimal string.
///
pub fn sha256(preimage: &[u8]) -> String {
    use sha2::Digest;

    hex::encode(sha2::Sha256::digest(preimage))
}

//! Author tag encoding
//!
//! A `.uexp` file may carry a short author string between its last export
//! and the closing signature. The encoding of that string is pluggable; the
//! raw bytes are always kept, so the choice never affects round trips.

use std::fmt::Debug;

/// Encodes and decodes the author tag.
pub trait Cipher: Debug + Send + Sync {
    /// Encode `text` into trailer bytes.
    fn encrypt(&self, text: &str) -> Vec<u8>;

    /// Decode trailer bytes. Must not fail: undecodable input yields a
    /// best-effort string.
    fn decrypt(&self, bytes: &[u8]) -> String;
}

/// Stores the tag as plain UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCipher;

impl Cipher for PlainCipher {
    fn encrypt(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    fn decrypt(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

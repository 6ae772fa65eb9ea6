//! Module `cipher`
//!
//! Repeating-key XOR transform applied to payload bytes on their way to and
//! from disk. This is obfuscation only: it hides file contents from a casual
//! look at the storage root and offers no confidentiality.

/// XOR transform keyed by a repeating byte string.
///
/// Applying it twice at the same offset restores the input, so the same
/// value serves both the upload and the download path.
#[derive(Debug, Clone)]
pub struct ByteCipher {
    key: Vec<u8>,
}

impl ByteCipher {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Transforms `data` in place. `offset` is the position of `data[0]` within
    /// the whole payload, which keeps the key aligned across chunk boundaries.
    pub fn apply(&self, data: &mut [u8], offset: u64) {
        if self.key.is_empty() {
            return;
        }
        let len = self.key.len() as u64;
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= self.key[((offset + i as u64) % len) as usize];
        }
    }
}

/// One-shot form of [`ByteCipher::apply`] starting at offset 0.
pub fn apply(bytes: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    ByteCipher::new(key).apply(&mut out, 0);
    out
}

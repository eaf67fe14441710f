//! Binary file detection

use std::io::Read;
use std::path::Path;

use crate::models::DEFAULT_BINARY_SNIFF_BYTES;

/// Classifies template files as text (rendered) or binary (copied)
///
/// A file is binary when its first `sniff_bytes` bytes contain a NUL byte.
#[derive(Debug, Clone, Copy)]
pub struct BinaryClassifier {
    sniff_bytes: usize,
}

impl BinaryClassifier {
    pub fn new(sniff_bytes: usize) -> Self {
        Self {
            sniff_bytes: sniff_bytes.max(1),
        }
    }

    pub fn sniff_bytes(&self) -> usize {
        self.sniff_bytes
    }

    pub fn is_binary_content(&self, content: &[u8]) -> bool {
        let head = &content[..content.len().min(self.sniff_bytes)];
        head.contains(&0)
    }

    /// Read the head of `path` and classify it
    pub fn is_binary_file(&self, path: &Path) -> std::io::Result<bool> {
        let file = std::fs::File::open(path)?;
        let mut head = Vec::with_capacity(self.sniff_bytes.min(64 * 1024));
        file.take(self.sniff_bytes as u64).read_to_end(&mut head)?;
        Ok(head.contains(&0))
    }
}

impl Default for BinaryClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY_SNIFF_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_not_binary() {
        let classifier = BinaryClassifier::default();
        assert!(!classifier.is_binary_content(b"fn main() {}\n"));
        assert!(!classifier.is_binary_content(b""));
    }

    #[test]
    fn test_nul_byte_is_binary() {
        let classifier = BinaryClassifier::default();
        assert!(classifier.is_binary_content(&[0x89, b'P', b'N', b'G', 0, 1]));
    }

    #[test]
    fn test_nul_past_sniff_window_is_text() {
        let classifier = BinaryClassifier::new(4);
        assert!(!classifier.is_binary_content(b"abcd\0"));
        assert!(classifier.is_binary_content(b"ab\0d"));
    }

    #[test]
    fn test_is_binary_file() {
        let temp = tempfile::tempdir().unwrap();
        let text = temp.path().join("a.txt");
        let bin = temp.path().join("a.bin");
        std::fs::write(&text, "hello").unwrap();
        std::fs::write(&bin, [1u8, 0, 2]).unwrap();

        let classifier = BinaryClassifier::default();
        assert!(!classifier.is_binary_file(&text).unwrap());
        assert!(classifier.is_binary_file(&bin).unwrap());
    }
}

//! # Byte View
//!
//! An immutable, length-accounted value container. Every value handed to
//! a cache is copied on the way in and handed back as a `ByteView` on the
//! way out — callers can never mutate cached bytes, and the cache never
//! aliases caller-owned memory.

use std::fmt;
use std::sync::Arc;

/// Preview length used when a `ByteView` is formatted for logs/debug
/// output, so a large cached blob never floods a `tracing` line.
const DEBUG_PREVIEW_LEN: usize = 32;

/// An immutable, reference-counted byte buffer.
///
/// Cloning a `ByteView` is an `Arc` bump, not a copy. Equality and hashing
/// are by content.
#[derive(Clone, Eq)]
pub struct ByteView {
    bytes: Arc<[u8]>,
}

impl ByteView {
    /// Copies `data` into a new, immutable view.
    pub fn new(data: &[u8]) -> Self {
        ByteView { bytes: Arc::from(data) }
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true when the view holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrows the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies the view out into an owned `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        ByteView { bytes: Arc::from(data.into_boxed_slice()) }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        ByteView::new(data)
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for ByteView {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.as_ref() == other.bytes.as_ref()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes.len() <= DEBUG_PREVIEW_LEN {
            write!(f, "ByteView({:?})", String::from_utf8_lossy(&self.bytes))
        } else {
            write!(
                f,
                "ByteView({:?}... [{} bytes])",
                String::from_utf8_lossy(&self.bytes[..DEBUG_PREVIEW_LEN]),
                self.bytes.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_content() {
        let a = ByteView::new(b"hello");
        let b = ByteView::new(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn clone_does_not_copy_bytes() {
        let a = ByteView::new(b"hello");
        let b = a.clone();
        assert_eq!(a.as_bytes().as_ptr(), b.as_bytes().as_ptr());
    }

    #[test]
    fn never_aliases_caller_buffer() {
        let mut data = vec![1u8, 2, 3];
        let view = ByteView::new(&data);
        data[0] = 99;
        assert_eq!(view.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn debug_truncates_large_values() {
        let view = ByteView::new(&vec![b'a'; 1000]);
        let debug = format!("{view:?}");
        assert!(debug.len() < 1000);
    }
}

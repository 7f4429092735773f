//! Output element types for [StreamingDecompressReader](crate::StreamingDecompressReader).
//!
//! Decompressors always produce `u8`. Callers that want another byte
//! representation pick it through the reader's type parameter, and the
//! reader keeps a second buffer holding the reinterpreted bytes.

use std::fmt;

mod sealed {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for i8 {}
}

/// A byte-sized element a reader can expose its chunks as.
///
/// This trait is sealed: only `u8` and `i8` implement it.
pub trait Element: sealed::Sealed + Copy + Default + fmt::Debug + 'static {
    /// Whether chunks need to be copied into a secondary buffer.
    const ADAPTED: bool;

    /// Reinterprets one decompressed byte.
    fn from_byte(byte: u8) -> Self;

    /// Picks whichever buffer holds the chunk in this representation.
    fn view<'a>(primary: &'a [u8], secondary: &'a [Self]) -> &'a [Self];
}

impl Element for u8 {
    const ADAPTED: bool = false;

    #[inline]
    fn from_byte(byte: u8) -> Self {
        byte
    }

    #[inline]
    fn view<'a>(primary: &'a [u8], _secondary: &'a [Self]) -> &'a [Self] {
        primary
    }
}

impl Element for i8 {
    const ADAPTED: bool = true;

    #[inline]
    fn from_byte(byte: u8) -> Self {
        byte as i8
    }

    #[inline]
    fn view<'a>(_primary: &'a [u8], secondary: &'a [Self]) -> &'a [Self] {
        secondary
    }
}

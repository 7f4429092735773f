//! All error types used in this crate

use std::{io, path::PathBuf};

use crate::handle::Format;

/// Anything that can go wrong while opening or draining a compressed stream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be opened, or does not start with a valid header
    /// for the expected format.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// The path that was being opened
        path: PathBuf,
        /// What went wrong
        #[source]
        source: io::Error,
    },

    /// The decompressor hit a fault mid-stream (corrupt data, truncated
    /// stream, I/O error), as opposed to a clean end of stream.
    #[error("{format} decompression error: {msg}")]
    Decompression {
        /// The format being decompressed
        format: Format,
        /// Diagnostic text reported by the decompressor
        msg: String,
    },

    /// Readers need room for at least one byte per chunk.
    #[error("buffer capacity must be at least 1 byte")]
    ZeroCapacity,

    /// A previous advance failed; the reader can't be used anymore.
    #[error("reader is unusable after a previous decompression error")]
    Poisoned,

    /// I/O error on the consuming side (e.g. while copying chunks out)
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unrecognized(path: impl Into<PathBuf>) -> Self {
        Self::open(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "unrecognized compression format"),
        )
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::Open { source, .. } => source,
            e => io::Error::other(e),
        }
    }
}

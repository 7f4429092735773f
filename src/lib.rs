#![warn(missing_docs)]

//! chunkz reads compressed files front to back, one fixed-size chunk of
//! decompressed bytes at a time.
//!
//! ```no_run
//! use chunkz::Reader;
//!
//! let mut reader: Reader = Reader::with_capacity("data.gz", 4096)?;
//! let mut total = 0;
//! while reader.advance()? {
//!     total += reader.buffer().len();
//! }
//! println!("{total} bytes");
//! # Ok::<(), chunkz::Error>(())
//! ```
//!
//! Supported formats are picked with cargo features:
//!
//!   * `gzip` (default), through flate2
//!   * `bzip2`, through the bzip2 crate
//!   * `zstd`, through the zstd crate
//!
//! Only the first member/stream/frame of a file is read.

mod element;
pub mod error;
pub mod handle;
mod reader;

pub use element::Element;
pub use error::Error;
pub use handle::{Format, Handle};
pub use reader::{StreamingDecompressReader, DEFAULT_BUFFER_CAPACITY};

cfg_if::cfg_if! {
    if #[cfg(feature = "gzip")] {
        /// A reader over gzip files, the most common case.
        pub type Reader<B = u8> = StreamingDecompressReader<handle::GzipHandle, B>;
    }
}

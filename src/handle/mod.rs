//! Decompression handles: one open compressed file, read front to back.
//!
//! A [Handle] never fails on read. Like zlib's `gzread`, it reports how many
//! bytes it produced and records faults on the side, so that callers can
//! tell a clean end of stream ([Handle::is_eof]) from a fault
//! ([Handle::last_error]) when a read comes back empty.

#[cfg(feature = "gzip")]
mod gzip_dec;
#[cfg(feature = "gzip")]
pub use gzip_dec::{Gzip, GzipHandle};

#[cfg(feature = "bzip2")]
mod bzip2_dec;
#[cfg(feature = "bzip2")]
pub use bzip2_dec::{Bzip2, Bzip2Handle};

#[cfg(feature = "zstd")]
mod zstd_dec;
#[cfg(feature = "zstd")]
pub use zstd_dec::{Zstd, ZstdHandle};

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, Read},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use crate::error::Error;

/// The resource a reader pulls decompressed bytes from.
///
/// Dropping a handle releases it. Drop must never panic.
pub trait Handle: Sized {
    /// Opens `path` for reading. Fails eagerly if the file is missing or
    /// doesn't look like the expected format.
    fn open(path: &Path) -> Result<Self, Error>;

    /// Decompresses up to `buf.len()` bytes into `buf`, returning how many
    /// were produced. A return of 0 means either end of stream or a fault.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// True once the stream ended cleanly.
    fn is_eof(&self) -> bool;

    /// Diagnostic for the fault that stopped the stream, if any.
    fn last_error(&self) -> String;

    /// The format being decompressed.
    fn format(&self) -> Format;
}

/// Compression formats this crate knows about. Whether each one can
/// actually be read depends on the enabled cargo features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// gzip (RFC 1952), feature `gzip`
    Gzip,
    /// bzip2, feature `bzip2`
    Bzip2,
    /// Zstandard, feature `zstd`
    Zstd,
}

impl Format {
    /// How many leading bytes [Format::sniff] looks at.
    pub const MAGIC_LEN: usize = 4;

    /// Guesses the format from the first bytes of a file.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        [Self::Gzip, Self::Bzip2, Self::Zstd]
            .into_iter()
            .find(|format| format.matches(head))
    }

    /// Whether `head` starts with this format's magic bytes.
    pub fn matches(self, head: &[u8]) -> bool {
        match self {
            Self::Gzip => head.starts_with(&[0x1f, 0x8b, 0x08]),
            Self::Bzip2 => {
                head.len() >= 4 && head.starts_with(b"BZh") && (b'1'..=b'9').contains(&head[3])
            }
            Self::Zstd => head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]),
        }
    }

    /// Sniffs the format of the file at `path`.
    pub fn detect(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path).map_err(|e| Error::open(path, e))?;
        let mut head = [0u8; Self::MAGIC_LEN];
        let mut filled = 0;
        while filled < head.len() {
            match file.read(&mut head[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::open(path, e)),
            }
        }

        Self::sniff(&head[..filled]).ok_or_else(|| Error::unrecognized(path))
    }

    /// Whether support for this format was compiled in.
    pub fn is_enabled(self) -> bool {
        match self {
            Self::Gzip => cfg!(feature = "gzip"),
            Self::Bzip2 => cfg!(feature = "bzip2"),
            Self::Zstd => cfg!(feature = "zstd"),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Zstd => "zstd",
        })
    }
}

/// Glue between a format and the `std::io::Read` decoder implementing it.
pub trait Codec {
    /// Which format this codec decodes
    const FORMAT: Format;

    /// The decoder reading from the (already magic-checked) file
    type Decoder: Read;

    /// Wraps the opened file in a decoder.
    fn decoder(input: BufReader<File>) -> io::Result<Self::Decoder>;
}

/// A [Handle] on top of any streaming `Read` decoder.
///
/// Faults are sticky: once the decoder errors, every later read produces
/// nothing, and the fault is reported through [Handle::last_error].
pub struct StreamHandle<C>
where
    C: Codec,
{
    path: PathBuf,
    decoder: C::Decoder,
    eof: bool,
    fault: Option<io::Error>,
    _codec: PhantomData<C>,
}

fn open_input(path: &Path) -> Result<BufReader<File>, Error> {
    let file = File::open(path).map_err(|e| Error::open(path, e))?;
    Ok(BufReader::new(file))
}

impl<C> StreamHandle<C>
where
    C: Codec,
{
    /// Checks the magic bytes at the start of `input`, then wraps it in a
    /// decoder. Already-buffered bytes are not read again.
    fn from_input(path: &Path, mut input: BufReader<File>) -> Result<Self, Error> {
        let head = input.fill_buf().map_err(|e| Error::open(path, e))?;
        if !C::FORMAT.matches(head) {
            return Err(Error::open(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("not a {} stream: bad magic bytes", C::FORMAT),
                ),
            ));
        }

        let decoder = C::decoder(input).map_err(|e| Error::open(path, e))?;
        debug!(path = %path.display(), format = %C::FORMAT, "opened handle");

        Ok(Self {
            path: path.to_owned(),
            decoder,
            eof: false,
            fault: None,
            _codec: PhantomData,
        })
    }
}

impl<C> Handle for StreamHandle<C>
where
    C: Codec,
{
    fn open(path: &Path) -> Result<Self, Error> {
        Self::from_input(path, open_input(path)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.eof || self.fault.is_some() {
            return 0;
        }

        let mut filled = 0;
        while filled < buf.len() {
            match self.decoder.read(&mut buf[filled..]) {
                Ok(0) => {
                    trace!(%filled, "decoder reached end of stream");
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    trace!(%filled, error = %e, "decoder failed");
                    self.fault = Some(e);
                    break;
                }
            }
        }
        filled
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn last_error(&self) -> String {
        self.fault
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    fn format(&self) -> Format {
        C::FORMAT
    }
}

impl<C> Drop for StreamHandle<C>
where
    C: Codec,
{
    fn drop(&mut self) {
        // the file descriptor is closed when the decoder drops; std swallows close errors
        trace!(path = %self.path.display(), format = %C::FORMAT, eof = self.eof, "releasing handle");
    }
}

/// A handle for whichever enabled format the file turns out to be in.
#[cfg(any(feature = "gzip", feature = "bzip2", feature = "zstd"))]
pub enum AnyHandle {
    /// gzip stream
    #[cfg(feature = "gzip")]
    Gzip(GzipHandle),
    /// bzip2 stream
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Handle),
    /// Zstandard stream
    #[cfg(feature = "zstd")]
    Zstd(ZstdHandle),
}

#[cfg(any(feature = "gzip", feature = "bzip2", feature = "zstd"))]
macro_rules! dispatch {
    ($self: expr, $h: ident => $body: expr) => {
        match $self {
            #[cfg(feature = "gzip")]
            AnyHandle::Gzip($h) => $body,
            #[cfg(feature = "bzip2")]
            AnyHandle::Bzip2($h) => $body,
            #[cfg(feature = "zstd")]
            AnyHandle::Zstd($h) => $body,
        }
    };
}

#[cfg(any(feature = "gzip", feature = "bzip2", feature = "zstd"))]
impl Handle for AnyHandle {
    fn open(path: &Path) -> Result<Self, Error> {
        let mut input = open_input(path)?;
        let head = input.fill_buf().map_err(|e| Error::open(path, e))?;
        let format = Format::sniff(head).ok_or_else(|| Error::unrecognized(path))?;

        let handle = match format {
            #[cfg(feature = "gzip")]
            Format::Gzip => Self::Gzip(GzipHandle::from_input(path, input)?),
            #[cfg(feature = "bzip2")]
            Format::Bzip2 => Self::Bzip2(Bzip2Handle::from_input(path, input)?),
            #[cfg(feature = "zstd")]
            Format::Zstd => Self::Zstd(ZstdHandle::from_input(path, input)?),
            #[allow(unreachable_patterns)]
            format => {
                return Err(Error::open(
                    path,
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!("{format} support is not enabled in this build"),
                    ),
                ))
            }
        };
        Ok(handle)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        dispatch!(self, h => h.read(buf))
    }

    fn is_eof(&self) -> bool {
        dispatch!(self, h => h.is_eof())
    }

    fn last_error(&self) -> String {
        dispatch!(self, h => h.last_error())
    }

    fn format(&self) -> Format {
        dispatch!(self, h => h.format())
    }
}

use std::{io, path::Path};

use tracing::{debug, trace};

use crate::{element::Element, error::Error, handle::Handle};

/// Buffer capacity used by [StreamingDecompressReader::open].
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Exhausted,
    Poisoned,
}

/// Reads decompressed bytes from a file, one fixed-size chunk at a time.
///
/// Call [advance](Self::advance) until it returns `false`, consuming
/// [buffer](Self::buffer) after each call. The returned slice is exactly
/// [available](Self::available) elements long.
///
/// The advance that returns `false` always leaves `available() == 0`: the
/// last partial chunk, if any, comes with the preceding `true`.
///
/// `B` selects the element type chunks are exposed as. For anything other
/// than `u8` the reader keeps a second buffer of the same capacity holding
/// the reinterpreted bytes.
///
/// The handle is released when the reader is dropped, whatever state it's in.
pub struct StreamingDecompressReader<H, B = u8>
where
    H: Handle,
    B: Element,
{
    handle: H,
    buffer: Box<[u8]>,
    adapted: Box<[B]>,
    available: usize,
    state: State,
}

impl<H, B> StreamingDecompressReader<H, B>
where
    H: Handle,
    B: Element,
{
    /// Opens `path` with a [DEFAULT_BUFFER_CAPACITY]-byte buffer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::with_capacity(path, DEFAULT_BUFFER_CAPACITY)
    }

    /// Opens `path`, producing chunks of at most `capacity` bytes.
    ///
    /// Fails with [Error::ZeroCapacity] if `capacity` is 0 (before touching
    /// the file), and with [Error::Open] if the file can't be opened or has
    /// no valid header.
    pub fn with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        let path = path.as_ref();
        let handle = H::open(path)?;
        debug!(path = %path.display(), %capacity, adapted = B::ADAPTED, "opened reader");

        let adapted = if B::ADAPTED {
            vec![B::default(); capacity]
        } else {
            Vec::new()
        };

        Ok(Self {
            handle,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            adapted: adapted.into_boxed_slice(),
            available: 0,
            state: State::Open,
        })
    }

    /// Decompresses the next chunk into the buffer.
    ///
    /// Returns `Ok(true)` if at least one byte was produced, `Ok(false)` at
    /// the end of the stream. A read that produces nothing without reaching
    /// the end of the stream is an [Error::Decompression]; after that the
    /// buffer still holds the last good chunk, but every further advance
    /// returns [Error::Poisoned].
    ///
    /// Once exhausted, further calls return `Ok(false)` without reading.
    pub fn advance(&mut self) -> Result<bool, Error> {
        match self.state {
            State::Open => {}
            State::Exhausted => return Ok(false),
            State::Poisoned => return Err(Error::Poisoned),
        }

        let read = self.handle.read(&mut self.buffer);
        debug_assert!(read <= self.buffer.len(), "handle overreported read");
        let read = read.min(self.buffer.len());

        // eof is only consulted when nothing came out
        if read == 0 {
            if !self.handle.is_eof() {
                self.state = State::Poisoned;
                let msg = self.handle.last_error();
                debug!(format = %self.handle.format(), %msg, "decompression failed");
                return Err(Error::Decompression {
                    format: self.handle.format(),
                    msg,
                });
            }

            trace!("end of stream");
            self.available = 0;
            self.state = State::Exhausted;
            return Ok(false);
        }

        if B::ADAPTED {
            for (dst, &src) in self.adapted[..read].iter_mut().zip(&self.buffer[..read]) {
                *dst = B::from_byte(src);
            }
        }
        self.available = read;
        trace!(%read, capacity = self.buffer.len(), "advanced");
        Ok(true)
    }

    /// The chunk produced by the last [advance](Self::advance).
    pub fn buffer(&self) -> &[B] {
        let primary = &self.buffer[..self.available];
        let secondary = if B::ADAPTED {
            &self.adapted[..self.available]
        } else {
            &self.adapted[..]
        };
        B::view(primary, secondary)
    }

    /// Number of elements produced by the last [advance](Self::advance).
    pub fn available(&self) -> usize {
        self.available
    }

    /// Maximum chunk size, as passed at construction.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Whether [advance](Self::advance) has returned `false`.
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// The underlying handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Advances until the end of the stream, writing each new chunk's raw
    /// bytes to `w`. The chunk currently in the buffer is not written.
    ///
    /// Returns the number of bytes written.
    pub fn copy_to<W>(&mut self, mut w: W) -> Result<u64, Error>
    where
        W: io::Write,
    {
        let mut written = 0u64;
        while self.advance()? {
            let chunk = &self.buffer[..self.available];
            w.write_all(chunk)?;
            written += chunk.len() as u64;
        }
        w.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        cmp,
        path::{Path, PathBuf},
    };

    use crate::{
        element::Element,
        error::Error,
        handle::{Format, Handle},
    };

    use super::StreamingDecompressReader;

    thread_local! {
        static LIVE_HANDLES: Cell<usize> = const { Cell::new(0) };
        static OPENED_HANDLES: Cell<usize> = const { Cell::new(0) };
    }

    fn live_handles() -> usize {
        LIVE_HANDLES.with(Cell::get)
    }

    fn opened_handles() -> usize {
        OPENED_HANDLES.with(Cell::get)
    }

    /// Serves a canned payload. Paths pick the behavior:
    ///
    ///   * `missing`: open fails
    ///   * `fault-after-N`: yields the first N bytes of the payload, then faults
    ///   * `empty`: zero-length stream
    ///   * anything else: the full payload
    struct ScriptedHandle {
        data: Vec<u8>,
        pos: usize,
        fail_at: Option<usize>,
        eof: bool,
        fault: Option<String>,
        reads: usize,
    }

    const PAYLOAD: &[u8] = b"ABCDEFGHIJ";

    impl Handle for ScriptedHandle {
        fn open(path: &Path) -> Result<Self, Error> {
            let name = path.to_string_lossy();
            if name == "missing" {
                return Err(Error::open(path, std::io::ErrorKind::NotFound.into()));
            }

            let data = if name == "empty" {
                vec![]
            } else {
                PAYLOAD.to_vec()
            };
            let fail_at = name
                .strip_prefix("fault-after-")
                .map(|n| n.parse::<usize>().unwrap());

            LIVE_HANDLES.with(|c| c.set(c.get() + 1));
            OPENED_HANDLES.with(|c| c.set(c.get() + 1));
            Ok(Self {
                data,
                pos: 0,
                fail_at,
                eof: false,
                fault: None,
                reads: 0,
            })
        }

        fn read(&mut self, buf: &mut [u8]) -> usize {
            self.reads += 1;
            if self.fault.is_some() {
                return 0;
            }

            let end = self.fail_at.unwrap_or(self.data.len());
            let n = cmp::min(buf.len(), end - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;

            if n == 0 {
                match self.fail_at {
                    Some(_) => self.fault = Some("unexpected end of file".into()),
                    None => self.eof = true,
                }
            }
            n
        }

        fn is_eof(&self) -> bool {
            self.eof
        }

        fn last_error(&self) -> String {
            self.fault.clone().unwrap_or_default()
        }

        fn format(&self) -> Format {
            Format::Gzip
        }
    }

    impl Drop for ScriptedHandle {
        fn drop(&mut self) {
            LIVE_HANDLES.with(|c| c.set(c.get() - 1));
        }
    }

    type Bytes = StreamingDecompressReader<ScriptedHandle, u8>;
    type Signed = StreamingDecompressReader<ScriptedHandle, i8>;

    fn chunks<B>(reader: &mut StreamingDecompressReader<ScriptedHandle, B>) -> Vec<(bool, Vec<B>)>
    where
        B: Element,
    {
        let mut out = vec![];
        loop {
            let more = reader.advance().unwrap();
            assert!(reader.available() <= reader.capacity());
            assert_eq!(reader.buffer().len(), reader.available());
            out.push((more, reader.buffer().to_vec()));
            if !more {
                return out;
            }
        }
    }

    #[test_log::test]
    fn four_byte_chunks() {
        let mut reader = Bytes::with_capacity("abc", 4).unwrap();
        assert_eq!(reader.available(), 0);
        assert!(reader.buffer().is_empty());

        assert_eq!(
            chunks(&mut reader),
            vec![
                (true, b"ABCD".to_vec()),
                (true, b"EFGH".to_vec()),
                (true, b"IJ".to_vec()),
                (false, vec![]),
            ]
        );
        assert!(reader.is_exhausted());
    }

    #[test_log::test]
    fn capacity_larger_than_stream() {
        let mut reader = Bytes::open("abc").unwrap();
        assert_eq!(
            chunks(&mut reader),
            vec![(true, PAYLOAD.to_vec()), (false, vec![])]
        );
    }

    #[test_log::test]
    fn signed_chunks() {
        let mut reader = Signed::with_capacity("abc", 8).unwrap();
        let expected: Vec<i8> = PAYLOAD.iter().map(|&b| b as i8).collect();
        assert_eq!(
            chunks(&mut reader),
            vec![
                (true, expected[..8].to_vec()),
                (true, expected[8..].to_vec()),
                (false, vec![]),
            ]
        );
    }

    #[test_log::test]
    fn empty_stream() {
        let mut reader = Bytes::with_capacity("empty", 4).unwrap();
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.available(), 0);
        assert!(reader.buffer().is_empty());
    }

    #[test_log::test]
    fn advancing_after_exhaustion_does_not_read() {
        let mut reader = Bytes::with_capacity("abc", 16).unwrap();
        assert!(reader.advance().unwrap());
        assert!(!reader.advance().unwrap());
        let reads = reader.handle().reads;

        assert!(!reader.advance().unwrap());
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.handle().reads, reads);
        assert_eq!(reader.available(), 0);
    }

    #[test_log::test]
    fn fault_is_not_end_of_stream() {
        let mut reader = Bytes::with_capacity("fault-after-6", 4).unwrap();
        assert!(reader.advance().unwrap());
        assert_eq!(reader.buffer(), b"ABCD");
        assert!(reader.advance().unwrap());
        assert_eq!(reader.buffer(), b"EF");

        match reader.advance() {
            Err(Error::Decompression { format, msg }) => {
                assert_eq!(format, Format::Gzip);
                assert_eq!(msg, "unexpected end of file");
            }
            other => panic!("expected decompression error, got {other:?}"),
        }

        // last good chunk is still there
        assert_eq!(reader.available(), 2);
        assert_eq!(reader.buffer(), b"EF");

        let reads = reader.handle().reads;
        assert!(matches!(reader.advance(), Err(Error::Poisoned)));
        assert_eq!(reader.handle().reads, reads);
    }

    #[test_log::test]
    fn zero_capacity_is_rejected_before_opening() {
        let before = opened_handles();
        assert!(matches!(
            Bytes::with_capacity("abc", 0),
            Err(Error::ZeroCapacity)
        ));
        assert_eq!(opened_handles(), before);
    }

    #[test_log::test]
    fn open_failure_leaves_nothing_behind() {
        let err = Bytes::open("missing").err().expect("open should fail");
        match err {
            Error::Open { path, source } => {
                assert_eq!(path, PathBuf::from("missing"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected open error, got {other:?}"),
        }
        assert_eq!(live_handles(), 0);
    }

    #[test_log::test]
    fn handles_are_released_on_every_path() {
        assert_eq!(live_handles(), 0);

        // dropped before the first advance
        drop(Bytes::open("abc").unwrap());
        assert_eq!(live_handles(), 0);

        // dropped after partial consumption
        {
            let mut reader = Bytes::with_capacity("abc", 3).unwrap();
            assert!(reader.advance().unwrap());
            assert_eq!(live_handles(), 1);
        }
        assert_eq!(live_handles(), 0);

        // dropped after exhaustion
        {
            let mut reader = Signed::with_capacity("abc", 3).unwrap();
            while reader.advance().unwrap() {}
        }
        assert_eq!(live_handles(), 0);

        // dropped after a failure
        {
            let mut reader = Bytes::with_capacity("fault-after-2", 3).unwrap();
            assert!(reader.advance().unwrap());
            assert!(reader.advance().is_err());
        }
        assert_eq!(live_handles(), 0);
    }

    #[test_log::test]
    fn copy_to_writes_remaining_chunks() {
        let mut reader = Bytes::with_capacity("abc", 3).unwrap();
        assert!(reader.advance().unwrap());

        let mut out = vec![];
        let written = reader.copy_to(&mut out).unwrap();
        assert_eq!(written, 7);
        assert_eq!(out, b"DEFGHIJ");
        assert!(reader.is_exhausted());
    }

    #[test_log::test]
    fn copy_to_surfaces_faults() {
        let mut reader = Bytes::with_capacity("fault-after-5", 4).unwrap();
        let mut out = vec![];
        assert!(matches!(
            reader.copy_to(&mut out),
            Err(Error::Decompression { .. })
        ));
        assert_eq!(out, b"ABCDE");
    }
}

use std::{
    fs::File,
    io::{self, BufReader},
};

use zstd::stream::read::Decoder;

use super::{Codec, Format, StreamHandle};

/// Zstandard. Stops after the first frame.
pub struct Zstd;

impl Codec for Zstd {
    const FORMAT: Format = Format::Zstd;
    type Decoder = Decoder<'static, BufReader<File>>;

    fn decoder(input: BufReader<File>) -> io::Result<Self::Decoder> {
        Ok(Decoder::with_buffer(input)?.single_frame())
    }
}

/// A handle on an open `.zst` file.
pub type ZstdHandle = StreamHandle<Zstd>;

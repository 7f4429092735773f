use std::{
    fs::File,
    io::{self, BufReader},
};

use bzip2::bufread::BzDecoder;

use super::{Codec, Format, StreamHandle};

/// bzip2, single stream.
pub struct Bzip2;

impl Codec for Bzip2 {
    const FORMAT: Format = Format::Bzip2;
    type Decoder = BzDecoder<BufReader<File>>;

    fn decoder(input: BufReader<File>) -> io::Result<Self::Decoder> {
        Ok(BzDecoder::new(input))
    }
}

/// A handle on an open `.bz2` file.
pub type Bzip2Handle = StreamHandle<Bzip2>;

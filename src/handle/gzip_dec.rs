use std::{
    fs::File,
    io::{self, BufReader},
};

use flate2::bufread::GzDecoder;

use super::{Codec, Format, StreamHandle};

/// gzip, decoded by flate2. Only the first member of the file is read.
pub struct Gzip;

impl Codec for Gzip {
    const FORMAT: Format = Format::Gzip;
    type Decoder = GzDecoder<BufReader<File>>;

    fn decoder(input: BufReader<File>) -> io::Result<Self::Decoder> {
        Ok(GzDecoder::new(input))
    }
}

/// A handle on an open `.gz` file.
pub type GzipHandle = StreamHandle<Gzip>;

use chunkz::{handle::AnyHandle, Handle, StreamingDecompressReader, DEFAULT_BUFFER_CAPACITY};
use clap::Parser;
use humansize::{format_size, BINARY};

use std::{
    io::{self, BufWriter},
    path::PathBuf,
    time::Instant,
};

/// Decompress a gzip, bzip2 or zstd file to stdout.
#[derive(Parser)]
struct Cli {
    file: PathBuf,

    /// Size of each decompressed chunk, in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_size: usize,

    /// Print a summary to stderr when done
    #[arg(long)]
    stats: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = do_main(cli) {
        eprintln!("zcat: {e}");
        std::process::exit(1);
    }
}

fn do_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut reader =
        StreamingDecompressReader::<AnyHandle>::with_capacity(&cli.file, cli.buffer_size)?;
    let format = reader.handle().format();

    let stdout = io::stdout().lock();
    let written = reader.copy_to(BufWriter::new(stdout))?;

    if cli.stats {
        let compressed = std::fs::metadata(&cli.file)?.len();
        eprintln!(
            "{}: {} {} -> {} in {:?}",
            cli.file.display(),
            format,
            format_size(compressed, BINARY),
            format_size(written, BINARY),
            start.elapsed()
        );
    }
    Ok(())
}

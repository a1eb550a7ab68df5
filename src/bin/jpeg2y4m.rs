use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;

use jpeg2y4m::{
    Interlacing, ProductionEngine, Ratio, RunParams, SourceResolver, Y4mSink, probe_first_source,
};

/// Pipe a sequence of JPEG images to stdout as a YUV4MPEG2 stream, ready for
/// direct encoding (e.g. `jpeg2y4m -f 25 -I p -j 'in_%06d.jpg' | mpeg2enc ...`).
/// When no pattern is given, filenames are read from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "jpeg2y4m", version)]
struct Cli {
    /// printf-style frame name pattern, e.g. "in_%06d.jpg".
    #[arg(short = 'j', long = "pattern")]
    pattern: Option<String>,

    /// Starting frame number.
    #[arg(short = 'b', long = "begin", default_value_t = 0)]
    begin: u32,

    /// Number of frames to produce (all available input when omitted).
    #[arg(short = 'n', long = "frames")]
    frames: Option<u64>,

    /// Output frame rate: fps ("25", "29.97") or an exact ratio ("30000:1001").
    #[arg(short = 'f', long = "fps")]
    fps: Ratio,

    /// Output sample aspect ratio.
    #[arg(short = 'A', long = "aspect", default_value = "1:1")]
    aspect: Ratio,

    /// Interlacing mode: p (progressive), t (top-field-first), b (bottom-field-first).
    #[arg(short = 'I', long = "interlace")]
    interlace: Interlacing,

    /// Field layout for interlaced sources: 0 = two separate field images
    /// per file, 1 = interleaved fields in one image.
    #[arg(short = 'L', long = "interleave", value_parser = clap::value_parser!(u8).range(0..=1))]
    interleave: Option<u8>,

    /// Number of passes over the source sequence (-1 = loop forever).
    #[arg(short = 'l', long = "loops", default_value_t = 1, allow_hyphen_values = true)]
    loops: i64,

    /// Rescale color values from full range to studio range (16-235/16-240).
    #[arg(short = 'R', long = "rescale", value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 1)]
    rescale: u8,

    /// Verbosity: 0 = warnings only, 1 = info, 2 = debug.
    #[arg(short = 'v', long = "verbose", value_parser = clap::value_parser!(u8).range(0..=2), default_value_t = 1)]
    verbose: u8,

    /// Write the stream to a file instead of stdout.
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loops = match cli.loops {
        -1 => None,
        n if n >= 1 => Some(u32::try_from(n).context("loop count out of range")?),
        _ => anyhow::bail!("loop count must be >= 1, or -1 to loop forever"),
    };

    let mut params = RunParams {
        pattern: cli.pattern,
        begin: cli.begin,
        num_frames: cli.frames,
        frame_rate: cli.fps,
        aspect_ratio: cli.aspect,
        interlacing: cli.interlace,
        interleaved: cli.interleave.map(|v| v == 1),
        loops,
        rescale: cli.rescale == 1,
        ..RunParams::default()
    };

    let mut resolver = match &params.pattern {
        Some(pattern) => SourceResolver::from_pattern(pattern.clone(), params.begin),
        None => {
            info!("reading JPEG filenames from stdin");
            SourceResolver::from_list(Box::new(io::stdin().lock()))
        }
    };

    probe_first_source(&mut params, &mut resolver)?;

    match cli.out {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating output file '{}'", path.display()))?;
            produce(&params, resolver, BufWriter::new(file))?;
        }
        None => {
            produce(&params, resolver, BufWriter::new(io::stdout().lock()))?;
        }
    }
    Ok(())
}

fn produce<W: Write>(
    params: &RunParams,
    resolver: SourceResolver,
    out: W,
) -> anyhow::Result<()> {
    let mut sink = Y4mSink::new(out);
    let engine = ProductionEngine::new(params, resolver, &mut sink)?;
    engine.run()?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

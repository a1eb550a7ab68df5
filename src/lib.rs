//! jpeg2y4m turns an ordered sequence of JPEG still images into a single
//! continuous YUV4MPEG2 elementary stream, ready to pipe into a video encoder.
//!
//! # Pipeline overview
//!
//! 1. **Probe**: the first source image fixes frame geometry and color model
//!    for the whole run ([`probe_first_source`]).
//! 2. **Resolve**: [`SourceResolver`] yields the next source path, either by
//!    formatting a numbered pattern or by consuming a newline-delimited list.
//! 3. **Decode**: compressed bytes become planar 4:2:0 Y/U/V data in a single
//!    reused [`FrameBuffer`], with interlace-aware field recombination.
//! 4. **Rescale** (optional): full-range samples map into studio range.
//! 5. **Emit**: a [`FrameSink`] serializes one header record and one frame
//!    record per produced frame.
//!
//! The engine is single-threaded and fully sequential; the frame buffer and
//! the compressed-bytes staging buffer are owned exclusively by the run and
//! mutated in place each iteration.

#![forbid(unsafe_code)]

mod decode;
mod encode;
mod engine;
mod foundation;
mod frame;
mod probe;
mod rescale;
mod source;

pub use decode::{FrameDecoder, decode_frame};
pub use encode::{FrameSink, InMemorySink, StreamHeader, Y4mSink};
pub use engine::{ProductionEngine, ProductionStats};
pub use foundation::error::{StreamError, StreamResult};
pub use foundation::params::{ColorModel, Interlacing, Ratio, RunParams};
pub use frame::FrameBuffer;
pub use probe::probe_first_source;
pub use rescale::rescale_to_studio;
pub use source::{FrameBytes, SourceResolver, format_pattern};

use tracing::{debug, info, warn};

use crate::decode::FrameDecoder;
use crate::encode::{FrameSink, StreamHeader};
use crate::foundation::error::StreamResult;
use crate::foundation::params::RunParams;
use crate::frame::FrameBuffer;
use crate::rescale::rescale_to_studio;
use crate::source::{FrameBytes, SourceResolver};

/// Aggregated production counters for one engine run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProductionStats {
    /// Frame records handed to the sink.
    pub frames_written: u64,
    /// Frames produced from freshly decoded bytes.
    pub frames_decoded: u64,
    /// Frames that reused the previous decode because the source path
    /// repeated (the two-field case).
    pub frames_reused: u64,
    /// Frames re-emitted unchanged because the source was unavailable.
    pub frames_frozen: u64,
    /// Completed passes over the source sequence.
    pub loops_completed: u32,
}

/// The orchestrating loop: resolve, read, decode, rescale, emit.
///
/// Owns the single [`FrameBuffer`] for the run and mutates it in place each
/// iteration; the sink sees the buffer after every step. Fully sequential,
/// single control flow.
pub struct ProductionEngine<'a> {
    params: &'a RunParams,
    resolver: SourceResolver,
    sink: &'a mut dyn FrameSink,
    decoder: FrameDecoder,
    buffer: FrameBuffer,
    decoded_any: bool,
}

impl<'a> ProductionEngine<'a> {
    /// Validates the parameters and sizes the run's buffers. `params` must
    /// already carry probed geometry.
    pub fn new(
        params: &'a RunParams,
        mut resolver: SourceResolver,
        sink: &'a mut dyn FrameSink,
    ) -> StreamResult<Self> {
        params.validate()?;
        // A JPEG frame never exceeds its uncompressed planar size plus
        // header slack.
        let limit = (params.width as usize) * (params.height as usize) * 3 + 64 * 1024;
        resolver.set_staging_limit(limit);
        Ok(Self {
            params,
            resolver,
            sink,
            decoder: FrameDecoder::new(params),
            buffer: FrameBuffer::new(params.width, params.height),
            decoded_any: false,
        })
    }

    /// Produce the whole stream: one header record, then one frame record
    /// per iteration until the loop-count and frame-count policies say stop.
    pub fn run(mut self) -> StreamResult<ProductionStats> {
        let mut stats = ProductionStats::default();

        info!(
            loops = ?self.params.loops,
            frames = ?self.params.num_frames,
            begin = self.params.begin,
            "generating YUV4MPEG2 stream"
        );
        self.sink.begin(&StreamHeader::from_params(self.params))?;

        let begin = u64::from(self.params.begin);
        let end = self.params.num_frames.map(|n| begin.saturating_add(n));
        let mut loops_left = self.params.loops;

        'run: loop {
            let mut frame = begin;
            while end.is_none_or(|e| frame < e) {
                match self.resolver.next_frame(frame)? {
                    FrameBytes::Bytes(bytes) if !bytes.is_empty() => {
                        self.decoder.decode_frame(bytes, self.params, &mut self.buffer)?;
                        if self.params.rescale {
                            debug!("rescaling color values");
                            rescale_to_studio(&mut self.buffer);
                        }
                        self.decoded_any = true;
                        stats.frames_decoded += 1;
                    }
                    FrameBytes::Reused if end.is_some() => {
                        debug!("frame {frame} reuses the previous decode");
                        stats.frames_reused += 1;
                    }
                    _ => {
                        // Unavailable, empty, or a repeat with no frame
                        // budget left to fill.
                        if end.is_none() {
                            info!("no more frames, stopping");
                            break 'run;
                        }
                        if self.decoded_any {
                            info!("source for frame {frame} unavailable, rewriting latest frame");
                        } else {
                            warn!("no frame decoded yet, emitting a black frame");
                        }
                        stats.frames_frozen += 1;
                    }
                }
                self.sink.write_frame(&self.buffer)?;
                stats.frames_written += 1;
                frame += 1;
            }

            stats.loops_completed += 1;
            match loops_left.as_mut() {
                Some(left) => {
                    *left -= 1;
                    if *left == 0 {
                        break;
                    }
                }
                None => {} // loop forever
            }
        }

        self.sink.finish()?;
        info!(
            frames = stats.frames_written,
            decoded = stats.frames_decoded,
            frozen = stats.frames_frozen,
            "stream complete"
        );
        Ok(stats)
    }
}

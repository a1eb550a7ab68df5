use std::io::Write;

use crate::foundation::error::{StreamError, StreamResult};
use crate::foundation::params::{Interlacing, Ratio, RunParams};
use crate::frame::FrameBuffer;

/// Stream-level metadata, written exactly once before any frame record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamHeader {
    pub width: u32,
    pub height: u32,
    pub interlacing: Interlacing,
    pub frame_rate: Ratio,
    pub aspect_ratio: Ratio,
}

impl StreamHeader {
    pub fn from_params(params: &RunParams) -> Self {
        Self {
            width: params.width,
            height: params.height,
            interlacing: params.interlacing,
            frame_rate: params.frame_rate,
            aspect_ratio: params.aspect_ratio,
        }
    }
}

/// Sink contract for consuming produced frames in stream order.
///
/// `begin` is called exactly once before any frame; `write_frame` receives
/// frames in production order; `finish` flushes whatever the sink buffers.
pub trait FrameSink {
    fn begin(&mut self, header: &StreamHeader) -> StreamResult<()>;
    fn write_frame(&mut self, frame: &FrameBuffer) -> StreamResult<()>;
    fn finish(&mut self) -> StreamResult<()>;
}

/// Serializes the stream as YUV4MPEG2 to any byte sink (stdout, a file, a
/// pipe into an encoder).
pub struct Y4mSink<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> Y4mSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }
}

impl<W: Write> FrameSink for Y4mSink<W> {
    fn begin(&mut self, header: &StreamHeader) -> StreamResult<()> {
        if self.header_written {
            return Err(StreamError::sink("stream header already written"));
        }
        writeln!(
            self.out,
            "YUV4MPEG2 W{} H{} F{} I{} A{} C420jpeg",
            header.width,
            header.height,
            header.frame_rate,
            header.interlacing.code(),
            header.aspect_ratio,
        )
        .map_err(|e| StreamError::sink(format!("writing stream header: {e}")))?;
        self.header_written = true;
        Ok(())
    }

    fn write_frame(&mut self, frame: &FrameBuffer) -> StreamResult<()> {
        if !self.header_written {
            return Err(StreamError::sink("frame written before stream header"));
        }
        let write = |out: &mut W, bytes: &[u8]| {
            out.write_all(bytes)
                .map_err(|e| StreamError::sink(format!("writing frame record: {e}")))
        };
        write(&mut self.out, b"FRAME\n")?;
        write(&mut self.out, &frame.y)?;
        write(&mut self.out, &frame.u)?;
        write(&mut self.out, &frame.v)
    }

    fn finish(&mut self) -> StreamResult<()> {
        self.out
            .flush()
            .map_err(|e| StreamError::sink(format!("flushing output: {e}")))
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    header: Option<StreamHeader>,
    frames: Vec<FrameBuffer>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The header captured by `begin`, if any.
    pub fn header(&self) -> Option<StreamHeader> {
        self.header
    }

    /// Borrow the captured frames, in production order.
    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, header: &StreamHeader) -> StreamResult<()> {
        if self.header.is_some() {
            return Err(StreamError::sink("stream header already written"));
        }
        self.header = Some(*header);
        Ok(())
    }

    fn write_frame(&mut self, frame: &FrameBuffer) -> StreamResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> StreamResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_176x144() -> StreamHeader {
        StreamHeader {
            width: 176,
            height: 144,
            interlacing: Interlacing::Progressive,
            frame_rate: Ratio { num: 25, den: 1 },
            aspect_ratio: Ratio::SQUARE,
        }
    }

    #[test]
    fn header_serializes_to_canonical_y4m() {
        let mut out = Vec::new();
        let mut sink = Y4mSink::new(&mut out);
        sink.begin(&header_176x144()).unwrap();
        assert_eq!(out, b"YUV4MPEG2 W176 H144 F25:1 Ip A1:1 C420jpeg\n");
    }

    #[test]
    fn interlaced_header_carries_field_order_and_rate() {
        let mut out = Vec::new();
        let mut sink = Y4mSink::new(&mut out);
        sink.begin(&StreamHeader {
            interlacing: Interlacing::TopFirst,
            frame_rate: Ratio {
                num: 30000,
                den: 1001,
            },
            ..header_176x144()
        })
        .unwrap();
        assert_eq!(out, b"YUV4MPEG2 W176 H144 F30000:1001 It A1:1 C420jpeg\n");
    }

    #[test]
    fn frame_record_is_marker_plus_planes() {
        let mut out = Vec::new();
        let mut sink = Y4mSink::new(&mut out);
        sink.begin(&header_176x144()).unwrap();
        let header_len = sink.out.len();

        let frame = FrameBuffer::new(176, 144);
        sink.write_frame(&frame).unwrap();
        let record = &out[header_len..];
        assert_eq!(record.len(), 6 + 176 * 144 + 2 * (88 * 72));
        assert_eq!(&record[..6], b"FRAME\n");
    }

    #[test]
    fn frame_before_header_is_rejected() {
        let mut out = Vec::new();
        let mut sink = Y4mSink::new(&mut out);
        let frame = FrameBuffer::new(16, 16);
        assert!(sink.write_frame(&frame).is_err());
    }

    #[test]
    fn double_header_is_rejected() {
        let mut out = Vec::new();
        let mut sink = Y4mSink::new(&mut out);
        sink.begin(&header_176x144()).unwrap();
        assert!(sink.begin(&header_176x144()).is_err());
    }

    #[test]
    fn in_memory_sink_captures_stream_order() {
        let mut sink = InMemorySink::new();
        sink.begin(&header_176x144()).unwrap();
        sink.write_frame(&FrameBuffer::new(176, 144)).unwrap();
        sink.write_frame(&FrameBuffer::new(176, 144)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.header().unwrap().width, 176);
        assert_eq!(sink.frames().len(), 2);
    }
}

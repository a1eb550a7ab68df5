mod sink;

pub use sink::{FrameSink, InMemorySink, StreamHeader, Y4mSink};

mod resolver;

pub use resolver::{FrameBytes, SourceResolver, format_pattern};

/// A planar 4:2:0 frame: one full-resolution luma plane and two chroma planes
/// at half resolution in both dimensions.
///
/// Allocated once per run and written in place by the decode and rescale
/// steps; the engine never reallocates it in steady state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Luma plane, `width * height` bytes.
    pub y: Vec<u8>,
    /// Cb plane, `(width / 2) * (height / 2)` bytes.
    pub u: Vec<u8>,
    /// Cr plane, `(width / 2) * (height / 2)` bytes.
    pub v: Vec<u8>,
}

impl FrameBuffer {
    /// Create a black frame (zero luma, neutral chroma).
    pub fn new(width: u32, height: u32) -> Self {
        let luma = (width as usize) * (height as usize);
        let chroma = (width as usize / 2) * (height as usize / 2);
        Self {
            width,
            height,
            y: vec![0; luma],
            u: vec![128; chroma],
            v: vec![128; chroma],
        }
    }

    pub fn chroma_width(&self) -> u32 {
        self.width / 2
    }

    pub fn chroma_height(&self) -> u32 {
        self.height / 2
    }
}

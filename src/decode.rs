use image::DynamicImage;
use tracing::debug;

use crate::foundation::error::{StreamError, StreamResult};
use crate::foundation::params::{ColorModel, Interlacing, RunParams};
use crate::frame::FrameBuffer;

/// Decodes compressed JPEG bytes into the run's frame buffer.
///
/// Dispatch covers the full grayscale/color by progressive/top-first/
/// bottom-first matrix. Progressive frames and interleaved-field frames are
/// a single image at the full frame geometry; non-interleaved interlaced
/// frames carry two field images that are woven into alternating frame rows.
///
/// Owns the per-field scratch buffers so that steady-state decoding does not
/// reallocate.
pub struct FrameDecoder {
    first_field: FrameBuffer,
    second_field: FrameBuffer,
}

impl FrameDecoder {
    /// Size the scratch buffers for a run. `params` must carry probed
    /// geometry.
    pub fn new(params: &RunParams) -> Self {
        let (w, h) = if params.split_fields() {
            (params.width, params.height / 2)
        } else {
            (0, 0)
        };
        Self {
            first_field: FrameBuffer::new(w, h),
            second_field: FrameBuffer::new(w, h),
        }
    }

    /// Decode one frame's worth of compressed bytes into `frame`.
    ///
    /// Any malformed input or geometry mismatch is a fatal decode error: a
    /// corrupt frame cannot be skipped without desynchronizing frame timing.
    pub fn decode_frame(
        &mut self,
        bytes: &[u8],
        params: &RunParams,
        frame: &mut FrameBuffer,
    ) -> StreamResult<()> {
        if frame.width != params.width || frame.height != params.height {
            return Err(StreamError::decode(format!(
                "frame buffer is {}x{}, expected {}x{}",
                frame.width, frame.height, params.width, params.height
            )));
        }
        if params.split_fields() {
            self.decode_field_pair(bytes, params, frame)
        } else {
            let img = load_jpeg(bytes)?;
            fill_planes(&img, params.color_model, frame)
        }
    }

    /// Decode a non-interleaved interlaced frame: two field images woven
    /// into alternating rows of the full-height frame.
    fn decode_field_pair(
        &mut self,
        bytes: &[u8],
        params: &RunParams,
        frame: &mut FrameBuffer,
    ) -> StreamResult<()> {
        let field_height = frame.height / 2;

        match second_field_offset(bytes) {
            Some(split) => {
                debug!("two concatenated field images, boundary at byte {split}");
                let img = load_jpeg(&bytes[..split])?;
                fill_planes(&img, params.color_model, &mut self.first_field)?;
                let img = load_jpeg(&bytes[split..])?;
                fill_planes(&img, params.color_model, &mut self.second_field)?;
            }
            None => {
                // Single image carrying both fields stacked vertically.
                let img = load_jpeg(bytes)?;
                if img.height() != frame.height {
                    return Err(StreamError::decode(format!(
                        "interlaced source is {}x{}, expected two {}x{} fields",
                        img.width(),
                        img.height(),
                        frame.width,
                        field_height
                    )));
                }
                let top = img.crop_imm(0, 0, frame.width, field_height);
                let bottom = img.crop_imm(0, field_height, frame.width, field_height);
                fill_planes(&top, params.color_model, &mut self.first_field)?;
                fill_planes(&bottom, params.color_model, &mut self.second_field)?;
            }
        }

        weave_fields(&self.first_field, &self.second_field, params.interlacing, frame)
    }
}

/// One-shot decode of a single frame, for callers without a run-long
/// [`FrameDecoder`].
pub fn decode_frame(
    bytes: &[u8],
    params: &RunParams,
    frame: &mut FrameBuffer,
) -> StreamResult<()> {
    FrameDecoder::new(params).decode_frame(bytes, params, frame)
}

fn load_jpeg(bytes: &[u8]) -> StreamResult<DynamicImage> {
    image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .map_err(|e| StreamError::decode(format!("JPEG decode failed: {e}")))
}

/// Convert a decoded image into the planar 4:2:0 layout of `dst`.
///
/// The image dimensions must match `dst` exactly. Color sources go through a
/// full-range BT.601 RGB conversion with a 2x2 box filter for chroma;
/// grayscale sources fill the luma plane and leave chroma neutral.
fn fill_planes(
    img: &DynamicImage,
    color_model: ColorModel,
    dst: &mut FrameBuffer,
) -> StreamResult<()> {
    let (w, h) = (img.width(), img.height());
    if w != dst.width || h != dst.height {
        return Err(StreamError::decode(format!(
            "source image is {w}x{h}, expected {}x{}",
            dst.width, dst.height
        )));
    }
    match color_model {
        ColorModel::Grayscale => {
            let gray = img.to_luma8();
            dst.y.copy_from_slice(gray.as_raw());
            dst.u.fill(128);
            dst.v.fill(128);
        }
        ColorModel::YCbCr => {
            let rgb = img.to_rgb8();
            rgb_to_yuv420(
                rgb.as_raw(),
                w as usize,
                h as usize,
                &mut dst.y,
                &mut dst.u,
                &mut dst.v,
            );
        }
    }
    Ok(())
}

/// Full-range BT.601 RGB to planar 4:2:0 YCbCr.
fn rgb_to_yuv420(rgb: &[u8], width: usize, height: usize, y: &mut [u8], u: &mut [u8], v: &mut [u8]) {
    for (luma, px) in y.iter_mut().zip(rgb.chunks_exact(3)) {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        *luma = (0.299 * r + 0.587 * g + 0.114 * b)
            .round()
            .clamp(0.0, 255.0) as u8;
    }

    let cw = width / 2;
    for cy in 0..height / 2 {
        for cx in 0..cw {
            let (mut r, mut g, mut b) = (0.0f32, 0.0f32, 0.0f32);
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let i = ((cy * 2 + dy) * width + cx * 2 + dx) * 3;
                r += rgb[i] as f32;
                g += rgb[i + 1] as f32;
                b += rgb[i + 2] as f32;
            }
            (r, g, b) = (r / 4.0, g / 4.0, b / 4.0);
            u[cy * cw + cx] = (128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b)
                .round()
                .clamp(0.0, 255.0) as u8;
            v[cy * cw + cx] = (128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
}

/// Byte offset of the second JPEG image in a two-field buffer, if present.
///
/// Fields are stored back to back, so the boundary sits right after the
/// first image's EOI marker. The first image is walked segment by segment
/// rather than scanned for a raw SOI byte pattern: metadata segments (EXIF
/// thumbnails in particular) legitimately contain embedded SOI markers, and
/// splitting on one of those would truncate the first image. Entropy-coded
/// data after each SOS is skipped up to the next real marker (0xFF followed
/// by neither a stuffing zero nor a restart code). A buffer that does not
/// parse as a complete marker stream yields `None` and takes the
/// stacked-image path.
fn second_field_offset(bytes: &[u8]) -> Option<usize> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    loop {
        // Fill bytes before a marker.
        while bytes.get(pos) == Some(&0xFF) && bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&0xFF) {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        pos += 2;
        match marker {
            // EOI of the first image.
            0xD9 => break,
            // Standalone markers carry no length field.
            0x01 | 0xD0..=0xD7 => {}
            0xDA => {
                pos += segment_length(bytes, pos)?;
                while pos + 1 < bytes.len() {
                    if bytes[pos] == 0xFF
                        && bytes[pos + 1] != 0x00
                        && !(0xD0..=0xD7).contains(&bytes[pos + 1])
                    {
                        break;
                    }
                    pos += 1;
                }
            }
            _ => pos += segment_length(bytes, pos)?,
        }
    }
    (bytes[pos..].starts_with(&[0xFF, 0xD8])).then_some(pos)
}

/// Big-endian segment length at `pos`, counting its own two bytes.
fn segment_length(bytes: &[u8], pos: usize) -> Option<usize> {
    let hi = usize::from(*bytes.get(pos)?);
    let lo = usize::from(*bytes.get(pos + 1)?);
    let len = (hi << 8) | lo;
    (len >= 2).then_some(len)
}

/// Interleave two decoded fields into the frame's alternating scan lines.
///
/// `first` and `second` are in file order; with top-field-first the first
/// field lands on the even rows, with bottom-field-first on the odd rows.
fn weave_fields(
    first: &FrameBuffer,
    second: &FrameBuffer,
    order: Interlacing,
    dst: &mut FrameBuffer,
) -> StreamResult<()> {
    let (even, odd) = match order {
        Interlacing::TopFirst => (first, second),
        Interlacing::BottomFirst => (second, first),
        Interlacing::Progressive => {
            return Err(StreamError::decode(
                "cannot weave fields for a progressive stream",
            ));
        }
    };

    let w = dst.width as usize;
    let field_rows = (dst.height / 2) as usize;
    for row in 0..field_rows {
        dst.y[(2 * row) * w..(2 * row + 1) * w]
            .copy_from_slice(&even.y[row * w..(row + 1) * w]);
        dst.y[(2 * row + 1) * w..(2 * row + 2) * w]
            .copy_from_slice(&odd.y[row * w..(row + 1) * w]);
    }

    let cw = dst.chroma_width() as usize;
    let chroma_field_rows = (dst.chroma_height() / 2) as usize;
    for (dst_plane, even_plane, odd_plane) in
        [(&mut dst.u, &even.u, &odd.u), (&mut dst.v, &even.v, &odd.v)]
    {
        for row in 0..chroma_field_rows {
            dst_plane[(2 * row) * cw..(2 * row + 1) * cw]
                .copy_from_slice(&even_plane[row * cw..(row + 1) * cw]);
            dst_plane[(2 * row + 1) * cw..(2 * row + 2) * cw]
                .copy_from_slice(&odd_plane[row * cw..(row + 1) * cw]);
        }
    }
    Ok(())
}

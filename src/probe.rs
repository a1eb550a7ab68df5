use std::fs::File;
use std::io::BufReader;

use anyhow::Context as _;
use image::ImageDecoder as _;
use tracing::{debug, info};

use crate::foundation::error::{StreamError, StreamResult};
use crate::foundation::params::{ColorModel, Interlacing, RunParams};
use crate::source::SourceResolver;

/// Inspect the first source image and fix the stream geometry for the run.
///
/// Only the JPEG header is decoded. Populates `width`, `height` and
/// `color_model` on `params`; for interlaced sources stored as two separate
/// field images per file, the logical frame height is double the probed
/// height. Any failure here is a fatal configuration error: the run must not
/// produce output.
pub fn probe_first_source(
    params: &mut RunParams,
    resolver: &mut SourceResolver,
) -> StreamResult<()> {
    let path = resolver.resolve_first()?;
    debug!("analyzing '{path}' for stream parameters");

    let file = File::open(&path)
        .with_context(|| format!("opening first source image '{path}'"))?;
    let decoder = image::codecs::jpeg::JpegDecoder::new(BufReader::new(file))
        .with_context(|| format!("reading JPEG header of '{path}'"))?;

    let (width, height) = decoder.dimensions();
    params.color_model = match decoder.color_type() {
        image::ColorType::Rgb8 => {
            info!("YCbCr colorspace detected");
            ColorModel::YCbCr
        }
        image::ColorType::L8 => {
            info!("grayscale colorspace detected");
            ColorModel::Grayscale
        }
        other => {
            return Err(StreamError::config(format!(
                "unsupported colorspace {other:?} in '{path}' (need YCbCr or grayscale)"
            )));
        }
    };

    info!("image dimensions are {width}x{height}");
    if !width.is_multiple_of(16) {
        return Err(StreamError::config(format!(
            "image width {width} is not a multiple of 16, rescale the image"
        )));
    }
    if !height.is_multiple_of(16) {
        return Err(StreamError::config(format!(
            "image height {height} is not a multiple of 16, rescale the image"
        )));
    }
    params.width = width;
    params.height = height;

    if params.interlacing != Interlacing::Progressive && params.interleaved.is_none() {
        return Err(StreamError::config(
            "interlaced input requires an interleave mode",
        ));
    }
    if params.split_fields() {
        params.height *= 2;
        info!("non-interleaved fields, frame height doubled");
    }
    info!("frame size: {}x{}", params.width, params.height);
    Ok(())
}

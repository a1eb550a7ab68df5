use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{StreamError, StreamResult};

/// An exact positive rational, used for frame rates and pixel aspect ratios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ratio {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Ratio {
    /// Square pixels (1:1), the default sample aspect ratio.
    pub const SQUARE: Ratio = Ratio { num: 1, den: 1 };

    pub fn new(num: u32, den: u32) -> StreamResult<Self> {
        if num == 0 {
            return Err(StreamError::config("ratio numerator must be > 0"));
        }
        if den == 0 {
            return Err(StreamError::config("ratio denominator must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Map a decimal frame rate onto an exact rational.
    ///
    /// The NTSC rates (23.976, 29.97, 59.94) conform to their 1001-denominator
    /// forms; anything else is taken as exact to millihertz precision.
    pub fn from_fps(fps: f64) -> StreamResult<Self> {
        const NTSC: [Ratio; 3] = [
            Ratio { num: 24000, den: 1001 },
            Ratio { num: 30000, den: 1001 },
            Ratio { num: 60000, den: 1001 },
        ];
        if !fps.is_finite() || fps <= 0.0 {
            return Err(StreamError::config(format!("invalid frame rate {fps}")));
        }
        for r in NTSC {
            if (fps - r.as_f64()).abs() < 0.005 {
                return Ok(r);
            }
        }
        let num = (fps * 1000.0).round() as u32;
        let g = gcd(num, 1000);
        Ratio::new(num / g, 1000 / g)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

impl FromStr for Ratio {
    type Err = StreamError;

    /// Accepts `N:D`, `N/D`, plain integers, and decimal frame rates.
    fn from_str(s: &str) -> StreamResult<Self> {
        let s = s.trim();
        if let Some((n, d)) = s.split_once(|c: char| c == ':' || c == '/') {
            let num = n
                .parse()
                .map_err(|_| StreamError::config(format!("invalid ratio '{s}'")))?;
            let den = d
                .parse()
                .map_err(|_| StreamError::config(format!("invalid ratio '{s}'")))?;
            return Ratio::new(num, den);
        }
        if let Ok(n) = s.parse::<u32>() {
            return Ratio::new(n, 1);
        }
        let fps: f64 = s
            .parse()
            .map_err(|_| StreamError::config(format!("invalid ratio '{s}'")))?;
        Ratio::from_fps(fps)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Interlacing mode of the output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Interlacing {
    Progressive,
    TopFirst,
    BottomFirst,
}

impl Interlacing {
    /// The single-character code used in the YUV4MPEG2 header `I` tag.
    pub fn code(self) -> char {
        match self {
            Self::Progressive => 'p',
            Self::TopFirst => 't',
            Self::BottomFirst => 'b',
        }
    }
}

impl FromStr for Interlacing {
    type Err = StreamError;

    fn from_str(s: &str) -> StreamResult<Self> {
        match s {
            "p" | "progressive" => Ok(Self::Progressive),
            "t" | "top-first" => Ok(Self::TopFirst),
            "b" | "bottom-first" => Ok(Self::BottomFirst),
            other => Err(StreamError::config(format!(
                "interlacing mode must be p, t, or b (got '{other}')"
            ))),
        }
    }
}

/// Source color model, fixed by the geometry probe for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorModel {
    YCbCr,
    Grayscale,
}

/// Complete configuration of a production run.
///
/// Constructed once (by the CLI layer or a test), geometry filled in by
/// [`probe_first_source`](crate::probe_first_source), then passed by reference
/// into the engine and never mutated again.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunParams {
    /// printf-style source name pattern; filenames come from a list feed
    /// when absent.
    pub pattern: Option<String>,
    /// Absolute frame number of the first source image.
    pub begin: u32,
    /// Number of frames to produce; `None` means "all available input".
    pub num_frames: Option<u64>,
    pub frame_rate: Ratio,
    pub aspect_ratio: Ratio,
    pub interlacing: Interlacing,
    /// For interlaced sources: `true` when both fields share one image,
    /// `false` when each file carries two separate field images. Must be set
    /// before production begins whenever `interlacing` is not progressive.
    pub interleaved: Option<bool>,
    /// Outer loop count over the source sequence; `None` loops forever.
    pub loops: Option<u32>,
    /// Rescale full-range sample values into studio range after decode.
    pub rescale: bool,
    /// Frame width in pixels, a multiple of 16. Populated by the probe.
    pub width: u32,
    /// Frame height in pixels, a multiple of 16. Populated by the probe;
    /// doubled for non-interleaved interlaced sources.
    pub height: u32,
    pub color_model: ColorModel,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            pattern: None,
            begin: 0,
            num_frames: None,
            frame_rate: Ratio { num: 25, den: 1 },
            aspect_ratio: Ratio::SQUARE,
            interlacing: Interlacing::Progressive,
            interleaved: None,
            loops: Some(1),
            rescale: true,
            width: 0,
            height: 0,
            color_model: ColorModel::YCbCr,
        }
    }
}

impl RunParams {
    /// Check the invariants that must hold before frame production starts.
    pub fn validate(&self) -> StreamResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::config(
                "frame geometry is unset (probe the first source image first)",
            ));
        }
        if !self.width.is_multiple_of(16) {
            return Err(StreamError::config(format!(
                "frame width {} is not a multiple of 16",
                self.width
            )));
        }
        if !self.height.is_multiple_of(16) {
            return Err(StreamError::config(format!(
                "frame height {} is not a multiple of 16",
                self.height
            )));
        }
        if self.interlacing != Interlacing::Progressive && self.interleaved.is_none() {
            return Err(StreamError::config(
                "interlaced input requires an interleave mode",
            ));
        }
        if self.loops == Some(0) {
            return Err(StreamError::config("loop count must be >= 1 or infinite"));
        }
        Ok(())
    }

    /// Frames stored as two separate field images per file.
    pub fn split_fields(&self) -> bool {
        self.interlacing != Interlacing::Progressive && self.interleaved == Some(false)
    }
}

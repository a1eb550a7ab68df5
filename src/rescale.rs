use crate::frame::FrameBuffer;

/// Map full-range sample values into studio range, in place.
///
/// Luma [0,255] lands in [16,235]; both chroma planes land in [16,240]. The
/// transform is linear with truncation, the behavior downstream MPEG encoders
/// expect. Applied only to freshly decoded frames; re-running it on an
/// already-rescaled buffer would compound the compression.
pub fn rescale_to_studio(frame: &mut FrameBuffer) {
    for s in &mut frame.y {
        *s = (u32::from(*s) * (235 - 16) / 255 + 16) as u8;
    }
    for plane in [&mut frame.u, &mut frame.v] {
        for s in plane {
            *s = (u32::from(*s) * (240 - 16) / 255 + 16) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_map_to_studio_range() {
        let mut frame = FrameBuffer::new(16, 16);
        frame.y.fill(0);
        frame.u.fill(0);
        frame.v.fill(255);
        rescale_to_studio(&mut frame);
        assert!(frame.y.iter().all(|&s| s == 16));
        assert!(frame.u.iter().all(|&s| s == 16));
        assert!(frame.v.iter().all(|&s| s == 240));

        let mut frame = FrameBuffer::new(16, 16);
        frame.y.fill(255);
        rescale_to_studio(&mut frame);
        assert!(frame.y.iter().all(|&s| s == 235));
    }

    #[test]
    fn rescale_is_monotonic_over_luma() {
        let mut frame = FrameBuffer::new(16, 16);
        for (i, s) in frame.y.iter_mut().enumerate() {
            *s = (i % 256) as u8;
        }
        rescale_to_studio(&mut frame);
        for w in frame.y[..256].windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}

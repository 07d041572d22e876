//! Thumbnail generation is an OS/codec integration detail outside this
//! exercise's scope (§1); this module only specifies the seam and a
//! deterministic default so the dedupe engine (§4.2) has something to
//! hash in tests and in hosts that haven't wired up a real decoder.

use scrybe_config::ThumbSize;

use crate::signal::FrameBuffer;

/// Produces a downscaled thumbnail buffer from a captured frame (§4.2
/// step 2). Real hosts plug in an actual image decoder/resizer here;
/// this crate only needs the output to be a deterministic function of
/// the frame contents and the target size.
pub trait Thumbnailer: Send + Sync {
    fn thumbnail(&self, frame: &FrameBuffer, size: ThumbSize) -> Vec<u8>;
}

/// Deterministic placeholder thumbnailer: evenly samples the source
/// byte buffer down to `width * height` samples. Not a real image
/// resize — hosts with a decoder in their stack should supply their
/// own `Thumbnailer`. What matters here is that identical frames
/// produce identical thumbnails and differing frames (almost always)
/// produce differing ones, which is all the dedupe engine needs.
pub struct NaiveDownsampleThumbnailer;

impl Thumbnailer for NaiveDownsampleThumbnailer {
    fn thumbnail(&self, frame: &FrameBuffer, size: ThumbSize) -> Vec<u8> {
        let (w, h) = size.dimensions();
        let target_len = (w as usize) * (h as usize);
        if frame.bytes.is_empty() {
            return vec![0u8; target_len];
        }
        let mut out = Vec::with_capacity(target_len);
        let stride = frame.bytes.len() as f64 / target_len as f64;
        for i in 0..target_len {
            let idx = ((i as f64 * stride) as usize).min(frame.bytes.len() - 1);
            out.push(frame.bytes[idx]);
        }
        out
    }
}

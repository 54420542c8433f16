use image::RgbaImage;
use tracing::warn;

use super::{DisposalMethod, Frame};

/// What is visibly on screen between two frames.
///
/// Owned by the compositing loop and threaded through it by value.
#[derive(Clone, Debug)]
pub struct CompositeCanvas {
    pixels: RgbaImage,
}

impl CompositeCanvas {
    /// A fully transparent canvas.
    pub fn new(width: u32, height: u32) -> CompositeCanvas {
        CompositeCanvas {
            pixels: RgbaImage::new(width, height),
        }
    }

    /// Apply the disposal of the frame that was displayed last.
    ///
    /// Only `RestoreToBackground` changes the canvas; `RestoreToPrevious`
    /// keeps it as is.
    pub fn dispose(mut self, previous: DisposalMethod) -> CompositeCanvas {
        if previous == DisposalMethod::RestoreToBackground {
            self.pixels.fill(0);
        }
        self
    }

    /// Alpha-blend `frame` over the canvas at its offset, clipped to the
    /// canvas bounds.
    pub fn draw(mut self, frame: &Frame) -> CompositeCanvas {
        let (canvas_width, canvas_height) = self.dimensions();
        let right = frame.left.saturating_add(frame.width);
        let bottom = frame.top.saturating_add(frame.height);
        if right > canvas_width || bottom > canvas_height {
            warn!(
                left = frame.left,
                top = frame.top,
                width = frame.width,
                height = frame.height,
                "frame exceeds canvas, clipping"
            );
        }

        let rgba = frame.to_rgba();
        let stride = frame.width as usize * 4;
        for y in frame.top..bottom.min(canvas_height) {
            let row = (y - frame.top) as usize * stride;
            for x in frame.left..right.min(canvas_width) {
                let offset = row + (x - frame.left) as usize * 4;
                let Some(src) = rgba.get(offset..offset + 4) else {
                    continue;
                };
                let dst = self.pixels.get_pixel_mut(x, y);
                dst.0 = source_over([src[0], src[1], src[2], src[3]], dst.0);
            }
        }
        self
    }

    /// Copy of the current visible content.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Porter-Duff source-over on straight-alpha RGBA8.
fn source_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    match src[3] {
        255 => return src,
        0 => return dst,
        _ => {}
    }
    let src_a = src[3] as u32;
    let dst_a = dst[3] as u32 * (255 - src_a) / 255;
    let out_a = src_a + dst_a;
    if out_a == 0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for channel in 0..3 {
        let value =
            (src[channel] as u32 * src_a + dst[channel] as u32 * dst_a + out_a / 2) / out_a;
        out[channel] = value.min(255) as u8;
    }
    out[3] = out_a as u8;
    out
}

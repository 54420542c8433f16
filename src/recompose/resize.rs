use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{Error, Result};

/// Output dimensions, validated against the GIF 16-bit limit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TargetSize {
    width: u16,
    height: u16,
}

impl TargetSize {
    pub fn new(width: i64, height: i64) -> Result<TargetSize> {
        match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(TargetSize {
                width: w,
                height: h,
            }),
            _ => Err(Error::InvalidTargetSize { width, height }),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }
}

/// Resampling filters. Only area-weighted / windowed-sinc class filters are
/// offered.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ResizeFilter {
    #[default]
    Lanczos3,
    CatmullRom,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
        }
    }
}

/// Resize a composited frame. Resampling happens on premultiplied alpha so
/// the color of transparent pixels never bleeds into visible edges.
pub fn resize_frame(frame: &RgbaImage, size: TargetSize, filter: ResizeFilter) -> RgbaImage {
    let mut premul = frame.clone();
    premultiply_in_place(&mut premul);
    let mut resized = imageops::resize(
        &premul,
        u32::from(size.width),
        u32::from(size.height),
        filter.into(),
    );
    unpremultiply_in_place(&mut resized);
    resized
}

fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        match a {
            0 => {
                px[0] = 0;
                px[1] = 0;
                px[2] = 0;
            }
            255 => {}
            _ => {
                for channel in px[..3].iter_mut() {
                    *channel = ((*channel as u32 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

use image::RgbaImage;
use imagequant::RGBA;

use crate::error::{Error, Result};

/// GIF transparency is one bit; alpha below this becomes fully transparent.
const ALPHA_THRESHOLD: u8 = 128;

/// imagequant settings shared by every frame of one transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuantizeSettings {
    /// `1-10`. Faster speeds give lower quality. Default `4`.
    pub speed: u8,
    /// `0-100`, must not exceed `quality_max`.
    pub quality_min: u8,
    /// `0-100`, must not be below `quality_min`.
    pub quality_max: u8,
    /// `0.0-1.0`, `1.0` gives smooth dithered output.
    pub dithering_level: f32,
}

impl Default for QuantizeSettings {
    fn default() -> Self {
        QuantizeSettings {
            speed: 4,
            quality_min: 0,
            quality_max: 100,
            dithering_level: 1.0,
        }
    }
}

/// A frame reduced to an indexed palette.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantized {
    pub indices: Vec<u8>,
    /// Packed RGB triples.
    pub palette: Vec<u8>,
    pub transparent: Option<u8>,
}

/// Adaptive-palette quantizer for one output frame.
pub struct Gifquant {
    attr: imagequant::Attributes,
    dithering_level: f32,
    /// Palette slot every output frame must keep for transparency.
    reserved: Option<u8>,
}

impl Gifquant {
    pub fn new(settings: &QuantizeSettings, reserved: Option<u8>) -> Result<Gifquant> {
        let mut attr = imagequant::new();
        attr.set_speed(settings.speed as i32)
            .map_err(|err| Error::quantize(None, err))?;
        attr.set_quality(settings.quality_min, settings.quality_max)
            .map_err(|err| Error::quantize(None, err))?;
        // One slot stays free so the reserved index never holds a real color
        let max_colors = if reserved.is_some() { 255 } else { 256 };
        attr.set_max_colors(max_colors)
            .map_err(|err| Error::quantize(None, err))?;
        Ok(Gifquant {
            attr,
            dithering_level: settings.dithering_level,
            reserved,
        })
    }

    /// Quantize a resized frame. `frame` is the index used in error reports.
    pub fn quantize(&self, image: &RgbaImage, frame: usize) -> Result<Quantized> {
        let (width, height) = image.dimensions();
        let pixels: Vec<RGBA> = rgb::FromSlice::as_rgba(image.as_raw().as_slice())
            .iter()
            .map(|px| {
                if px.a < ALPHA_THRESHOLD {
                    RGBA::new(0, 0, 0, 0)
                } else {
                    RGBA::new(px.r, px.g, px.b, 255)
                }
            })
            .collect();

        let mut img = self
            .attr
            .new_image(pixels, width as usize, height as usize, 0.0)
            .map_err(|err| Error::quantize(Some(frame), err))?;
        let mut res = self
            .attr
            .quantize(&mut img)
            .map_err(|err| Error::quantize(Some(frame), err))?;
        res.set_dithering_level(self.dithering_level)
            .map_err(|err| Error::quantize(Some(frame), err))?;
        let (palette, indices) = res
            .remapped(&mut img)
            .map_err(|err| Error::quantize(Some(frame), err))?;

        Ok(arrange_palette(palette, indices, self.reserved))
    }
}

/// Pick the transparency index and pack the palette to RGB.
///
/// With a reserved slot the fully transparent entry is moved there, and a
/// real color occupying the slot is relocated to the end of the palette.
fn arrange_palette(
    mut palette: Vec<RGBA>,
    mut indices: Vec<u8>,
    reserved: Option<u8>,
) -> Quantized {
    let clear = palette.iter().position(|c| c.a == 0);

    let transparent = match reserved {
        None => clear.map(|i| i as u8),
        Some(slot) => {
            let slot_idx = slot as usize;
            let in_use = slot_idx < palette.len();
            if !in_use {
                palette.resize(slot_idx + 1, RGBA::new(0, 0, 0, 0));
            }
            match clear {
                Some(from) if from != slot_idx => {
                    palette.swap(from, slot_idx);
                    let (a, b) = (from as u8, slot);
                    for index in indices.iter_mut() {
                        if *index == a {
                            *index = b;
                        } else if *index == b {
                            *index = a;
                        }
                    }
                }
                Some(_) => {}
                None if in_use => {
                    let moved = palette.len() as u8;
                    palette.push(palette[slot_idx]);
                    palette[slot_idx] = RGBA::new(0, 0, 0, 0);
                    for index in indices.iter_mut() {
                        if *index == slot {
                            *index = moved;
                        }
                    }
                }
                None => {}
            }
            Some(slot)
        }
    };

    let mut rgb_palette: Vec<u8> = Vec::with_capacity(palette.len() * 3);
    for c in palette.iter() {
        rgb_palette.push(c.r);
        rgb_palette.push(c.g);
        rgb_palette.push(c.b);
    }

    Quantized {
        indices,
        palette: rgb_palette,
        transparent,
    }
}

#![allow(dead_code)]

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Palette shared by the synthesized sources: black, red, blue, green.
pub const PALETTE: [u8; 12] = [0, 0, 0, 255, 0, 0, 0, 0, 255, 0, 255, 0];
pub const BLACK: u8 = 0;
pub const RED: u8 = 1;
pub const BLUE: u8 = 2;
pub const GREEN: u8 = 3;

/// Fresh per-test scratch directory.
pub fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "gif-recompose-it-{}-{name}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub struct SourceFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub color: u8,
    pub delay: u16,
    pub dispose: gif::DisposalMethod,
    pub transparent: Option<u8>,
}

impl SourceFrame {
    pub fn full(
        width: u16,
        height: u16,
        color: u8,
        delay: u16,
        dispose: gif::DisposalMethod,
    ) -> Self {
        SourceFrame {
            left: 0,
            top: 0,
            width,
            height,
            color,
            delay,
            dispose,
            transparent: None,
        }
    }

    pub fn at(mut self, left: u16, top: u16, width: u16, height: u16) -> Self {
        self.left = left;
        self.top = top;
        self.width = width;
        self.height = height;
        self
    }

    pub fn transparent(mut self, index: u8) -> Self {
        self.transparent = Some(index);
        self
    }
}

/// Write a GIF with the global [`PALETTE`] to `path`.
pub fn write_source(path: &Path, width: u16, height: u16, frames: &[SourceFrame]) {
    let mut bytes = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut bytes, width, height, &PALETTE).unwrap();
        encoder.set_repeat(gif::Repeat::Finite(1)).unwrap();
        for source in frames {
            let frame = gif::Frame {
                left: source.left,
                top: source.top,
                width: source.width,
                height: source.height,
                delay: source.delay,
                dispose: source.dispose,
                transparent: source.transparent,
                buffer: Cow::Owned(vec![
                    source.color;
                    source.width as usize * source.height as usize
                ]),
                ..gif::Frame::default()
            };
            encoder.write_frame(&frame).unwrap();
        }
    }
    fs::write(path, bytes).unwrap();
}

/// Decode `path` and return every frame as full-canvas RGBA.
pub fn output_frames(path: &Path) -> Vec<(gif::Frame<'static>, Vec<u8>)> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let file = fs::File::open(path).unwrap();
    let mut decoder = options.read_info(file).unwrap();
    let mut frames = vec![];
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        frames.push((frame.clone(), frame.buffer.to_vec()));
    }
    frames
}

/// RGBA value of pixel (x, y) in a buffer `width` pixels wide.
pub fn pixel(rgba: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
    let i = (y * width + x) * 4;
    [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
}

/// Channel-wise comparison with a small quantizer tolerance.
pub fn close(actual: [u8; 4], expected: [u8; 4]) -> bool {
    actual
        .iter()
        .zip(expected.iter())
        .all(|(a, e)| a.abs_diff(*e) <= 3)
}

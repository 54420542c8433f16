use std::fs;
use std::path::Path;

use gif::{ColorOutput, DecodeOptions, Repeat};
use tracing::debug;

use super::{AnimatedImage, DisposalMethod, Frame, FramePixels};
use crate::error::{Error, Result};

/// Read and decode every frame of the GIF at `path`.
pub fn read_animation(path: &Path) -> Result<AnimatedImage> {
    let bytes = fs::read(path).map_err(|err| Error::io(path, err))?;
    decode_animation(path, &bytes)
}

/// Decode a GIF held in memory. `path` only labels errors.
pub fn decode_animation(path: &Path, bytes: &[u8]) -> Result<AnimatedImage> {
    let mut options = DecodeOptions::new();
    // Raw indices keep the per-frame region and palette intact
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = match options.read_info(bytes) {
        Ok(decoder) => decoder,
        // The decoder wants at least one image before it reports the header
        Err(_) if scan_blocks(bytes).is_some_and(|images| images.is_empty()) => {
            return Err(Error::EmptyAnimation {
                path: path.to_path_buf(),
            })
        }
        Err(err) => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                frame: None,
                reason: "cannot read gif header".to_string(),
                source: Some(err),
            })
        }
    };
    // Per image, whether a graphic control extension precedes it
    let controlled = scan_blocks(bytes).unwrap_or_default();

    let width = u32::from(decoder.width());
    let height = u32::from(decoder.height());
    let global_palette = decoder.global_palette().map(<[u8]>::to_vec);
    let loop_count = match decoder.repeat() {
        Repeat::Infinite => None,
        Repeat::Finite(count) => Some(count),
    };

    let mut frames: Vec<Frame> = vec![];
    loop {
        let index = frames.len();
        let frame = match decoder.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::UnsupportedFormat {
                    path: path.to_path_buf(),
                    frame: Some(index),
                    reason: "corrupt frame data".to_string(),
                    source: Some(err),
                })
            }
        };

        let palette = match (&frame.palette, &global_palette) {
            (Some(local), _) => local.clone(),
            (None, Some(global)) => global.clone(),
            (None, None) => {
                return Err(Error::unsupported(
                    path,
                    Some(index),
                    "frame has no color palette",
                ))
            }
        };

        // Without a control block the decoder reports Keep; the disposal is
        // actually unspecified
        let disposal = match controlled.get(index) {
            Some(false) => DisposalMethod::None,
            _ => frame.dispose.into(),
        };

        debug!(
            frame = index,
            left = frame.left,
            top = frame.top,
            width = frame.width,
            height = frame.height,
            delay = frame.delay,
            dispose = ?disposal,
            "decoded frame"
        );

        frames.push(Frame::new(
            u32::from(frame.left),
            u32::from(frame.top),
            u32::from(frame.width),
            u32::from(frame.height),
            frame.delay,
            disposal,
            FramePixels::Indexed {
                indices: frame.buffer.to_vec(),
                palette,
                transparent: frame.transparent,
            },
        ));
    }

    let first = frames.first().ok_or_else(|| Error::EmptyAnimation {
        path: path.to_path_buf(),
    })?;
    let transparent = first.transparent();
    let disposal = match first.disposal {
        DisposalMethod::None => DisposalMethod::RestoreToBackground,
        other => other,
    };

    Ok(AnimatedImage {
        width,
        height,
        transparent,
        loop_count,
        disposal,
        frames,
    })
}

const TRAILER: u8 = 0x3B;
const EXTENSION: u8 = 0x21;
const IMAGE: u8 = 0x2C;
const GRAPHIC_CONTROL: u8 = 0xF9;

/// Walk the block structure without decoding pixels.
///
/// Returns one entry per image descriptor, `true` when a graphic control
/// extension came before it, or `None` if the stream is not a complete GIF.
fn scan_blocks(bytes: &[u8]) -> Option<Vec<bool>> {
    if bytes.len() < 13 || !(bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")) {
        return None;
    }
    let mut pos = 13 + color_table_len(bytes[10]);
    let mut images = vec![];
    let mut control = false;
    loop {
        match *bytes.get(pos)? {
            EXTENSION => {
                control |= *bytes.get(pos + 1)? == GRAPHIC_CONTROL;
                pos = skip_sub_blocks(bytes, pos + 2)?;
            }
            IMAGE => {
                let flags = *bytes.get(pos + 9)?;
                // Descriptor, local table, LZW minimum code size
                pos = skip_sub_blocks(bytes, pos + 10 + color_table_len(flags) + 1)?;
                images.push(control);
                control = false;
            }
            TRAILER => return Some(images),
            _ => return None,
        }
    }
}

fn color_table_len(flags: u8) -> usize {
    if flags & 0x80 == 0 {
        0
    } else {
        3 << ((flags & 0x07) + 1)
    }
}

fn skip_sub_blocks(bytes: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *bytes.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += len;
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    fn encode(frames: &[gif::Frame<'_>]) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder =
                gif::Encoder::new(&mut bytes, 4, 4, &[0, 0, 0, 255, 255, 255]).unwrap();
            encoder.set_repeat(Repeat::Finite(3)).unwrap();
            for frame in frames {
                encoder.write_frame(frame).unwrap();
            }
        }
        bytes
    }

    #[test]
    fn decodes_regions_timing_and_disposal() {
        let first = gif::Frame {
            width: 4,
            height: 4,
            delay: 7,
            dispose: gif::DisposalMethod::Keep,
            transparent: Some(0),
            buffer: Cow::Owned(vec![1; 16]),
            ..gif::Frame::default()
        };
        let second = gif::Frame {
            left: 1,
            top: 2,
            width: 2,
            height: 1,
            delay: 12,
            dispose: gif::DisposalMethod::Background,
            palette: Some(vec![10, 20, 30]),
            buffer: Cow::Owned(vec![0, 0]),
            ..gif::Frame::default()
        };
        let bytes = encode(&[first, second]);

        let image = decode_animation(Path::new("mem.gif"), &bytes).unwrap();
        assert_eq!((image.width, image.height), (4, 4));
        assert_eq!(image.frame_count(), 2);
        assert_eq!(image.loop_count, Some(3));
        assert_eq!(image.transparent, Some(0));
        assert_eq!(image.disposal, DisposalMethod::DoNotDispose);

        let second = &image.frames[1];
        assert_eq!(
            (second.left, second.top, second.width, second.height),
            (1, 2, 2, 1)
        );
        assert_eq!(second.duration, 12);
        assert_eq!(second.disposal, DisposalMethod::RestoreToBackground);
        assert_eq!(second.to_rgba(), vec![10, 20, 30, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn unspecified_first_disposal_defaults_to_background() {
        let frame = gif::Frame {
            width: 4,
            height: 4,
            dispose: gif::DisposalMethod::Any,
            buffer: Cow::Owned(vec![0; 16]),
            ..gif::Frame::default()
        };
        let image = decode_animation(Path::new("mem.gif"), &encode(&[frame])).unwrap();
        assert_eq!(image.frames[0].disposal, DisposalMethod::None);
        assert_eq!(image.disposal, DisposalMethod::RestoreToBackground);
    }

    #[test]
    fn rejects_non_gif_bytes() {
        let err = decode_animation(Path::new("x.png"), b"\x89PNG\r\n\x1a\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { frame: None, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_animation(Path::new("/nonexistent/dir/none.gif")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    /// 1x1 screen with a two-color table, optional extra blocks, trailer.
    fn raw_gif(body: &[u8]) -> Vec<u8> {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[1, 0, 1, 0, 0x80, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        bytes.extend_from_slice(body);
        bytes.push(TRAILER);
        bytes
    }

    /// Image descriptor for a 1x1 frame of index 0, with its LZW data.
    const ONE_PIXEL: [u8; 15] = [
        IMAGE, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0x02, 0x02, 0x44, 0x01, 0x00,
    ];

    #[test]
    fn frameless_stream_is_empty_animation() {
        let err = decode_animation(Path::new("empty.gif"), &raw_gif(&[])).unwrap_err();
        assert!(matches!(err, Error::EmptyAnimation { .. }), "{err}");

        // A loop extension alone still holds no frames
        let netscape = [
            EXTENSION, 0xFF, 11, b'N', b'E', b'T', b'S', b'C', b'A', b'P', b'E', b'2', b'.', b'0',
            3, 1, 0, 0, 0,
        ];
        let err = decode_animation(Path::new("empty.gif"), &raw_gif(&netscape)).unwrap_err();
        assert!(matches!(err, Error::EmptyAnimation { .. }), "{err}");
    }

    #[test]
    fn truncated_header_stays_unsupported() {
        let mut bytes = raw_gif(&[]);
        bytes.truncate(15);
        let err = decode_animation(Path::new("cut.gif"), &bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }), "{err}");
    }

    #[test]
    fn frame_without_control_block_has_unspecified_disposal() {
        let image = decode_animation(Path::new("bare.gif"), &raw_gif(&ONE_PIXEL)).unwrap();
        assert_eq!(image.frame_count(), 1);
        assert_eq!(image.frames[0].disposal, DisposalMethod::None);
        assert_eq!(image.frames[0].duration, 0);
        assert_eq!(image.disposal, DisposalMethod::RestoreToBackground);
    }

    #[test]
    fn scan_blocks_tracks_control_per_image() {
        let mut body = vec![EXTENSION, GRAPHIC_CONTROL, 4, 0x08, 5, 0, 0, 0];
        body.extend_from_slice(&ONE_PIXEL);
        body.extend_from_slice(&ONE_PIXEL);
        assert_eq!(scan_blocks(&raw_gif(&body)), Some(vec![true, false]));
        assert_eq!(scan_blocks(b"GIF89a"), None);
    }
}

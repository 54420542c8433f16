use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use gif::{Encoder, Repeat};
use tracing::info;

use super::atomic::write_atomic;
use super::{OutputFrame, TargetSize};
use crate::error::{Error, Result};

/// Encode `frames` as a loop-forever GIF and write it atomically to `dest`.
pub fn write_gif(dest: &Path, size: TargetSize, frames: &[OutputFrame]) -> Result<()> {
    write_atomic(dest, |writer| encode_into(writer, dest, size, frames))?;
    info!(path = %dest.display(), frames = frames.len(), "wrote gif");
    Ok(())
}

/// Stream the GIF into `writer`. `dest` only labels errors.
pub fn encode_into<W: Write>(
    writer: W,
    dest: &Path,
    size: TargetSize,
    frames: &[OutputFrame],
) -> Result<()> {
    let failure = |reason: &str, source: gif::EncodingError| Error::EncodeFailure {
        path: dest.to_path_buf(),
        reason: reason.to_string(),
        source: Some(source),
    };

    // Every frame carries a local palette, so no global table is written
    let mut encoder = Encoder::new(writer, size.width(), size.height(), &[])
        .map_err(|err| failure("cannot write header", err))?;
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|err| failure("cannot write loop extension", err))?;

    for (index, output) in frames.iter().enumerate() {
        let frame = gif::Frame {
            width: output.width,
            height: output.height,
            delay: output.duration,
            dispose: output.disposal.into(),
            transparent: output.transparent,
            palette: Some(output.palette.clone()),
            buffer: Cow::Borrowed(output.indices.as_slice()),
            ..gif::Frame::default()
        };
        encoder
            .write_frame(&frame)
            .map_err(|err| failure(format!("cannot write frame {index}").as_str(), err))?;
    }

    encoder
        .into_inner()
        .map_err(|err| failure("cannot write trailer", err.into()))?;
    Ok(())
}

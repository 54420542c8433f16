use std::io;
use std::path::PathBuf;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The source could not be decoded as an animated GIF.
    #[error("unsupported format in {}{}: {reason}", .path.display(), at_frame(.frame))]
    UnsupportedFormat {
        path: PathBuf,
        frame: Option<usize>,
        reason: String,
        #[source]
        source: Option<gif::DecodingError>,
    },

    /// The source decoded cleanly but contains no frames.
    #[error("{} contains no frames", .path.display())]
    EmptyAnimation { path: PathBuf },

    /// Width or height outside `1..=65535`.
    #[error("invalid target size {width}x{height}")]
    InvalidTargetSize { width: i64, height: i64 },

    #[error("failed to encode {}: {reason}", .path.display())]
    EncodeFailure {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<gif::EncodingError>,
    },

    /// Palette quantization rejected a frame or a quantizer setting.
    #[error("quantization failed{}: {source}", at_frame(.frame))]
    Quantize {
        frame: Option<usize>,
        #[source]
        source: imagequant::Error,
    },

    /// A worker thread exited before returning its frame.
    #[error("frame {frame} was lost by a worker thread")]
    WorkerLost { frame: usize },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn unsupported(
        path: impl Into<PathBuf>,
        frame: Option<usize>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            frame,
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn quantize(frame: Option<usize>, source: imagequant::Error) -> Self {
        Self::Quantize { frame, source }
    }
}

fn at_frame(frame: &Option<usize>) -> String {
    match frame {
        Some(index) => format!(" at frame {index}"),
        None => String::new(),
    }
}

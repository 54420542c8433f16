/// How the canvas is treated after a frame's display interval ends.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DisposalMethod {
    /// Unspecified; composites like `DoNotDispose`.
    #[default]
    None,
    /// Leave the frame on the canvas as background for the next one.
    DoNotDispose,
    /// Clear the canvas to transparent before the next frame is drawn.
    RestoreToBackground,
    /// Restore the canvas to its state before this frame. Treated as
    /// `DoNotDispose` when compositing.
    RestoreToPrevious,
}

impl DisposalMethod {
    /// Wire value of the GIF graphic control extension.
    pub fn value(self) -> u8 {
        match self {
            Self::None => 0,
            Self::DoNotDispose => 1,
            Self::RestoreToBackground => 2,
            Self::RestoreToPrevious => 3,
        }
    }
}

impl From<gif::DisposalMethod> for DisposalMethod {
    fn from(method: gif::DisposalMethod) -> Self {
        match method {
            gif::DisposalMethod::Any => Self::None,
            gif::DisposalMethod::Keep => Self::DoNotDispose,
            gif::DisposalMethod::Background => Self::RestoreToBackground,
            gif::DisposalMethod::Previous => Self::RestoreToPrevious,
        }
    }
}

impl From<DisposalMethod> for gif::DisposalMethod {
    fn from(method: DisposalMethod) -> Self {
        match method {
            DisposalMethod::None => gif::DisposalMethod::Any,
            DisposalMethod::DoNotDispose => gif::DisposalMethod::Keep,
            DisposalMethod::RestoreToBackground => gif::DisposalMethod::Background,
            DisposalMethod::RestoreToPrevious => gif::DisposalMethod::Previous,
        }
    }
}

/// Pixel storage of a decoded frame.
#[derive(Clone, Debug)]
pub enum FramePixels {
    /// One palette index per pixel.
    Indexed {
        indices: Vec<u8>,
        /// Packed RGB triples.
        palette: Vec<u8>,
        transparent: Option<u8>,
    },
    /// Straight-alpha RGBA, 4 bytes per pixel.
    Rgba(Vec<u8>),
}

/// One decoded step of an animation, positioned on the canvas.
#[derive(Clone, Debug)]
pub struct Frame {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Display time in hundredths of a second.
    pub duration: u16,
    pub disposal: DisposalMethod,
    pub pixels: FramePixels,
}

impl Frame {
    pub fn new(
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        duration: u16,
        disposal: DisposalMethod,
        pixels: FramePixels,
    ) -> Frame {
        Frame {
            left,
            top,
            width,
            height,
            duration,
            disposal,
            pixels,
        }
    }

    /// Transparency index of an indexed frame.
    pub fn transparent(&self) -> Option<u8> {
        match &self.pixels {
            FramePixels::Indexed { transparent, .. } => *transparent,
            FramePixels::Rgba(_) => None,
        }
    }

    /// Expand the frame region to straight-alpha RGBA.
    ///
    /// The transparency index becomes alpha 0; indices past the end of the
    /// palette render opaque black.
    pub fn to_rgba(&self) -> Vec<u8> {
        match &self.pixels {
            FramePixels::Rgba(data) => data.clone(),
            FramePixels::Indexed {
                indices,
                palette,
                transparent,
            } => {
                let mut rgba = Vec::with_capacity(indices.len() * 4);
                for &index in indices {
                    if Some(index) == *transparent {
                        rgba.extend_from_slice(&[0, 0, 0, 0]);
                        continue;
                    }
                    let offset = index as usize * 3;
                    match palette.get(offset..offset + 3) {
                        Some(rgb) => rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]),
                        None => rgba.extend_from_slice(&[0, 0, 0, 255]),
                    }
                }
                rgba
            }
        }
    }
}

/// A decoded animation plus its global metadata.
#[derive(Clone, Debug)]
pub struct AnimatedImage {
    pub width: u32,
    pub height: u32,
    /// Transparency index of the first frame, carried to every output frame.
    pub transparent: Option<u8>,
    /// Source loop count; `None` means loop forever.
    pub loop_count: Option<u16>,
    /// Disposal of the first frame, `RestoreToBackground` when unspecified.
    pub disposal: DisposalMethod,
    pub frames: Vec<Frame>,
}

impl AnimatedImage {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// A resized, palette-quantized frame covering the full output canvas.
#[derive(Clone, Debug)]
pub struct OutputFrame {
    pub width: u16,
    pub height: u16,
    pub indices: Vec<u8>,
    /// Packed RGB triples, at most 256 entries.
    pub palette: Vec<u8>,
    pub transparent: Option<u8>,
    pub duration: u16,
    pub disposal: DisposalMethod,
}

mod atomic;
mod batch;
mod canvas;
pub mod decode;
mod encode;
mod frame;
mod gifquant;
mod recompositor;
mod resize;

pub use atomic::write_atomic;
pub use batch::{resized_path, Batch, BatchReport, Work, RESIZED_SUFFIX};
pub use canvas::CompositeCanvas;
pub use encode::{encode_into, write_gif};
pub use frame::{AnimatedImage, DisposalMethod, Frame, FramePixels, OutputFrame};
pub use gifquant::{Gifquant, QuantizeSettings, Quantized};
pub use recompositor::{
    composite_frames, resize_gif, Composited, RecomposeOptions, Recompositor, Summary,
};
pub use resize::{resize_frame, ResizeFilter, TargetSize};

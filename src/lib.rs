//! Recompose animated GIFs: rebuild every frame's visible content from its
//! disposal history, resize it, re-quantize it to an adaptive palette and
//! write a new loop-forever GIF with the original timing and transparency.

pub mod error;
pub mod recompose;
mod thread;

pub use error::{Error, Result};
pub use recompose::{
    resize_gif, AnimatedImage, DisposalMethod, RecomposeOptions, Recompositor, ResizeFilter,
    Summary, TargetSize,
};

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::slice;
use std::sync::mpsc;
use std::thread::available_parallelism;

use image::RgbaImage;
use tracing::{debug, instrument};

use super::decode::read_animation;
use super::encode::write_gif;
use super::gifquant::{Gifquant, QuantizeSettings};
use super::resize::{resize_frame, ResizeFilter, TargetSize};
use super::{AnimatedImage, CompositeCanvas, DisposalMethod, Frame, OutputFrame};
use crate::error::{Error, Result};
use crate::thread::ThreadPool;

/// Everything that tunes one transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RecomposeOptions {
    pub size: TargetSize,
    pub filter: ResizeFilter,
    pub quantize: QuantizeSettings,
    /// Worker threads for resize + quantize; `1` runs inline.
    pub threads: usize,
}

impl RecomposeOptions {
    pub fn new(size: TargetSize) -> RecomposeOptions {
        RecomposeOptions {
            size,
            filter: ResizeFilter::default(),
            quantize: QuantizeSettings::default(),
            threads: available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_quantize(mut self, quantize: QuantizeSettings) -> Self {
        self.quantize = quantize;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }
}

/// Outcome of a successful transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub output: PathBuf,
    pub frames: usize,
    /// Source canvas size.
    pub source_size: (u32, u32),
    pub size: TargetSize,
}

/// Decode, recomposite, resize, re-quantize and re-encode one GIF.
#[derive(Debug, Clone)]
pub struct Recompositor {
    options: RecomposeOptions,
}

impl Recompositor {
    pub fn new(options: RecomposeOptions) -> Recompositor {
        Recompositor { options }
    }

    #[instrument(skip_all, fields(source = %source.display(), dest = %dest.display()))]
    pub fn run(&self, source: &Path, dest: &Path) -> Result<Summary> {
        let image = read_animation(source)?;
        debug!(
            width = image.width,
            height = image.height,
            frames = image.frame_count(),
            transparent = ?image.transparent,
            "decoded source"
        );
        let frames = self.recompose(&image)?;
        write_gif(dest, self.options.size, &frames)?;
        Ok(Summary {
            output: dest.to_path_buf(),
            frames: frames.len(),
            source_size: (image.width, image.height),
            size: self.options.size,
        })
    }

    /// Turn a decoded animation into self-contained output frames, in order.
    pub fn recompose(&self, image: &AnimatedImage) -> Result<Vec<OutputFrame>> {
        if image.frames.is_empty() {
            return Err(Error::EmptyAnimation {
                path: PathBuf::from("<memory>"),
            });
        }
        // Surfaces bad quantizer settings before any work is queued
        let quant = Gifquant::new(&self.options.quantize, image.transparent)?;

        let disposal = output_disposal(image);
        let jobs = composite_frames(image)
            .zip(&image.frames)
            .enumerate()
            .map(|(index, (canvas, frame))| FrameJob {
                index,
                canvas,
                duration: frame.duration,
                disposal,
            });

        let threads = self.options.threads.min(image.frame_count());
        if threads <= 1 {
            return jobs.map(|job| job.finish(&self.options, &quant)).collect();
        }
        self.recompose_parallel(jobs, image.frame_count(), threads, image.transparent)
    }

    /// Composites are produced lazily; at most `2 * threads` full-size
    /// canvases are alive at once.
    fn recompose_parallel(
        &self,
        jobs: impl Iterator<Item = FrameJob>,
        total: usize,
        threads: usize,
        reserved: Option<u8>,
    ) -> Result<Vec<OutputFrame>> {
        let pool = ThreadPool::new(threads);
        let in_flight_limit = threads * 2;
        debug!(workers = pool.size(), frames = total, "quantizing in parallel");
        let (result_sender, result_receiver) = mpsc::channel();
        let mut slots: Vec<Option<OutputFrame>> = (0..total).map(|_| None).collect();
        let mut in_flight = 0;

        for job in jobs {
            if in_flight == in_flight_limit {
                let (index, result) = result_receiver
                    .recv()
                    .map_err(|_| Error::WorkerLost { frame: job.index })?;
                slots[index] = Some(result?);
                in_flight -= 1;
            }
            let options = self.options;
            let result_sender = result_sender.clone();
            let index = job.index;
            pool.execute(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    Gifquant::new(&options.quantize, reserved)
                        .and_then(|quant| job.finish(&options, &quant))
                }))
                .unwrap_or(Err(Error::WorkerLost { frame: index }));
                let _ = result_sender.send((index, result));
            })
            .map_err(|_| Error::WorkerLost { frame: index })?;
            in_flight += 1;
        }
        drop(result_sender);

        for (index, result) in result_receiver {
            slots[index] = Some(result?);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(frame, slot)| slot.ok_or(Error::WorkerLost { frame }))
            .collect()
    }
}

/// One composited frame awaiting resize and quantization.
struct FrameJob {
    index: usize,
    canvas: RgbaImage,
    duration: u16,
    disposal: DisposalMethod,
}

impl FrameJob {
    fn finish(&self, options: &RecomposeOptions, quant: &Gifquant) -> Result<OutputFrame> {
        let resized = resize_frame(&self.canvas, options.size, options.filter);
        let quantized = quant.quantize(&resized, self.index)?;
        debug!(
            frame = self.index,
            colors = quantized.palette.len() / 3,
            transparent = ?quantized.transparent,
            "quantized frame"
        );
        Ok(OutputFrame {
            width: options.size.width(),
            height: options.size.height(),
            indices: quantized.indices,
            palette: quantized.palette,
            transparent: quantized.transparent,
            duration: self.duration,
            disposal: self.disposal,
        })
    }
}

/// Reconstruct the visible content of every frame, in source order.
pub fn composite_frames(image: &AnimatedImage) -> Composited<'_> {
    Composited {
        frames: image.frames.iter(),
        canvas: Some(CompositeCanvas::new(image.width, image.height)),
        previous: DisposalMethod::None,
    }
}

/// Iterator over composited frames, see [`composite_frames`].
pub struct Composited<'a> {
    frames: slice::Iter<'a, Frame>,
    canvas: Option<CompositeCanvas>,
    previous: DisposalMethod,
}

impl Iterator for Composited<'_> {
    type Item = RgbaImage;

    fn next(&mut self) -> Option<RgbaImage> {
        let frame = self.frames.next()?;
        let canvas = self.canvas.take()?.dispose(self.previous).draw(frame);
        let snapshot = canvas.snapshot();
        self.canvas = Some(canvas);
        self.previous = frame.disposal;
        Some(snapshot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.frames.size_hint()
    }
}

/// Output frames are full composites: each replaces the last outright,
/// unless the source's transparency has to carry across frames.
fn output_disposal(image: &AnimatedImage) -> DisposalMethod {
    match image.transparent {
        Some(_) => DisposalMethod::DoNotDispose,
        None => DisposalMethod::RestoreToBackground,
    }
}

/// Resize the GIF at `source` to `width` x `height` and write it to `dest`.
pub fn resize_gif(
    source: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    width: i64,
    height: i64,
) -> Result<Summary> {
    let size = TargetSize::new(width, height)?;
    Recompositor::new(RecomposeOptions::new(size)).run(source.as_ref(), dest.as_ref())
}

use clap::Parser;
use colored::Colorize;
use gif_recompose::recompose::decode::read_animation;
use gif_recompose::recompose::{resized_path, Batch, QuantizeSettings};
use gif_recompose::{RecomposeOptions, Recompositor, ResizeFilter, Result, TargetSize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Filter {
    Lanczos3,
    CatmullRom,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GIF file, or a directory whose GIFs are all recomposed
    path: PathBuf,

    #[arg(
        short = 'o',
        long,
        help = "Output file for a single input. Defaults to <stem>_resized.gif beside the input"
    )]
    output: Option<PathBuf>,

    #[arg(short = 'W', long, default_value_t = 600, allow_negative_numbers = true)]
    width: i64,

    #[arg(short = 'H', long, default_value_t = 400, allow_negative_numbers = true)]
    height: i64,

    #[arg(short = 'f', long, help = "Resampling filter, default lanczos3")]
    filter: Option<Filter>,

    #[arg(
        short = 's',
        long,
        help = "1-10, faster speeds give lower quality. Default 4"
    )]
    speed: Option<u8>,

    #[arg(
        short = 'n',
        long,
        help = "0-100, minimum palette quality, default 0, cannot exceed the maximum"
    )]
    quality_min: Option<u8>,

    #[arg(
        short = 'x',
        long,
        help = "0-100, maximum palette quality, default 100, cannot be below the minimum"
    )]
    quality_max: Option<u8>,

    #[arg(short = 'd', long, help = "0.0-1.0, 1.0 gives smooth dithering. Default 1.0")]
    dithering_level: Option<f32>,

    #[arg(
        short = 'j',
        long,
        help = "Worker threads for resize and quantize. Default: available parallelism"
    )]
    threads: Option<usize>,

    #[arg(long, help = "Print animation metadata and exit")]
    info: bool,

    #[arg(short = 'v', long, help = "Log every decoding and quantizing step")]
    verbose: bool,
}

/// Parse the command line and run it.
pub fn args_handle() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.info {
        return report(print_info(&args.path));
    }

    let recompositor = match build_recompositor(&args) {
        Ok(recompositor) => recompositor,
        Err(err) => return report(Err(err)),
    };

    if args.path.is_dir() {
        run_batch(&args.path, recompositor)
    } else {
        let output = args.output.clone().unwrap_or_else(|| resized_path(&args.path));
        report(run_single(&recompositor, &args.path, &output))
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn build_recompositor(args: &Args) -> Result<Recompositor> {
    let size = TargetSize::new(args.width, args.height)?;

    let defaults = QuantizeSettings::default();
    let quantize = QuantizeSettings {
        speed: args.speed.unwrap_or(defaults.speed),
        quality_min: args.quality_min.unwrap_or(defaults.quality_min),
        quality_max: args.quality_max.unwrap_or(defaults.quality_max),
        dithering_level: args.dithering_level.unwrap_or(defaults.dithering_level),
    };

    let filter = match args.filter {
        Some(Filter::CatmullRom) => ResizeFilter::CatmullRom,
        _ => ResizeFilter::Lanczos3,
    };

    let mut options = RecomposeOptions::new(size)
        .with_filter(filter)
        .with_quantize(quantize);
    if let Some(threads) = args.threads {
        options = options.with_threads(threads);
    }
    Ok(Recompositor::new(options))
}

fn run_single(recompositor: &Recompositor, source: &Path, output: &Path) -> Result<()> {
    let start = Instant::now();
    let summary = recompositor.run(source, output)?;
    println!(
        "{} {} ({}x{} -> {}x{}, {} frames) in {:.2}s",
        "Wrote".green().bold(),
        summary.output.display(),
        summary.source_size.0,
        summary.source_size.1,
        summary.size.width(),
        summary.size.height(),
        summary.frames,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_batch(root: &Path, recompositor: Recompositor) -> ExitCode {
    let start = Instant::now();
    let mut batch = Batch::new(root, recompositor);
    let total = match batch.generate_worklist() {
        Ok(worklist) => worklist.len(),
        Err(err) => return report(Err(err)),
    };
    if total == 0 {
        println!("{} no gif files under {}", "Nothing to do:".yellow(), root.display());
        return ExitCode::SUCCESS;
    }

    let batch_report = batch.run(|work, _| update_progress_bar(work.id + 1, total));
    println!();

    for (source, err) in &batch_report.failed {
        eprintln!("{} {}: {}", "Failed".red().bold(), source.display(), err);
    }
    println!("Total time: {:.2}s", start.elapsed().as_secs_f64());
    println!(
        "{} recomposed, {} failed",
        batch_report.done.len().to_string().green(),
        batch_report.failed.len().to_string().red()
    );

    if batch_report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn update_progress_bar(finished: usize, total: usize) {
    let perc = finished as f64 / total as f64;
    let lpad = (perc * 20.0).floor() as usize;
    print!(
        "\rProcessing gifs: {}{} {}%",
        "\u{25A0}".repeat(lpad),
        "-".repeat(20 - lpad),
        (perc * 100.0).trunc()
    );
    let _ = io::stdout().flush();
}

fn print_info(path: &Path) -> Result<()> {
    let image = read_animation(path)?;
    let loops = match image.loop_count {
        None => "forever".to_string(),
        Some(count) => count.to_string(),
    };
    let transparent = match image.transparent {
        None => "none".to_string(),
        Some(index) => index.to_string(),
    };
    println!("{}", path.display().to_string().bold());
    println!("  canvas:       {}x{}", image.width, image.height);
    println!("  frames:       {}", image.frame_count());
    println!("  loop:         {loops}");
    println!("  transparency: {transparent}");
    println!("  disposal:     {:?}", image.disposal);
    Ok(())
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

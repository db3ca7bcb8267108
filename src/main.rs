// Style transfer on an image or on the frames of an animation, using VGG-16
// weights taken from a trained SSD300 detector.
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ssd_style_transfer::nn::{Adam, ImageOptimizer, Sgd};
use ssd_style_transfer::overlay::Overlay;
use ssd_style_transfer::{
    BackboneConfig, Divergence, FrameRange, ImageJob, LossWeights, Precision, RunConfig,
    StyleTransfer, VideoJob,
};
use tch::Device;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: Common,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Opt {
    Adam,
    Sgd,
}

#[derive(Args, Debug)]
struct Common {
    /// The style image.
    #[arg(long)]
    style: PathBuf,

    /// SSD300 weights (.ot or .safetensors), random weights when unset.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Number of classes of the SSD300 detector.
    #[arg(long, default_value_t = 21)]
    n_classes: i64,

    /// Float precision of the extractor, 32 or 16.
    #[arg(long, default_value_t = 32)]
    float_type: u32,

    #[arg(long, default_value_t = 100)]
    epochs: usize,

    #[arg(long, value_enum, default_value_t = Opt::Adam)]
    optimizer: Opt,

    #[arg(long, default_value_t = 10.0)]
    learning_rate: f64,

    #[arg(long, default_value_t = 1.0)]
    style_weight: f64,

    #[arg(long, default_value_t = 1e-30)]
    content_weight: f64,

    /// Abort when the generated image stops being finite.
    #[arg(long)]
    fail_on_divergence: bool,

    /// Output resolution as WIDTHxHEIGHT, defaults to the input resolution.
    #[arg(long, value_parser = parse_resolution)]
    resize: Option<(u32, u32)>,

    /// Paste the content image on the bottom-left corner.
    #[arg(long)]
    add_content_img: bool,

    /// Paste the style image on the bottom-left corner.
    #[arg(long)]
    add_style_img: bool,

    #[arg(long, default_value_t = 2)]
    line_width: u32,

    /// Run on the first GPU when available.
    #[arg(long)]
    cuda: bool,

    /// Hide the progress bars.
    #[arg(long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Stylize a single image.
    Image {
        content: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Stylize the frames of a GIF, a video file or a directory of images into a GIF.
    Video {
        video: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 0)]
        start_idx: usize,
        #[arg(long)]
        end_idx: Option<usize>,
        #[arg(long, default_value_t = 1)]
        skip: usize,
        #[arg(long, default_value_t = 30)]
        fps: u32,
    },
}

fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    match s.split_once('x') {
        Some((w, h)) => Ok((w.parse()?, h.parse()?)),
        None => bail!("expected WIDTHxHEIGHT, got {s}"),
    }
}

pub fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let Cli { common, mode } = Cli::parse();

    let device = if common.cuda { Device::cuda_if_available() } else { Device::Cpu };
    let backbone = BackboneConfig {
        weights: common.weights.clone(),
        n_classes: common.n_classes,
        precision: Precision::try_from(common.float_type)?,
        device,
        ..Default::default()
    };
    let run = RunConfig {
        epochs: common.epochs,
        weights: LossWeights { style: common.style_weight, content: common.content_weight },
        divergence: if common.fail_on_divergence { Divergence::Fail } else { Divergence::Ignore },
        progress: !common.quiet,
    };
    let overlay = Overlay {
        add_content: common.add_content_img,
        add_style: common.add_style_img,
        line_width: common.line_width,
    };
    let mut opt: Box<dyn ImageOptimizer> = match common.optimizer {
        Opt::Adam => Box::new(Adam::new(common.learning_rate)),
        Opt::Sgd => Box::new(Sgd::new(common.learning_rate, 0.)),
    };

    let transfer = StyleTransfer::new(backbone, run)?;
    match mode {
        Mode::Image { content, output } => {
            let job =
                ImageJob { style: common.style, content, output, resize: common.resize, overlay };
            transfer.infer_on_image(&job, &mut opt)?;
        }
        Mode::Video { video, output, start_idx, end_idx, skip, fps } => {
            let job = VideoJob {
                style: common.style,
                video,
                output,
                range: FrameRange { start: start_idx, end: end_idx, skip },
                resize: common.resize,
                fps,
                overlay,
            };
            let frames = transfer.infer_on_video(&job, &mut opt)?;
            println!("wrote {frames} frames");
        }
    }
    Ok(())
}

//! Runs style transfer over a single image or over the frames of a video.
use std::path::PathBuf;

use image::RgbImage;
use indicatif::ProgressBar;
use tch::Tensor;
use tracing::{info, warn};

use crate::config::{BackboneConfig, RunConfig};
use crate::error::{Result, StyleError};
use crate::extractor::{FeatureExtractor, INPUT_SIZE};
use crate::nn::ImageOptimizer;
use crate::optimize::{StyleRun, Stylized};
use crate::overlay::{compose, Overlay};
use crate::vision::image::{
    image_to_tensor, open_frames, open_image, resize_nearest, resize_smooth, save_animation,
    save_image, tensor_to_image_scaled, FrameSource,
};

/// Selection of the frames to stylize, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    /// Frames up to and including this index are skipped.
    pub start: usize,
    /// Last frame index to process, the whole video when unset.
    pub end: Option<usize>,
    /// Only frames whose index is a multiple of `skip` are processed.
    pub skip: usize,
}

impl Default for FrameRange {
    fn default() -> Self {
        FrameRange { start: 0, end: None, skip: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    Skip,
    Take,
    Stop,
}

impl FrameRange {
    pub fn action(&self, index: usize) -> FrameAction {
        if index <= self.start {
            FrameAction::Skip
        } else if self.end.map_or(false, |end| index > end) {
            FrameAction::Stop
        } else if self.skip == 0 || index % self.skip != 0 {
            FrameAction::Skip
        } else {
            FrameAction::Take
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.skip == 0 {
            return Err(StyleError::Config("frame skip must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ImageJob {
    pub style: PathBuf,
    pub content: PathBuf,
    pub output: PathBuf,
    /// Output resolution, the content image resolution when unset.
    pub resize: Option<(u32, u32)>,
    pub overlay: Overlay,
}

#[derive(Debug, Clone)]
pub struct VideoJob {
    pub style: PathBuf,
    /// An animated GIF or a directory of frames.
    pub video: PathBuf,
    pub output: PathBuf,
    pub range: FrameRange,
    /// Output resolution, the first frame resolution when unset.
    pub resize: Option<(u32, u32)>,
    pub fps: u32,
    pub overlay: Overlay,
}

/// Loads a style image at the network input resolution, as a tensor and as
/// the stretched picture used for thumbnails.
fn style_input<T: AsRef<std::path::Path>>(path: T) -> Result<(Tensor, RgbImage)> {
    let style = open_image(path)?;
    let style = image_to_tensor(&resize_nearest(&style, INPUT_SIZE as u32, INPUT_SIZE as u32));
    let thumbnail = tensor_to_image_scaled(&style)?;
    Ok((style, thumbnail))
}

#[derive(Debug)]
pub struct StyleTransfer {
    extractor: FeatureExtractor,
    run: RunConfig,
}

impl StyleTransfer {
    /// Builds the backbone, transplants its weights and keeps the extractor.
    pub fn new(cfg: BackboneConfig, run: RunConfig) -> Result<StyleTransfer> {
        let extractor = FeatureExtractor::builder(cfg).build()?;
        Ok(StyleTransfer { extractor, run })
    }

    pub fn from_extractor(extractor: FeatureExtractor, run: RunConfig) -> StyleTransfer {
        StyleTransfer { extractor, run }
    }

    /// Optimizes a copy of `content` towards the style of `style`, both
    /// `(1, 300, 300, 3)` tensors.
    pub fn stylize<O: ImageOptimizer + ?Sized>(
        &self,
        style: &Tensor,
        content: &Tensor,
        opt: &mut O,
    ) -> Result<Stylized> {
        StyleRun::new(&self.extractor, style, content, self.run)?.run(opt)
    }

    /// Stylizes one frame and resizes the final snapshot to `out`.
    pub fn stylize_frame<O: ImageOptimizer + ?Sized>(
        &self,
        style: &Tensor,
        content: &RgbImage,
        out: (u32, u32),
        opt: &mut O,
    ) -> Result<RgbImage> {
        let input = resize_nearest(content, INPUT_SIZE as u32, INPUT_SIZE as u32);
        let stylized = self.stylize(style, &image_to_tensor(&input), opt)?;
        let last = stylized.last().ok_or_else(|| StyleError::NoFrames("run".to_string()))?;
        Ok(resize_smooth(&tensor_to_image_scaled(last)?, out.0, out.1))
    }

    /// Stylizes a single image and saves it to `job.output`.
    pub fn infer_on_image<O: ImageOptimizer + ?Sized>(
        &self,
        job: &ImageJob,
        opt: &mut O,
    ) -> Result<RgbImage> {
        let content = open_image(&job.content)?;
        let (style, style_img) = style_input(&job.style)?;
        let out = job.resize.unwrap_or_else(|| content.dimensions());
        info!(
            content = %job.content.display(),
            style = %job.style.display(),
            ?out,
            "stylizing image"
        );
        let mut result = self.stylize_frame(&style, &content, out, opt)?;
        compose(&mut result, &content, &style_img, content.width(), &job.overlay);
        save_image(&result, &job.output)?;
        Ok(result)
    }

    /// Stylizes the selected frames of `source`.
    ///
    /// Running out of frames before `job.range.end` ends the loop normally.
    pub fn infer_on_frames<S: FrameSource + ?Sized, O: ImageOptimizer + ?Sized>(
        &self,
        source: &mut S,
        job: &VideoJob,
        opt: &mut O,
    ) -> Result<Vec<RgbImage>> {
        job.range.validate()?;
        let (style, style_img) = style_input(&job.style)?;
        let pb = match (self.run.progress, job.range.end) {
            (false, _) => ProgressBar::hidden(),
            (true, Some(end)) => ProgressBar::new(end as u64),
            (true, None) => ProgressBar::new_spinner(),
        };
        let mut out = job.resize;
        let mut frames = vec![];
        let mut index = 0;
        while let Some(frame) = source.next_frame()? {
            index += 1;
            pb.inc(1);
            match job.range.action(index) {
                FrameAction::Skip => continue,
                FrameAction::Stop => break,
                FrameAction::Take => {}
            }
            let out = *out.get_or_insert_with(|| frame.dimensions());
            info!(index, "stylizing frame");
            let mut result = self.stylize_frame(&style, &frame, out, opt)?;
            compose(&mut result, &frame, &style_img, frame.width(), &job.overlay);
            frames.push(result);
        }
        pb.finish_and_clear();
        if let Some(end) = job.range.end {
            if index < end {
                warn!(frames = index, end, "video ended before the requested end frame");
            }
        }
        Ok(frames)
    }

    /// Stylizes the frames of `job.video` and encodes them as a GIF.
    ///
    /// Returns the number of frames written.
    pub fn infer_on_video<O: ImageOptimizer + ?Sized>(
        &self,
        job: &VideoJob,
        opt: &mut O,
    ) -> Result<usize> {
        let mut source = open_frames(&job.video)?;
        let frames = self.infer_on_frames(source.as_mut(), job, opt)?;
        save_animation(&frames, &job.output, job.fps)?;
        info!(frames = frames.len(), output = %job.output.display(), "animation saved");
        Ok(frames.len())
    }
}

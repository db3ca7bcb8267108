//! Image and frame I/O, and conversions between images and tensors.
//!
//! Image tensors use the `(1, height, width, 3)` layout with `f32` values in
//! `[0, 255]`.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Delay, DynamicImage, Frame, Frames, RgbImage};
use tch::{Device, Kind, Tensor};

use crate::error::{Result, StyleError};

/// Returns a tensor of shape `(1, height, width, 3)`.
pub fn image_to_tensor(image: &RgbImage) -> Tensor {
    let (w, h) = image.dimensions();
    Tensor::from_slice(image.as_raw()).view([1, h as i64, w as i64, 3]).to_kind(Kind::Float)
}

fn squeeze_image(tensor: &Tensor) -> Result<(Tensor, i64, i64)> {
    let tensor = match tensor.dim() {
        4 => tensor.squeeze_dim(0),
        3 => tensor.shallow_clone(),
        _ => return Err(StyleError::Shape(format!("not an image tensor {:?}", tensor.size()))),
    };
    let (h, w, c) = tensor.size3()?;
    if c != 3 {
        return Err(StyleError::Shape(format!("expected 3 channels, got {c}")));
    }
    Ok((tensor.detach().to_device(Device::Cpu).to_kind(Kind::Float), h, w))
}

fn pixels_to_image(pixels: &Tensor, h: i64, w: i64) -> Result<RgbImage> {
    let data = pixels.clamp(0.0, 255.0).to_kind(Kind::Uint8).contiguous().view([-1]);
    let buffer = Vec::<u8>::try_from(&data)?;
    RgbImage::from_raw(w as u32, h as u32, buffer)
        .ok_or_else(|| StyleError::Shape(format!("cannot build a {w}x{h} image")))
}

/// Expects a tensor of shape `(1, height, width, 3)` or `(height, width, 3)`.
///
/// Values are clamped to `[0, 255]` and truncated.
pub fn tensor_to_image(tensor: &Tensor) -> Result<RgbImage> {
    let (pixels, h, w) = squeeze_image(tensor)?;
    pixels_to_image(&pixels, h, w)
}

/// Like [`tensor_to_image`] but stretches the values first: the minimum maps
/// to 0 and the maximum to 255. A constant tensor becomes black.
///
/// This is how generated snapshots and the style thumbnail become pictures.
pub fn tensor_to_image_scaled(tensor: &Tensor) -> Result<RgbImage> {
    let (pixels, h, w) = squeeze_image(tensor)?;
    let pixels = &pixels - pixels.min();
    let max = f64::try_from(pixels.max())?;
    let pixels = if max != 0.0 { pixels / max } else { pixels };
    pixels_to_image(&(pixels * 255.0), h, w)
}

/// Loads an image from a file, dropping any alpha channel.
pub fn open_image<T: AsRef<Path>>(path: T) -> Result<RgbImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(StyleError::MissingFile(path.to_path_buf()));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// Nearest neighbour resize, used to produce the network input.
pub fn resize_nearest(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(image, width, height, FilterType::Nearest)
}

/// Smooth resize, used for output frames and thumbnails.
pub fn resize_smooth(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// Saves an image, the format is based on the filename suffix.
pub fn save_image<T: AsRef<Path>>(image: &RgbImage, path: T) -> Result<()> {
    image.save(path)?;
    Ok(())
}

/// Writes the frames as an infinitely looping GIF animation.
pub fn save_animation<T: AsRef<Path>>(frames: &[RgbImage], path: T, fps: u32) -> Result<()> {
    let path = path.as_ref();
    if frames.is_empty() {
        return Err(StyleError::NoFrames(path.display().to_string()));
    }
    if fps == 0 {
        return Err(StyleError::Config("fps must be positive".to_string()));
    }
    let delay = Delay::from_numer_denom_ms(1000, fps);
    let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames.iter().map(|image| {
        Frame::from_parts(DynamicImage::ImageRgb8(image.clone()).to_rgba8(), 0, 0, delay)
    }))?;
    Ok(())
}

/// A sequential source of video frames.
pub trait FrameSource {
    /// Returns the next frame, `None` once the media is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Frames of an animated GIF.
pub struct GifFrames {
    frames: Frames<'static>,
}

impl GifFrames {
    pub fn open<T: AsRef<Path>>(path: T) -> Result<GifFrames> {
        let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
        Ok(GifFrames { frames: decoder.into_frames() })
    }
}

impl FrameSource for GifFrames {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.next() {
            None => Ok(None),
            Some(frame) => Ok(Some(DynamicImage::ImageRgba8(frame?.into_buffer()).to_rgb8())),
        }
    }
}

/// The `.png`/`.jpg` files of a directory, visited recursively and read in
/// path order.
#[derive(Debug)]
pub struct FrameDir {
    files: std::vec::IntoIter<PathBuf>,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.contains(&e.to_ascii_lowercase().as_str()))
}

fn visit_dirs(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                visit_dirs(&path, files)?;
            } else if has_extension(&path, &["png", "jpg", "jpeg"]) {
                files.push(path);
            }
        }
    }
    Ok(())
}

impl FrameDir {
    pub fn open<T: AsRef<Path>>(dir: T) -> Result<FrameDir> {
        let mut files = vec![];
        visit_dirs(dir.as_ref(), &mut files)?;
        files.sort();
        Ok(FrameDir { files: files.into_iter() })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.len() == 0
    }
}

impl FrameSource for FrameDir {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        self.files.next().map(open_image).transpose()
    }
}

/// Frames of a video file decoded by OpenCV, converted from BGR to RGB.
#[cfg(feature = "opencv")]
pub struct VideoFrames {
    capture: opencv::videoio::VideoCapture,
}

#[cfg(feature = "opencv")]
impl VideoFrames {
    pub fn open<T: AsRef<Path>>(path: T) -> Result<VideoFrames> {
        use opencv::prelude::*;
        use opencv::videoio::{VideoCapture, CAP_ANY};

        let path = path.as_ref();
        let capture = VideoCapture::from_file(&path.to_string_lossy(), CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(StyleError::Config(format!("cannot open video {}", path.display())));
        }
        Ok(VideoFrames { capture })
    }
}

#[cfg(feature = "opencv")]
impl FrameSource for VideoFrames {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        use opencv::core::Mat;
        use opencv::imgproc::{cvt_color, COLOR_BGR2RGB};
        use opencv::prelude::*;

        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        let mut rgb = Mat::default();
        cvt_color(&frame, &mut rgb, COLOR_BGR2RGB, 0)?;
        let size = rgb.size()?;
        let (w, h) = (size.width as u32, size.height as u32);
        let rgb = if rgb.is_continuous() { rgb } else { rgb.try_clone()? };
        RgbImage::from_raw(w, h, rgb.data_bytes()?.to_vec())
            .map(Some)
            .ok_or_else(|| StyleError::Shape(format!("cannot build a {w}x{h} video frame")))
    }
}

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

#[cfg(feature = "opencv")]
fn open_video(path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoFrames::open(path)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video(path: &Path) -> Result<Box<dyn FrameSource>> {
    Err(StyleError::Config(format!(
        "decoding {} requires the `opencv` feature",
        path.display()
    )))
}

/// Opens a directory of frames, an animated GIF, or a video file (the latter
/// with the `opencv` feature).
pub fn open_frames<T: AsRef<Path>>(path: T) -> Result<Box<dyn FrameSource>> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(Box::new(FrameDir::open(path)?));
    }
    if !path.is_file() {
        return Err(StyleError::MissingFile(path.to_path_buf()));
    }
    if has_extension(path, &["gif"]) {
        Ok(Box::new(GifFrames::open(path)?))
    } else if has_extension(path, &VIDEO_EXTENSIONS) {
        open_video(path)
    } else {
        Err(StyleError::Config(format!(
            "unsupported video {}, expected a gif, a video file or a directory of frames",
            path.display()
        )))
    }
}

use image::{Rgb, RgbImage};
use ssd_style_transfer::nn::Adam;
use ssd_style_transfer::overlay::{style_thumbnail, Overlay, BORDER_COLOR};
use ssd_style_transfer::vision::image::{
    open_image, save_animation, FrameDir, FrameSource, GifFrames,
};
use ssd_style_transfer::{FrameRange, ImageJob, RunConfig, StyleTransfer, VideoJob};

use test_utils::*;

fn transfer(epochs: usize) -> StyleTransfer {
    StyleTransfer::from_extractor(small_extractor(), RunConfig { epochs, ..Default::default() })
}

fn solid(w: u32, h: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb(color))
}

#[test]
fn image_with_content_thumbnail() {
    let style = temp_path("image-style.png");
    let content = temp_path("image-content.png");
    let output = temp_path("image-output.png");
    solid(64, 64, [200, 40, 40]).save(&style).unwrap();
    solid(90, 60, [10, 20, 30]).save(&content).unwrap();

    let job = ImageJob {
        style: style.clone(),
        content: content.clone(),
        output: output.clone(),
        resize: None,
        overlay: Overlay { add_content: true, ..Default::default() },
    };
    let result = transfer(0).infer_on_image(&job, &mut Adam::new(10.0)).unwrap();
    assert_eq!(result.dimensions(), (90, 60));
    assert_eq!(open_image(&output).unwrap().dimensions(), (90, 60));

    // A 30x20 thumbnail on the bottom-left corner, outlined on its top and
    // right sides only.
    assert_eq!(*result.get_pixel(0, 40), BORDER_COLOR);
    assert_eq!(*result.get_pixel(10, 41), BORDER_COLOR);
    assert_eq!(*result.get_pixel(27, 55), BORDER_COLOR);
    assert_eq!(*result.get_pixel(26, 59), BORDER_COLOR);
    assert_ne!(*result.get_pixel(28, 55), BORDER_COLOR);
    assert_ne!(*result.get_pixel(0, 39), BORDER_COLOR);
    assert_ne!(*result.get_pixel(5, 50), BORDER_COLOR);

    for path in [style, content, output] {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn stylized_image_spans_the_full_range() {
    let style = temp_path("range-style.png");
    let content = temp_path("range-content.png");
    let output = temp_path("range-output.png");
    solid(32, 32, [120, 60, 30]).save(&style).unwrap();
    let mut img = solid(60, 30, [40, 40, 40]);
    for (x, _, p) in img.enumerate_pixels_mut() {
        if x >= 30 {
            *p = Rgb([200, 200, 200]);
        }
    }
    img.save(&content).unwrap();

    let job = ImageJob {
        style: style.clone(),
        content: content.clone(),
        output: output.clone(),
        resize: None,
        overlay: Overlay::default(),
    };
    let result = transfer(0).infer_on_image(&job, &mut Adam::new(10.0)).unwrap();
    assert_eq!(*result.get_pixel(0, 15), Rgb([0, 0, 0]));
    assert_eq!(*result.get_pixel(59, 15), Rgb([255, 255, 255]));
    for path in [style, content, output] {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn image_output_resolution() {
    let style = temp_path("resize-style.png");
    let content = temp_path("resize-content.png");
    let output = temp_path("resize-output.jpg");
    solid(32, 32, [0, 0, 255]).save(&style).unwrap();
    solid(80, 40, [0, 255, 0]).save(&content).unwrap();
    let job = ImageJob {
        style: style.clone(),
        content: content.clone(),
        output: output.clone(),
        resize: Some((50, 70)),
        overlay: Overlay::default(),
    };
    let result = transfer(1).infer_on_image(&job, &mut Adam::new(10.0)).unwrap();
    assert_eq!(result.dimensions(), (50, 70));
    for path in [style, content, output] {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn video_frame_range() {
    let style = temp_path("video-style.png");
    let video = temp_path("video-input.gif");
    let output = temp_path("video-output.gif");
    solid(48, 48, [255, 255, 0]).save(&style).unwrap();
    let frames: Vec<RgbImage> = (0..5).map(|i| solid(40, 30, [i * 40, 0, 100])).collect();
    save_animation(&frames, &video, 10).unwrap();

    let job = VideoJob {
        style: style.clone(),
        video: video.clone(),
        output: output.clone(),
        range: FrameRange { start: 1, end: Some(4), skip: 1 },
        resize: None,
        fps: 5,
        overlay: Overlay { add_content: true, add_style: true, line_width: 1 },
    };
    let written = transfer(1).infer_on_video(&job, &mut Adam::new(10.0)).unwrap();
    assert_eq!(written, 3);

    let mut decoded = GifFrames::open(&output).unwrap();
    let mut count = 0;
    while let Some(frame) = decoded.next_frame().unwrap() {
        assert_eq!(frame.dimensions(), (40, 30));
        count += 1;
    }
    assert_eq!(count, 3);
    for path in [style, video, output] {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn frame_directory_shorter_than_range() {
    let style = temp_path("dir-style.png");
    let dir = temp_path("dir-frames");
    std::fs::create_dir_all(dir.join("b")).unwrap();
    solid(16, 16, [0, 128, 255]).save(&style).unwrap();
    solid(60, 30, [1, 2, 3]).save(dir.join("a.png")).unwrap();
    solid(30, 60, [4, 5, 6]).save(dir.join("b").join("c.png")).unwrap();

    let mut source = FrameDir::open(&dir).unwrap();
    assert_eq!(source.len(), 2);
    let job = VideoJob {
        style: style.clone(),
        video: dir.clone(),
        output: temp_path("unused.gif"),
        range: FrameRange { end: Some(10), ..Default::default() },
        resize: None,
        fps: 30,
        overlay: Overlay::default(),
    };
    let frames = transfer(0).infer_on_frames(&mut source, &job, &mut Adam::new(10.0)).unwrap();
    assert_eq!(frames.len(), 2);
    // The first frame fixes the output resolution.
    assert!(frames.iter().all(|f| f.dimensions() == (60, 30)));

    std::fs::remove_file(style).unwrap();
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn zero_skip_is_rejected() {
    let job = VideoJob {
        style: temp_path("never-read.png"),
        video: temp_path("never-read.gif"),
        output: temp_path("never-written.gif"),
        range: FrameRange { skip: 0, ..Default::default() },
        resize: None,
        fps: 30,
        overlay: Overlay::default(),
    };
    let mut source = FrameDir::open(temp_path("no-such-dir")).unwrap();
    assert!(source.is_empty());
    let err = transfer(0).infer_on_frames(&mut source, &job, &mut Adam::new(1.0)).unwrap_err();
    assert!(matches!(err, ssd_style_transfer::StyleError::Config(_)));
}

#[test]
fn style_thumbnail_scale() {
    let style = solid(300, 300, [9, 9, 9]);
    // round(900 / 300 * 0.8) = 2
    let thumb = style_thumbnail(&style, 900, (300, 200), 2);
    assert_eq!(thumb.dimensions(), (150, 150));
    // Upscaled outputs keep the full network input size.
    let thumb = style_thumbnail(&style, 100, (400, 400), 2);
    assert_eq!(thumb.dimensions(), (300, 300));
}

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use ssd_style_transfer::vision::image::{
    image_to_tensor, open_frames, open_image, save_animation, tensor_to_image,
    tensor_to_image_scaled, FrameSource,
};
use ssd_style_transfer::StyleError;
use tch::{kind, Kind, Tensor};

use test_utils::*;

#[test]
fn image_tensor_layout() {
    let mut img = RgbImage::new(4, 2);
    img.put_pixel(3, 1, Rgb([1, 2, 3]));
    let t = image_to_tensor(&img);
    assert_eq!(t.size(), [1, 2, 4, 3]);
    assert_eq!(t.kind(), Kind::Float);
    assert_eq!(from::<Vec<f32>>(&t.get(0).get(1).get(3)), [1., 2., 3.]);
    assert_eq!(tensor_to_image(&t).unwrap(), img);
}

#[test]
fn pixels_are_clamped_on_conversion() {
    let t = Tensor::from_slice(&[-5f32, 300., 127.9]).view([1, 1, 1, 3]);
    let img = tensor_to_image(&t).unwrap();
    assert_eq!(*img.get_pixel(0, 0), Rgb([0, 255, 127]));

    let t = Tensor::zeros([1, 2, 2, 4], kind::FLOAT_CPU);
    assert!(matches!(tensor_to_image(&t), Err(StyleError::Shape(_))));
}

#[test]
fn alpha_is_dropped() {
    let path = temp_path("alpha.png");
    RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 40])).save(&path).unwrap();
    let img = open_image(&path).unwrap();
    assert_eq!(*img.get_pixel(1, 1), Rgb([10, 20, 30]));
    std::fs::remove_file(path).unwrap();
}

#[test]
fn missing_inputs() {
    let path = temp_path("missing.png");
    assert!(matches!(open_image(&path), Err(StyleError::MissingFile(_))));
    assert!(matches!(open_frames(temp_path("missing.gif")), Err(StyleError::MissingFile(_))));
}

#[test]
fn unsupported_video_format() {
    let path = temp_path("clip.png");
    RgbImage::new(2, 2).save(&path).unwrap();
    assert!(matches!(open_frames(&path), Err(StyleError::Config(_))));
    std::fs::remove_file(path).unwrap();
}

#[test]
fn animation_needs_frames() {
    let path = temp_path("empty.gif");
    assert!(matches!(save_animation(&[], &path, 30), Err(StyleError::NoFrames(_))));
    let frames = [RgbImage::new(2, 2)];
    assert!(matches!(save_animation(&frames, &path, 0), Err(StyleError::Config(_))));
    assert!(!path.exists());
}

#[test]
fn animation_round_trip() {
    let path = temp_path("anim.gif");
    let frames: Vec<RgbImage> =
        (0..4).map(|i| RgbImage::from_pixel(5, 3, Rgb([i * 60, 0, 0]))).collect();
    save_animation(&frames, &path, 25).unwrap();
    let mut source = open_frames(&path).unwrap();
    let mut count = 0;
    while let Some(frame) = source.next_frame().unwrap() {
        assert_eq!(frame.dimensions(), (5, 3));
        count += 1;
    }
    assert_eq!(count, 4);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn snapshots_are_stretched_to_the_full_range() {
    let t = Tensor::from_slice(&[40f32, 120., 200., 80., 160., 100.]).view([1, 1, 2, 3]);
    let img = tensor_to_image_scaled(&t).unwrap();
    assert_eq!(*img.get_pixel(0, 0), Rgb([0, 127, 255]));
    assert_eq!(*img.get_pixel(1, 0), Rgb([63, 191, 95]));

    // The plain conversion keeps the values as they are.
    assert_eq!(*tensor_to_image(&t).unwrap().get_pixel(0, 0), Rgb([40, 120, 200]));

    let flat = Tensor::full([1, 2, 2, 3], 90.0, kind::FLOAT_CPU);
    let img = tensor_to_image_scaled(&flat).unwrap();
    assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
}

#[cfg(not(feature = "opencv"))]
#[test]
fn video_files_need_opencv() {
    let path = temp_path("clip.mp4");
    std::fs::write(&path, b"not a video").unwrap();
    match open_frames(&path) {
        Err(StyleError::Config(msg)) => assert!(msg.contains("opencv"), "{msg}"),
        Err(other) => panic!("unexpected error {other:?}"),
        Ok(_) => panic!("mp4 opened without opencv"),
    }
    std::fs::remove_file(path).unwrap();
}

#[cfg(feature = "opencv")]
#[test]
fn unreadable_video_file() {
    let path = temp_path("broken.mp4");
    std::fs::write(&path, b"not a video").unwrap();
    assert!(open_frames(&path).is_err());
    std::fs::remove_file(path).unwrap();
}
